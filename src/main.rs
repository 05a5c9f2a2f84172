//! Binary entrypoint of the `hain` terminal chat client.

use std::process::ExitCode;

use hain_chat::start_hain_chat;

/// Read questions from stdin and stream the answers from the backend.
fn main() -> ExitCode {
    start_hain_chat::run()
}
