//! View models for a conversation screen.
//!
//! Nothing here draws; these types compute what a front end shows: which
//! part of each message is revealed, how it is formatted, which loading
//! placeholder is up and which code block was just copied.

pub mod bubble;
pub mod conversation;
pub mod copy;
pub mod loading;

pub use bubble::{AttachmentLink, MessageBubble, WEB_SEARCH_BADGE, format_message_time};
pub use conversation::ConversationView;
pub use copy::{Clipboard, ClipboardError, CopyFeedback, MemoryClipboard};
pub use loading::{LoadingIndicator, SEARCH_PHASES, SearchProgress, TYPING_LABEL};
