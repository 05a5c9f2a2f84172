//! Conversation model and stream assembly.
//!
//! - `ids`: opaque string identifiers
//! - `message`: message, role, tool and kind types plus the history wire record
//! - `message_list`: insertion-ordered list and published snapshots
//! - `assembler`: turns streamed fragments into growing messages

pub mod assembler;
pub mod ids;
pub mod message;
pub mod message_list;

pub use assembler::{AssembleError, MessageHandle, StreamAssembler};
pub use ids::{ConversationId, FileId, IdParseError, MessageId};
pub use message::{Message, MessageKind, MessageRecord, Role, Tool};
pub use message_list::{MessageList, MessageSnapshot};
