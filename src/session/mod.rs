//! Conversation sessions: attachments and send orchestration.

pub mod attachments;
pub mod controller;

pub use attachments::{AttachmentTray, PendingAttachment, UploadStatus, format_file_size};
pub use controller::{
    ChatSession, SEND_FAILURE_NOTICE, STREAM_FAILURE_NOTICE, SendFailure, SendReport, SendRequest,
    SessionError, SessionResult,
};
