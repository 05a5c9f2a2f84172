//! Wire types exchanged with the backend.

use serde::{Deserialize, Serialize};

use crate::chat::ids::{ConversationId, FileId};
use crate::chat::message::Tool;

/// Body of the question endpoints.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct QuestionPayload {
    /// Question text, sent as typed.
    pub question: String,
    /// Existing conversation id, or empty for a new conversation.
    #[serde(rename = "chatId")]
    pub chat_id: String,
    /// True when no conversation exists yet.
    #[serde(rename = "firstMessage")]
    pub first_message: bool,
    /// Capability tag (`LLM` or `WEB SEARCH`).
    pub tool: String,
    /// Uploaded files the question refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileRef>>,
}

impl QuestionPayload {
    /// Build a payload for `question` in `conversation`, `None` meaning new.
    #[must_use]
    pub fn new(question: impl Into<String>, conversation: Option<&ConversationId>, tool: Tool) -> Self {
        Self {
            question: question.into(),
            chat_id: conversation.map(ToString::to_string).unwrap_or_default(),
            first_message: conversation.is_none(),
            tool: tool.payload_tag().to_string(),
            files: None,
        }
    }

    /// Attach file references.
    #[must_use]
    pub fn with_files(mut self, files: Vec<FileRef>) -> Self {
        self.files = Some(files);
        self
    }
}

/// Reference to an uploaded file inside a question payload.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    /// Backend file id.
    pub id: FileId,
    /// Original file name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type.
    #[serde(rename = "type")]
    pub mime: String,
}

/// Answer of the web-search endpoint.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SearchAnswer {
    /// Complete answer text.
    pub answer: String,
    /// Conversation the answer was stored in.
    #[serde(rename = "chatId", default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<ConversationId>,
}

/// Answer of the upload endpoint.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Id assigned to the stored file.
    #[serde(rename = "fileId")]
    pub file_id: FileId,
}

/// A file to upload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileUpload {
    /// File name sent in the multipart part.
    pub name: String,
    /// MIME type; empty when unknown.
    pub mime: String,
    /// Raw contents.
    pub bytes: Vec<u8>,
}

impl FileUpload {
    /// Size of the contents in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::try_from(self.bytes.len()).unwrap_or(u64::MAX)
    }
}

/// Summary of a conversation, as listed in the sidebar.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChatSummary {
    /// Conversation id.
    #[serde(rename = "_id")]
    pub id: ConversationId,
    /// Owner id; empty for summaries created locally.
    #[serde(rename = "userId", default)]
    pub user_id: String,
    /// Title shown in the list.
    #[serde(default)]
    pub title: String,
    /// RFC 3339 creation time.
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
    /// RFC 3339 last update time.
    #[serde(rename = "updatedAt", default)]
    pub updated_at: String,
}

impl ChatSummary {
    /// Title used when the first question is empty.
    pub const DEFAULT_TITLE: &'static str = "New Chat";

    /// Summary for a conversation just created by the first question.
    #[must_use]
    pub fn new_conversation(id: ConversationId, question: &str) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        let title = if question.is_empty() {
            Self::DEFAULT_TITLE.to_string()
        } else {
            question.to_string()
        };
        Self {
            id,
            user_id: String::new(),
            title,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Body of the conversation list endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatList {
    /// Conversations, most recent first.
    #[serde(default)]
    pub chats: Vec<ChatSummary>,
}

/// The signed-in user.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Backend user id.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Body of the current-user endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Whether a user is signed in.
    #[serde(default)]
    pub status: bool,
    /// The user, present when `status` is true.
    #[serde(default)]
    pub user: Option<User>,
}

/// Body of the logout endpoint.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Whether the backend accepted the request.
    #[serde(default)]
    pub status: bool,
}

/// Body sent to store a message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreMessageBody {
    /// The message record.
    pub message: crate::chat::message::MessageRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_for_new_conversation() {
        let payload = QuestionPayload::new("hi", None, Tool::Think);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["chatId"], "");
        assert_eq!(json["firstMessage"], true);
        assert_eq!(json["tool"], "LLM");
        assert!(json.get("files").is_none());
    }

    #[test]
    fn test_payload_with_files() {
        let conversation = ConversationId::new("c9");
        let payload = QuestionPayload::new("sum up", Some(&conversation), Tool::Llm).with_files(vec![
            FileRef {
                id: FileId::new("f1"),
                name: "a.pdf".to_string(),
                size: 10,
                mime: "application/pdf".to_string(),
            },
        ]);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["chatId"], "c9");
        assert_eq!(json["firstMessage"], false);
        assert_eq!(json["files"][0]["type"], "application/pdf");
        assert_eq!(json["files"][0]["id"], "f1");
    }

    #[test]
    fn test_search_answer_without_chat_id() {
        let answer: SearchAnswer = serde_json::from_str(r#"{"answer":"42"}"#).unwrap();
        assert_eq!(answer.answer, "42");
        assert!(answer.chat_id.is_none());
    }

    #[test]
    fn test_session_info_signed_out() {
        let info: SessionInfo = serde_json::from_str(r#"{"status":false}"#).unwrap();
        assert!(!info.status);
        assert!(info.user.is_none());
    }

    #[test]
    fn test_new_conversation_title() {
        let id = ConversationId::new("c1");
        assert_eq!(ChatSummary::new_conversation(id.clone(), "").title, "New Chat");
        assert_eq!(ChatSummary::new_conversation(id, "Rust?").title, "Rust?");
    }
}
