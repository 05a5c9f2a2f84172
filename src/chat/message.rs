//! Chat message model and its wire representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::chat::ids::{ConversationId, MessageId};

/// Author of a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The person typing into the client.
    User,
    /// The backend's model.
    Assistant,
}

impl Role {
    /// Stable string form used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Label shown above a message bubble.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Assistant => "Hain AI",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(value.to_string()),
        }
    }
}

/// Capability that produced, or should produce, a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Tool {
    /// Plain model completion.
    Llm,
    /// Web search answer.
    WebSearch,
    /// Extended reasoning.
    Think,
    /// Deep research.
    Research,
    /// Image generation.
    Image,
    /// Creative canvas.
    Canvas,
}

impl Tool {
    /// Tools offered by the input's tool picker, in display order.
    pub const PICKER: [Self; 5] = [
        Self::Think,
        Self::Research,
        Self::Image,
        Self::WebSearch,
        Self::Canvas,
    ];

    /// Identifier used by the tool picker and stored on user messages.
    #[must_use]
    pub const fn picker_id(self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::WebSearch => "search",
            Self::Think => "think",
            Self::Research => "research",
            Self::Image => "image",
            Self::Canvas => "canvas",
        }
    }

    /// Tag sent in question payloads. Only web search is routed differently;
    /// every other capability is answered by the plain completion endpoint.
    #[must_use]
    pub const fn payload_tag(self) -> &'static str {
        match self {
            Self::WebSearch => "WEB SEARCH",
            _ => "LLM",
        }
    }

    /// Human readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Llm => "Chat",
            Self::WebSearch => "Web search",
            Self::Think => "Think for longer",
            Self::Research => "Deep research",
            Self::Image => "Create image",
            Self::Canvas => "Canvas",
        }
    }

    /// One-line description for the picker.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Llm => "Conversational answers",
            Self::WebSearch => "Real-time web information",
            Self::Think => "Extended reasoning and analysis",
            Self::Research => "Comprehensive information gathering",
            Self::Image => "AI-powered image generation",
            Self::Canvas => "Creative workspace and design",
        }
    }

    /// Placeholder for the question input while this tool is selected.
    #[must_use]
    pub const fn placeholder(tool: Option<Self>) -> &'static str {
        match tool {
            Some(Self::WebSearch) => "Search the web for information...",
            Some(Self::Think) => "What complex problem should I analyze?",
            Some(Self::Research) => "What topic should I research thoroughly?",
            Some(Self::Image) => "Describe the image you want me to create...",
            Some(Self::Canvas) => "What would you like to design or create?",
            Some(Self::Llm) | None => "Type your message...",
        }
    }

    /// Parse either a picker id or a payload tag.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "LLM" | "llm" => Some(Self::Llm),
            "WEB SEARCH" | "search" => Some(Self::WebSearch),
            "think" => Some(Self::Think),
            "research" => Some(Self::Research),
            "image" => Some(Self::Image),
            "canvas" => Some(Self::Canvas),
            _ => None,
        }
    }
}

impl From<Tool> for String {
    fn from(tool: Tool) -> Self {
        tool.picker_id().to_string()
    }
}

impl TryFrom<String> for Tool {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(value)
    }
}

/// Presentation variant of a message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Ordinary text.
    Plain,
    /// Text produced by, or addressed to, a specific capability.
    Tool(Tool),
    /// A user message sent together with uploaded files, in upload order.
    WithAttachments(Vec<String>),
}

impl MessageKind {
    /// Build a kind from the optional fields of a stored record.
    /// Attachments take precedence over the tool tag.
    #[must_use]
    pub fn from_parts(tool: Option<Tool>, file_names: Vec<String>) -> Self {
        if !file_names.is_empty() {
            return Self::WithAttachments(file_names);
        }
        tool.map_or(Self::Plain, Self::Tool)
    }

    /// Tool tag, if any.
    #[must_use]
    pub const fn tool(&self) -> Option<Tool> {
        match self {
            Self::Tool(tool) => Some(*tool),
            _ => None,
        }
    }

    /// Attached file names (empty unless [`MessageKind::WithAttachments`]).
    #[must_use]
    pub fn attachments(&self) -> &[String] {
        match self {
            Self::WithAttachments(names) => names,
            _ => &[],
        }
    }
}

/// A single message of a conversation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    /// Stable identifier.
    pub id: MessageId,
    /// Owning conversation; unknown until the backend assigns one.
    pub conversation_id: Option<ConversationId>,
    /// Author.
    pub role: Role,
    /// Text, append-only while streaming.
    pub content: String,
    /// Presentation variant.
    pub kind: MessageKind,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Set once no more fragments will arrive.
    pub complete: bool,
}

impl Message {
    /// A finished user message.
    #[must_use]
    pub fn user(
        content: impl Into<String>,
        kind: MessageKind,
        conversation_id: Option<ConversationId>,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            conversation_id,
            role: Role::User,
            content: content.into(),
            kind,
            created_at: Utc::now(),
            complete: true,
        }
    }

    /// An empty assistant message awaiting streamed fragments.
    #[must_use]
    pub fn pending(role: Role, kind: MessageKind, conversation_id: Option<ConversationId>) -> Self {
        Self {
            id: MessageId::generate(),
            conversation_id,
            role,
            content: String::new(),
            kind,
            created_at: Utc::now(),
            complete: false,
        }
    }

    /// A finished assistant message whose whole text arrived at once.
    #[must_use]
    pub fn assistant_text(
        content: impl Into<String>,
        kind: MessageKind,
        conversation_id: Option<ConversationId>,
    ) -> Self {
        Self {
            content: content.into(),
            complete: true,
            ..Self::pending(Role::Assistant, kind, conversation_id)
        }
    }

    /// Whether the user wrote this message.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Content length in characters, the unit the reveal advances by.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Message as exchanged with the history endpoints.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Backend message identifier.
    #[serde(rename = "_id")]
    pub id: String,
    /// Owning conversation identifier.
    #[serde(rename = "chatId", default)]
    pub chat_id: String,
    /// Author role.
    pub role: String,
    /// Message text.
    #[serde(default)]
    pub content: String,
    /// Optional capability tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// RFC 3339 creation timestamp.
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
    /// Names of attached files.
    #[serde(rename = "fileNames", default, skip_serializing_if = "Option::is_none")]
    pub file_names: Option<Vec<String>>,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        let role = record.role.parse().unwrap_or_else(|other: String| {
            tracing::debug!(role = %other, "unknown role in history, treating as assistant");
            Role::Assistant
        });
        let created_at = DateTime::parse_from_rfc3339(&record.created_at).map_or_else(
            |err| {
                tracing::warn!(id = %record.id, %err, "unparseable createdAt, using current time");
                Utc::now()
            },
            |parsed| parsed.with_timezone(&Utc),
        );
        let tool = record.tool.as_deref().and_then(Tool::parse);
        let conversation_id = record.chat_id.parse().ok();

        Self {
            id: MessageId::new(record.id),
            conversation_id,
            role,
            content: record.content,
            kind: MessageKind::from_parts(tool, record.file_names.unwrap_or_default()),
            created_at,
            complete: true,
        }
    }
}

impl From<&Message> for MessageRecord {
    fn from(message: &Message) -> Self {
        let file_names = message.kind.attachments();
        Self {
            id: message.id.to_string(),
            chat_id: message
                .conversation_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
            tool: message.kind.tool().map(|tool| match message.role {
                Role::Assistant => tool.payload_tag().to_string(),
                Role::User => String::from(tool),
            }),
            created_at: message.created_at.to_rfc3339(),
            file_names: (!file_names.is_empty()).then(|| file_names.to_vec()),
        }
    }
}
