//! Presentation of a single message.

use std::fmt::Display;

use chrono::{DateTime, TimeZone};

use crate::chat::ids::MessageId;
use crate::chat::message::{Message, Role, Tool};
use crate::format::blocks::{CodeBlock, ContentFormatter, DisplayNode};
use crate::format::html::render_html;
use crate::reveal::animator::RevealState;

/// Badge on assistant messages produced by web search.
pub const WEB_SEARCH_BADGE: &str = "Searched from Web";

/// Download link for a file attached to a user message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttachmentLink {
    /// File name as attached.
    pub name: String,
    /// Download path.
    pub href: String,
}

impl AttachmentLink {
    /// Link for `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            href: format!("/downloads/{}", urlencoding::encode(name)),
        }
    }
}

/// Everything needed to draw one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageBubble {
    /// Message shown.
    pub id: MessageId,
    /// Author.
    pub role: Role,
    /// `You` or `Hain AI`.
    pub label: &'static str,
    /// Tool badge, assistant messages only.
    pub badge: Option<&'static str>,
    /// Attached files, user messages only.
    pub attachments: Vec<AttachmentLink>,
    /// Revealed part of the content.
    pub visible: String,
    /// Revealed part, formatted.
    pub nodes: Vec<DisplayNode>,
    /// Creation time, once the reveal has caught up.
    pub timestamp: Option<String>,
}

impl MessageBubble {
    /// Build the bubble for `message` at reveal progress `reveal`.
    #[must_use]
    pub fn build<Tz>(
        message: &Message,
        reveal: &RevealState,
        formatter: &ContentFormatter,
        now: &DateTime<Tz>,
    ) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let visible = reveal.visible(&message.content).to_string();
        let nodes = formatter.format(&visible);
        let is_user = message.is_user();
        let badge = (!is_user && message.kind.tool() == Some(Tool::WebSearch))
            .then_some(WEB_SEARCH_BADGE);
        let attachments = if is_user {
            message
                .kind
                .attachments()
                .iter()
                .map(|name| AttachmentLink::new(name))
                .collect()
        } else {
            Vec::new()
        };
        let timestamp = reveal.is_caught_up().then(|| {
            let created = message.created_at.with_timezone(&now.timezone());
            format_message_time(&created, now)
        });

        Self {
            id: message.id.clone(),
            role: message.role,
            label: message.role.label(),
            badge,
            attachments,
            visible,
            nodes,
            timestamp,
        }
    }

    /// Code blocks of the revealed content.
    pub fn code_blocks(&self) -> impl Iterator<Item = &CodeBlock> {
        self.nodes.iter().filter_map(|node| match node {
            DisplayNode::CodeBlock(block) => Some(block),
            _ => None,
        })
    }

    /// HTML for the content area.
    #[must_use]
    pub fn to_html(&self, copied: Option<usize>) -> String {
        render_html(&self.nodes, copied)
    }
}

/// `3:07 PM` today, `Yesterday 3:07 PM`, otherwise `Mar 4 3:07 PM`.
#[must_use]
pub fn format_message_time<Tz>(created: &DateTime<Tz>, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let time = created.format("%-I:%M %p").to_string();
    let day = created.date_naive();
    let today = now.date_naive();
    if day == today {
        time
    } else if today.pred_opt() == Some(day) {
        format!("Yesterday {time}")
    } else {
        format!("{} {time}", created.format("%b %-d"))
    }
}
