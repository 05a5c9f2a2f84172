//! State slices held by the application store.

use crate::chat::ids::ConversationId;
use crate::client::types::ChatSummary;

/// Conversation list and the selected conversation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChatState {
    /// Conversations, most recent first.
    pub chats: Vec<ChatSummary>,
    /// Conversation currently open.
    pub selected: Option<ConversationId>,
}

impl ChatState {
    /// Summary of the selected conversation.
    #[must_use]
    pub fn selected_summary(&self) -> Option<&ChatSummary> {
        let selected = self.selected.as_ref()?;
        self.chats.iter().find(|chat| &chat.id == selected)
    }

    /// Conversations whose title contains `term`, ignoring case.
    #[must_use]
    pub fn filter(&self, term: &str) -> Vec<&ChatSummary> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return self.chats.iter().collect();
        }
        self.chats
            .iter()
            .filter(|chat| chat.title.to_lowercase().contains(&term))
            .collect()
    }

    /// New state with `summary` first and any older entry for the same id dropped.
    #[must_use]
    pub fn with_prepended(&self, summary: ChatSummary) -> Vec<ChatSummary> {
        let mut chats = Vec::with_capacity(self.chats.len() + 1);
        let id = summary.id.clone();
        chats.push(summary);
        chats.extend(self.chats.iter().filter(|chat| chat.id != id).cloned());
        chats
    }
}

/// Layout toggles shared across the interface.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct UiState {
    /// Sidebar shrunk to icons.
    pub sidebar_collapsed: bool,
    /// Sidebar drawer open on small screens.
    pub mobile_open: bool,
}
