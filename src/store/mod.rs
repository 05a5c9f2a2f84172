//! Application state container.
//!
//! `AppStore` is created once and shared as `Arc<AppStore>`. Each slice lives
//! behind its own `watch` channel; every action replaces the slice wholesale
//! and observers see the new value on their receiver.

pub mod slices;

use tokio::sync::watch;
use tracing::debug;

use crate::chat::ids::ConversationId;
use crate::client::types::{ChatSummary, User};

pub use slices::{ChatState, UiState};

/// Shared application state.
#[derive(Debug)]
pub struct AppStore {
    chats: watch::Sender<ChatState>,
    user: watch::Sender<Option<User>>,
    ui: watch::Sender<UiState>,
}

impl Default for AppStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AppStore {
    /// Empty store: no conversations, no user, default layout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chats: watch::Sender::new(ChatState::default()),
            user: watch::Sender::new(None),
            ui: watch::Sender::new(UiState::default()),
        }
    }

    /// Current conversation state.
    #[must_use]
    pub fn chats(&self) -> ChatState {
        self.chats.borrow().clone()
    }

    /// Observe the conversation state.
    #[must_use]
    pub fn subscribe_chats(&self) -> watch::Receiver<ChatState> {
        self.chats.subscribe()
    }

    /// Replace the conversation list. The selection is kept.
    pub fn set_chats(&self, chats: Vec<ChatSummary>) {
        debug!(count = chats.len(), "conversation list replaced");
        self.chats.send_modify(|state| {
            *state = ChatState {
                chats,
                selected: state.selected.take(),
            };
        });
    }

    /// Put a summary at the top of the list.
    pub fn prepend_chat(&self, summary: ChatSummary) {
        let chats = self.chats.borrow().with_prepended(summary);
        self.set_chats(chats);
    }

    /// Mark a conversation as open.
    pub fn select_chat(&self, id: ConversationId) {
        self.chats.send_modify(|state| {
            *state = ChatState {
                chats: std::mem::take(&mut state.chats),
                selected: Some(id),
            };
        });
    }

    /// Drop every conversation and the selection.
    pub fn clear_chats(&self) {
        self.chats.send_replace(ChatState::default());
    }

    /// Current user.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.user.borrow().clone()
    }

    /// Observe the current user.
    #[must_use]
    pub fn subscribe_user(&self) -> watch::Receiver<Option<User>> {
        self.user.subscribe()
    }

    /// Whether a user is identified.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.user.borrow().is_some()
    }

    /// Name to greet the user with.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        self.user.borrow().as_ref().map(|user| user.name.clone())
    }

    /// Set the identified user.
    pub fn set_user(&self, user: User) {
        self.user.send_replace(Some(user));
    }

    /// Forget the identified user.
    pub fn clear_user(&self) {
        self.user.send_replace(None);
    }

    /// Forget everything tied to the signed-out session.
    pub fn sign_out(&self) {
        self.clear_user();
        self.clear_chats();
    }

    /// Current layout toggles.
    #[must_use]
    pub fn ui(&self) -> UiState {
        *self.ui.borrow()
    }

    /// Observe the layout toggles.
    #[must_use]
    pub fn subscribe_ui(&self) -> watch::Receiver<UiState> {
        self.ui.subscribe()
    }

    /// Collapse or expand the sidebar.
    pub fn toggle_sidebar(&self) {
        self.ui.send_modify(|ui| {
            *ui = UiState {
                sidebar_collapsed: !ui.sidebar_collapsed,
                ..*ui
            };
        });
    }

    /// Open or close the mobile drawer.
    pub fn set_mobile_open(&self, open: bool) {
        self.ui.send_modify(|ui| {
            *ui = UiState {
                mobile_open: open,
                ..*ui
            };
        });
    }
}
