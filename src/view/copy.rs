//! Copy-to-clipboard for code blocks and its short-lived acknowledgement.

use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::format::blocks::CodeBlock;
use crate::format::html::{COPIED_LABEL, COPY_LABEL};

/// Errors raised by a clipboard.
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// The clipboard could not be reached.
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
}

/// Destination of copied text.
pub trait Clipboard: Send + Sync {
    /// Replace the clipboard contents.
    ///
    /// # Errors
    /// Returns an error if the clipboard refuses the write.
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Clipboard kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    /// Empty clipboard.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            contents: Mutex::new(None),
        }
    }

    /// Last copied text.
    #[must_use]
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|guard| guard.clone())
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut guard = self
            .contents
            .lock()
            .map_err(|err| ClipboardError::Unavailable(err.to_string()))?;
        *guard = Some(text.to_string());
        Ok(())
    }
}

/// Remembers which code block was copied, for a limited time.
#[derive(Clone, Copy, Debug)]
pub struct CopyFeedback {
    copied: Option<(usize, Instant)>,
    duration: Duration,
}

impl Default for CopyFeedback {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl CopyFeedback {
    /// Feedback that stays visible for `duration`.
    #[must_use]
    pub const fn new(duration: Duration) -> Self {
        Self {
            copied: None,
            duration,
        }
    }

    /// Copy `block` and acknowledge it.
    ///
    /// # Errors
    /// Returns the clipboard error; the acknowledgement is left unchanged.
    pub fn copy<C>(&mut self, clipboard: &C, block: &CodeBlock) -> Result<(), ClipboardError>
    where
        C: Clipboard + ?Sized,
    {
        if let Err(err) = clipboard.write_text(&block.text) {
            warn!(block = block.index, %err, "failed to copy code block");
            return Err(err);
        }
        debug!(block = block.index, "code block copied");
        self.copied = Some((block.index, Instant::now()));
        Ok(())
    }

    /// Index acknowledged at `now`, if the acknowledgement has not expired.
    #[must_use]
    pub fn active_at(&self, now: Instant) -> Option<usize> {
        let (index, at) = self.copied?;
        (now.saturating_duration_since(at) < self.duration).then_some(index)
    }

    /// Index acknowledged right now.
    #[must_use]
    pub fn active(&self) -> Option<usize> {
        self.active_at(Instant::now())
    }

    /// Button label for the block at `index`.
    #[must_use]
    pub fn label(&self, index: usize) -> &'static str {
        if self.active() == Some(index) {
            COPIED_LABEL
        } else {
            COPY_LABEL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenClipboard;

    impl Clipboard for BrokenClipboard {
        fn write_text(&self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError::Unavailable("denied".to_string()))
        }
    }

    fn block(index: usize) -> CodeBlock {
        CodeBlock {
            index,
            language: Some("rust".to_string()),
            text: "fn main() {}".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_acknowledgement_expires() {
        let clipboard = MemoryClipboard::new();
        let mut feedback = CopyFeedback::default();
        feedback.copy(&clipboard, &block(3)).unwrap();

        assert_eq!(clipboard.contents().as_deref(), Some("fn main() {}"));
        assert_eq!(feedback.active(), Some(3));
        assert_eq!(feedback.label(3), COPIED_LABEL);
        assert_eq!(feedback.label(1), COPY_LABEL);

        tokio::time::advance(Duration::from_millis(2_001)).await;
        assert_eq!(feedback.active(), None);
        assert_eq!(feedback.label(3), COPY_LABEL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_copy_moves_acknowledgement() {
        let clipboard = MemoryClipboard::new();
        let mut feedback = CopyFeedback::default();
        feedback.copy(&clipboard, &block(0)).unwrap();
        feedback.copy(&clipboard, &block(2)).unwrap();
        assert_eq!(feedback.active(), Some(2));
    }

    #[tokio::test]
    async fn test_clipboard_failure_is_reported() {
        let mut feedback = CopyFeedback::default();
        assert!(feedback.copy(&BrokenClipboard, &block(0)).is_err());
        assert_eq!(feedback.active(), None);
    }
}
