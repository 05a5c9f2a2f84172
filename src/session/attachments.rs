//! Files attached to the next outgoing question.

use tracing::{info, warn};

use crate::chat::ids::FileId;
use crate::client::error::ClientResult;
use crate::client::transport::ChatBackend;
use crate::client::types::{FileRef, FileUpload};

/// Upload progress of an attachment.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum UploadStatus {
    /// Upload in flight.
    Uploading,
    /// Stored by the backend.
    Done,
    /// Upload failed; the file will not be referenced.
    Failed,
}

impl UploadStatus {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Done => "done",
            Self::Failed => "error",
        }
    }
}

/// A file waiting to be sent with the next question.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingAttachment {
    /// Temporary id while uploading, backend id once done.
    pub id: FileId,
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type.
    pub mime: String,
    /// Upload progress.
    pub status: UploadStatus,
}

impl PendingAttachment {
    /// Payload reference, only for files the backend stored.
    #[must_use]
    pub fn file_ref(&self) -> Option<FileRef> {
        (self.status == UploadStatus::Done).then(|| FileRef {
            id: self.id.clone(),
            name: self.name.clone(),
            size: self.size,
            mime: self.mime.clone(),
        })
    }

    /// Size for display.
    #[must_use]
    pub fn display_size(&self) -> String {
        format_file_size(self.size)
    }
}

/// Ordered set of pending attachments.
#[derive(Clone, Debug, Default)]
pub struct AttachmentTray {
    items: Vec<PendingAttachment>,
}

impl AttachmentTray {
    /// Empty tray.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Attachments in the order they were added.
    #[must_use]
    pub fn items(&self) -> &[PendingAttachment] {
        &self.items
    }

    /// Whether nothing is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether an upload is still in flight.
    #[must_use]
    pub fn has_pending_uploads(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.status == UploadStatus::Uploading)
    }

    /// Add a file in `Uploading` state and return its temporary id.
    pub fn begin(&mut self, file: &FileUpload) -> FileId {
        let id = FileId::temporary();
        self.items.push(PendingAttachment {
            id: id.clone(),
            name: file.name.clone(),
            size: file.size(),
            mime: file.mime.clone(),
            status: UploadStatus::Uploading,
        });
        id
    }

    /// Record the outcome of an upload started with [`AttachmentTray::begin`].
    ///
    /// Returns the new status, or `None` if the file was removed meanwhile.
    pub fn resolve(&mut self, temporary: &FileId, outcome: ClientResult<FileId>) -> Option<UploadStatus> {
        let item = self.items.iter_mut().find(|item| &item.id == temporary)?;
        match outcome {
            Ok(id) => {
                info!(file = %item.name, file_id = %id, "attachment ready");
                item.id = id;
                item.status = UploadStatus::Done;
            }
            Err(err) => {
                warn!(file = %item.name, %err, "attachment upload failed");
                item.status = UploadStatus::Failed;
            }
        }
        Some(item.status)
    }

    /// Upload `file` and track it. A failed upload stays in the tray marked
    /// `Failed`; it never aborts anything else.
    pub async fn upload<B>(&mut self, backend: &B, file: FileUpload) -> UploadStatus
    where
        B: ChatBackend + ?Sized,
    {
        let temporary = self.begin(&file);
        let outcome = backend.upload_file(file).await;
        self.resolve(&temporary, outcome)
            .unwrap_or(UploadStatus::Failed)
    }

    /// Remove an attachment unless its upload is in flight.
    pub fn remove(&mut self, id: &FileId) -> bool {
        let Some(index) = self
            .items
            .iter()
            .position(|item| &item.id == id && item.status != UploadStatus::Uploading)
        else {
            return false;
        };
        self.items.remove(index);
        true
    }

    /// Empty the tray, returning its contents.
    pub fn take(&mut self) -> Vec<PendingAttachment> {
        std::mem::take(&mut self.items)
    }
}

/// Human readable size: `0 Bytes`, `512.00 Bytes`, `1.50 KB`, ...
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::error::ClientError;

    fn file(name: &str) -> FileUpload {
        FileUpload {
            name: name.to_string(),
            mime: "text/plain".to_string(),
            bytes: b"hello".to_vec(),
        }
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512.00 Bytes");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024 * 1024), "3072.00 GB");
    }

    #[test]
    fn test_resolve_success_swaps_id() {
        let mut tray = AttachmentTray::new();
        let temp = tray.begin(&file("a.txt"));
        assert!(tray.has_pending_uploads());
        assert!(temp.is_temporary());

        let status = tray.resolve(&temp, Ok(FileId::new("f1")));
        assert_eq!(status, Some(UploadStatus::Done));
        let item = &tray.items()[0];
        assert_eq!(item.id, FileId::new("f1"));
        assert_eq!(item.file_ref().map(|r| r.size), Some(5));
    }

    #[test]
    fn test_resolve_failure_marks_failed() {
        let mut tray = AttachmentTray::new();
        let temp = tray.begin(&file("a.txt"));
        let status = tray.resolve(&temp, Err(ClientError::Malformed("boom".to_string())));
        assert_eq!(status, Some(UploadStatus::Failed));
        assert!(tray.items()[0].file_ref().is_none());
    }

    #[test]
    fn test_remove_refuses_in_flight_uploads() {
        let mut tray = AttachmentTray::new();
        let temp = tray.begin(&file("a.txt"));
        assert!(!tray.remove(&temp));
        tray.resolve(&temp, Err(ClientError::Malformed("x".to_string())));
        assert!(tray.remove(&temp));
        assert!(tray.is_empty());
    }

    #[test]
    fn test_take_empties_tray() {
        let mut tray = AttachmentTray::new();
        tray.begin(&file("a.txt"));
        tray.begin(&file("b.txt"));
        let taken = tray.take();
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[1].name, "b.txt");
        assert!(tray.is_empty());
    }
}
