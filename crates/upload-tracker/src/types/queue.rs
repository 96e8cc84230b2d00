//! Queue item types for tracked uploads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Lifecycle status of a tracked document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// Bytes are moving from the client to storage
    Uploading,
    /// Transport is done, the pipeline is working on it
    Processing,
    /// Pipeline confirmed success
    Complete,
    /// Transport or pipeline failure
    Error,
}

impl UploadStatus {
    /// Complete and Error are terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Uploading => 0,
            Self::Processing => 1,
            Self::Complete => 2,
            Self::Error => 3,
        }
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// Status only moves forward. A terminal status is never replaced by
    /// anything except `Error`, which may always be forced.
    pub fn can_transition_to(self, next: UploadStatus) -> bool {
        if next == Self::Error {
            return true;
        }
        if self.is_terminal() {
            return self == next;
        }
        next.rank() >= self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked document's transport/processing record
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueueItem {
    /// File name until a document id is assigned, then the document id
    pub key: String,
    /// Original file name
    pub file_name: String,
    /// Stable document identifier, assigned once transport completes
    pub document_id: Option<String>,
    /// Owning property, if the producer supplied one
    pub property_id: Option<String>,
    pub status: UploadStatus,
    /// Transport percent (0-100), meaningful while uploading
    pub progress: u8,
    /// Monotonic start instant, used for ordering and elapsed time
    #[serde(skip)]
    pub start_time: Instant,
    /// Wall-clock start time for display
    pub started_at: DateTime<Utc>,
    /// Last human-readable error
    pub error: Option<String>,
    /// Current human-readable step label
    pub label: Option<String>,
}

impl QueueItem {
    /// Create a freshly started upload
    pub fn new(file_name: impl Into<String>, property_id: Option<String>, now: Instant) -> Self {
        let file_name = file_name.into();
        Self {
            key: file_name.clone(),
            file_name,
            document_id: None,
            property_id,
            status: UploadStatus::Uploading,
            progress: 0,
            start_time: now,
            started_at: Utc::now(),
            error: None,
            label: None,
        }
    }

    /// Seconds elapsed since the upload started
    pub fn elapsed_secs(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.start_time).as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(UploadStatus::Uploading.can_transition_to(UploadStatus::Processing));
        assert!(UploadStatus::Processing.can_transition_to(UploadStatus::Complete));
        assert!(UploadStatus::Processing.can_transition_to(UploadStatus::Processing));
        assert!(!UploadStatus::Processing.can_transition_to(UploadStatus::Uploading));
    }

    #[test]
    fn test_terminal_is_sticky_except_error() {
        assert!(!UploadStatus::Complete.can_transition_to(UploadStatus::Processing));
        assert!(!UploadStatus::Complete.can_transition_to(UploadStatus::Uploading));
        assert!(!UploadStatus::Error.can_transition_to(UploadStatus::Complete));
        assert!(!UploadStatus::Error.can_transition_to(UploadStatus::Processing));
        assert!(UploadStatus::Complete.can_transition_to(UploadStatus::Error));
        assert!(UploadStatus::Uploading.can_transition_to(UploadStatus::Error));
    }

    #[test]
    fn test_new_item_is_keyed_by_file_name() {
        let item = QueueItem::new("a.pdf", Some("P1".to_string()), Instant::now());
        assert_eq!(item.key, "a.pdf");
        assert_eq!(item.status, UploadStatus::Uploading);
        assert_eq!(item.progress, 0);
        assert!(item.document_id.is_none());
    }
}
