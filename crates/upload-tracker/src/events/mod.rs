//! Upload lifecycle signals and the channel that carries them
//!
//! Producers elsewhere in the application hold an [`UploadNotifier`] and emit
//! the four lifecycle signals. The tracker subscribes through the
//! [`UploadEvents`] bus it is constructed with, so there is no global target.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Inbound upload lifecycle signal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadEvent {
    Start {
        file_name: String,
        #[serde(default)]
        property_id: Option<String>,
    },
    Progress {
        file_name: String,
        percent: f64,
    },
    Complete {
        file_name: String,
        #[serde(default)]
        document_id: Option<String>,
        #[serde(default)]
        property_id: Option<String>,
    },
    Error {
        file_name: String,
        #[serde(default)]
        message: String,
    },
}

impl UploadEvent {
    pub fn file_name(&self) -> &str {
        match self {
            Self::Start { file_name, .. }
            | Self::Progress { file_name, .. }
            | Self::Complete { file_name, .. }
            | Self::Error { file_name, .. } => file_name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Progress { .. } => "progress",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }
}

/// Broadcast bus for upload lifecycle signals
#[derive(Clone)]
pub struct UploadEvents {
    sender: broadcast::Sender<UploadEvent>,
}

impl UploadEvents {
    /// Create a new bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Handle for a producer
    pub fn notifier(&self) -> UploadNotifier {
        UploadNotifier {
            sender: self.sender.clone(),
        }
    }

    /// Receiver for a consumer
    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.sender.subscribe()
    }
}

/// Producer-side handle for emitting lifecycle signals
#[derive(Clone)]
pub struct UploadNotifier {
    sender: broadcast::Sender<UploadEvent>,
}

impl UploadNotifier {
    /// Publish an event. Returns the number of subscribers that will see it.
    pub fn publish(&self, event: UploadEvent) -> usize {
        let kind = event.kind();
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!("Dropped '{}' upload event: no subscribers", kind);
                0
            }
        }
    }

    pub fn start(&self, file_name: impl Into<String>, property_id: Option<String>) {
        self.publish(UploadEvent::Start {
            file_name: file_name.into(),
            property_id,
        });
    }

    pub fn progress(&self, file_name: impl Into<String>, percent: f64) {
        self.publish(UploadEvent::Progress {
            file_name: file_name.into(),
            percent,
        });
    }

    pub fn complete(
        &self,
        file_name: impl Into<String>,
        document_id: Option<String>,
        property_id: Option<String>,
    ) {
        self.publish(UploadEvent::Complete {
            file_name: file_name.into(),
            document_id,
            property_id,
        });
    }

    pub fn error(&self, file_name: impl Into<String>, message: impl Into<String>) {
        self.publish(UploadEvent::Error {
            file_name: file_name.into(),
            message: message.into(),
        });
    }
}
