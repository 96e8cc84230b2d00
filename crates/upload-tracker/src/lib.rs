//! upload-tracker: upload and processing-pipeline tracking with a single primary view
//!
//! Upload producers emit lifecycle signals (start, progress, complete, error) on
//! an event bus. The tracker keeps a queue of every in-flight upload, polls the
//! pipeline backend for each document it was handed, and maintains one enriched
//! snapshot for whichever upload currently has the user's attention. Finished
//! and failed items are removed on timers.

pub mod config;
pub mod error;
pub mod events;
pub mod providers;
pub mod server;
pub mod tracking;
pub mod types;

pub use config::TrackerConfig;
pub use error::{Error, Result};
pub use events::{UploadEvent, UploadEvents, UploadNotifier};
pub use providers::{DocumentActions, HttpStatusClient, NoopDocumentActions, StatusClient};
pub use tracking::{Tracker, TrackerHandle, TrackerService, TrackerView};
pub use types::{DisplaySnapshot, PipelineStatus, QueueItem, UploadStatus};
