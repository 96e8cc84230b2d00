//! Core types for upload tracking

pub mod pipeline;
pub mod queue;
pub mod snapshot;

pub use pipeline::{HistoryEntry, PipelineErrorEntry, PipelineProgress, PipelineStatus, StageDetails};
pub use queue::{QueueItem, UploadStatus};
pub use snapshot::{
    DisplaySnapshot, DocumentState, PipelineError, ProcessingMetrics, ProcessingStep, StepStatus,
};
