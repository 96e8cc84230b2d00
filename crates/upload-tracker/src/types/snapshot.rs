//! Display snapshot and cached per-document pipeline state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::Instant;

use super::queue::{QueueItem, UploadStatus};

/// Status of a single pipeline step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Started,
    Completed,
    Failed,
}

impl StepStatus {
    /// Map a backend step status string
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "started" | "in_progress" | "running" | "processing" => Self::Started,
            "completed" | "complete" | "done" | "success" => Self::Completed,
            "failed" | "error" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// A named pipeline step with its status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingStep {
    pub name: String,
    pub status: StepStatus,
    pub message: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

/// Chunk and vector counters reported by the pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessingMetrics {
    pub chunks_retrieved: Option<u64>,
    pub chunks_filtered: Option<u64>,
    pub chunks_after_filtering: Option<u64>,
    pub vectors_stored: Option<u64>,
    pub total_blocks: Option<u64>,
}

impl ProcessingMetrics {
    /// Keep known values where `newer` has none
    pub fn merged_with(&self, newer: &ProcessingMetrics) -> ProcessingMetrics {
        ProcessingMetrics {
            chunks_retrieved: newer.chunks_retrieved.or(self.chunks_retrieved),
            chunks_filtered: newer.chunks_filtered.or(self.chunks_filtered),
            chunks_after_filtering: newer.chunks_after_filtering.or(self.chunks_after_filtering),
            vectors_stored: newer.vectors_stored.or(self.vectors_stored),
            total_blocks: newer.total_blocks.or(self.total_blocks),
        }
    }
}

/// An error surfaced to the user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineError {
    pub stage: String,
    pub message: String,
    pub timestamp: Option<String>,
    pub details: Option<Value>,
}

impl PipelineError {
    /// Error raised locally, stamped with the current time
    pub fn now(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            timestamp: Some(Utc::now().to_rfc3339()),
            details: None,
        }
    }
}

/// Last-known pipeline fields for one document.
///
/// Kept for every polled document so that promoting it to primary restores
/// what was already observed instead of waiting for the next fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentState {
    pub status: UploadStatus,
    pub processing_steps: Vec<ProcessingStep>,
    pub current_stage: Option<String>,
    pub current_step_label: String,
    pub metrics: ProcessingMetrics,
    pub errors: Vec<PipelineError>,
    pub chunk_count: Option<u64>,
    pub processing_time: Option<f64>,
    pub external_job_id: Option<String>,
}

impl DocumentState {
    /// Fold a newer observation into the cached one
    pub fn merge(&mut self, newer: DocumentState) {
        self.status = newer.status;
        if !newer.processing_steps.is_empty() {
            self.processing_steps = newer.processing_steps;
        }
        if newer.current_stage.is_some() {
            self.current_stage = newer.current_stage;
        }
        self.current_step_label = newer.current_step_label;
        self.metrics = self.metrics.merged_with(&newer.metrics);
        if !newer.errors.is_empty() {
            self.errors = newer.errors;
        }
        self.chunk_count = newer.chunk_count.or(self.chunk_count);
        self.processing_time = newer.processing_time.or(self.processing_time);
        self.external_job_id = newer.external_job_id.or(self.external_job_id.take());
    }
}

/// The single enriched view shown to the user
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DisplaySnapshot {
    pub key: String,
    pub file_name: String,
    pub document_id: Option<String>,
    pub property_id: Option<String>,
    pub status: UploadStatus,
    pub progress: u8,
    #[serde(skip)]
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: u64,
    pub error: Option<String>,
    pub processing_steps: Vec<ProcessingStep>,
    pub current_stage: Option<String>,
    pub current_step_label: String,
    pub metrics: ProcessingMetrics,
    pub errors: Vec<PipelineError>,
    pub chunk_count: Option<u64>,
    pub processing_time: Option<f64>,
    pub external_job_id: Option<String>,
}

impl DisplaySnapshot {
    /// Project a queue item with no pipeline detail yet
    pub fn from_item(item: &QueueItem, label: impl Into<String>, now: Instant) -> Self {
        Self {
            key: item.key.clone(),
            file_name: item.file_name.clone(),
            document_id: item.document_id.clone(),
            property_id: item.property_id.clone(),
            status: item.status,
            progress: item.progress,
            start_time: item.start_time,
            started_at: item.started_at,
            elapsed_secs: item.elapsed_secs(now),
            error: item.error.clone(),
            processing_steps: Vec::new(),
            current_stage: None,
            current_step_label: label.into(),
            metrics: ProcessingMetrics::default(),
            errors: Vec::new(),
            chunk_count: None,
            processing_time: None,
            external_job_id: None,
        }
    }

    /// Overlay cached pipeline fields
    pub fn apply_state(&mut self, state: &DocumentState) {
        self.status = state.status;
        self.processing_steps = state.processing_steps.clone();
        self.current_stage = state.current_stage.clone();
        self.current_step_label = state.current_step_label.clone();
        self.metrics = state.metrics.clone();
        self.errors = state.errors.clone();
        self.chunk_count = state.chunk_count;
        self.processing_time = state.processing_time;
        self.external_job_id = state.external_job_id.clone();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(label: &str) -> DocumentState {
        DocumentState {
            status: UploadStatus::Processing,
            processing_steps: Vec::new(),
            current_stage: None,
            current_step_label: label.to_string(),
            metrics: ProcessingMetrics::default(),
            errors: Vec::new(),
            chunk_count: None,
            processing_time: None,
            external_job_id: None,
        }
    }

    #[test]
    fn test_step_status_from_wire() {
        assert_eq!(StepStatus::from_wire("completed"), StepStatus::Completed);
        assert_eq!(StepStatus::from_wire("IN_PROGRESS"), StepStatus::Started);
        assert_eq!(StepStatus::from_wire("failed"), StepStatus::Failed);
        assert_eq!(StepStatus::from_wire("queued"), StepStatus::Pending);
    }

    #[test]
    fn test_merge_keeps_known_values() {
        let mut cached = state("Parsing document");
        cached.chunk_count = Some(10);
        cached.metrics.chunks_retrieved = Some(40);
        cached.external_job_id = Some("job-1".to_string());

        let mut newer = state("Chunking content");
        newer.metrics.vectors_stored = Some(8);
        cached.merge(newer);

        assert_eq!(cached.current_step_label, "Chunking content");
        assert_eq!(cached.chunk_count, Some(10));
        assert_eq!(cached.metrics.chunks_retrieved, Some(40));
        assert_eq!(cached.metrics.vectors_stored, Some(8));
        assert_eq!(cached.external_job_id.as_deref(), Some("job-1"));
    }

    #[test]
    fn test_apply_state_overlays_pipeline_fields() {
        let now = Instant::now();
        let item = QueueItem::new("a.pdf", None, now);
        let mut snapshot = DisplaySnapshot::from_item(&item, "Starting extraction", now);

        let mut cached = state("Generating embeddings");
        cached.chunk_count = Some(42);
        snapshot.apply_state(&cached);

        assert_eq!(snapshot.current_step_label, "Generating embeddings");
        assert_eq!(snapshot.chunk_count, Some(42));
        assert_eq!(snapshot.file_name, "a.pdf");
    }
}
