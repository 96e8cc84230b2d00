//! Interpretation of pipeline status responses
//!
//! Turns the backend's stage history into ordered steps, metrics, errors and a
//! human-readable label for the step currently running.

use serde_json::{Map, Value};

use crate::types::{
    DocumentState, PipelineError, PipelineProgress, PipelineStatus, ProcessingMetrics,
    ProcessingStep, StepStatus, UploadStatus,
};

/// Canonical order of pipeline stages, used to infer the next step
pub const STAGE_ORDER: &[&str] = &[
    "upload",
    "parsing",
    "extraction",
    "chunking",
    "filtering",
    "embedding",
    "storage",
];

pub const LABEL_INITIALIZING: &str = "Initializing";
pub const LABEL_FINALIZING: &str = "Finalizing";
pub const LABEL_COMPLETE: &str = "Processing complete";
pub const LABEL_FAILED: &str = "Processing failed";

const CHUNK_COUNT_KEYS: &[&str] = &["chunk_count", "total_chunks", "chunks_created"];
const DURATION_KEYS: &[&str] = &["processing_time", "processing_time_seconds", "duration_seconds"];

/// Terminal condition derived from the top-level status string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    InProgress,
    Succeeded,
    Failed,
}

impl PipelineOutcome {
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "completed" | "processed" => Self::Succeeded,
            "failed" => Self::Failed,
            _ => Self::InProgress,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }

    pub fn queue_status(self) -> UploadStatus {
        match self {
            Self::InProgress => UploadStatus::Processing,
            Self::Succeeded => UploadStatus::Complete,
            Self::Failed => UploadStatus::Error,
        }
    }
}

/// Result of interpreting one status response
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStatus {
    pub outcome: PipelineOutcome,
    pub state: DocumentState,
}

/// Interpret a status response
pub fn parse_status(response: &PipelineStatus) -> ParsedStatus {
    let outcome = PipelineOutcome::from_status(&response.status);
    let empty = PipelineProgress::default();
    let progress = response.pipeline_progress.as_ref().unwrap_or(&empty);

    let steps: Vec<ProcessingStep> = progress
        .history
        .iter()
        .map(|entry| ProcessingStep {
            name: entry.step_name.clone(),
            status: StepStatus::from_wire(&entry.step_status),
            message: entry.step_message.clone(),
            metadata: entry.step_metadata.clone(),
        })
        .collect();

    let chunk_count = latest_metadata(&steps, CHUNK_COUNT_KEYS).and_then(as_u64);
    let processing_time = latest_metadata(&steps, DURATION_KEYS).and_then(|v| v.as_f64());

    let current_stage = progress
        .current_stage
        .clone()
        .or_else(|| progress.current_step.clone())
        .or_else(|| started_step(&steps).map(|s| s.name.clone()));

    let current_step_label = match outcome {
        PipelineOutcome::Succeeded => LABEL_COMPLETE.to_string(),
        PipelineOutcome::Failed => LABEL_FAILED.to_string(),
        PipelineOutcome::InProgress => step_label(progress, &steps),
    };

    let details = progress.stage_details.clone().unwrap_or_default();
    let metrics = collect_metrics(progress);
    let errors = collect_errors(progress, current_stage.as_deref());

    ParsedStatus {
        outcome,
        state: DocumentState {
            status: outcome.queue_status(),
            processing_steps: steps,
            current_stage,
            current_step_label,
            metrics,
            errors,
            chunk_count,
            processing_time,
            external_job_id: details.external_job_id,
        },
    }
}

/// Label priority: current stage, current step, started step, inferred next
/// step after the last completed one, then a generic fallback.
pub fn step_label(progress: &PipelineProgress, steps: &[ProcessingStep]) -> String {
    if let Some(stage) = non_empty(progress.current_stage.as_deref()) {
        return stage_display(stage);
    }
    if let Some(step) = non_empty(progress.current_step.as_deref()) {
        return stage_display(step);
    }
    if let Some(step) = started_step(steps) {
        return stage_display(&step.name);
    }
    if let Some(done) = steps.iter().rev().find(|s| s.status == StepStatus::Completed) {
        return match next_stage(&done.name) {
            Some(next) => stage_display(next),
            None => LABEL_FINALIZING.to_string(),
        };
    }
    LABEL_INITIALIZING.to_string()
}

/// Display text for a stage name
pub fn stage_display(name: &str) -> String {
    match name.trim().to_lowercase().as_str() {
        "upload" | "uploading" => "Uploading file".to_string(),
        "parsing" | "parse" => "Parsing document".to_string(),
        "extraction" | "extract" => "Extracting content".to_string(),
        "chunking" | "chunk" => "Chunking content".to_string(),
        "filtering" | "filter" => "Filtering chunks".to_string(),
        "embedding" | "embed" => "Generating embeddings".to_string(),
        "storage" | "storing" => "Storing vectors".to_string(),
        "indexing" => "Indexing document".to_string(),
        _ => humanize(name),
    }
}

fn next_stage(name: &str) -> Option<&'static str> {
    let name = name.trim().to_lowercase();
    let position = STAGE_ORDER.iter().position(|stage| *stage == name)?;
    STAGE_ORDER.get(position + 1).copied()
}

fn humanize(name: &str) -> String {
    let spaced: String = name
        .trim()
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect();
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => LABEL_INITIALIZING.to_string(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn started_step(steps: &[ProcessingStep]) -> Option<&ProcessingStep> {
    steps.iter().rev().find(|s| s.status == StepStatus::Started)
}

fn latest_metadata<'a>(steps: &'a [ProcessingStep], keys: &[&str]) -> Option<&'a Value> {
    steps
        .iter()
        .rev()
        .filter_map(|step| step.metadata.as_ref())
        .find_map(|metadata| keys.iter().find_map(|key| metadata.get(*key)))
}

fn as_u64(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn metric(map: Option<&Map<String, Value>>, key: &str) -> Option<u64> {
    map.and_then(|m| m.get(key)).and_then(as_u64)
}

fn collect_metrics(progress: &PipelineProgress) -> ProcessingMetrics {
    let details = progress.stage_details.clone().unwrap_or_default();
    let extra = progress.metrics.as_ref();

    ProcessingMetrics {
        chunks_retrieved: details
            .chunks_retrieved
            .or_else(|| metric(extra, "chunks_retrieved")),
        chunks_filtered: details
            .chunks_filtered
            .or_else(|| metric(extra, "chunks_filtered")),
        chunks_after_filtering: details
            .chunks_after_filtering
            .or_else(|| metric(extra, "chunks_after_filtering")),
        vectors_stored: details
            .vectors_stored
            .or_else(|| metric(extra, "vectors_stored")),
        total_blocks: details.total_blocks.or_else(|| metric(extra, "total_blocks")),
    }
}

fn collect_errors(progress: &PipelineProgress, current_stage: Option<&str>) -> Vec<PipelineError> {
    let mut errors: Vec<PipelineError> = progress
        .errors
        .iter()
        .map(|entry| PipelineError {
            stage: entry.stage.clone(),
            message: entry.error.clone(),
            timestamp: entry.timestamp.clone(),
            details: entry.details.clone(),
        })
        .collect();

    if errors.is_empty() {
        let last_error = progress
            .stage_details
            .as_ref()
            .and_then(|d| non_empty(d.last_error.as_deref()));
        if let Some(message) = last_error {
            errors.push(PipelineError {
                stage: current_stage.unwrap_or("pipeline").to_string(),
                message: message.to_string(),
                timestamp: None,
                details: None,
            });
        }
    }

    errors
}
