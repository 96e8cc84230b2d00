//! Wire types for the pipeline status endpoint

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-document status as reported by the pipeline service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineStatus {
    /// Top-level status string (`completed`, `processed`, `failed`, ...)
    pub status: String,
    #[serde(default)]
    pub pipeline_progress: Option<PipelineProgress>,
}

impl PipelineStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            pipeline_progress: None,
        }
    }

    pub fn with_progress(mut self, progress: PipelineProgress) -> Self {
        self.pipeline_progress = Some(progress);
        self
    }
}

/// Stage history and details of a running pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineProgress {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub stage_details: Option<StageDetails>,
    #[serde(default)]
    pub errors: Vec<PipelineErrorEntry>,
    /// Free-form metrics object
    #[serde(default)]
    pub metrics: Option<Map<String, Value>>,
}

/// One entry of the stage history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub step_name: String,
    pub step_status: String,
    #[serde(default)]
    pub step_message: Option<String>,
    #[serde(default)]
    pub step_metadata: Option<Map<String, Value>>,
}

impl HistoryEntry {
    pub fn new(step_name: impl Into<String>, step_status: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            step_status: step_status.into(),
            step_message: None,
            step_metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        if let Value::Object(map) = metadata {
            self.step_metadata = Some(map);
        }
        self
    }
}

/// Counters and identifiers for the current stage
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StageDetails {
    #[serde(default)]
    pub chunks_retrieved: Option<u64>,
    #[serde(default)]
    pub chunks_after_filtering: Option<u64>,
    #[serde(default)]
    pub chunks_filtered: Option<u64>,
    #[serde(default)]
    pub total_blocks: Option<u64>,
    #[serde(default)]
    pub vectors_stored: Option<u64>,
    #[serde(default)]
    pub external_job_id: Option<String>,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Error reported by a pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineErrorEntry {
    pub stage: String,
    pub error: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_body() {
        let status: PipelineStatus = serde_json::from_str(r#"{"status":"processing"}"#).unwrap();
        assert_eq!(status.status, "processing");
        assert!(status.pipeline_progress.is_none());
    }

    #[test]
    fn test_full_body() {
        let body = r#"{
            "status": "processing",
            "pipeline_progress": {
                "history": [
                    {"step_name": "parsing", "step_status": "completed", "step_metadata": {"total_blocks": 12}},
                    {"step_name": "chunking", "step_status": "started", "step_message": "splitting"}
                ],
                "current_stage": "chunking",
                "stage_details": {"chunks_retrieved": 40, "external_job_id": "job-7"},
                "errors": [{"stage": "parsing", "error": "page 3 unreadable"}],
                "metrics": {"vectors_stored": 0}
            }
        }"#;

        let status: PipelineStatus = serde_json::from_str(body).unwrap();
        let progress = status.pipeline_progress.unwrap();
        assert_eq!(progress.history.len(), 2);
        assert_eq!(progress.history[1].step_message.as_deref(), Some("splitting"));
        assert_eq!(progress.current_stage.as_deref(), Some("chunking"));
        let details = progress.stage_details.unwrap();
        assert_eq!(details.chunks_retrieved, Some(40));
        assert_eq!(details.external_job_id.as_deref(), Some("job-7"));
        assert_eq!(progress.errors[0].error, "page 3 unreadable");
    }

    #[test]
    fn test_missing_status_is_rejected() {
        let result = serde_json::from_str::<PipelineStatus>(r#"{"pipeline_progress":{}}"#);
        assert!(result.is_err());
    }
}
