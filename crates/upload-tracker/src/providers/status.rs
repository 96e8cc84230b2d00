//! Status client trait for reading pipeline progress

use async_trait::async_trait;

use crate::error::Result;
use crate::types::PipelineStatus;

/// Trait for fetching a document's pipeline status
///
/// Implementations:
/// - `HttpStatusClient`: pipeline service over HTTP
#[async_trait]
pub trait StatusClient: Send + Sync {
    /// Fetch the current status of one document
    ///
    /// Transport failures and unparseable bodies are both errors; the poller
    /// counts them the same way.
    async fn fetch_status(&self, document_id: &str) -> Result<PipelineStatus>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
