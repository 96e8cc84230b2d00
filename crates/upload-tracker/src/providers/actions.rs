//! User-triggered document commands

use async_trait::async_trait;

use crate::error::Result;

/// Collaborator notified when the user acts on a tracked document
///
/// No backend endpoint is confirmed for these commands yet, so the default
/// implementation only logs.
#[async_trait]
pub trait DocumentActions: Send + Sync {
    /// Abandon linking the document to its property
    async fn cancel_linking(&self, document_id: &str) -> Result<()>;

    /// Keep the stored file but skip pipeline extraction
    async fn store_without_extraction(&self, document_id: &str) -> Result<()>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Default collaborator that performs no backend call
#[derive(Debug, Clone, Default)]
pub struct NoopDocumentActions;

#[async_trait]
impl DocumentActions for NoopDocumentActions {
    async fn cancel_linking(&self, document_id: &str) -> Result<()> {
        tracing::debug!("cancel-linking for {} handled locally", document_id);
        Ok(())
    }

    async fn store_without_extraction(&self, document_id: &str) -> Result<()> {
        tracing::debug!("store-without-extraction for {} handled locally", document_id);
        Ok(())
    }

    fn name(&self) -> &str {
        "noop"
    }
}
