//! HTTP status client for the pipeline service

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::types::PipelineStatus;

use super::status::StatusClient;

/// Longest body excerpt carried into error messages
const MAX_ERROR_BODY: usize = 200;

/// Pipeline status client over HTTP
pub struct HttpStatusClient {
    client: Client,
    config: BackendConfig,
}

impl HttpStatusClient {
    /// Create a new client from backend configuration
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }
}

#[async_trait]
impl StatusClient for HttpStatusClient {
    async fn fetch_status(&self, document_id: &str) -> Result<PipelineStatus> {
        let url = self.config.status_url(document_id);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Error::backend(status.as_u16(), excerpt(&body)));
        }

        parse_status_body(document_id, &body)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Decode a status body, mapping decode failures to a malformed-response error
pub fn parse_status_body(document_id: &str, body: &str) -> Result<PipelineStatus> {
    serde_json::from_str(body).map_err(|e| Error::malformed(document_id, e.to_string()))
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_body() {
        let status = parse_status_body("D1", r#"{"status":"completed"}"#).unwrap();
        assert_eq!(status.status, "completed");
    }

    #[test]
    fn test_malformed_body() {
        let err = parse_status_body("D1", "<html>gateway timeout</html>").unwrap_err();
        match err {
            Error::MalformedResponse { document_id, .. } => assert_eq!(document_id, "D1"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(500);
        let short = excerpt(&long);
        assert!(short.ends_with("..."));
        assert_eq!(short.len(), MAX_ERROR_BODY + 3);
        assert_eq!(excerpt("  not found \n"), "not found");
    }

    #[test]
    fn test_client_uses_configured_url() {
        let config = BackendConfig {
            base_url: "http://pipeline:9000".to_string(),
            ..Default::default()
        };
        let client = HttpStatusClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://pipeline:9000");
        assert_eq!(client.name(), "http");
    }
}
