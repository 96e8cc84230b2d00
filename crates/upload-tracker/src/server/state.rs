//! Application state for the tracker server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::TrackerConfig;
use crate::events::{UploadEvents, UploadNotifier};
use crate::providers::{DocumentActions, StatusClient};
use crate::tracking::{TrackerHandle, TrackerService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: TrackerConfig,
    /// Handle to the running tracker
    tracker: TrackerHandle,
    /// Producer side of the event bus
    notifier: UploadNotifier,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Start the tracker and wire it to a fresh event bus
    pub fn new(
        config: TrackerConfig,
        client: Arc<dyn StatusClient>,
        actions: Arc<dyn DocumentActions>,
    ) -> Self {
        tracing::info!("Initializing upload tracker state...");

        let events = UploadEvents::new(config.events.channel_capacity);
        let notifier = events.notifier();
        let tracker = TrackerService::spawn(config.clone(), client, actions, events.subscribe());
        tracing::info!(
            "Tracker running (poll interval {}ms, backend {})",
            config.polling.interval_ms,
            config.backend.base_url
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                tracker,
                notifier,
                ready: RwLock::new(true),
            }),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    pub fn tracker(&self) -> &TrackerHandle {
        &self.inner.tracker
    }

    pub fn notifier(&self) -> &UploadNotifier {
        &self.inner.notifier
    }

    /// Check if ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read() && self.inner.tracker.is_running()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
