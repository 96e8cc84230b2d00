//! Display multiplexer: the single primary snapshot

use tokio::time::Instant;

use crate::types::DisplaySnapshot;

use super::poller::StatusPoller;
use super::queue_store::QueueStore;

/// Label shown for a document whose pipeline state has not been observed yet
pub const LABEL_STARTING_EXTRACTION: &str = "Starting extraction";

/// Holds at most one displayed snapshot
#[derive(Debug, Default)]
pub struct DisplayMultiplexer {
    current: Option<DisplaySnapshot>,
}

impl DisplayMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&DisplaySnapshot> {
        self.current.as_ref()
    }

    pub fn current_key(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.key.as_str())
    }

    pub fn is_primary(&self, key: &str) -> bool {
        self.current_key() == Some(key)
    }

    /// Whether the displayed snapshot belongs to this document id
    pub fn is_displaying_document(&self, document_id: &str) -> bool {
        self.current
            .as_ref()
            .and_then(|s| s.document_id.as_deref())
            == Some(document_id)
    }

    /// Replace the displayed snapshot
    pub fn show(&mut self, snapshot: DisplaySnapshot) -> Option<DisplaySnapshot> {
        self.current.replace(snapshot)
    }

    pub fn clear(&mut self) -> Option<DisplaySnapshot> {
        self.current.take()
    }

    /// Mutate the displayed snapshot, if any
    pub fn update<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&mut DisplaySnapshot),
    {
        match self.current.as_mut() {
            Some(snapshot) => {
                f(snapshot);
                true
            }
            None => false,
        }
    }

    /// Drop the snapshot if its item is no longer in the queue
    pub fn retain_valid(&mut self, queue: &QueueStore) -> bool {
        match self.current_key() {
            Some(key) if !queue.contains(key) => {
                self.current = None;
                false
            }
            _ => true,
        }
    }

    /// Pick a new primary when nothing is displayed.
    ///
    /// The oldest item still processing with a document id wins; its snapshot
    /// is rebuilt from cached pipeline state when there is any. Returns true
    /// when a new primary was selected.
    pub fn select(&mut self, queue: &QueueStore, poller: &StatusPoller, now: Instant) -> bool {
        if self.current.is_some() {
            return false;
        }

        let Some(item) = queue.oldest_processing() else {
            return false;
        };

        let label = item
            .label
            .clone()
            .unwrap_or_else(|| LABEL_STARTING_EXTRACTION.to_string());
        let mut snapshot = DisplaySnapshot::from_item(item, label, now);

        if let Some(state) = item.document_id.as_deref().and_then(|id| poller.cached_state(id)) {
            snapshot.apply_state(state);
            // Queue status is authoritative; the cache may predate a degrade.
            snapshot.status = item.status;
            if let Some(label) = &item.label {
                snapshot.current_step_label = label.clone();
            }
        }

        tracing::info!("Primary upload view switched to {}", snapshot.key);
        self.current = Some(snapshot);
        true
    }
}
