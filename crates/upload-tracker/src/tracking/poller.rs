//! Status poller: registration, shared tick, failure counting and the
//! per-document state cache.
//!
//! All per-document bookkeeping (polling flag, consecutive failures, cached
//! pipeline state) lives in one table owned by the poller.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::types::DocumentState;

/// Per-document bookkeeping
#[derive(Debug, Clone, Default)]
pub struct DocumentEntry {
    /// Whether fetches are issued for this document
    pub polling: bool,
    /// Consecutive failed fetches, reset on success
    pub consecutive_failures: u32,
    /// Last observed pipeline fields
    pub state: Option<DocumentState>,
}

/// Table of tracked documents keyed by document id
#[derive(Debug, Default)]
pub struct DocumentTable {
    entries: HashMap<String, DocumentEntry>,
}

impl DocumentTable {
    pub fn insert(&mut self, document_id: &str) -> &mut DocumentEntry {
        self.entries.entry(document_id.to_string()).or_default()
    }

    pub fn update<F>(&mut self, document_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut DocumentEntry),
    {
        match self.entries.get_mut(document_id) {
            Some(entry) => {
                f(entry);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, document_id: &str) -> Option<&DocumentEntry> {
        self.entries.get(document_id)
    }

    pub fn remove(&mut self, document_id: &str) -> Option<DocumentEntry> {
        self.entries.remove(document_id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn polling_ids(&self) -> impl Iterator<Item = &String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.polling)
            .map(|(id, _)| id)
    }
}

/// Outcome of recording a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Below the threshold; retry on the next tick
    Retry { failures: u32 },
    /// Threshold reached; the document has been unregistered
    GaveUp { failures: u32 },
}

/// Fixed-period fan-out poller
#[derive(Debug)]
pub struct StatusPoller {
    table: DocumentTable,
    period: Duration,
    max_failures: u32,
    next_tick: Option<Instant>,
}

impl StatusPoller {
    pub fn new(period: Duration, max_failures: u32) -> Self {
        Self {
            table: DocumentTable::default(),
            period,
            max_failures: max_failures.max(1),
            next_tick: None,
        }
    }

    /// Start polling a document. The shared tick starts if it was idle.
    pub fn register(&mut self, document_id: &str, now: Instant) {
        let entry = self.table.insert(document_id);
        entry.polling = true;
        entry.consecutive_failures = 0;

        if self.next_tick.is_none() {
            self.next_tick = Some(now + self.period);
            tracing::debug!("Status poll timer started");
        }
        tracing::info!("Polling pipeline status for {}", document_id);
    }

    /// Stop polling a document. Safe to call repeatedly. Cached state is kept.
    pub fn unregister(&mut self, document_id: &str) {
        let was_polling = self
            .table
            .get(document_id)
            .map(|entry| entry.polling)
            .unwrap_or(false);
        self.table.update(document_id, |entry| entry.polling = false);

        if was_polling {
            tracing::debug!("Stopped polling {}", document_id);
        }
        self.stop_timer_if_idle();
    }

    /// Drop everything known about a document
    pub fn forget(&mut self, document_id: &str) {
        self.table.remove(document_id);
        self.stop_timer_if_idle();
    }

    /// Unregister every document and clear all caches and counters
    pub fn reset(&mut self) {
        self.table.clear();
        self.next_tick = None;
    }

    pub fn is_registered(&self, document_id: &str) -> bool {
        self.table
            .get(document_id)
            .map(|entry| entry.polling)
            .unwrap_or(false)
    }

    pub fn registered_count(&self) -> usize {
        self.table.polling_ids().count()
    }

    pub fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Fire the shared tick if due. Returns the ids to fetch, sorted.
    pub fn tick(&mut self, now: Instant) -> Vec<String> {
        match self.next_tick {
            Some(due) if due <= now => {}
            _ => return Vec::new(),
        }

        let mut ids: Vec<String> = self.table.polling_ids().cloned().collect();
        ids.sort();

        self.next_tick = if ids.is_empty() {
            None
        } else {
            Some(now + self.period)
        };
        ids
    }

    /// Reset the failure counter after a successful fetch
    pub fn record_success(&mut self, document_id: &str) {
        self.table
            .update(document_id, |entry| entry.consecutive_failures = 0);
    }

    /// Count a failed fetch; unregisters the document once the threshold is hit
    pub fn record_failure(&mut self, document_id: &str) -> FailureOutcome {
        let max_failures = self.max_failures;
        let mut failures = 0;
        self.table.update(document_id, |entry| {
            entry.consecutive_failures += 1;
            failures = entry.consecutive_failures;
        });

        if failures >= max_failures {
            self.unregister(document_id);
            FailureOutcome::GaveUp { failures }
        } else {
            FailureOutcome::Retry { failures }
        }
    }

    pub fn failures(&self, document_id: &str) -> u32 {
        self.table
            .get(document_id)
            .map(|entry| entry.consecutive_failures)
            .unwrap_or(0)
    }

    /// Fold a new observation into the document's cached state
    pub fn store_state(&mut self, document_id: &str, state: DocumentState) -> Option<&DocumentState> {
        let entry = self.table.insert(document_id);
        entry.state = match entry.state.take() {
            Some(mut cached) => {
                cached.merge(state);
                Some(cached)
            }
            None => Some(state),
        };
        entry.state.as_ref()
    }

    pub fn cached_state(&self, document_id: &str) -> Option<&DocumentState> {
        self.table.get(document_id).and_then(|entry| entry.state.as_ref())
    }

    fn stop_timer_if_idle(&mut self) {
        if self.next_tick.is_some() && self.registered_count() == 0 {
            self.next_tick = None;
            tracing::debug!("Status poll timer stopped: no registered documents");
        }
    }
}
