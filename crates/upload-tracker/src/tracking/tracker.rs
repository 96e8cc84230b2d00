//! Upload tracking engine
//!
//! Owns the queue store, status poller, display multiplexer and timers, and
//! applies lifecycle signals, poll results and timer expiries to them. Every
//! operation takes the current instant so the engine itself never sleeps;
//! `TrackerService` drives it from a single task.

use serde::Serialize;
use tokio::time::Instant;

use crate::config::TrackerConfig;
use crate::error::Result;
use crate::events::UploadEvent;
use crate::types::{DisplaySnapshot, PipelineError, PipelineStatus, QueueItem, UploadStatus};

use super::display::{DisplayMultiplexer, LABEL_STARTING_EXTRACTION};
use super::parser::{parse_status, PipelineOutcome};
use super::poller::{FailureOutcome, StatusPoller};
use super::queue_store::QueueStore;
use super::timers::TimerManager;

pub const LABEL_UPLOADING: &str = "Uploading";
pub const LABEL_PROCESSING: &str = "Processing";
pub const LABEL_BACKGROUND: &str = "Processing in background";
pub const LABEL_UPLOAD_FAILED: &str = "Upload failed";
pub const LABEL_STORED_WITHOUT_EXTRACTION: &str = "Stored without extraction";

/// Single phrasing for every "file already exists" style message
pub const DUPLICATE_FILE_MESSAGE: &str = "This file has already been uploaded";

/// Published state: the primary snapshot plus the whole queue
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TrackerView {
    pub current: Option<DisplaySnapshot>,
    pub queue: Vec<QueueItem>,
}

/// Normalize a transport error message for display
pub fn normalize_error_message(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return LABEL_UPLOAD_FAILED.to_string();
    }
    let lower = trimmed.to_lowercase();
    if lower.contains("already exists")
        || lower.contains("already been uploaded")
        || lower.contains("duplicate")
    {
        return DUPLICATE_FILE_MESSAGE.to_string();
    }
    trimmed.to_string()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The tracking engine
pub struct Tracker {
    config: TrackerConfig,
    queue: QueueStore,
    poller: StatusPoller,
    display: DisplayMultiplexer,
    timers: TimerManager,
    /// Key of the snapshot the elapsed clock is timing
    clock_key: Option<String>,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        let poller = StatusPoller::new(
            config.polling.interval(),
            config.polling.max_consecutive_failures,
        );
        let timers = TimerManager::new(config.clock.tick());

        Self {
            config,
            queue: QueueStore::new(),
            poller,
            display: DisplayMultiplexer::new(),
            timers,
            clock_key: None,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn current_snapshot(&self) -> Option<&DisplaySnapshot> {
        self.display.current()
    }

    /// Every tracked item, oldest first
    pub fn queue(&self) -> Vec<QueueItem> {
        self.queue.list_all()
    }

    pub fn find(&self, key: &str) -> Option<&QueueItem> {
        self.queue.find(key)
    }

    pub fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    pub fn timers(&self) -> &TimerManager {
        &self.timers
    }

    pub fn view(&self) -> TrackerView {
        TrackerView {
            current: self.display.current().cloned(),
            queue: self.queue.list_all(),
        }
    }

    /// Earliest instant at which `advance` has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.timers.next_deadline(), self.poller.next_tick()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Apply an inbound lifecycle signal
    pub fn handle_event(&mut self, event: UploadEvent, now: Instant) {
        if event.file_name().trim().is_empty() {
            tracing::debug!("Ignoring '{}' upload event without a file name", event.kind());
            return;
        }

        match event {
            UploadEvent::Start {
                file_name,
                property_id,
            } => self.start(&file_name, property_id, now),
            UploadEvent::Progress { file_name, percent } => {
                self.progress(&file_name, percent, now)
            }
            UploadEvent::Complete {
                file_name,
                document_id,
                property_id,
            } => self.complete(&file_name, document_id, property_id, now),
            UploadEvent::Error { file_name, message } => self.error(&file_name, &message, now),
        }
    }

    /// A new upload began; it becomes the primary view
    pub fn start(&mut self, file_name: &str, property_id: Option<String>, now: Instant) {
        // A terminal primary that gets superseded leaves immediately.
        let superseded = self
            .display
            .current()
            .filter(|s| s.is_terminal() && s.key != file_name)
            .map(|s| s.key.clone());
        if let Some(key) = superseded {
            tracing::debug!("Removing superseded terminal upload {}", key);
            self.remove_item(&key);
        }

        if self.queue.remove(file_name).is_some() {
            tracing::debug!("Restarting tracked upload {}", file_name);
        }
        self.timers.cancel_scheduled_dismiss(file_name);

        let mut item = QueueItem::new(file_name, non_blank(property_id), now);
        item.label = Some(LABEL_UPLOADING.to_string());
        let snapshot = DisplaySnapshot::from_item(&item, LABEL_UPLOADING, now);
        self.queue.upsert(item);
        self.display.show(snapshot);

        tracing::info!("Upload started: {}", file_name);
        self.refresh_display(now);
    }

    /// Transport progress for an upload still keyed by file name
    pub fn progress(&mut self, file_name: &str, percent: f64, now: Instant) {
        let Some(item) = self.queue.find(file_name) else {
            tracing::debug!("Progress for untracked upload {}", file_name);
            return;
        };
        if item.status != UploadStatus::Uploading {
            return;
        }

        let percent = percent.clamp(0.0, 100.0).round() as u8;
        let reached_threshold = percent >= self.config.upload.processing_threshold;

        self.queue.update(file_name, |item| {
            item.progress = percent;
            if reached_threshold {
                item.label = Some(LABEL_PROCESSING.to_string());
            }
        });
        if reached_threshold {
            self.queue.set_status(file_name, UploadStatus::Processing);
            tracing::debug!("{} reached {}%, treating transport as done", file_name, percent);
        }

        if self.display.is_primary(file_name) {
            self.display.update(|s| {
                s.progress = percent;
                if reached_threshold {
                    s.status = UploadStatus::Processing;
                    s.current_step_label = LABEL_PROCESSING.to_string();
                }
            });
        }
        self.refresh_display(now);
    }

    /// Transport finished; begin polling when the backend assigned an id
    pub fn complete(
        &mut self,
        file_name: &str,
        document_id: Option<String>,
        property_id: Option<String>,
        now: Instant,
    ) {
        let document_id = non_blank(document_id);
        let property_id = non_blank(property_id);

        let key = if self.queue.contains(file_name) {
            file_name.to_string()
        } else if let Some(id) = document_id.as_deref().filter(|id| self.queue.contains(id)) {
            tracing::debug!("Duplicate completion for {}", id);
            return;
        } else {
            tracing::debug!("Completion for untracked upload {}, tracking it now", file_name);
            self.queue.upsert(QueueItem::new(file_name, property_id.clone(), now));
            file_name.to_string()
        };

        if self
            .queue
            .find(&key)
            .map(|item| item.status.is_terminal())
            .unwrap_or(true)
        {
            tracing::debug!("Ignoring completion for terminal upload {}", key);
            return;
        }

        self.timers.cancel_scheduled_dismiss(&key);
        self.queue.set_status(&key, UploadStatus::Processing);
        self.queue.update(&key, |item| {
            item.progress = 100;
            if property_id.is_some() {
                item.property_id = property_id.clone();
            }
            item.document_id = document_id.clone();
        });
        let was_primary = self.display.is_primary(&key);

        match document_id {
            Some(id) => {
                if id != key && self.queue.contains(&id) {
                    tracing::warn!("Document {} was already tracked; replacing it", id);
                    self.remove_item(&id);
                }
                self.queue.rekey(&key, &id);
                self.queue
                    .update(&id, |item| item.label = Some(LABEL_STARTING_EXTRACTION.to_string()));
                self.poller.register(&id, now);

                if was_primary {
                    self.display.update(|s| {
                        s.key = id.clone();
                        s.document_id = Some(id.clone());
                        s.status = UploadStatus::Processing;
                        s.progress = 100;
                        s.property_id = property_id.clone().or(s.property_id.take());
                        s.current_step_label = LABEL_STARTING_EXTRACTION.to_string();
                    });
                }
                tracing::info!("Upload complete: {} -> document {}", file_name, id);
            }
            None => {
                // Nothing to poll, so nothing can be confirmed.
                self.queue
                    .update(&key, |item| item.label = Some(LABEL_BACKGROUND.to_string()));
                self.timers
                    .schedule_dismiss(&key, self.config.dismissal.unconfirmed(), now);

                if was_primary {
                    self.display.update(|s| {
                        s.status = UploadStatus::Processing;
                        s.progress = 100;
                        s.current_step_label = LABEL_BACKGROUND.to_string();
                    });
                }
                tracing::info!("Upload complete without document id: {}", file_name);
            }
        }

        self.refresh_display(now);
    }

    /// Transport failure; only the first error per file is kept
    pub fn error(&mut self, file_name: &str, message: &str, now: Instant) {
        let message = normalize_error_message(message);

        let key = match self.queue.find_by_file_name(file_name) {
            Some(item) if item.status == UploadStatus::Error => {
                tracing::debug!("Duplicate error for {} suppressed", file_name);
                return;
            }
            Some(item) => {
                let key = item.key.clone();
                if let Some(id) = item.document_id.clone() {
                    self.poller.unregister(&id);
                }
                self.queue.update(&key, |item| {
                    item.error = Some(message.clone());
                    item.label = Some(LABEL_UPLOAD_FAILED.to_string());
                });
                self.queue.set_status(&key, UploadStatus::Error);
                key
            }
            None => {
                let mut item = QueueItem::new(file_name, None, now);
                item.status = UploadStatus::Error;
                item.error = Some(message.clone());
                item.label = Some(LABEL_UPLOAD_FAILED.to_string());
                self.queue.upsert(item);
                file_name.to_string()
            }
        };

        if self.display.is_primary(&key) {
            self.display.update(|s| {
                s.status = UploadStatus::Error;
                s.error = Some(message.clone());
                s.current_step_label = LABEL_UPLOAD_FAILED.to_string();
                s.errors.push(PipelineError::now("upload", message.clone()));
            });
        }

        self.timers
            .schedule_dismiss(&key, self.config.dismissal.failure(), now);
        tracing::warn!("Upload failed: {}: {}", file_name, message);
        self.refresh_display(now);
    }

    /// Fire due timers. Returns the document ids to fetch for this poll tick.
    pub fn advance(&mut self, now: Instant) -> Vec<String> {
        for key in self.timers.take_due_dismissals(now) {
            tracing::info!("Removing {} from the upload queue", key);
            self.remove_item(&key);
        }

        if let Some(secs) = self.timers.tick_clock(now) {
            self.display.update(|s| s.elapsed_secs = secs);
        }

        let ids = self.poller.tick(now);
        self.refresh_display(now);
        ids
    }

    /// Apply a resolved status fetch
    pub fn apply_poll_result(
        &mut self,
        document_id: &str,
        result: Result<PipelineStatus>,
        now: Instant,
    ) {
        if !self.poller.is_registered(document_id) {
            tracing::debug!("Discarding status for unregistered document {}", document_id);
            return;
        }
        if !self.queue.contains(document_id) {
            self.poller.forget(document_id);
            return;
        }

        match result {
            Ok(response) => self.apply_status(document_id, &response, now),
            Err(e) => self.apply_failure(document_id, &e.to_string(), now),
        }
        self.refresh_display(now);
    }

    fn apply_status(&mut self, document_id: &str, response: &PipelineStatus, now: Instant) {
        self.poller.record_success(document_id);

        let parsed = parse_status(response);
        let Some(state) = self.poller.store_state(document_id, parsed.state).cloned() else {
            return;
        };

        self.queue.set_status(document_id, parsed.outcome.queue_status());
        self.queue.update(document_id, |item| {
            item.label = Some(state.current_step_label.clone());
            if parsed.outcome == PipelineOutcome::Failed {
                item.error = state.errors.last().map(|e| e.message.clone());
            }
        });

        if self.display.is_displaying_document(document_id) {
            let status = self
                .queue
                .find(document_id)
                .map(|item| item.status)
                .unwrap_or(state.status);
            self.display.update(|s| {
                s.apply_state(&state);
                s.status = status;
                if parsed.outcome == PipelineOutcome::Failed {
                    s.error = state.errors.last().map(|e| e.message.clone());
                }
            });
        }

        if parsed.outcome.is_terminal() {
            self.poller.unregister(document_id);
            let delay = match parsed.outcome {
                PipelineOutcome::Failed => self.config.dismissal.failure(),
                _ => self.config.dismissal.success(),
            };
            self.timers.schedule_dismiss(document_id, delay, now);

            match parsed.outcome {
                PipelineOutcome::Failed => {
                    tracing::warn!("Pipeline failed for document {}", document_id)
                }
                _ => tracing::info!(
                    "Pipeline complete for document {} ({} chunks)",
                    document_id,
                    state.chunk_count.unwrap_or(0)
                ),
            }
        }
    }

    fn apply_failure(&mut self, document_id: &str, error: &str, now: Instant) {
        match self.poller.record_failure(document_id) {
            FailureOutcome::Retry { failures } => {
                tracing::warn!(
                    "Status fetch failed for {} ({}/{}): {}",
                    document_id,
                    failures,
                    self.config.polling.max_consecutive_failures,
                    error
                );
            }
            FailureOutcome::GaveUp { failures } => {
                tracing::warn!(
                    "Giving up on status for {} after {} failures; leaving it to the background",
                    document_id,
                    failures
                );
                // Never force-complete: success was not confirmed.
                self.queue.set_status(document_id, UploadStatus::Processing);
                self.queue
                    .update(document_id, |item| item.label = Some(LABEL_BACKGROUND.to_string()));
                if self.display.is_displaying_document(document_id) {
                    self.display
                        .update(|s| s.current_step_label = LABEL_BACKGROUND.to_string());
                }
                self.timers
                    .schedule_dismiss(document_id, self.config.dismissal.background(), now);
            }
        }
    }

    /// Hard reset: clears the view, polling, caches, counters, timers and queue
    pub fn dismiss(&mut self) {
        self.display.clear();
        self.poller.reset();
        self.timers.clear();
        self.queue.clear();
        self.clock_key = None;
        tracing::info!("Upload tracker dismissed; all tracking state cleared");
    }

    /// Queue item that was assigned this backend document id
    fn tracked_document(&self, document_id: &str) -> Option<&QueueItem> {
        self.queue
            .find(document_id)
            .filter(|item| item.document_id.as_deref() == Some(document_id))
    }

    /// Stop tracking a document and drop it from the queue
    pub fn cancel_linking(&mut self, document_id: &str, now: Instant) -> bool {
        if self.tracked_document(document_id).is_none() {
            tracing::debug!("cancel-linking ignored: no document {}", document_id);
            return false;
        }
        self.remove_item(document_id);
        tracing::info!("Cancelled linking for document {}", document_id);
        self.refresh_display(now);
        true
    }

    /// Stop polling a document the user chose to store without extraction
    /// Only documents still in the pipeline qualify; a terminal item keeps
    /// its own removal schedule.
    pub fn store_without_extraction(&mut self, document_id: &str, now: Instant) -> bool {
        let active = self
            .tracked_document(document_id)
            .map(|item| !item.status.is_terminal())
            .unwrap_or(false);
        if !active {
            tracing::debug!("store-without-extraction ignored for {}", document_id);
            return false;
        }
        self.poller.unregister(document_id);
        self.queue.update(document_id, |item| {
            item.label = Some(LABEL_STORED_WITHOUT_EXTRACTION.to_string())
        });
        if self.display.is_primary(document_id) {
            self.display
                .update(|s| s.current_step_label = LABEL_STORED_WITHOUT_EXTRACTION.to_string());
        }
        self.timers
            .schedule_dismiss(document_id, self.config.dismissal.background(), now);
        tracing::info!("Document {} stored without extraction", document_id);
        self.refresh_display(now);
        true
    }

    fn remove_item(&mut self, key: &str) {
        if let Some(item) = self.queue.remove(key) {
            if let Some(id) = item.document_id {
                self.poller.forget(&id);
            }
        }
        self.timers.cancel_scheduled_dismiss(key);
        if self.display.is_primary(key) {
            self.display.clear();
        }
    }

    fn refresh_display(&mut self, now: Instant) {
        self.display.retain_valid(&self.queue);
        self.display.select(&self.queue, &self.poller, now);
        self.sync_clock(now);
    }

    /// Run the elapsed clock only while a non-terminal snapshot is shown
    fn sync_clock(&mut self, now: Instant) {
        let current = self
            .display
            .current()
            .map(|s| (s.key.clone(), s.start_time, s.is_terminal()));

        match current {
            Some((key, start, false)) => {
                let timing_other = self.clock_key.as_deref() != Some(key.as_str());
                if timing_other || !self.timers.is_clock_running() {
                    let secs = self.timers.start_elapsed_clock(start, now);
                    self.display.update(|s| s.elapsed_secs = secs);
                    self.clock_key = Some(key);
                }
            }
            Some((_, start, true)) => {
                if self.timers.is_clock_running() {
                    let secs = now.saturating_duration_since(start).as_secs();
                    self.display.update(|s| s.elapsed_secs = secs);
                    self.timers.stop_elapsed_clock();
                }
                self.clock_key = None;
            }
            None => {
                self.timers.stop_elapsed_clock();
                self.clock_key = None;
            }
        }
    }
}
