//! End-to-end tracker runs on a paused clock with a scripted status backend

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use upload_tracker::types::{HistoryEntry, PipelineProgress};
use upload_tracker::{
    DocumentActions, Error, NoopDocumentActions, PipelineStatus, Result, StatusClient,
    TrackerConfig, TrackerHandle, TrackerService, UploadEvents, UploadNotifier, UploadStatus,
};

#[derive(Clone)]
enum Reply {
    Status(PipelineStatus),
    Delayed(Duration, PipelineStatus),
    Fail,
}

/// Replies are consumed in order; the last one repeats
#[derive(Default)]
struct ScriptedClient {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn script(&self, document_id: &str, replies: Vec<Reply>) {
        self.scripts
            .lock()
            .insert(document_id.to_string(), replies.into());
    }

    fn calls_for(&self, document_id: &str) -> usize {
        self.calls.lock().iter().filter(|id| *id == document_id).count()
    }
}

#[async_trait]
impl StatusClient for ScriptedClient {
    async fn fetch_status(&self, document_id: &str) -> Result<PipelineStatus> {
        self.calls.lock().push(document_id.to_string());
        let reply = {
            let mut scripts = self.scripts.lock();
            match scripts.get_mut(document_id) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Status(status)) => Ok(status),
            Some(Reply::Delayed(delay, status)) => {
                tokio::time::sleep(delay).await;
                Ok(status)
            }
            Some(Reply::Fail) | None => Err(Error::backend(503, "unavailable")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
struct RecordingActions {
    cancelled: Mutex<Vec<String>>,
    stored: Mutex<Vec<String>>,
}

#[async_trait]
impl DocumentActions for RecordingActions {
    async fn cancel_linking(&self, document_id: &str) -> Result<()> {
        self.cancelled.lock().push(document_id.to_string());
        Ok(())
    }

    async fn store_without_extraction(&self, document_id: &str) -> Result<()> {
        self.stored.lock().push(document_id.to_string());
        Err(Error::backend(500, "extraction toggle not supported"))
    }

    fn name(&self) -> &str {
        "recording"
    }
}

struct Harness {
    notifier: UploadNotifier,
    handle: TrackerHandle,
    client: Arc<ScriptedClient>,
    t0: Instant,
}

impl Harness {
    fn new() -> Self {
        Self::with_actions(Arc::new(NoopDocumentActions))
    }

    fn with_actions(actions: Arc<dyn DocumentActions>) -> Self {
        let client = Arc::new(ScriptedClient::default());
        let events = UploadEvents::new(64);
        let handle = TrackerService::spawn(
            TrackerConfig::default(),
            client.clone(),
            actions,
            events.subscribe(),
        );
        Self {
            notifier: events.notifier(),
            handle,
            client,
            t0: Instant::now(),
        }
    }

    async fn at_ms(&self, ms: u64) {
        tokio::time::sleep_until(self.t0 + Duration::from_millis(ms)).await;
    }

    fn upload(&self, file: &str, document_id: &str) {
        self.notifier.start(file, None);
        self.notifier.progress(file, 95.0);
        self.notifier
            .complete(file, Some(document_id.to_string()), None);
    }

    fn tracked(&self, key: &str) -> Option<UploadStatus> {
        self.handle
            .queue()
            .into_iter()
            .find(|item| item.key == key)
            .map(|item| item.status)
    }
}

fn in_stage(stage: &str) -> PipelineStatus {
    PipelineStatus::new("processing").with_progress(PipelineProgress {
        current_stage: Some(stage.to_string()),
        ..Default::default()
    })
}

fn completed_with_chunks(chunks: u64) -> PipelineStatus {
    PipelineStatus::new("completed").with_progress(PipelineProgress {
        history: vec![
            HistoryEntry::new("chunking", "completed").with_metadata(json!({ "chunk_count": chunks })),
            HistoryEntry::new("storage", "completed"),
        ],
        ..Default::default()
    })
}

#[tokio::test(start_paused = true)]
async fn test_single_upload_completes_and_is_removed() {
    let h = Harness::new();
    h.client.script(
        "D1",
        vec![
            Reply::Status(in_stage("parsing")),
            Reply::Status(completed_with_chunks(42)),
        ],
    );

    h.notifier.start("a.pdf", Some("P1".to_string()));
    h.notifier.progress("a.pdf", 50.0);
    h.at_ms(10).await;
    let snapshot = h.handle.current_snapshot().unwrap();
    assert_eq!(snapshot.status, UploadStatus::Uploading);
    assert_eq!(snapshot.progress, 50);

    h.notifier.progress("a.pdf", 95.0);
    h.notifier.complete("a.pdf", Some("D1".to_string()), None);
    h.at_ms(20).await;
    let snapshot = h.handle.current_snapshot().unwrap();
    assert_eq!(snapshot.key, "D1");
    assert_eq!(snapshot.status, UploadStatus::Processing);
    assert_eq!(snapshot.current_step_label, "Starting extraction");

    // Polling began at 10ms, so ticks land at 1010ms, 2010ms, ...
    h.at_ms(1_050).await;
    assert_eq!(
        h.handle.current_snapshot().unwrap().current_step_label,
        "Parsing document"
    );

    h.at_ms(2_050).await;
    let snapshot = h.handle.current_snapshot().unwrap();
    assert_eq!(snapshot.status, UploadStatus::Complete);
    assert_eq!(snapshot.chunk_count, Some(42));
    assert_eq!(h.tracked("D1"), Some(UploadStatus::Complete));

    h.at_ms(6_990).await;
    assert!(h.tracked("D1").is_some());

    h.at_ms(7_050).await;
    assert!(h.handle.queue().is_empty());
    assert!(h.handle.current_snapshot().is_none());

    h.at_ms(10_000).await;
    assert_eq!(h.client.calls_for("D1"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_primary_switches_to_remaining_document() {
    let h = Harness::new();
    let mut embedding = in_stage("embedding");
    if let Some(progress) = embedding.pipeline_progress.as_mut() {
        progress.history = vec![HistoryEntry::new("chunking", "completed")
            .with_metadata(json!({ "chunk_count": 17 }))];
    }
    h.client.script("D2", vec![Reply::Status(embedding)]);
    h.client.script(
        "D1",
        vec![
            Reply::Status(in_stage("parsing")),
            Reply::Status(completed_with_chunks(42)),
        ],
    );

    h.upload("b.pdf", "D2");
    h.at_ms(10).await;
    h.upload("a.pdf", "D1");
    h.at_ms(20).await;
    assert_eq!(h.handle.current_snapshot().unwrap().key, "D1");

    h.at_ms(1_010).await;
    assert_eq!(h.client.calls_for("D1"), 1);
    assert_eq!(h.client.calls_for("D2"), 1);
    assert_eq!(
        h.handle.current_snapshot().unwrap().current_step_label,
        "Parsing document"
    );

    h.at_ms(2_010).await;
    assert_eq!(h.tracked("D1"), Some(UploadStatus::Complete));

    h.at_ms(7_100).await;
    assert!(h.tracked("D1").is_none());
    let snapshot = h.handle.current_snapshot().unwrap();
    assert_eq!(snapshot.key, "D2");
    assert_eq!(snapshot.current_step_label, "Generating embeddings");
    assert_eq!(snapshot.chunk_count, Some(17));
    assert_eq!(snapshot.elapsed_secs, 7);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_backend_degrades_to_background() {
    let h = Harness::new();
    h.client.script("D3", vec![Reply::Fail]);
    h.upload("c.pdf", "D3");

    h.at_ms(4_010).await;
    assert_eq!(h.client.calls_for("D3"), 4);
    assert_eq!(h.tracked("D3"), Some(UploadStatus::Processing));

    h.at_ms(5_010).await;
    assert_eq!(h.client.calls_for("D3"), 5);
    let snapshot = h.handle.current_snapshot().unwrap();
    assert_eq!(snapshot.status, UploadStatus::Processing);
    assert_eq!(snapshot.current_step_label, "Processing in background");

    h.at_ms(8_990).await;
    assert_eq!(h.client.calls_for("D3"), 5);
    assert_eq!(h.tracked("D3"), Some(UploadStatus::Processing));

    h.at_ms(9_010).await;
    assert!(h.handle.queue().is_empty());
    assert!(h.handle.current_snapshot().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_slow_backend_is_polled_every_tick() {
    let h = Harness::new();
    h.client.script(
        "D1",
        vec![Reply::Delayed(Duration::from_secs(3), in_stage("parsing"))],
    );
    h.upload("a.pdf", "D1");

    h.at_ms(2_500).await;
    assert_eq!(h.client.calls_for("D1"), 2);

    h.at_ms(5_500).await;
    assert_eq!(h.client.calls_for("D1"), 5);
    assert_eq!(h.tracked("D1"), Some(UploadStatus::Processing));
    assert_eq!(
        h.handle.current_snapshot().unwrap().current_step_label,
        "Parsing document"
    );
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_discards_in_flight_response() {
    let h = Harness::new();
    h.client.script(
        "D1",
        vec![Reply::Delayed(
            Duration::from_millis(500),
            completed_with_chunks(3),
        )],
    );
    h.upload("a.pdf", "D1");

    h.at_ms(1_200).await;
    assert_eq!(h.client.calls_for("D1"), 1);
    h.handle.dismiss().await.unwrap();

    h.at_ms(1_600).await;
    assert!(h.handle.queue().is_empty());
    assert!(h.handle.current_snapshot().is_none());

    h.at_ms(4_000).await;
    assert_eq!(h.client.calls_for("D1"), 1);
    assert!(h.handle.queue().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_shown_then_removed() {
    let h = Harness::new();
    h.notifier.start("a.pdf", None);
    h.notifier.error("a.pdf", "Document already exists");
    h.notifier.error("a.pdf", "second failure");

    h.at_ms(10).await;
    let snapshot = h.handle.current_snapshot().unwrap();
    assert_eq!(snapshot.status, UploadStatus::Error);
    assert_eq!(
        snapshot.error.as_deref(),
        Some("This file has already been uploaded")
    );
    assert_eq!(snapshot.errors.len(), 1);

    h.at_ms(7_990).await;
    assert_eq!(h.tracked("a.pdf"), Some(UploadStatus::Error));

    h.at_ms(8_010).await;
    assert!(h.handle.queue().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_document_commands_reach_collaborator() {
    let actions = Arc::new(RecordingActions::default());
    let h = Harness::with_actions(actions.clone());
    h.client.script("D1", vec![Reply::Status(in_stage("parsing"))]);
    h.client.script("D2", vec![Reply::Status(in_stage("parsing"))]);
    h.upload("a.pdf", "D1");
    h.upload("b.pdf", "D2");
    h.at_ms(10).await;

    assert!(h.handle.cancel_linking("D1").await.unwrap());
    assert!(!h.handle.cancel_linking("missing").await.unwrap());
    // Collaborator failures are only logged.
    assert!(h.handle.store_without_extraction("D2").await.unwrap());

    h.at_ms(50).await;
    assert_eq!(*actions.cancelled.lock(), vec!["D1".to_string()]);
    assert_eq!(*actions.stored.lock(), vec!["D2".to_string()]);
    assert!(h.tracked("D1").is_none());
    assert_eq!(h.tracked("D2"), Some(UploadStatus::Processing));
    assert_eq!(
        h.handle.current_snapshot().unwrap().current_step_label,
        "Stored without extraction"
    );

    h.at_ms(3_000).await;
    assert_eq!(h.client.calls_for("D1"), 0);
    assert_eq!(h.client.calls_for("D2"), 0);

    h.at_ms(4_100).await;
    assert!(h.handle.queue().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_see_published_views() {
    let h = Harness::new();
    let mut view = h.handle.subscribe();

    h.notifier.start("a.pdf", None);
    view.changed().await.unwrap();
    let current = view.borrow_and_update().current.clone().unwrap();
    assert_eq!(current.file_name, "a.pdf");
    assert_eq!(current.status, UploadStatus::Uploading);
}

#[tokio::test(start_paused = true)]
async fn test_handle_fails_after_shutdown() {
    let h = Harness::new();
    h.handle.shutdown().await.unwrap();
    h.at_ms(10).await;

    assert!(!h.handle.is_running());
    assert!(matches!(h.handle.dismiss().await, Err(Error::ChannelClosed)));
}
