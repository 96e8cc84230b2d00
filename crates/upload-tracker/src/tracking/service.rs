//! Tracker service: runs the engine on a single task
//!
//! Lifecycle signals, user commands, status fetch results and timer expiries
//! are all applied here one at a time, so the engine never needs a lock.

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::events::UploadEvent;
use crate::providers::{DocumentActions, StatusClient};
use crate::types::{DisplaySnapshot, PipelineStatus, QueueItem};

use super::tracker::{Tracker, TrackerView};

const COMMAND_CAPACITY: usize = 64;
const IDLE_WAIT: Duration = Duration::from_secs(3600);

type FetchFuture = BoxFuture<'static, (String, Result<PipelineStatus>)>;

/// Commands sent from a `TrackerHandle`
#[derive(Debug)]
pub enum TrackerCommand {
    Dismiss {
        ack: oneshot::Sender<()>,
    },
    CancelLinking {
        document_id: String,
        ack: oneshot::Sender<bool>,
    },
    StoreWithoutExtraction {
        document_id: String,
        ack: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// Owns the tracking engine and its inputs
pub struct TrackerService {
    tracker: Tracker,
    client: Arc<dyn StatusClient>,
    actions: Arc<dyn DocumentActions>,
    events: broadcast::Receiver<UploadEvent>,
    commands: mpsc::Receiver<TrackerCommand>,
    view: watch::Sender<TrackerView>,
}

impl TrackerService {
    /// Create the service and the handle that talks to it
    pub fn new(
        config: TrackerConfig,
        client: Arc<dyn StatusClient>,
        actions: Arc<dyn DocumentActions>,
        events: broadcast::Receiver<UploadEvent>,
    ) -> (Self, TrackerHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (view_tx, view_rx) = watch::channel(TrackerView::default());

        let service = Self {
            tracker: Tracker::new(config),
            client,
            actions,
            events,
            commands: command_rx,
            view: view_tx,
        };
        let handle = TrackerHandle {
            commands: command_tx,
            view: view_rx,
        };
        (service, handle)
    }

    /// Create the service and run it on a new task
    pub fn spawn(
        config: TrackerConfig,
        client: Arc<dyn StatusClient>,
        actions: Arc<dyn DocumentActions>,
        events: broadcast::Receiver<UploadEvent>,
    ) -> TrackerHandle {
        let (service, handle) = Self::new(config, client, actions, events);
        tokio::spawn(service.run());
        handle
    }

    /// Process inputs until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        tracing::info!(
            "Upload tracker started: status client '{}', actions '{}', poll every {}ms",
            self.client.name(),
            self.actions.name(),
            self.tracker.config().polling.interval_ms
        );

        let mut fetches: FuturesUnordered<FetchFuture> = FuturesUnordered::new();
        let mut events_open = true;

        loop {
            let deadline = self.tracker.next_deadline();
            let wake_at = deadline.unwrap_or_else(|| Instant::now() + IDLE_WAIT);

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(TrackerCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                event = self.events.recv(), if events_open => match event {
                    Ok(event) => self.tracker.handle_event(event, Instant::now()),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Upload event stream lagged; {} events skipped", skipped);
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("Upload event stream closed");
                        events_open = false;
                    }
                },
                Some((document_id, result)) = fetches.next(), if !fetches.is_empty() => {
                    self.tracker.apply_poll_result(&document_id, result, Instant::now());
                }
                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => {
                    for document_id in self.tracker.advance(Instant::now()) {
                        fetches.push(self.fetch(document_id));
                    }
                }
            }

            self.publish();
        }

        tracing::info!("Upload tracker stopped");
    }

    /// Views are published before acking so callers read their own effect
    fn handle_command(&mut self, command: TrackerCommand) {
        let now = Instant::now();
        match command {
            TrackerCommand::Dismiss { ack } => {
                self.tracker.dismiss();
                self.publish();
                let _ = ack.send(());
            }
            TrackerCommand::CancelLinking { document_id, ack } => {
                let tracked = self.tracker.cancel_linking(&document_id, now);
                if tracked {
                    let actions = Arc::clone(&self.actions);
                    tokio::spawn(async move {
                        if let Err(e) = actions.cancel_linking(&document_id).await {
                            tracing::error!("cancel-linking failed for {}: {}", document_id, e);
                        }
                    });
                }
                self.publish();
                let _ = ack.send(tracked);
            }
            TrackerCommand::StoreWithoutExtraction { document_id, ack } => {
                let tracked = self.tracker.store_without_extraction(&document_id, now);
                if tracked {
                    let actions = Arc::clone(&self.actions);
                    tokio::spawn(async move {
                        if let Err(e) = actions.store_without_extraction(&document_id).await {
                            tracing::error!(
                                "store-without-extraction failed for {}: {}",
                                document_id,
                                e
                            );
                        }
                    });
                }
                self.publish();
                let _ = ack.send(tracked);
            }
            TrackerCommand::Shutdown => {}
        }
    }

    /// One fetch per registered document per tick, even if an earlier one is
    /// still pending; responses for unregistered documents are dropped on apply.
    fn fetch(&self, document_id: String) -> FetchFuture {
        let client = Arc::clone(&self.client);
        async move {
            let result = client.fetch_status(&document_id).await;
            (document_id, result)
        }
        .boxed()
    }

    fn publish(&self) {
        let next = self.tracker.view();
        self.view.send_if_modified(|view| {
            if *view == next {
                return false;
            }
            *view = next;
            true
        });
    }
}

/// Cloneable handle to a running tracker
#[derive(Clone)]
pub struct TrackerHandle {
    commands: mpsc::Sender<TrackerCommand>,
    view: watch::Receiver<TrackerView>,
}

impl TrackerHandle {
    /// Latest published state
    pub fn view(&self) -> TrackerView {
        self.view.borrow().clone()
    }

    /// The primary snapshot, if anything is displayed
    pub fn current_snapshot(&self) -> Option<DisplaySnapshot> {
        self.view.borrow().current.clone()
    }

    /// Every tracked item, oldest first
    pub fn queue(&self) -> Vec<QueueItem> {
        self.view.borrow().queue.clone()
    }

    /// Receiver that wakes on every published change
    pub fn subscribe(&self) -> watch::Receiver<TrackerView> {
        self.view.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Clear all tracking state
    pub async fn dismiss(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.send(TrackerCommand::Dismiss { ack }).await?;
        done.await.map_err(|_| Error::ChannelClosed)
    }

    /// Returns whether the document was tracked
    pub async fn cancel_linking(&self, document_id: impl Into<String>) -> Result<bool> {
        let (ack, done) = oneshot::channel();
        self.send(TrackerCommand::CancelLinking {
            document_id: document_id.into(),
            ack,
        })
        .await?;
        done.await.map_err(|_| Error::ChannelClosed)
    }

    /// Returns whether the document was tracked
    pub async fn store_without_extraction(&self, document_id: impl Into<String>) -> Result<bool> {
        let (ack, done) = oneshot::channel();
        self.send(TrackerCommand::StoreWithoutExtraction {
            document_id: document_id.into(),
            ack,
        })
        .await?;
        done.await.map_err(|_| Error::ChannelClosed)
    }

    /// Stop the service task
    pub async fn shutdown(&self) -> Result<()> {
        self.send(TrackerCommand::Shutdown).await
    }

    async fn send(&self, command: TrackerCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::ChannelClosed)
    }
}
