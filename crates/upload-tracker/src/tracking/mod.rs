//! Upload tracking: queue, status polling, the primary view and timers
//!
//! `Tracker` is the synchronous engine; `TrackerService` runs it on one task
//! and `TrackerHandle` is how the rest of the process talks to it.

pub mod display;
pub mod parser;
pub mod poller;
pub mod queue_store;
pub mod service;
pub mod timers;
pub mod tracker;

pub use display::DisplayMultiplexer;
pub use parser::{parse_status, ParsedStatus, PipelineOutcome};
pub use poller::{FailureOutcome, StatusPoller};
pub use queue_store::QueueStore;
pub use service::{TrackerHandle, TrackerService};
pub use timers::TimerManager;
pub use tracker::{Tracker, TrackerView};
