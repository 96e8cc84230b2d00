//! Provider abstractions for the pipeline backend
//!
//! The tracker only consumes the pipeline's status contract and forwards the
//! two user commands; both boundaries are traits so the HTTP implementations
//! can be swapped out in tests.

pub mod actions;
pub mod http;
pub mod status;

pub use actions::{DocumentActions, NoopDocumentActions};
pub use http::HttpStatusClient;
pub use status::StatusClient;
