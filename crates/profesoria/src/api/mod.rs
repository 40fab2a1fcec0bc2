//! API interaction layer between the generation service and the model.
//!
//! - [`backend`]: the [`CompletionBackend`] seam: one request in, one
//!   completion out. [`OpenRouterClient`](crate::OpenRouterClient) is the
//!   production implementation.
//! - [`tracing`]: request correlation ids attached to every log line of a
//!   round trip.

pub mod backend;
pub mod tracing;

pub use backend::{CompletionBackend, CompletionFuture};
pub use self::tracing::generate_request_id;
