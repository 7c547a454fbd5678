//! Failure classification and bounded retry.
//!
//! A remote call reports failure as a [`SourceError`] whose [`FailureClass`] is fixed when the
//! error is built. [`RetryEngine::execute`] matches on that class to pick a single branch:
//!
//! - primary rate limit: wait until the reported reset (or one hour), plus 5s and up to 10s of jitter
//! - secondary rate limit, server error, transport failure: exponential backoff with up to 10% jitter
//! - client error: give up immediately
//!
//! Every wait is capped at `max_delay`, logged, and preceded by a [`Checkpoint`] write when the
//! caller supplies a checkpoint key. After `max_retries` waits the next failure is final.

mod checkpoint;
mod config;
mod engine;
mod failure;
mod sleeper;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use config::RetryConfig;
pub use engine::{RetryEngine, RetryError};
pub use failure::{FailureClass, SourceError};
pub use sleeper::{RecordingSleeper, Sleeper, ThreadSleeper};
