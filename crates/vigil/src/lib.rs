//! Runtime diagnostics for tokio programs.
//!
//! Top-level split:
//! - `capture`, `diff`, `store`: isolated copies of live state, structural
//!   differences between them, numbered snapshots and rolling history
//! - `dispatch`: deduplicated, windowed reports with a breadcrumb trail,
//!   fanned out to a logger and a report channel
//! - `outcome`: fire-and-forget work whose failures must be observed
//! - `retry`, `wait`, `must_return`, `throttle`: controllers that turn
//!   exhaustion and timeouts into reports and snapshots
//!
//! Everything hangs off a [`Diagnostics`] context.

pub mod capture;
pub mod config;
mod context;
pub mod diff;
pub mod dispatch;
pub mod export;
mod must_return;
pub mod outcome;
mod retry;
pub mod store;
mod throttle;
mod unwind;
mod wait;

pub use capture::{CaptureOptions, capture, capture_with, try_capture};
pub use config::Config;
pub use context::Diagnostics;
pub use diff::diff;
pub use dispatch::{Channel, Dispatcher, Logger, Subscription, TracingLogger, Trail};
pub use must_return::MustReturn;
pub use outcome::{Guard, Informer, OutcomeState, Settled, UnhandledFailure, UnhandledRegistry};
pub use retry::{RetryExhausted, RetryPolicy};
pub use store::{HistoryEntry, Snapshot, SnapshotStore};
pub use throttle::Throttle;
pub use wait::{PollPolicy, PollTimeout, Wait, WaitError};

pub use vigil_types::*;

#[cfg(test)]
mod tests;
