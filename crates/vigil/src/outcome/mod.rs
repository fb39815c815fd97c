//! Observable async outcomes.
//!
//! [`Informer`] and [`Guard`] both run a unit of work as a tokio task and
//! record whether it succeeded. A failure that nobody acknowledges (no
//! `catch`, no `finally`) within the grace period is reported as a warning,
//! which is how silently dropped async errors become visible.
//!
//! Handlers attached before the work finishes are queued and run when it
//! settles; handlers attached afterwards run immediately. Either way a
//! `catch` handler always sees the actual failure.

mod guard;
mod informer;
mod registry;

pub use self::guard::*;
pub use self::informer::*;
pub use self::registry::*;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use compact_str::CompactString;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, warn};
use vigil_types::{Failure, Level, OutcomeId};

use crate::Diagnostics;
use crate::unwind::{contain_panic, panic_message};

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// A re-runnable unit of work. Retrying calls it again.
pub(crate) type Work<T> = Arc<dyn Fn() -> BoxFuture<Result<T, Failure>> + Send + Sync>;

type FailureHandler = Box<dyn FnOnce(&Failure) + Send>;
type SettleHandler = Box<dyn FnOnce() + Send>;

pub(crate) fn work_fn<T, F, Fut>(work: F) -> Work<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, Failure>> + Send + 'static,
{
    Arc::new(move || Box::pin(work()))
}

/// Runs one attempt of `work` on its own task so a panic is contained and
/// reported as a [`Failure`] instead of unwinding into the caller.
pub(crate) async fn run_protected<T: Send + 'static>(work: &Work<T>) -> Result<T, Failure> {
    match tokio::spawn(work()).await {
        Ok(result) => result,
        Err(join_error) if join_error.is_panic() => {
            let message = panic_message(join_error.into_panic().as_ref());
            warn!(%message, "unit of work panicked");
            Err(Failure::panic(message))
        }
        Err(_) => Err(Failure::cancelled()),
    }
}

/// Where an outcome is in its lifecycle. Moves out of `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeState {
    Pending,
    Succeeded,
    Failed,
}

impl OutcomeState {
    pub fn has_run(self) -> bool {
        !matches!(self, OutcomeState::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flavor {
    Informer,
    Guard,
}

struct Record<T> {
    state: OutcomeState,
    caught: bool,
    finalized: bool,
    defaulted: bool,
    last_error: Option<Failure>,
    result: Option<T>,
    /// Value `default` asked for, applied only if the work fails.
    fallback: Option<T>,
    unhandled: Option<OutcomeId>,
    on_failure: Vec<FailureHandler>,
    on_settle: Vec<SettleHandler>,
}

/// State shared between an outcome handle and the task driving it.
pub(crate) struct Core<T> {
    label: CompactString,
    record: Mutex<Record<T>>,
    settled: Notify,
}

impl<T: Send + 'static> Core<T> {
    /// Spawns the driver task for one run of `work` and returns its record.
    pub(crate) fn launch(
        diag: &Diagnostics,
        label: CompactString,
        work: &Work<T>,
        flavor: Flavor,
    ) -> Arc<Self> {
        let core = Arc::new(Core {
            label: label.clone(),
            record: Mutex::new(Record {
                state: OutcomeState::Pending,
                caught: false,
                finalized: false,
                defaulted: false,
                last_error: None,
                result: None,
                fallback: None,
                unhandled: None,
                on_failure: Vec::new(),
                on_settle: Vec::new(),
            }),
            settled: Notify::new(),
        });
        diag.trail().record(label);

        let driver = Arc::clone(&core);
        let diag = diag.clone();
        let work = Arc::clone(work);
        tokio::spawn(async move {
            let outcome = run_protected(&work).await;
            let Some(failure) = driver.settle(outcome, &diag) else {
                return;
            };

            if flavor == Flavor::Guard {
                diag.dispatch(
                    format!("guard {} failed: {failure}", driver.label),
                    Level::Error,
                );
                return;
            }

            tokio::time::sleep(diag.config().grace_period).await;
            if !driver.is_observed() {
                diag.dispatch(
                    format!("error catcher wasn't used: {}: {failure}", driver.label),
                    Level::Warn,
                );
            }
        });
        core
    }

    fn settle(&self, outcome: Result<T, Failure>, diag: &Diagnostics) -> Option<Failure> {
        let (failure, on_failure, on_settle) = {
            let mut record = self.record.lock();
            let failure = match outcome {
                Ok(value) => {
                    record.state = OutcomeState::Succeeded;
                    record.result = Some(value);
                    record.fallback = None;
                    None
                }
                Err(failure) => {
                    record.state = OutcomeState::Failed;
                    record.last_error = Some(failure.clone());
                    if let Some(fallback) = record.fallback.take() {
                        record.result = Some(fallback);
                    }
                    let observed = record.caught || record.finalized;
                    record.unhandled =
                        Some(diag.unhandled().record(&self.label, failure.clone(), observed));
                    Some(failure)
                }
            };
            (
                failure,
                std::mem::take(&mut record.on_failure),
                std::mem::take(&mut record.on_settle),
            )
        };
        self.settled.notify_waiters();
        debug!(label = %self.label, failed = failure.is_some(), "outcome settled");

        if let Some(failure) = &failure {
            for handler in on_failure {
                contain_panic(&self.label, "catch", || handler(failure));
            }
        }
        for handler in on_settle {
            contain_panic(&self.label, "finally", handler);
        }
        failure
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn state(&self) -> OutcomeState {
        self.record.lock().state
    }

    pub(crate) fn is_caught(&self) -> bool {
        self.record.lock().caught
    }

    pub(crate) fn is_finalized(&self) -> bool {
        self.record.lock().finalized
    }

    fn is_observed(&self) -> bool {
        let record = self.record.lock();
        record.caught || record.finalized
    }

    pub(crate) fn last_error(&self) -> Option<Failure> {
        self.record.lock().last_error.clone()
    }

    /// Marks the outcome caught and arranges for `handler` to see its failure.
    /// With `once`, only the first catch is accepted.
    pub(crate) fn attach_catch(&self, diag: &Diagnostics, handler: FailureHandler, once: bool) {
        let (run_now, unhandled) = {
            let mut record = self.record.lock();
            if once && record.caught {
                return;
            }
            record.caught = true;
            let run_now = match record.state {
                OutcomeState::Pending => {
                    record.on_failure.push(handler);
                    None
                }
                OutcomeState::Failed => record.last_error.clone().map(|failure| (handler, failure)),
                OutcomeState::Succeeded => None,
            };
            (run_now, record.unhandled)
        };
        if let Some(id) = unhandled {
            diag.unhandled().mark_observed(id);
        }
        if let Some((handler, failure)) = run_now {
            contain_panic(&self.label, "catch", || handler(&failure));
        }
    }

    /// Marks the outcome finalized and arranges for `handler` to run once it
    /// has settled, whatever the result.
    pub(crate) fn attach_finally(&self, diag: &Diagnostics, handler: SettleHandler, once: bool) {
        let (run_now, unhandled) = {
            let mut record = self.record.lock();
            if once && record.finalized {
                return;
            }
            record.finalized = true;
            let run_now = if record.state.has_run() {
                Some(handler)
            } else {
                record.on_settle.push(handler);
                None
            };
            (run_now, record.unhandled)
        };
        if let Some(id) = unhandled {
            diag.unhandled().mark_observed(id);
        }
        if let Some(handler) = run_now {
            contain_panic(&self.label, "finally", handler);
        }
    }

    /// First call wins. Takes effect only if the work fails.
    pub(crate) fn set_default(&self, value: T) {
        let mut record = self.record.lock();
        if record.defaulted {
            return;
        }
        record.defaulted = true;
        match record.state {
            OutcomeState::Pending => record.fallback = Some(value),
            OutcomeState::Failed => record.result = Some(value),
            OutcomeState::Succeeded => {}
        }
    }

    pub(crate) async fn wait(&self) -> OutcomeState {
        loop {
            let notified = self.settled.notified();
            let state = self.state();
            if state.has_run() {
                return state;
            }
            notified.await;
        }
    }
}

impl<T: Clone + Send + 'static> Core<T> {
    pub(crate) fn result(&self) -> Option<T> {
        self.record.lock().result.clone()
    }
}
