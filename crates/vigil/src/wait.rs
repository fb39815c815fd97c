//! Deadline-bounded waiting and polling.
//!
//! Both loops check first and sleep afterwards, and never sleep past their
//! deadline: the last sleep is shortened so the final check happens exactly
//! at the deadline.

use std::error::Error;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use compact_str::CompactString;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};
use vigil_types::{Level, SnapshotId, table};

use crate::Diagnostics;
use crate::unwind::{contain_panic, panic_message};

////////////////////////////////////////////////////////////////////////////////////
// wait_until
////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The condition never held before the deadline.
    Timeout,
    /// The condition itself panicked; waiting stopped there.
    Panicked(String),
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("Timeout"),
            Self::Panicked(message) => write!(f, "condition panicked: {message}"),
        }
    }
}

impl Error for WaitError {}

type ReadyHandler<R> = Box<dyn FnOnce(&R) + Send>;
type ErrorHandler = Box<dyn FnOnce(&WaitError) + Send>;

struct WaitRecord<R> {
    outcome: Option<Arc<Result<R, WaitError>>>,
    on_ready: Vec<ReadyHandler<R>>,
    on_error: Vec<ErrorHandler>,
}

struct WaitInner<R> {
    label: CompactString,
    record: Mutex<WaitRecord<R>>,
    done: Notify,
}

/// Handle to a running `wait_until`. Handlers attached before resolution are
/// queued; handlers attached afterwards run immediately.
pub struct Wait<R> {
    inner: Arc<WaitInner<R>>,
}

impl<R> Clone for Wait<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Send + Sync + 'static> Wait<R> {
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.record.lock().outcome.is_some()
    }

    pub fn then(&self, handler: impl FnOnce(&R) + Send + 'static) -> &Self {
        let outcome = {
            let mut record = self.inner.record.lock();
            match &record.outcome {
                Some(outcome) => Arc::clone(outcome),
                None => {
                    record.on_ready.push(Box::new(handler));
                    return self;
                }
            }
        };
        if let Ok(value) = outcome.as_ref() {
            contain_panic(&self.inner.label, "then", || handler(value));
        }
        self
    }

    pub fn catch(&self, handler: impl FnOnce(&WaitError) + Send + 'static) -> &Self {
        let outcome = {
            let mut record = self.inner.record.lock();
            match &record.outcome {
                Some(outcome) => Arc::clone(outcome),
                None => {
                    record.on_error.push(Box::new(handler));
                    return self;
                }
            }
        };
        if let Err(error) = outcome.as_ref() {
            contain_panic(&self.inner.label, "catch", || handler(error));
        }
        self
    }

    fn resolve(&self, outcome: Result<R, WaitError>) {
        let outcome = Arc::new(outcome);
        let (on_ready, on_error) = {
            let mut record = self.inner.record.lock();
            record.outcome = Some(Arc::clone(&outcome));
            (
                std::mem::take(&mut record.on_ready),
                std::mem::take(&mut record.on_error),
            )
        };
        self.inner.done.notify_waiters();

        match outcome.as_ref() {
            Ok(value) => {
                for handler in on_ready {
                    contain_panic(&self.inner.label, "then", || handler(value));
                }
            }
            Err(error) => {
                for handler in on_error {
                    contain_panic(&self.inner.label, "catch", || handler(error));
                }
            }
        }
    }

    async fn resolved(&self) -> Arc<Result<R, WaitError>> {
        loop {
            let notified = self.inner.done.notified();
            let outcome = self.inner.record.lock().outcome.clone();
            if let Some(outcome) = outcome {
                return outcome;
            }
            notified.await;
        }
    }
}

impl<R: Clone + Send + Sync + 'static> Wait<R> {
    pub async fn outcome(&self) -> Result<R, WaitError> {
        self.resolved().await.as_ref().clone()
    }
}

////////////////////////////////////////////////////////////////////////////////////
// poll_until
////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            interval: Duration::from_millis(250),
        }
    }
}

/// The condition never held before the deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTimeout {
    pub label: CompactString,
    pub attempts: u32,
    /// How many of those attempts returned an error or panicked.
    pub failed_attempts: u32,
    pub snapshot: SnapshotId,
}

impl fmt::Display for PollTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} timed out after {} attempts ({} failed, snapshot {})",
            self.label, self.attempts, self.failed_attempts, self.snapshot
        )
    }
}

impl Error for PollTimeout {}

impl Diagnostics {
    /// Polls `condition` every tick until it yields a value or `timeout`
    /// elapses. Must be called from within a tokio runtime.
    pub fn wait_until<R, C>(
        &self,
        label: impl Into<CompactString>,
        condition: C,
        timeout: Duration,
    ) -> Wait<R>
    where
        R: Send + Sync + 'static,
        C: FnMut() -> Option<R> + Send + 'static,
    {
        let label = label.into();
        self.trail().record(label.clone());
        let wait = Wait {
            inner: Arc::new(WaitInner {
                label,
                record: Mutex::new(WaitRecord {
                    outcome: None,
                    on_ready: Vec::new(),
                    on_error: Vec::new(),
                }),
                done: Notify::new(),
            }),
        };

        let driver = wait.clone();
        let diag = self.clone();
        tokio::spawn(async move {
            let outcome = diag.drive_wait(&driver.inner.label, condition, timeout).await;
            driver.resolve(outcome);
        });
        wait
    }

    async fn drive_wait<R, C>(
        &self,
        label: &str,
        mut condition: C,
        timeout: Duration,
    ) -> Result<R, WaitError>
    where
        C: FnMut() -> Option<R>,
    {
        let tick = self.config().wait_tick;
        let started = Instant::now();
        let deadline = started + timeout;
        loop {
            match catch_unwind(AssertUnwindSafe(&mut condition)) {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    self.dispatch(
                        format!("wait_until {label}: condition panicked: {message}"),
                        Level::Error,
                    );
                    return Err(WaitError::Panicked(message));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                let waited = now.duration_since(started);
                let meta = table! {
                    "label" => label,
                    "timeout_ms" => millis(timeout),
                };
                let snapshot = self.snapshot_global(Some(&meta));
                warn!(%label, ?waited, "wait timed out");
                self.dispatch(
                    format!(
                        "wait_until {label} timed out after {}ms (snapshot {snapshot})",
                        millis(timeout)
                    ),
                    Level::Warn,
                );
                return Err(WaitError::Timeout);
            }
            tokio::time::sleep(tick.min(deadline - now)).await;
        }
    }

    /// Runs `action` and then checks `condition`, once per interval, until
    /// the condition holds. Returns how many times the action ran.
    ///
    /// Errors and panics from `action` are logged and counted but never stop
    /// polling. A panicking `condition` counts as not yet satisfied.
    pub async fn poll_until<A, C>(
        &self,
        label: impl Into<CompactString>,
        mut action: A,
        mut condition: C,
        policy: PollPolicy,
    ) -> Result<u32, PollTimeout>
    where
        A: FnMut() -> Result<(), vigil_types::Failure>,
        C: FnMut() -> bool,
    {
        let label = label.into();
        self.trail().record(label.clone());
        let deadline = Instant::now() + policy.timeout;
        let mut attempts = 0u32;
        let mut failed_attempts = 0u32;

        loop {
            attempts += 1;
            match catch_unwind(AssertUnwindSafe(&mut action)) {
                Ok(Ok(())) => {}
                Ok(Err(failure)) => {
                    failed_attempts += 1;
                    debug!(%label, attempts, %failure, "poll action failed");
                }
                Err(payload) => {
                    failed_attempts += 1;
                    let message = panic_message(payload.as_ref());
                    warn!(%label, attempts, %message, "poll action panicked");
                }
            }

            let satisfied = catch_unwind(AssertUnwindSafe(&mut condition)).unwrap_or_else(|payload| {
                warn!(%label, message = %panic_message(payload.as_ref()), "poll condition panicked");
                false
            });
            if satisfied {
                return Ok(attempts);
            }

            let now = Instant::now();
            if now >= deadline {
                let meta = table! {
                    "label" => label.clone(),
                    "attempts" => attempts,
                    "failed_attempts" => failed_attempts,
                };
                let snapshot = self.snapshot_global(Some(&meta));
                self.dispatch(
                    format!(
                        "poll_until {label} timed out after {attempts} attempts (snapshot {snapshot})"
                    ),
                    Level::Fatal,
                );
                return Err(PollTimeout {
                    label,
                    attempts,
                    failed_attempts,
                    snapshot,
                });
            }
            tokio::time::sleep(policy.interval.min(deadline - now)).await;
        }
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
