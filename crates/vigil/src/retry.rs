//! Sequential retries with a postmortem on exhaustion.

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use compact_str::CompactString;
use tracing::{debug, warn};
use vigil_types::{Failure, Level, SnapshotId, table};

use crate::Diagnostics;
use crate::outcome::{run_protected, work_fn};

type Fallback = Arc<dyn Fn(&Failure) + Send + Sync>;

#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub limit: u32,
    /// Sleep before attempt `n + 1` is `backoff * n`.
    pub backoff: Duration,
    /// Invoked once, with the last failure, when every attempt has failed.
    pub fallback: Option<Fallback>,
}

impl RetryPolicy {
    pub fn new(limit: u32, backoff: Duration) -> Self {
        Self {
            limit,
            backoff,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: impl Fn(&Failure) + Send + Sync + 'static) -> Self {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("limit", &self.limit)
            .field("backoff", &self.backoff)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Every attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted {
    pub label: CompactString,
    pub attempts: u32,
    /// Postmortem capture of the global state root taken after the last
    /// attempt.
    pub snapshot: SnapshotId,
    pub last_error: Failure,
    pub fallback_invoked: bool,
}

impl fmt::Display for RetryExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed after {} attempts: {} (snapshot {})",
            self.label, self.attempts, self.last_error, self.snapshot
        )
    }
}

impl Error for RetryExhausted {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.last_error)
    }
}

impl Diagnostics {
    /// Runs `work` until it succeeds or `policy.limit` attempts have failed.
    ///
    /// Every failed attempt snapshots the global state root with the label,
    /// attempt number and error as metadata. Exhaustion dispatches a single
    /// fatal report.
    pub async fn catch_or_retry<T, F, Fut>(
        &self,
        label: impl Into<CompactString>,
        work: F,
        policy: RetryPolicy,
    ) -> Result<T, RetryExhausted>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Failure>> + Send + 'static,
    {
        let label = label.into();
        let work = work_fn(work);
        let limit = policy.limit.max(1);
        self.trail().record(label.clone());

        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match run_protected(&work).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(%label, attempt, "succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            let meta = table! {
                "label" => label.clone(),
                "attempt" => attempt,
                "error" => failure.to_string(),
            };
            let snapshot = self.snapshot_global(Some(&meta));

            if attempt < limit {
                let delay = policy.delay_after(attempt);
                debug!(%label, attempt, %failure, ?delay, "attempt failed, retrying");
                tokio::time::sleep(delay).await;
                continue;
            }

            warn!(%label, attempts = attempt, %failure, "retries exhausted");
            self.dispatch(
                format!(
                    "{label} failed after {attempt} attempts: {failure} (snapshot {snapshot})"
                ),
                Level::Fatal,
            );
            let fallback_invoked = match &policy.fallback {
                Some(fallback) => {
                    fallback(&failure);
                    true
                }
                None => false,
            };
            return Err(RetryExhausted {
                label,
                attempts: attempt,
                snapshot,
                last_error: failure,
                fallback_invoked,
            });
        }
    }
}
