use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use compact_str::CompactString;
use tracing::warn;
use vigil_types::{Level, SnapshotId, ToValue, table};

use crate::Diagnostics;
use crate::unwind::panic_message;

/// Wraps a function that is expected to return within a deadline.
///
/// Each [`call`](MustReturn::call) runs the function on its own task. If the
/// deadline passes first, the task is aborted, the call's arguments are
/// snapshotted and an error is dispatched. Aborting cannot undo side effects
/// the function already performed.
pub struct MustReturn<F> {
    diag: Diagnostics,
    label: CompactString,
    func: Arc<F>,
    timeout: Duration,
}

impl<F> Clone for MustReturn<F> {
    fn clone(&self) -> Self {
        Self {
            diag: self.diag.clone(),
            label: self.label.clone(),
            func: Arc::clone(&self.func),
            timeout: self.timeout,
        }
    }
}

impl<F> MustReturn<F> {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `None` if the function timed out or panicked.
    pub async fn call<A, Fut, T>(&self, args: A) -> Option<T>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        A: ToValue + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let recorded_args = args.to_value();
        let func = Arc::clone(&self.func);
        let mut handle = tokio::spawn(async move { func(args).await });

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(join_error)) => {
                let message = if join_error.is_panic() {
                    panic_message(join_error.into_panic().as_ref())
                } else {
                    "cancelled".to_owned()
                };
                self.diag.dispatch(
                    format!("must_return {} panicked: {message}", self.label),
                    Level::Error,
                );
                None
            }
            Err(_) => {
                handle.abort();
                let snapshot = self.snapshot_args(&recorded_args);
                warn!(label = %self.label, timeout = ?self.timeout, "call did not return in time");
                self.diag.dispatch(
                    format!(
                        "must_return {} did not return within {}ms (arguments: snapshot {snapshot})",
                        self.label,
                        self.timeout.as_millis()
                    ),
                    Level::Error,
                );
                None
            }
        }
    }

    fn snapshot_args(&self, args: &vigil_types::Value) -> SnapshotId {
        let meta = table! {
            "label" => self.label.clone(),
            "timeout_ms" => i64::try_from(self.timeout.as_millis()).unwrap_or(i64::MAX),
        };
        self.diag.store().snapshot(args, Some(&meta))
    }
}

impl Diagnostics {
    pub fn must_return<F>(
        &self,
        label: impl Into<CompactString>,
        func: F,
        timeout: Duration,
    ) -> MustReturn<F> {
        let label = label.into();
        self.trail().record(label.clone());
        MustReturn {
            diag: self.clone(),
            label,
            func: Arc::new(func),
            timeout,
        }
    }
}
