use std::future::Future;
use std::sync::Arc;

use compact_str::CompactString;
use vigil_types::Failure;

use super::{Core, Flavor, OutcomeState, work_fn};
use crate::Diagnostics;

/// Handle to protected work whose failure is reported as soon as it happens.
///
/// Unlike [`Informer`](super::Informer), each handler kind is accepted once:
/// the first `catch`, `default` and `finally` win and later calls are no-ops.
pub struct Guard<T> {
    core: Arc<Core<T>>,
    diag: Diagnostics,
}

impl<T> Clone for Guard<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            diag: self.diag.clone(),
        }
    }
}

impl<T: Send + 'static> Guard<T> {
    pub(crate) fn launch<F, Fut>(diag: &Diagnostics, label: CompactString, work: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Failure>> + Send + 'static,
    {
        let work = work_fn(work);
        Self {
            core: Core::launch(diag, label, &work, Flavor::Guard),
            diag: diag.clone(),
        }
    }

    pub fn label(&self) -> &str {
        self.core.label()
    }

    pub fn state(&self) -> OutcomeState {
        self.core.state()
    }

    pub fn last_error(&self) -> Option<Failure> {
        self.core.last_error()
    }

    pub fn catch(&self, handler: impl FnOnce(&Failure) + Send + 'static) -> &Self {
        self.core.attach_catch(&self.diag, Box::new(handler), true);
        self
    }

    /// Value to report as the result if the work fails.
    pub fn default(&self, value: T) -> &Self {
        self.core.set_default(value);
        self
    }

    pub fn finally(&self, handler: impl FnOnce() + Send + 'static) -> &Self {
        self.core.attach_finally(&self.diag, Box::new(handler), true);
        self
    }
}

impl<T: Clone + Send + 'static> Guard<T> {
    /// The work's return value, or the default if it failed. `None` while
    /// pending, or after a failure with no default.
    pub fn result(&self) -> Option<T> {
        self.core.result()
    }

    pub async fn value(&self) -> Option<T> {
        self.core.wait().await;
        self.core.result()
    }
}
