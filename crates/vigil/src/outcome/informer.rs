use std::future::Future;
use std::sync::Arc;

use compact_str::CompactString;
use vigil_types::Failure;

use super::{Core, Flavor, OutcomeState, Work, work_fn};
use crate::Diagnostics;

/// What a settled outcome resolved to.
pub type Settled<T> = Result<T, Failure>;

/// Handle to a fire-and-forget unit of work whose failure must be observed.
///
/// Cloning the handle shares the same record; [`Informer::retry`] creates a
/// new one.
pub struct Informer<T> {
    core: Arc<Core<T>>,
    work: Work<T>,
    diag: Diagnostics,
}

impl<T> Clone for Informer<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            work: Arc::clone(&self.work),
            diag: self.diag.clone(),
        }
    }
}

impl<T: Send + 'static> Informer<T> {
    pub(crate) fn launch<F, Fut>(diag: &Diagnostics, label: CompactString, work: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Failure>> + Send + 'static,
    {
        Self::relaunch(diag, label, work_fn(work))
    }

    fn relaunch(diag: &Diagnostics, label: CompactString, work: Work<T>) -> Self {
        let core = Core::launch(diag, label, &work, Flavor::Informer);
        Self {
            core,
            work,
            diag: diag.clone(),
        }
    }

    pub fn label(&self) -> &str {
        self.core.label()
    }

    pub fn state(&self) -> OutcomeState {
        self.core.state()
    }

    pub fn is_settled(&self) -> bool {
        self.state().has_run()
    }

    pub fn is_caught(&self) -> bool {
        self.core.is_caught()
    }

    pub fn is_finalized(&self) -> bool {
        self.core.is_finalized()
    }

    pub fn last_error(&self) -> Option<Failure> {
        self.core.last_error()
    }

    /// Observes a failure. Every attached handler runs, at most once each.
    pub fn catch(&self, handler: impl FnOnce(&Failure) + Send + 'static) -> &Self {
        self.core.attach_catch(&self.diag, Box::new(handler), false);
        self
    }

    pub fn finally(&self, handler: impl FnOnce() + Send + 'static) -> &Self {
        self.core.attach_finally(&self.diag, Box::new(handler), false);
        self
    }

    /// Runs the same work again under a fresh record. Handlers attached to
    /// this informer are not carried over.
    pub fn retry(&self) -> Informer<T> {
        Self::relaunch(
            &self.diag,
            CompactString::from(self.core.label()),
            Arc::clone(&self.work),
        )
    }
}

impl<T: Clone + Send + 'static> Informer<T> {
    /// Waits for the work to finish.
    pub async fn settled(&self) -> Settled<T> {
        match self.core.wait().await {
            OutcomeState::Failed => Err(self
                .core
                .last_error()
                .unwrap_or_else(Failure::cancelled)),
            _ => self.core.result().ok_or_else(Failure::cancelled),
        }
    }

    pub fn result(&self) -> Option<T> {
        self.core.result()
    }
}
