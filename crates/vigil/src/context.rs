use std::future::Future;
use std::sync::Arc;

use compact_str::CompactString;
use parking_lot::RwLock;
use tracing::debug;
use vigil_types::{Failure, Level, SnapshotId, Value};

use crate::capture::CaptureOptions;
use crate::config::Config;
use crate::dispatch::{Channel, Dispatcher, Logger, TracingLogger, Trail};
use crate::outcome::{Guard, Informer, UnhandledRegistry};
use crate::store::SnapshotStore;

/// Owns every registry: snapshots, pending dispatches, the trail, the report
/// channel and the unhandled-failure log.
///
/// Cheap to clone; all clones share state. Everything is torn down when the
/// last clone (including ones held by in-flight tasks) is dropped. Call
/// [`Diagnostics::shutdown`] first to emit dispatches still inside their
/// window.
#[derive(Clone)]
pub struct Diagnostics {
    inner: Arc<DiagnosticsInner>,
}

struct DiagnosticsInner {
    config: Config,
    store: SnapshotStore,
    dispatcher: Dispatcher,
    unhandled: UnhandledRegistry,
    global_root: RwLock<Value>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Diagnostics {
    pub fn new(config: Config) -> Self {
        Self::with_logger(config, Arc::new(TracingLogger))
    }

    pub fn with_logger(config: Config, logger: Arc<dyn Logger>) -> Self {
        let store = SnapshotStore::new(
            CaptureOptions {
                max_depth: config.max_depth,
            },
            config.history_capacity,
        );
        let dispatcher = Dispatcher::new(config.dispatch_window, config.trail_capacity, logger);
        let unhandled = UnhandledRegistry::new(config.unhandled_capacity);
        debug!(?config, "diagnostics context created");
        Self {
            inner: Arc::new(DiagnosticsInner {
                config,
                store,
                dispatcher,
                unhandled,
                global_root: RwLock::new(Value::Nil),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.inner.store
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn channel(&self) -> &Channel {
        self.inner.dispatcher.channel()
    }

    pub fn trail(&self) -> &Trail {
        self.inner.dispatcher.trail()
    }

    pub fn unhandled(&self) -> &UnhandledRegistry {
        &self.inner.unhandled
    }

    pub fn dispatch(&self, message: impl AsRef<str>, level: Level) {
        self.inner.dispatcher.dispatch(message, level);
    }

    /// Sets the value that postmortem snapshots (retry exhaustion, wait and
    /// poll timeouts) capture.
    pub fn set_global_root(&self, root: Value) {
        *self.inner.global_root.write() = root;
    }

    pub fn global_root(&self) -> Value {
        self.inner.global_root.read().clone()
    }

    pub fn snapshot_global(&self, meta: Option<&Value>) -> SnapshotId {
        let root = self.global_root();
        self.inner.store.snapshot(&root, meta)
    }

    /// Runs `work` on a new task. A failure nobody catches is reported after
    /// the grace period. Must be called from within a tokio runtime.
    pub fn informer<T, F, Fut>(&self, label: impl Into<CompactString>, work: F) -> Informer<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Failure>> + Send + 'static,
    {
        Informer::launch(self, label.into(), work)
    }

    /// Runs `work` on a new task and reports a failure immediately. Must be
    /// called from within a tokio runtime.
    pub fn guard<T, F, Fut>(&self, label: impl Into<CompactString>, work: F) -> Guard<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Failure>> + Send + 'static,
    {
        Guard::launch(self, label.into(), work)
    }

    /// Emits every dispatch still waiting on its window.
    pub fn shutdown(&self) {
        debug!(pending = self.inner.dispatcher.pending_len(), "flushing dispatches");
        self.inner.dispatcher.flush_pending();
    }
}
