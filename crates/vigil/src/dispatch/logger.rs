use tracing::{info, warn};

/// Where emitted reports are written for humans. Error-severity reports go to
/// `warn`, everything else to `info`.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
}

/// Default sink: forwards to `tracing` under the `vigil` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        info!(target: "vigil", "{message}");
    }

    fn warn(&self, message: &str) {
        warn!(target: "vigil", "{message}");
    }
}
