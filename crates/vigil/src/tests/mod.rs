use std::sync::Arc;

use parking_lot::Mutex;

use crate::{Config, Diagnostics, Logger};

mod config;
mod dispatch;
mod export;
mod retry;
mod wait;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sink {
    Info,
    Warn,
}

#[derive(Default)]
struct RecordingLogger {
    lines: Mutex<Vec<(Sink, String)>>,
}

impl RecordingLogger {
    fn all(&self) -> Vec<String> {
        self.lines.lock().iter().map(|(_, line)| line.clone()).collect()
    }

    fn warn_lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(sink, _)| *sink == Sink::Warn)
            .map(|(_, line)| line.clone())
            .collect()
    }

    fn containing(&self, needle: &str) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|line| line.contains(needle))
            .collect()
    }
}

impl Logger for RecordingLogger {
    fn info(&self, message: &str) {
        self.lines.lock().push((Sink::Info, message.to_owned()));
    }

    fn warn(&self, message: &str) {
        self.lines.lock().push((Sink::Warn, message.to_owned()));
    }
}

fn recording() -> (Diagnostics, Arc<RecordingLogger>) {
    recording_with(Config::default())
}

fn recording_with(config: Config) -> (Diagnostics, Arc<RecordingLogger>) {
    let logger = Arc::new(RecordingLogger::default());
    let diag = Diagnostics::with_logger(config, logger.clone());
    (diag, logger)
}
