//! Deduplicating report dispatch.
//!
//! The first occurrence of a formatted message opens a window. Identical
//! messages arriving while the window is open only bump a counter; when the
//! window closes the message is emitted once, annotated with the count if it
//! repeated, and the entry is dropped so the next occurrence opens a fresh
//! window.
//!
//! Distinct messages are independent: they emit in the order their windows
//! close, which is not necessarily the order they were dispatched in.

mod channel;
mod logger;
mod trail;

pub use self::channel::*;
pub use self::logger::*;
pub use self::trail::*;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;
use vigil_types::{Level, PTime, PublishOptions, Report, Target};

use crate::unwind::contain_panic;

struct PendingEntry {
    level: Level,
    count: u32,
    flush: Option<tokio::task::JoinHandle<()>>,
}

#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    window: Duration,
    logger: Arc<dyn Logger>,
    channel: Channel,
    trail: Trail,
    pending: Mutex<HashMap<String, PendingEntry>>,
}

impl Dispatcher {
    pub fn new(window: Duration, trail_capacity: usize, logger: Arc<dyn Logger>) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                window,
                logger,
                channel: Channel::new(),
                trail: Trail::new(trail_capacity),
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.inner.channel
    }

    pub fn trail(&self) -> &Trail {
        &self.inner.trail
    }

    /// Number of distinct messages currently waiting for their window to close.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Queues `message` for emission. Outside a tokio runtime there is no
    /// timer to wait on, so the message is emitted immediately.
    pub fn dispatch(&self, message: impl AsRef<str>, level: Level) {
        let text = self.format(message.as_ref(), level);

        let mut pending = self.inner.pending.lock();
        if let Some(entry) = pending.get_mut(&text) {
            entry.count = entry.count.saturating_add(1);
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            drop(pending);
            debug!("no tokio runtime; emitting without aggregation");
            self.emit(level, text, 1);
            return;
        };

        let this = self.clone();
        let key = text.clone();
        let flush = runtime.spawn(async move {
            tokio::time::sleep(this.inner.window).await;
            this.flush_one(&key);
        });
        pending.insert(
            text,
            PendingEntry {
                level,
                count: 1,
                flush: Some(flush),
            },
        );
    }

    /// Emits every pending message now without waiting for its window.
    pub fn flush_pending(&self) {
        let drained: Vec<(String, PendingEntry)> = self.inner.pending.lock().drain().collect();
        for (text, mut entry) in drained {
            if let Some(flush) = entry.flush.take() {
                flush.abort();
            }
            self.emit(entry.level, text, entry.count);
        }
    }

    fn format(&self, message: &str, level: Level) -> String {
        let mut text = format!("{} {message}", level.tag());
        if level.is_error_severity()
            && let Some(trail) = self.inner.trail.render()
        {
            text.push('\n');
            text.push_str(&trail);
        }
        text
    }

    fn flush_one(&self, text: &str) {
        let Some(entry) = self.inner.pending.lock().remove(text) else {
            return;
        };
        debug!(count = entry.count, "dispatch window closed");
        self.emit(entry.level, text.to_owned(), entry.count);
    }

    fn emit(&self, level: Level, text: String, count: u32) {
        let message = if count > 1 {
            format!("{text} (x{count} Events)")
        } else {
            text
        };

        let logger = &self.inner.logger;
        contain_panic("dispatch", "logger", || {
            if level.is_error_severity() {
                logger.warn(&message);
            } else {
                logger.info(&message);
            }
        });

        let report = Report {
            level,
            message,
            count,
            emitted_at: PTime::now(),
        };
        self.inner.channel.publish(
            report,
            &Target::Broadcast,
            &PublishOptions::from_origin("dispatch"),
        );
    }
}
