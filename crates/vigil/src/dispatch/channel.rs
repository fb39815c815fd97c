//! In-process publish/subscribe for reports.
//!
//! Transforms run in registration order on every published report, then each
//! subscriber sees the transformed report. Callbacks run on the publishing
//! task with no channel lock held, so a subscriber may publish or unsubscribe
//! from inside its callback. A panicking transform is skipped and a panicking
//! subscriber does not keep the report from later subscribers.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::warn;
use vigil_types::{PublishOptions, Report, SubscriptionId, Target};

use crate::unwind::{catch_panic, contain_panic};

type Callback = Arc<dyn Fn(&Report, &Target, &PublishOptions) + Send + Sync>;
type Transform = Arc<dyn Fn(Report) -> Report + Send + Sync>;

#[derive(Clone, Default)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

#[derive(Default)]
struct ChannelInner {
    subscribers: Mutex<Subscribers>,
    transforms: RwLock<Vec<Transform>>,
}

struct Subscribers {
    next_id: SubscriptionId,
    callbacks: BTreeMap<SubscriptionId, Callback>,
}

impl Default for Subscribers {
    fn default() -> Self {
        Self {
            next_id: SubscriptionId::first(),
            callbacks: BTreeMap::new(),
        }
    }
}

impl Channel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for every future publish. The subscription lasts
    /// until the returned handle is dropped or `unsubscribe`d.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(
        &self,
        callback: impl Fn(&Report, &Target, &PublishOptions) + Send + Sync + 'static,
    ) -> Subscription {
        let mut subscribers = self.inner.subscribers.lock();
        let id = subscribers.next_id;
        subscribers.next_id = id.next();
        subscribers.callbacks.insert(id, Arc::new(callback));
        Subscription {
            id,
            channel: Arc::downgrade(&self.inner),
        }
    }

    pub fn register_transform(&self, transform: impl Fn(Report) -> Report + Send + Sync + 'static) {
        self.inner.transforms.write().push(Arc::new(transform));
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().callbacks.len()
    }

    pub fn publish(&self, report: Report, target: &Target, options: &PublishOptions) {
        let transforms = self.inner.transforms.read().clone();
        let report = transforms.iter().fold(report, |report, transform| {
            let untouched = report.clone();
            catch_panic(|| transform(report)).unwrap_or_else(|message| {
                warn!(%message, "report transform panicked; skipping it");
                untouched
            })
        });

        let callbacks: Vec<Callback> = self
            .inner
            .subscribers
            .lock()
            .callbacks
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            contain_panic("channel", "subscriber", || callback(&report, target, options));
        }
    }
}

/// Handle for one subscriber. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriptionId,
    channel: Weak<ChannelInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.subscribers.lock().callbacks.remove(&self.id);
        }
    }
}
