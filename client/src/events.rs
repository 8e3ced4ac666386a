//! Status tag subscriptions.
//!
//! Subscribers registered for a tag are notified with the originating call and its result
//! whenever a result carrying that `stat` comes back, right before the call is settled.

use crate::{record::CallRecord, response::CallResult};
use batchwire_core::warn;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

pub type ListenerId = u64;

pub type EventCallback = Arc<dyn Fn(&CallRecord, &CallResult) + Send + Sync>;

#[derive(Default)]
pub struct EventHub {
    listeners: RwLock<IndexMap<String, Vec<(ListenerId, EventCallback)>>>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for results whose `stat` equals `tag`. Callbacks of a tag run in
    /// registration order.
    pub fn on<F>(&self, tag: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(&CallRecord, &CallResult) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().entry(tag.into()).or_default().push((id, Arc::new(callback)));
        id
    }

    /// Unregisters a callback. Returns false if the id is unknown.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let mut found = false;
        listeners.retain(|_, callbacks| {
            let before = callbacks.len();
            callbacks.retain(|(listener_id, _)| *listener_id != id);
            found |= callbacks.len() != before;
            !callbacks.is_empty()
        });
        found
    }

    pub fn listener_count(&self, tag: &str) -> usize {
        self.listeners.read().get(tag).map_or(0, Vec::len)
    }

    /// Runs the callbacks registered for the `stat` of `result`.
    ///
    /// The registry is not locked while callbacks run, so a callback may subscribe or
    /// unsubscribe. A panicking callback is reported and does not stop the others.
    pub fn notify(&self, record: &CallRecord, result: &CallResult) {
        let Some(tag) = result.stat.as_deref() else {
            return;
        };
        let callbacks = match self.listeners.read().get(tag) {
            Some(callbacks) => callbacks.iter().map(|(_, callback)| callback.clone()).collect::<Vec<_>>(),
            None => return,
        };
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(record, result))).is_err() {
                warn!("[EventHub] a `{}` subscriber panicked while handling {}", tag, record.method());
            }
        }
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.read();
        f.debug_struct("EventHub").field("tags", &listeners.iter().map(|(tag, x)| (tag.clone(), x.len())).collect::<Vec<_>>()).finish()
    }
}
