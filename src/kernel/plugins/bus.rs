//! Per-editor publish/subscribe channel for inter-plugin messages.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use slotmap::SlotMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use super::panic_message;

/// A cleanup action. Disposing is idempotent; dropping without disposing
/// leaves the registration in place.
pub struct Disposable {
    dispose: Option<Box<dyn FnOnce() + Send>>,
}

impl Disposable {
    pub fn new(dispose: impl FnOnce() + Send + 'static) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    pub fn dispose(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.dispose.is_none()
    }
}

impl std::fmt::Debug for Disposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposable")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

slotmap::new_key_type! {
    struct SubscriptionKey;
}

#[derive(Default)]
struct BusState {
    handlers: SlotMap<SubscriptionKey, EventHandler>,
    by_event: FxHashMap<String, Vec<SubscriptionKey>>,
}

impl BusState {
    fn remove(&mut self, event: &str, key: SubscriptionKey) {
        if self.handlers.remove(key).is_none() {
            return;
        }
        if let Some(keys) = self.by_event.get_mut(event) {
            keys.retain(|k| *k != key);
            if keys.is_empty() {
                self.by_event.remove(event);
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `handler` to `event`. The returned disposable unsubscribes.
    pub fn on<F>(&self, event: &str, handler: F) -> Disposable
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let key = {
            let mut state = self.state.lock();
            let key = state.handlers.insert(Arc::new(handler));
            state.by_event.entry(event.to_string()).or_default().push(key);
            key
        };

        let weak: Weak<Mutex<BusState>> = Arc::downgrade(&self.state);
        let event = event.to_string();
        Disposable::new(move || {
            if let Some(state) = weak.upgrade() {
                state.lock().remove(&event, key);
            }
        })
    }

    /// Delivers `payload` to every handler of `event` in subscription order
    /// and returns how many ran. A panicking handler is logged and skipped.
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        let handlers: Vec<EventHandler> = {
            let state = self.state.lock();
            let Some(keys) = state.by_event.get(event) else {
                return 0;
            };
            keys.iter()
                .filter_map(|key| state.handlers.get(*key).cloned())
                .collect()
        };

        let mut delivered = 0;
        for handler in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    tracing::error!(
                        event = %event,
                        panic = %panic_message(err.as_ref()),
                        "event handler panicked"
                    );
                }
            }
        }
        delivered
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.state
            .lock()
            .by_event
            .get(event)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/kernel/plugins/bus.rs"]
mod tests;
