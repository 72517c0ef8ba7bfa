use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use serde_json::Value;

/// Receiver of notifications addressed to one entity id.
///
/// Called from the channel's read loop, so implementations must not block.
pub trait NotificationListener: Send + Sync {
    /// Handle `event` for this target. `payload` is only set on payload
    /// channels.
    fn on_notification(&self, event: &str, data: Value, payload: Option<Bytes>);
}

/// Per-channel map of target id to listener.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<HashMap<String, Arc<dyn NotificationListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` under `id`, replacing any previous one.
    pub fn add(&self, id: impl Into<String>, listener: Arc<dyn NotificationListener>) {
        self.lock().insert(id.into(), listener);
    }

    pub fn remove(&self, id: &str) -> Option<Arc<dyn NotificationListener>> {
        self.lock().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn NotificationListener>> {
        self.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn NotificationListener>>> {
        // A listener never runs under this lock, so poisoning only means a
        // panic elsewhere; the map itself is still consistent.
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
