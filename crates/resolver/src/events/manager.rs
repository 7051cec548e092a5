//! In-process publish/subscribe for address-change notifications.
//!
//! One mutex guards the whole registry; `notify` holds it for the duration
//! of a delivery, so listeners and callbacks must not call back into the
//! manager.

use super::types::AddressChangeEvent;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::warn;

/// A named subscriber. Errors are logged and never abort delivery to the
/// remaining subscribers.
pub trait AddressChangeListener: Send + Sync {
    fn name(&self) -> &str;
    fn on_address_changed(
        &self,
        event: &AddressChangeEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

pub type EventCallback = Box<dyn Fn(&AddressChangeEvent) + Send + Sync>;
pub type EventFilter = Box<dyn Fn(&AddressChangeEvent) -> bool + Send + Sync>;

struct ListenerEntry {
    listener: Arc<dyn AddressChangeListener>,
    /// Registry-level switch; the trait object itself stays immutable.
    enabled: bool,
}

#[derive(Default)]
struct Registry {
    listeners: HashMap<String, ListenerEntry>,
    callbacks: HashMap<String, EventCallback>,
    filters: HashMap<String, EventFilter>,
    paused: bool,
    queue: VecDeque<AddressChangeEvent>,
}

#[derive(Default)]
pub struct EventManager {
    registry: Mutex<Registry>,
}

static GLOBAL: OnceLock<Arc<EventManager>> = OnceLock::new();

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide instance. Tests construct their own managers instead.
    pub fn global() -> Arc<EventManager> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(EventManager::new())))
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register_listener(&self, listener: Arc<dyn AddressChangeListener>) {
        let name = listener.name().to_string();
        self.lock().listeners.insert(
            name,
            ListenerEntry {
                listener,
                enabled: true,
            },
        );
    }

    pub fn unregister_listener(&self, name: &str) {
        self.lock().listeners.remove(name);
    }

    pub fn enable_listener(&self, name: &str) {
        if let Some(entry) = self.lock().listeners.get_mut(name) {
            entry.enabled = true;
        }
    }

    pub fn disable_listener(&self, name: &str) {
        if let Some(entry) = self.lock().listeners.get_mut(name) {
            entry.enabled = false;
        }
    }

    pub fn add_callback<F>(&self, name: &str, callback: F)
    where
        F: Fn(&AddressChangeEvent) + Send + Sync + 'static,
    {
        self.lock()
            .callbacks
            .insert(name.to_string(), Box::new(callback));
    }

    pub fn remove_callback(&self, name: &str) {
        self.lock().callbacks.remove(name);
    }

    /// An event is delivered only when every installed filter accepts it.
    pub fn add_filter<F>(&self, name: &str, filter: F)
    where
        F: Fn(&AddressChangeEvent) -> bool + Send + Sync + 'static,
    {
        self.lock()
            .filters
            .insert(name.to_string(), Box::new(filter));
    }

    pub fn remove_filter(&self, name: &str) {
        self.lock().filters.remove(name);
    }

    pub fn pause_events(&self) {
        self.lock().paused = true;
    }

    /// Drains the queue in FIFO order, delivering through the current
    /// filters and subscribers.
    pub fn resume_events(&self) {
        let mut registry = self.lock();
        registry.paused = false;
        while let Some(event) = registry.queue.pop_front() {
            Self::deliver(&registry, &event);
        }
    }

    pub fn clear_queue(&self) {
        self.lock().queue.clear();
    }

    pub fn queued_events(&self) -> usize {
        self.lock().queue.len()
    }

    /// Listeners plus callbacks.
    pub fn listener_count(&self) -> usize {
        let registry = self.lock();
        registry.listeners.len() + registry.callbacks.len()
    }

    pub fn notify(&self, event: AddressChangeEvent) {
        let mut registry = self.lock();
        if registry.paused {
            registry.queue.push_back(event);
            return;
        }
        Self::deliver(&registry, &event);
    }

    fn deliver(registry: &Registry, event: &AddressChangeEvent) {
        if !registry.filters.values().all(|filter| filter(event)) {
            return;
        }

        for (name, entry) in &registry.listeners {
            if !entry.enabled {
                continue;
            }
            if let Err(e) = entry.listener.on_address_changed(event) {
                warn!(listener = %name, error = %e, "Listener failed to handle address change");
            }
        }

        for callback in registry.callbacks.values() {
            callback(event);
        }
    }
}
