//! Process-wide plugin catalogue.
//!
//! The registry owns every known descriptor plus its enabled flag. Lifecycle
//! runtimes never copy it; they hold an `Arc` and subscribe as observers so
//! enable/disable from any editor instance reaches all of them.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::{Arc, OnceLock, Weak};

use super::descriptor::{PluginDescriptor, PluginInfo};
use crate::kernel::services::ports::PluginOverride;

static GLOBAL_REGISTRY: OnceLock<Arc<PluginRegistry>> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Registered { id: String, replaced: bool },
    Unregistered { id: String },
    Enabled { id: String },
    Disabled { id: String },
}

impl RegistryEvent {
    pub fn id(&self) -> &str {
        match self {
            RegistryEvent::Registered { id, .. }
            | RegistryEvent::Unregistered { id }
            | RegistryEvent::Enabled { id }
            | RegistryEvent::Disabled { id } => id,
        }
    }
}

pub trait RegistryObserver: Send + Sync {
    fn on_registry_event(&self, event: &RegistryEvent);
}

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub descriptor: PluginDescriptor,
    pub enabled: bool,
    seq: u64,
}

#[derive(Default)]
struct RegistryState {
    entries: FxHashMap<String, RegistryEntry>,
    next_seq: u64,
}

impl RegistryState {
    fn ordered(&self) -> Vec<&RegistryEntry> {
        let mut entries: Vec<&RegistryEntry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    state: Mutex<RegistryState>,
    observers: Mutex<Vec<Weak<dyn RegistryObserver>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared registry every editor instance consults.
    pub fn global() -> Arc<PluginRegistry> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(PluginRegistry::new()))
            .clone()
    }

    /// Upsert. New entries start enabled; a replaced entry keeps its flag and
    /// its place in registration order.
    pub fn register(&self, descriptor: PluginDescriptor) {
        let id = descriptor.id.clone();
        let replaced = {
            let mut state = self.state.lock();
            if let Some(existing) = state.entries.get_mut(&id) {
                existing.descriptor = descriptor;
                true
            } else {
                let seq = state.next_seq;
                state.next_seq += 1;
                state.entries.insert(
                    id.clone(),
                    RegistryEntry {
                        descriptor,
                        enabled: true,
                        seq,
                    },
                );
                false
            }
        };

        tracing::debug!(plugin_id = %id, replaced, "plugin registered");
        self.notify(&RegistryEvent::Registered { id, replaced });
    }

    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.state.lock().entries.remove(id).is_some();
        if removed {
            tracing::debug!(plugin_id = %id, "plugin unregistered");
            self.notify(&RegistryEvent::Unregistered { id: id.to_string() });
        }
        removed
    }

    /// Returns `true` if the flag changed.
    pub fn enable(&self, id: &str) -> bool {
        self.set_enabled(id, true)
    }

    pub fn disable(&self, id: &str) -> bool {
        self.set_enabled(id, false)
    }

    /// Flips the flag and returns the new value, or `None` for unknown ids.
    pub fn toggle(&self, id: &str) -> Option<bool> {
        let enabled = !self.is_enabled(id)?;
        self.set_enabled(id, enabled);
        Some(enabled)
    }

    pub fn is_enabled(&self, id: &str) -> Option<bool> {
        self.state.lock().entries.get(id).map(|e| e.enabled)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<PluginDescriptor> {
        self.state
            .lock()
            .entries
            .get(id)
            .map(|e| e.descriptor.clone())
    }

    /// Enabled descriptors by descending priority, ties in registration order.
    pub fn get_enabled(&self) -> Vec<PluginDescriptor> {
        let state = self.state.lock();
        let mut enabled: Vec<&RegistryEntry> =
            state.entries.values().filter(|e| e.enabled).collect();
        enabled.sort_by(|a, b| {
            b.descriptor
                .priority
                .cmp(&a.descriptor.priority)
                .then_with(|| a.seq.cmp(&b.seq))
        });
        enabled.into_iter().map(|e| e.descriptor.clone()).collect()
    }

    /// Every entry in registration order.
    pub fn snapshot(&self) -> Vec<PluginInfo> {
        self.state
            .lock()
            .ordered()
            .into_iter()
            .map(|e| PluginInfo::from_descriptor(&e.descriptor, e.enabled))
            .collect()
    }

    /// One diagnostic per declared dependency that is missing or disabled.
    /// Advisory only: nothing here stops a plugin from mounting.
    pub fn validate_dependencies(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut diagnostics = Vec::new();

        for entry in state.ordered() {
            for dep in &entry.descriptor.dependencies {
                match state.entries.get(dep) {
                    None => diagnostics.push(format!(
                        "plugin \"{}\" depends on \"{}\", which is not registered",
                        entry.descriptor.id, dep
                    )),
                    Some(target) if !target.enabled => diagnostics.push(format!(
                        "plugin \"{}\" depends on \"{}\", which is disabled",
                        entry.descriptor.id, dep
                    )),
                    Some(_) => {}
                }
            }
        }

        diagnostics
    }

    /// Applies `enabled` overrides for registered ids; unknown ids are logged.
    pub fn apply_overrides(&self, overrides: &[PluginOverride]) {
        for item in overrides {
            if !self.contains(&item.id) {
                tracing::warn!(plugin_id = %item.id, "override for unknown plugin");
                continue;
            }
            self.set_enabled(&item.id, item.enabled);
        }
    }

    pub fn subscribe(&self, observer: Weak<dyn RegistryObserver>) {
        let mut observers = self.observers.lock();
        observers.retain(|o| o.strong_count() > 0);
        observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .iter()
            .filter(|o| o.strong_count() > 0)
            .count()
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let changed = {
            let mut state = self.state.lock();
            match state.entries.get_mut(id) {
                Some(entry) if entry.enabled != enabled => {
                    entry.enabled = enabled;
                    true
                }
                _ => false,
            }
        };

        if changed {
            tracing::debug!(plugin_id = %id, enabled, "plugin flag changed");
            let event = if enabled {
                RegistryEvent::Enabled { id: id.to_string() }
            } else {
                RegistryEvent::Disabled { id: id.to_string() }
            };
            self.notify(&event);
        }
        changed
    }

    // Observers run with no registry lock held so they may call back in.
    fn notify(&self, event: &RegistryEvent) {
        let observers: Vec<Arc<dyn RegistryObserver>> = {
            let mut observers = self.observers.lock();
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };

        for observer in observers {
            observer.on_registry_event(event);
        }
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/kernel/plugins/registry.rs"]
mod tests;
