//! Per-editor plugin lifecycle.
//!
//! Each plugin moves through `Unmounted -> Mounting -> Mounted -> Disposing ->
//! Unmounted` independently. Mount order is the registry's enabled order
//! (priority desc, then registration order); teardown disposes in exact
//! reverse of the order plugins actually mounted.
//!
//! Hooks never run under a runtime lock, so a hook may call back into the
//! registry (e.g. disable another plugin) without deadlocking.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::bus::EventBus;
use super::context::PluginContext;
use super::descriptor::{HookResult, PluginDescriptor};
use super::registry::{PluginRegistry, RegistryEvent, RegistryObserver};
use super::{guarded, PluginError};
use crate::kernel::services::ports::{EditorSurface, RuntimeConfig, SurfaceHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginLifecycle {
    Unmounted,
    Mounting,
    Mounted,
    Disposing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    BeforeMount,
    Mount,
    ContentChange,
    Dispose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDiagnostic {
    pub plugin_id: String,
    pub phase: LifecyclePhase,
    pub message: String,
}

struct MountedPlugin {
    descriptor: PluginDescriptor,
    context: PluginContext,
}

#[derive(Default)]
struct RuntimeState {
    editor: Option<Arc<dyn EditorSurface>>,
    content_listener: Option<SurfaceHandle>,
    mounted: Vec<MountedPlugin>,
    lifecycle: FxHashMap<String, PluginLifecycle>,
}

struct RuntimeInner {
    registry: Arc<PluginRegistry>,
    bus: EventBus,
    config: RuntimeConfig,
    state: Mutex<RuntimeState>,
    diagnostics: Mutex<Vec<PluginDiagnostic>>,
    content_generation: AtomicU64,
}

pub struct PluginRuntime {
    inner: Arc<RuntimeInner>,
}

impl PluginRuntime {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self::with_config(registry, RuntimeConfig::default())
    }

    pub fn with_config(registry: Arc<PluginRegistry>, config: RuntimeConfig) -> Self {
        let inner = Arc::new(RuntimeInner {
            registry: Arc::clone(&registry),
            bus: EventBus::new(),
            config,
            state: Mutex::new(RuntimeState::default()),
            diagnostics: Mutex::new(Vec::new()),
            content_generation: AtomicU64::new(0),
        });

        let observer: Arc<dyn RegistryObserver> = inner.clone();
        registry.subscribe(Arc::downgrade(&observer));

        Self { inner }
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.inner.registry
    }

    pub fn is_attached(&self) -> bool {
        self.inner.state.lock().editor.is_some()
    }

    /// Binds the runtime to a live editor and mounts every enabled plugin:
    /// all `on_before_mount` hooks first, then `on_mount` one by one.
    pub fn mount(&self, editor: Arc<dyn EditorSurface>) {
        {
            let mut state = self.inner.state.lock();
            if state.editor.is_some() {
                tracing::warn!("plugin runtime already attached to an editor");
                return;
            }
            state.editor = Some(Arc::clone(&editor));
        }

        let weak = Arc::downgrade(&self.inner);
        let listener = editor.on_content_change(Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                RuntimeInner::schedule_content_change(&inner);
            }
        }));
        self.inner.state.lock().content_listener = Some(listener);

        let enabled = self.inner.registry.get_enabled();
        let ready: Vec<PluginDescriptor> = enabled
            .into_iter()
            .filter(|d| self.inner.before_mount(d, editor.as_ref()))
            .collect();

        for descriptor in ready {
            self.inner.mount_plugin(descriptor, &editor);
        }
    }

    /// Editor teardown: disposes every mounted plugin in reverse priority
    /// order and detaches from the editor.
    pub fn unmount(&self) {
        let (editor, listener) = {
            let mut state = self.inner.state.lock();
            (state.editor.take(), state.content_listener.take())
        };
        let Some(editor) = editor else {
            return;
        };
        if let Some(listener) = listener {
            editor.release(listener);
        }
        self.inner.content_generation.fetch_add(1, Ordering::Relaxed);

        loop {
            let last = self.inner.state.lock().mounted.pop();
            let Some(plugin) = last else {
                break;
            };
            self.inner.dispose_plugin(plugin);
        }
    }

    /// Debounced `on_content_change` dispatch. Outside a tokio runtime the
    /// hooks run immediately.
    pub fn notify_content_changed(&self) {
        RuntimeInner::schedule_content_change(&self.inner);
    }

    /// Runs `on_content_change` for every mounted plugin now.
    pub fn dispatch_content_change(&self) {
        self.inner.dispatch_content_change();
    }

    pub fn lifecycle(&self, id: &str) -> PluginLifecycle {
        self.inner.lifecycle(id)
    }

    pub fn mounted_ids(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .mounted
            .iter()
            .map(|p| p.descriptor.id.clone())
            .collect()
    }

    pub fn context(&self, id: &str) -> Option<PluginContext> {
        self.inner
            .state
            .lock()
            .mounted
            .iter()
            .find(|p| p.descriptor.id == id)
            .map(|p| p.context.clone())
    }

    pub fn diagnostics(&self) -> Vec<PluginDiagnostic> {
        self.inner.diagnostics.lock().clone()
    }
}

impl Drop for PluginRuntime {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl RuntimeInner {
    fn lifecycle(&self, id: &str) -> PluginLifecycle {
        self.state
            .lock()
            .lifecycle
            .get(id)
            .copied()
            .unwrap_or(PluginLifecycle::Unmounted)
    }

    fn set_lifecycle(&self, id: &str, lifecycle: PluginLifecycle) {
        let mut state = self.state.lock();
        if lifecycle == PluginLifecycle::Unmounted {
            state.lifecycle.remove(id);
        } else {
            state.lifecycle.insert(id.to_string(), lifecycle);
        }
    }

    fn editor(&self) -> Option<Arc<dyn EditorSurface>> {
        self.state.lock().editor.clone()
    }

    fn report(&self, plugin_id: &str, phase: LifecyclePhase, error: &PluginError) {
        tracing::error!(
            plugin_id = %plugin_id,
            phase = ?phase,
            error = %error,
            "plugin hook failed"
        );
        self.diagnostics.lock().push(PluginDiagnostic {
            plugin_id: plugin_id.to_string(),
            phase,
            message: error.to_string(),
        });
    }

    fn before_mount(&self, descriptor: &PluginDescriptor, editor: &dyn EditorSurface) -> bool {
        let Some(hook) = descriptor.hooks.on_before_mount.as_ref() else {
            return true;
        };
        match guarded(|| hook(editor)) {
            Ok(()) => true,
            Err(err) => {
                self.report(&descriptor.id, LifecyclePhase::BeforeMount, &err);
                false
            }
        }
    }

    fn mount_plugin(
        &self,
        descriptor: PluginDescriptor,
        editor: &Arc<dyn EditorSurface>,
    ) -> bool {
        {
            let mut state = self.state.lock();
            if state.lifecycle.contains_key(&descriptor.id) {
                return false;
            }
            state
                .lifecycle
                .insert(descriptor.id.clone(), PluginLifecycle::Mounting);
        }

        let context = PluginContext::new(&descriptor.id, Arc::clone(editor), self.bus.clone());
        let result: HookResult = match descriptor.hooks.on_mount.as_ref() {
            Some(hook) => guarded(|| hook(&context)),
            None => Ok(()),
        };

        match result {
            Ok(()) => {
                let order: Vec<String> = self
                    .registry
                    .get_enabled()
                    .into_iter()
                    .map(|d| d.id)
                    .collect();
                let rank = |id: &str| order.iter().position(|o| o == id).unwrap_or(usize::MAX);
                let mut state = self.state.lock();
                // Disabled or unregistered while mounting.
                if state.lifecycle.get(&descriptor.id) != Some(&PluginLifecycle::Mounting) {
                    drop(state);
                    context.dispose_all();
                    return false;
                }
                state
                    .lifecycle
                    .insert(descriptor.id.clone(), PluginLifecycle::Mounted);
                tracing::debug!(plugin_id = %descriptor.id, "plugin mounted");
                // Kept in priority order so teardown can pop from the back.
                let own = rank(&descriptor.id);
                let index = state
                    .mounted
                    .iter()
                    .position(|p| rank(&p.descriptor.id) > own)
                    .unwrap_or(state.mounted.len());
                state.mounted.insert(
                    index,
                    MountedPlugin {
                        descriptor,
                        context,
                    },
                );
                true
            }
            Err(err) => {
                context.dispose_all();
                self.set_lifecycle(&descriptor.id, PluginLifecycle::Unmounted);
                self.report(&descriptor.id, LifecyclePhase::Mount, &err);
                false
            }
        }
    }

    /// Brings up a single plugin on an already attached editor.
    fn mount_late(&self, id: &str) {
        let Some(editor) = self.editor() else {
            return;
        };
        if self.lifecycle(id) != PluginLifecycle::Unmounted {
            return;
        }
        let Some(descriptor) = self.registry.get(id) else {
            return;
        };
        if self.registry.is_enabled(id) != Some(true) {
            return;
        }
        if self.before_mount(&descriptor, editor.as_ref()) {
            self.mount_plugin(descriptor, &editor);
        }
    }

    fn dispose_by_id(&self, id: &str) -> bool {
        let plugin = {
            let mut state = self.state.lock();
            match state.mounted.iter().position(|p| p.descriptor.id == id) {
                Some(index) => state.mounted.remove(index),
                None => {
                    // Mount still in flight; `mount_plugin` notices and backs out.
                    if state.lifecycle.get(id) == Some(&PluginLifecycle::Mounting) {
                        state.lifecycle.remove(id);
                    }
                    return false;
                }
            }
        };
        self.dispose_plugin(plugin);
        true
    }

    fn dispose_plugin(&self, plugin: MountedPlugin) {
        let id = plugin.descriptor.id.clone();
        self.set_lifecycle(&id, PluginLifecycle::Disposing);

        let failures = plugin.context.dispose_all();
        if failures > 0 {
            tracing::warn!(plugin_id = %id, failures, "some disposables failed");
        }

        if let Some(hook) = plugin.descriptor.hooks.on_dispose.as_ref() {
            if let Err(err) = guarded(|| {
                hook();
                Ok(())
            }) {
                self.report(&id, LifecyclePhase::Dispose, &err);
            }
        }

        self.set_lifecycle(&id, PluginLifecycle::Unmounted);
        tracing::debug!(plugin_id = %id, "plugin disposed");
    }

    fn schedule_content_change(inner: &Arc<RuntimeInner>) {
        let generation = inner.content_generation.fetch_add(1, Ordering::Relaxed) + 1;

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            inner.dispatch_content_change();
            return;
        };

        let weak: Weak<RuntimeInner> = Arc::downgrade(inner);
        let delay = inner.config.content_debounce;
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.content_generation.load(Ordering::Relaxed) == generation {
                inner.dispatch_content_change();
            }
        });
    }

    fn dispatch_content_change(&self) {
        let Some(editor) = self.editor() else {
            return;
        };
        let targets: Vec<(PluginDescriptor, PluginContext)> = self
            .state
            .lock()
            .mounted
            .iter()
            .filter(|p| p.descriptor.hooks.on_content_change.is_some())
            .map(|p| (p.descriptor.clone(), p.context.clone()))
            .collect();
        if targets.is_empty() {
            return;
        }

        let content = editor.content();
        for (descriptor, context) in targets {
            let Some(hook) = descriptor.hooks.on_content_change.as_ref() else {
                continue;
            };
            if let Err(err) = guarded(|| {
                hook(&context, &content);
                Ok(())
            }) {
                self.report(&descriptor.id, LifecyclePhase::ContentChange, &err);
            }
        }
    }
}

impl RegistryObserver for RuntimeInner {
    fn on_registry_event(&self, event: &RegistryEvent) {
        if self.editor().is_none() {
            return;
        }

        match event {
            RegistryEvent::Enabled { id } => self.mount_late(id),
            RegistryEvent::Disabled { id } | RegistryEvent::Unregistered { id } => {
                self.dispose_by_id(id);
            }
            RegistryEvent::Registered { id, replaced } => {
                if *replaced {
                    self.dispose_by_id(id);
                }
                self.mount_late(id);
            }
        }
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/kernel/plugins/runtime.rs"]
mod tests;
