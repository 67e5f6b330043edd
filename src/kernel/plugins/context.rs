//! Capability-scoped facade handed to a plugin on mount.
//!
//! Every registration made through the facade (actions, providers, listeners,
//! markers, decorations, bus subscriptions) is recorded as a [`Disposable`]
//! against the owning plugin, so the runtime can release it on dispose.

use parking_lot::Mutex;
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use super::bus::{Disposable, EventBus};
use super::panic_message;
use crate::kernel::services::ports::{
    Decoration, EditorAction, EditorSurface, InlineCompletionProvider, LanguageProvider, Marker,
    NotificationLevel, Position, Range, SurfaceHandle,
};

#[derive(Clone)]
pub struct PluginContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    plugin_id: String,
    editor: Arc<dyn EditorSurface>,
    bus: EventBus,
    disposables: Mutex<Vec<Disposable>>,
    decorations: Mutex<Vec<SurfaceHandle>>,
    markers_set: Mutex<bool>,
}

impl PluginContext {
    pub(crate) fn new(plugin_id: &str, editor: Arc<dyn EditorSurface>, bus: EventBus) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                plugin_id: plugin_id.to_string(),
                editor,
                bus,
                disposables: Mutex::new(Vec::new()),
                decorations: Mutex::new(Vec::new()),
                markers_set: Mutex::new(false),
            }),
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.inner.plugin_id
    }

    pub fn editor(&self) -> &Arc<dyn EditorSurface> {
        &self.inner.editor
    }

    pub fn content(&self) -> String {
        self.inner.editor.content()
    }

    pub fn set_content(&self, content: &str) {
        self.inner.editor.set_content(content);
    }

    pub fn replace_range(&self, range: Range, text: &str) {
        self.inner.editor.replace_range(range, text);
    }

    pub fn language(&self) -> String {
        self.inner.editor.language()
    }

    pub fn set_language(&self, language: &str) {
        self.inner.editor.set_language(language);
    }

    pub fn file_path(&self) -> Option<PathBuf> {
        self.inner.editor.file_path()
    }

    pub fn cursor(&self) -> Position {
        self.inner.editor.cursor()
    }

    pub fn set_cursor(&self, position: Position) {
        self.inner.editor.set_cursor(position);
    }

    pub fn selection(&self) -> Option<Range> {
        self.inner.editor.selection()
    }

    pub fn set_selection(&self, selection: Option<Range>) {
        self.inner.editor.set_selection(selection);
    }

    pub fn notify(&self, level: NotificationLevel, message: &str) {
        self.inner.editor.notify(level, message);
    }

    pub fn add_action<F>(&self, id: &str, label: &str, keybinding: Option<&str>, run: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let handle = self.inner.editor.add_action(EditorAction {
            id: id.to_string(),
            label: label.to_string(),
            keybinding: keybinding.map(str::to_string),
            run: Arc::new(run),
        });
        self.track_handle(handle);
    }

    pub fn register_provider(&self, language: &str, provider: LanguageProvider) {
        let handle = self.inner.editor.register_provider(language, provider);
        self.track_handle(handle);
    }

    pub fn register_inline_completion_provider(
        &self,
        language: &str,
        provider: Arc<dyn InlineCompletionProvider>,
    ) {
        self.register_provider(language, LanguageProvider::InlineCompletion(provider));
    }

    /// Markers are owned by the plugin id and cleared on dispose.
    pub fn set_markers(&self, markers: Vec<Marker>) {
        self.inner
            .editor
            .set_markers(&self.inner.plugin_id, markers);

        let mut markers_set = self.inner.markers_set.lock();
        if !*markers_set {
            *markers_set = true;
            let editor = Arc::clone(&self.inner.editor);
            let owner = self.inner.plugin_id.clone();
            self.register_disposable(Disposable::new(move || {
                editor.set_markers(&owner, Vec::new());
            }));
        }
    }

    pub fn apply_decorations(&self, decorations: Vec<Decoration>) -> Vec<SurfaceHandle> {
        let handles = self.inner.editor.delta_decorations(&[], decorations);
        self.inner.decorations.lock().extend(handles.iter().copied());
        handles
    }

    pub fn remove_decorations(&self, handles: &[SurfaceHandle]) {
        self.inner.editor.delta_decorations(handles, Vec::new());
        self.inner
            .decorations
            .lock()
            .retain(|h| !handles.contains(h));
    }

    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        self.inner.bus.emit(event, payload)
    }

    pub fn on<F>(&self, event: &str, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let subscription = self.inner.bus.on(event, handler);
        self.register_disposable(subscription);
    }

    pub fn on_cursor_change<F>(&self, listener: F)
    where
        F: Fn(Position) + Send + Sync + 'static,
    {
        let handle = self.inner.editor.on_cursor_change(Arc::new(listener));
        self.track_handle(handle);
    }

    /// Fires on every edit, before the runtime's settled `on_content_change`.
    pub fn on_did_change_content<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let handle = self.inner.editor.on_content_change(Arc::new(listener));
        self.track_handle(handle);
    }

    pub fn register_disposable(&self, disposable: Disposable) {
        self.inner.disposables.lock().push(disposable);
    }

    pub fn disposable_count(&self) -> usize {
        self.inner.disposables.lock().len()
    }

    fn track_handle(&self, handle: SurfaceHandle) {
        let editor = Arc::clone(&self.inner.editor);
        self.register_disposable(Disposable::new(move || editor.release(handle)));
    }

    /// Runs every recorded disposable, then clears leftover decorations.
    /// Returns how many disposables failed; failures are logged and do not
    /// stop the rest.
    pub(crate) fn dispose_all(&self) -> usize {
        let disposables = std::mem::take(&mut *self.inner.disposables.lock());
        let mut failures = 0;

        for mut disposable in disposables {
            if let Err(err) = panic::catch_unwind(AssertUnwindSafe(|| disposable.dispose())) {
                failures += 1;
                tracing::error!(
                    plugin_id = %self.inner.plugin_id,
                    panic = %panic_message(err.as_ref()),
                    "disposable failed"
                );
            }
        }

        let decorations = std::mem::take(&mut *self.inner.decorations.lock());
        if !decorations.is_empty() {
            self.inner.editor.delta_decorations(&decorations, Vec::new());
        }
        *self.inner.markers_set.lock() = false;

        failures
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_id", &self.inner.plugin_id)
            .field("disposables", &self.disposable_count())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/kernel/plugins/context.rs"]
mod tests;
