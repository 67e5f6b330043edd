//! In-process [`EditorSurface`] backed by a rope.
//!
//! Used by the CLI and by tests as the host editor. Registrations are kept in
//! a handle-keyed table so anything a plugin registers can be inspected and
//! released individually.

use parking_lot::Mutex;
use ropey::Rope;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::kernel::language::language_for_path;
use crate::kernel::services::ports::{
    ContentListener, CursorListener, Decoration, EditorAction, EditorSurface,
    InlineCompletionProvider, InlineCompletionQuery, LanguageProvider, Marker, NotificationLevel,
    Position, ProviderKind, Range, SurfaceHandle,
};
use crate::kernel::text::{char_to_position, clamp_position, position_to_char};

pub const ANY_LANGUAGE: &str = "*";

enum Registration {
    Action(EditorAction),
    Provider {
        language: String,
        provider: LanguageProvider,
    },
    CursorListener(CursorListener),
    ContentListener(ContentListener),
}

struct EditorState {
    rope: Rope,
    language: String,
    path: Option<PathBuf>,
    cursor: Position,
    selection: Option<Range>,
    registrations: FxHashMap<SurfaceHandle, Registration>,
    decorations: FxHashMap<SurfaceHandle, Decoration>,
    markers: FxHashMap<String, Vec<Marker>>,
    notifications: Vec<(NotificationLevel, String)>,
    languages: FxHashMap<String, Vec<String>>,
    themes: FxHashMap<String, Value>,
}

pub struct MemoryEditor {
    state: Mutex<EditorState>,
    next_handle: AtomicU64,
}

impl MemoryEditor {
    pub fn new(content: &str, language: &str) -> Self {
        Self {
            state: Mutex::new(EditorState {
                rope: Rope::from_str(content),
                language: language.to_string(),
                path: None,
                cursor: Position::default(),
                selection: None,
                registrations: FxHashMap::default(),
                decorations: FxHashMap::default(),
                markers: FxHashMap::default(),
                notifications: Vec::new(),
                languages: FxHashMap::default(),
                themes: FxHashMap::default(),
            }),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Loads `path` with its language detected from the extension.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let editor = Self::new(&content, language_for_path(path));
        editor.state.lock().path = Some(path.to_path_buf());
        Ok(editor)
    }

    pub fn with_path(self, path: impl Into<PathBuf>) -> Self {
        self.state.lock().path = Some(path.into());
        self
    }

    fn alloc_handle(&self) -> SurfaceHandle {
        SurfaceHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    fn register(&self, registration: Registration) -> SurfaceHandle {
        let handle = self.alloc_handle();
        self.state.lock().registrations.insert(handle, registration);
        handle
    }

    fn content_listeners(state: &EditorState) -> Vec<ContentListener> {
        state
            .registrations
            .values()
            .filter_map(|r| match r {
                Registration::ContentListener(l) => Some(Arc::clone(l)),
                _ => None,
            })
            .collect()
    }

    fn cursor_listeners(state: &EditorState) -> Vec<CursorListener> {
        state
            .registrations
            .values()
            .filter_map(|r| match r {
                Registration::CursorListener(l) => Some(Arc::clone(l)),
                _ => None,
            })
            .collect()
    }

    // Listeners run after the lock is released so they may read the editor.
    fn fire_content_changed(&self, cursor: Option<Position>) {
        let (content_listeners, cursor_listeners) = {
            let state = self.state.lock();
            (
                Self::content_listeners(&state),
                if cursor.is_some() {
                    Self::cursor_listeners(&state)
                } else {
                    Vec::new()
                },
            )
        };
        for listener in content_listeners {
            listener();
        }
        if let Some(cursor) = cursor {
            for listener in cursor_listeners {
                listener(cursor);
            }
        }
    }

    /// Inline-completion providers for `language`, including `*` ones, in
    /// registration order.
    pub fn inline_completion_providers(
        &self,
        language: &str,
    ) -> Vec<Arc<dyn InlineCompletionProvider>> {
        let state = self.state.lock();
        let mut matching: Vec<(&SurfaceHandle, Arc<dyn InlineCompletionProvider>)> = state
            .registrations
            .iter()
            .filter_map(|(handle, r)| match r {
                Registration::Provider {
                    language: lang,
                    provider: LanguageProvider::InlineCompletion(p),
                } if lang == language || lang == ANY_LANGUAGE => Some((handle, Arc::clone(p))),
                _ => None,
            })
            .collect();
        matching.sort_by_key(|(handle, _)| handle.0);
        matching.into_iter().map(|(_, p)| p).collect()
    }

    /// Asks the first matching inline-completion provider for a suggestion at
    /// the current cursor, the way the host widget would.
    pub async fn request_inline_completion(&self, cancel: CancellationToken) -> Option<String> {
        let query = {
            let state = self.state.lock();
            InlineCompletionQuery {
                position: state.cursor,
                content: state.rope.to_string(),
                language: state.language.clone(),
            }
        };
        let provider = self
            .inline_completion_providers(&query.language)
            .into_iter()
            .next()?;
        provider.provide_inline_completions(query, cancel).await
    }

    pub fn provider_count(&self, kind: ProviderKind) -> usize {
        self.state
            .lock()
            .registrations
            .values()
            .filter(|r| {
                matches!(r, Registration::Provider { provider, .. } if provider.kind() == kind)
            })
            .count()
    }

    pub fn action_ids(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut actions: Vec<(&SurfaceHandle, String)> = state
            .registrations
            .iter()
            .filter_map(|(handle, r)| match r {
                Registration::Action(action) => Some((handle, action.id.clone())),
                _ => None,
            })
            .collect();
        actions.sort_by_key(|(handle, _)| handle.0);
        actions.into_iter().map(|(_, id)| id).collect()
    }

    /// Runs a registered action; `false` when no action has that id.
    pub fn run_action(&self, id: &str) -> bool {
        let run = self
            .state
            .lock()
            .registrations
            .values()
            .find_map(|r| match r {
                Registration::Action(action) if action.id == id => Some(Arc::clone(&action.run)),
                _ => None,
            });
        match run {
            Some(run) => {
                run();
                true
            }
            None => false,
        }
    }

    pub fn registration_count(&self) -> usize {
        self.state.lock().registrations.len()
    }

    pub fn notifications(&self) -> Vec<(NotificationLevel, String)> {
        self.state.lock().notifications.clone()
    }

    pub fn markers(&self, owner: &str) -> Vec<Marker> {
        self.state
            .lock()
            .markers
            .get(owner)
            .cloned()
            .unwrap_or_default()
    }

    pub fn decorations(&self) -> Vec<Decoration> {
        let state = self.state.lock();
        let mut decorations: Vec<(&SurfaceHandle, &Decoration)> =
            state.decorations.iter().collect();
        decorations.sort_by_key(|(handle, _)| handle.0);
        decorations.into_iter().map(|(_, d)| d.clone()).collect()
    }

    pub fn language_extensions(&self, id: &str) -> Option<Vec<String>> {
        self.state.lock().languages.get(id).cloned()
    }

    pub fn theme(&self, name: &str) -> Option<Value> {
        self.state.lock().themes.get(name).cloned()
    }
}

impl EditorSurface for MemoryEditor {
    fn content(&self) -> String {
        self.state.lock().rope.to_string()
    }

    fn set_content(&self, content: &str) {
        let cursor = {
            let mut state = self.state.lock();
            state.rope = Rope::from_str(content);
            state.selection = None;
            let cursor = clamp_position(&state.rope, state.cursor);
            state.cursor = cursor;
            cursor
        };
        self.fire_content_changed(Some(cursor));
    }

    /// Replaces `range` and leaves the cursor at the end of the inserted text.
    fn replace_range(&self, range: Range, text: &str) {
        let cursor = {
            let mut state = self.state.lock();
            let start = position_to_char(&state.rope, range.start);
            let end = position_to_char(&state.rope, range.end);
            state.rope.remove(start..end);
            state.rope.insert(start, text);
            let cursor = char_to_position(&state.rope, start + text.chars().count());
            state.cursor = cursor;
            state.selection = None;
            cursor
        };
        self.fire_content_changed(Some(cursor));
    }

    fn language(&self) -> String {
        self.state.lock().language.clone()
    }

    fn set_language(&self, language: &str) {
        self.state.lock().language = language.to_string();
    }

    fn file_path(&self) -> Option<PathBuf> {
        self.state.lock().path.clone()
    }

    fn cursor(&self) -> Position {
        self.state.lock().cursor
    }

    fn set_cursor(&self, position: Position) {
        let (cursor, listeners) = {
            let mut state = self.state.lock();
            let cursor = clamp_position(&state.rope, position);
            state.cursor = cursor;
            (cursor, Self::cursor_listeners(&state))
        };
        for listener in listeners {
            listener(cursor);
        }
    }

    fn selection(&self) -> Option<Range> {
        self.state.lock().selection
    }

    fn set_selection(&self, selection: Option<Range>) {
        let mut state = self.state.lock();
        let clamped = selection.map(|r| {
            Range::new(
                clamp_position(&state.rope, r.start),
                clamp_position(&state.rope, r.end),
            )
        });
        state.selection = clamped;
    }

    fn notify(&self, level: NotificationLevel, message: &str) {
        tracing::info!(level = ?level, message = %message, "editor notification");
        self.state
            .lock()
            .notifications
            .push((level, message.to_string()));
    }

    fn add_action(&self, action: EditorAction) -> SurfaceHandle {
        self.register(Registration::Action(action))
    }

    fn register_provider(&self, language: &str, provider: LanguageProvider) -> SurfaceHandle {
        self.register(Registration::Provider {
            language: language.to_string(),
            provider,
        })
    }

    fn set_markers(&self, owner: &str, markers: Vec<Marker>) {
        let mut state = self.state.lock();
        if markers.is_empty() {
            state.markers.remove(owner);
        } else {
            state.markers.insert(owner.to_string(), markers);
        }
    }

    fn delta_decorations(&self, old: &[SurfaceHandle], new: Vec<Decoration>) -> Vec<SurfaceHandle> {
        let handles: Vec<SurfaceHandle> = new.iter().map(|_| self.alloc_handle()).collect();
        let mut state = self.state.lock();
        for handle in old {
            state.decorations.remove(handle);
        }
        for (handle, decoration) in handles.iter().zip(new) {
            state.decorations.insert(*handle, decoration);
        }
        handles
    }

    fn on_cursor_change(&self, listener: CursorListener) -> SurfaceHandle {
        self.register(Registration::CursorListener(listener))
    }

    fn on_content_change(&self, listener: ContentListener) -> SurfaceHandle {
        self.register(Registration::ContentListener(listener))
    }

    fn release(&self, handle: SurfaceHandle) {
        let mut state = self.state.lock();
        if state.registrations.remove(&handle).is_none() {
            state.decorations.remove(&handle);
        }
    }

    fn register_language(&self, id: &str, extensions: &[&str]) {
        self.state.lock().languages.insert(
            id.to_string(),
            extensions.iter().map(|e| e.to_string()).collect(),
        );
    }

    fn define_theme(&self, name: &str, theme: Value) {
        self.state.lock().themes.insert(name.to_string(), theme);
    }
}

impl std::fmt::Debug for MemoryEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryEditor")
            .field("language", &state.language)
            .field("path", &state.path)
            .field("cursor", &state.cursor)
            .field("registrations", &state.registrations.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/adapters/memory_editor.rs"]
mod tests;
