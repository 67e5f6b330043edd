//! Editor surface contract.
//!
//! The visual editor widget is an opaque capability provider. The plugin
//! runtime drives it only through [`EditorSurface`]; every registration the
//! surface hands out is identified by a [`SurfaceHandle`] and released with
//! [`EditorSurface::release`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 0-based line/column, columns counted in chars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        if end < start {
            Self {
                start: end,
                end: start,
            }
        } else {
            Self { start, end }
        }
    }

    pub fn collapsed(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerSeverity {
    Hint,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub range: Range,
    pub severity: MarkerSeverity,
    pub message: String,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    pub range: Range,
    pub class_name: String,
    pub hover_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Range,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionItem {
    pub label: String,
    pub insert_text: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAction {
    pub title: String,
    pub edits: Vec<TextEdit>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLens {
    pub range: Range,
    pub title: String,
    pub command: Option<String>,
}

/// What the host hands an inline-completions provider for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineCompletionQuery {
    pub position: Position,
    pub content: String,
    pub language: String,
}

pub trait CompletionItemProvider: Send + Sync {
    fn provide_completion_items(&self, content: &str, position: Position) -> Vec<CompletionItem>;
}

pub trait HoverProvider: Send + Sync {
    fn provide_hover(&self, content: &str, position: Position) -> Option<String>;
}

pub trait CodeActionProvider: Send + Sync {
    fn provide_code_actions(&self, content: &str, range: Range) -> Vec<CodeAction>;
}

pub trait CodeLensProvider: Send + Sync {
    fn provide_code_lenses(&self, content: &str) -> Vec<CodeLens>;
}

pub trait FormattingProvider: Send + Sync {
    fn provide_formatting_edits(&self, content: &str) -> Vec<TextEdit>;
}

/// Inline (ghost text) suggestions. `cancel` fires when the host abandons the
/// query; implementations must resolve to `None` rather than erroring.
#[async_trait]
pub trait InlineCompletionProvider: Send + Sync {
    async fn provide_inline_completions(
        &self,
        query: InlineCompletionQuery,
        cancel: CancellationToken,
    ) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Completion,
    Hover,
    CodeAction,
    CodeLens,
    Formatting,
    InlineCompletion,
}

#[derive(Clone)]
pub enum LanguageProvider {
    Completion(Arc<dyn CompletionItemProvider>),
    Hover(Arc<dyn HoverProvider>),
    CodeAction(Arc<dyn CodeActionProvider>),
    CodeLens(Arc<dyn CodeLensProvider>),
    Formatting(Arc<dyn FormattingProvider>),
    InlineCompletion(Arc<dyn InlineCompletionProvider>),
}

impl LanguageProvider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            LanguageProvider::Completion(_) => ProviderKind::Completion,
            LanguageProvider::Hover(_) => ProviderKind::Hover,
            LanguageProvider::CodeAction(_) => ProviderKind::CodeAction,
            LanguageProvider::CodeLens(_) => ProviderKind::CodeLens,
            LanguageProvider::Formatting(_) => ProviderKind::Formatting,
            LanguageProvider::InlineCompletion(_) => ProviderKind::InlineCompletion,
        }
    }
}

impl std::fmt::Debug for LanguageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LanguageProvider").field(&self.kind()).finish()
    }
}

pub type ActionCallback = Arc<dyn Fn() + Send + Sync>;
pub type CursorListener = Arc<dyn Fn(Position) + Send + Sync>;
pub type ContentListener = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct EditorAction {
    pub id: String,
    pub label: String,
    pub keybinding: Option<String>,
    pub run: ActionCallback,
}

impl std::fmt::Debug for EditorAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorAction")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("keybinding", &self.keybinding)
            .finish_non_exhaustive()
    }
}

/// Native operations of one live editor instance.
///
/// All methods take `&self`; implementations own their interior mutability
/// and must not hold internal locks while invoking listeners.
pub trait EditorSurface: Send + Sync {
    fn content(&self) -> String;
    fn set_content(&self, content: &str);
    fn replace_range(&self, range: Range, text: &str);

    fn language(&self) -> String;
    fn set_language(&self, language: &str);
    fn file_path(&self) -> Option<PathBuf>;

    fn cursor(&self) -> Position;
    fn set_cursor(&self, position: Position);
    fn selection(&self) -> Option<Range>;
    fn set_selection(&self, selection: Option<Range>);

    fn notify(&self, level: NotificationLevel, message: &str);

    fn add_action(&self, action: EditorAction) -> SurfaceHandle;
    fn register_provider(&self, language: &str, provider: LanguageProvider) -> SurfaceHandle;
    fn set_markers(&self, owner: &str, markers: Vec<Marker>);
    /// Replaces the decorations identified by `old` with `new`, returning the
    /// handles of the new ones.
    fn delta_decorations(&self, old: &[SurfaceHandle], new: Vec<Decoration>) -> Vec<SurfaceHandle>;
    fn on_cursor_change(&self, listener: CursorListener) -> SurfaceHandle;
    fn on_content_change(&self, listener: ContentListener) -> SurfaceHandle;

    /// Drops whatever registration `handle` names. Unknown handles are ignored.
    fn release(&self, handle: SurfaceHandle);

    // Global namespace, used from `on_before_mount`.
    fn register_language(&self, id: &str, extensions: &[&str]);
    fn define_theme(&self, name: &str, theme: serde_json::Value);
}
