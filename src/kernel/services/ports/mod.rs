//! Service ports: traits + data contracts.

pub mod ai;
pub mod config;
pub mod editor;
pub mod settings;
pub mod store;

pub use ai::{
    fetch_providers, normalize_providers, ChatRequest, ChatTransport, ChunkStream,
    CompletionRequest, CompletionTransport, HistoryEntry, ModelInfo, ProviderInfo,
    ProviderSource, TransportError,
};
pub use config::{ChatConfig, CompletionConfig, RuntimeConfig};
pub use editor::{
    ActionCallback, CodeAction, CodeActionProvider, CodeLens, CodeLensProvider, CompletionItem,
    CompletionItemProvider, ContentListener, CursorListener, Decoration, EditorAction,
    EditorSurface, FormattingProvider, HoverProvider, InlineCompletionProvider,
    InlineCompletionQuery, LanguageProvider, Marker, MarkerSeverity, NotificationLevel, Position,
    ProviderKind, Range, SurfaceHandle, TextEdit,
};
pub use settings::{AiSettings, PluginOverride, Settings};
pub use store::{ConversationStore, StoreError};
