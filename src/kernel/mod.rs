//! Headless core: plugin runtime, stream framing and the AI engines.

pub mod chat;
pub mod completion;
pub mod language;
pub mod plugins;
pub mod services;
pub mod stream;
pub mod text;


pub use chat::{ChatError, ConversationEngine, SendMessage, TurnOutcome, TurnResult};
pub use completion::{CompletionContext, InlineCompletionEngine};
pub use plugins::{
    EventBus, PluginContext, PluginDescriptor, PluginError, PluginHooks, PluginRegistry,
    PluginRuntime,
};
pub use stream::{Frame, FrameParser};
