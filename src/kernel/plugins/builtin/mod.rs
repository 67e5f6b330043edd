//! Plugins shipped with the runtime.

pub mod chat_bridge;
pub mod inline_completion;

use std::sync::Arc;

use super::PluginRegistry;
use crate::kernel::services::ports::{CompletionConfig, CompletionTransport};

pub fn register_builtins(
    registry: &PluginRegistry,
    transport: Arc<dyn CompletionTransport>,
    config: CompletionConfig,
) {
    registry.register(inline_completion::descriptor(transport, config));
    registry.register(chat_bridge::descriptor());
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/plugins/builtin.rs"]
mod tests;
