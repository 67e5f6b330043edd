//! Registers the streaming completion engine as the editor's inline
//! (ghost text) provider for every language.

use std::sync::Arc;

use crate::kernel::completion::InlineCompletionEngine;
use crate::kernel::plugins::{Disposable, PluginDescriptor};
use crate::kernel::services::adapters::ANY_LANGUAGE;
use crate::kernel::services::ports::{CompletionConfig, CompletionTransport};

pub const PLUGIN_ID: &str = "inline-completion";
pub const CLEAR_ACTION_ID: &str = "inline-completion.clear";

/// Each editor the plugin mounts on gets its own engine, so in-flight
/// requests and the cache never leak between editors.
pub fn descriptor(
    transport: Arc<dyn CompletionTransport>,
    config: CompletionConfig,
) -> PluginDescriptor {
    PluginDescriptor::new(PLUGIN_ID, "Inline Completion")
        .with_priority(50)
        .with_description("Streams AI suggestions at the cursor")
        .on_mount(move |ctx| {
            let engine = Arc::new(InlineCompletionEngine::new(
                Arc::clone(&transport),
                config.clone(),
            ));
            ctx.register_inline_completion_provider(ANY_LANGUAGE, engine.clone());

            let on_cursor = engine.clone();
            ctx.on_cursor_change(move |_| on_cursor.invalidate());
            let on_edit = engine.clone();
            ctx.on_did_change_content(move || on_edit.invalidate());

            let on_clear = engine.clone();
            ctx.add_action(CLEAR_ACTION_ID, "Clear inline suggestion", Some("escape"), move || {
                on_clear.invalidate()
            });

            ctx.register_disposable(Disposable::new(move || engine.invalidate()));
            Ok(())
        })
}
