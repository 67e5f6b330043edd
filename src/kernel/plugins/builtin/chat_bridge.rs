//! Applies code sent from the chat panel into the editor.
//!
//! Listens for [`APPLY_CODE_EVENT`] with a `{ "code": "..." }` payload. The
//! code replaces the current selection, or is inserted at the cursor when
//! nothing is selected.

use serde_json::{json, Value};

use crate::kernel::chat::CodeBlock;
use crate::kernel::plugins::{PluginContext, PluginDescriptor};
use crate::kernel::services::ports::{NotificationLevel, Range};

pub const PLUGIN_ID: &str = "chat-bridge";
pub const APPLY_CODE_EVENT: &str = "chat/apply-code";

pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor::new(PLUGIN_ID, "Chat Bridge")
        .with_priority(40)
        .with_description("Inserts accepted chat code blocks into the editor")
        .on_mount(|ctx| {
            let target = ctx.clone();
            ctx.on(APPLY_CODE_EVENT, move |payload| apply_code(&target, payload));
            Ok(())
        })
}

pub fn apply_code_payload(block: &CodeBlock) -> Value {
    json!({ "code": block.code, "language": block.language })
}

fn apply_code(ctx: &PluginContext, payload: &Value) {
    let Some(code) = payload.get("code").and_then(Value::as_str) else {
        tracing::warn!(event = APPLY_CODE_EVENT, "payload without code");
        return;
    };

    let range = ctx
        .selection()
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| Range::collapsed(ctx.cursor()));
    ctx.replace_range(range, code);
    ctx.notify(NotificationLevel::Info, "Code applied");
}
