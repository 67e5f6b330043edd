use super::*;
use crate::kernel::chat::CodeBlock;
use crate::kernel::plugins::PluginRuntime;
use crate::kernel::services::adapters::MemoryEditor;
use crate::kernel::services::ports::{EditorSurface, NotificationLevel, Position, Range};
use crate::kernel::testing::{FakeResponse, FakeTransport};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn setup(
    content: &str,
) -> (
    Arc<PluginRegistry>,
    PluginRuntime,
    Arc<MemoryEditor>,
    Arc<FakeTransport>,
) {
    let registry = Arc::new(PluginRegistry::new());
    let transport = Arc::new(FakeTransport::new());
    register_builtins(&registry, transport.clone(), CompletionConfig::default());

    let runtime = PluginRuntime::new(registry.clone());
    let editor = Arc::new(MemoryEditor::new(content, "rust"));
    runtime.mount(editor.clone());
    (registry, runtime, editor, transport)
}

#[tokio::test(start_paused = true)]
async fn inline_completion_serves_and_invalidates_on_cursor_moves() {
    let (_registry, runtime, editor, transport) = setup("let x = \n");
    transport.push(FakeResponse::chunks(["data: {\"content\":\"1;\"}\n"]));
    transport.push(FakeResponse::chunks(["data: {\"content\":\"2;\"}\n"]));
    assert_eq!(
        runtime.mounted_ids(),
        vec![inline_completion::PLUGIN_ID, chat_bridge::PLUGIN_ID]
    );

    editor.set_cursor(Position::new(0, 8));
    let first = editor.request_inline_completion(CancellationToken::new()).await;
    assert_eq!(first.as_deref(), Some("1;"));

    let cached = editor.request_inline_completion(CancellationToken::new()).await;
    assert_eq!(cached.as_deref(), Some("1;"));
    assert_eq!(transport.completion_requests().len(), 1);

    editor.set_cursor(Position::new(0, 4));
    editor.set_cursor(Position::new(0, 8));
    let fresh = editor.request_inline_completion(CancellationToken::new()).await;
    assert_eq!(fresh.as_deref(), Some("2;"));
    assert_eq!(transport.completion_requests().len(), 2);
    assert_eq!(transport.completion_requests()[0].language, "rust");
}

#[test]
fn disabling_inline_completion_removes_its_registrations() {
    let (registry, runtime, editor, _transport) = setup("");
    assert_eq!(editor.inline_completion_providers("python").len(), 1);
    assert!(editor.action_ids().contains(&inline_completion::CLEAR_ACTION_ID.to_string()));

    registry.disable(inline_completion::PLUGIN_ID);
    assert!(editor.inline_completion_providers("python").is_empty());
    assert!(editor.action_ids().is_empty());
    assert_eq!(runtime.mounted_ids(), vec![chat_bridge::PLUGIN_ID]);
}

#[test]
fn chat_bridge_inserts_at_cursor_or_replaces_selection() {
    let (_registry, runtime, editor, _transport) = setup("fn main() {\n    \n}\n");

    editor.set_cursor(Position::new(1, 4));
    let block = CodeBlock {
        language: "rust".to_string(),
        code: "todo!();".to_string(),
        accepted: true,
    };
    let delivered = runtime
        .bus()
        .emit(chat_bridge::APPLY_CODE_EVENT, &chat_bridge::apply_code_payload(&block));
    assert_eq!(delivered, 1);
    assert_eq!(editor.content(), "fn main() {\n    todo!();\n}\n");

    editor.set_selection(Some(Range::new(Position::new(1, 4), Position::new(1, 12))));
    runtime
        .bus()
        .emit(chat_bridge::APPLY_CODE_EVENT, &json!({ "code": "42" }));
    assert_eq!(editor.content(), "fn main() {\n    42\n}\n");
    assert_eq!(
        editor.notifications().last(),
        Some(&(NotificationLevel::Info, "Code applied".to_string()))
    );

    runtime.bus().emit(chat_bridge::APPLY_CODE_EVENT, &json!({ "text": "ignored" }));
    assert_eq!(editor.content(), "fn main() {\n    42\n}\n");
}
