use super::*;
use crate::kernel::testing::{FakeResponse, FakeTransport, RecordingStore};
use crate::kernel::services::ports::TransportError;
use std::time::Duration;

fn setup() -> (ConversationEngine, Arc<FakeTransport>, Arc<RecordingStore>) {
    let transport = Arc::new(FakeTransport::new());
    let store = Arc::new(RecordingStore::new());
    let engine = ConversationEngine::new(
        transport.clone(),
        Some(store.clone() as Arc<dyn ConversationStore>),
        ChatConfig::default(),
    );
    (engine, transport, store)
}

fn content(text: &str) -> String {
    format!("data: {}\n", serde_json::json!({ "content": text }))
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn send_streams_reply_and_extracts_code_blocks() {
    let (engine, transport, store) = setup();
    transport.push(FakeResponse::chunks([
        content("Use this:\n```rust\nfn a() {}\n```\n"),
        content("or\n```\nplain\n```"),
        "data: [DONE]\n".to_string(),
    ]));

    let result = engine
        .send_message(
            SendMessage::new("How do I define a function?\nin rust")
                .with_file("rust", "fn main() {}", Some("main.rs")),
        )
        .await;
    assert_eq!(result.outcome, TurnOutcome::Completed);

    let conversation = engine.conversation(&result.conversation_id).unwrap();
    assert_eq!(conversation.title, "How do I define a function?");
    assert_eq!(conversation.messages.len(), 2);
    assert_eq!(conversation.messages[0].role, Role::User);
    let reply = &conversation.messages[1];
    assert_eq!(reply.id, result.message_id);
    assert_eq!(reply.role, Role::Assistant);
    assert!(!reply.streaming);
    assert_eq!(reply.code_blocks.len(), 2);
    assert_eq!(reply.code_blocks[0].language, "rust");
    assert_eq!(reply.code_blocks[1].language, "plaintext");

    let saved = store.last_saved(&result.conversation_id).unwrap();
    assert_eq!(saved.messages[1].content, reply.content);
    assert!(!saved.messages[1].streaming);

    let request = &transport.chat_requests()[0];
    assert_eq!(request.language, "rust");
    assert_eq!(request.context, "fn main() {}");
    assert_eq!(request.filename.as_deref(), Some("main.rs"));
    assert!(request.history.is_empty());
}

#[tokio::test(start_paused = true)]
async fn follow_up_carries_prior_turns_as_history() {
    let (engine, transport, _store) = setup();
    transport.push(FakeResponse::chunks([content("first answer")]));
    transport.push(FakeResponse::chunks([content("second answer")]));

    let first = engine.send_message(SendMessage::new("q1")).await;
    let second = engine.send_message(SendMessage::new("q2")).await;
    assert_eq!(first.conversation_id, second.conversation_id);

    let requests = transport.chat_requests();
    let history = &requests[1].history;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "q1");
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "first answer");

    let conversation = engine.active_conversation().unwrap();
    assert_eq!(conversation.title, "q1");
    assert_eq!(conversation.messages.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn error_frame_keeps_partial_content() {
    let (engine, transport, store) = setup();
    transport.push(FakeResponse::chunks([
        content("partial "),
        "data: {\"error\":\"rate limited\"}\n".to_string(),
        content("never applied"),
    ]));

    let result = engine.send_message(SendMessage::new("hi")).await;
    assert_eq!(result.outcome, TurnOutcome::Failed("rate limited".to_string()));

    let conversation = engine.conversation(&result.conversation_id).unwrap();
    let reply = &conversation.messages[1];
    assert_eq!(reply.content, "partial ");
    assert_eq!(reply.error.as_deref(), Some("rate limited"));
    assert!(!reply.streaming);
    assert!(reply.code_blocks.is_empty());
    assert_eq!(
        store.last_saved(&result.conversation_id).unwrap().messages[1].error.as_deref(),
        Some("rate limited")
    );
}

#[tokio::test(start_paused = true)]
async fn transport_failure_marks_message_failed() {
    let (engine, transport, _store) = setup();
    transport.push(FakeResponse::Fail(TransportError::Status {
        status: 502,
        body: "bad gateway".to_string(),
    }));

    let result = engine.send_message(SendMessage::new("hi")).await;
    let TurnOutcome::Failed(message) = &result.outcome else {
        panic!("expected failure, got {:?}", result.outcome);
    };
    assert!(message.contains("502"));
    let reply = &engine.conversation(&result.conversation_id).unwrap().messages[1];
    assert!(reply.is_failed());
    assert!(!engine.is_streaming(&result.conversation_id));
}

#[tokio::test(start_paused = true)]
async fn model_frames_tag_the_reply() {
    let (engine, transport, _store) = setup();
    transport.push(FakeResponse::chunks([
        "data: {\"model\":\"qwen-coder\"}\n".to_string(),
        content("ok"),
    ]));

    let result = engine.send_message(SendMessage::new("hi")).await;
    let reply = &engine.conversation(&result.conversation_id).unwrap().messages[1];
    assert_eq!(reply.model.as_deref(), Some("qwen-coder"));
    assert_eq!(reply.content, "ok");
}

#[tokio::test(start_paused = true)]
async fn stop_keeps_partial_content_and_persists_immediately() {
    let (engine, transport, store) = setup();
    let (tx, response) = FakeResponse::channel();
    transport.push(response);

    let pending = tokio::spawn({
        let engine = engine.clone();
        async move { engine.send_message(SendMessage::new("explain")).await }
    });
    settle().await;
    tx.unbounded_send(Ok(content("half an ans"))).unwrap();
    settle().await;

    let conversation_id = engine.active_id().unwrap();
    assert!(engine.is_streaming(&conversation_id));
    let saves_before = store.save_count();

    assert!(engine.stop_streaming(None));
    assert_eq!(store.save_count(), saves_before + 1);
    let saved = store.last_saved(&conversation_id).unwrap();
    assert!(!saved.messages[1].streaming);
    assert_eq!(saved.messages[1].content, "half an ans");
    assert!(saved.messages[1].error.is_none());

    let result = pending.await.unwrap();
    assert_eq!(result.outcome, TurnOutcome::Cancelled);
    assert!(tx.is_closed());
    assert!(!engine.stop_streaming(None));
}

#[tokio::test(start_paused = true)]
async fn stopped_turn_always_resolves_as_cancelled() {
    for _ in 0..32 {
        let (engine, transport, _store) = setup();
        let (tx, response) = FakeResponse::channel();
        transport.push(response);

        let pending = tokio::spawn({
            let engine = engine.clone();
            async move { engine.send_message(SendMessage::new("explain")).await }
        });
        settle().await;
        tx.unbounded_send(Ok(content("partial"))).unwrap();
        tokio::task::yield_now().await;
        assert!(engine.stop_streaming(None));

        let result = pending.await.unwrap();
        assert_eq!(result.outcome, TurnOutcome::Cancelled);
        let conversation = engine.conversation(&result.conversation_id).unwrap();
        let reply = conversation.message(&result.message_id).unwrap();
        assert!(!reply.streaming);
        assert!(reply.error.is_none());
    }
}

#[tokio::test(start_paused = true)]
async fn content_frames_persist_after_the_debounce() {
    let (engine, transport, store) = setup();
    let (tx, response) = FakeResponse::channel();
    transport.push(response);

    let pending = tokio::spawn({
        let engine = engine.clone();
        async move { engine.send_message(SendMessage::new("stream")).await }
    });
    settle().await;
    let after_send = store.save_count();

    tx.unbounded_send(Ok(content("a"))).unwrap();
    settle().await;
    tx.unbounded_send(Ok(content("b"))).unwrap();
    settle().await;
    assert_eq!(store.save_count(), after_send);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(store.save_count(), after_send + 1);
    let conversation_id = engine.active_id().unwrap();
    let saved = store.last_saved(&conversation_id).unwrap();
    assert_eq!(saved.messages[1].content, "ab");
    assert!(saved.messages[1].streaming);

    drop(tx);
    assert_eq!(pending.await.unwrap().outcome, TurnOutcome::Completed);
    assert_eq!(store.save_count(), after_send + 2);
}

#[tokio::test(start_paused = true)]
async fn second_send_supersedes_the_streaming_turn() {
    let (engine, transport, _store) = setup();
    let (tx, response) = FakeResponse::channel();
    transport.push(response);
    transport.push(FakeResponse::chunks([content("fresh"), "data: [DONE]\n".to_string()]));

    let first = tokio::spawn({
        let engine = engine.clone();
        async move { engine.send_message(SendMessage::new("one")).await }
    });
    settle().await;
    tx.unbounded_send(Ok(content("old"))).unwrap();
    settle().await;

    let second = engine.send_message(SendMessage::new("two")).await;
    assert_eq!(second.outcome, TurnOutcome::Completed);

    let first = first.await.unwrap();
    assert_eq!(first.outcome, TurnOutcome::Cancelled);
    assert!(tx.is_closed());

    let conversation = engine.conversation(&second.conversation_id).unwrap();
    assert_eq!(conversation.messages.len(), 4);
    let old = conversation.message(&first.message_id).unwrap();
    assert_eq!(old.content, "old");
    assert!(!old.streaming);
    assert!(old.error.is_none());
    let fresh = conversation.message(&second.message_id).unwrap();
    assert_eq!(fresh.content, "fresh");

    // The interrupted reply is still complete enough to be history.
    let history = &transport.chat_requests()[1].history;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, "old");
}

#[tokio::test(start_paused = true)]
async fn delete_removes_conversation_and_store_entry() {
    let (engine, transport, store) = setup();
    transport.push(FakeResponse::chunks([content("x")]));
    let result = engine.send_message(SendMessage::new("hi")).await;

    engine.delete_conversation(&result.conversation_id).unwrap();
    assert!(engine.conversation(&result.conversation_id).is_none());
    assert!(engine.active_id().is_none());
    assert_eq!(store.deleted(), vec![result.conversation_id.clone()]);

    assert!(matches!(
        engine.delete_conversation(&result.conversation_id),
        Err(ChatError::ConversationNotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn accept_code_block_flags_and_persists() {
    let (engine, transport, store) = setup();
    transport.push(FakeResponse::chunks([content("```js\nlet a;\n```")]));
    let result = engine.send_message(SendMessage::new("code")).await;
    let saves = store.save_count();

    let block = engine
        .accept_code_block(&result.conversation_id, &result.message_id, 0)
        .unwrap();
    assert!(block.accepted);
    assert_eq!(block.code, "let a;");
    assert_eq!(store.save_count(), saves + 1);

    assert!(matches!(
        engine.accept_code_block(&result.conversation_id, &result.message_id, 3),
        Err(ChatError::CodeBlockNotFound { index: 3, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn store_failures_do_not_break_the_turn() {
    let (engine, transport, store) = setup();
    store.fail_saves(true);
    transport.push(FakeResponse::chunks([content("fine")]));

    let result = engine.send_message(SendMessage::new("hi")).await;
    assert_eq!(result.outcome, TurnOutcome::Completed);
    assert_eq!(store.save_count(), 0);
}

#[test]
fn create_and_switch_conversations() {
    let (engine, _transport, _store) = setup();
    let a = engine.create_conversation();
    let b = engine.create_conversation();
    assert_eq!(engine.active_id().as_deref(), Some(b.as_str()));

    engine.set_active(&a).unwrap();
    assert_eq!(engine.active_id().as_deref(), Some(a.as_str()));
    assert!(engine.set_active("missing").is_err());

    engine.rename_conversation(&a, "Renamed").unwrap();
    assert_eq!(engine.conversation(&a).unwrap().title, "Renamed");
    assert_eq!(engine.conversations().len(), 2);
}

#[test]
fn load_from_store_freezes_interrupted_streams() {
    let (engine, _transport, store) = setup();
    let mut older = Conversation::new();
    let mut newer = Conversation::new();
    newer.updated_at = older.updated_at + chrono::Duration::seconds(5);
    let mut reply = Message::assistant_placeholder();
    reply.content = "cut off".to_string();
    older.messages.push(Message::user("q"));
    older.messages.push(reply);
    store.seed(vec![older.clone(), newer.clone()]);

    assert_eq!(engine.load_from_store().unwrap(), 2);
    assert_eq!(engine.active_id(), Some(newer.id.clone()));
    let loaded = engine.conversation(&older.id).unwrap();
    assert!(!loaded.messages[1].streaming);
    assert_eq!(loaded.messages[1].content, "cut off");
}

#[test]
fn titles_are_derived_from_the_first_line() {
    assert_eq!(derive_title("  \n  Fix the bug\nplease", 50), "Fix the bug");
    assert_eq!(derive_title("", 50), DEFAULT_TITLE);
    assert_eq!(derive_title("abcdefghij", 4), "abcd...");
    assert_eq!(derive_title("ab  cdef", 3), "ab...");
}
