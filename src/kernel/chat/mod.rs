//! Multi-turn chat over the streamed chat transport.
//!
//! Every send appends a user message plus a streaming assistant placeholder,
//! then folds parsed frames into the placeholder as they arrive. Content
//! frames schedule a debounced save; completion, failure, cancellation and
//! deletion save immediately.
//!
//! At most one stream per conversation: a send into a conversation that is
//! still streaming stops the older turn first (same as `stop_streaming`).
//! Each stream is tagged with a turn number and only the owning turn may
//! touch the placeholder, so a superseded stream can never write late.

pub mod code_blocks;
pub mod model;

use futures::StreamExt;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use code_blocks::extract_code_blocks;
pub use model::{derive_title, CodeBlock, Conversation, Message, Role, DEFAULT_TITLE};

use crate::kernel::services::ports::{
    ChatConfig, ChatRequest, ChatTransport, ConversationStore, Position, StoreError,
};
use crate::kernel::stream::{Frame, FrameParser};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),
    #[error("message not found: {0}")]
    MessageNotFound(String),
    #[error("code block {index} not found in message {message_id}")]
    CodeBlockNotFound { message_id: String, index: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One user turn. Everything but the question is optional context.
#[derive(Debug, Clone, Default)]
pub struct SendMessage {
    pub question: String,
    pub language: String,
    pub context: String,
    pub filename: Option<String>,
    pub selection: Option<String>,
    pub cursor_position: Option<Position>,
    pub provider_id: Option<String>,
    pub model_id: Option<String>,
}

impl SendMessage {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    pub fn with_file(mut self, language: &str, context: &str, filename: Option<&str>) -> Self {
        self.language = language.to_string();
        self.context = context.to_string();
        self.filename = filename.map(str::to_string);
        self
    }

    pub fn with_selection(mut self, selection: impl Into<String>) -> Self {
        self.selection = Some(selection.into());
        self
    }

    pub fn with_cursor(mut self, position: Position) -> Self {
        self.cursor_position = Some(position);
        self
    }

    pub fn with_model(mut self, provider_id: &str, model_id: &str) -> Self {
        self.provider_id = Some(provider_id.to_string());
        self.model_id = Some(model_id.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Failed(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnResult {
    pub conversation_id: String,
    pub message_id: String,
    pub outcome: TurnOutcome,
}

struct ActiveStream {
    turn: u64,
    message_id: String,
    cancel: CancellationToken,
}

#[derive(Default)]
struct ChatState {
    conversations: Vec<Conversation>,
    active: Option<String>,
    streams: FxHashMap<String, ActiveStream>,
    pending_persist: FxHashMap<String, u64>,
    next_turn: u64,
    next_persist: u64,
}

impl ChatState {
    fn conversation_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    fn owns(&self, conversation_id: &str, turn: u64) -> bool {
        self.streams
            .get(conversation_id)
            .is_some_and(|s| s.turn == turn)
    }

    /// Cancels the conversation's stream and freezes its placeholder as-is.
    fn stop(&mut self, conversation_id: &str) -> bool {
        let Some(stream) = self.streams.remove(conversation_id) else {
            return false;
        };
        stream.cancel.cancel();
        if let Some(message) = self
            .conversation_mut(conversation_id)
            .and_then(|c| c.message_mut(&stream.message_id))
        {
            message.streaming = false;
        }
        true
    }
}

struct ChatInner {
    transport: Arc<dyn ChatTransport>,
    store: Option<Arc<dyn ConversationStore>>,
    config: ChatConfig,
    state: Mutex<ChatState>,
}

#[derive(Clone)]
pub struct ConversationEngine {
    inner: Arc<ChatInner>,
}

impl ConversationEngine {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        store: Option<Arc<dyn ConversationStore>>,
        config: ChatConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ChatInner {
                transport,
                store,
                config,
                state: Mutex::new(ChatState::default()),
            }),
        }
    }

    /// Sends `message` into the active conversation (creating one if needed)
    /// and drives the reply stream to its end.
    pub async fn send_message(&self, message: SendMessage) -> TurnResult {
        let (conversation_id, message_id, turn, cancel, request, stopped) = {
            let mut state = self.inner.state.lock();

            let active = state
                .active
                .as_deref()
                .and_then(|id| state.conversations.iter().position(|c| c.id == id));
            let index = match active {
                Some(index) => index,
                None => {
                    let conversation = Conversation::new();
                    state.active = Some(conversation.id.clone());
                    state.conversations.push(conversation);
                    state.conversations.len() - 1
                }
            };
            let conversation_id = state.conversations[index].id.clone();

            let stopped = state.stop(&conversation_id);

            state.next_turn += 1;
            let turn = state.next_turn;
            let conversation = &mut state.conversations[index];

            if conversation.messages.is_empty() {
                conversation.title =
                    derive_title(&message.question, self.inner.config.title_max_chars);
            }
            let history = conversation.history();
            conversation.messages.push(Message::user(&message.question));
            let placeholder = Message::assistant_placeholder();
            let message_id = placeholder.id.clone();
            conversation.messages.push(placeholder);
            conversation.touch();

            let cancel = CancellationToken::new();
            state.streams.insert(
                conversation_id.clone(),
                ActiveStream {
                    turn,
                    message_id: message_id.clone(),
                    cancel: cancel.clone(),
                },
            );

            let request = ChatRequest {
                question: message.question,
                language: message.language,
                context: message.context,
                filename: message.filename,
                selection: message.selection,
                cursor_position: message.cursor_position,
                provider_id: message.provider_id,
                model_id: message.model_id,
                history,
            };
            (conversation_id, message_id, turn, cancel, request, stopped)
        };

        if stopped {
            tracing::debug!(
                conversation_id = %conversation_id,
                "previous turn stopped by new send"
            );
        }
        self.inner.persist_now(&conversation_id);

        let outcome = self
            .run_stream(&conversation_id, &message_id, turn, request, cancel)
            .await;

        TurnResult {
            conversation_id,
            message_id,
            outcome,
        }
    }

    async fn run_stream(
        &self,
        conversation_id: &str,
        message_id: &str,
        turn: u64,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> TurnOutcome {
        let inner = &self.inner;
        let finish = |outcome| inner.finish(conversation_id, message_id, turn, outcome);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return finish(TurnOutcome::Cancelled),
            res = inner.transport.stream_chat(request, cancel.clone()) => res,
        };
        let mut stream = match result {
            Ok(stream) => stream,
            Err(err) if err.is_cancelled() => return finish(TurnOutcome::Cancelled),
            Err(err) => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    error = %err,
                    "chat request failed"
                );
                return finish(TurnOutcome::Failed(err.to_string()));
            }
        };

        let mut parser = FrameParser::new();
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return finish(TurnOutcome::Cancelled),
                chunk = stream.next() => chunk,
            };
            let (frames, ended) = match chunk {
                Some(Ok(chunk)) => (parser.push(&chunk), false),
                Some(Err(err)) if err.is_cancelled() => return finish(TurnOutcome::Cancelled),
                Some(Err(err)) => {
                    tracing::warn!(
                        conversation_id = %conversation_id,
                        error = %err,
                        "chat stream failed"
                    );
                    return finish(TurnOutcome::Failed(err.to_string()));
                }
                None if cancel.is_cancelled() => return finish(TurnOutcome::Cancelled),
                None => (parser.finish(), true),
            };

            for frame in frames {
                match frame {
                    Frame::Content(delta) => {
                        if !inner.append(conversation_id, message_id, turn, &delta) {
                            return TurnOutcome::Cancelled;
                        }
                        ChatInner::schedule_persist(inner, conversation_id);
                    }
                    Frame::Model(model) => {
                        inner.set_model(conversation_id, message_id, turn, model)
                    }
                    Frame::Error(message) => return finish(TurnOutcome::Failed(message)),
                    Frame::Done => return finish(TurnOutcome::Completed),
                }
            }

            if ended {
                return finish(TurnOutcome::Completed);
            }
        }
    }

    /// Aborts the stream of `conversation_id` (or of the active conversation),
    /// keeping whatever content arrived. Returns `false` if nothing streamed.
    pub fn stop_streaming(&self, conversation_id: Option<&str>) -> bool {
        let target = {
            let mut state = self.inner.state.lock();
            let Some(target) = conversation_id
                .map(str::to_string)
                .or_else(|| state.active.clone())
            else {
                return false;
            };
            if !state.stop(&target) {
                return false;
            }
            if let Some(conversation) = state.conversation_mut(&target) {
                conversation.touch();
            }
            target
        };
        tracing::debug!(conversation_id = %target, "streaming stopped");
        self.inner.persist_now(&target);
        true
    }

    pub fn is_streaming(&self, conversation_id: &str) -> bool {
        self.inner.state.lock().streams.contains_key(conversation_id)
    }

    /// Starts an empty conversation and makes it active.
    pub fn create_conversation(&self) -> String {
        let conversation = Conversation::new();
        let id = conversation.id.clone();
        let mut state = self.inner.state.lock();
        state.conversations.push(conversation);
        state.active = Some(id.clone());
        id
    }

    pub fn set_active(&self, id: &str) -> Result<(), ChatError> {
        let mut state = self.inner.state.lock();
        if !state.conversations.iter().any(|c| c.id == id) {
            return Err(ChatError::ConversationNotFound(id.to_string()));
        }
        state.active = Some(id.to_string());
        Ok(())
    }

    pub fn active_id(&self) -> Option<String> {
        self.inner.state.lock().active.clone()
    }

    pub fn active_conversation(&self) -> Option<Conversation> {
        let state = self.inner.state.lock();
        let id = state.active.as_deref()?;
        state.conversations.iter().find(|c| c.id == id).cloned()
    }

    pub fn conversation(&self, id: &str) -> Option<Conversation> {
        self.inner
            .state
            .lock()
            .conversations
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// Most recently updated first.
    pub fn conversations(&self) -> Vec<Conversation> {
        let mut conversations = self.inner.state.lock().conversations.clone();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        conversations
    }

    pub fn rename_conversation(&self, id: &str, title: &str) -> Result<(), ChatError> {
        {
            let mut state = self.inner.state.lock();
            let conversation = state
                .conversation_mut(id)
                .ok_or_else(|| ChatError::ConversationNotFound(id.to_string()))?;
            conversation.title = title.to_string();
            conversation.touch();
        }
        self.inner.persist_now(id);
        Ok(())
    }

    /// Stops any stream, drops the conversation and removes it from the store.
    pub fn delete_conversation(&self, id: &str) -> Result<(), ChatError> {
        {
            let mut state = self.inner.state.lock();
            let Some(index) = state.conversations.iter().position(|c| c.id == id) else {
                return Err(ChatError::ConversationNotFound(id.to_string()));
            };
            state.stop(id);
            state.pending_persist.remove(id);
            state.conversations.remove(index);
            if state.active.as_deref() == Some(id) {
                state.active = None;
            }
        }

        if let Some(store) = self.inner.store.as_ref() {
            store.delete(id)?;
        }
        tracing::debug!(conversation_id = %id, "conversation deleted");
        Ok(())
    }

    /// Marks a code block as applied by the user.
    pub fn accept_code_block(
        &self,
        conversation_id: &str,
        message_id: &str,
        index: usize,
    ) -> Result<CodeBlock, ChatError> {
        let block = {
            let mut state = self.inner.state.lock();
            let conversation = state
                .conversation_mut(conversation_id)
                .ok_or_else(|| ChatError::ConversationNotFound(conversation_id.to_string()))?;
            let message = conversation
                .message_mut(message_id)
                .ok_or_else(|| ChatError::MessageNotFound(message_id.to_string()))?;
            let block = message
                .code_blocks
                .get_mut(index)
                .ok_or_else(|| ChatError::CodeBlockNotFound {
                    message_id: message_id.to_string(),
                    index,
                })?;
            block.accepted = true;
            block.clone()
        };
        self.inner.persist_now(conversation_id);
        Ok(block)
    }

    /// Replaces in-memory conversations with the store's. Messages left
    /// streaming by an interrupted session are frozen. The most recently
    /// updated conversation becomes active.
    pub fn load_from_store(&self) -> Result<usize, ChatError> {
        let Some(store) = self.inner.store.as_ref() else {
            return Ok(0);
        };
        let mut loaded = store.load_all()?;
        for conversation in &mut loaded {
            for message in &mut conversation.messages {
                message.streaming = false;
            }
        }

        let mut state = self.inner.state.lock();
        for stream in state.streams.values() {
            stream.cancel.cancel();
        }
        state.streams.clear();
        state.pending_persist.clear();
        state.active = loaded
            .iter()
            .max_by_key(|c| c.updated_at)
            .map(|c| c.id.clone());
        let count = loaded.len();
        state.conversations = loaded;
        Ok(count)
    }
}

impl ChatInner {
    fn append(&self, conversation_id: &str, message_id: &str, turn: u64, delta: &str) -> bool {
        let mut state = self.state.lock();
        if !state.owns(conversation_id, turn) {
            return false;
        }
        let Some(conversation) = state.conversation_mut(conversation_id) else {
            return false;
        };
        if let Some(message) = conversation.message_mut(message_id) {
            message.content.push_str(delta);
        }
        conversation.touch();
        true
    }

    fn set_model(&self, conversation_id: &str, message_id: &str, turn: u64, model: String) {
        let mut state = self.state.lock();
        if !state.owns(conversation_id, turn) {
            return;
        }
        if let Some(message) = state
            .conversation_mut(conversation_id)
            .and_then(|c| c.message_mut(message_id))
        {
            message.model = Some(model);
        }
    }

    /// Terminal transition for `turn`. A turn that no longer owns its
    /// conversation's stream was stopped or superseded and changes nothing.
    fn finish(
        &self,
        conversation_id: &str,
        message_id: &str,
        turn: u64,
        outcome: TurnOutcome,
    ) -> TurnOutcome {
        {
            let mut state = self.state.lock();
            if !state.owns(conversation_id, turn) {
                return TurnOutcome::Cancelled;
            }
            state.streams.remove(conversation_id);
            let Some(conversation) = state.conversation_mut(conversation_id) else {
                return outcome;
            };
            if let Some(message) = conversation.message_mut(message_id) {
                message.streaming = false;
                match &outcome {
                    TurnOutcome::Completed => {
                        message.code_blocks = extract_code_blocks(&message.content);
                    }
                    TurnOutcome::Failed(error) => message.error = Some(error.clone()),
                    TurnOutcome::Cancelled => {}
                }
            }
            conversation.touch();
        }

        self.persist_now(conversation_id);
        outcome
    }

    fn schedule_persist(inner: &Arc<ChatInner>, conversation_id: &str) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            inner.persist_now(conversation_id);
            return;
        };

        let seq = {
            let mut state = inner.state.lock();
            state.next_persist += 1;
            let seq = state.next_persist;
            state.pending_persist.insert(conversation_id.to_string(), seq);
            seq
        };

        let weak: Weak<ChatInner> = Arc::downgrade(inner);
        let delay = inner.config.persist_debounce;
        let conversation_id = conversation_id.to_string();
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let due = inner.state.lock().pending_persist.get(&conversation_id) == Some(&seq);
            if due {
                inner.persist_now(&conversation_id);
            }
        });
    }

    /// Saves the conversation now and drops any pending debounced save.
    fn persist_now(&self, conversation_id: &str) {
        let snapshot = {
            let mut state = self.state.lock();
            state.pending_persist.remove(conversation_id);
            state
                .conversations
                .iter()
                .find(|c| c.id == conversation_id)
                .cloned()
        };
        let (Some(store), Some(conversation)) = (self.store.as_ref(), snapshot) else {
            return;
        };
        if let Err(err) = store.save(&conversation) {
            tracing::error!(
                conversation_id = %conversation_id,
                error = %err,
                "failed to persist conversation"
            );
        }
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/kernel/chat/engine.rs"]
mod tests;
