//! Streaming inline completion.
//!
//! One engine serves one editor. Each query is debounced, then sent as a
//! single streamed request; the frames are folded into one suggestion capped
//! at `max_chars`. Only the most recent query is live: a newer query cancels
//! the older one's token, and anything the older one resolves afterwards is
//! dropped. Failures and cancellations both resolve to "no suggestion".

pub mod context;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use context::{CompletionContext, FIM_MIDDLE, FIM_PREFIX, FIM_SUFFIX};

use crate::kernel::services::ports::{
    CompletionConfig, CompletionRequest, CompletionTransport, InlineCompletionProvider,
    InlineCompletionQuery, Position, TransportError,
};
use crate::kernel::stream::{Frame, FrameParser};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedCompletion {
    pub position: Position,
    pub text: String,
}

struct LiveRequest {
    id: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct EngineState {
    next_request_id: u64,
    live: Option<LiveRequest>,
    cache: Option<CachedCompletion>,
}

pub struct InlineCompletionEngine {
    transport: Arc<dyn CompletionTransport>,
    config: CompletionConfig,
    state: Mutex<EngineState>,
}

impl InlineCompletionEngine {
    pub fn new(transport: Arc<dyn CompletionTransport>, config: CompletionConfig) -> Self {
        Self {
            transport,
            config,
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    /// Suggestion for `query`, or `None`. `host_cancel` is the host's own
    /// cancellation for this query; it feeds the same token the engine uses
    /// for supersession.
    pub async fn complete(
        &self,
        query: InlineCompletionQuery,
        host_cancel: CancellationToken,
    ) -> Option<String> {
        let (id, cancel) = {
            let mut state = self.state.lock();
            if let Some(cached) = state.cache.as_ref() {
                if cached.position == query.position {
                    tracing::debug!(
                        line = query.position.line,
                        column = query.position.column,
                        "completion cache hit"
                    );
                    return Some(cached.text.clone());
                }
            }
            if let Some(previous) = state.live.take() {
                previous.cancel.cancel();
            }
            state.next_request_id += 1;
            let id = state.next_request_id;
            let cancel = host_cancel.child_token();
            state.live = Some(LiveRequest {
                id,
                cancel: cancel.clone(),
            });
            (id, cancel)
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return self.resolve(id, query.position, Err(TransportError::Cancelled));
            }
            _ = tokio::time::sleep(self.config.debounce) => {}
        }

        let context = CompletionContext::from_text(
            &query.content,
            query.position,
            self.config.max_lines_before,
            self.config.max_lines_after,
        );
        let request = CompletionRequest {
            question: context.to_prompt(),
            language: query.language,
        };
        let result = match self.stream(request, &cancel).await {
            // A cancelled stream may have ended cleanly with partial text.
            Ok(_) if cancel.is_cancelled() => Err(TransportError::Cancelled),
            result => result,
        };
        self.resolve(id, query.position, result)
    }

    /// Drops the cached suggestion and aborts whatever is in flight. Called
    /// on every cursor move and edit.
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        state.cache = None;
        if let Some(live) = state.live.take() {
            live.cancel.cancel();
        }
    }

    pub fn cached(&self) -> Option<CachedCompletion> {
        self.state.lock().cache.clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.lock().live.is_some()
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, TransportError> {
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            res = self.transport.stream_completion(request, cancel.clone()) => res?,
        };

        let mut parser = FrameParser::new();
        let mut text = String::new();
        let mut chars = 0usize;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                chunk = stream.next() => chunk,
            };
            let (frames, ended) = match chunk {
                Some(Ok(chunk)) => (parser.push(&chunk), false),
                Some(Err(err)) => return Err(err),
                None if cancel.is_cancelled() => return Err(TransportError::Cancelled),
                None => (parser.finish(), true),
            };

            for frame in frames {
                match frame {
                    Frame::Content(delta) => {
                        if append_capped(&mut text, &mut chars, &delta, self.config.max_chars) {
                            return Ok(text);
                        }
                    }
                    Frame::Model(_) => {}
                    Frame::Error(message) => return Err(TransportError::Stream(message)),
                    Frame::Done => return Ok(text),
                }
            }

            if ended {
                return Ok(text);
            }
        }
    }

    fn resolve(
        &self,
        id: u64,
        position: Position,
        result: Result<String, TransportError>,
    ) -> Option<String> {
        let mut state = self.state.lock();
        if state.live.as_ref().map(|l| l.id) != Some(id) {
            tracing::debug!(request_id = id, "stale completion discarded");
            return None;
        }
        state.live = None;

        match result {
            Ok(text) if !text.is_empty() => {
                state.cache = Some(CachedCompletion {
                    position,
                    text: text.clone(),
                });
                Some(text)
            }
            Ok(_) => None,
            Err(err) if err.is_cancelled() => {
                tracing::debug!(request_id = id, "completion cancelled");
                None
            }
            Err(err) => {
                tracing::warn!(request_id = id, error = %err, "completion request failed");
                None
            }
        }
    }
}

/// Appends up to the cap; returns `true` once the cap is reached.
fn append_capped(text: &mut String, chars: &mut usize, delta: &str, max_chars: usize) -> bool {
    for ch in delta.chars() {
        if *chars >= max_chars {
            return true;
        }
        text.push(ch);
        *chars += 1;
    }
    *chars >= max_chars
}

#[async_trait]
impl InlineCompletionProvider for InlineCompletionEngine {
    async fn provide_inline_completions(
        &self,
        query: InlineCompletionQuery,
        cancel: CancellationToken,
    ) -> Option<String> {
        self.complete(query, cancel).await
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/kernel/completion/engine.rs"]
mod tests;
