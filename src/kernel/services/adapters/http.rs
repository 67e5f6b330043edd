//! HTTP transport for the AI backend.
//!
//! Completion and chat are POSTs answered with a chunked event stream; the
//! body bytes are decoded to text here and framed by the stream parser in the
//! engines. Provider listing is a plain GET.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::kernel::services::ports::{
    AiSettings, ChatRequest, ChatTransport, ChunkStream, CompletionRequest, CompletionTransport,
    ProviderSource, TransportError,
};

const EVENT_STREAM: &str = "text/event-stream";

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else if err.is_body() {
            TransportError::Stream(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Decodes a byte stream as UTF-8 across chunk boundaries. A code point split
/// between two chunks is held back until the rest arrives; invalid sequences
/// become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }

        out
    }

    /// Flushes a code point the body never completed as U+FFFD. `None` when
    /// nothing is held back.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        self.pending.clear();
        Some(char::REPLACEMENT_CHARACTER.to_string())
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Turns a body of byte chunks into text chunks, flushing the decoder once
/// the body ends.
pub fn decode_body<S, B>(body: S) -> impl Stream<Item = Result<String, TransportError>>
where
    S: Stream<Item = Result<B, TransportError>>,
    B: AsRef<[u8]>,
{
    let body = Box::pin(body);
    futures::stream::unfold(
        Some((body, Utf8ChunkDecoder::default())),
        |state| async move {
            let (mut body, mut decoder) = state?;
            match body.next().await {
                Some(Ok(bytes)) => {
                    let text = decoder.decode(bytes.as_ref());
                    Some((Ok(text), Some((body, decoder))))
                }
                Some(Err(err)) => Some((Err(err), Some((body, decoder)))),
                None => decoder.finish().map(|tail| (Ok(tail), None)),
            }
        },
    )
}

#[derive(Clone)]
pub struct HttpAiClient {
    client: Client,
    base_url: String,
    completion_path: String,
    chat_path: String,
    providers_path: String,
    api_key: Option<String>,
}

impl HttpAiClient {
    pub fn new(settings: &AiSettings) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(settings.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            completion_path: settings.completion_path.clone(),
            chat_path: settings.chat_path.clone(),
            providers_path: settings.providers_path.clone(),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key.as_deref() {
            Some(key) => request.header(AUTHORIZATION, format!("Bearer {key}")),
            None => request,
        }
    }

    async fn post_stream<T: Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, TransportError> {
        let url = self.url(path);
        let request = self
            .authorize(self.client.post(&url))
            .header(ACCEPT, EVENT_STREAM)
            .json(body);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            res = request.send() => res?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(url = %url, status = status.as_u16(), "ai backend rejected request");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes_stream()
            .take_until(cancel.cancelled_owned())
            .map(|chunk| chunk.map_err(TransportError::from));
        Ok(decode_body(body).boxed())
    }
}

#[async_trait]
impl CompletionTransport for HttpAiClient {
    async fn stream_completion(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, TransportError> {
        self.post_stream(&self.completion_path, &request, cancel).await
    }
}

#[async_trait]
impl ChatTransport for HttpAiClient {
    async fn stream_chat(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, TransportError> {
        self.post_stream(&self.chat_path, &request, cancel).await
    }
}

#[async_trait]
impl ProviderSource for HttpAiClient {
    async fn list_providers(&self) -> Result<Value, TransportError> {
        let url = self.url(&self.providers_path);
        let response = self.authorize(self.client.get(&url)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/adapters/http.rs"]
mod tests;
