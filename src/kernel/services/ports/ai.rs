//! AI backend contracts: streamed completion/chat transports and provider listing.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::editor::Position;
use crate::kernel::chat::Role;

/// Decoded text chunks of one streamed response.
pub type ChunkStream = BoxStream<'static, Result<String, TransportError>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("server returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("stream error: {0}")]
    Stream(String),
    #[error("request cancelled")]
    Cancelled,
}

impl TransportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub question: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub question: String,
    pub language: String,
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn stream_completion(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, TransportError>;
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn stream_chat(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, TransportError>;
}

#[async_trait]
pub trait ProviderSource: Send + Sync {
    /// Raw provider listing; see [`normalize_providers`].
    async fn list_providers(&self) -> Result<Value, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "max_tokens")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: String,
    #[serde(default, alias = "displayName", alias = "display_name")]
    pub name: String,
    #[serde(default = "default_true", alias = "isAvailable", alias = "is_available")]
    pub available: bool,
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

/// Accepts a bare list, or one wrapped in a `data` / `providers` envelope
/// (one level of nesting of either is tolerated).
pub fn normalize_providers(value: Value) -> Result<Vec<ProviderInfo>, TransportError> {
    let list = unwrap_envelope(value, 2)?;
    let mut providers: Vec<ProviderInfo> =
        serde_json::from_value(list).map_err(|e| TransportError::Decode(e.to_string()))?;

    for provider in &mut providers {
        if provider.name.is_empty() {
            provider.name = provider.id.clone();
        }
        for model in &mut provider.models {
            if model.name.is_empty() {
                model.name = model.id.clone();
            }
        }
    }

    Ok(providers)
}

pub async fn fetch_providers(
    source: &dyn ProviderSource,
) -> Result<Vec<ProviderInfo>, TransportError> {
    let raw = source.list_providers().await?;
    normalize_providers(raw)
}

fn unwrap_envelope(value: Value, depth: usize) -> Result<Value, TransportError> {
    match value {
        Value::Array(_) => Ok(value),
        Value::Object(mut map) if depth > 0 => {
            let inner = map
                .remove("data")
                .or_else(|| map.remove("providers"))
                .ok_or_else(|| {
                    TransportError::Decode("provider listing has no data/providers field".into())
                })?;
            unwrap_envelope(inner, depth - 1)
        }
        other => Err(TransportError::Decode(format!(
            "unexpected provider listing shape: {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/ports/ai.rs"]
mod tests;
