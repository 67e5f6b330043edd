use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::config::{ChatConfig, CompletionConfig, RuntimeConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub ai: AiSettings,
    #[serde(default)]
    pub completion: CompletionSettings,
    #[serde(default)]
    pub chat: ChatSettings,
    #[serde(default)]
    pub runtime: RuntimeSettings,
    #[serde(default)]
    pub plugins: Vec<PluginOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_completion_path")]
    pub completion_path: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    #[serde(default = "default_providers_path")]
    pub providers_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            completion_path: default_completion_path(),
            chat_path: default_chat_path(),
            providers_path: default_providers_path(),
            api_key: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionSettings {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_max_lines_before")]
    pub max_lines_before: usize,
    #[serde(default = "default_max_lines_after")]
    pub max_lines_after: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            max_lines_before: default_max_lines_before(),
            max_lines_after: default_max_lines_after(),
            max_chars: default_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(default = "default_persist_debounce_ms")]
    pub persist_debounce_ms: u64,
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            persist_debounce_ms: default_persist_debounce_ms(),
            title_max_chars: default_title_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    #[serde(default = "default_content_debounce_ms")]
    pub content_debounce_ms: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            content_debounce_ms: default_content_debounce_ms(),
        }
    }
}

/// Startup override of a plugin's enabled flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginOverride {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Settings {
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            debounce: Duration::from_millis(self.completion.debounce_ms),
            max_lines_before: self.completion.max_lines_before,
            max_lines_after: self.completion.max_lines_after,
            max_chars: self.completion.max_chars,
        }
    }

    pub fn chat_config(&self) -> ChatConfig {
        ChatConfig {
            persist_debounce: Duration::from_millis(self.chat.persist_debounce_ms),
            title_max_chars: self.chat.title_max_chars,
        }
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            content_debounce: Duration::from_millis(self.runtime.content_debounce_ms),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_completion_path() -> String {
    "/api/completion".to_string()
}

fn default_chat_path() -> String {
    "/api/chat".to_string()
}

fn default_providers_path() -> String {
    "/api/providers".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_max_lines_before() -> usize {
    50
}

fn default_max_lines_after() -> usize {
    20
}

fn default_max_chars() -> usize {
    500
}

fn default_persist_debounce_ms() -> u64 {
    500
}

fn default_title_max_chars() -> usize {
    50
}

fn default_content_debounce_ms() -> u64 {
    150
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/ports/settings.rs"]
mod tests;
