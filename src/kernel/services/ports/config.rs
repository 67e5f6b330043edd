use std::time::Duration;

#[derive(Clone, Debug)]
pub struct CompletionConfig {
    pub debounce: Duration,
    pub max_lines_before: usize,
    pub max_lines_after: usize,
    /// Upper bound on a suggestion, in chars.
    pub max_chars: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            max_lines_before: 50,
            max_lines_after: 20,
            max_chars: 500,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub persist_debounce: Duration,
    pub title_max_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            persist_debounce: Duration::from_millis(500),
            title_max_chars: 50,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Settle window before `on_content_change` hooks run.
    pub content_debounce: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            content_debounce: Duration::from_millis(150),
        }
    }
}
