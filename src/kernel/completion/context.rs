//! Fill-in-the-middle context window around the cursor.

use ropey::Rope;

use crate::kernel::services::ports::Position;
use crate::kernel::text::{clamp_position, line_len_chars};

pub const FIM_PREFIX: &str = "<|fim_prefix|>";
pub const FIM_SUFFIX: &str = "<|fim_suffix|>";
pub const FIM_MIDDLE: &str = "<|fim_middle|>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionContext {
    /// Text from the first window line up to the cursor.
    pub prefix: String,
    /// Text from the cursor to the end of the last window line.
    pub suffix: String,
}

impl CompletionContext {
    /// At most `max_before` lines above the cursor line and `max_after` below
    /// it; the cursor line itself is split at the (clamped) column.
    pub fn from_text(text: &str, position: Position, max_before: usize, max_after: usize) -> Self {
        let rope = Rope::from_str(text);
        let position = clamp_position(&rope, position);
        let line = position.line as usize;
        let last_line = rope.len_lines().saturating_sub(1);

        let cursor = rope.line_to_char(line) + position.column as usize;
        let start = rope.line_to_char(line.saturating_sub(max_before));

        let end_line = line.saturating_add(max_after).min(last_line);
        let end = rope.line_to_char(end_line) + line_len_chars(rope.line(end_line));

        Self {
            prefix: rope.slice(start..cursor).to_string(),
            suffix: rope.slice(cursor..end).to_string(),
        }
    }

    pub fn to_prompt(&self) -> String {
        let mut prompt = String::with_capacity(
            FIM_PREFIX.len()
                + FIM_SUFFIX.len()
                + FIM_MIDDLE.len()
                + self.prefix.len()
                + self.suffix.len(),
        );
        prompt.push_str(FIM_PREFIX);
        prompt.push_str(&self.prefix);
        prompt.push_str(FIM_SUFFIX);
        prompt.push_str(&self.suffix);
        prompt.push_str(FIM_MIDDLE);
        prompt
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/kernel/completion/context.rs"]
mod tests;
