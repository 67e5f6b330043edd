//! Stream frame parser.
//!
//! Turns decoded text chunks of an event-stream style response into discrete
//! [`Frame`]s. Chunks may split lines anywhere; the parser buffers the
//! unterminated tail until the next newline (or [`FrameParser::finish`]).
//!
//! Line handling:
//! - `data:` lines: the payload is trimmed; `[DONE]` ends the stream, JSON
//!   payloads are decoded into structured frames, anything else is a raw
//!   content delta.
//! - comments (`:`) and `event:` / `id:` / `retry:` fields are skipped.
//! - any other non-empty line is unframed content and passes through as-is.

use serde_json::{Map, Value};

const DATA_PREFIX: &str = "data:";
const DONE_TOKEN: &str = "[DONE]";
const METADATA_PREFIXES: [&str; 3] = ["event:", "id:", "retry:"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Content(String),
    Model(String),
    Error(String),
    Done,
}

impl Frame {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Frame::Error(_) | Frame::Done)
    }
}

#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: String,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns the frames of every line it completed.
    pub fn push(&mut self, chunk: &str) -> Vec<Frame> {
        self.buffer.push_str(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = memchr::memchr(b'\n', &self.buffer.as_bytes()[consumed..]) {
            let end = consumed + offset;
            parse_line(&self.buffer[consumed..end], &mut frames);
            consumed = end + 1;
        }
        self.buffer.drain(..consumed);

        frames
    }

    /// Flushes a trailing line that never saw its newline.
    pub fn finish(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            parse_line(&rest, &mut frames);
        }
        frames
    }

    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }
}

/// Parses a complete body in one go.
pub fn parse_frames(text: &str) -> Vec<Frame> {
    let mut parser = FrameParser::new();
    let mut frames = parser.push(text);
    frames.extend(parser.finish());
    frames
}

fn parse_line(line: &str, out: &mut Vec<Frame>) {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() {
        return;
    }

    if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
        let payload = payload.trim();
        if payload.is_empty() {
            return;
        }
        if payload == DONE_TOKEN {
            out.push(Frame::Done);
            return;
        }
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => decode_payload(value, payload, out),
            Err(_) => out.push(Frame::Content(payload.to_string())),
        }
        return;
    }

    if line.starts_with(':') || METADATA_PREFIXES.iter().any(|p| line.starts_with(p)) {
        return;
    }

    out.push(Frame::Content(line.to_string()));
}

/// Structured payload shapes, in order of precedence:
/// `{"error": ..}`, then `{"model": ..}` and a content delta from `content`,
/// `text`, `delta.content`, `choices[0].delta.content` or `choices[0].text`,
/// then `{"done": true}`. A JSON string is a delta; other scalars are raw text.
fn decode_payload(value: Value, raw: &str, out: &mut Vec<Frame>) {
    match value {
        Value::String(text) => out.push(Frame::Content(text)),
        Value::Object(map) => {
            if let Some(error) = map.get("error").filter(|e| !e.is_null()) {
                out.push(Frame::Error(error_message(error)));
                return;
            }
            if let Some(model) = map.get("model").and_then(Value::as_str) {
                out.push(Frame::Model(model.to_string()));
            }
            if let Some(content) = extract_content(&map) {
                if !content.is_empty() {
                    out.push(Frame::Content(content.to_string()));
                }
            }
            if map.get("done").and_then(Value::as_bool) == Some(true) {
                out.push(Frame::Done);
            }
        }
        _ => out.push(Frame::Content(raw.to_string())),
    }
}

fn extract_content(map: &Map<String, Value>) -> Option<&str> {
    if let Some(content) = map.get("content").and_then(Value::as_str) {
        return Some(content);
    }
    if let Some(text) = map.get("text").and_then(Value::as_str) {
        return Some(text);
    }
    if let Some(delta) = map.get("delta") {
        if let Some(content) = delta_text(delta) {
            return Some(content);
        }
    }

    let choice = map.get("choices")?.get(0)?;
    choice
        .get("delta")
        .and_then(delta_text)
        .or_else(|| choice.get("text").and_then(Value::as_str))
}

fn delta_text(delta: &Value) -> Option<&str> {
    delta
        .get("content")
        .or_else(|| delta.get("text"))
        .and_then(Value::as_str)
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/stream.rs"]
mod tests;
