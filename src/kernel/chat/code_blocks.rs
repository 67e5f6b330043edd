use regex::Regex;
use std::sync::OnceLock;

use super::model::CodeBlock;

const PLAINTEXT: &str = "plaintext";

const FENCE_PATTERN: &str = r"```([\w+#.-]*)[^\n]*\n([\s\S]*?)```";

fn fence_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(FENCE_PATTERN) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::error!(error = %err, "code fence pattern failed to compile");
            None
        }
    })
    .as_ref()
}

/// Fenced segments in order of appearance. An unterminated trailing fence is
/// ignored; a fence without a language tag is `plaintext`.
pub fn extract_code_blocks(content: &str) -> Vec<CodeBlock> {
    let Some(fence) = fence_regex() else {
        return Vec::new();
    };
    fence
        .captures_iter(content)
        .map(|caps| {
            let language = caps.get(1).map_or("", |m| m.as_str());
            let code = caps.get(2).map_or("", |m| m.as_str());
            CodeBlock {
                language: if language.is_empty() {
                    PLAINTEXT.to_string()
                } else {
                    language.to_ascii_lowercase()
                },
                code: code.strip_suffix('\n').unwrap_or(code).to_string(),
                accepted: false,
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "../../../tests/unit/kernel/chat/code_blocks.rs"]
mod tests;
