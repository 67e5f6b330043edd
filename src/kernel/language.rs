use std::path::Path;

/// Languages the editor surface knows out of the box. Anything else is
/// reported as `plaintext`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum LanguageId {
    Rust,
    Go,
    Python,
    JavaScript,
    TypeScript,
    Jsx,
    Tsx,
    C,
    Cpp,
    Java,
    Json,
    Yaml,
    Html,
    Css,
    Toml,
    Markdown,
    Bash,
    Sql,
}

impl LanguageId {
    pub const ALL: [LanguageId; 18] = [
        Self::Rust,
        Self::Go,
        Self::Python,
        Self::JavaScript,
        Self::TypeScript,
        Self::Jsx,
        Self::Tsx,
        Self::C,
        Self::Cpp,
        Self::Java,
        Self::Json,
        Self::Yaml,
        Self::Html,
        Self::Css,
        Self::Toml,
        Self::Markdown,
        Self::Bash,
        Self::Sql,
    ];

    pub fn from_path(path: &Path) -> Option<Self> {
        Self::from_extension(path.extension().and_then(|s| s.to_str())?)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "rs" => Some(Self::Rust),
            "go" => Some(Self::Go),
            "py" | "pyi" => Some(Self::Python),
            "js" | "mjs" | "cjs" => Some(Self::JavaScript),
            "jsx" => Some(Self::Jsx),
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "c" => Some(Self::C),
            "cc" | "cpp" | "cxx" | "c++" | "hpp" | "hh" | "hxx" | "h++" | "h" => Some(Self::Cpp),
            "java" => Some(Self::Java),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "html" | "htm" => Some(Self::Html),
            "css" => Some(Self::Css),
            "toml" => Some(Self::Toml),
            "md" | "markdown" => Some(Self::Markdown),
            "sh" | "bash" | "zsh" => Some(Self::Bash),
            "sql" => Some(Self::Sql),
            _ => None,
        }
    }

    /// Identifier handed to providers and the AI backend.
    pub fn language_id(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Jsx => "javascriptreact",
            Self::Tsx => "typescriptreact",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Java => "java",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Html => "html",
            Self::Css => "css",
            Self::Toml => "toml",
            Self::Markdown => "markdown",
            Self::Bash => "shell",
            Self::Sql => "sql",
        }
    }

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &["rs"],
            Self::Go => &["go"],
            Self::Python => &["py", "pyi"],
            Self::JavaScript => &["js", "mjs", "cjs"],
            Self::TypeScript => &["ts", "mts", "cts"],
            Self::Jsx => &["jsx"],
            Self::Tsx => &["tsx"],
            Self::C => &["c"],
            Self::Cpp => &["cc", "cpp", "cxx", "c++", "hpp", "hh", "hxx", "h++", "h"],
            Self::Java => &["java"],
            Self::Json => &["json"],
            Self::Yaml => &["yaml", "yml"],
            Self::Html => &["html", "htm"],
            Self::Css => &["css"],
            Self::Toml => &["toml"],
            Self::Markdown => &["md", "markdown"],
            Self::Bash => &["sh", "bash", "zsh"],
            Self::Sql => &["sql"],
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Rust => "Rust",
            Self::Go => "Go",
            Self::Python => "Python",
            Self::JavaScript => "JavaScript",
            Self::TypeScript => "TypeScript",
            Self::Jsx => "JSX",
            Self::Tsx => "TSX",
            Self::C => "C",
            Self::Cpp => "C++",
            Self::Java => "Java",
            Self::Json => "JSON",
            Self::Yaml => "YAML",
            Self::Html => "HTML",
            Self::Css => "CSS",
            Self::Toml => "TOML",
            Self::Markdown => "Markdown",
            Self::Bash => "Shell",
            Self::Sql => "SQL",
        }
    }
}

pub const PLAINTEXT: &str = "plaintext";

/// Editor language id for `path`, falling back to [`PLAINTEXT`].
pub fn language_for_path(path: &Path) -> &'static str {
    LanguageId::from_path(path).map_or(PLAINTEXT, LanguageId::language_id)
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/language.rs"]
mod tests;
