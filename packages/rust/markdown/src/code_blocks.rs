//! Code fence normalization.
//!
//! Every fence in the output carries an explicit language tag: the declared
//! one when it is known, otherwise a guess from the code itself.

use std::sync::LazyLock;

use doctidy_shared::{CodeBlock, CodeConfig};
use regex::Regex;

use crate::fence::{Block, Fence, split_blocks};

/// Body with rewritten fences plus the blocks found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCode {
    pub body: String,
    pub blocks: Vec<CodeBlock>,
}

/// Relabel every fence in `content` and splice the rewritten fences back in.
pub fn normalize_code_blocks(content: &str, config: &CodeConfig) -> NormalizedCode {
    let mut body = String::with_capacity(content.len() + 16);
    let mut blocks = Vec::new();
    let mut after_fence = false;

    for block in split_blocks(content) {
        match block {
            Block::Prose(text) => {
                if after_fence {
                    body.push('\n');
                    if !text.starts_with('\n') {
                        body.push('\n');
                    }
                }
                body.push_str(text);
                after_fence = false;
            }
            Block::Fenced(fence) => {
                if after_fence {
                    body.push_str("\n\n");
                } else if !body.is_empty() {
                    while !body.ends_with("\n\n") {
                        body.push('\n');
                    }
                }
                let code = resolve(&fence, config);
                body.push_str(&code.to_fenced());
                blocks.push(code);
                after_fence = true;
            }
        }
    }

    NormalizedCode { body, blocks }
}

/// Strip class-name prefixes such as `language-js` or `highlight-rust`.
fn strip_class_prefix(info: &str) -> &str {
    ["language-", "lang-", "highlight-"]
        .iter()
        .find_map(|prefix| info.strip_prefix(prefix))
        .unwrap_or(info)
}

fn is_known(token: &str, config: &CodeConfig) -> bool {
    config
        .known_languages
        .iter()
        .any(|lang| lang.eq_ignore_ascii_case(token))
}

fn resolve(fence: &Fence<'_>, config: &CodeConfig) -> CodeBlock {
    let declared = strip_class_prefix(fence.info.split_whitespace().next().unwrap_or_default());

    if !declared.is_empty() {
        if is_known(declared, config) {
            let language = declared.to_lowercase();
            return CodeBlock {
                language_hint: Some(language.clone()),
                language,
                body: fence.body.to_string(),
            };
        }
        tracing::trace!(info = declared, "unknown fence language dropped");
        return CodeBlock {
            language_hint: None,
            language: sniff_language(fence.body, config),
            body: fence.body.to_string(),
        };
    }

    // A bare fence may declare its language on the first body line.
    let (first, rest) = fence.body.split_once('\n').unwrap_or((fence.body, ""));
    let first = first.trim();
    if !first.is_empty() && is_known(first, config) {
        let language = first.to_lowercase();
        return CodeBlock {
            language_hint: Some(language.clone()),
            language,
            body: rest.to_string(),
        };
    }

    CodeBlock {
        language_hint: None,
        language: sniff_language(fence.body, config),
        body: fence.body.to_string(),
    }
}

/// Guess a language from the code, checking in a fixed order.
pub fn sniff_language(code: &str, config: &CodeConfig) -> String {
    static SCRIPT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\b(?:function|const|var)\b").expect("valid regex"));
    static SQL_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\b(?:SELECT|INSERT|CREATE)\b").expect("valid regex"));

    let lower = code.to_lowercase();
    let language = if code.contains('{') || SCRIPT_RE.is_match(code) {
        "javascript"
    } else if SQL_RE.is_match(code) {
        "sql"
    } else if code.contains("def ") || code.contains("import ") || code.contains("print(") {
        "python"
    } else if code.contains("<?php") {
        "php"
    } else if code.contains('<') && code.contains('>') && lower.contains("html") {
        "html"
    } else if lower.contains("curl") {
        "bash"
    } else {
        return config.default_language.clone();
    };
    language.to_string()
}
