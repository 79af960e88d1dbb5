//! Splitting text into prose and fenced code blocks.
//!
//! An opening fence is a line that starts (after indentation) with three
//! backticks, optionally followed by an info string. The info string may not
//! contain a backtick or start with `<`. The closing fence is a line made only
//! of backticks. A fence with no closing line runs to the end of the text.

use std::sync::LazyLock;

use regex::Regex;

/// A contiguous span of the input. Concatenating every block's raw text
/// reproduces the input exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block<'a> {
    Prose(&'a str),
    Fenced(Fence<'a>),
}

/// A fenced code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fence<'a> {
    /// Text after the opening backticks, trimmed.
    pub info: &'a str,
    /// Lines between the fences, without the final newline.
    pub body: &'a str,
    pub closed: bool,
    /// The whole block including both fence lines and the closing newline.
    pub raw: &'a str,
}

impl Block<'_> {
    pub fn raw(&self) -> &str {
        match self {
            Block::Prose(text) => text,
            Block::Fenced(fence) => fence.raw,
        }
    }
}

/// Info string of an opening fence line, or `None` if `line` opens no fence.
fn opening_info(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("```")?;
    let info = rest.trim_start_matches('`').trim();
    if info.contains('`') || info.starts_with('<') {
        return None;
    }
    Some(info)
}

fn is_closing(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3 && trimmed.bytes().all(|b| b == b'`')
}

/// Partition `text` into prose and fenced blocks, in order.
pub fn split_blocks(text: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut prose_start = 0;
    let mut offset = 0;
    let mut lines = text.split_inclusive('\n');

    while let Some(line) = lines.next() {
        let line_start = offset;
        offset += line.len();

        let Some(info) = opening_info(line) else {
            continue;
        };

        if line_start > prose_start {
            blocks.push(Block::Prose(&text[prose_start..line_start]));
        }

        let body_start = offset;
        let mut closing = None;

        for inner in lines.by_ref() {
            let inner_start = offset;
            offset += inner.len();
            if is_closing(inner) {
                closing = Some(inner_start);
                break;
            }
        }

        let (body_end, closed) = match closing {
            Some(start) => (start, true),
            None => (offset, false),
        };
        let body = text[body_start..body_end]
            .strip_suffix('\n')
            .unwrap_or(&text[body_start..body_end]);

        blocks.push(Block::Fenced(Fence {
            info,
            body,
            closed,
            raw: &text[line_start..offset],
        }));
        prose_start = offset;
    }

    if prose_start < text.len() {
        blocks.push(Block::Prose(&text[prose_start..]));
    }

    blocks
}

/// Remove HTML tags sharing a line with a fence marker (`<p>```` or
/// ````</p>`), so scraped wrappers neither hide a fence nor open a bogus one.
///
/// Lines inside a fence are only rewritten when they become its closing line.
pub(crate) fn unwrap_fence_lines(text: &str) -> String {
    static WRAPPED_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        let tag = r"</?[A-Za-z][A-Za-z0-9-]*\b[^<>\n]*>[ \t]*";
        Regex::new(&format!(
            r"^(?P<indent>[ \t]*)(?P<lead>(?:{tag})*)(?P<fence>`{{3,}}[^`<\n]*?)[ \t]*(?P<trail>(?:{tag})*)$"
        ))
        .expect("valid regex")
    });

    let mut out = String::with_capacity(text.len());
    let mut open = false;
    for line in text.split_inclusive('\n') {
        let (content, newline) = match line.strip_suffix('\n') {
            Some(content) => (content, "\n"),
            None => (line, ""),
        };
        let unwrapped = WRAPPED_FENCE_RE
            .captures(content)
            .filter(|caps| !caps["lead"].is_empty() || !caps["trail"].is_empty())
            .map(|caps| format!("{}{}", &caps["indent"], caps["fence"].trim_end()));

        let marker = match unwrapped.as_deref() {
            Some(candidate) if open && is_closing(candidate) => Some(candidate),
            Some(candidate) if !open && opening_info(candidate).is_some() => Some(candidate),
            _ => None,
        };
        match marker {
            Some(candidate) => {
                out.push_str(candidate);
                open = !open;
            }
            None => {
                out.push_str(content);
                if open && is_closing(content) {
                    open = false;
                } else if !open && opening_info(content).is_some() {
                    open = true;
                }
            }
        }
        out.push_str(newline);
    }
    out
}
