//! Title resolution: special cases, then the first heading, then the file name.

use std::sync::LazyLock;

use doctidy_shared::{TitleConfig, file_stem};
use regex::Regex;

use crate::fence::{Block, split_blocks};

/// Resolve a non-empty title for a document.
pub fn resolve_title(source_id: &str, content: &str, config: &TitleConfig) -> String {
    let stem = normalized_stem(source_id);

    if let Some(special) = config
        .special_cases
        .iter()
        .find(|case| !case.pattern.is_empty() && stem.contains(&case.pattern.to_lowercase()))
    {
        return special.title.clone();
    }

    if let Some(heading) = first_heading(content)
        .map(|raw| clean_heading(&raw))
        .filter(|text| is_usable_heading(text, config.min_heading_length))
    {
        return heading;
    }

    let title = title_from_stem(&stem, config);
    if title.trim().is_empty() {
        config.fallback.clone()
    } else {
        title
    }
}

/// Lower-cased file stem with `_` folded to `-`.
fn normalized_stem(source_id: &str) -> String {
    file_stem(source_id).to_lowercase().replace('_', "-")
}

// ---------------------------------------------------------------------------
// Headings
// ---------------------------------------------------------------------------

/// Text of the first ATX heading outside fenced code.
fn first_heading(content: &str) -> Option<String> {
    static HEADING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^#{1,6}[ \t]+(.+)$").expect("valid regex"));

    split_blocks(content).into_iter().find_map(|block| match block {
        Block::Prose(prose) => prose
            .lines()
            .find_map(|line| HEADING_RE.captures(line.trim_end()).map(|c| c[1].to_string())),
        Block::Fenced(_) => None,
    })
}

/// Strip images, links and HTML from heading text.
fn clean_heading(raw: &str) -> String {
    static IMAGE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid regex"));
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[[^\]]*\]\([^)]*\)").expect("valid regex"));
    static HTML_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

    let text = IMAGE_RE.replace_all(raw, "");
    let text = LINK_RE.replace_all(&text, "");
    let text = HTML_RE.replace_all(&text, "");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    text.trim_end_matches('#').trim().to_string()
}

fn is_usable_heading(text: &str, min_length: usize) -> bool {
    text.chars().count() > min_length && !text.to_lowercase().starts_with("http")
}

// ---------------------------------------------------------------------------
// File name
// ---------------------------------------------------------------------------

fn title_from_stem(stem: &str, config: &TitleConfig) -> String {
    let words: Vec<&str> = stem
        .split(|c: char| c == '-' || c == '.' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect();

    for rule in &config.prefix_rules {
        let trigger = rule.trigger.to_lowercase();
        if trigger.is_empty() || !stem.contains(&trigger) {
            continue;
        }
        if let Some(case) = rule
            .cases
            .iter()
            .find(|case| !case.pattern.is_empty() && stem.contains(&case.pattern.to_lowercase()))
        {
            return case.title.clone();
        }
        let strip: Vec<String> = rule
            .strip
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_lowercase())
            .collect();
        let rest: Vec<&str> = words
            .iter()
            .copied()
            .filter(|w| !strip.iter().any(|s| w.contains(s.as_str())))
            .collect();
        if rest.is_empty() {
            return rule.bare.clone();
        }
        return format!("{}: {}", rule.prefix, title_case(&rest));
    }

    title_case(&words)
}

fn title_case(words: &[&str]) -> String {
    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
