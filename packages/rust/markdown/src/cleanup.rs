//! Content sanitizer: turns a raw scraped page into clean markdown.
//!
//! After a leading YAML frontmatter block is split off, the body goes through
//! repeated passes until one changes nothing. Each pass:
//! 1. strips HTML wrappers from fence marker lines
//! 2. per prose segment: converts `<pre>` blocks to fences, decodes entities,
//!    runs the prose rules (fenced code is copied verbatim)
//! 3. runs the document-scope whitespace rules
//! 4. drops leading boilerplate until the first genuine content line

use std::sync::LazyLock;

use doctidy_shared::SanitizeConfig;
use regex::{Captures, Regex};
use serde_yaml::Mapping;

use crate::fence::{Block, split_blocks, unwrap_fence_lines};
use crate::rules::{RuleSet, Scope};

/// Result of sanitizing one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sanitized {
    /// Clean markdown body.
    pub content: String,
    /// Source frontmatter, when it parsed as a YAML mapping.
    pub frontmatter: Option<Mapping>,
}

/// Sanitize raw page text.
pub fn sanitize(raw: &str, config: &SanitizeConfig) -> Sanitized {
    let text = raw.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let (frontmatter, body) = split_frontmatter(&text);

    Sanitized {
        content: clean_to_fixed_point(body, config),
        frontmatter,
    }
}

/// Sanitize and return only the clean body.
pub fn clean(raw: &str, config: &SanitizeConfig) -> String {
    sanitize(raw, config).content
}

/// Passes in a row allowed to change the text without shortening it.
const MAX_STALLED_PASSES: usize = 8;

/// No pass lengthens the text, and deleting markup or turning `<p>` into a
/// line break can expose new matches and new fence lines, so passes repeat
/// until the text stops changing.
fn clean_to_fixed_point(body: &str, config: &SanitizeConfig) -> String {
    let rules = RuleSet::standard();
    let mut current = clean_pass(body, rules, config);
    let mut stalled = 0;
    loop {
        let next = clean_pass(&current, rules, config);
        if next == current {
            return current;
        }
        if next.len() < current.len() {
            stalled = 0;
        } else {
            stalled += 1;
            if stalled > MAX_STALLED_PASSES {
                tracing::debug!(passes = stalled, "sanitizer stopped making progress");
                return next;
            }
        }
        current = next;
    }
}

fn clean_pass(text: &str, rules: &RuleSet, config: &SanitizeConfig) -> String {
    let text = unwrap_fence_lines(&text.replace("\r\n", "\n"));
    let mut cleaned = String::with_capacity(text.len());
    for block in split_blocks(&text) {
        match block {
            Block::Prose(prose) => cleaned.push_str(&clean_prose(prose, rules)),
            Block::Fenced(fence) => cleaned.push_str(fence.raw),
        }
    }

    let cleaned = rules.apply(Scope::Document, &cleaned);
    retain_from_first_content_line(&cleaned, config)
}

fn clean_prose(prose: &str, rules: &RuleSet) -> String {
    let converted = convert_pre_blocks(prose);
    let mut out = String::with_capacity(converted.len());
    for block in split_blocks(&converted) {
        match block {
            Block::Prose(text) => out.push_str(&rules.apply(Scope::Prose, &decode_entities(text))),
            Block::Fenced(fence) => out.push_str(fence.raw),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Frontmatter
// ---------------------------------------------------------------------------

/// Split a leading `---` delimited YAML block from the body.
///
/// Anything that is not a YAML mapping leaves the whole text as body.
fn split_frontmatter(text: &str) -> (Option<Mapping>, &str) {
    let Some(rest) = text.strip_prefix("---\n") else {
        return (None, text);
    };

    let mut offset = 0;
    let mut closing = None;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            closing = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }
    let Some((yaml_end, body_start)) = closing else {
        return (None, text);
    };

    let yaml = &rest[..yaml_end];
    if yaml.trim().is_empty() {
        return (Some(Mapping::new()), &rest[body_start..]);
    }

    match serde_yaml::from_str::<Mapping>(yaml) {
        Ok(mapping) => (Some(mapping), &rest[body_start..]),
        Err(e) => {
            tracing::debug!(error = %e, "unparseable frontmatter kept as body");
            (None, text)
        }
    }
}

// ---------------------------------------------------------------------------
// HTML pre blocks and entities
// ---------------------------------------------------------------------------

/// Rewrite `<pre>` blocks as fenced code so the prose rules leave them alone.
fn convert_pre_blocks(text: &str) -> String {
    static PRE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?is)<pre\b[^>]*>(.*?)</pre\s*>").expect("valid regex"));
    static LANG_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?i)class\s*=\s*["'][^"']*?\b(?:language|lang)-([\w+#-]+)"#)
            .expect("valid regex")
    });
    static TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

    PRE_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let language = LANG_CLASS_RE
                .captures(&caps[0])
                .map(|c| c[1].to_lowercase())
                .unwrap_or_default();
            let code = decode_entities(&TAG_RE.replace_all(&caps[1], ""));
            format!("\n```{language}\n{}\n```\n", code.trim_matches('\n'))
        })
        .into_owned()
}

/// Decode HTML character references.
///
/// An `&amp;` that would form another reference once decoded stays encoded,
/// so decoding twice gives the same text.
pub(crate) fn decode_entities(text: &str) -> String {
    static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,7});")
            .expect("valid regex")
    });
    static REFERENCE_TAIL_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[A-Za-z#0-9]+;").expect("valid regex"));

    ENTITY_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let end = caps.get(0).map_or(text.len(), |m| m.end());
            match entity_char(&caps[1]) {
                Some('&') if REFERENCE_TAIL_RE.is_match(&text[end..]) => caps[0].to_string(),
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn entity_char(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code).filter(|c| *c != '\0');
    }

    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "trade" => '\u{2122}',
        _ => return None,
    };
    Some(c)
}

// ---------------------------------------------------------------------------
// Leading boilerplate
// ---------------------------------------------------------------------------

/// Whether `line` can open the retained content.
fn is_content_line(line: &str, config: &SanitizeConfig) -> bool {
    let trimmed = line.trim();
    if trimmed.chars().count() <= config.lead_min_line_length {
        return false;
    }
    if trimmed.starts_with(['-', '*', '+']) || trimmed.contains("...") {
        return false;
    }
    let lower = trimmed.to_lowercase();
    !config
        .boilerplate_tokens
        .iter()
        .any(|token| lower.contains(&token.to_lowercase()))
}

/// Drop everything before the first content line, fences included.
fn retain_from_first_content_line(text: &str, config: &SanitizeConfig) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut found = false;
    let mut dropped = 0usize;

    for block in split_blocks(text) {
        match block {
            Block::Fenced(fence) if found => {
                kept.extend(fence.raw.strip_suffix('\n').unwrap_or(fence.raw).split('\n'));
            }
            Block::Fenced(_) => dropped += 1,
            Block::Prose(prose) => {
                for line in prose.lines() {
                    if !found {
                        if !is_content_line(line, config) {
                            dropped += 1;
                            continue;
                        }
                        found = true;
                    }
                    kept.push(line);
                }
            }
        }
    }

    if dropped > 0 {
        tracing::trace!(dropped, "leading lines dropped");
    }
    kept.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SanitizeConfig {
        SanitizeConfig::default()
    }

    #[test]
    fn frontmatter_mapping_is_split_off() {
        let raw = "---\ntitle: Query All\norder: 3\n---\nBody text follows here.";
        let (fm, body) = split_frontmatter(raw);
        let fm = fm.expect("mapping");
        assert_eq!(fm.get("title").and_then(|v| v.as_str()), Some("Query All"));
        assert_eq!(body, "Body text follows here.");
    }

    #[test]
    fn malformed_frontmatter_falls_back_to_body() {
        let raw = "---\ntitle: [unclosed\n---\nBody";
        let (fm, body) = split_frontmatter(raw);
        assert!(fm.is_none());
        assert_eq!(body, raw);

        let raw = "---\njust a scalar\n---\nBody";
        assert!(split_frontmatter(raw).0.is_none());

        let raw = "---\nno closing delimiter";
        assert_eq!(split_frontmatter(raw), (None, raw));
    }

    #[test]
    fn empty_frontmatter_is_an_empty_mapping() {
        let (fm, body) = split_frontmatter("---\n---\nBody");
        assert_eq!(fm, Some(Mapping::new()));
        assert_eq!(body, "Body");
    }

    #[test]
    fn entities_decode_to_a_fixed_point() {
        assert_eq!(decode_entities("a &lt;b&gt; &amp; c&nbsp;d"), "a <b> & c d");
        assert_eq!(decode_entities("&#39;x&#x27;"), "'x'");
        assert_eq!(decode_entities("&amp;lt;"), "&amp;lt;");
        assert_eq!(decode_entities("&#38;gt;"), "&#38;gt;");
        assert_eq!(decode_entities("&bogus; &#0;"), "&bogus; &#0;");

        let once = decode_entities("AT&amp;T &amp;amp; &quot;q&quot;");
        assert_eq!(decode_entities(&once), once);
    }

    #[test]
    fn pre_blocks_become_fences() {
        let out = convert_pre_blocks(
            "Intro<pre><code class=\"language-JSON\">{ &quot;id&quot;: 1 }</code></pre>After",
        );
        assert_eq!(out, "Intro\n```json\n{ \"id\": 1 }\n```\nAfter");
    }

    #[test]
    fn lead_skip_drops_short_and_list_lines() {
        let text = "Docs\n- Home\n* Guides\nLoading...\nThis is the first real sentence.\n\n- a kept bullet";
        assert_eq!(
            retain_from_first_content_line(text, &config()),
            "This is the first real sentence.\n\n- a kept bullet"
        );
    }

    #[test]
    fn lead_skip_rejects_boilerplate_tokens() {
        let text = "Skip the GitBook navigation sidebar entirely\nThe real explanation starts on this line.";
        assert_eq!(
            retain_from_first_content_line(text, &config()),
            "The real explanation starts on this line."
        );
    }

    #[test]
    fn lead_skip_drops_fences_before_content() {
        let text = "```\nnav widget script\n```\nThe actual content line is here.\n```js\nlet kept = 1;\n```";
        assert_eq!(
            retain_from_first_content_line(text, &config()),
            "The actual content line is here.\n```js\nlet kept = 1;\n```"
        );
    }

    #[test]
    fn fenced_code_is_never_rewritten() {
        let raw = "Here is how to render a card element:\n```html\n<div class=\"card\">On this page</div>\n```";
        let out = clean(raw, &config());
        assert!(out.contains("<div class=\"card\">On this page</div>"));
    }

    #[test]
    fn html_image_becomes_markdown_image() {
        let raw = "The diagram below shows the request flow.\n<img src=\"https://cdn.example.com/flow.png\" alt=\"Request flow\">";
        let out = clean(raw, &config());
        assert!(out.contains("![Request flow](https://cdn.example.com/flow.png)"));
        assert!(!out.contains("<img"));
    }

    #[test]
    fn scraped_page_is_cleaned() {
        let raw = "\
Xano Documentation [Ctrl] [K]
- [Home](/)
- [Before You Begin](/before-you-begin)

<div class=\"page\"><h1>Filters</h1>
<p>Filters transform a value into another value inside a function stack.</p>
::: {.hint style=\"info\"}
Filters can be chained &amp; combined.
:::
<ul><li><strong>trim</strong> removes whitespace</li></ul>
</div>



On this page
- Overview
## Reference
Was this helpful?
Powered by GitBook
";
        let out = clean(raw, &config());
        assert_eq!(
            out,
            "Filters transform a value into another value inside a function stack.\n\n\n\
             Filters can be chained & combined.\n\n\n\
             - **trim** removes whitespace\n\n\n\
             ## Reference"
        );
    }

    #[test]
    fn sanitizing_is_idempotent() {
        let inputs = [
            "Plain paragraph that is long enough to keep around.",
            "<h2>Setup</h2><p>Install the package before continuing &amp; restart.</p>\n\n\n\n\nDone.",
            "Use this to add a record.\n```\nconst x = 1;\n```",
            "---\ntitle: Example\n---\nThe body of the example page is right here.\n<pre>SELECT * FROM users</pre>",
            "First content line of the page here\n&amp;lt;tag&amp;gt; stays escaped\n| a | b |\n|---|---|",
            "Trailing copy buttons are common here.\nconst a = 1; Copy\nOn this page\n- Intro\n# Next\ntext",
            "Unclosed fence follows this long line\n```\nno end",
            "Escaped markup in prose is decoded here\n&lt;b&gt;bold&lt;/b&gt; and &lt;p&gt;```",
            "A paragraph wraps the fence in this page\n<p>```js\nlet n = 1;\n```</p>\n<p>Done.</p>",
        ];
        for input in inputs {
            let once = clean(input, &config());
            let twice = clean(&once, &config());
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn html_wrapped_fence_is_closed_and_prose_kept() {
        let raw = "Send the request body as JSON to the endpoint.\n\
                   <p>```\nconst payload = { name: 'Ada' };\n```</p>\n\
                   <div>Next, call the endpoint.</div>";
        let out = clean(raw, &config());
        assert_eq!(
            out,
            "Send the request body as JSON to the endpoint.\n\
             ```\nconst payload = { name: 'Ada' };\n```\n\
             Next, call the endpoint."
        );
    }

    #[test]
    fn deeply_nested_tags_are_fully_stripped() {
        let raw = "This first line is genuine page content.\n<d<d<d<d<d<b>iv>iv>iv>iv>iv> kept text";
        let once = clean(raw, &config());
        assert!(!once.contains('<'), "tag left in {once:?}");
        assert!(once.ends_with("kept text"));
        assert_eq!(clean(&once, &config()), once);
    }

    #[test]
    fn fences_exposed_by_prose_rules_are_settled() {
        let raw = "The opening line of this page is long enough.\n*Copy<p>```\n```\n\n<pre>x</pre>";
        let once = clean(raw, &config());
        assert!(!once.contains("<pre"), "pre left in {once:?}");
        assert!(once.contains("```\nx\n```"));
        assert_eq!(clean(&once, &config()), once);
    }

    #[test]
    fn frontmatter_is_returned() {
        let sanitized = sanitize(
            "---\nsource_url: https://docs.example.com/x\n---\nEnough body text to be retained here.",
            &config(),
        );
        let fm = sanitized.frontmatter.expect("frontmatter");
        assert!(fm.contains_key("source_url"));
        assert_eq!(sanitized.content, "Enough body text to be retained here.");
    }
}
