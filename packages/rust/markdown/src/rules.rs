//! The ordered pattern rule set used by the content sanitizer.
//!
//! Each rule is a regex plus an action. Rules run strictly in table order:
//! HTML-to-markdown conversions come before raw tag stripping, and chrome
//! removal comes after links and images have been normalized.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use scraper::{Html, Selector};

/// Hostname fragment identifying site-builder asset URLs.
const ASSET_HOST_FINGERPRINT: &str = "gitbook";

/// Which family a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// HTML tags, comments, attributes, directives, CSS and pandoc spans.
    Markup,
    /// Anchor and image normalization.
    Link,
    /// Site chrome and navigation.
    Boilerplate,
    /// Blank-line and trailing-space cleanup.
    Whitespace,
}

/// Where a rule is applied. Whitespace rules run over the whole document,
/// every other kind over prose only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Prose segments only; fenced code is never touched.
    Prose,
    /// The whole reassembled document, fences included.
    Document,
}

/// What a rule does with each match.
#[derive(Clone, Copy)]
pub enum Action {
    Delete,
    /// Regex replacement template (`$1` expands capture groups).
    Replace(&'static str),
    Rewrite(fn(&Captures<'_>) -> String),
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delete => f.write_str("Delete"),
            Self::Replace(template) => f.debug_tuple("Replace").field(template).finish(),
            Self::Rewrite(_) => f.write_str("Rewrite"),
        }
    }
}

impl RuleKind {
    pub fn scope(self) -> Scope {
        match self {
            Self::Whitespace => Scope::Document,
            Self::Markup | Self::Link | Self::Boilerplate => Scope::Prose,
        }
    }
}

struct RuleDef {
    name: &'static str,
    kind: RuleKind,
    pattern: &'static str,
    action: Action,
}

const fn rule(
    name: &'static str,
    kind: RuleKind,
    pattern: &'static str,
    action: Action,
) -> RuleDef {
    RuleDef {
        name,
        kind,
        pattern,
        action,
    }
}

use Action::{Delete, Replace, Rewrite};
use RuleKind::{Boilerplate, Link, Markup, Whitespace};

static RULE_TABLE: &[RuleDef] = &[
    // -- HTML to markdown ---------------------------------------------------
    rule("html-image", Link, r"(?is)<img\b[^>]*>", Rewrite(rewrite_image)),
    rule("html-anchor", Link, r"(?is)<a\b[^>]*>.*?</a>", Rewrite(rewrite_anchor)),
    rule("html-heading", Markup, r"(?is)<h([1-6])\b[^>]*>(.*?)</h[1-6]\s*>", Rewrite(rewrite_heading)),
    rule("html-list-item", Markup, r"(?is)<li\b[^>]*>(.*?)</li\s*>", Rewrite(rewrite_list_item)),
    rule("html-list", Markup, r"(?i)</?(?:ul|ol)\b[^>]*>", Replace("\n")),
    rule("html-strong", Markup, r"(?is)<(?:strong|b)\b[^>]*>(.*?)</(?:strong|b)\s*>", Replace("**$1**")),
    rule("html-emphasis", Markup, r"(?is)<(?:em|i)\b[^>]*>(.*?)</(?:em|i)\s*>", Replace("*$1*")),
    rule("html-code", Markup, r"(?is)<code\b[^>]*>(.*?)</code\s*>", Replace("`$1`")),
    rule("html-break", Markup, r"(?i)<br\s*/?>", Replace("\n")),
    rule("html-paragraph", Markup, r"(?i)</?p\b[^>]*>", Replace("\n")),
    rule("autolink", Link, r"<(https?://[^<>\s]+)>", Replace("$1")),
    // -- Raw markup ---------------------------------------------------------
    rule("html-comment", Markup, r"(?s)<!--.*?-->", Delete),
    rule("html-declaration", Markup, r"<![^>]*>", Delete),
    rule("html-tag", Markup, r"</?[A-Za-z][A-Za-z0-9-]*\b[^<>]*>", Delete),
    rule(
        "attribute-fragment",
        Markup,
        r#"(?i)\b(?:style|srcset|sizes|width|height|testid|data-[\w-]+|aria-[\w-]+)\s*=\s*(?:"[^"]*"|'[^']*')"#,
        Delete,
    ),
    rule("directive-marker", Markup, r"(?m)^[ \t]*(?:-[ \t]+)?:::.*$", Delete),
    rule("pandoc-span", Markup, r"\[([^\]\n]*)\]\{[.#][^}\n]*\}", Replace("$1")),
    rule("pandoc-link-attributes", Markup, r"(\]\([^)\n]*\))\{[^}\n]*\}", Replace("$1")),
    rule("pandoc-attributes", Markup, r"\{[.#][^}\n]*\}", Delete),
    rule("empty-braces", Markup, r"\{[ \t]*\}", Delete),
    rule("css-rule", Markup, r"(?m)^[ \t]*[.#@][\w-][^{}\n]*\{[^{}]*\}[ \t]*$", Delete),
    rule(
        "css-declarations",
        Markup,
        r"(?m)^[ \t]*\{\s*[\w-]+[ \t]*:[^{}]*;[^{}]*\}[ \t]*$",
        Delete,
    ),
    // -- Asset links ----------------------------------------------------------
    rule("linked-empty-image", Link, r"\[!\[\]\([^)\n]*\)\]\([^)\n]*\)", Delete),
    rule("asset-image", Link, r"!\[[^\]\n]*\]\([^)\n]*gitbook[^)\n]*\)", Delete),
    rule("asset-link", Link, r"\[[^\]\n]*\]\([^)\n]*gitbook[^)\n]*\)", Delete),
    rule("empty-link", Link, r"(^|[^!])\[\]\([^)\n]*\)", Replace("$1")),
    rule("index-page-link", Link, r"\[[^\]\n]*\]\([^)\n]*index\.html[^)\n]*\)", Delete),
    rule(
        "emoji-icon",
        Boilerplate,
        r"\[[\x{1F300}-\x{1F9FF}\x{2600}-\x{27BF}\x{FE0F}\x{200D}]+\]",
        Delete,
    ),
    // -- Chrome lines -------------------------------------------------------
    rule("search-shortcut", Boilerplate, r"(?m)^.*\[Ctrl\].*\[K\].*$", Delete),
    rule("powered-by", Boilerplate, r"(?i)\[?Powered by GitBook\]?(?:\([^)\n]*\))?", Delete),
    rule("site-banner", Boilerplate, r"(?m)^.*(?:Welcome to Xano!|Xano Documentation).*$", Delete),
    rule(
        "call-to-action",
        Boilerplate,
        r"(?im)^(?:.{0,40}\bsign up\b.{0,40}|.{0,40}\bget started\b.{0,40}\bfree\b.{0,40}|.{0,40}\bcontact\b.{0,40}\bsupport\b.{0,40}|.{0,40}\bask\b.{0,40}\bquestion\b.{0,40})$",
        Delete,
    ),
    rule("copy-button", Boilerplate, r"(?m)(?:[ \t]*\bCopy)+[ \t]*$", Delete),
    rule(
        "navigation-link-item",
        Boilerplate,
        r"(?m)^[ \t]*[-*+][ \t]+\[[^\]\n]*\]\([^)\n]*\).*$",
        Delete,
    ),
    rule(
        "chrome-block",
        Boilerplate,
        r"(?ms)^[ \t]*(?:On this page|Was this helpful\?|Last updated).*?(\n#|\z)",
        Replace("$1"),
    ),
    rule("empty-bullet", Boilerplate, r"(?m)^[ \t]*[-*+][ \t]*$", Delete),
    // -- Whitespace ---------------------------------------------------------
    rule("trailing-whitespace", Whitespace, r"(?m)[ \t]+$", Delete),
    rule("blank-line-run", Whitespace, r"\n{4,}", Replace("\n\n\n")),
];

// ---------------------------------------------------------------------------
// Rewrites
// ---------------------------------------------------------------------------

static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("valid selector"));
static A_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("valid selector"));

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `<img src alt>` to `![alt](src)`. Asset-host images and images without a
/// source are dropped.
fn rewrite_image(caps: &Captures<'_>) -> String {
    let fragment = Html::parse_fragment(&caps[0]);
    let Some(img) = fragment.select(&IMG_SELECTOR).next() else {
        return String::new();
    };

    let src = img.value().attr("src").map(str::trim).unwrap_or_default();
    if src.is_empty() || src.to_lowercase().contains(ASSET_HOST_FINGERPRINT) {
        return String::new();
    }

    let alt = collapse_whitespace(img.value().attr("alt").unwrap_or_default());
    let alt = if alt.is_empty() { "Image".to_string() } else { alt };
    format!("![{alt}]({src})")
}

/// `<a href>text</a>` to `[text](href)`; keeps only the text when there is no target.
fn rewrite_anchor(caps: &Captures<'_>) -> String {
    let fragment = Html::parse_fragment(&caps[0]);
    let Some(anchor) = fragment.select(&A_SELECTOR).next() else {
        return String::new();
    };

    let text = collapse_whitespace(&anchor.text().collect::<String>());
    match anchor.value().attr("href").map(str::trim) {
        Some(href) if !href.is_empty() && !text.is_empty() => format!("[{text}]({href})"),
        _ => text,
    }
}

fn inline_text(html: &str) -> String {
    static TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
    collapse_whitespace(&TAG_RE.replace_all(html, ""))
}

fn rewrite_heading(caps: &Captures<'_>) -> String {
    let level = caps[1].parse::<usize>().unwrap_or(2);
    let text = inline_text(&caps[2]);
    if text.is_empty() {
        return "\n".to_string();
    }
    format!("\n{} {text}\n", "#".repeat(level))
}

fn rewrite_list_item(caps: &Captures<'_>) -> String {
    format!("\n- {}", caps[1].trim())
}

// ---------------------------------------------------------------------------
// Compiled rule set
// ---------------------------------------------------------------------------

/// A compiled rule.
#[derive(Debug)]
pub struct Rule {
    pub name: &'static str,
    pub kind: RuleKind,
    regex: Regex,
    action: Action,
}

impl Rule {
    /// Apply this rule to every match in `text`.
    pub fn apply(&self, text: &str) -> String {
        match self.action {
            Action::Delete => self.regex.replace_all(text, "").into_owned(),
            Action::Replace(template) => self.regex.replace_all(text, template).into_owned(),
            Action::Rewrite(rewrite) => self
                .regex
                .replace_all(text, |caps: &Captures<'_>| rewrite(caps))
                .into_owned(),
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// The full ordered rule table, compiled once per process.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

static STANDARD: LazyLock<RuleSet> = LazyLock::new(|| RuleSet {
    rules: RULE_TABLE
        .iter()
        .map(|def| Rule {
            name: def.name,
            kind: def.kind,
            regex: Regex::new(def.pattern).expect("valid regex"),
            action: def.action,
        })
        .collect(),
});

impl RuleSet {
    /// The built-in rule table.
    pub fn standard() -> &'static RuleSet {
        &STANDARD
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Run every rule of `scope` over `text`, in table order.
    pub fn apply(&self, scope: Scope, text: &str) -> String {
        let mut result = text.to_string();
        for rule in self.rules.iter().filter(|rule| rule.kind.scope() == scope) {
            if rule.is_match(&result) {
                tracing::trace!(rule = rule.name, kind = ?rule.kind, "rule matched");
                result = rule.apply(&result);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(text: &str) -> String {
        RuleSet::standard().apply(Scope::Prose, text)
    }

    fn named(name: &str) -> &'static Rule {
        RuleSet::standard()
            .rules()
            .iter()
            .find(|rule| rule.name == name)
            .expect("rule exists")
    }

    #[test]
    fn table_compiles_and_names_are_unique() {
        let rules = RuleSet::standard().rules();
        assert!(rules.len() > 30);
        for (i, a) in rules.iter().enumerate() {
            assert!(
                rules[i + 1..].iter().all(|b| b.name != a.name),
                "duplicate rule name {}",
                a.name
            );
        }
    }

    #[test]
    fn only_whitespace_rules_touch_the_whole_document() {
        let document: Vec<_> = RuleSet::standard()
            .rules()
            .iter()
            .filter(|rule| rule.kind.scope() == Scope::Document)
            .map(|rule| rule.name)
            .collect();
        assert_eq!(document, vec!["trailing-whitespace", "blank-line-run"]);
        assert_eq!(RuleKind::Boilerplate.scope(), Scope::Prose);
    }

    #[test]
    fn prose_scope_leaves_blank_runs_alone() {
        assert_eq!(apply("a  \n\n\n\n\nb"), "a  \n\n\n\n\nb");
    }

    #[test]
    fn image_with_src_and_alt() {
        let out = named("html-image")
            .apply(r#"See <img alt="Flow chart" class="w-full" src="https://cdn.example.com/flow.png"/> here"#);
        assert_eq!(out, "See ![Flow chart](https://cdn.example.com/flow.png) here");
    }

    #[test]
    fn image_without_alt_gets_placeholder_caption() {
        let out = named("html-image").apply(r#"<img src='/img/a.png'>"#);
        assert_eq!(out, "![Image](/img/a.png)");
    }

    #[test]
    fn asset_host_image_is_dropped() {
        let out = named("html-image")
            .apply(r#"<img src="https://x.gitbook.io/~gitbook/image?url=a" alt="logo">"#);
        assert_eq!(out, "");
        assert_eq!(named("html-image").apply("<img alt=\"no source\">"), "");
    }

    #[test]
    fn anchor_becomes_link() {
        let out = named("html-anchor")
            .apply(r#"Read <a class="link" href="/docs/filters">the <span>filter</span> guide</a>."#);
        assert_eq!(out, "Read [the filter guide](/docs/filters).");
        assert_eq!(named("html-anchor").apply("<a>bare</a>"), "bare");
    }

    #[test]
    fn markup_conversions_keep_meaning() {
        let out = apply("<h2 id=\"x\">Query <em>all</em></h2><p>Use <strong>paging</strong> and <code>page</code>.</p>");
        assert!(out.contains("## Query all"));
        assert!(out.contains("Use **paging** and `page`."));
        assert!(!out.contains('<'));
    }

    #[test]
    fn short_tags_are_not_confused() {
        let out = apply("<b>bold</b> <br/> <i>it</i>");
        assert_eq!(out, "**bold** \n *it*");
    }

    #[test]
    fn list_markup_becomes_bullets() {
        let out = apply("<ul><li>First item text</li><li>Second item</li></ul>");
        assert!(out.contains("- First item text"));
        assert!(out.contains("- Second item"));
        assert!(!out.contains("<li"));
    }

    #[test]
    fn raw_tags_and_comments_are_stripped() {
        let out = apply("<div class=\"card\"><!-- hidden -->Kept text</div><!DOCTYPE html>");
        assert_eq!(out, "Kept text");
    }

    #[test]
    fn autolinks_survive_tag_stripping() {
        assert_eq!(apply("Visit <https://xano.com/docs> now"), "Visit https://xano.com/docs now");
    }

    #[test]
    fn directive_markers_are_removed_but_content_kept() {
        let out = apply("::: {.hint}\nThe hint body stays.\n:::\n- :::");
        assert_eq!(out, "\nThe hint body stays.\n\n");
    }

    #[test]
    fn pandoc_spans_and_css_blocks() {
        assert_eq!(apply("[Docs]{.font-emoji}"), "Docs");
        assert_eq!(apply("[Go](/x){target=_blank}"), "[Go](/x)");
        assert_eq!(apply("Title {#anchor}"), "Title ");
        assert_eq!(apply(".card { color: red; }\nText"), "\nText");
        assert_eq!(apply("{ margin: 0; padding: 2px; }"), "");
    }

    #[test]
    fn attribute_fragments_are_removed() {
        let out = apply(r#"left style="color: red" data-node-id="12" aria-hidden='true' right"#);
        assert_eq!(out.split_whitespace().collect::<Vec<_>>(), vec!["left", "right"]);
    }

    #[test]
    fn asset_host_links_and_index_pages() {
        assert_eq!(apply("![](https://img.gitbook.com/a.png)"), "");
        assert_eq!(apply("[Home](https://docs.gitbook.io/)"), "");
        assert_eq!(apply("[![](a.png)](https://x.com)"), "");
        assert_eq!(apply("[![](https://x.gitbook.io/logo.png)](https://x.com)"), "");
        assert_eq!(apply("Empty [](https://x.com) link"), "Empty  link");
        assert_eq!(apply("![](https://cdn.example.com/a.png)"), "![](https://cdn.example.com/a.png)");
        assert_eq!(apply("Back to [start](../index.html)"), "Back to ");
        assert_eq!(apply("[Keep](https://example.com/page)"), "[Keep](https://example.com/page)");
    }

    #[test]
    fn emoji_icons() {
        assert_eq!(apply("[\u{1F4A1}] Tip"), " Tip");
        assert_eq!(apply("[\u{26A0}\u{FE0F}] Warning"), " Warning");
    }

    #[test]
    fn chrome_lines() {
        assert_eq!(apply("Xano Documentation [Ctrl] [K]\nBody"), "\nBody");
        assert_eq!(apply("[Powered by GitBook](https://gitbook.com)"), "");
        assert_eq!(apply("Sign up today!\nReal text"), "\nReal text");
        assert_eq!(apply("Get started for free\nReal text"), "\nReal text");
        assert_eq!(apply("const a = 1; Copy"), "const a = 1;");
    }

    #[test]
    fn call_to_action_only_hits_short_lines() {
        let long = "To contact the support team, open the help panel in the bottom right of any workspace page.";
        assert_eq!(apply(long), long);
    }

    #[test]
    fn navigation_items_are_removed() {
        let out = apply("- [Home](/)\n* [Docs](/docs)\nA real paragraph of text.");
        assert_eq!(out, "\n\nA real paragraph of text.");
    }

    #[test]
    fn chrome_blocks_run_to_next_heading() {
        let out = apply("## Intro\nText\nOn this page\n- Intro\n- Usage\n## Usage\nMore\nLast updated 3 months ago\nfooter junk");
        assert_eq!(out, "## Intro\nText\n\n## Usage\nMore\n");
    }

    #[test]
    fn document_whitespace_rules() {
        let out = RuleSet::standard().apply(Scope::Document, "a  \n\n\n\n\n\nb\t\n");
        assert_eq!(out, "a\n\n\nb\n");
    }
}
