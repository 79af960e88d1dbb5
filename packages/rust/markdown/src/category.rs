//! Category decision table.

use doctidy_shared::{CategoryConfig, CategoryRule};

/// Map a document to its category path. Total: always returns a path.
pub fn categorize(source_id: &str, content: &str, config: &CategoryConfig) -> String {
    // Leading slash lets `/segment/` tokens match the first path segment.
    let id = format!("/{}", source_id.to_lowercase().replace('\\', "/"));

    if let Some(rule) = config.rules.iter().find(|rule| matches(rule, &id)) {
        return rule.category.clone();
    }

    let content = content.to_lowercase();
    config
        .content_fallbacks
        .iter()
        .find(|fb| contains(&id, &fb.keyword))
        .or_else(|| {
            config
                .content_fallbacks
                .iter()
                .find(|fb| contains(&content, &fb.keyword))
        })
        .map(|fb| fb.category.clone())
        .unwrap_or_else(|| config.default_category.clone())
}

fn matches(rule: &CategoryRule, id: &str) -> bool {
    if rule.all.is_empty() && rule.any.is_empty() {
        return false;
    }
    rule.all.iter().all(|token| contains(id, token))
        && (rule.any.is_empty() || rule.any.iter().any(|token| contains(id, token)))
}

/// `haystack` is already lower-cased; configured tokens may not be.
fn contains(haystack: &str, token: &str) -> bool {
    haystack.contains(&token.to_lowercase())
}

/// First segment of a category path.
pub fn section_of(category: &str) -> &str {
    category.split('/').next().unwrap_or(category)
}
