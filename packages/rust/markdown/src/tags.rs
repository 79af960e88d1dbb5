//! Keyword tags and difficulty.

use doctidy_shared::{Difficulty, DifficultyConfig, TagConfig};

/// Tags whose keywords occur in `content`, in table order, capped at `max_tags`.
pub fn extract_tags(content: &str, config: &TagConfig) -> Vec<String> {
    let lower = content.to_lowercase();
    let mut tags: Vec<String> = Vec::new();

    for rule in &config.rules {
        if tags.len() >= config.max_tags {
            break;
        }
        if tags.iter().any(|t| t == &rule.tag) {
            continue;
        }
        if rule
            .keywords
            .iter()
            .any(|keyword| !keyword.is_empty() && lower.contains(&keyword.to_lowercase()))
        {
            tags.push(rule.tag.clone());
        }
    }

    tags
}

/// Classify by how many distinct indicator phrases appear.
pub fn assess_difficulty(content: &str, config: &DifficultyConfig) -> Difficulty {
    let lower = content.to_lowercase();
    let count = |indicators: &[String]| {
        indicators
            .iter()
            .filter(|word| !word.is_empty() && lower.contains(&word.to_lowercase()))
            .count()
    };

    if count(&config.advanced) >= config.advanced_threshold {
        Difficulty::Advanced
    } else if count(&config.intermediate) >= config.intermediate_threshold {
        Difficulty::Intermediate
    } else {
        Difficulty::Beginner
    }
}
