//! TOC (Table of Contents) builder.
//!
//! Groups written documents into a section → category → document hierarchy
//! that maps to `toc.json`.

use std::collections::BTreeMap;

use tracing::{debug, instrument};

use doctidy_shared::{DocumentMeta, OutputConfig, Toc, TocEntry};

use crate::assembler::section_dir;

/// Build a TOC from the documents written in a run.
///
/// Sections follow the configured section order, with unknown sections
/// appended alphabetically. Within a section, documents filed directly under
/// it come first, followed by one entry per sub-category.
#[instrument(skip_all, fields(documents = documents.len()))]
pub fn build_toc(documents: &[DocumentMeta], config: &OutputConfig) -> Toc {
    // section -> sub-category ("" for the section itself) -> entries
    let mut grouped: BTreeMap<&str, BTreeMap<&str, Vec<TocEntry>>> = BTreeMap::new();

    for doc in documents {
        let (section, rest) = doc
            .category
            .split_once('/')
            .unwrap_or((doc.category.as_str(), ""));
        grouped
            .entry(section)
            .or_default()
            .entry(rest)
            .or_default()
            .push(TocEntry {
                title: doc.title.clone(),
                path: doc.path.clone(),
                source: Some(doc.source.clone()),
                children: vec![],
            });
    }

    let mut sections: Vec<(&str, BTreeMap<&str, Vec<TocEntry>>)> = grouped.into_iter().collect();
    sections.sort_by_key(|(section, _)| {
        let rank = config
            .section_order
            .iter()
            .position(|s| s == section)
            .unwrap_or(usize::MAX);
        (rank, section.to_string())
    });

    let sections: Vec<TocEntry> = sections
        .into_iter()
        .map(|(section, categories)| {
            let dir = section_dir(section, config);
            let mut children = Vec::new();
            let mut groups = Vec::new();

            for (rest, mut entries) in categories {
                sort_entries(&mut entries);
                if rest.is_empty() {
                    children.extend(entries);
                } else {
                    groups.push(TocEntry {
                        title: title_from_path(rest),
                        path: format!("{dir}/{rest}"),
                        source: None,
                        children: entries,
                    });
                }
            }
            sort_entries(&mut groups);
            children.extend(groups);

            TocEntry {
                title: title_from_path(section),
                path: dir,
                source: None,
                children,
            }
        })
        .collect();

    debug!(sections = sections.len(), "TOC built");
    Toc { sections }
}

/// Number of document (leaf) entries under `entry`.
pub fn document_count(entry: &TocEntry) -> usize {
    if entry.children.is_empty() {
        return usize::from(entry.source.is_some());
    }
    entry.children.iter().map(document_count).sum()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Extract a human-readable title from a category path.
pub(crate) fn title_from_path(path: &str) -> String {
    let segment = path.rsplit('/').next().unwrap_or(path);

    segment
        .replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| match word {
            "ai" | "api" => word.to_uppercase(),
            _ => {
                let mut chars = word.chars();
                match chars.next() {
                    Some(c) => {
                        let upper: String = c.to_uppercase().collect();
                        format!("{upper}{}", chars.collect::<String>())
                    }
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sort entries alphabetically by title, recursively.
fn sort_entries(entries: &mut [TocEntry]) {
    entries.sort_by(|a, b| {
        a.title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.path.cmp(&b.path))
    });

    for entry in entries.iter_mut() {
        if !entry.children.is_empty() {
            sort_entries(&mut entry.children);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
