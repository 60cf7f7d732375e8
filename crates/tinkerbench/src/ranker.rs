//! Relevance ranking
//!
//! Scores descriptors against a free-text query in fixed tiers and returns
//! them in a total order: score descending, then shorter display name, then
//! display name, then key. Descriptors that match nothing are dropped.

use crate::descriptor::OperationDescriptor;

pub mod score {
    pub const EXACT: u32 = 100;
    pub const PREFIX: u32 = 80;
    pub const KEYWORD: u32 = 65;
    pub const PRIORITY_VERB_BONUS: u32 = 5;
    pub const SUBSTRING_NAME: u32 = 40;
    pub const SUBSTRING_TOOLTIP: u32 = 30;
}

/// Common operation verbs whose keyword matches rank a little higher.
pub const PRIORITY_VERBS: &[&str] = &[
    "get", "set", "add", "remove", "make", "break", "create", "spawn", "cast", "print", "call",
];

#[derive(Debug, Clone, Default)]
pub struct RankOptions<'a> {
    pub category: Option<&'a str>,
    pub max_results: Option<usize>,
}

/// Tier score for one descriptor, `None` if it does not match at all.
/// An empty query matches everything with score 0.
pub fn score(desc: &OperationDescriptor, query: &str) -> Option<u32> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Some(0);
    }

    let display = desc.display_name.to_lowercase();
    let member = desc.kind.member_name().map(str::to_lowercase);

    if display == query || member.as_deref() == Some(query.as_str()) {
        return Some(score::EXACT);
    }
    if display.starts_with(&query) || member.as_deref().is_some_and(|m| m.starts_with(&query)) {
        return Some(score::PREFIX);
    }

    let keyword_hit = query.split_whitespace().find_map(|term| {
        desc.keywords
            .iter()
            .find(|k| k.eq_ignore_ascii_case(term))
            .map(|k| k.to_lowercase())
    });
    if let Some(keyword) = keyword_hit {
        let bonus = if PRIORITY_VERBS.contains(&keyword.as_str()) {
            score::PRIORITY_VERB_BONUS
        } else {
            0
        };
        return Some(score::KEYWORD + bonus);
    }

    if display.contains(&query) || member.as_deref().is_some_and(|m| m.contains(&query)) {
        return Some(score::SUBSTRING_NAME);
    }
    if desc.tooltip.to_lowercase().contains(&query) {
        return Some(score::SUBSTRING_TOOLTIP);
    }
    None
}

/// Category filter: exact match or any sub-category (`Math` matches `Math|Float`).
fn in_category(desc: &OperationDescriptor, category: &str) -> bool {
    let wanted = category.trim().to_lowercase();
    let actual = desc.category.to_lowercase();
    actual == wanted || actual.starts_with(&format!("{wanted}|"))
}

pub fn rank(
    descriptors: Vec<OperationDescriptor>,
    query: &str,
    options: &RankOptions<'_>,
) -> Vec<OperationDescriptor> {
    let mut ranked: Vec<OperationDescriptor> = descriptors
        .into_iter()
        .filter(|d| options.category.map_or(true, |c| in_category(d, c)))
        .filter_map(|mut d| {
            d.relevance_score = score(&d, query)?;
            Some(d)
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.relevance_score
            .cmp(&a.relevance_score)
            .then_with(|| a.display_name.len().cmp(&b.display_name.len()))
            .then_with(|| a.display_name.cmp(&b.display_name))
            .then_with(|| a.key.cmp(&b.key))
    });

    if let Some(max) = options.max_results {
        ranked.truncate(max);
    }
    ranked
}
