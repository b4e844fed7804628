//! Picking a template layout for a planned slide.
//!
//! Matching is pure and deterministic: the same names and hint always give
//! the same index.

use super::inventory::LayoutInfo;

// Planner vocabulary -> layout names commonly found in real templates
const LAYOUT_ALIASES: &[(&str, &[&str])] = &[
    ("title_and_content", &["Title and Content", "Content with Caption"]),
    ("title_only", &["Title Only", "Blank Title", "Title"]),
    ("section_header", &["Section Header", "Section Title", "Title Slide"]),
    ("two_content", &["Two Content", "Comparison"]),
    ("quote", &["Quote", "Title Only"]),
    ("comparison", &["Comparison", "Two Content"]),
    ("timeline", &["Title and Content", "Two Content"]),
    ("process", &["Title and Content", "Two Content"]),
    ("overview", &["Title and Content", "Title Only"]),
    ("summary", &["Title and Content", "Title Only"]),
];

/// Which rule picked the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Hint overlapped the layout name
    Hint,
    /// Hint only matched through the alias table
    Alias,
    /// No usable hint; generic title-and-content style layout
    Default,
    /// Hint given but nothing matched; fell back to the default
    Unmatched,
}

/// Index into `layouts` plus how it was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutChoice {
    pub index: usize,
    pub kind: MatchKind,
}

/// Picks a layout for `hint`. `layouts` must not be empty.
pub fn match_layout(layouts: &[LayoutInfo], hint: Option<&str>) -> LayoutChoice {
    let names: Vec<&str> = layouts.iter().map(|l| l.name.as_str()).collect();
    let hint = hint.map(str::trim).filter(|h| !h.is_empty());

    let Some(hint) = hint else {
        return LayoutChoice {
            index: default_layout(layouts),
            kind: MatchKind::Default,
        };
    };

    if let Some(index) = best_by_name(&names, hint) {
        return LayoutChoice {
            index,
            kind: MatchKind::Hint,
        };
    }

    let key = normalize(hint).replace(' ', "_");
    if let Some((_, aliases)) = LAYOUT_ALIASES.iter().find(|(k, _)| *k == key) {
        for alias in *aliases {
            if let Some(index) = best_by_name(&names, alias) {
                return LayoutChoice {
                    index,
                    kind: MatchKind::Alias,
                };
            }
        }
    }

    LayoutChoice {
        index: default_layout(layouts),
        kind: MatchKind::Unmatched,
    }
}

/// Highest-scoring name for `hint`, first one on ties; `None` when nothing overlaps.
pub fn best_by_name(names: &[&str], hint: &str) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (i, name) in names.iter().enumerate() {
        let score = overlap_score(name, hint);
        if score > 0 && best.is_none_or(|(_, s)| score > s) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

/// Case-insensitive token overlap, boosted for whole-phrase containment.
pub fn overlap_score(name: &str, hint: &str) -> u32 {
    let name = normalize(name);
    let hint = normalize(hint);
    if name.is_empty() || hint.is_empty() {
        return 0;
    }

    let name_tokens: Vec<&str> = name.split(' ').collect();
    let mut score: u32 = hint
        .split(' ')
        .filter(|t| name_tokens.contains(t))
        .count() as u32
        * 2;

    if name == hint {
        score += 6;
    } else if contains_phrase(&name, &hint) || contains_phrase(&hint, &name) {
        score += 3;
    }
    score
}

// Phrase containment on token boundaries
fn contains_phrase(haystack: &str, needle: &str) -> bool {
    format!(" {haystack} ").contains(&format!(" {needle} "))
}

/// Lowercases and collapses every run of non-alphanumerics into one space.
pub fn normalize(s: &str) -> String {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Generic "title and content" style layout, else one with both a title and
/// a body placeholder, else the first.
pub fn default_layout(layouts: &[LayoutInfo]) -> usize {
    layouts
        .iter()
        .position(|l| contains_phrase(&normalize(&l.name), "title and content"))
        .or_else(|| layouts.iter().position(|l| l.title.is_some() && l.body.is_some()))
        .unwrap_or(0)
}
