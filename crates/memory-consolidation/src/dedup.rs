//! Fuzzy dedup against already-stored memories (spec §4.F step 4).
//!
//! Overlap is bidirectional: `shared / min(len_a, len_b)` rather than
//! `shared / union`, so a short candidate fully contained in a longer
//! existing memory (or vice versa) is still caught as a duplicate. This
//! is equivalent to spec's `max(|A∩B|/|A|, |A∩B|/|B|)` since dividing by
//! the smaller set always yields the larger of the two ratios.

use std::collections::HashSet;

fn words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

pub fn word_overlap_ratio(a: &str, b: &str) -> f64 {
    let wa = words(a);
    let wb = words(b);
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }
    let shared = wa.intersection(&wb).count() as f64;
    let smaller = wa.len().min(wb.len()) as f64;
    shared / smaller
}

/// `true` if `candidate` overlaps any of `existing` above `threshold`
/// (spec §4.F: 0.70 bidirectional word-overlap threshold).
pub fn is_duplicate(candidate: &str, existing: &[String], threshold: f64) -> bool {
    existing.iter().any(|e| word_overlap_ratio(candidate, e) >= threshold)
}

/// Returns the id of the first memory in `existing` whose content
/// overlaps `candidate` above `threshold`, or `None` if the candidate is
/// novel. Lets the caller reinforce the matched memory instead of just
/// discarding the duplicate candidate (spec §4.F steps 4 and 6).
pub fn find_duplicate<'a>(candidate: &str, existing: &'a [(String, String)], threshold: f64) -> Option<&'a str> {
    existing
        .iter()
        .find(|(_, content)| word_overlap_ratio(candidate, content) >= threshold)
        .map(|(id, _)| id.as_str())
}
