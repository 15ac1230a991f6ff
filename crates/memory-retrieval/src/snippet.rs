//! Explainability: best-matching snippet and match reasons (spec §4.E).

/// Returns up to `max_chars` of `content` centered on the first query-term
/// hit, falling back to the leading slice when nothing matches.
pub fn build_snippet(content: &str, query: &str, max_chars: usize) -> String {
    let lower = content.to_lowercase();
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    let hit = terms.iter().find_map(|t| lower.find(t.as_str()));
    let start = match hit {
        Some(pos) => pos.saturating_sub(max_chars / 4),
        None => 0,
    };
    let start = floor_char_boundary(content, start);
    let end = floor_char_boundary(content, (start + max_chars).min(content.len()));

    let mut snippet = content[start..end].trim().to_string();
    if start > 0 {
        snippet = format!("…{snippet}");
    }
    if end < content.len() {
        snippet.push('…');
    }
    snippet
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Human-readable reasons a result matched, in priority order (spec §4.E).
pub fn match_reasons(
    content: &str,
    query: &str,
    tags: &[String],
    same_project: bool,
    semantic_score: f64,
) -> Vec<String> {
    let mut reasons = Vec::new();
    let lower_content = content.to_lowercase();
    let lower_query = query.to_lowercase();

    if !lower_query.is_empty() && lower_content.contains(&lower_query) {
        reasons.push("exact phrase match".to_string());
    }
    if semantic_score >= 0.8 {
        reasons.push("high semantic similarity".to_string());
    }
    let query_terms: Vec<&str> = lower_query.split_whitespace().collect();
    if tags.iter().any(|t| query_terms.contains(&t.to_lowercase().as_str())) {
        reasons.push("tag match".to_string());
    }
    if same_project {
        reasons.push("same project".to_string());
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_centers_on_first_hit() {
        let content = "a".repeat(300) + "needle" + &"b".repeat(300);
        let snippet = build_snippet(&content, "needle", 50);
        assert!(snippet.contains("needle"));
        assert!(snippet.starts_with('…'));
        assert!(snippet.ends_with('…'));
    }

    #[test]
    fn snippet_falls_back_to_start_when_no_hit() {
        let content = "no matching terms here at all in this content body";
        let snippet = build_snippet(content, "zzz", 20);
        assert!(content.starts_with(snippet.trim_end_matches('…')));
    }

    #[test]
    fn exact_phrase_match_is_reported() {
        let reasons = match_reasons("I learned that tests matter", "learned that", &[], false, 0.2);
        assert!(reasons.contains(&"exact phrase match".to_string()));
    }

    #[test]
    fn high_semantic_similarity_is_reported() {
        let reasons = match_reasons("unrelated", "query", &[], false, 0.9);
        assert!(reasons.contains(&"high semantic similarity".to_string()));
    }

    #[test]
    fn tag_match_is_reported() {
        let reasons =
            match_reasons("content", "rust memories", &["rust".to_string()], false, 0.1);
        assert!(reasons.contains(&"tag match".to_string()));
    }

    #[test]
    fn same_project_is_reported() {
        let reasons = match_reasons("content", "query", &[], true, 0.1);
        assert!(reasons.contains(&"same project".to_string()));
    }
}
