//! Regex-based candidate extraction (spec §4.F step 2): four independent
//! pattern families scanned directly over transcript text, each with its
//! own base importance. A sentence can match more than one family (e.g.
//! a correction phrased as a realization) but only the highest-priority
//! family that matches contributes a candidate, so the same sentence
//! never duplicates itself across families.

use std::sync::OnceLock;

use regex::Regex;

use memory_core::types::MemoryCandidate;

use crate::transcript::Message;

fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.len() >= 12)
        .map(str::to_string)
        .collect()
}

/// "actually", "no,", "that's wrong" -- corrections carry the highest
/// base importance of the four families (spec §4.F step 2).
fn user_correction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bactually\b|\bno,\s|that'?s wrong").unwrap())
}

/// "learned that", "discovered that", "realized".
fn explicit_learning_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)learned that|discovered that|\brealized\b").unwrap())
}

/// "Problem: ... Solution: ..." pairs, matched across the whole message
/// rather than per-sentence since the pair usually spans more than one.
fn problem_solution_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)\bproblem:\s*(?P<problem>.+?)\s*\bsolution:\s*(?P<solution>.+)").unwrap())
}

/// Reasoning markers that precede an assistant insight: "because",
/// "since", "this means", "therefore", "which means", "the reason is".
fn reasoning_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bbecause\b|\bsince\b|\bthis means\b|\btherefore\b|\bwhich means\b|\bthe reason is\b").unwrap()
    })
}

/// Extracts candidate memory content from normalized transcript messages.
/// Each candidate is tagged with the trigger family that matched it.
pub fn extract_candidates(messages: &[Message]) -> Vec<MemoryCandidate> {
    let mut candidates = Vec::new();

    for message in messages {
        if let Some(caps) = problem_solution_re().captures(&message.content) {
            let problem = caps.name("problem").unwrap().as_str().trim();
            let solution = caps.name("solution").unwrap().as_str().trim();
            let content = format!("Problem: {problem} Solution: {solution}");
            if content.len() >= 12 {
                candidates.push(MemoryCandidate {
                    content,
                    base_importance: 0.7,
                    tags: vec!["problem_solution".to_string(), message.role.clone()],
                });
            }
        }

        for sentence in split_sentences(&message.content) {
            if user_correction_re().is_match(&sentence) {
                candidates.push(MemoryCandidate {
                    content: sentence,
                    base_importance: 0.8,
                    tags: vec!["user_correction".to_string(), message.role.clone()],
                });
            } else if explicit_learning_re().is_match(&sentence) {
                candidates.push(MemoryCandidate {
                    content: sentence,
                    base_importance: 0.7,
                    tags: vec!["explicit_learning".to_string(), message.role.clone()],
                });
            } else if message.role == "assistant" && reasoning_marker_re().is_match(&sentence) {
                candidates.push(MemoryCandidate {
                    content: sentence,
                    base_importance: 0.6,
                    tags: vec!["assistant_insight".to_string(), message.role.clone()],
                });
            }
        }
    }

    candidates
}
