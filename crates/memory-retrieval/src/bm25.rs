//! BM25 over the current non-archived corpus (spec §4.E: "bm25 uses the
//! corpus IDF over current non-archived memories"). Rebuilt per query
//! rather than maintained incrementally — the corpus this system indexes
//! is a single user's memories, not a web-scale collection.

use std::collections::HashMap;

const K1: f64 = 1.5;
const B: f64 = 0.75;

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

struct Doc {
    id: String,
    term_freqs: HashMap<String, usize>,
    len: usize,
}

pub struct Bm25Index {
    docs: Vec<Doc>,
    doc_freq: HashMap<String, usize>,
    avg_len: f64,
}

impl Bm25Index {
    /// Builds an index over `corpus`: (memory_id, content) pairs.
    pub fn build<'a>(corpus: impl Iterator<Item = (&'a str, &'a str)>) -> Self {
        let mut docs = Vec::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut total_len = 0usize;

        for (id, content) in corpus {
            let tokens = tokenize(content);
            let len = tokens.len();
            total_len += len;
            let mut term_freqs: HashMap<String, usize> = HashMap::new();
            for token in &tokens {
                *term_freqs.entry(token.clone()).or_insert(0) += 1;
            }
            for term in term_freqs.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            docs.push(Doc { id: id.to_string(), term_freqs, len });
        }

        let avg_len = if docs.is_empty() { 0.0 } else { total_len as f64 / docs.len() as f64 };
        Self { docs, doc_freq, avg_len }
    }

    fn idf(&self, term: &str) -> f64 {
        let n = self.docs.len() as f64;
        let df = *self.doc_freq.get(term).unwrap_or(&0) as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Raw (unnormalized) BM25 scores for every doc that has a nonzero
    /// score against `query`, keyed by memory id.
    pub fn score(&self, query: &str) -> HashMap<String, f64> {
        let query_terms = tokenize(query);
        let mut scores = HashMap::new();
        if self.docs.is_empty() || query_terms.is_empty() {
            return scores;
        }
        for doc in &self.docs {
            let mut score = 0.0;
            for term in &query_terms {
                let Some(&tf) = doc.term_freqs.get(term) else { continue };
                let tf = tf as f64;
                let idf = self.idf(term);
                let denom = tf + K1 * (1.0 - B + B * (doc.len as f64 / self.avg_len.max(1.0)));
                score += idf * (tf * (K1 + 1.0)) / denom.max(1e-9);
            }
            if score > 0.0 {
                scores.insert(doc.id.clone(), score);
            }
        }
        scores
    }
}

/// Min-max normalizes raw scores to [0,1] across the candidate set. A
/// constant set of scores (including a single-element set) normalizes to
/// 1.0 for every member rather than dividing by zero.
pub fn min_max_normalize(scores: &HashMap<String, f64>) -> HashMap<String, f64> {
    if scores.is_empty() {
        return HashMap::new();
    }
    let min = scores.values().cloned().fold(f64::INFINITY, f64::min);
    let max = scores.values().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    scores
        .iter()
        .map(|(id, &s)| (id.clone(), if range > 1e-9 { (s - min) / range } else { 1.0 }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_term_match_outscores_nonmatch() {
        let corpus = vec![("a", "rust memory safety"), ("b", "completely unrelated text")];
        let idx = Bm25Index::build(corpus.into_iter());
        let scores = idx.score("rust safety");
        assert!(scores.contains_key("a"));
        assert!(!scores.contains_key("b"));
    }

    #[test]
    fn empty_query_yields_no_scores() {
        let corpus = vec![("a", "some content")];
        let idx = Bm25Index::build(corpus.into_iter());
        assert!(idx.score("").is_empty());
    }

    #[test]
    fn empty_corpus_yields_no_scores() {
        let idx = Bm25Index::build(std::iter::empty());
        assert!(idx.score("anything").is_empty());
    }

    #[test]
    fn min_max_normalize_maps_to_unit_interval() {
        let mut scores = HashMap::new();
        scores.insert("a".to_string(), 1.0);
        scores.insert("b".to_string(), 3.0);
        scores.insert("c".to_string(), 2.0);
        let normalized = min_max_normalize(&scores);
        assert_eq!(normalized["a"], 0.0);
        assert_eq!(normalized["b"], 1.0);
        assert!((normalized["c"] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn min_max_normalize_constant_scores_all_one() {
        let mut scores = HashMap::new();
        scores.insert("a".to_string(), 5.0);
        scores.insert("b".to_string(), 5.0);
        let normalized = min_max_normalize(&scores);
        assert_eq!(normalized["a"], 1.0);
        assert_eq!(normalized["b"], 1.0);
    }
}
