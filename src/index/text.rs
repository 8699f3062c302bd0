//! Tokenising and keyword extraction for the in-memory stores.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Keywords kept per document by the keyword store.
pub const MAX_KEYWORDS: usize = 10;

static RE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}_]+").unwrap());

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "in", "is", "it",
        "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "with",
    ]
    .into_iter()
    .collect()
});

/// Lowercased word tokens of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    RE_TOKEN
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Token counts, stopwords removed.
pub fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut tf = HashMap::new();
    for token in tokenize(text) {
        if STOPWORDS.contains(token.as_str()) {
            continue;
        }
        *tf.entry(token).or_insert(0.0) += 1.0;
    }
    tf
}

/// The `max` most frequent terms, ties broken alphabetically.
pub fn extract_keywords(text: &str, max: usize) -> Vec<String> {
    let mut terms: Vec<(String, f64)> = term_frequencies(text).into_iter().collect();
    terms.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    terms.into_iter().take(max).map(|(t, _)| t).collect()
}

/// Cosine similarity of two sparse term vectors.
pub fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(term, x)| b.get(term).map(|y| x * y))
        .sum();
    let norm = |v: &HashMap<String, f64>| v.values().map(|x| x * x).sum::<f64>().sqrt();
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_splits_punctuation() {
        assert_eq!(tokenize("Hotel-Fee: 750, Meals!"), vec!["hotel", "fee", "750", "meals"]);
    }

    #[test]
    fn keywords_rank_by_frequency() {
        let kw = extract_keywords("the fee and the fee and the hotel", 2);
        assert_eq!(kw, vec!["fee", "hotel"]);
    }

    #[test]
    fn cosine_of_identical_text_is_one() {
        let a = term_frequencies("travel budget");
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-9);
        assert_eq!(cosine(&a, &term_frequencies("unrelated words")), 0.0);
        assert_eq!(cosine(&a, &HashMap::new()), 0.0);
    }
}
