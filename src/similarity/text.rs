//! Normalized edit-distance text similarity.

/// Trims, collapses internal whitespace and lowercases.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Character-level Levenshtein distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `1 - distance / max(len(a), len(b))` over normalized inputs.
///
/// Two empty strings are identical.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_text(a);
    let b = normalize_text(b);
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    (1.0 - levenshtein(&a, &b) as f64 / max_len as f64).clamp(0.0, 1.0)
}

/// Best similarity between any expected text and any observed text.
///
/// `None` when either side has nothing non-blank to compare.
pub fn best_text_similarity(expected: &[&str], observed: &[&str]) -> Option<f64> {
    let expected: Vec<&str> = expected
        .iter()
        .copied()
        .filter(|s| !s.trim().is_empty())
        .collect();
    let observed: Vec<&str> = observed
        .iter()
        .copied()
        .filter(|s| !s.trim().is_empty())
        .collect();
    if expected.is_empty() || observed.is_empty() {
        return None;
    }
    expected
        .iter()
        .flat_map(|e| observed.iter().map(move |o| text_similarity(e, o)))
        .fold(None, |best: Option<f64>, s| {
            Some(best.map_or(s, |b| b.max(s)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_classic_cases() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", "abc"), 0);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
    }

    #[test]
    fn levenshtein_counts_characters_not_bytes() {
        assert_eq!(levenshtein("café", "cafe"), 1);
    }

    #[test]
    fn similarity_ignores_case_and_spacing() {
        assert_eq!(text_similarity("  Submit   Order ", "submit order"), 1.0);
    }

    #[test]
    fn similarity_is_normalized_by_longer_string() {
        let s = text_similarity("Submit", "Submit Order");
        assert!((s - 0.5).abs() < 1e-9, "got {s}");
        assert_eq!(text_similarity("", ""), 1.0);
        assert_eq!(text_similarity("abc", ""), 0.0);
    }

    #[test]
    fn best_similarity_takes_maximum_pair() {
        let best = best_text_similarity(&["Submit", "Submit Order"], &["Cancel", "Submit Order"]);
        assert_eq!(best, Some(1.0));
        assert_eq!(best_text_similarity(&["Submit"], &["   "]), None);
        assert_eq!(best_text_similarity(&[], &["Submit"]), None);
    }
}
