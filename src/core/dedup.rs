//! Order-preserving deduplication

use std::collections::HashSet;
use std::hash::Hash;

/// Drop every element whose key was already seen, keeping first-seen order.
pub fn stable_dedup_by<T, K, F>(items: impl IntoIterator<Item = T>, mut key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(key(item)))
        .collect()
}

/// [`stable_dedup_by`] keyed on the strings themselves (case-sensitive).
pub fn stable_dedup(items: impl IntoIterator<Item = String>) -> Vec<String> {
    stable_dedup_by(items, |s| s.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_seen_order_is_kept() {
        let out = stable_dedup(strings(&["b", "a", "b", "c", "a"]));
        assert_eq!(out, strings(&["b", "a", "c"]));
    }

    #[test]
    fn test_case_sensitive() {
        let out = stable_dedup(strings(&["Analysis", "analysis"]));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_idempotent() {
        let once = stable_dedup(strings(&["x", "y", "x", "z", "y"]));
        let twice = stable_dedup(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_custom_key() {
        let pairs = vec![(1, "a"), (2, "a"), (3, "b")];
        let out = stable_dedup_by(pairs, |(_, tag)| *tag);
        assert_eq!(out, vec![(1, "a"), (3, "b")]);
    }

    #[test]
    fn test_empty() {
        assert!(stable_dedup(Vec::new()).is_empty());
    }
}
