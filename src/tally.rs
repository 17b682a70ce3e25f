use std::collections::HashMap;

/// Per-dimension category counter
///
/// Keys appear lazily on first observation and counts only ever grow.
/// The empty string is a regular key: a record without a value for a
/// dimension is still counted, under `""`.
#[derive(Debug, Clone, Default)]
pub struct Tally {
    counts: HashMap<String, u64>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one observation of `key`
    pub fn increment(&mut self, key: &str) {
        // Avoid allocating the key on the hot path when it already exists
        if let Some(count) = self.counts.get_mut(key) {
            *count += 1;
        } else {
            self.counts.insert(key.to_string(), 1);
        }
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Copy of all (key, count) pairs, count descending, ties by ascending key
    pub fn snapshot_sorted(&self) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = self
            .counts
            .iter()
            .map(|(key, count)| (key.clone(), *count))
            .collect();
        entries.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_inserts_lazily() {
        let mut tally = Tally::new();
        assert!(tally.is_empty());
        assert_eq!(tally.get("router"), 0);

        tally.increment("router");
        tally.increment("router");
        tally.increment("");

        assert_eq!(tally.get("router"), 2);
        assert_eq!(tally.get(""), 1);
        assert_eq!(tally.len(), 2);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn test_snapshot_sorted_by_count_then_key() {
        let mut tally = Tally::new();
        for _ in 0..3 {
            tally.increment("a");
        }
        for _ in 0..5 {
            tally.increment("c");
            tally.increment("b");
        }

        let snapshot = tally.snapshot_sorted();
        assert_eq!(
            snapshot,
            vec![
                ("b".to_string(), 5),
                ("c".to_string(), 5),
                ("a".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let mut tally = Tally::new();
        tally.increment("x");
        let snapshot = tally.snapshot_sorted();
        tally.increment("x");

        assert_eq!(snapshot, vec![("x".to_string(), 1)]);
        assert_eq!(tally.get("x"), 2);
    }
}
