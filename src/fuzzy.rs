//! Approximate key matching for completion candidates.
//!
//! A candidate's distance is the fewest edits that turn the query into some
//! substring of its key, divided by the query length. Matching ignores case.

use crate::model::RecordRef;

/// Largest normalized distance still counted as a match (lower is stricter).
pub const DEFAULT_THRESHOLD: f64 = 0.2;

/// Anything searchable by key.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for RecordRef<'_> {
    fn key(&self) -> &str {
        RecordRef::key(self)
    }
}

impl Keyed for &str {
    fn key(&self) -> &str {
        self
    }
}

/// A hit: position in the candidate slice plus its distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub index: usize,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct Fuzzy {
    threshold: f64,
}

impl Default for Fuzzy {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl Fuzzy {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    /// Matches best-first; ties go to exact (case-sensitive) key matches, then
    /// candidate order.
    pub fn search<T: Keyed>(&self, candidates: &[T], query: &str) -> Vec<Match> {
        let needle = query.to_lowercase();
        if needle.is_empty() || candidates.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<(Match, bool)> = candidates
            .iter()
            .enumerate()
            .filter_map(|(index, candidate)| {
                let key = candidate.key();
                let edits = substring_distance(needle.as_bytes(), key.to_lowercase().as_bytes());
                let distance = edits as f64 / needle.len() as f64;
                (distance <= self.threshold).then(|| (Match { index, distance }, key == query))
            })
            .collect();

        hits.sort_by(|(a, a_exact), (b, b_exact)| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| b_exact.cmp(a_exact))
                .then_with(|| a.index.cmp(&b.index))
        });

        hits.into_iter().map(|(hit, _)| hit).collect()
    }
}

/// Fewest insertions, deletions, or substitutions turning `pattern` into a
/// substring of `text`.
fn substring_distance(pattern: &[u8], text: &[u8]) -> usize {
    triple_accel::levenshtein_search(pattern, text)
        .map(|m| m.k as usize)
        .min()
        .unwrap_or(pattern.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys<'a>(candidates: &[&'a str], matches: &[Match]) -> Vec<&'a str> {
        matches.iter().map(|m| candidates[m.index]).collect()
    }

    #[test]
    fn substring_distance_basics() {
        assert_eq!(substring_distance(b"grow", b"growth_feature_a"), 0);
        assert_eq!(substring_distance(b"feature", b"growth_feature_a"), 0);
        assert_eq!(substring_distance(b"featxre", b"growth_feature_a"), 1);
        assert_eq!(substring_distance(b"abc", b""), 3);
        assert_eq!(substring_distance(b"abcd", b"xyz"), 4);
    }

    #[test]
    fn prefix_and_substring_matches() {
        let candidates = ["growth_feature_a", "growth_feature_b", "search_ranking"];
        let matches = Fuzzy::default().search(&candidates, "grow");
        assert_eq!(
            keys(&candidates, &matches),
            vec!["growth_feature_a", "growth_feature_b"]
        );
        assert!(matches.iter().all(|m| m.distance == 0.0));
    }

    #[test]
    fn tolerates_small_typos() {
        let candidates = ["growth_feature_a", "search_ranking"];
        let matches = Fuzzy::default().search(&candidates, "growht_feature");
        assert_eq!(keys(&candidates, &matches), vec!["growth_feature_a"]);
        assert!(matches[0].distance > 0.0);
        assert!(matches[0].distance <= DEFAULT_THRESHOLD);
    }

    #[test]
    fn respects_threshold() {
        let candidates = ["abcdef"];
        // one edit in five characters = 0.2, still inside
        assert_eq!(Fuzzy::default().search(&candidates, "abxde").len(), 1);
        // two edits in five characters = 0.4
        assert!(Fuzzy::default().search(&candidates, "axxde").is_empty());
        // a looser threshold admits it
        assert_eq!(Fuzzy::new(0.4).search(&candidates, "axxde").len(), 1);
    }

    #[test]
    fn exact_match_ranks_first() {
        let candidates = ["growth_feature_a_v2", "growth_feature_a", "my_growth_feature_a"];
        let matches = Fuzzy::default().search(&candidates, "growth_feature_a");
        assert_eq!(matches.len(), 3);
        assert_eq!(candidates[matches[0].index], "growth_feature_a");
        // remaining ties keep candidate order
        assert_eq!(
            keys(&candidates, &matches[1..]),
            vec!["growth_feature_a_v2", "my_growth_feature_a"]
        );
    }

    #[test]
    fn exact_match_respects_case() {
        let candidates = ["abc", "ABC"];
        let matches = Fuzzy::default().search(&candidates, "ABC");
        assert_eq!(keys(&candidates, &matches), vec!["ABC", "abc"]);

        let matches = Fuzzy::default().search(&candidates, "abc");
        assert_eq!(keys(&candidates, &matches), vec!["abc", "ABC"]);
    }

    #[test]
    fn better_distance_ranks_higher() {
        let candidates = ["search_rankxng", "search_ranking"];
        let matches = Fuzzy::default().search(&candidates, "search_ranking");
        assert_eq!(
            keys(&candidates, &matches),
            vec!["search_ranking", "search_rankxng"]
        );
    }

    #[test]
    fn case_insensitive() {
        let candidates = ["Growth_Feature"];
        assert_eq!(Fuzzy::default().search(&candidates, "growth").len(), 1);
    }

    #[test]
    fn empty_inputs() {
        let candidates = ["a"];
        assert!(Fuzzy::default().search(&candidates, "").is_empty());
        let none: [&str; 0] = [];
        assert!(Fuzzy::default().search(&none, "a").is_empty());
    }

    #[test]
    fn idempotent() {
        let candidates = ["exp_alpha", "exp_alpah", "exp_beta", "alpha"];
        let fuzzy = Fuzzy::default();
        assert_eq!(
            fuzzy.search(&candidates, "exp_alpha"),
            fuzzy.search(&candidates, "exp_alpha")
        );
    }
}
