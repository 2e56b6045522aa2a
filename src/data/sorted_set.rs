//! Sorted set: a member→score map for O(1) lookups paired with an ordered
//! `(score, member)` sequence kept sorted via binary search, giving
//! O(log n) insert position lookup and O(k) rank-based range reads without
//! a skip list. Score-range queries (`count_in_range`, `range_by_score`)
//! scan the ordered view linearly, O(n).

use super::SDS;
use ahash::AHashMap;
use std::cmp::Ordering;

#[derive(Clone, Debug)]
struct Node {
    member: String,
    score: f64,
}

fn cmp_node(score: f64, member: &str, other_score: f64, other_member: &str) -> Ordering {
    score
        .partial_cmp(&other_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| member.cmp(other_member))
}

#[derive(Clone, Debug)]
pub struct RedisSortedSet {
    /// O(1) score lookup by member.
    members: AHashMap<String, f64>,
    /// Ordered by (score, member), maintained via binary search on every mutation.
    ordered: Vec<Node>,
}

impl RedisSortedSet {
    pub fn new() -> Self {
        RedisSortedSet {
            members: AHashMap::new(),
            ordered: Vec::new(),
        }
    }

    #[cfg(debug_assertions)]
    fn verify_invariants(&self) {
        debug_assert_eq!(
            self.members.len(),
            self.ordered.len(),
            "Invariant violated: members.len() ({}) != ordered.len() ({})",
            self.members.len(),
            self.ordered.len()
        );
        debug_assert!(
            self.ordered
                .windows(2)
                .all(|w| cmp_node(w[0].score, &w[0].member, w[1].score, &w[1].member) == Ordering::Less),
            "Invariant violated: ordered view must be strictly increasing by (score, member)"
        );
        for node in &self.ordered {
            debug_assert_eq!(
                self.members.get(&node.member),
                Some(&node.score),
                "Invariant violated: ordered entry for '{}' disagrees with members map",
                node.member
            );
        }
    }

    #[cfg(not(debug_assertions))]
    #[inline(always)]
    fn verify_invariants(&self) {}

    /// Position where `(score, member)` belongs, via binary search.
    fn search(&self, score: f64, member: &str) -> Result<usize, usize> {
        self.ordered
            .binary_search_by(|node| cmp_node(node.score, &node.member, score, member))
    }

    /// Add member with score. Returns true if newly inserted, false if an
    /// existing member's score was updated (or left unchanged).
    pub fn add(&mut self, member: SDS, score: f64) -> bool {
        let key = member.to_string();

        if let Some(&old_score) = self.members.get(&key) {
            if old_score == score {
                return false;
            }
            let old_pos = self
                .search(old_score, &key)
                .expect("Invariant violated: member present in map but not in ordered view");
            self.ordered.remove(old_pos);

            let new_pos = self.search(score, &key).unwrap_or_else(|i| i);
            self.ordered.insert(
                new_pos,
                Node {
                    member: key.clone(),
                    score,
                },
            );
            self.members.insert(key, score);

            self.verify_invariants();
            false
        } else {
            let pos = self.search(score, &key).unwrap_or_else(|i| i);
            self.ordered.insert(
                pos,
                Node {
                    member: key.clone(),
                    score,
                },
            );
            self.members.insert(key, score);

            self.verify_invariants();
            true
        }
    }

    /// Remove member. Returns true if it was present.
    pub fn remove(&mut self, member: &SDS) -> bool {
        let key = member.to_string();
        let Some(score) = self.members.remove(&key) else {
            return false;
        };
        let pos = self
            .search(score, &key)
            .expect("Invariant violated: member present in map but not in ordered view");
        self.ordered.remove(pos);

        self.verify_invariants();
        true
    }

    pub fn score(&self, member: &SDS) -> Option<f64> {
        self.members.get(&member.to_string()).copied()
    }

    /// Rank of member (0-indexed, ascending by score then member). O(log n).
    pub fn rank(&self, member: &SDS) -> Option<usize> {
        let key = member.to_string();
        let score = *self.members.get(&key)?;
        self.search(score, &key).ok()
    }

    fn normalize_range(&self, start: isize, stop: isize) -> Option<(usize, usize)> {
        let len = self.ordered.len() as isize;
        if len == 0 {
            return None;
        }

        let start = if start < 0 { (len + start).max(0) } else { start.min(len) };
        let stop = if stop < 0 { (len + stop).max(-1) } else { stop.min(len - 1) };

        if start > stop || start >= len {
            return None;
        }
        Some((start as usize, stop as usize))
    }

    /// Range by rank [start, stop] inclusive, ascending. O(k).
    pub fn range(&self, start: isize, stop: isize) -> Vec<(SDS, f64)> {
        match self.normalize_range(start, stop) {
            None => Vec::new(),
            Some((start, stop)) => self.ordered[start..=stop]
                .iter()
                .map(|n| (SDS::from_str(&n.member), n.score))
                .collect(),
        }
    }

    /// Range by rank, descending. O(k).
    pub fn rev_range(&self, start: isize, stop: isize) -> Vec<(SDS, f64)> {
        match self.normalize_range(start, stop) {
            None => Vec::new(),
            Some((start, stop)) => self.ordered[start..=stop]
                .iter()
                .rev()
                .map(|n| (SDS::from_str(&n.member), n.score))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.ordered
            .windows(2)
            .all(|w| cmp_node(w[0].score, &w[0].member, w[1].score, &w[1].member) == Ordering::Less)
    }

    /// Parse a ZRANGEBYSCORE-style bound: `-inf`, `+inf`/`inf`, or a float
    /// optionally prefixed with `(` for exclusivity.
    pub fn parse_score_bound(s: &str) -> Result<(f64, bool), String> {
        let s = s.trim();
        if s == "-inf" {
            return Ok((f64::NEG_INFINITY, false));
        }
        if s == "+inf" || s == "inf" {
            return Ok((f64::INFINITY, false));
        }

        let (exclusive, num_str) = if let Some(rest) = s.strip_prefix('(') {
            (true, rest)
        } else {
            (false, s)
        };

        let score = num_str
            .parse::<f64>()
            .map_err(|_| "ERR min or max is not a float".to_string())?;

        Ok((score, exclusive))
    }

    fn score_in_range(score: f64, min_score: f64, min_exclusive: bool, max_score: f64, max_exclusive: bool) -> bool {
        let above_min = if min_exclusive { score > min_score } else { score >= min_score };
        let below_max = if max_exclusive { score < max_score } else { score <= max_score };
        above_min && below_max
    }

    /// ZCOUNT. Linear scan over the ordered view, O(n).
    pub fn count_in_range(&self, min: &str, max: &str) -> Result<usize, String> {
        let (min_score, min_exclusive) = Self::parse_score_bound(min)?;
        let (max_score, max_exclusive) = Self::parse_score_bound(max)?;

        Ok(self
            .ordered
            .iter()
            .filter(|n| Self::score_in_range(n.score, min_score, min_exclusive, max_score, max_exclusive))
            .count())
    }

    /// ZRANGEBYSCORE.
    pub fn range_by_score(
        &self,
        min: &str,
        max: &str,
        with_scores: bool,
        limit: Option<(isize, usize)>,
    ) -> Result<Vec<(String, Option<f64>)>, String> {
        let (min_score, min_exclusive) = Self::parse_score_bound(min)?;
        let (max_score, max_exclusive) = Self::parse_score_bound(max)?;

        let mut results: Vec<_> = self
            .ordered
            .iter()
            .filter(|n| Self::score_in_range(n.score, min_score, min_exclusive, max_score, max_exclusive))
            .map(|n| (n.member.clone(), if with_scores { Some(n.score) } else { None }))
            .collect();

        if let Some((offset, count)) = limit {
            let start = offset.max(0) as usize;
            results = results.into_iter().skip(start).take(count).collect();
        }

        Ok(results)
    }

    /// Iterate over member-score pairs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.ordered.iter().map(|n| (n.member.as_str(), n.score))
    }
}

impl Default for RedisSortedSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for RedisSortedSet {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_set() -> RedisSortedSet {
        let mut zset = RedisSortedSet::new();
        zset.add(SDS::from_str("alice"), 100.0);
        zset.add(SDS::from_str("bob"), 200.0);
        zset.add(SDS::from_str("charlie"), 150.0);
        zset.add(SDS::from_str("dave"), 50.0);
        zset
    }

    #[test]
    fn test_sorted_set_ordering() {
        let zset = create_test_set();
        let range = zset.range(0, -1);
        assert_eq!(range.len(), 4);
        assert_eq!(range[0].0.to_string(), "dave");
        assert_eq!(range[0].1, 50.0);
        assert_eq!(range[1].0.to_string(), "alice");
        assert_eq!(range[2].0.to_string(), "charlie");
        assert_eq!(range[3].0.to_string(), "bob");
    }

    #[test]
    fn test_rev_range_full() {
        let zset = create_test_set();
        let range = zset.rev_range(0, -1);
        assert_eq!(range[0].0.to_string(), "bob");
        assert_eq!(range[3].0.to_string(), "dave");
    }

    #[test]
    fn test_rev_range_subset() {
        let zset = create_test_set();
        let range = zset.rev_range(0, 1);
        assert_eq!(range.len(), 2);
        assert_eq!(range[0].0.to_string(), "bob");
        assert_eq!(range[1].0.to_string(), "charlie");
    }

    #[test]
    fn test_rev_range_negative_indices() {
        let zset = create_test_set();
        let range = zset.rev_range(-2, -1);
        assert_eq!(range.len(), 2);
        assert_eq!(range[0].0.to_string(), "alice");
        assert_eq!(range[1].0.to_string(), "dave");
    }

    #[test]
    fn test_rev_range_empty_set() {
        let zset = RedisSortedSet::new();
        assert!(zset.rev_range(0, -1).is_empty());
    }

    #[test]
    fn test_rev_range_out_of_bounds() {
        let zset = create_test_set();
        assert!(zset.rev_range(10, 20).is_empty());
        assert!(zset.rev_range(3, 1).is_empty());
    }

    #[test]
    fn test_sorted_set_with_equal_scores() {
        let mut zset = RedisSortedSet::new();
        zset.add(SDS::from_str("zebra"), 100.0);
        zset.add(SDS::from_str("apple"), 100.0);
        zset.add(SDS::from_str("mango"), 100.0);

        let range = zset.range(0, -1);
        assert_eq!(range[0].0.to_string(), "apple");
        assert_eq!(range[1].0.to_string(), "mango");
        assert_eq!(range[2].0.to_string(), "zebra");
    }

    #[test]
    fn test_update_score_preserves_single_membership() {
        let mut zset = RedisSortedSet::new();
        zset.add(SDS::from_str("a"), 1.0);
        assert!(zset.is_sorted());

        let inserted = zset.add(SDS::from_str("a"), 5.0);
        assert!(!inserted);
        assert_eq!(zset.len(), 1);
        assert_eq!(zset.score(&SDS::from_str("a")), Some(5.0));
        assert!(zset.is_sorted());
    }

    #[test]
    fn test_rank_matches_range_position() {
        let zset = create_test_set();
        assert_eq!(zset.rank(&SDS::from_str("dave")), Some(0));
        assert_eq!(zset.rank(&SDS::from_str("bob")), Some(3));
        assert_eq!(zset.rank(&SDS::from_str("missing")), None);
    }

    #[test]
    fn test_count_in_range_respects_exclusivity() {
        let zset = create_test_set();
        assert_eq!(zset.count_in_range("-inf", "+inf").unwrap(), 4);
        assert_eq!(zset.count_in_range("(50", "150").unwrap(), 2);
        assert_eq!(zset.count_in_range("50", "150").unwrap(), 3);
    }

    #[test]
    fn test_range_by_score_with_limit() {
        let zset = create_test_set();
        let r = zset.range_by_score("-inf", "+inf", true, Some((1, 2))).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r[0].0, "alice");
        assert_eq!(r[1].0, "charlie");
    }
}
