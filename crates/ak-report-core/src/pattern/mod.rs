//! Tag-pattern mining.
//!
//! Two searchers share the same dataset walk but answer different
//! questions:
//!
//! - [`sequence::SequencePatternSearcher`] counts ordered tag chains
//!   realized along parent → reply paths of a thread.
//! - [`cooccurrence::CoOccurrencePatternSearcher`] counts unordered tag
//!   sets that all appear on a single message.
//!
//! Candidate patterns come from [`tag_permutations`] and
//! [`tag_combinations`]. Results are ranked by descending count with ties
//! kept in candidate-generation order.

pub mod cooccurrence;
pub mod sequence;

use serde::Serialize;

use crate::error::AnalysisError;
use crate::tags::normalize_tag;

/// Every ordered sequence of `size` distinct tags from `tags`.
///
/// Each `(size - 1)`-permutation is extended with every tag it does not
/// already contain, so the output order follows `tags`. Returns nothing for
/// `size == 0` or when `size` exceeds the number of distinct tags.
pub fn tag_permutations(size: usize, tags: &[String]) -> Vec<Vec<String>> {
    let tags = distinct(tags);
    if size == 0 || size > tags.len() {
        return Vec::new();
    }
    let mut permutations: Vec<Vec<String>> = tags.iter().map(|t| vec![t.clone()]).collect();
    for _ in 1..size {
        let mut extended = Vec::with_capacity(permutations.len() * tags.len());
        for permutation in &permutations {
            for tag in &tags {
                if permutation.contains(tag) {
                    continue;
                }
                let mut next = permutation.clone();
                next.push(tag.clone());
                extended.push(next);
            }
        }
        permutations = extended;
    }
    permutations
}

/// Every unordered set of `size` distinct tags from `tags`, each emitted
/// once in lexicographic index order.
pub fn tag_combinations(size: usize, tags: &[String]) -> Vec<Vec<String>> {
    let tags = distinct(tags);
    if size == 0 || size > tags.len() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut indices: Vec<usize> = (0..size).collect();
    loop {
        out.push(indices.iter().map(|i| tags[*i].clone()).collect());
        // Advance the rightmost index that still has room.
        let mut i = size;
        loop {
            if i == 0 {
                return out;
            }
            i -= 1;
            if indices[i] < tags.len() - size + i {
                break;
            }
        }
        indices[i] += 1;
        for j in i + 1..size {
            indices[j] = indices[j - 1] + 1;
        }
    }
}

fn distinct(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = normalize_tag(tag);
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Normalize a candidate pattern, rejecting empty patterns and repeats.
pub fn validate_pattern(pattern: &[String]) -> Result<Vec<String>, AnalysisError> {
    if pattern.is_empty() {
        return Err(AnalysisError::InvalidPattern("pattern is empty".to_string()));
    }
    let mut out: Vec<String> = Vec::with_capacity(pattern.len());
    for tag in pattern {
        let tag = normalize_tag(tag);
        if tag.is_empty() {
            return Err(AnalysisError::InvalidPattern("pattern contains a blank tag".to_string()));
        }
        if out.contains(&tag) {
            return Err(AnalysisError::InvalidPattern(format!(
                "tag {} appears more than once",
                tag
            )));
        }
        out.push(tag);
    }
    Ok(out)
}

/// One ranked line of a pattern report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternRow {
    pub rank: usize,
    pub pattern: Vec<String>,
    pub count: usize,
}

impl PatternRow {
    /// Pattern rendered as `[a, b, c]`.
    pub fn pattern_label(&self) -> String {
        format!("[{}]", self.pattern.join(", "))
    }
}

/// Assign ranks by descending count. The sort is stable, so equal counts
/// keep the order of `entries`.
pub(crate) fn rank_by_count<T>(mut entries: Vec<(Vec<String>, usize, T)>) -> Vec<(PatternRow, T)> {
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries
        .into_iter()
        .enumerate()
        .map(|(i, (pattern, count, extra))| {
            (
                PatternRow {
                    rank: i + 1,
                    pattern,
                    count,
                },
                extra,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_permutations_follow_input_order() {
        let p = tag_permutations(2, &tags(&["a", "b", "c"]));
        assert_eq!(
            p,
            vec![
                tags(&["a", "b"]),
                tags(&["a", "c"]),
                tags(&["b", "a"]),
                tags(&["b", "c"]),
                tags(&["c", "a"]),
                tags(&["c", "b"]),
            ]
        );
        assert_eq!(tag_permutations(3, &tags(&["a", "b", "c", "d"])).len(), 24);
    }

    #[test]
    fn test_permutations_edge_sizes() {
        assert!(tag_permutations(0, &tags(&["a"])).is_empty());
        assert!(tag_permutations(3, &tags(&["a", "b"])).is_empty());
        assert_eq!(tag_permutations(1, &tags(&["A", "a", "b"])), vec![tags(&["a"]), tags(&["b"])]);
    }

    #[test]
    fn test_combinations() {
        let c = tag_combinations(2, &tags(&["a", "b", "c"]));
        assert_eq!(c, vec![tags(&["a", "b"]), tags(&["a", "c"]), tags(&["b", "c"])]);
        assert_eq!(tag_combinations(3, &tags(&["a", "b", "c", "d", "e", "f"])).len(), 20);
        assert_eq!(tag_combinations(2, &tags(&["a", "b"])), vec![tags(&["a", "b"])]);
    }

    #[test]
    fn test_validate_pattern() {
        assert_eq!(validate_pattern(&tags(&["A", "b"])).unwrap(), tags(&["a", "b"]));
        assert!(validate_pattern(&[]).is_err());
        assert!(validate_pattern(&tags(&["a", "A"])).is_err());
    }

    #[test]
    fn test_rank_by_count_is_stable() {
        let ranked = rank_by_count(vec![
            (tags(&["x"]), 1, ()),
            (tags(&["y"]), 3, ()),
            (tags(&["z"]), 1, ()),
        ]);
        let order: Vec<_> = ranked.iter().map(|(r, _)| r.pattern_label()).collect();
        assert_eq!(order, vec!["[y]", "[x]", "[z]"]);
        assert_eq!(ranked[2].0.rank, 3);
    }
}
