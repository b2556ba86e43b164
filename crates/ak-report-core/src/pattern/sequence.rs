//! Ordered tag chains along reply paths.
//!
//! A pattern `[t0, t1, .., tk]` is realized from a start message `m0` when
//! there is a parent → reply path `m0 → m1 → .. → mk` whose i-th message
//! carries `ti`. With skipping enabled, a message that does not carry the
//! tag expected next but carries a negative tag is passed through without
//! consuming a pattern element.
//!
//! Every message of a thread is tried as a start, and each start that
//! realizes the pattern contributes one match. The search keeps an
//! explicit stack of `(message, pattern position)` frames, so neither the
//! thread depth nor the pattern length touches the native call stack.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::dataset::Dataset;
use crate::error::AnalysisError;
use crate::models::{Message, MessageId, Tag};
use crate::tags::TagSet;
use crate::thread::ThreadTree;
use crate::walk::MessageVisitor;

use super::{rank_by_count, validate_pattern, PatternRow};

/// One realization of a pattern: the root of its thread and the message
/// chain from the start message to the message carrying the last tag.
/// Messages passed through by the skip rule are part of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceMatch {
    pub root: MessageId,
    pub path: Vec<MessageId>,
}

/// Matching rules, independent of any dataset.
#[derive(Debug, Clone)]
pub struct SequenceMatcher {
    patterns: Vec<Vec<String>>,
    negative: TagSet,
    skip_negative: bool,
}

#[derive(Clone, Copy)]
struct Frame {
    id: MessageId,
    position: usize,
    parent: Option<usize>,
}

impl SequenceMatcher {
    /// Build a matcher; every pattern must be non-empty and free of repeats.
    pub fn new(
        patterns: Vec<Vec<String>>,
        negative: TagSet,
        skip_negative: bool,
    ) -> Result<Self, AnalysisError> {
        let patterns = patterns
            .iter()
            .map(|p| validate_pattern(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            negative,
            skip_negative,
        })
    }

    pub fn patterns(&self) -> &[Vec<String>] {
        &self.patterns
    }

    pub fn skip_negative(&self) -> bool {
        self.skip_negative
    }

    /// The first path realizing `pattern` from `start`, following replies
    /// in reply order.
    pub fn find_path(
        &self,
        tree: &ThreadTree,
        start: MessageId,
        pattern: &[String],
    ) -> Option<Vec<MessageId>> {
        if pattern.is_empty() {
            return Some(Vec::new());
        }
        let mut frames = vec![Frame {
            id: start,
            position: 0,
            parent: None,
        }];
        let mut stack = vec![0usize];
        let mut visited: HashSet<(MessageId, usize)> = HashSet::new();

        while let Some(index) = stack.pop() {
            let Frame { id, position, .. } = frames[index];
            if !visited.insert((id, position)) {
                continue;
            }
            let Some(node) = tree.node(id) else {
                continue;
            };

            let next = if node.tags.contains(&pattern[position]) {
                if position + 1 == pattern.len() {
                    return Some(unwind(&frames, index));
                }
                position + 1
            } else if self.skip_negative && self.negative.matches_any(node.tag_names()) {
                position
            } else {
                continue;
            };

            for reply in node.replies.iter().rev() {
                frames.push(Frame {
                    id: *reply,
                    position: next,
                    parent: Some(index),
                });
                stack.push(frames.len() - 1);
            }
        }
        None
    }

    /// Try every message of `tree` as a start for every pattern.
    ///
    /// Returns `(pattern index, match)` pairs.
    pub fn search_tree(&self, tree: &ThreadTree) -> Vec<(usize, SequenceMatch)> {
        let mut found = Vec::new();
        for (id, node) in tree.iter() {
            for (i, pattern) in self.patterns.iter().enumerate() {
                if !node.tags.contains(&pattern[0]) {
                    continue;
                }
                if let Some(path) = self.find_path(tree, id, pattern) {
                    found.push((
                        i,
                        SequenceMatch {
                            root: tree.root(),
                            path,
                        },
                    ));
                }
            }
        }
        found
    }
}

fn unwind(frames: &[Frame], mut index: usize) -> Vec<MessageId> {
    let mut path = vec![frames[index].id];
    while let Some(parent) = frames[index].parent {
        path.push(frames[parent].id);
        index = parent;
    }
    path.reverse();
    path
}

/// Matches per pattern, in candidate order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceSearchResult {
    pub skip_negative: bool,
    patterns: Vec<Vec<String>>,
    matches: Vec<Vec<SequenceMatch>>,
}

impl SequenceSearchResult {
    pub fn new(patterns: Vec<Vec<String>>, skip_negative: bool) -> Self {
        let matches = vec![Vec::new(); patterns.len()];
        Self {
            skip_negative,
            patterns,
            matches,
        }
    }

    pub fn patterns(&self) -> &[Vec<String>] {
        &self.patterns
    }

    pub fn matches(&self, index: usize) -> &[SequenceMatch] {
        self.matches.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count_of(&self, pattern: &[String]) -> Option<usize> {
        let i = self.patterns.iter().position(|p| p == pattern)?;
        Some(self.matches[i].len())
    }

    pub fn record(&mut self, index: usize, found: SequenceMatch) {
        if let Some(bucket) = self.matches.get_mut(index) {
            bucket.push(found);
        }
    }

    /// Fold a partial result produced over a disjoint set of threads.
    pub fn merge(&mut self, other: SequenceSearchResult) -> Result<(), AnalysisError> {
        if self.patterns != other.patterns || self.skip_negative != other.skip_negative {
            return Err(AnalysisError::InvalidPattern(
                "cannot merge sequence results over different candidates".to_string(),
            ));
        }
        for (mine, theirs) in self.matches.iter_mut().zip(other.matches) {
            mine.extend(theirs);
        }
        Ok(())
    }

    pub fn total_matches(&self) -> usize {
        self.matches.iter().map(Vec::len).sum()
    }

    /// Rows ranked by descending count, ties in candidate order, each with
    /// its supporting message chains.
    pub fn ranked(&self) -> Vec<(PatternRow, &[SequenceMatch])> {
        rank_by_count(
            self.patterns
                .iter()
                .zip(&self.matches)
                .map(|(p, m)| (p.clone(), m.len(), m.as_slice()))
                .collect(),
        )
    }
}

/// Walk visitor feeding thread roots through a [`SequenceMatcher`].
pub struct SequencePatternSearcher<'a, D: ?Sized> {
    dataset: &'a D,
    matcher: SequenceMatcher,
    result: SequenceSearchResult,
}

impl<'a, D: Dataset + ?Sized> SequencePatternSearcher<'a, D> {
    pub fn new(dataset: &'a D, matcher: SequenceMatcher) -> Self {
        let result = SequenceSearchResult::new(matcher.patterns().to_vec(), matcher.skip_negative());
        Self {
            dataset,
            matcher,
            result,
        }
    }

    /// Search one thread and record its matches.
    pub async fn search_thread(&mut self, root: MessageId) -> Result<usize> {
        let tree = ThreadTree::load(self.dataset, root).await?;
        let found = self.matcher.search_tree(&tree);
        let n = found.len();
        for (i, m) in found {
            self.result.record(i, m);
        }
        Ok(n)
    }

    pub fn result(&self) -> &SequenceSearchResult {
        &self.result
    }

    pub fn into_result(self) -> SequenceSearchResult {
        self.result
    }
}

#[async_trait]
impl<'a, D: Dataset + ?Sized> MessageVisitor for SequencePatternSearcher<'a, D> {
    async fn visit(&mut self, message: &Message, _tags: &[Tag]) -> Result<()> {
        self.search_thread(message.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::memory::InMemoryDataset;
    use crate::dataset::MessageFilter;
    use crate::pattern::tag_permutations;
    use crate::walk::walk_messages;
    use chrono::Utc;
    use proptest::prelude::*;

    fn p(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn matcher(patterns: Vec<Vec<String>>, skip: bool) -> SequenceMatcher {
        SequenceMatcher::new(patterns, TagSet::new(["not-ak"]), skip).unwrap()
    }

    /// R {existence} with replies A {process} and B {not-ak}.
    fn small_thread() -> ThreadTree {
        ThreadTree::from_entries(
            1,
            &[
                (1, None, vec!["existence"]),
                (2, Some(1), vec!["process"]),
                (3, Some(1), vec!["not-ak"]),
            ],
        )
    }

    /// R {existence} → B {not-ak} → C {process}.
    fn chain_through_negative() -> ThreadTree {
        ThreadTree::from_entries(
            1,
            &[
                (1, None, vec!["existence"]),
                (2, Some(1), vec!["not-ak"]),
                (3, Some(2), vec!["process"]),
            ],
        )
    }

    #[test]
    fn test_direct_reply_match() {
        let m = matcher(vec![p(&["existence", "process"])], false);
        let found = m.search_tree(&small_thread());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1.path, vec![1, 2]);
        assert_eq!(found[0].1.root, 1);
    }

    #[test]
    fn test_negative_tag_is_matched_like_any_other_tag() {
        let m = matcher(vec![p(&["existence", "not-ak"])], false);
        let found = m.search_tree(&small_thread());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1.path, vec![1, 3]);
    }

    #[test]
    fn test_negative_tag_in_pattern_matches_before_skip_applies() {
        let pattern = vec![p(&["existence", "not-ak"])];
        let found = matcher(pattern.clone(), true).search_tree(&small_thread());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1.path, vec![1, 3]);

        // R {existence} → B {not-ak}: B carries the expected tag itself.
        for skip in [false, true] {
            let found = matcher(pattern.clone(), skip).search_tree(&chain_through_negative());
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].1.path, vec![1, 2]);
        }
    }

    #[test]
    fn test_skip_passes_through_negative_message() {
        let tree = chain_through_negative();
        let pattern = vec![p(&["existence", "process"])];
        assert!(matcher(pattern.clone(), false).search_tree(&tree).is_empty());

        let found = matcher(pattern, true).search_tree(&tree);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1.path, vec![1, 2, 3]);
    }

    #[test]
    fn test_skip_does_not_pass_untagged_message() {
        let tree = ThreadTree::from_entries(
            1,
            &[
                (1, None, vec!["existence"]),
                (2, Some(1), vec![]),
                (3, Some(2), vec!["process"]),
            ],
        );
        assert!(matcher(vec![p(&["existence", "process"])], true)
            .search_tree(&tree)
            .is_empty());
    }

    #[test]
    fn test_every_message_is_a_start() {
        let tree = ThreadTree::from_entries(
            1,
            &[
                (1, None, vec!["process"]),
                (2, Some(1), vec!["existence"]),
                (3, Some(2), vec!["process"]),
                (4, Some(3), vec!["existence"]),
            ],
        );
        let found = matcher(vec![p(&["process", "existence"])], false).search_tree(&tree);
        let paths: Vec<_> = found.into_iter().map(|(_, m)| m.path).collect();
        assert_eq!(paths, vec![vec![1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_first_path_follows_reply_order() {
        let tree = ThreadTree::from_entries(
            1,
            &[
                (1, None, vec!["existence"]),
                (2, Some(1), vec!["process"]),
                (3, Some(1), vec!["process"]),
            ],
        );
        let found = matcher(vec![p(&["existence", "process"])], false).search_tree(&tree);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1.path, vec![1, 2]);
    }

    #[test]
    fn test_rejects_repeated_tag() {
        let err = SequenceMatcher::new(vec![p(&["a", "a"])], TagSet::default(), false).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidPattern(_)));
    }

    #[test]
    fn test_deep_chain_without_recursion() {
        let mut entries: Vec<(MessageId, Option<MessageId>, Vec<&str>)> = (0..20_000)
            .map(|i| {
                let parent = if i == 0 { None } else { Some(i - 1) };
                let tags = if i == 19_999 { vec!["process"] } else { vec!["not-ak"] };
                (i, parent, tags)
            })
            .collect();
        entries[0].2 = vec!["existence"];
        let tree = ThreadTree::from_entries(0, &entries);
        let found = matcher(vec![p(&["existence", "process"])], true).search_tree(&tree);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1.path.len(), 20_000);
    }

    #[test]
    fn test_merge_and_rank() {
        let patterns = vec![p(&["existence", "process"]), p(&["process", "existence"])];
        let mut a = SequenceSearchResult::new(patterns.clone(), false);
        let mut b = SequenceSearchResult::new(patterns.clone(), false);
        a.record(1, SequenceMatch { root: 1, path: vec![1, 2] });
        b.record(1, SequenceMatch { root: 5, path: vec![5, 6] });
        a.merge(b).unwrap();
        let ranked = a.ranked();
        assert_eq!(ranked[0].0.pattern, p(&["process", "existence"]));
        assert_eq!(ranked[0].0.count, 2);
        assert_eq!(ranked[1].0.count, 0);

        let other = SequenceSearchResult::new(patterns, true);
        assert!(a.merge(other).is_err());
    }

    fn msg(id: MessageId, parent_id: Option<MessageId>) -> Message {
        Message {
            id,
            parent_id,
            message_id: format!("<{}@example>", id),
            subject: String::new(),
            sent_from: String::new(),
            date: Utc::now(),
            body: String::new(),
            hidden: false,
        }
    }

    #[tokio::test]
    async fn test_searcher_walks_tagged_threads() {
        let ds = InMemoryDataset::new();
        ds.insert_message(msg(1, None), &["existence"]).unwrap();
        ds.insert_message(msg(2, Some(1)), &["process"]).unwrap();
        ds.insert_message(msg(3, Some(1)), &["not-ak"]).unwrap();
        ds.insert_message(msg(10, None), &["process"]).unwrap();

        let patterns = tag_permutations(2, &p(&["existence", "process"]));
        let mut searcher = SequencePatternSearcher::new(&ds, matcher(patterns, false));
        walk_messages(&ds, &MessageFilter::tagged_threads(), 100, &mut searcher)
            .await
            .unwrap();
        let result = searcher.into_result();
        assert_eq!(result.count_of(&p(&["existence", "process"])), Some(1));
        assert_eq!(result.count_of(&p(&["process", "existence"])), Some(0));
    }

    proptest! {
        #[test]
        fn prop_single_tag_pattern_counts_tag_presence(
            tags in proptest::collection::vec(0usize..3, 1..40)
        ) {
            let names = ["process", "existence", "not-ak"];
            let entries: Vec<(MessageId, Option<MessageId>, Vec<&str>)> = tags
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    let parent = if i == 0 { None } else { Some((i / 3) as MessageId) };
                    (i as MessageId, parent, vec![names[*t]])
                })
                .collect();
            let tree = ThreadTree::from_entries(0, &entries);
            let direct = tree.iter().filter(|(_, n)| n.has_tag("process")).count();
            for skip in [false, true] {
                let found = matcher(vec![p(&["process"])], skip).search_tree(&tree);
                prop_assert_eq!(found.len(), direct);
            }
        }
    }
}
