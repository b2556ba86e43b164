//! Unordered tag sets on single messages.

use std::collections::BTreeSet;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::error::AnalysisError;
use crate::models::{Message, MessageId, Tag};
use crate::tags::normalize_tag;
use crate::walk::MessageVisitor;

use super::{rank_by_count, validate_pattern, PatternRow};

/// Counts, per candidate tag set, the messages carrying every tag of it.
///
/// Candidates are stored as sets, so `["a", "b"]` and `["b", "a"]` describe
/// the same pattern and match the same messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoOccurrencePatternSearcher {
    patterns: Vec<BTreeSet<String>>,
    matches: Vec<Vec<MessageId>>,
}

impl CoOccurrencePatternSearcher {
    pub fn new(patterns: Vec<Vec<String>>) -> Result<Self, AnalysisError> {
        let patterns: Vec<BTreeSet<String>> = patterns
            .iter()
            .map(|p| validate_pattern(p).map(|v| v.into_iter().collect()))
            .collect::<Result<_, _>>()?;
        let matches = vec![Vec::new(); patterns.len()];
        Ok(Self { patterns, matches })
    }

    /// Record `id` against every candidate contained in `tag_names`.
    pub fn record<'a, I>(&mut self, id: MessageId, tag_names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: BTreeSet<String> = tag_names.into_iter().map(normalize_tag).collect();
        for (pattern, bucket) in self.patterns.iter().zip(self.matches.iter_mut()) {
            if pattern.is_subset(&names) {
                bucket.push(id);
            }
        }
    }

    pub fn patterns(&self) -> &[BTreeSet<String>] {
        &self.patterns
    }

    /// Message ids matching the candidate equal to `pattern` as a set.
    pub fn matches_of(&self, pattern: &[&str]) -> Option<&[MessageId]> {
        let key: BTreeSet<String> = pattern.iter().map(|t| normalize_tag(t)).collect();
        let i = self.patterns.iter().position(|p| *p == key)?;
        Some(&self.matches[i])
    }

    /// Fold a partial result produced over a disjoint set of messages.
    pub fn merge(&mut self, other: CoOccurrencePatternSearcher) -> Result<(), AnalysisError> {
        if self.patterns != other.patterns {
            return Err(AnalysisError::InvalidPattern(
                "cannot merge co-occurrence results over different candidates".to_string(),
            ));
        }
        for (mine, theirs) in self.matches.iter_mut().zip(other.matches) {
            mine.extend(theirs);
        }
        Ok(())
    }

    pub fn ranked(&self) -> Vec<(PatternRow, &[MessageId])> {
        rank_by_count(
            self.patterns
                .iter()
                .zip(&self.matches)
                .map(|(p, m)| (p.iter().cloned().collect(), m.len(), m.as_slice()))
                .collect(),
        )
    }
}

#[async_trait]
impl MessageVisitor for CoOccurrencePatternSearcher {
    async fn visit(&mut self, message: &Message, tags: &[Tag]) -> Result<()> {
        self.record(message.id, tags.iter().map(|t| t.name.as_str()));
        Ok(())
    }
}
