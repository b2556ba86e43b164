//! Tag vocabularies and AK status classification.
//!
//! A message is classified against a *positive* tag set (labels that mark
//! architectural knowledge) and a *negative* tag set (labels that mark a
//! message as explicitly non-architectural). Positive evidence always wins:
//!
//! | Message carries | Status |
//! |-----------------|--------|
//! | any positive tag | [`TagStatus::Architectural`] |
//! | no positive, any negative tag | [`TagStatus::NotArchitectural`] |
//! | neither | [`TagStatus::Unknown`] |
//!
//! All comparisons are case-insensitive; names are stored lowercased.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::Tag;

/// Default labels that mark architectural knowledge.
pub const DEFAULT_POSITIVE_TAGS: [&str; 6] = [
    "technology",
    "process",
    "existence",
    "existence-structural",
    "existence-behavioral",
    "property",
];

/// Default labels that mark a message as not architectural.
pub const DEFAULT_NEGATIVE_TAGS: [&str; 1] = ["not-ak"];

/// Lowercase a tag name for comparison.
pub fn normalize_tag(name: &str) -> String {
    name.trim().to_lowercase()
}

/// An ordered, case-insensitive set of tag names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct TagSet {
    names: BTreeSet<String>,
}

impl TagSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| normalize_tag(n.as_ref()))
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn single(name: &str) -> Self {
        Self::new([name])
    }

    pub fn default_positive() -> Self {
        Self::new(DEFAULT_POSITIVE_TAGS)
    }

    pub fn default_negative() -> Self {
        Self::new(DEFAULT_NEGATIVE_TAGS)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&normalize_tag(name))
    }

    /// True if any of the given tag names is in this set.
    pub fn matches_any<'a, I>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().any(|n| self.contains(n))
    }

    /// Number of the given tag names that are in this set.
    pub fn count_in<'a, I>(&self, names: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().filter(|n| self.contains(n)).count()
    }

    pub fn is_disjoint(&self, other: &TagSet) -> bool {
        self.names.is_disjoint(&other.names)
    }

    pub fn union(&self, other: &TagSet) -> TagSet {
        TagSet {
            names: self.names.union(&other.names).cloned().collect(),
        }
    }

    /// Names in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl From<Vec<String>> for TagSet {
    fn from(v: Vec<String>) -> Self {
        TagSet::new(v)
    }
}

impl From<TagSet> for Vec<String> {
    fn from(s: TagSet) -> Self {
        s.to_vec()
    }
}

/// AK classification of a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagStatus {
    Architectural,
    NotArchitectural,
    Unknown,
}

/// Classify a message's tag names against a positive and a negative set.
pub fn classify<'a, I>(tag_names: I, positive: &TagSet, negative: &TagSet) -> TagStatus
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    if positive.matches_any(tag_names.clone()) {
        TagStatus::Architectural
    } else if negative.matches_any(tag_names) {
        TagStatus::NotArchitectural
    } else {
        TagStatus::Unknown
    }
}

/// A fixed positive/negative pair, applied to many messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagClassifier {
    positive: TagSet,
    negative: TagSet,
}

impl TagClassifier {
    pub fn new(positive: TagSet, negative: TagSet) -> Self {
        Self { positive, negative }
    }

    /// Same negative set, positive set narrowed to one tag.
    pub fn for_single_tag(&self, tag: &str) -> Self {
        Self {
            positive: TagSet::single(tag),
            negative: self.negative.clone(),
        }
    }

    pub fn positive(&self) -> &TagSet {
        &self.positive
    }

    pub fn negative(&self) -> &TagSet {
        &self.negative
    }

    pub fn classify_tags(&self, tags: &[Tag]) -> TagStatus {
        self.classify_names(tags.iter().map(|t| t.name.as_str()))
    }

    pub fn classify_names<'a, I>(&self, names: I) -> TagStatus
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        classify(names, &self.positive, &self.negative)
    }
}

impl Default for TagClassifier {
    fn default() -> Self {
        Self::new(TagSet::default_positive(), TagSet::default_negative())
    }
}
