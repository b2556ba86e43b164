//! Size characteristics of AK and non-AK content.
//!
//! Four characteristics are collected, each split into an architectural
//! and a non-architectural sample, once for the whole positive vocabulary
//! and once per positive tag:
//!
//! | Characteristic | Population | Value |
//! |----------------|------------|-------|
//! | `body_size` | tagged messages | body length in characters |
//! | `word_count` | tagged messages | whitespace-separated words in the body |
//! | `thread_size` | tagged threads | messages in the thread |
//! | `participants` | tagged threads | distinct senders in the thread |
//!
//! A message's status comes from its own tags. A thread is architectural
//! if any of its messages is, otherwise non-architectural if any message
//! is. Unknown messages and threads are left out of both samples.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::dataset::{Dataset, MessageFilter};
use crate::models::{Message, Tag};
use crate::tags::{classify, TagClassifier, TagSet, TagStatus};
use crate::thread::ThreadTree;
use crate::walk::{walk_messages, MessageVisitor};

/// Five-number summary plus mean and sample size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoxStats {
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub mean: f64,
}

impl BoxStats {
    /// `None` for an empty sample. Quartiles interpolate linearly between
    /// the closest ranks.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let count = sorted.len();
        Some(Self {
            count,
            min: sorted[0],
            q1: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q3: quantile(&sorted, 0.75),
            max: sorted[count - 1],
            mean: sorted.iter().sum::<f64>() / count as f64,
        })
    }
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Architectural and non-architectural samples of one value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SizeData {
    pub ak: Vec<f64>,
    pub not_ak: Vec<f64>,
}

impl SizeData {
    fn record(&mut self, status: TagStatus, value: f64) {
        match status {
            TagStatus::Architectural => self.ak.push(value),
            TagStatus::NotArchitectural => self.not_ak.push(value),
            TagStatus::Unknown => {}
        }
    }

    fn extend(&mut self, other: SizeData) {
        self.ak.extend(other.ak);
        self.not_ak.extend(other.not_ak);
    }
}

/// One characteristic over the whole vocabulary and per positive tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SizeSeries {
    pub any_tag: SizeData,
    pub per_tag: BTreeMap<String, SizeData>,
}

impl SizeSeries {
    pub fn merge(&mut self, other: SizeSeries) {
        self.any_tag.extend(other.any_tag);
        for (tag, data) in other.per_tag {
            self.per_tag.entry(tag).or_default().extend(data);
        }
    }
}

/// One summary line: characteristic, group (`any` or a tag name), status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacteristicRow {
    pub characteristic: &'static str,
    pub group: String,
    pub status: TagStatus,
    pub stats: Option<BoxStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Characteristics {
    pub body_size: SizeSeries,
    pub word_count: SizeSeries,
    pub thread_size: SizeSeries,
    pub participants: SizeSeries,
}

impl Characteristics {
    pub fn merge(&mut self, other: Characteristics) {
        self.body_size.merge(other.body_size);
        self.word_count.merge(other.word_count);
        self.thread_size.merge(other.thread_size);
        self.participants.merge(other.participants);
    }

    /// Box statistics for every characteristic, group and status.
    pub fn summary(&self) -> Vec<CharacteristicRow> {
        let series = [
            ("body_size", &self.body_size),
            ("word_count", &self.word_count),
            ("thread_size", &self.thread_size),
            ("participants", &self.participants),
        ];
        let mut rows = Vec::new();
        for (name, s) in series {
            let groups = std::iter::once(("any".to_string(), &s.any_tag))
                .chain(s.per_tag.iter().map(|(t, d)| (t.clone(), d)));
            for (group, data) in groups {
                for (status, values) in [
                    (TagStatus::Architectural, &data.ak),
                    (TagStatus::NotArchitectural, &data.not_ak),
                ] {
                    rows.push(CharacteristicRow {
                        characteristic: name,
                        group: group.clone(),
                        status,
                        stats: BoxStats::from_values(values),
                    });
                }
            }
        }
        rows
    }
}

pub fn word_count(body: &str) -> usize {
    body.split_whitespace().count()
}

/// Status of a whole thread under `positive` / `negative`.
pub fn thread_status(tree: &ThreadTree, positive: &TagSet, negative: &TagSet) -> TagStatus {
    let mut status = TagStatus::Unknown;
    for (_, node) in tree.iter() {
        match classify(node.tag_names(), positive, negative) {
            TagStatus::Architectural => return TagStatus::Architectural,
            TagStatus::NotArchitectural => status = TagStatus::NotArchitectural,
            TagStatus::Unknown => {}
        }
    }
    status
}

/// Per-tag positive sets, built once per collector.
fn single_tag_sets(classifier: &TagClassifier) -> Vec<(String, TagSet)> {
    classifier
        .positive()
        .iter()
        .map(|t| (t.to_string(), TagSet::single(t)))
        .collect()
}

/// Visitor over tagged messages collecting body size and word count.
pub struct MessageSizeCollector {
    classifier: TagClassifier,
    per_tag: Vec<(String, TagSet)>,
    body_size: SizeSeries,
    word_count: SizeSeries,
}

impl MessageSizeCollector {
    pub fn new(classifier: TagClassifier) -> Self {
        let per_tag = single_tag_sets(&classifier);
        Self {
            classifier,
            per_tag,
            body_size: SizeSeries::default(),
            word_count: SizeSeries::default(),
        }
    }

    pub fn record(&mut self, message: &Message, tags: &[Tag]) {
        let size = message.body.chars().count() as f64;
        let words = word_count(&message.body) as f64;
        let names = tags.iter().map(|t| t.name.as_str());

        let status = self.classifier.classify_names(names.clone());
        self.body_size.any_tag.record(status, size);
        self.word_count.any_tag.record(status, words);

        for (tag, positive) in &self.per_tag {
            let status = classify(names.clone(), positive, self.classifier.negative());
            self.body_size
                .per_tag
                .entry(tag.clone())
                .or_default()
                .record(status, size);
            self.word_count
                .per_tag
                .entry(tag.clone())
                .or_default()
                .record(status, words);
        }
    }
}

#[async_trait]
impl MessageVisitor for MessageSizeCollector {
    async fn visit(&mut self, message: &Message, tags: &[Tag]) -> Result<()> {
        self.record(message, tags);
        Ok(())
    }
}

/// Visitor over tagged thread roots collecting thread size and participants.
pub struct ThreadSizeCollector<'a, D: ?Sized> {
    dataset: &'a D,
    classifier: TagClassifier,
    per_tag: Vec<(String, TagSet)>,
    thread_size: SizeSeries,
    participants: SizeSeries,
}

impl<'a, D: Dataset + ?Sized> ThreadSizeCollector<'a, D> {
    pub fn new(dataset: &'a D, classifier: TagClassifier) -> Self {
        let per_tag = single_tag_sets(&classifier);
        Self {
            dataset,
            classifier,
            per_tag,
            thread_size: SizeSeries::default(),
            participants: SizeSeries::default(),
        }
    }

    pub fn record(&mut self, tree: &ThreadTree) {
        let size = tree.len() as f64;
        let participants = tree.participant_count() as f64;
        let negative = self.classifier.negative();

        let status = thread_status(tree, self.classifier.positive(), negative);
        self.thread_size.any_tag.record(status, size);
        self.participants.any_tag.record(status, participants);

        for (tag, positive) in &self.per_tag {
            let status = thread_status(tree, positive, negative);
            self.thread_size
                .per_tag
                .entry(tag.clone())
                .or_default()
                .record(status, size);
            self.participants
                .per_tag
                .entry(tag.clone())
                .or_default()
                .record(status, participants);
        }
    }
}

#[async_trait]
impl<'a, D: Dataset + ?Sized> MessageVisitor for ThreadSizeCollector<'a, D> {
    async fn visit(&mut self, message: &Message, _tags: &[Tag]) -> Result<()> {
        let tree = ThreadTree::load(self.dataset, message.id).await?;
        self.record(&tree);
        Ok(())
    }
}

/// Run both walks and combine their samples.
pub async fn collect_characteristics<D: Dataset + ?Sized>(
    dataset: &D,
    classifier: &TagClassifier,
    page_size: usize,
) -> Result<Characteristics> {
    let mut messages = MessageSizeCollector::new(classifier.clone());
    let message_stats = walk_messages(
        dataset,
        &MessageFilter::tagged_messages(),
        page_size,
        &mut messages,
    )
    .await?;

    let mut threads = ThreadSizeCollector::new(dataset, classifier.clone());
    let thread_stats = walk_messages(
        dataset,
        &MessageFilter::tagged_threads(),
        page_size,
        &mut threads,
    )
    .await?;

    info!(
        messages = message_stats.visited,
        threads = thread_stats.visited,
        "collected characteristics"
    );
    Ok(Characteristics {
        body_size: messages.body_size,
        word_count: messages.word_count,
        thread_size: threads.thread_size,
        participants: threads.participants,
    })
}
