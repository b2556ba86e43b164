//! Thread and message relevance scoring.
//!
//! Two definitions of thread relevance are in use, exposed as named
//! [`RelevanceMode`]s:
//!
//! - **Ratio**: classify every message of the thread and return
//!   `architectural / (architectural + not_architectural)`, or `0.0` when
//!   no message is classified either way.
//! - **Normalized count**: sum the raw number of positive tags over the
//!   whole thread and return `min(1, count / max_ak_count)`, where
//!   `max_ak_count` is a dataset-wide constant from [`compute_max_ak_count`].
//!
//! Per-message relevance is `1.0` if the message carries any positive tag,
//! else `0.0`, in both modes.
//!
//! Every score is in `[0.0, 1.0]`.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::{Dataset, MessageFilter};
use crate::error::AnalysisError;
use crate::models::{Message, MessageId, Tag};
use crate::tags::{TagClassifier, TagSet, TagStatus};
use crate::thread::ThreadTree;
use crate::walk::{walk_messages, MessageVisitor};

/// Number of top threads averaged into `max_ak_count` by default.
pub const DEFAULT_MAX_AK_SAMPLE: usize = 10;

/// Which relevance definition a score was computed with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum RelevanceMode {
    Ratio,
    NormalizedCount { max_ak_count: f64 },
}

impl RelevanceMode {
    pub fn name(&self) -> &'static str {
        match self {
            RelevanceMode::Ratio => "ratio",
            RelevanceMode::NormalizedCount { .. } => "normalized-count",
        }
    }
}

/// Per-status message counts over one thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub architectural: usize,
    pub not_architectural: usize,
    pub unknown: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: TagStatus) {
        match status {
            TagStatus::Architectural => self.architectural += 1,
            TagStatus::NotArchitectural => self.not_architectural += 1,
            TagStatus::Unknown => self.unknown += 1,
        }
    }

    /// `architectural / (architectural + not_architectural)`, `0.0` if undefined.
    pub fn ratio(&self) -> f64 {
        let categorized = self.architectural + self.not_architectural;
        if categorized == 0 {
            0.0
        } else {
            self.architectural as f64 / categorized as f64
        }
    }

    pub fn total(&self) -> usize {
        self.architectural + self.not_architectural + self.unknown
    }
}

pub fn status_counts(tree: &ThreadTree, classifier: &TagClassifier) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for status in tree.statuses(classifier) {
        counts.record(status);
    }
    counts
}

/// `min(1, count / max_ak_count)`; `0.0` when `max_ak_count` is not positive.
pub fn normalized_count(count: usize, max_ak_count: f64) -> f64 {
    if max_ak_count > 0.0 {
        (count as f64 / max_ak_count).min(1.0)
    } else {
        0.0
    }
}

/// Relevance of an already-loaded thread under `mode`.
pub fn score_tree(tree: &ThreadTree, classifier: &TagClassifier, mode: RelevanceMode) -> f64 {
    match mode {
        RelevanceMode::Ratio => status_counts(tree, classifier).ratio(),
        RelevanceMode::NormalizedCount { max_ak_count } => {
            normalized_count(tree.positive_tag_count(classifier.positive()), max_ak_count)
        }
    }
}

/// Scores threads and messages against one dataset.
///
/// Thread scores are cached by root id for the analyzer's lifetime. The
/// cache is owned by the analyzer, so one analyzer must not be shared
/// between concurrent workers.
pub struct RelevanceAnalyzer<'a, D: ?Sized> {
    dataset: &'a D,
    classifier: TagClassifier,
    mode: RelevanceMode,
    cache: HashMap<MessageId, f64>,
}

impl<'a, D: Dataset + ?Sized> RelevanceAnalyzer<'a, D> {
    pub fn new(dataset: &'a D, classifier: TagClassifier, mode: RelevanceMode) -> Self {
        Self {
            dataset,
            classifier,
            mode,
            cache: HashMap::new(),
        }
    }

    pub fn mode(&self) -> RelevanceMode {
        self.mode
    }

    pub fn classifier(&self) -> &TagClassifier {
        &self.classifier
    }

    /// A fresh analyzer scoring only `tag` as positive, same mode and dataset.
    pub fn for_single_tag(&self, tag: &str) -> Self {
        Self::new(self.dataset, self.classifier.for_single_tag(tag), self.mode)
    }

    pub async fn thread_relevance(&mut self, root: MessageId) -> Result<f64> {
        if let Some(cached) = self.cache.get(&root) {
            return Ok(*cached);
        }
        let tree = ThreadTree::load(self.dataset, root).await?;
        let relevance = score_tree(&tree, &self.classifier, self.mode);
        self.cache.insert(root, relevance);
        Ok(relevance)
    }

    pub async fn thread_status_counts(&self, root: MessageId) -> Result<StatusCounts> {
        let tree = ThreadTree::load(self.dataset, root).await?;
        Ok(status_counts(&tree, &self.classifier))
    }

    pub async fn message_relevance(&self, id: MessageId) -> Result<f64> {
        let tags = self.dataset.get_tags(id).await?;
        Ok(message_relevance(&tags, self.classifier.positive()))
    }

    /// Relevance for each id, in order.
    pub async fn thread_relevances(&mut self, roots: &[MessageId]) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(roots.len());
        for root in roots {
            out.push(self.thread_relevance(*root).await?);
        }
        Ok(out)
    }

    pub async fn message_relevances(&self, ids: &[MessageId]) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            out.push(self.message_relevance(*id).await?);
        }
        Ok(out)
    }

    pub fn cached_threads(&self) -> usize {
        self.cache.len()
    }
}

pub fn message_relevance(tags: &[Tag], positive: &TagSet) -> f64 {
    if positive.matches_any(tags.iter().map(|t| t.name.as_str())) {
        1.0
    } else {
        0.0
    }
}

/// Collects positive-tag counts for every tagged thread.
struct AkCountCollector<'a, D: ?Sized> {
    dataset: &'a D,
    positive: &'a TagSet,
    counts: Vec<usize>,
}

#[async_trait]
impl<'a, D: Dataset + ?Sized> MessageVisitor for AkCountCollector<'a, D> {
    async fn visit(&mut self, message: &Message, _tags: &[Tag]) -> Result<()> {
        let tree = ThreadTree::load(self.dataset, message.id).await?;
        self.counts.push(tree.positive_tag_count(self.positive));
        Ok(())
    }
}

/// Average of the `sample` largest values, or an error if `counts` is empty.
pub fn top_average(counts: &[usize], sample: usize) -> Result<f64, AnalysisError> {
    if counts.is_empty() || sample == 0 {
        return Err(AnalysisError::EmptySample("max_ak_count"));
    }
    let mut sorted = counts.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let top = &sorted[..sample.min(sorted.len())];
    Ok(top.iter().sum::<usize>() as f64 / top.len() as f64)
}

/// Dataset-wide normalization constant for [`RelevanceMode::NormalizedCount`]:
/// the mean positive-tag count of the `sample` richest tagged threads.
pub async fn compute_max_ak_count<D: Dataset + ?Sized>(
    dataset: &D,
    positive: &TagSet,
    sample: usize,
    page_size: usize,
) -> Result<f64> {
    let mut collector = AkCountCollector {
        dataset,
        positive,
        counts: Vec::new(),
    };
    let stats = walk_messages(
        dataset,
        &MessageFilter::tagged_threads(),
        page_size,
        &mut collector,
    )
    .await?;
    let max_ak_count = top_average(&collector.counts, sample)?;
    debug!(threads = stats.visited, sample, "sampled positive tag counts");
    info!(max_ak_count, "computed maximum AK count");
    Ok(max_ak_count)
}

/// Which id the relevance collector scores for each visited message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelevanceScope {
    /// Score the thread rooted at each visited message.
    Threads,
    /// Score each visited message on its own.
    Messages,
}

/// Visitor that scores every walked message and keeps `(id, relevance)`.
pub struct RelevanceCollector<'a, D: ?Sized> {
    analyzer: RelevanceAnalyzer<'a, D>,
    scope: RelevanceScope,
    values: Vec<(MessageId, f64)>,
}

impl<'a, D: Dataset + ?Sized> RelevanceCollector<'a, D> {
    pub fn new(analyzer: RelevanceAnalyzer<'a, D>, scope: RelevanceScope) -> Self {
        Self {
            analyzer,
            scope,
            values: Vec::new(),
        }
    }

    pub fn values(&self) -> &[(MessageId, f64)] {
        &self.values
    }

    /// Relevances sorted descending and cut to `limit`: the best ranking any
    /// search over the walked population could produce.
    pub fn ideal_ordering(&self, limit: usize) -> Vec<f64> {
        let mut v: Vec<f64> = self.values.iter().map(|(_, r)| *r).collect();
        v.sort_by(|a, b| b.total_cmp(a));
        v.truncate(limit);
        v
    }

    pub fn into_parts(self) -> (RelevanceAnalyzer<'a, D>, Vec<(MessageId, f64)>) {
        (self.analyzer, self.values)
    }
}

#[async_trait]
impl<'a, D: Dataset + ?Sized> MessageVisitor for RelevanceCollector<'a, D> {
    async fn visit(&mut self, message: &Message, tags: &[Tag]) -> Result<()> {
        let relevance = match self.scope {
            RelevanceScope::Threads => self.analyzer.thread_relevance(message.id).await?,
            RelevanceScope::Messages => message_relevance(tags, self.analyzer.classifier().positive()),
        };
        self.values.push((message.id, relevance));
        Ok(())
    }
}
