//! Dataset overview: how often each tag occurs, and how thread relevance
//! is distributed.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::dataset::{Dataset, MessageFilter};
use crate::models::{Message, Tag};
use crate::relevance::RelevanceAnalyzer;
use crate::tags::{normalize_tag, TagSet};
use crate::thread::ThreadTree;
use crate::walk::{walk_messages, MessageVisitor, WalkStats};

/// Bins in the relevance histogram.
pub const HISTOGRAM_BINS: usize = 10;

/// One `[lower, upper)` bin; the last bin also holds `upper`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Equal-width histogram over `[0, 1]`. Values outside the range are not
/// counted.
pub fn relevance_histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if bins == 0 {
        return Vec::new();
    }
    let width = 1.0 / bins as f64;
    let mut out: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: width * i as f64,
            upper: width * (i + 1) as f64,
            count: 0,
        })
        .collect();
    for v in values {
        if !(0.0..=1.0).contains(v) {
            continue;
        }
        let i = ((v * bins as f64).floor() as usize).min(bins - 1);
        out[i].count += 1;
    }
    out
}

/// Tag counts and thread relevances over the tagged part of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overview {
    /// Messages carrying each tag.
    pub message_tag_counts: BTreeMap<String, usize>,
    /// Threads in which at least one message carries each tag.
    pub thread_tag_counts: BTreeMap<String, usize>,
    /// Relevance of each tagged thread, in walk order.
    pub thread_relevances: Vec<f64>,
    pub relevance_mode: String,
}

impl Overview {
    /// Tags of `vocabulary` seen in either count, sorted by name.
    pub fn tag_columns(&self, vocabulary: &TagSet) -> Vec<String> {
        let mut names: Vec<String> = self
            .message_tag_counts
            .keys()
            .chain(self.thread_tag_counts.keys())
            .filter(|n| vocabulary.contains(n))
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn message_count(&self, tag: &str) -> usize {
        self.message_tag_counts.get(&normalize_tag(tag)).copied().unwrap_or(0)
    }

    pub fn thread_count(&self, tag: &str) -> usize {
        self.thread_tag_counts.get(&normalize_tag(tag)).copied().unwrap_or(0)
    }

    pub fn histogram(&self) -> Vec<HistogramBin> {
        relevance_histogram(&self.thread_relevances, HISTOGRAM_BINS)
    }

    pub fn merge(&mut self, other: Overview) {
        for (tag, n) in other.message_tag_counts {
            *self.message_tag_counts.entry(tag).or_insert(0) += n;
        }
        for (tag, n) in other.thread_tag_counts {
            *self.thread_tag_counts.entry(tag).or_insert(0) += n;
        }
        self.thread_relevances.extend(other.thread_relevances);
    }
}

/// Visitor over tagged messages building an [`Overview`].
///
/// Every visited message adds to the per-message counts. Roots also load
/// their thread once for the per-thread counts and relevance.
pub struct OverviewCollector<'a, D: ?Sized> {
    dataset: &'a D,
    analyzer: RelevanceAnalyzer<'a, D>,
    overview: Overview,
}

impl<'a, D: Dataset + ?Sized> OverviewCollector<'a, D> {
    pub fn new(dataset: &'a D, analyzer: RelevanceAnalyzer<'a, D>) -> Self {
        let overview = Overview {
            relevance_mode: analyzer.mode().name().to_string(),
            ..Overview::default()
        };
        Self {
            dataset,
            analyzer,
            overview,
        }
    }

    pub fn into_result(self) -> Overview {
        self.overview
    }
}

#[async_trait]
impl<'a, D: Dataset + ?Sized> MessageVisitor for OverviewCollector<'a, D> {
    async fn visit(&mut self, message: &Message, tags: &[Tag]) -> Result<()> {
        if message.is_root() {
            let tree = ThreadTree::load(self.dataset, message.id).await?;
            let relevance = self.analyzer.thread_relevance(message.id).await?;
            for tag in tree.all_tags() {
                *self.overview.thread_tag_counts.entry(tag).or_insert(0) += 1;
            }
            self.overview.thread_relevances.push(relevance);
        }
        let mut seen: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            let name = normalize_tag(&tag.name);
            if !seen.contains(&name) {
                *self.overview.message_tag_counts.entry(name.clone()).or_insert(0) += 1;
                seen.push(name);
            }
        }
        Ok(())
    }
}

/// Walk the tagged messages of `dataset` and build its overview.
pub async fn collect_overview<'a, D: Dataset + ?Sized>(
    dataset: &'a D,
    analyzer: RelevanceAnalyzer<'a, D>,
    page_size: usize,
) -> Result<(Overview, WalkStats)> {
    let mut collector = OverviewCollector::new(dataset, analyzer);
    let stats = walk_messages(
        dataset,
        &MessageFilter::tagged_messages(),
        page_size,
        &mut collector,
    )
    .await?;
    let overview = collector.into_result();
    info!(
        messages = stats.visited,
        threads = overview.thread_relevances.len(),
        "built dataset overview"
    );
    Ok((overview, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::memory::InMemoryDataset;
    use crate::models::MessageId;
    use crate::relevance::RelevanceMode;
    use crate::tags::TagClassifier;
    use chrono::Utc;

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

    #[test]
    fn test_histogram_last_bin_is_closed() {
        let h = relevance_histogram(&[0.0, 0.05, 0.1, 0.95, 1.0, 1.5], 10);
        assert_eq!(h.len(), 10);
        assert_eq!(h[0].count, 2);
        assert_eq!(h[1].count, 1);
        assert_eq!(h[9].count, 2);
        assert_eq!(h.iter().map(|b| b.count).sum::<usize>(), 5);
    }

    #[tokio::test]
    async fn test_collect_overview() {
        let ds = InMemoryDataset::new();
        ds.insert_message(msg(1, None), &["existence"]).unwrap();
        ds.insert_message(msg(2, Some(1)), &["process"]).unwrap();
        ds.insert_message(msg(3, Some(1)), &["process", "not-ak"]).unwrap();
        ds.insert_message(msg(10, None), &["not-ak"]).unwrap();
        ds.insert_message(msg(11, Some(10)), &["question"]).unwrap();

        let analyzer = RelevanceAnalyzer::new(&ds, TagClassifier::default(), RelevanceMode::Ratio);
        let (overview, stats) = collect_overview(&ds, analyzer, 2).await.unwrap();
        assert_eq!(stats.visited, 5);
        assert_eq!(overview.message_count("process"), 2);
        assert_eq!(overview.message_count("existence"), 1);
        assert_eq!(overview.thread_count("process"), 1);
        assert_eq!(overview.thread_count("not-ak"), 2);
        assert_eq!(overview.thread_relevances, vec![1.0, 0.0]);
        assert_eq!(overview.relevance_mode, "ratio");

        let vocab = TagClassifier::default().positive().union(&TagSet::default_negative());
        assert_eq!(overview.tag_columns(&vocab), vec!["existence", "not-ak", "process"]);
    }

    #[test]
    fn test_merge_adds_counts() {
        let mut a = Overview::default();
        a.message_tag_counts.insert("process".into(), 2);
        let mut b = Overview::default();
        b.message_tag_counts.insert("process".into(), 3);
        b.thread_relevances.push(0.5);
        a.merge(b);
        assert_eq!(a.message_count("process"), 5);
        assert_eq!(a.thread_relevances, vec![0.5]);
    }
}
