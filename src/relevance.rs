//! `akr relevance`: score a thread or message, or list every tagged thread.

use anyhow::Result;
use tracing::debug;

use ak_report_core::dataset::{require_message, Dataset, MessageFilter};
use ak_report_core::relevance::{
    compute_max_ak_count, RelevanceAnalyzer, RelevanceCollector, RelevanceMode, RelevanceScope,
};
use ak_report_core::walk::walk_messages;
use ak_report_core::{MessageId, TagSet};

use crate::config::{Config, RelevanceModeName};
use crate::db;
use crate::report::format_float;
use crate::sqlite_dataset::SqliteDataset;

/// Resolve the configured relevance mode.
///
/// Normalized-count mode samples the dataset once for its `max_ak_count`
/// against `positive`.
pub async fn resolve_mode<D: Dataset + ?Sized>(
    dataset: &D,
    config: &Config,
    name: RelevanceModeName,
    positive: &TagSet,
) -> Result<RelevanceMode> {
    let mode = match name {
        RelevanceModeName::Ratio => RelevanceMode::Ratio,
        RelevanceModeName::NormalizedCount => RelevanceMode::NormalizedCount {
            max_ak_count: compute_max_ak_count(
                dataset,
                positive,
                config.relevance.max_ak_sample,
                config.walk.page_size,
            )
            .await?,
        },
    };
    debug!(mode = mode.name(), "resolved relevance mode");
    Ok(mode)
}

/// Analyzer for the configured tag sets and mode.
pub async fn configured_analyzer<'a, D: Dataset + ?Sized>(
    dataset: &'a D,
    config: &Config,
) -> Result<RelevanceAnalyzer<'a, D>> {
    let classifier = config.classifier();
    let mode = resolve_mode(dataset, config, config.relevance.mode, classifier.positive()).await?;
    Ok(RelevanceAnalyzer::new(dataset, classifier, mode))
}

/// What `akr relevance` scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelevanceTarget {
    Thread(MessageId),
    Message(MessageId),
    AllThreads,
}

pub async fn run_relevance(
    config: &Config,
    target: RelevanceTarget,
    mode_override: Option<RelevanceModeName>,
) -> Result<()> {
    let dataset = SqliteDataset::new(db::connect(config).await?);
    let classifier = config.classifier();
    let name = mode_override.unwrap_or(config.relevance.mode);
    let mode = resolve_mode(&dataset, config, name, classifier.positive()).await?;
    let mut analyzer = RelevanceAnalyzer::new(&dataset, classifier, mode);

    println!("mode: {}", mode.name());
    if let RelevanceMode::NormalizedCount { max_ak_count } = mode {
        println!("max_ak_count: {}", format_float(max_ak_count));
    }

    match target {
        RelevanceTarget::Thread(root) => {
            let message = require_message(&dataset, root).await?;
            let counts = analyzer.thread_status_counts(root).await?;
            let relevance = analyzer.thread_relevance(root).await?;
            println!("thread {}: {}", root, message.subject);
            println!(
                "  ak: {}  not-ak: {}  unknown: {}",
                counts.architectural, counts.not_architectural, counts.unknown
            );
            println!("  relevance: {}", format_float(relevance));
        }
        RelevanceTarget::Message(id) => {
            let message = require_message(&dataset, id).await?;
            let relevance = analyzer.message_relevance(id).await?;
            println!("message {}: {}", id, message.subject);
            println!("  relevance: {}", format_float(relevance));
        }
        RelevanceTarget::AllThreads => {
            let mut collector = RelevanceCollector::new(analyzer, RelevanceScope::Threads);
            walk_messages(
                &dataset,
                &MessageFilter::tagged_threads(),
                config.walk.page_size,
                &mut collector,
            )
            .await?;
            for (root, relevance) in collector.values() {
                println!("{}\t{}", root, format_float(*relevance));
            }
        }
    }

    dataset.close().await;
    Ok(())
}
