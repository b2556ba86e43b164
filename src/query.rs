//! Ad-hoc query checks: `akr analyze-query` and `akr top-threads`.
//!
//! Both score thread search results by ratio relevance, whatever the
//! configured mode.

use anyhow::Result;

use ak_report_core::dataset::Dataset;
use ak_report_core::ranking::{dcg, ideal_ordering, ndcg, UndefinedNdcg};
use ak_report_core::relevance::{RelevanceAnalyzer, RelevanceMode};
use ak_report_core::MessageId;

use crate::config::Config;
use crate::db;
use crate::report::format_float;
use crate::sqlite_dataset::SqliteDataset;

/// DCG of the returned order, and NDCG against the same results sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnalysis {
    pub results: usize,
    pub dcg: f64,
    /// `None` when no result is relevant.
    pub ndcg: Option<f64>,
}

/// Top thread roots for `query` with their ratio relevance.
pub async fn top_threads<D: Dataset + ?Sized>(
    dataset: &D,
    config: &Config,
    query: &str,
    limit: usize,
) -> Result<Vec<(MessageId, f64)>> {
    let roots = dataset.search_threads(query, limit).await?;
    let mut analyzer = RelevanceAnalyzer::new(dataset, config.classifier(), RelevanceMode::Ratio);
    let relevances = analyzer.thread_relevances(&roots).await?;
    Ok(roots.into_iter().zip(relevances).collect())
}

pub async fn analyze_query<D: Dataset + ?Sized>(
    dataset: &D,
    config: &Config,
    query: &str,
    limit: usize,
) -> Result<QueryAnalysis> {
    let values: Vec<f64> = top_threads(dataset, config, query, limit)
        .await?
        .into_iter()
        .map(|(_, r)| r)
        .collect();
    let ideal = ideal_ordering(&values);
    let ndcg = match ndcg(&values, &ideal, values.len()) {
        Ok(v) => Some(v),
        Err(e) => match config.ranking.undefined_ndcg {
            UndefinedNdcg::Error => return Err(e.into()),
            UndefinedNdcg::Zero => None,
        },
    };
    Ok(QueryAnalysis {
        results: values.len(),
        dcg: dcg(&values),
        ndcg,
    })
}

pub async fn run_analyze_query(config: &Config, query: &str, limit: usize) -> Result<()> {
    let dataset = SqliteDataset::new(db::connect(config).await?);
    let analysis = analyze_query(&dataset, config, query, limit).await?;
    dataset.close().await;

    println!("query: {}", query);
    println!("results: {}", analysis.results);
    println!("DCG: {}", format_float(analysis.dcg));
    match analysis.ndcg {
        Some(v) => println!("NDCG: {}", format_float(v)),
        None => println!("NDCG: undefined (no relevant results)"),
    }
    Ok(())
}

pub async fn run_top_threads(config: &Config, query: &str, limit: usize) -> Result<()> {
    let dataset = SqliteDataset::new(db::connect(config).await?);
    let threads = top_threads(&dataset, config, query, limit).await?;
    for (i, (root, relevance)) in threads.iter().enumerate() {
        let subject = dataset
            .get_message(*root)
            .await?
            .map(|m| m.subject)
            .unwrap_or_default();
        println!(
            "Thread {}: weight: {}  [{}] {}",
            i + 1,
            format_float(*relevance),
            root,
            subject
        );
    }
    dataset.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ak_report_core::dataset::memory::InMemoryDataset;
    use ak_report_core::Message;
    use chrono::Utc;

    fn msg(id: i64, parent: Option<i64>, subject: &str) -> Message {
        Message {
            id,
            parent_id: parent,
            message_id: format!("<{}@list>", id),
            subject: subject.to_string(),
            sent_from: "dev@example.org".to_string(),
            date: Utc::now(),
            body: String::new(),
            hidden: false,
        }
    }

    fn dataset() -> InMemoryDataset {
        let ds = InMemoryDataset::new();
        ds.insert_message(msg(1, None, "kafka release"), &["not-ak"]).unwrap();
        ds.insert_message(msg(2, None, "kafka partitions"), &["existence"]).unwrap();
        ds.insert_message(msg(3, Some(2), "re"), &["not-ak"]).unwrap();
        ds
    }

    #[tokio::test]
    async fn test_top_threads_uses_ratio() {
        let ds = dataset();
        let config = Config::minimal("unused.sqlite");
        let threads = top_threads(&ds, &config, "kafka", 10).await.unwrap();
        assert_eq!(threads, vec![(1, 0.0), (2, 0.5)]);
    }

    #[tokio::test]
    async fn test_analyze_query() {
        let ds = dataset();
        let mut config = Config::minimal("unused.sqlite");
        let a = analyze_query(&ds, &config, "kafka", 10).await.unwrap();
        assert_eq!(a.results, 2);
        assert!((a.dcg - 0.5 / 3f64.log2()).abs() < 1e-12);
        assert!((a.ndcg.unwrap() - 1.0 / 3f64.log2()).abs() < 1e-12);

        let none = analyze_query(&ds, &config, "zookeeper", 10).await.unwrap();
        assert_eq!(none.ndcg, None);
        config.ranking.undefined_ndcg = UndefinedNdcg::Error;
        assert!(analyze_query(&ds, &config, "zookeeper", 10).await.is_err());
    }
}
