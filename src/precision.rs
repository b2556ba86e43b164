//! Search precision and NDCG curves per configured query.
//!
//! Each query is scored twice: as a thread search (relevance of each
//! returned thread) and as a message search (1 for an AK message, else 0).
//! Curves are produced for the full positive tag set and again for every
//! positive tag on its own. The ideal ranking at each cutoff is taken from
//! the whole dataset, so a search that misses relevant threads scores
//! below 1 even when its own results are perfectly ordered.

use anyhow::{Context, Result};
use tracing::{info, warn};

use ak_report_core::dataset::{Dataset, MessageFilter};
use ak_report_core::ranking::RankingQuality;
use ak_report_core::relevance::{RelevanceAnalyzer, RelevanceCollector, RelevanceScope};
use ak_report_core::walk::walk_messages;

use crate::config::Config;
use crate::relevance::configured_analyzer;
use crate::report::{format_float, CsvTable, NamedTable};

/// Group label for the full positive tag set.
pub const ALL_TAGS: &str = "all";

/// Curves for one query under one tag group.
#[derive(Debug, Clone)]
pub struct QueryCurves {
    pub name: String,
    pub query: String,
    pub group: String,
    pub threads: RankingQuality,
    pub emails: RankingQuality,
}

/// Dataset-wide ideal rankings for one tag group.
struct IdealPools {
    threads: Vec<f64>,
    emails: Vec<f64>,
}

async fn ideal_pools<'a, D: Dataset + ?Sized>(
    dataset: &'a D,
    analyzer: RelevanceAnalyzer<'a, D>,
    config: &Config,
) -> Result<(RelevanceAnalyzer<'a, D>, IdealPools)> {
    let page_size = config.walk.page_size;

    let mut threads = RelevanceCollector::new(analyzer, RelevanceScope::Threads);
    walk_messages(dataset, &MessageFilter::tagged_threads(), page_size, &mut threads).await?;
    let thread_pool = threads.ideal_ordering(config.ranking.thread_results);
    let (analyzer, _) = threads.into_parts();

    let mut emails = RelevanceCollector::new(analyzer, RelevanceScope::Messages);
    walk_messages(dataset, &MessageFilter::tagged_messages(), page_size, &mut emails).await?;
    let email_pool = emails.ideal_ordering(config.ranking.email_results);
    let (analyzer, _) = emails.into_parts();

    Ok((
        analyzer,
        IdealPools {
            threads: thread_pool,
            emails: email_pool,
        },
    ))
}

async fn group_curves<D: Dataset + ?Sized>(
    dataset: &D,
    analyzer: RelevanceAnalyzer<'_, D>,
    group: &str,
    config: &Config,
) -> Result<Vec<QueryCurves>> {
    let (mut analyzer, pools) = ideal_pools(dataset, analyzer, config).await?;
    let policy = config.ranking.undefined_ndcg;

    let mut out = Vec::with_capacity(config.queries.len());
    for (name, query) in &config.queries {
        let roots = dataset
            .search_threads(query, config.ranking.thread_results)
            .await
            .with_context(|| format!("Thread search failed for query '{}'", name))?;
        let thread_rel = analyzer.thread_relevances(&roots).await?;
        let threads = RankingQuality::analyze(&thread_rel, Some(pools.threads.as_slice()), policy)?;

        let ids = dataset
            .search_messages(query, config.ranking.email_results)
            .await
            .with_context(|| format!("Message search failed for query '{}'", name))?;
        let email_rel = analyzer.message_relevances(&ids).await?;
        let emails = RankingQuality::analyze(&email_rel, Some(pools.emails.as_slice()), policy)?;

        if !threads.undefined_ndcg_at.is_empty() {
            warn!(
                query = %name,
                group,
                cutoffs = threads.undefined_ndcg_at.len(),
                "thread NDCG undefined at some cutoffs, reported as 0"
            );
        }
        out.push(QueryCurves {
            name: name.clone(),
            query: query.clone(),
            group: group.to_string(),
            threads,
            emails,
        });
    }
    Ok(out)
}

/// Curves for every configured query, first for all positive tags and then
/// for each positive tag alone.
pub async fn precision_curves<D: Dataset + ?Sized>(
    dataset: &D,
    config: &Config,
) -> Result<Vec<QueryCurves>> {
    // Single-tag analyzers inherit the mode, so they share max_ak_count.
    let analyzer = configured_analyzer(dataset, config).await?;
    let tags = config.positive_tag_list();
    let per_tag: Vec<_> = tags
        .iter()
        .map(|tag| (tag.clone(), analyzer.for_single_tag(tag)))
        .collect();

    let mut curves = group_curves(dataset, analyzer, ALL_TAGS, config).await?;
    for (tag, analyzer) in per_tag {
        curves.extend(group_curves(dataset, analyzer, &tag, config).await?);
    }
    info!(
        queries = config.queries.len(),
        groups = tags.len() + 1,
        "computed precision curves"
    );
    Ok(curves)
}

fn curve_table(quality: &RankingQuality) -> CsvTable {
    let mut table = CsvTable::new(&["N", "NDCG", "PRECISION"]);
    for (n, ndcg, precision) in quality.rows() {
        table.push_row(vec![n.to_string(), format_float(ndcg), format_float(precision)]);
    }
    table
}

/// `{query}_{group}_threads.csv` and `{query}_{group}_emails.csv` per curve
/// set, plus one `summary.csv` with the curves' final values.
pub fn curves_to_tables(curves: &[QueryCurves]) -> Vec<NamedTable> {
    let mut summary = CsvTable::new(&[
        "QUERY",
        "GROUP",
        "THREADS",
        "THREAD_NDCG",
        "THREAD_PRECISION",
        "EMAILS",
        "EMAIL_NDCG",
        "EMAIL_PRECISION",
    ]);
    let mut tables = Vec::with_capacity(curves.len() * 2 + 1);
    for c in curves {
        let last = |q: &RankingQuality| {
            q.rows()
                .last()
                .map(|(_, ndcg, precision)| (format_float(ndcg), format_float(precision)))
                .unwrap_or_default()
        };
        let (t_ndcg, t_prec) = last(&c.threads);
        let (e_ndcg, e_prec) = last(&c.emails);
        summary.push_row(vec![
            c.name.clone(),
            c.group.clone(),
            c.threads.len().to_string(),
            t_ndcg,
            t_prec,
            c.emails.len().to_string(),
            e_ndcg,
            e_prec,
        ]);
        let stem = format!("{}_{}", file_stem(&c.name), file_stem(&c.group));
        tables.push(NamedTable::new(format!("{}_threads.csv", stem), curve_table(&c.threads)));
        tables.push(NamedTable::new(format!("{}_emails.csv", stem), curve_table(&c.emails)));
    }
    tables.insert(0, NamedTable::new("summary.csv", summary));
    tables
}

/// Lowercase ASCII alphanumerics, everything else folded to `-`.
pub fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = stem.trim_matches('-');
    if trimmed.is_empty() {
        "query".to_string()
    } else {
        trimmed.to_string()
    }
}

pub async fn precision_tables<D: Dataset + ?Sized>(
    dataset: &D,
    config: &Config,
) -> Result<Vec<NamedTable>> {
    if config.queries.is_empty() {
        warn!("no [queries] configured, precision section is empty");
    }
    let curves = precision_curves(dataset, config).await?;
    Ok(curves_to_tables(&curves))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ak_report_core::dataset::memory::InMemoryDataset;
    use ak_report_core::ranking::UndefinedNdcg;
    use ak_report_core::Message;
    use chrono::{TimeZone, Utc};

    fn msg(id: i64, parent: Option<i64>, subject: &str, body: &str) -> Message {
        Message {
            id,
            parent_id: parent,
            message_id: format!("<{}@list>", id),
            subject: subject.to_string(),
            sent_from: format!("dev{}@example.org", id),
            date: Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, id as u32).unwrap(),
            body: body.to_string(),
            hidden: false,
        }
    }

    fn dataset() -> InMemoryDataset {
        let ds = InMemoryDataset::new();
        ds.insert_message(msg(1, None, "kafka broker layout", "partitions"), &["existence"])
            .unwrap();
        ds.insert_message(msg(2, Some(1), "re: kafka", "agree"), &["not-ak"])
            .unwrap();
        ds.insert_message(msg(3, None, "release vote", "kafka 3.0"), &["not-ak"])
            .unwrap();
        ds.insert_message(msg(4, None, "storage engine", "process"), &["process"])
            .unwrap();
        ds
    }

    fn config() -> Config {
        let mut config = Config::minimal("unused.sqlite");
        config.tags.positive = vec!["existence".into(), "process".into()];
        config.queries.insert("broker".into(), "kafka".into());
        config
    }

    #[tokio::test]
    async fn test_curves_per_group() {
        let ds = dataset();
        let curves = precision_curves(&ds, &config()).await.unwrap();
        let groups: Vec<&str> = curves.iter().map(|c| c.group.as_str()).collect();
        assert_eq!(groups, vec!["all", "existence", "process"]);

        let all = &curves[0];
        assert_eq!(all.threads.len(), all.threads.precision.len());
        assert!(all.threads.ndcg.iter().all(|v| (0.0..=1.0 + 1e-9).contains(v)));

        // "process" never matches the query, so its curves are all zero.
        let process = &curves[2];
        assert!(process.threads.precision.iter().all(|p| *p == 0.0));
        assert!(process.emails.ndcg.iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_undefined_policy_error_propagates() {
        let ds = dataset();
        let mut config = config();
        config.tags.positive = vec!["property".into()];
        config.ranking.undefined_ndcg = UndefinedNdcg::Error;
        assert!(precision_curves(&ds, &config).await.is_err());
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Kafka Broker"), "kafka-broker");
        assert_eq!(file_stem("existence-structural"), "existence-structural");
        assert_eq!(file_stem("??"), "query");
    }

    #[test]
    fn test_tables_have_summary_first() {
        let q = RankingQuality::analyze(&[1.0, 0.0], None, UndefinedNdcg::Zero).unwrap();
        let curves = vec![QueryCurves {
            name: "broker".into(),
            query: "kafka".into(),
            group: "all".into(),
            threads: q.clone(),
            emails: q,
        }];
        let tables = curves_to_tables(&curves);
        let names: Vec<&str> = tables.iter().map(|t| t.file_name.as_str()).collect();
        assert_eq!(names, vec!["summary.csv", "broker_all_threads.csv", "broker_all_emails.csv"]);
        assert_eq!(tables[1].table.rows()[1], vec!["2", "1.000000", "0.500000"]);
    }
}
