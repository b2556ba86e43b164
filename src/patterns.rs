//! Tag-pattern tables: reply-chain sequences and per-message co-occurrence.
//!
//! For every configured size `k` and skip mode the sequence searcher runs
//! once over the tagged threads, writing `{k}gram_skip.csv` or
//! `{k}gram_no-skip.csv`. Co-occurrence runs once per size over the tagged
//! messages into `{k}cooccurrence.csv`. Candidates are drawn from the
//! positive tag vocabulary.

use anyhow::Result;
use tracing::info;

use ak_report_core::dataset::{Dataset, MessageFilter};
use ak_report_core::pattern::cooccurrence::CoOccurrencePatternSearcher;
use ak_report_core::pattern::sequence::{
    SequenceMatch, SequenceMatcher, SequencePatternSearcher, SequenceSearchResult,
};
use ak_report_core::pattern::{tag_combinations, tag_permutations, PatternRow};
use ak_report_core::walk::walk_messages;

use crate::config::Config;
use crate::report::{CsvTable, NamedTable};

pub fn sequence_file_name(size: usize, skip: bool) -> String {
    format!("{}gram_{}.csv", size, if skip { "skip" } else { "no-skip" })
}

pub fn cooccurrence_file_name(size: usize) -> String {
    format!("{}cooccurrence.csv", size)
}

/// Run the sequence searcher for `size`-permutations of the positive tags.
pub async fn sequence_patterns<D: Dataset + ?Sized>(
    dataset: &D,
    config: &Config,
    size: usize,
    skip: bool,
) -> Result<SequenceSearchResult> {
    let candidates = tag_permutations(size, &config.positive_tag_list());
    let matcher = SequenceMatcher::new(candidates, config.negative_tags(), skip)?;
    let mut searcher = SequencePatternSearcher::new(dataset, matcher);
    let stats = walk_messages(
        dataset,
        &MessageFilter::tagged_threads(),
        config.walk.page_size,
        &mut searcher,
    )
    .await?;
    let result = searcher.into_result();
    info!(
        size,
        skip,
        threads = stats.visited,
        matches = result.total_matches(),
        "searched sequence patterns"
    );
    Ok(result)
}

/// Run the co-occurrence searcher for `size`-combinations of the positive
/// tags.
pub async fn cooccurrence_patterns<D: Dataset + ?Sized>(
    dataset: &D,
    config: &Config,
    size: usize,
) -> Result<CoOccurrencePatternSearcher> {
    let candidates = tag_combinations(size, &config.positive_tag_list());
    let mut searcher = CoOccurrencePatternSearcher::new(candidates)?;
    let stats = walk_messages(
        dataset,
        &MessageFilter::tagged_messages(),
        config.walk.page_size,
        &mut searcher,
    )
    .await?;
    info!(size, messages = stats.visited, "searched co-occurrence patterns");
    Ok(searcher)
}

/// Render one chain as `1>2>3`.
pub fn sequence_label(found: &SequenceMatch) -> String {
    found
        .path
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(">")
}

fn join_evidence<T, F: Fn(&T) -> String>(items: &[T], render: F) -> String {
    items.iter().map(render).collect::<Vec<_>>().join(";")
}

/// `RANK,PATTERN,COUNT` plus one evidence column named `evidence`.
pub fn rows_to_table<'a, I>(evidence: &str, rows: I) -> CsvTable
where
    I: IntoIterator<Item = (&'a PatternRow, String)>,
{
    let mut table = CsvTable::new(&["RANK", "PATTERN", "COUNT", evidence]);
    for (row, support) in rows {
        table.push_row(vec![
            row.rank.to_string(),
            row.pattern_label(),
            row.count.to_string(),
            support,
        ]);
    }
    table
}

pub async fn pattern_tables<D: Dataset + ?Sized>(
    dataset: &D,
    config: &Config,
) -> Result<Vec<NamedTable>> {
    let mut tables = Vec::new();
    for &size in &config.patterns.sizes {
        for &skip in &config.patterns.skip_modes {
            let result = sequence_patterns(dataset, config, size, skip).await?;
            let ranked = result.ranked();
            let table = rows_to_table(
                "SEQUENCES",
                ranked
                    .iter()
                    .map(|(row, matches)| (row, join_evidence(*matches, sequence_label))),
            );
            tables.push(NamedTable::new(sequence_file_name(size, skip), table));
        }
        let searcher = cooccurrence_patterns(dataset, config, size).await?;
        let ranked = searcher.ranked();
        let table = rows_to_table(
            "MESSAGE_IDS",
            ranked
                .iter()
                .map(|(row, ids)| (row, join_evidence(*ids, |id| id.to_string()))),
        );
        tables.push(NamedTable::new(cooccurrence_file_name(size), table));
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ak_report_core::dataset::memory::InMemoryDataset;
    use ak_report_core::Message;
    use chrono::Utc;

    fn msg(id: i64, parent: Option<i64>) -> Message {
        Message {
            id,
            parent_id: parent,
            message_id: format!("<{}@list>", id),
            subject: format!("subject {}", id),
            sent_from: "dev@example.org".to_string(),
            date: Utc::now(),
            body: String::new(),
            hidden: false,
        }
    }

    /// 1 {existence} -> 2 {not-ak} -> 3 {process}, plus 4 {existence, process}.
    fn dataset() -> InMemoryDataset {
        let ds = InMemoryDataset::new();
        ds.insert_message(msg(1, None), &["existence"]).unwrap();
        ds.insert_message(msg(2, Some(1)), &["not-ak"]).unwrap();
        ds.insert_message(msg(3, Some(2)), &["process"]).unwrap();
        ds.insert_message(msg(4, None), &["existence", "process"]).unwrap();
        ds
    }

    fn config() -> Config {
        let mut config = Config::minimal("unused.sqlite");
        config.tags.positive = vec!["existence".into(), "process".into()];
        config.patterns.sizes = vec![2];
        config
    }

    #[tokio::test]
    async fn test_skip_mode_passes_negative_message() {
        let ds = dataset();
        let pattern = vec!["existence".to_string(), "process".to_string()];

        let strict = sequence_patterns(&ds, &config(), 2, false).await.unwrap();
        assert_eq!(strict.count_of(&pattern), Some(0));

        let skipping = sequence_patterns(&ds, &config(), 2, true).await.unwrap();
        assert_eq!(skipping.count_of(&pattern), Some(1));
        let index = skipping.patterns().iter().position(|p| *p == pattern).unwrap();
        assert_eq!(skipping.matches(index)[0].path, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_pattern_tables_layout() {
        let ds = dataset();
        let tables = pattern_tables(&ds, &config()).await.unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.file_name.as_str()).collect();
        assert_eq!(names, vec!["2gram_no-skip.csv", "2gram_skip.csv", "2cooccurrence.csv"]);

        let strict = &tables[0].table;
        assert_eq!(strict.headers(), &["RANK", "PATTERN", "COUNT", "SEQUENCES"]);
        assert!(strict.rows().iter().all(|r| r[2] == "0" && r[3].is_empty()));

        let skipping = &tables[1].table;
        assert_eq!(
            skipping.rows()[0],
            vec!["1", "[existence, process]", "1", "1>2>3"]
        );

        let cooc = &tables[2].table;
        assert_eq!(cooc.headers(), &["RANK", "PATTERN", "COUNT", "MESSAGE_IDS"]);
        assert_eq!(cooc.rows()[0], vec!["1", "[existence, process]", "1", "4"]);
    }

    #[test]
    fn test_file_names() {
        assert_eq!(sequence_file_name(3, false), "3gram_no-skip.csv");
        assert_eq!(sequence_file_name(2, true), "2gram_skip.csv");
        assert_eq!(cooccurrence_file_name(2), "2cooccurrence.csv");
    }
}
