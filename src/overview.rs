//! Overview tables: tag counts, thread relevances and their histogram.

use anyhow::Result;

use ak_report_core::dataset::Dataset;
use ak_report_core::overview::{collect_overview, Overview};

use crate::config::Config;
use crate::relevance::configured_analyzer;
use crate::report::{format_float, CsvTable, NamedTable};

pub async fn dataset_overview<D: Dataset + ?Sized>(dataset: &D, config: &Config) -> Result<Overview> {
    let analyzer = configured_analyzer(dataset, config).await?;
    let (overview, _) = collect_overview(dataset, analyzer, config.walk.page_size).await?;
    Ok(overview)
}

/// `counts.csv`, `relevances.csv` and `histogram.csv`.
pub fn overview_to_tables(overview: &Overview, config: &Config) -> Vec<NamedTable> {
    let vocabulary = config.positive_tags().union(&config.negative_tags());

    let mut counts = CsvTable::new(&["TAG", "MESSAGES", "THREADS"]);
    for tag in overview.tag_columns(&vocabulary) {
        counts.push_row(vec![
            tag.clone(),
            overview.message_count(&tag).to_string(),
            overview.thread_count(&tag).to_string(),
        ]);
    }

    let mut relevances = CsvTable::new(&["MODE", "RELEVANCE"]);
    for r in &overview.thread_relevances {
        relevances.push_row(vec![overview.relevance_mode.clone(), format_float(*r)]);
    }

    let mut histogram = CsvTable::new(&["LOWER", "UPPER", "COUNT"]);
    for bin in overview.histogram() {
        histogram.push_row(vec![
            format_float(bin.lower),
            format_float(bin.upper),
            bin.count.to_string(),
        ]);
    }

    vec![
        NamedTable::new("counts.csv", counts),
        NamedTable::new("relevances.csv", relevances),
        NamedTable::new("histogram.csv", histogram),
    ]
}

pub async fn overview_tables<D: Dataset + ?Sized>(
    dataset: &D,
    config: &Config,
) -> Result<Vec<NamedTable>> {
    let overview = dataset_overview(dataset, config).await?;
    Ok(overview_to_tables(&overview, config))
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
            subject: String::new(),
            sent_from: "dev@example.org".to_string(),
            date: Utc::now(),
            body: String::new(),
            hidden: false,
        }
    }

    #[tokio::test]
    async fn test_overview_tables() {
        let ds = InMemoryDataset::new();
        ds.insert_message(msg(1, None), &["process"]).unwrap();
        ds.insert_message(msg(2, Some(1)), &["process", "not-ak"]).unwrap();
        ds.insert_message(msg(3, None), &["not-ak"]).unwrap();
        ds.insert_message(msg(4, None), &["off-topic"]).unwrap();

        let config = Config::minimal("unused.sqlite");
        let tables = overview_tables(&ds, &config).await.unwrap();

        let counts = &tables[0].table;
        assert_eq!(counts.rows()[0], vec!["not-ak", "2", "2"]);
        assert_eq!(counts.rows()[1], vec!["process", "2", "1"]);
        assert_eq!(counts.len(), 2);

        // Threads 1, 3 and 4, all in ratio mode.
        let relevances = &tables[1].table;
        assert_eq!(relevances.len(), 3);
        assert_eq!(relevances.rows()[0], vec!["ratio", "1.000000"]);

        let histogram = &tables[2].table;
        assert_eq!(histogram.len(), 10);
        assert_eq!(histogram.rows()[0][2], "2");
        assert_eq!(histogram.rows()[9][2], "1");
    }
}
