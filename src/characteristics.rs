//! Characteristics table: box statistics of message and thread sizes.

use anyhow::Result;

use ak_report_core::characteristics::{collect_characteristics, CharacteristicRow};
use ak_report_core::dataset::Dataset;
use ak_report_core::TagStatus;

use crate::config::Config;
use crate::report::{format_float, CsvTable, NamedTable};

pub fn status_label(status: TagStatus) -> &'static str {
    match status {
        TagStatus::Architectural => "ak",
        TagStatus::NotArchitectural => "not-ak",
        TagStatus::Unknown => "unknown",
    }
}

/// One row per characteristic, group and status. Empty samples keep their
/// row with a count of 0 and blank statistics.
pub fn summary_table(rows: &[CharacteristicRow]) -> CsvTable {
    let mut table = CsvTable::new(&[
        "CHARACTERISTIC",
        "GROUP",
        "STATUS",
        "COUNT",
        "MIN",
        "Q1",
        "MEDIAN",
        "Q3",
        "MAX",
        "MEAN",
    ]);
    for row in rows {
        let mut line = vec![
            row.characteristic.to_string(),
            row.group.clone(),
            status_label(row.status).to_string(),
        ];
        match &row.stats {
            Some(s) => {
                line.push(s.count.to_string());
                line.extend(
                    [s.min, s.q1, s.median, s.q3, s.max, s.mean]
                        .into_iter()
                        .map(format_float),
                );
            }
            None => {
                line.push("0".to_string());
                line.extend(std::iter::repeat(String::new()).take(6));
            }
        }
        table.push_row(line);
    }
    table
}

pub async fn characteristics_tables<D: Dataset + ?Sized>(
    dataset: &D,
    config: &Config,
) -> Result<Vec<NamedTable>> {
    let characteristics =
        collect_characteristics(dataset, &config.classifier(), config.walk.page_size).await?;
    Ok(vec![NamedTable::new(
        "summary.csv",
        summary_table(&characteristics.summary()),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ak_report_core::dataset::memory::InMemoryDataset;
    use ak_report_core::Message;
    use chrono::Utc;

    fn msg(id: i64, parent: Option<i64>, from: &str, body: &str) -> Message {
        Message {
            id,
            parent_id: parent,
            message_id: format!("<{}@list>", id),
            subject: String::new(),
            sent_from: from.to_string(),
            date: Utc::now(),
            body: body.to_string(),
            hidden: false,
        }
    }

    #[tokio::test]
    async fn test_characteristics_summary_rows() {
        let ds = InMemoryDataset::new();
        ds.insert_message(msg(1, None, "a@x", "one two three"), &["process"]).unwrap();
        ds.insert_message(msg(2, Some(1), "b@x", "four"), &["not-ak"]).unwrap();

        let mut config = Config::minimal("unused.sqlite");
        config.tags.positive = vec!["process".into()];
        let tables = characteristics_tables(&ds, &config).await.unwrap();
        let table = &tables[0].table;

        // 4 characteristics x (any + 1 tag) x 2 statuses.
        assert_eq!(table.len(), 16);
        let find = |c: &str, g: &str, s: &str| {
            table
                .rows()
                .iter()
                .find(|r| r[0] == c && r[1] == g && r[2] == s)
                .cloned()
                .unwrap()
        };
        let words = find("word_count", "any", "ak");
        assert_eq!(words[3], "1");
        assert_eq!(words[6], "3.000000");
        assert_eq!(find("word_count", "any", "not-ak")[4], "1.000000");
        let thread = find("thread_size", "process", "ak");
        assert_eq!(thread[3], "1");
        assert_eq!(thread[6], "2.000000");
        assert_eq!(find("participants", "any", "not-ak")[3], "0");
        assert_eq!(find("participants", "any", "not-ak")[4], "");
    }
}
