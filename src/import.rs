//! Load a labeled email dataset from JSON.
//!
//! The input is a JSON array of messages:
//!
//! ```json
//! [
//!   {
//!     "id": 1,
//!     "parent_id": null,
//!     "message_id": "<abc@lists.example.org>",
//!     "subject": "Broker layout",
//!     "sent_from": "dev@example.org",
//!     "date": "2021-03-04T10:00:00Z",
//!     "body": "...",
//!     "tags": ["existence", "process"],
//!     "hidden": false
//!   }
//! ]
//! ```
//!
//! Re-importing a message with the same `id` replaces it, tags included.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

use ak_report_core::dataset::Dataset;
use ak_report_core::{Message, MessageId};

use crate::config::Config;
use crate::db;
use crate::sqlite_dataset::SqliteDataset;

/// One message as it appears in an import file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportMessage {
    pub id: MessageId,
    #[serde(default)]
    pub parent_id: Option<MessageId>,
    pub message_id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sent_from: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub hidden: bool,
}

impl ImportMessage {
    pub fn to_message(&self) -> Message {
        Message {
            id: self.id,
            parent_id: self.parent_id,
            message_id: self.message_id.clone(),
            subject: self.subject.clone(),
            sent_from: self.sent_from.clone(),
            date: self.date,
            body: self.body.clone(),
            hidden: self.hidden,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    pub messages: usize,
    pub tag_links: usize,
    pub orphans: usize,
}

pub fn parse_import(content: &str) -> Result<Vec<ImportMessage>> {
    serde_json::from_str(content).with_context(|| "Failed to parse import file")
}

/// Write every message into the dataset.
///
/// A reply whose parent is neither in the batch nor already stored is
/// still imported and counted as an orphan; it will never be reached from
/// a thread root.
pub async fn import_messages(
    dataset: &SqliteDataset,
    messages: &[ImportMessage],
) -> Result<ImportStats> {
    let ids: HashSet<MessageId> = messages.iter().map(|m| m.id).collect();
    let mut stats = ImportStats::default();

    for m in messages {
        if let Some(parent) = m.parent_id {
            if !ids.contains(&parent) && !exists(dataset, parent).await? {
                warn!(message_id = m.id, parent, "parent message not found");
                stats.orphans += 1;
            }
        }
        dataset
            .upsert_message(&m.to_message(), &m.tags)
            .await
            .with_context(|| format!("Failed to import message {}", m.id))?;
        stats.messages += 1;
        stats.tag_links += m.tags.iter().filter(|t| !t.trim().is_empty()).count();
    }

    info!(
        messages = stats.messages,
        tag_links = stats.tag_links,
        orphans = stats.orphans,
        "imported messages"
    );
    Ok(stats)
}

async fn exists(dataset: &SqliteDataset, id: MessageId) -> Result<bool> {
    Ok(dataset.get_message(id).await?.is_some())
}

pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file: {}", path.display()))?;
    let messages = parse_import(&content)?;

    let dataset = SqliteDataset::new(db::connect(config).await?);
    let stats = import_messages(&dataset, &messages).await?;
    let total = dataset.count_messages().await?;
    dataset.close().await;

    println!("import {}", path.display());
    println!("  messages imported: {}", stats.messages);
    println!("  tag links: {}", stats.tag_links);
    println!("  orphaned replies: {}", stats.orphans);
    println!("  messages in dataset: {}", total);
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_applies_defaults() {
        let messages = parse_import(
            r#"[{"id": 1, "message_id": "<1@x>", "date": "2021-03-04T10:00:00Z"},
                {"id": 2, "parent_id": 1, "message_id": "<2@x>", "date": "2021-03-04T11:00:00Z",
                 "tags": ["process"], "hidden": true}]"#,
        )
        .unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].tags.is_empty());
        assert!(messages[0].parent_id.is_none());
        assert_eq!(messages[1].to_message().parent_id, Some(1));
        assert!(messages[1].hidden);
    }

    #[test]
    fn test_parse_import_rejects_bad_date() {
        let err = parse_import(r#"[{"id": 1, "message_id": "<1@x>", "date": "yesterday"}]"#)
            .unwrap_err();
        assert!(err.to_string().contains("Failed to parse import file"));
    }
}
