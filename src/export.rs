//! Export the tagged part of the dataset as JSON.
//!
//! Produces one document with every tagged, visible message (tags
//! included) and, for each configured query, the thread roots and
//! messages the full-text search returns. Message-ids are replaced by a
//! URL-safe base64 SHA-256 digest (`id_hash`) so the export can be shared
//! without leaking list addresses.

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::Row;
use std::path::Path;

use ak_report_core::dataset::Dataset;
use ak_report_core::MessageId;

use crate::config::Config;
use crate::db;
use crate::sqlite_dataset::SqliteDataset;

#[derive(Serialize)]
struct ExportData {
    messages: Vec<ExportMessage>,
    queries: Vec<ExportQuery>,
}

#[derive(Serialize)]
struct ExportMessage {
    id: MessageId,
    id_hash: String,
    parent_id: Option<MessageId>,
    subject: String,
    sent_from: String,
    date: i64,
    tags: Vec<String>,
}

#[derive(Serialize)]
struct ExportQuery {
    name: String,
    query: String,
    threads: Vec<MessageId>,
    messages: Vec<MessageId>,
}

/// URL-safe, unpadded base64 of the SHA-256 of `message_id`.
pub fn id_hash(message_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(message_id.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Export tagged messages and query results as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let dataset = SqliteDataset::new(db::connect(config).await?);

    let rows = sqlx::query(
        r#"
        SELECT m.id, m.parent_id, m.message_id, m.subject, m.sent_from, m.date,
               GROUP_CONCAT(t.name, char(31)) AS tag_names
        FROM messages m
        JOIN message_tags mt ON mt.message_id = m.id
        JOIN tags t ON t.id = mt.tag_id
        WHERE m.hidden = 0
        GROUP BY m.id
        ORDER BY m.id
        "#,
    )
    .fetch_all(dataset.pool())
    .await?;

    let messages: Vec<ExportMessage> = rows
        .iter()
        .map(|row| {
            let tag_names: String = row.get("tag_names");
            let mut tags: Vec<String> = tag_names.split('\u{1f}').map(str::to_string).collect();
            tags.sort();
            ExportMessage {
                id: row.get("id"),
                id_hash: id_hash(&row.get::<String, _>("message_id")),
                parent_id: row.get("parent_id"),
                subject: row.get("subject"),
                sent_from: row.get("sent_from"),
                date: row.get("date"),
                tags,
            }
        })
        .collect();

    let mut queries = Vec::with_capacity(config.queries.len());
    for (name, query) in &config.queries {
        let threads = dataset
            .search_threads(query, config.ranking.thread_results)
            .await
            .with_context(|| format!("Thread search failed for query '{}'", name))?;
        let found = dataset
            .search_messages(query, config.ranking.email_results)
            .await
            .with_context(|| format!("Message search failed for query '{}'", name))?;
        queries.push(ExportQuery {
            name: name.clone(),
            query: query.clone(),
            threads,
            messages: found,
        });
    }

    let message_count = messages.len();
    let query_count = queries.len();

    let data = ExportData { messages, queries };
    let json = serde_json::to_string_pretty(&data)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write export: {}", path.display()))?;
            eprintln!(
                "Exported {} tagged messages, {} queries to {}",
                message_count,
                query_count,
                path.display()
            );
        }
        None => {
            println!("{}", json);
        }
    }

    dataset.close().await;
    Ok(())
}
