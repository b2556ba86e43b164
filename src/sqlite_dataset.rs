//! SQLite-backed [`Dataset`] implementation.
//!
//! Messages, tags and the tag links live in plain tables; full-text search
//! runs against the `messages_fts` FTS5 index and is ranked by BM25. Thread
//! search maps every matching message to its thread root and orders roots
//! by their best-ranked message.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use ak_report_core::dataset::{Dataset, MessageFilter};
use ak_report_core::{AnalysisError, Message, MessageId, MessagePage, MessagePreview, Tag};

/// SQLite implementation of the [`Dataset`] trait.
pub struct SqliteDataset {
    pool: SqlitePool,
}

impl SqliteDataset {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Insert or replace one message with its tag names and FTS entry.
    pub async fn upsert_message(&self, message: &Message, tag_names: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, parent_id, message_id, subject, sent_from, date, body, hidden)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                parent_id = excluded.parent_id,
                message_id = excluded.message_id,
                subject = excluded.subject,
                sent_from = excluded.sent_from,
                date = excluded.date,
                body = excluded.body,
                hidden = excluded.hidden
            "#,
        )
        .bind(message.id)
        .bind(message.parent_id)
        .bind(&message.message_id)
        .bind(&message.subject)
        .bind(&message.sent_from)
        .bind(message.date.timestamp())
        .bind(&message.body)
        .bind(message.hidden)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM message_tags WHERE message_id = ?")
            .bind(message.id)
            .execute(&mut *tx)
            .await?;

        for name in tag_names {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
                .bind(name)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO message_tags (message_id, tag_id)
                SELECT ?, id FROM tags WHERE name = ? COLLATE NOCASE
                "#,
            )
            .bind(message.id)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM messages_fts WHERE message_id = ?")
            .bind(message.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO messages_fts (message_id, subject, body) VALUES (?, ?, ?)")
            .bind(message.id)
            .bind(&message.subject)
            .bind(&message.body)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn count_messages(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn ensure_exists(&self, id: MessageId) -> Result<()> {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM messages WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(AnalysisError::MessageNotFound(id).into());
        }
        Ok(())
    }
}

fn timestamp_to_utc(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

fn row_to_preview(row: &SqliteRow) -> MessagePreview {
    MessagePreview {
        id: row.get("id"),
        parent_id: row.get("parent_id"),
        subject: row.get("subject"),
        sent_from: row.get("sent_from"),
        date: timestamp_to_utc(row.get("date")),
    }
}

/// Turn free text into an FTS5 query: every whitespace-separated term is
/// quoted and the terms are OR-ed.
pub fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

fn filter_clause(filter: &MessageFilter) -> String {
    let mut clauses: Vec<&str> = Vec::new();
    match filter.hidden {
        Some(true) => clauses.push("m.hidden = 1"),
        Some(false) => clauses.push("m.hidden = 0"),
        None => {}
    }
    if filter.roots_only {
        clauses.push("m.parent_id IS NULL");
    }
    if filter.tagged_only {
        clauses.push("EXISTS (SELECT 1 FROM message_tags mt WHERE mt.message_id = m.id)");
    }
    if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    }
}

#[async_trait]
impl Dataset for SqliteDataset {
    async fn list_filtered_messages(
        &self,
        filter: &MessageFilter,
        page: usize,
        page_size: usize,
    ) -> Result<MessagePage> {
        let page_size = page_size.max(1);
        let offset = page.saturating_sub(1) * page_size;
        let sql = format!(
            "SELECT m.id, m.parent_id, m.subject, m.sent_from, m.date FROM messages m {} \
             ORDER BY m.id LIMIT ? OFFSET ?",
            filter_clause(filter)
        );
        // One extra row tells us whether another page follows.
        let rows = sqlx::query(&sql)
            .bind((page_size + 1) as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;

        let has_next_page = rows.len() > page_size;
        let messages = rows.iter().take(page_size).map(row_to_preview).collect();
        Ok(MessagePage {
            messages,
            has_next_page,
        })
    }

    async fn get_message(&self, id: MessageId) -> Result<Option<Message>> {
        let row = sqlx::query(
            "SELECT id, parent_id, message_id, subject, sent_from, date, body, hidden \
             FROM messages WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Message {
            id: row.get("id"),
            parent_id: row.get("parent_id"),
            message_id: row.get("message_id"),
            subject: row.get("subject"),
            sent_from: row.get("sent_from"),
            date: timestamp_to_utc(row.get("date")),
            body: row.get("body"),
            hidden: row.get("hidden"),
        }))
    }

    async fn get_tags(&self, id: MessageId) -> Result<Vec<Tag>> {
        self.ensure_exists(id).await?;
        let rows = sqlx::query(
            "SELECT t.id, t.name FROM tags t \
             JOIN message_tags mt ON mt.tag_id = t.id \
             WHERE mt.message_id = ? ORDER BY t.name",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| Tag::new(row.get("id"), row.get::<String, _>("name")))
            .collect())
    }

    async fn get_replies(&self, id: MessageId) -> Result<Vec<MessagePreview>> {
        self.ensure_exists(id).await?;
        let rows = sqlx::query(
            "SELECT id, parent_id, subject, sent_from, date FROM messages \
             WHERE parent_id = ? ORDER BY date, id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_preview).collect())
    }

    async fn all_tags(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query("SELECT id, name FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| Tag::new(row.get("id"), row.get::<String, _>("name")))
            .collect())
    }

    async fn search_threads(&self, query: &str, limit: usize) -> Result<Vec<MessageId>> {
        let Some(fts) = fts_query(query) else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(
            r#"
            WITH RECURSIVE
            hits(id, score) AS (
                SELECT CAST(message_id AS INTEGER), bm25(messages_fts)
                FROM messages_fts
                WHERE messages_fts MATCH ?
            ),
            ancestry(id, parent_id, score) AS (
                SELECT m.id, m.parent_id, h.score
                FROM hits h JOIN messages m ON m.id = h.id
                WHERE m.hidden = 0
                UNION
                SELECT p.id, p.parent_id, a.score
                FROM ancestry a JOIN messages p ON p.id = a.parent_id
            )
            SELECT a.id AS root, MIN(a.score) AS best
            FROM ancestry a JOIN messages r ON r.id = a.id
            WHERE a.parent_id IS NULL AND r.hidden = 0
            GROUP BY a.id
            ORDER BY best, a.id
            LIMIT ?
            "#,
        )
        .bind(fts)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get("root")).collect())
    }

    async fn search_messages(&self, query: &str, limit: usize) -> Result<Vec<MessageId>> {
        let Some(fts) = fts_query(query) else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(
            r#"
            SELECT m.id AS id
            FROM messages_fts
            JOIN messages m ON m.id = CAST(messages_fts.message_id AS INTEGER)
            WHERE messages_fts MATCH ? AND m.hidden = 0
            ORDER BY bm25(messages_fts), m.id
            LIMIT ?
            "#,
        )
        .bind(fts)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fts_query_quotes_terms() {
        assert_eq!(
            fts_query("kafka  broker-config").as_deref(),
            Some("\"kafka\" OR \"broker-config\"")
        );
        assert_eq!(fts_query("say \"hi\"").as_deref(), Some("\"say\" OR \"\"\"hi\"\"\""));
        assert_eq!(fts_query("   "), None);
    }

    #[test]
    fn test_filter_clause() {
        assert_eq!(filter_clause(&MessageFilter::all()), "");
        let c = filter_clause(&MessageFilter::tagged_threads());
        assert!(c.starts_with("WHERE m.hidden = 0 AND m.parent_id IS NULL AND EXISTS"));
    }
}
