//! Dataset abstraction for AK Report.
//!
//! The [`Dataset`] trait is the only way the analysis code reaches stored
//! messages, their tags, reply links and the external full-text ranking.
//! Backends are pluggable: SQLite in the application crate, and
//! [`memory::InMemoryDataset`] for tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::AnalysisError;
use crate::models::{Message, MessageId, MessagePage, MessagePreview, Tag};

/// Selection criteria for a paginated message listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageFilter {
    /// `Some(false)` keeps only visible messages, `Some(true)` only hidden ones.
    pub hidden: Option<bool>,
    /// Keep only thread roots (messages without a parent).
    pub roots_only: bool,
    /// Keep only messages carrying at least one tag.
    pub tagged_only: bool,
}

impl MessageFilter {
    /// Every message in the dataset.
    pub fn all() -> Self {
        Self::default()
    }

    /// Visible messages with at least one tag.
    pub fn tagged_messages() -> Self {
        Self {
            hidden: Some(false),
            roots_only: false,
            tagged_only: true,
        }
    }

    /// Visible thread roots with at least one tag.
    pub fn tagged_threads() -> Self {
        Self {
            hidden: Some(false),
            roots_only: true,
            tagged_only: true,
        }
    }

    /// Evaluate the filter against a message and its tag count.
    pub fn accepts(&self, message: &Message, tag_count: usize) -> bool {
        if let Some(hidden) = self.hidden {
            if message.hidden != hidden {
                return false;
            }
        }
        if self.roots_only && !message.is_root() {
            return false;
        }
        if self.tagged_only && tag_count == 0 {
            return false;
        }
        true
    }
}

/// Abstract dataset backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_filtered_messages`](Dataset::list_filtered_messages) | One page of filtered previews (pages start at 1) |
/// | [`get_message`](Dataset::get_message) | Full message by id |
/// | [`get_tags`](Dataset::get_tags) | Tags of one message |
/// | [`get_replies`](Dataset::get_replies) | Direct replies, in reply order |
/// | [`all_tags`](Dataset::all_tags) | The dataset's tag vocabulary |
/// | [`search_threads`](Dataset::search_threads) | Ranked thread roots for a query |
/// | [`search_messages`](Dataset::search_messages) | Ranked individual messages for a query |
///
/// `get_tags` and `get_replies` fail with [`AnalysisError::MessageNotFound`]
/// for an id the dataset does not know.
#[async_trait]
pub trait Dataset: Send + Sync {
    async fn list_filtered_messages(
        &self,
        filter: &MessageFilter,
        page: usize,
        page_size: usize,
    ) -> Result<MessagePage>;

    async fn get_message(&self, id: MessageId) -> Result<Option<Message>>;

    async fn get_tags(&self, id: MessageId) -> Result<Vec<Tag>>;

    async fn get_replies(&self, id: MessageId) -> Result<Vec<MessagePreview>>;

    async fn all_tags(&self) -> Result<Vec<Tag>>;

    /// Full-text search returning thread root ids, best first.
    async fn search_threads(&self, query: &str, limit: usize) -> Result<Vec<MessageId>>;

    /// Full-text search returning message ids, best first.
    async fn search_messages(&self, query: &str, limit: usize) -> Result<Vec<MessageId>>;
}

/// Fetch a message, turning absence into [`AnalysisError::MessageNotFound`].
pub async fn require_message<D: Dataset + ?Sized>(dataset: &D, id: MessageId) -> Result<Message> {
    match dataset.get_message(id).await? {
        Some(m) => Ok(m),
        None => Err(AnalysisError::MessageNotFound(id).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(parent_id: Option<MessageId>, hidden: bool) -> Message {
        Message {
            id: 1,
            parent_id,
            message_id: "<1@example>".to_string(),
            subject: String::new(),
            sent_from: String::new(),
            date: Utc::now(),
            body: String::new(),
            hidden,
        }
    }

    #[test]
    fn test_tagged_threads_filter() {
        let f = MessageFilter::tagged_threads();
        assert!(f.accepts(&message(None, false), 1));
        assert!(!f.accepts(&message(Some(3), false), 1));
        assert!(!f.accepts(&message(None, true), 1));
        assert!(!f.accepts(&message(None, false), 0));
    }

    #[test]
    fn test_all_filter_accepts_everything() {
        let f = MessageFilter::all();
        assert!(f.accepts(&message(Some(3), true), 0));
    }
}
