//! In-memory [`Dataset`] implementation for testing and WASM targets.
//!
//! Uses `BTreeMap` behind `std::sync::RwLock` for thread safety.
//! Full-text search is naive term matching: the score of a message is the
//! number of query terms contained in its subject or body.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::error::AnalysisError;
use crate::models::{Message, MessageId, MessagePage, MessagePreview, Tag};
use crate::tags::normalize_tag;

use super::{Dataset, MessageFilter};

struct StoredMessage {
    message: Message,
    tag_ids: Vec<i64>,
    replies: Vec<MessageId>,
}

#[derive(Default)]
struct Inner {
    messages: BTreeMap<MessageId, StoredMessage>,
    tags: BTreeMap<i64, Tag>,
}

impl Inner {
    fn tag_id(&mut self, name: &str) -> i64 {
        let key = normalize_tag(name);
        if let Some(t) = self.tags.values().find(|t| normalize_tag(&t.name) == key) {
            return t.id;
        }
        let id = self.tags.keys().next_back().copied().unwrap_or(0) + 1;
        self.tags.insert(id, Tag::new(id, name.trim()));
        id
    }

    fn stored(&self, id: MessageId) -> Result<&StoredMessage> {
        self.messages
            .get(&id)
            .ok_or_else(|| AnalysisError::MessageNotFound(id).into())
    }

    fn tags_of(&self, stored: &StoredMessage) -> Vec<Tag> {
        stored
            .tag_ids
            .iter()
            .filter_map(|id| self.tags.get(id).cloned())
            .collect()
    }

    /// Scores every visible message against the query terms.
    fn score_messages(&self, query: &str) -> Vec<(MessageId, usize)> {
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        if terms.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<(MessageId, usize)> = self
            .messages
            .values()
            .filter(|s| !s.message.hidden)
            .filter_map(|s| {
                let text = format!("{}\n{}", s.message.subject, s.message.body).to_lowercase();
                let matches = terms.iter().filter(|t| text.contains(*t)).count();
                (matches > 0).then_some((s.message.id, matches))
            })
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored
    }

    fn root_of(&self, id: MessageId) -> Option<MessageId> {
        let mut seen = HashSet::new();
        let mut current = id;
        while seen.insert(current) {
            match self.messages.get(&current)?.message.parent_id {
                Some(parent) => current = parent,
                None => return Some(current),
            }
        }
        None
    }
}

/// In-memory dataset for tests and small fixtures.
pub struct InMemoryDataset {
    inner: RwLock<Inner>,
}

impl InMemoryDataset {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| anyhow!("in-memory dataset lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| anyhow!("in-memory dataset lock poisoned"))
    }

    /// Insert or replace a message together with its tag names.
    ///
    /// Tags are created on first use. A parent must be inserted before
    /// its replies; replies keep insertion order.
    pub fn insert_message(&self, message: Message, tag_names: &[&str]) -> Result<()> {
        let mut inner = self.write()?;
        if let Some(parent) = message.parent_id {
            let parent = inner
                .messages
                .get_mut(&parent)
                .ok_or(AnalysisError::MessageNotFound(parent))?;
            if !parent.replies.contains(&message.id) {
                parent.replies.push(message.id);
            }
        }
        let mut tag_ids: Vec<i64> = Vec::with_capacity(tag_names.len());
        for name in tag_names {
            let id = inner.tag_id(name);
            if !tag_ids.contains(&id) {
                tag_ids.push(id);
            }
        }
        let replies = inner
            .messages
            .remove(&message.id)
            .map(|s| s.replies)
            .unwrap_or_default();
        inner.messages.insert(
            message.id,
            StoredMessage {
                message,
                tag_ids,
                replies,
            },
        );
        Ok(())
    }

    /// Register a tag name without attaching it to any message.
    pub fn insert_tag(&self, name: &str) -> Result<Tag> {
        let mut inner = self.write()?;
        let id = inner.tag_id(name);
        inner
            .tags
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow!("tag {} vanished while inserting", name))
    }

    pub fn len(&self) -> usize {
        self.read().map(|i| i.messages.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryDataset {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dataset for InMemoryDataset {
    async fn list_filtered_messages(
        &self,
        filter: &MessageFilter,
        page: usize,
        page_size: usize,
    ) -> Result<MessagePage> {
        let inner = self.read()?;
        let page_size = page_size.max(1);
        let skip = page.saturating_sub(1) * page_size;
        let mut matching = inner
            .messages
            .values()
            .filter(|s| filter.accepts(&s.message, s.tag_ids.len()))
            .skip(skip);
        let messages: Vec<MessagePreview> = matching
            .by_ref()
            .take(page_size)
            .map(|s| s.message.preview())
            .collect();
        let has_next_page = matching.next().is_some();
        Ok(MessagePage {
            messages,
            has_next_page,
        })
    }

    async fn get_message(&self, id: MessageId) -> Result<Option<Message>> {
        let inner = self.read()?;
        Ok(inner.messages.get(&id).map(|s| s.message.clone()))
    }

    async fn get_tags(&self, id: MessageId) -> Result<Vec<Tag>> {
        let inner = self.read()?;
        let stored = inner.stored(id)?;
        Ok(inner.tags_of(stored))
    }

    async fn get_replies(&self, id: MessageId) -> Result<Vec<MessagePreview>> {
        let inner = self.read()?;
        let stored = inner.stored(id)?;
        stored
            .replies
            .iter()
            .map(|reply| inner.stored(*reply).map(|s| s.message.preview()))
            .collect()
    }

    async fn all_tags(&self) -> Result<Vec<Tag>> {
        let inner = self.read()?;
        Ok(inner.tags.values().cloned().collect())
    }

    async fn search_threads(&self, query: &str, limit: usize) -> Result<Vec<MessageId>> {
        let inner = self.read()?;
        // A root ranks at the position of its best-scoring message.
        let mut best: HashMap<MessageId, usize> = HashMap::new();
        for (position, (id, _)) in inner.score_messages(query).into_iter().enumerate() {
            if let Some(root) = inner.root_of(id) {
                best.entry(root).or_insert(position);
            }
        }
        let mut roots: Vec<(MessageId, usize)> = best.into_iter().collect();
        roots.sort_by_key(|(_, pos)| *pos);
        Ok(roots.into_iter().take(limit).map(|(root, _)| root).collect())
    }

    async fn search_messages(&self, query: &str, limit: usize) -> Result<Vec<MessageId>> {
        let inner = self.read()?;
        Ok(inner
            .score_messages(query)
            .into_iter()
            .take(limit)
            .map(|(id, _)| id)
            .collect())
    }
}
