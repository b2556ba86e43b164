//! Reply-tree snapshots.
//!
//! A thread is never stored as an entity; it is discovered by following
//! reply links from a root. [`ThreadTree::load`] does that once per thread,
//! depth-first with an explicit work stack (so deep threads cannot exhaust
//! the native call stack), and records each node's lowercase tag names,
//! sender and direct replies. All tree analyses then run synchronously on
//! the snapshot.

use std::collections::{BTreeSet, HashMap, HashSet};

use anyhow::Result;
use tracing::warn;

use crate::dataset::Dataset;
use crate::models::MessageId;
use crate::tags::{normalize_tag, TagClassifier, TagSet, TagStatus};

/// One message inside a [`ThreadTree`].
#[derive(Debug, Clone, Default)]
pub struct ThreadNode {
    pub tags: BTreeSet<String>,
    pub sent_from: String,
    pub replies: Vec<MessageId>,
}

impl ThreadNode {
    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.contains(&normalize_tag(name))
    }

    pub fn tag_names(&self) -> impl Iterator<Item = &str> + Clone {
        self.tags.iter().map(String::as_str)
    }
}

/// A loaded reply tree, rooted at a single message.
#[derive(Debug, Clone)]
pub struct ThreadTree {
    root: MessageId,
    nodes: HashMap<MessageId, ThreadNode>,
    /// Depth-first pre-order, replies in reply order.
    order: Vec<MessageId>,
}

impl ThreadTree {
    /// Load the thread rooted at `root` from the dataset.
    ///
    /// Each message is visited exactly once. A reply id seen twice (only
    /// possible with cyclic, malformed data) is logged and ignored.
    pub async fn load<D: Dataset + ?Sized>(dataset: &D, root: MessageId) -> Result<Self> {
        let sender = match dataset.get_message(root).await? {
            Some(m) => m.sent_from,
            None => return Err(crate::AnalysisError::MessageNotFound(root).into()),
        };

        let mut nodes: HashMap<MessageId, ThreadNode> = HashMap::new();
        let mut order = Vec::new();
        let mut visited: HashSet<MessageId> = HashSet::new();
        let mut stack: Vec<(MessageId, String)> = vec![(root, sender)];

        while let Some((id, sent_from)) = stack.pop() {
            if !visited.insert(id) {
                warn!(message_id = id, root, "reply cycle detected, skipping revisit");
                continue;
            }
            let tags = dataset
                .get_tags(id)
                .await?
                .iter()
                .map(|t| normalize_tag(&t.name))
                .collect();
            let replies = dataset.get_replies(id).await?;
            let reply_ids: Vec<MessageId> = replies.iter().map(|r| r.id).collect();
            for reply in replies.into_iter().rev() {
                stack.push((reply.id, reply.sent_from));
            }
            order.push(id);
            nodes.insert(
                id,
                ThreadNode {
                    tags,
                    sent_from,
                    replies: reply_ids,
                },
            );
        }

        Ok(Self { root, nodes, order })
    }

    /// Build a tree directly from `(id, parent, tags)` triples.
    ///
    /// Entries whose parent is unknown are dropped. Used by tests and by
    /// callers that already hold a materialised thread.
    pub fn from_entries(root: MessageId, entries: &[(MessageId, Option<MessageId>, Vec<&str>)]) -> Self {
        let mut nodes: HashMap<MessageId, ThreadNode> = entries
            .iter()
            .map(|(id, _, tags)| {
                (
                    *id,
                    ThreadNode {
                        tags: tags.iter().map(|t| normalize_tag(t)).collect(),
                        sent_from: String::new(),
                        replies: Vec::new(),
                    },
                )
            })
            .collect();
        for (id, parent, _) in entries {
            if let Some(p) = parent {
                if let Some(node) = nodes.get_mut(p) {
                    node.replies.push(*id);
                }
            }
        }

        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(node) = nodes.get(&id) {
                order.push(id);
                stack.extend(node.replies.iter().rev());
            }
        }
        nodes.retain(|id, _| visited.contains(id));
        Self { root, nodes, order }
    }

    pub fn root(&self) -> MessageId {
        self.root
    }

    pub fn node(&self, id: MessageId) -> Option<&ThreadNode> {
        self.nodes.get(&id)
    }

    /// Message ids in depth-first pre-order.
    pub fn message_ids(&self) -> &[MessageId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate `(id, node)` in depth-first pre-order.
    pub fn iter(&self) -> impl Iterator<Item = (MessageId, &ThreadNode)> {
        self.order
            .iter()
            .filter_map(move |id| self.nodes.get(id).map(|n| (*id, n)))
    }

    /// Every distinct tag name appearing anywhere in the thread.
    pub fn all_tags(&self) -> BTreeSet<String> {
        self.nodes.values().flat_map(|n| n.tags.iter().cloned()).collect()
    }

    /// Distinct senders in the thread.
    pub fn participant_count(&self) -> usize {
        self.nodes
            .values()
            .map(|n| n.sent_from.trim().to_lowercase())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn statuses<'a>(
        &'a self,
        classifier: &'a TagClassifier,
    ) -> impl Iterator<Item = TagStatus> + 'a {
        self.iter().map(move |(_, n)| classifier.classify_names(n.tag_names()))
    }

    /// Raw occurrence count of `positive` tags summed over every message.
    pub fn positive_tag_count(&self, positive: &TagSet) -> usize {
        self.iter().map(|(_, n)| positive.count_in(n.tag_names())).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::memory::InMemoryDataset;
    use crate::models::Message;
    use chrono::Utc;

    fn msg(id: MessageId, parent_id: Option<MessageId>, from: &str) -> Message {
        Message {
            id,
            parent_id,
            message_id: format!("<{}@example>", id),
            subject: String::new(),
            sent_from: from.to_string(),
            date: Utc::now(),
            body: String::new(),
            hidden: false,
        }
    }

    #[tokio::test]
    async fn test_load_preorder() {
        let ds = InMemoryDataset::new();
        ds.insert_message(msg(1, None, "a"), &["existence"]).unwrap();
        ds.insert_message(msg(2, Some(1), "b"), &[]).unwrap();
        ds.insert_message(msg(3, Some(2), "a"), &["Process"]).unwrap();
        ds.insert_message(msg(4, Some(1), "c"), &[]).unwrap();

        let tree = ThreadTree::load(&ds, 1).await.unwrap();
        assert_eq!(tree.message_ids(), &[1, 2, 3, 4]);
        assert!(tree.node(3).unwrap().has_tag("process"));
        assert_eq!(tree.participant_count(), 3);
    }

    #[tokio::test]
    async fn test_load_deep_thread_without_recursion() {
        let ds = InMemoryDataset::new();
        ds.insert_message(msg(0, None, "a"), &[]).unwrap();
        for id in 1..5000 {
            ds.insert_message(msg(id, Some(id - 1), "a"), &["process"]).unwrap();
        }
        let tree = ThreadTree::load(&ds, 0).await.unwrap();
        assert_eq!(tree.len(), 5000);
        assert_eq!(tree.positive_tag_count(&TagSet::default_positive()), 4999);
    }

    #[tokio::test]
    async fn test_load_missing_root() {
        let ds = InMemoryDataset::new();
        let err = ThreadTree::load(&ds, 9).await.unwrap_err();
        assert!(err.to_string().contains("message not found: 9"));
    }

    #[test]
    fn test_from_entries_drops_orphans() {
        let tree = ThreadTree::from_entries(
            1,
            &[
                (1, None, vec!["a"]),
                (2, Some(1), vec![]),
                (3, Some(99), vec!["b"]),
            ],
        );
        assert_eq!(tree.message_ids(), &[1, 2]);
        assert!(tree.node(3).is_none());
    }
}
