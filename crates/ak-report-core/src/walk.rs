//! Paginated dataset walker.
//!
//! Every analysis pass enumerates a filtered slice of the dataset page by
//! page and hands each message, with its tags, to a [`MessageVisitor`].
//! A failing visit (or a listed message that cannot be fetched) is logged
//! and skipped; the walk carries on. Only a failure to list a page aborts
//! the walk.
//!
//! Visitors own their result builders. The walk never shares mutable
//! state between visits beyond the visitor itself.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::dataset::{require_message, Dataset, MessageFilter};
use crate::models::{Message, Tag};

/// Default number of messages requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Receives one message at a time from [`walk_messages`].
#[async_trait]
pub trait MessageVisitor: Send {
    async fn visit(&mut self, message: &Message, tags: &[Tag]) -> Result<()>;
}

/// Counters reported at the end of a walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    pub pages: usize,
    pub visited: usize,
    pub failed: usize,
}

/// Walk every message matching `filter`, invoking `visitor` once per message.
pub async fn walk_messages<D, V>(
    dataset: &D,
    filter: &MessageFilter,
    page_size: usize,
    visitor: &mut V,
) -> Result<WalkStats>
where
    D: Dataset + ?Sized,
    V: MessageVisitor + ?Sized,
{
    let page_size = page_size.max(1);
    let mut stats = WalkStats::default();
    let mut page = 1;

    loop {
        let listing = dataset
            .list_filtered_messages(filter, page, page_size)
            .await?;
        stats.pages += 1;

        for preview in &listing.messages {
            let outcome = async {
                let message = require_message(dataset, preview.id).await?;
                let tags = dataset.get_tags(preview.id).await?;
                visitor.visit(&message, &tags).await
            }
            .await;

            match outcome {
                Ok(()) => stats.visited += 1,
                Err(e) => {
                    stats.failed += 1;
                    warn!(message_id = preview.id, error = %format!("{:#}", e), "skipping message");
                }
            }
        }

        debug!(
            page,
            listed = listing.messages.len(),
            visited = stats.visited,
            failed = stats.failed,
            "walked page"
        );

        if !listing.has_next_page {
            break;
        }
        page += 1;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::memory::InMemoryDataset;
    use crate::models::MessageId;
    use anyhow::bail;
    use chrono::Utc;

    fn msg(id: MessageId, parent_id: Option<MessageId>) -> Message {
        Message {
            id,
            parent_id,
            message_id: format!("<{}@example>", id),
            subject: String::new(),
            sent_from: String::new(),
            date: Utc::now(),
            body: format!("body {}", id),
            hidden: false,
        }
    }

    struct Collect {
        seen: Vec<MessageId>,
        fail_on: Option<MessageId>,
    }

    #[async_trait]
    impl MessageVisitor for Collect {
        async fn visit(&mut self, message: &Message, _tags: &[Tag]) -> Result<()> {
            if Some(message.id) == self.fail_on {
                bail!("malformed body in {}", message.id);
            }
            self.seen.push(message.id);
            Ok(())
        }
    }

    fn dataset(n: MessageId) -> InMemoryDataset {
        let ds = InMemoryDataset::new();
        for id in 1..=n {
            ds.insert_message(msg(id, None), &["process"]).unwrap();
        }
        ds
    }

    #[tokio::test]
    async fn test_walk_visits_every_page() {
        let ds = dataset(7);
        let mut v = Collect {
            seen: Vec::new(),
            fail_on: None,
        };
        let stats = walk_messages(&ds, &MessageFilter::tagged_threads(), 3, &mut v)
            .await
            .unwrap();
        assert_eq!(v.seen, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(stats.pages, 3);
        assert_eq!(stats.visited, 7);
    }

    #[tokio::test]
    async fn test_walk_skips_failures() {
        let ds = dataset(4);
        let mut v = Collect {
            seen: Vec::new(),
            fail_on: Some(2),
        };
        let stats = walk_messages(&ds, &MessageFilter::all(), 10, &mut v)
            .await
            .unwrap();
        assert_eq!(v.seen, vec![1, 3, 4]);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.visited, 3);
    }

    #[tokio::test]
    async fn test_walk_empty_dataset() {
        let ds = InMemoryDataset::new();
        let mut v = Collect {
            seen: Vec::new(),
            fail_on: None,
        };
        let stats = walk_messages(&ds, &MessageFilter::all(), 10, &mut v)
            .await
            .unwrap();
        assert_eq!(stats.pages, 1);
        assert_eq!(stats.visited, 0);
    }
}
