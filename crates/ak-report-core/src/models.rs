//! Core data models used throughout AK Report.
//!
//! These are immutable snapshots handed out by a [`Dataset`](crate::dataset::Dataset);
//! the analysis code never mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Dataset-local numeric message identifier.
pub type MessageId = i64;

/// A label attached to messages. Names compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

impl Tag {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A single email with its full body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// `None` for the root of a thread.
    pub parent_id: Option<MessageId>,
    /// The `Message-ID` header value.
    pub message_id: String,
    pub subject: String,
    pub sent_from: String,
    pub date: DateTime<Utc>,
    pub body: String,
    pub hidden: bool,
}

impl Message {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn preview(&self) -> MessagePreview {
        MessagePreview {
            id: self.id,
            parent_id: self.parent_id,
            subject: self.subject.clone(),
            sent_from: self.sent_from.clone(),
            date: self.date,
        }
    }
}

/// Lightweight message header, as returned by listings and reply lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePreview {
    pub id: MessageId,
    pub parent_id: Option<MessageId>,
    pub subject: String,
    pub sent_from: String,
    pub date: DateTime<Utc>,
}

/// One page of a filtered message listing.
#[derive(Debug, Clone, Default)]
pub struct MessagePage {
    pub messages: Vec<MessagePreview>,
    pub has_next_page: bool,
}
