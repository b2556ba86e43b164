//! Typed analysis failures.
//!
//! Collaborator-facing functions return [`anyhow::Result`]; these variants
//! are wrapped inside it so callers can `downcast_ref::<AnalysisError>()`
//! when they need to tell a missing message from an I/O failure.

use thiserror::Error;

use crate::models::MessageId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// A message id was referenced (by a listing, a reply link or a caller)
    /// but the dataset has no such message.
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    /// A ranking metric has no defined value, e.g. NDCG when the ideal
    /// ranking has zero gain.
    #[error("{metric} is undefined at n = {n}: the ideal ranking has zero gain")]
    UndefinedMetric { metric: &'static str, n: usize },

    /// A relevance value was negative or not a number.
    #[error("invalid relevance value {value} at rank {rank}")]
    InvalidRelevance { value: f64, rank: usize },

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("cannot compute {0} from an empty sample")]
    EmptySample(&'static str),
}
