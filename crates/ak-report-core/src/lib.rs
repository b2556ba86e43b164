//! # AK Report Core
//!
//! Shared, WASM-safe analysis logic for AK Report: data models, tag-status
//! classification, the dataset abstraction, thread relevance scoring,
//! ranking-quality metrics and tag-pattern mining.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Storage and full-text search are reached
//! only through the [`dataset::Dataset`] trait.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Messages, tags and paginated previews |
//! | [`error`] | Typed analysis failures |
//! | [`tags`] | Case-insensitive tag sets and the AK status classifier |
//! | [`dataset`] | Dataset collaborator trait and in-memory implementation |
//! | [`thread`] | Reply-tree snapshots loaded with an explicit work stack |
//! | [`walk`] | Paginated dataset walker with per-message failure isolation |
//! | [`relevance`] | Ratio and normalized-count thread relevance |
//! | [`ranking`] | DCG, NDCG and precision curves |
//! | [`pattern`] | Sequence and co-occurrence tag-pattern mining |
//! | [`overview`] | Tag counts and relevance histograms |
//! | [`characteristics`] | Body, thread and participation size statistics |

pub mod characteristics;
pub mod dataset;
pub mod error;
pub mod models;
pub mod overview;
pub mod pattern;
pub mod ranking;
pub mod relevance;
pub mod tags;
pub mod thread;
pub mod walk;

pub use error::AnalysisError;
pub use models::{Message, MessageId, MessagePage, MessagePreview, Tag};
pub use tags::{TagClassifier, TagSet, TagStatus};
