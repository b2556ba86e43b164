//! # AK Report
//!
//! Architectural-knowledge (AK) analysis for labeled email datasets.
//!
//! AK Report loads a mailing-list dataset whose messages carry human-applied
//! tags, scores threads and messages for AK relevance, measures how well
//! full-text search surfaces AK content (DCG, NDCG and precision curves),
//! and mines recurring tag patterns along reply chains and within single
//! messages.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ JSON import │──▶│  SQLite dataset  │──▶│ Dataset walk │
//! │  (akr)      │   │  FTS5 + tags     │   │  (paginated) │
//! └─────────────┘   └──────────────────┘   └──────┬───────┘
//!                                                 │
//!          ┌───────────────┬───────────────┬──────┴────────┐
//!          ▼               ▼               ▼               ▼
//!     ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌─────────────────┐
//!     │ Overview │   │ Precision │   │ Patterns │   │ Characteristics │
//!     └──────────┘   └───────────┘   └──────────┘   └─────────────────┘
//!                           │
//!                           ▼
//!                 CSV report directory (+ zip)
//! ```
//!
//! The analysis logic itself lives in the [`ak_report_core`] crate; this
//! crate supplies configuration, the SQLite-backed dataset and the CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! akr init                          # create the dataset schema
//! akr import emails.json            # load labeled messages
//! akr relevance --thread 42         # score one thread
//! akr analyze-query -q "kafka broker" -n 50
//! akr report --zip                  # full CSV report bundle
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_dataset`] | SQLite implementation of the dataset trait |
//! | [`import`] | JSON dataset import |
//! | [`export`] | JSON export of tagged messages and query results |
//! | [`relevance`] | Relevance mode resolution and `akr relevance` |
//! | [`precision`] | Per-query NDCG and precision curves |
//! | [`patterns`] | Sequence and co-occurrence pattern tables |
//! | [`overview`] | Tag counts and relevance histogram tables |
//! | [`characteristics`] | Size statistics tables |
//! | [`query`] | `akr analyze-query` and `akr top-threads` |
//! | [`report`] | CSV output, report directory and zip bundle |
//! | [`progress`] | Report progress on stderr |
//! | [`logging`] | Tracing subscriber setup |

pub mod characteristics;
pub mod config;
pub mod db;
pub mod export;
pub mod import;
pub mod logging;
pub mod migrate;
pub mod overview;
pub mod patterns;
pub mod precision;
pub mod progress;
pub mod query;
pub mod relevance;
pub mod report;
pub mod sqlite_dataset;
