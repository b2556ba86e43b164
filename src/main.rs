//! # AK Report CLI (`akr`)
//!
//! The `akr` binary is the primary interface for AK Report. It provides
//! commands for dataset initialization and import, relevance scoring,
//! search-quality analysis, tag-pattern mining and report generation.
//!
//! ## Usage
//!
//! ```bash
//! akr --config ./config/akr.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `akr init` | Create the SQLite dataset and run schema migrations |
//! | `akr import <file>` | Load labeled messages from a JSON file |
//! | `akr export` | Export tagged messages and query results as JSON |
//! | `akr relevance` | Score a thread, a message, or every tagged thread |
//! | `akr precision` | NDCG and precision curves for the configured queries |
//! | `akr patterns` | Sequence and co-occurrence tag patterns |
//! | `akr overview` | Tag counts and relevance histogram |
//! | `akr characteristics` | Size statistics of AK and non-AK content |
//! | `akr analyze-query` | DCG and NDCG of one query's thread results |
//! | `akr top-threads` | Relevance of each of a query's top threads |
//! | `akr report` | Run every section into a timestamped directory |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize and load a dataset
//! akr init --config ./config/akr.toml
//! akr import data/emails.json
//!
//! # Check one query
//! akr analyze-query -q "kafka broker" -n 50
//!
//! # Full report, zipped
//! akr report --zip
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use ak_report::config::{self, RelevanceModeName};
use ak_report::progress::ProgressMode;
use ak_report::relevance::RelevanceTarget;
use ak_report::sqlite_dataset::SqliteDataset;
use ak_report::{
    characteristics, db, export, import, logging, migrate, overview, patterns, precision, query,
    relevance, report,
};

/// AK Report CLI: architectural-knowledge analysis for labeled email
/// datasets.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/akr.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "akr",
    about = "AK Report: architectural-knowledge analysis for labeled email datasets",
    version,
    long_about = "AK Report scores mailing-list threads for architectural-knowledge relevance, \
    measures how well full-text search surfaces that knowledge (DCG, NDCG, precision), \
    and mines recurring tag patterns along reply chains."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/akr.toml`. Dataset, tag, ranking, pattern and
    /// report settings are read from this file.
    #[arg(long, global = true, default_value = "./config/akr.toml")]
    config: PathBuf,

    /// Log at debug level (`RUST_LOG` takes precedence).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProgressArg {
    Off,
    Human,
    Json,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the dataset schema.
    ///
    /// Creates the SQLite file and all required tables (messages, tags,
    /// message_tags, messages_fts). Running it more than once is safe.
    Init,

    /// Import labeled messages from a JSON file.
    ///
    /// Messages with an existing id are replaced, tags included.
    Import {
        /// JSON array of messages.
        file: PathBuf,
    },

    /// Export tagged messages and query results as JSON.
    Export {
        /// Output file; stdout when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Score a thread, a message, or every tagged thread.
    Relevance {
        /// Root message id of the thread to score.
        #[arg(long, conflicts_with = "message")]
        thread: Option<i64>,

        /// Id of a single message to score.
        #[arg(long)]
        message: Option<i64>,

        /// Override the configured relevance mode.
        #[arg(long, value_enum)]
        mode: Option<RelevanceModeName>,
    },

    /// NDCG and precision curves for every configured query.
    Precision {
        /// Directory for the CSV files; stdout when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Sequence and co-occurrence tag patterns.
    Patterns {
        /// Directory for the CSV files; stdout when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Tag counts, thread relevances and relevance histogram.
    Overview {
        /// Directory for the CSV files; stdout when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Size statistics of AK and non-AK messages and threads.
    Characteristics {
        /// Directory for the CSV files; stdout when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// DCG and NDCG of a query's top thread results.
    AnalyzeQuery {
        /// Full-text query.
        #[arg(long, short)]
        query: String,

        /// Number of results to check.
        #[arg(long = "result-count", short = 'n', default_value_t = 100)]
        result_count: usize,
    },

    /// Relevance of each of a query's top threads.
    TopThreads {
        /// Full-text query.
        #[arg(long, short)]
        query: String,

        /// Number of threads to list.
        #[arg(long = "thread-count", short = 'n', default_value_t = 100)]
        thread_count: usize,
    },

    /// Run every report section into a timestamped directory.
    Report {
        /// Base directory; defaults to `report.output_dir`.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Also bundle the report directory as a zip archive.
        #[arg(long)]
        zip: bool,

        /// Progress on stderr; defaults to `human` on a terminal, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressArg>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Dataset initialized successfully.");
        }
        Commands::Import { file } => {
            import::run_import(&cfg, &file).await?;
        }
        Commands::Export { output } => {
            export::run_export(&cfg, output.as_deref()).await?;
        }
        Commands::Relevance {
            thread,
            message,
            mode,
        } => {
            let target = match (thread, message) {
                (Some(root), _) => RelevanceTarget::Thread(root),
                (None, Some(id)) => RelevanceTarget::Message(id),
                (None, None) => RelevanceTarget::AllThreads,
            };
            relevance::run_relevance(&cfg, target, mode).await?;
        }
        Commands::Precision { output } => {
            let dataset = SqliteDataset::new(db::connect(&cfg).await?);
            let tables = precision::precision_tables(&dataset, &cfg).await?;
            dataset.close().await;
            report::emit_tables(&tables, output.as_deref())?;
        }
        Commands::Patterns { output } => {
            let dataset = SqliteDataset::new(db::connect(&cfg).await?);
            let tables = patterns::pattern_tables(&dataset, &cfg).await?;
            dataset.close().await;
            report::emit_tables(&tables, output.as_deref())?;
        }
        Commands::Overview { output } => {
            let dataset = SqliteDataset::new(db::connect(&cfg).await?);
            let tables = overview::overview_tables(&dataset, &cfg).await?;
            dataset.close().await;
            report::emit_tables(&tables, output.as_deref())?;
        }
        Commands::Characteristics { output } => {
            let dataset = SqliteDataset::new(db::connect(&cfg).await?);
            let tables = characteristics::characteristics_tables(&dataset, &cfg).await?;
            dataset.close().await;
            report::emit_tables(&tables, output.as_deref())?;
        }
        Commands::AnalyzeQuery {
            query: q,
            result_count,
        } => {
            query::run_analyze_query(&cfg, &q, result_count).await?;
        }
        Commands::TopThreads {
            query: q,
            thread_count,
        } => {
            query::run_top_threads(&cfg, &q, thread_count).await?;
        }
        Commands::Report {
            output,
            zip,
            progress,
        } => {
            let progress = progress
                .map(ProgressMode::from)
                .unwrap_or_else(ProgressMode::default_for_tty);
            report::run_report(&cfg, output.as_deref(), zip, progress).await?;
        }
    }

    Ok(())
}
