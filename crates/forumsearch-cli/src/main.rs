//! forumsearch CLI - hybrid search over course forum posts.
//!
//! # Usage
//!
//! ```bash
//! # Build or refresh the index of every registered course
//! forumsearch rebuild
//!
//! # Search one course
//! forumsearch search cs61a "github account"
//! forumsearch search cs61a "midterm scope" -n 5 --json
//!
//! # Keep indexes in sync with the scraper's posts.json files
//! forumsearch watch --interval 300
//!
//! # Show index status
//! forumsearch status
//! ```

mod config;
mod output;
mod refresh;
mod registry;
mod search;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use forumsearch_core::config::{DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_RESULT_LIMIT};
use forumsearch_core::search::{AggregationPolicy, FusionStrategy};
use forumsearch_core::{RetrievalConfig, SearchError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Hybrid lexical + semantic search over course forum posts.
#[derive(Parser)]
#[command(name = "forumsearch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Custom data directory (default: $FORUMSEARCH_DATA_DIR, then the platform location)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use the local hashing embedder instead of the OpenAI API
    #[arg(long, global = true)]
    offline: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Search the posts of a course
    Search {
        /// Course id
        course: String,

        /// Search query
        query: String,

        /// Maximum number of results to return
        #[arg(short = 'n', long, default_value_t = DEFAULT_RESULT_LIMIT)]
        limit: usize,

        /// How lexical and semantic rankings are combined
        #[arg(long, value_enum, default_value_t = StrategyArg::Intersection)]
        strategy: StrategyArg,

        /// How chunk similarities collapse into a post score
        #[arg(long, value_enum, default_value_t = AggregationArg::Max)]
        aggregation: AggregationArg,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rebuild indexes whose posts.json changed (all registered courses by default)
    Rebuild {
        /// Course ids
        courses: Vec<String>,

        /// Rebuild even if posts.json is unchanged
        #[arg(long)]
        force: bool,

        /// Output reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Refresh every registered course on a fixed interval
    Watch {
        /// Seconds between refreshes
        #[arg(long, default_value_t = DEFAULT_REFRESH_INTERVAL_SECS)]
        interval: u64,

        /// Run a single pass and exit
        #[arg(long)]
        once: bool,
    },

    /// Show index status (all registered courses by default)
    Status {
        /// Course ids
        courses: Vec<String>,

        /// Output status as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Semantic re-ranking of lexical candidates only
    Intersection,
    /// Reciprocal rank fusion of both rankings
    Rrf,
}

impl From<StrategyArg> for FusionStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Intersection => FusionStrategy::Intersection,
            StrategyArg::Rrf => FusionStrategy::ReciprocalRank,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum AggregationArg {
    /// Best chunk per post
    Max,
    /// Sum of chunk similarities per post
    Sum,
}

impl From<AggregationArg> for AggregationPolicy {
    fn from(arg: AggregationArg) -> Self {
        match arg {
            AggregationArg::Max => AggregationPolicy::Max,
            AggregationArg::Sum => AggregationPolicy::Sum,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(SearchError::NotFound { corpus_id }) = err.downcast_ref::<SearchError>() {
                eprintln!("Search is not available for course '{}': {:#}", corpus_id, err);
                ExitCode::from(2)
            } else {
                eprintln!("Error: {:#}", err);
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let data_dir = config::get_data_dir(cli.data_dir.as_ref())?;
    let embedder = config::create_embedder(cli.offline)?;

    match cli.command {
        Command::Search {
            course,
            query,
            limit,
            strategy,
            aggregation,
            json,
        } => {
            let retrieval = RetrievalConfig {
                strategy: strategy.into(),
                aggregation: aggregation.into(),
                ..RetrievalConfig::default()
            };
            let results =
                search::execute_search(&data_dir, embedder, retrieval, &course, &query, limit)
                    .await?;

            let output = if json {
                output::format_json(&course, &query, &results)
            } else {
                output::format_human(&query, &results)
            };
            println!("{}", output);
        }
        Command::Rebuild {
            courses,
            force,
            json,
        } => {
            let outcomes = refresh::rebuild_courses(
                &data_dir,
                embedder,
                RetrievalConfig::default(),
                &courses,
                force,
            )
            .await?;

            if json {
                println!("{}", output::format_refresh_json(&outcomes));
            } else {
                for (course, outcome) in &outcomes {
                    println!("{}", output::format_refresh(course, outcome));
                }
            }
        }
        Command::Watch { interval, once } => {
            refresh::watch(
                &data_dir,
                embedder,
                RetrievalConfig::default(),
                Duration::from_secs(interval),
                once,
            )
            .await?;
        }
        Command::Status { courses, json } => {
            let statuses = refresh::course_status(&data_dir, embedder.as_ref(), &courses).await?;
            let output = if json {
                output::format_status_json(&statuses)
            } else {
                output::format_status(&statuses)
            };
            println!("{}", output);
        }
    }

    Ok(())
}
