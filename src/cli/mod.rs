//! CLI command definitions and parsing
use crate::query::{SearchType, TimeRange};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tracelens",
    version,
    author = "neur0map",
    about = "Trace chains and time clusters from search-platform log exports",
    long_about = "Tracelens repairs malformed JSON log exports, lists distinct traces, groups \
                  unrelated events that happened close together in time, and emits node/edge \
                  graphs for a trace or a time window as JSON."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/tracelens/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Records file (JSON array, newline-delimited or concatenated objects)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub dataset: Option<PathBuf>,

    /// Seed for synthesized latencies, for reproducible output
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Search and time-range options shared by event and cluster queries
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Value to search for (empty matches everything)
    #[arg(long, default_value = "")]
    pub search_value: String,

    /// Identifier the search value refers to
    #[arg(long, value_enum)]
    pub search_type: Option<SearchType>,

    /// Look-back period before the newest event
    #[arg(long, value_enum)]
    pub time_range: Option<TimeRange>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List distinct trace ids in first-seen order
    Traces,

    /// List normalized events matching a search
    Events {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Build the node/edge graph of one trace
    Graph {
        /// Trace id to render
        trace_id: String,
    },

    /// Group events into time-proximity clusters
    Clusters {
        #[command(flatten)]
        query: QueryArgs,

        /// Maximum gap between consecutive events of a cluster, in milliseconds
        #[arg(short, long)]
        window: Option<i64>,
    },

    /// Build the node/edge graph of one time window
    ClusterGraph {
        /// Window start (RFC 3339); all records when omitted
        #[arg(long)]
        start: Option<String>,

        /// Window length in milliseconds
        #[arg(short, long)]
        window: Option<i64>,
    },

    /// Split concatenated JSON objects in a file into a JSON array
    Repair {
        /// File holding concatenated or newline-delimited objects
        input: PathBuf,

        /// Output path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
