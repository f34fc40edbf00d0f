//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// primecache - first-N primes, computed once and shared
///
/// Requests are queued and served by workers from a persisted, ever-growing
/// prime sequence.
#[derive(Parser, Debug)]
#[command(name = "primecache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PRIMECACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Data directory (overrides storage.data_dir)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Request the first N primes
    Submit(SubmitArgs),

    /// Show one request
    Status(StatusArgs),

    /// List requests
    List(ListArgs),

    /// Process queued requests
    Worker(WorkerArgs),

    /// Inspect the prime cache
    Cache(CacheArgs),

    /// Show configuration
    Config(ConfigArgs),
}

/// Arguments for the submit command
#[derive(Parser, Debug)]
pub struct SubmitArgs {
    /// How many primes, starting from 2
    #[arg(allow_negative_numbers = true)]
    pub count: i64,

    /// Wait until the request is done or failed
    #[arg(short, long)]
    pub wait: bool,

    /// Give up waiting after this many seconds
    #[arg(long, default_value = "60", requires = "wait")]
    pub timeout: u64,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Request ID
    pub id: String,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Only requests in this state
    #[arg(short, long)]
    pub status: Option<StatusFilter>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the worker command
#[derive(Parser, Debug)]
pub struct WorkerArgs {
    /// Workers to run (default: worker.concurrency)
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Exit once the queue is empty
    #[arg(long)]
    pub drain: bool,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Print cached primes
    Show {
        /// Print at most this many (0 = all)
        #[arg(short, long, default_value = "100")]
        limit: usize,

        /// Output format
        #[arg(short, long, default_value = "plain")]
        format: OutputFormat,
    },

    /// Summarize the cache and the extension lock
    Info,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration file
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Request states accepted by `list --status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusFilter {
    Pending,
    Processing,
    Done,
    Failed,
}

impl From<StatusFilter> for crate::ledger::RequestStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Pending => Self::Pending,
            StatusFilter::Processing => Self::Processing,
            StatusFilter::Done => Self::Done,
            StatusFilter::Failed => Self::Failed,
        }
    }
}
