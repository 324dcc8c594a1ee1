//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// offcache - adaptive offline asset cache
///
/// Stages a complete generation of critical assets, promotes it
/// all-or-nothing, and serves requests network-first with cache fallback.
#[derive(Parser, Debug)]
#[command(name = "offcache")]
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
    #[arg(short, long, global = true, env = "OFFCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache store directory (overrides [store] path)
    #[arg(long, global = true, env = "OFFCACHE_STORE")]
    pub store: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stage every manifest asset and promote the generation
    Install(InstallArgs),

    /// Resolve one request through the fetch arbiter
    Fetch(FetchArgs),

    /// Show the live generation and every stored generation
    Info(InfoArgs),

    /// Send a client message to the worker
    Message(MessageArgs),

    /// Stamp the deployment version into a worker or client script
    Inject(InjectArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the install command
#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Origin to fetch assets from (overrides [worker] origin)
    #[arg(long)]
    pub origin: Option<String>,

    /// Stage only; activate later with `message skip-waiting`
    #[arg(long)]
    pub no_activate: bool,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// URL or origin-relative path
    pub url: String,

    /// Treat the request as a document navigation
    #[arg(short, long)]
    pub navigate: bool,

    /// Behave as if the runtime reports no connectivity
    #[arg(long)]
    pub offline: bool,

    /// Origin to fetch from (overrides [worker] origin)
    #[arg(long)]
    pub origin: Option<String>,

    /// Write the response body to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the info command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Client-to-worker messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageKind {
    /// Activate a staged generation
    SkipWaiting,
    /// Report the live generation's size and URLs
    CacheInfo,
}

/// Arguments for the message command
#[derive(Parser, Debug)]
pub struct MessageArgs {
    /// Message to send
    pub kind: MessageKind,
}

/// Script kinds the origin server stamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InjectTarget {
    /// The cache worker script
    Worker,
    /// The page's main script
    Client,
}

/// Arguments for the inject command
#[derive(Parser, Debug)]
pub struct InjectArgs {
    /// Which script to stamp
    pub target: InjectTarget,

    /// Source file
    pub file: PathBuf,

    /// Write the stamped script here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
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

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
