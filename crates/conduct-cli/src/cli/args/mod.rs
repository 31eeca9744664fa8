use clap::{Args, Parser, Subcommand};
use conduct_core::ApiVersion;
use std::path::PathBuf;


#[derive(Parser, Debug)]
#[command(
    name = "conduct",
    version,
    about = "Load, scale and watch bundles on a ConductR cluster"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a bundle (and optional configuration) and load it
    Load(LoadArgs),
    /// Start a bundle at the given scale
    Run(RunArgs),
    /// Stop all instances of a bundle
    Stop(BundleArgs),
    /// Remove a bundle from the cluster
    Unload(BundleArgs),
    /// Print recent log lines of a bundle
    Logs(LogsArgs),
    /// Print bundle events as they happen
    Watch,
}

/// Flags shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Control API scheme
    #[arg(long, global = true, env = "CONDUCTR_SCHEME", default_value = "http")]
    pub scheme: String,

    /// Control API host
    #[arg(long, global = true, env = "CONDUCTR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Control API port
    #[arg(long, global = true, env = "CONDUCTR_PORT", default_value_t = 9005)]
    pub port: u16,

    /// Control API version (1 or 2)
    #[arg(
        long,
        global = true,
        env = "CONDUCTR_API_VERSION",
        default_value = "2",
        value_parser = ApiVersion::parse
    )]
    pub api_version: ApiVersion,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "CONDUCTR_TIMEOUT", default_value_t = 10)]
    pub timeout: u64,

    /// Directory used to cache downloaded bundles [default: ~/.conductr/cache]
    #[arg(long, global = true, env = "CONDUCTR_RESOLVE_CACHE_DIR")]
    pub resolve_cache_dir: Option<PathBuf>,

    /// Settings file [default: ~/.conductr/settings.yaml]
    #[arg(long, global = true, env = "CONDUCTR_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Print full bundle ids
    #[arg(long, global = true)]
    pub long_ids: bool,

    /// Return as soon as the request is accepted
    #[arg(long, global = true)]
    pub no_wait: bool,

    /// Seconds to wait for the cluster to converge
    #[arg(long, global = true, default_value_t = 60)]
    pub wait_timeout: u64,

    /// Seconds between status checks while waiting
    #[arg(
        long,
        global = true,
        default_value_t = 2,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval: u64,

    /// Debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BundleArgs {
    /// Bundle id (full or shortened)
    pub bundle: String,
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Bundle file, URI or name[:version]
    pub bundle: String,

    /// Configuration bundle file, URI or name[:version]
    pub configuration: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Bundle id (full or shortened)
    pub bundle: String,

    /// Number of instances
    #[arg(long, default_value_t = 1)]
    pub scale: u32,

    /// Run alongside the bundle with this id (API version 2 only)
    #[arg(long)]
    pub affinity: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct LogsArgs {
    /// Bundle id (full or shortened)
    pub bundle: String,

    /// Number of lines
    #[arg(short = 'n', long, default_value_t = 10)]
    pub lines: u32,

    /// Show the date as well as the time
    #[arg(long)]
    pub date: bool,

    /// Show timestamps in UTC instead of local time
    #[arg(long)]
    pub utc: bool,
}
