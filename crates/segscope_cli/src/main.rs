//! Segscope CLI
//!
//! Command-line tools for importing into and inspecting segscope stores.
//!
//! # Commands
//!
//! - `import` - Import key-value pairs from JSON
//! - `dump` - Dump live data, key versions or footers
//! - `stats` - Footer, fragmentation, diagnostic and size statistics
//! - `compact` - Compact a store into a single segment

mod commands;

use clap::{Args, Parser, Subcommand};
use segscope_core::{DumpOptions, OutputFormat, TraversalMode};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Segscope command-line store tools.
#[derive(Parser)]
#[command(name = "segscope")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import key-value pairs given as [{"k":"key0","v":"val0"}, ...]
    Import {
        /// Store directory, created if missing
        dir: PathBuf,

        /// Items per batch (0 puts everything in one batch)
        #[arg(short, long, default_value = "0")]
        batchsize: usize,

        /// Read the payload from this file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Payload given on the command line
        #[arg(short, long)]
        json: Option<String>,

        /// Read the payload from stdin
        #[arg(long)]
        stdin: bool,

        /// Give up waiting for durability after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Dump live key-values, key versions or footers
    Dump(DumpArgs),

    /// Show statistics
    Stats {
        #[command(subcommand)]
        command: StatsCommands,
    },

    /// Compact stores into a single segment
    Compact {
        /// Store directories
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },

    /// Show version information
    Version,
}

#[derive(Args)]
#[command(args_conflicts_with_subcommands = true)]
struct DumpArgs {
    /// Store directories
    dirs: Vec<PathBuf>,

    /// Dump keys without values
    #[arg(long)]
    keys_only: bool,

    /// Only dump keys with this prefix
    #[arg(long)]
    key_prefix: Option<String>,

    /// Dump keys and values as hex
    #[arg(long)]
    hex: bool,

    #[command(subcommand)]
    command: Option<DumpCommands>,
}

#[derive(Subcommand)]
enum DumpCommands {
    /// Dump the value of one key
    Key {
        /// The key
        key: String,

        /// Store directories
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Also dump older footers holding the key
        #[arg(short, long)]
        all_versions: bool,

        /// Dump the key and values as hex
        #[arg(long)]
        hex: bool,
    },

    /// Dump footers as JSON
    Footer {
        /// Store directories
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Dump every footer, newest first
        #[arg(short, long)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum StatsCommands {
    /// Per-footer segment and operation totals
    Footer {
        /// Store directories
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Visit every footer, newest first
        #[arg(short, long)]
        all: bool,

        /// Output JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Fragmentation estimate
    Fragmentation {
        /// Store directories
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Output JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Latest footer totals merged with store counters
    Diag {
        /// Store directories
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Output JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Key-size and value-size histograms
    Hist {
        /// Store directories
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Only count keys with this prefix
        #[arg(long)]
        key_prefix: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr, stdout carries command output
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Import {
            dir,
            batchsize,
            file,
            json,
            stdin,
            timeout_secs,
        } => {
            let sources = commands::import::sources(stdin, json, file)?;
            let timeout = timeout_secs.map(Duration::from_secs);
            commands::import::run(&dir, &sources, batchsize, timeout)?;
        }
        Commands::Dump(args) => match args.command {
            Some(DumpCommands::Key {
                key,
                dirs,
                all_versions,
                hex,
            }) => {
                let mode = TraversalMode::from_all(all_versions);
                commands::dump::run_key(&key, &dirs, mode, hex)?;
            }
            Some(DumpCommands::Footer { dirs, all }) => {
                commands::dump::run_footer(&dirs, TraversalMode::from_all(all))?;
            }
            None => {
                if args.dirs.is_empty() {
                    return Err("At least one store directory required for dump".into());
                }
                let options = DumpOptions {
                    keys_only: args.keys_only,
                    key_prefix: args.key_prefix,
                    hex: args.hex,
                };
                commands::dump::run_entries(&args.dirs, &options)?;
            }
        },
        Commands::Stats { command } => match command {
            StatsCommands::Footer { dirs, all, json } => {
                let mode = TraversalMode::from_all(all);
                commands::stats::run_footer(&dirs, mode, OutputFormat::from_json_flag(json))?;
            }
            StatsCommands::Fragmentation { dirs, json } => {
                commands::stats::run_fragmentation(&dirs, OutputFormat::from_json_flag(json))?;
            }
            StatsCommands::Diag { dirs, json } => {
                commands::stats::run_diag(&dirs, OutputFormat::from_json_flag(json))?;
            }
            StatsCommands::Hist { dirs, key_prefix } => {
                let options = DumpOptions {
                    key_prefix,
                    ..DumpOptions::default()
                };
                commands::stats::run_hist(&dirs, &options)?;
            }
        },
        Commands::Compact { dirs } => {
            commands::compact::run(&dirs)?;
        }
        Commands::Version => {
            println!("{}", commands::version::banner());
        }
    }

    Ok(())
}
