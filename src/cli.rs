//! Command-line interface for voxparse
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Voice command router over a partitioned log
#[derive(Parser, Debug)]
#[command(
    name = "voxparse",
    version,
    about = "Route voice commands: recognize, gate on confidence, translate, deliver"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: per-record routing, -vv: everything)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log directory (overrides transport.log_dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

/// Parse a duration such as `500ms`, `2s` or a bare number of seconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the router until Ctrl+C
    Run {
        /// Create the log directory and any missing topics first
        #[arg(long)]
        create_topics: bool,
    },

    /// Manage topics of the log
    Topics {
        #[command(subcommand)]
        action: TopicsAction,
    },

    /// Append voice commands from a JSON array file to the input topic
    Produce {
        /// File holding `[{"id": .., "audio": <base64>, "audioCodec": .., "language": ..}, ...]`
        file: PathBuf,

        /// Target topic (default: topics.input)
        #[arg(long, value_name = "TOPIC")]
        topic: Option<String>,
    },

    /// Print records of the output topics
    Consume {
        /// Topic to read; repeatable (default: recognized and unrecognized topics)
        #[arg(long = "topic", value_name = "TOPIC")]
        topics: Vec<String>,

        /// Keep waiting for new records
        #[arg(short, long)]
        follow: bool,

        /// Stop after this long without new records. Examples: 500ms, 2s
        #[arg(long, value_name = "DURATION", default_value = "1s", value_parser = parse_duration)]
        idle: Duration,

        /// Consumer group used to position the readers
        #[arg(long, value_name = "GROUP", default_value = "voxparse-console")]
        group: String,

        /// Commit what was read so the next run continues after it
        #[arg(long)]
        commit: bool,

        /// Print raw JSON values instead of a summary line
        #[arg(long)]
        json: bool,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Topic management actions
#[derive(Subcommand, Debug)]
pub enum TopicsAction {
    /// Create the input, output and dead-letter topics
    Create {
        /// Partition count (default: transport.partitions)
        #[arg(long, value_name = "N")]
        partitions: Option<u32>,
    },
    /// Show the configured topics and their partition counts
    List,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}
