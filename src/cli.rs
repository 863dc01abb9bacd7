//! Command-line interface for korspeech
//!
//! Provides argument parsing using clap derive macros.

use crate::aggregate::AGGREGATED_FILE_NAME;
use crate::batching::Split;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Korean speech-corpus transcript preparation
#[derive(Parser, Debug)]
#[command(
    name = "korspeech",
    version,
    about = "Normalize Korean speech-corpus transcripts and plan token-budgeted batches"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Normalize transcripts and print the accepted ones
    Normalize {
        /// Corpus dialect (default: corpus.dialect from config)
        #[arg(long, short = 'd', value_name = "NAME")]
        dialect: Option<String>,

        /// Index file to read (default: stdin)
        #[arg(long, short = 'i', value_name = "FILE")]
        input: Option<PathBuf>,

        /// Treat every input line as a bare transcript instead of an index record
        #[arg(long)]
        raw: bool,

        /// Seed for dialects that flip a coin on numeral dual forms
        #[arg(long, value_name = "N")]
        seed: Option<u64>,

        /// Print a per-reason rejection summary to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Write every accepted transcript to one file for tokenizer training
    Aggregate {
        /// Corpus dialect (default: corpus.dialect from config)
        #[arg(long, short = 'd', value_name = "NAME")]
        dialect: Option<String>,

        /// Output file
        #[arg(long, short = 'o', value_name = "FILE", default_value = AGGREGATED_FILE_NAME)]
        output: PathBuf,

        /// Seed for dialects that flip a coin on numeral dual forms
        #[arg(long, value_name = "N")]
        seed: Option<u64>,

        /// Transcript index files
        #[arg(required = true, value_name = "INDEX")]
        indexes: Vec<PathBuf>,
    },

    /// Assemble token-budgeted batches and print the plan
    Batches {
        /// Corpus dialect (default: corpus.dialect from config)
        #[arg(long, short = 'd', value_name = "NAME")]
        dialect: Option<String>,

        /// Which split's rules to apply
        #[arg(long, short = 's', value_enum, default_value = "train")]
        split: Split,

        /// Token budget per batch (default: batching.max_tokens)
        #[arg(long, value_name = "N")]
        max_tokens: Option<usize>,

        /// Number of length buckets (default: per split)
        #[arg(long, value_name = "N")]
        num_buckets: Option<usize>,

        /// Maximum samples per batch
        #[arg(long, short = 'b', value_name = "N")]
        batch_size: Option<usize>,

        /// Randomize the order inside buckets
        #[arg(long)]
        shuffle: bool,

        /// Seed for shuffling (default: batching.seed)
        #[arg(long, value_name = "N")]
        seed: Option<u64>,

        /// Print batches as JSON
        #[arg(long)]
        json: bool,

        /// Transcript index files (default: the split's index files from config)
        #[arg(value_name = "INDEX")]
        indexes: Vec<PathBuf>,
    },

    /// List built-in and configured dialects
    Dialects,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the configuration file path
    Path,
    /// Print the effective configuration as TOML
    Show,
}
