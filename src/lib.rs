//! korspeech - Korean speech-corpus transcript preparation
//!
//! Normalizes annotated corpus transcripts, measures their target lengths,
//! and packs samples into token-budgeted, length-bucketed batches.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod aggregate;
pub mod annotation;
pub mod batching;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod dialect;
pub mod error;
pub mod length_oracle;
pub mod normalizer;
pub mod transcript_index;

// Transcript cleanup
pub use annotation::{AnnotationParseError, ParsedLine, Segment};
pub use dialect::Dialect;
pub use normalizer::{NormalizeReport, Normalizer, Rejection};

// Datasets
pub use length_oracle::{CorpusDataset, LengthOracle};
pub use transcript_index::{TranscriptRecord, read_index, read_indexes};

// Batching
pub use batching::{
    Batch, BatchOptions, BatchPlanner, BucketBatchPlan, ConcatPlan, Split, assemble,
    assemble_with_rng,
};

// Error handling
pub use error::{KorspeechError, Result};

// Config
pub use config::{BatchingConfig, Config, CorpusConfig};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
