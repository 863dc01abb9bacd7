//! Default constants shared by dialects, the batch assembler and configuration.

/// Minimum character count of an accepted transcript.
///
/// Anything shorter after cleanup is almost always a stray noise tag or a
/// truncated utterance, and is dropped from the trainable set.
pub const MIN_TRANSCRIPT_CHARS: usize = 5;

/// Upper character bound used by dialects that cap transcript length.
pub const MAX_TRANSCRIPT_CHARS: usize = 700;

/// Default token budget of a single batch.
///
/// Must be at least the longest target length in a dataset, otherwise batch
/// assembly fails with a configuration error.
pub const MAX_TOKENS: usize = 700;

/// Number of length buckets used for the training split.
pub const TRAIN_NUM_BUCKETS: usize = 50;

/// Validation and test splits are packed without length grouping.
pub const VALID_NUM_BUCKETS: usize = 1;

/// Whether the order of training batches is reshuffled every epoch.
pub const TRAIN_SHUFFLE: bool = true;

/// Dialect used when neither the CLI nor the config file names one.
pub const DEFAULT_DIALECT: &str = "solugate";

/// Environment variable overriding `corpus.dialect`.
pub const ENV_DIALECT: &str = "KORSPEECH_DIALECT";

/// Environment variable overriding `batching.max_tokens`.
pub const ENV_MAX_TOKENS: &str = "KORSPEECH_MAX_TOKENS";

/// Environment variable overriding `batching.seed`.
pub const ENV_SEED: &str = "KORSPEECH_SEED";
