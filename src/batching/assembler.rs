//! Token-budgeted, length-bucketed batch assembly.
//!
//! Samples are grouped into equal-width length buckets, ordered inside each
//! bucket (longest first, or randomly), and then packed greedily: a batch
//! grows until the next sample would push its summed target length past the
//! token budget or its size past the optional cap.

use crate::batching::bucket::{bucket_boundaries, bucketize};
use crate::error::{KorspeechError, Result};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// A batch: dataset indices in scan order.
pub type Batch = Vec<usize>;

/// Parameters of one assembly run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Maximum summed target length of a batch.
    pub max_tokens: usize,
    pub num_buckets: usize,
    /// Randomize the order inside buckets instead of sorting longest first.
    pub shuffle: bool,
    /// Maximum number of samples per batch.
    pub batch_size_cap: Option<usize>,
}

impl BatchOptions {
    /// Assemble batches, drawing any randomness from `rng`.
    pub fn assemble<R: Rng + ?Sized>(&self, lengths: &[usize], rng: &mut R) -> Result<Vec<Batch>> {
        let max_length = self.validate(lengths)?;
        let min_length = lengths.iter().copied().min().unwrap_or(max_length);

        let boundaries = bucket_boundaries(min_length, max_length, self.num_buckets);
        let mut items: Vec<(usize, usize, usize)> = lengths
            .iter()
            .enumerate()
            .map(|(idx, &length)| (idx, length, bucketize(length, &boundaries)))
            .collect();

        if self.shuffle {
            items.shuffle(rng);
        } else {
            // Stable: equal lengths keep index order
            items.sort_by(|a, b| b.1.cmp(&a.1));
        }
        // Stable: only groups by bucket, the order above survives inside each one
        items.sort_by_key(|&(_, _, bucket)| bucket);

        let batches = pack_by_token_budget(
            items.into_iter().map(|(idx, length, _)| (idx, length)),
            self.max_tokens,
            self.batch_size_cap,
        );

        tracing::debug!(
            samples = lengths.len(),
            batches = batches.len(),
            min_length,
            max_length,
            num_buckets = self.num_buckets,
            "assembled batches"
        );

        Ok(batches)
    }

    /// Returns the longest length when the options can place every sample.
    fn validate(&self, lengths: &[usize]) -> Result<usize> {
        let max_length = lengths
            .iter()
            .copied()
            .max()
            .ok_or_else(|| KorspeechError::configuration("cannot assemble batches from no samples"))?;
        if self.num_buckets == 0 {
            return Err(KorspeechError::configuration("num_buckets must be at least 1"));
        }
        if self.batch_size_cap == Some(0) {
            return Err(KorspeechError::configuration("batch size cap must be at least 1"));
        }
        if self.max_tokens < max_length {
            return Err(KorspeechError::configuration(format!(
                "max_tokens {} is smaller than the longest sample ({})",
                self.max_tokens, max_length
            )));
        }
        Ok(max_length)
    }
}

/// Assemble batches with the thread-local random source.
///
/// `shuffle = false` is fully deterministic.
pub fn assemble(
    lengths: &[usize],
    max_tokens: usize,
    num_buckets: usize,
    shuffle: bool,
    batch_size_cap: Option<usize>,
) -> Result<Vec<Batch>> {
    BatchOptions {
        max_tokens,
        num_buckets,
        shuffle,
        batch_size_cap,
    }
    .assemble(lengths, &mut rand::thread_rng())
}

/// [`assemble`] with an injected random source.
pub fn assemble_with_rng<R: Rng + ?Sized>(
    lengths: &[usize],
    max_tokens: usize,
    num_buckets: usize,
    shuffle: bool,
    batch_size_cap: Option<usize>,
    rng: &mut R,
) -> Result<Vec<Batch>> {
    BatchOptions {
        max_tokens,
        num_buckets,
        shuffle,
        batch_size_cap,
    }
    .assemble(lengths, rng)
}

/// The batch partition of one dataset.
///
/// Built once per dataset and addressed by batch position, the way a data
/// loader's batch sampler is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketBatchPlan {
    batches: Vec<Batch>,
}

impl BucketBatchPlan {
    pub fn new<R: Rng + ?Sized>(
        dataset_len: usize,
        lengths: &[usize],
        options: &BatchOptions,
        rng: &mut R,
    ) -> Result<Self> {
        if dataset_len != lengths.len() {
            return Err(KorspeechError::configuration(format!(
                "dataset has {} samples but {} lengths were given",
                dataset_len,
                lengths.len()
            )));
        }
        Ok(Self {
            batches: options.assemble(lengths, rng)?,
        })
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&[usize]> {
        self.batches.get(index).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.batches.iter().map(Vec::as_slice)
    }

    /// Summed target length of batch `index`, or `None` when out of range.
    pub fn total_tokens(&self, index: usize, lengths: &[usize]) -> Option<usize> {
        self.get(index)
            .map(|batch| batch.iter().filter_map(|&i| lengths.get(i)).sum())
    }

    pub fn into_batches(self) -> Vec<Batch> {
        self.batches
    }
}

/// Greedy scan over `(index, length)` pairs.
///
/// A sample joins the current batch when the summed length stays within
/// `max_tokens` and the batch is below the cap. Otherwise the current batch
/// is closed and the sample starts a new one.
pub fn pack_by_token_budget<I>(items: I, max_tokens: usize, batch_size_cap: Option<usize>) -> Vec<Batch>
where
    I: IntoIterator<Item = (usize, usize)>,
{
    let mut batches = Vec::new();
    let mut current: Batch = Vec::new();
    let mut current_tokens = 0usize;

    for (idx, length) in items {
        let over_budget = current_tokens
            .checked_add(length)
            .is_none_or(|tokens| tokens > max_tokens);
        let full = batch_size_cap.is_some_and(|cap| current.len() >= cap);
        if (over_budget || full) && !current.is_empty() {
            batches.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        current.push(idx);
        current_tokens = current_tokens.saturating_add(length);
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
}
