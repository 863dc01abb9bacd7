//! Train/valid batch plans over several datasets.
//!
//! Each split holds one or more [`CorpusDataset`]s. Every dataset gets its own
//! [`BucketBatchPlan`]; a [`ConcatPlan`] strings them together into one
//! addressable sequence of batches, the unit a training loop iterates.

use crate::batching::assembler::{BatchOptions, BucketBatchPlan};
use crate::config::BatchingConfig;
use crate::defaults::VALID_NUM_BUCKETS;
use crate::error::Result;
use crate::length_oracle::CorpusDataset;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Valid,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => write!(f, "train"),
            Split::Valid => write!(f, "valid"),
        }
    }
}

impl BatchingConfig {
    /// Assembly options for `split`.
    ///
    /// Both splits keep the longest-first order inside buckets; only the
    /// bucket count differs.
    pub fn options(&self, split: Split) -> BatchOptions {
        let num_buckets = match split {
            Split::Train => self.train_num_buckets,
            Split::Valid => VALID_NUM_BUCKETS,
        };
        BatchOptions {
            max_tokens: self.max_tokens,
            num_buckets,
            shuffle: false,
            batch_size_cap: self.batch_size,
        }
    }

    /// Whether batch order is reshuffled every epoch for `split`.
    pub fn shuffles_batches(&self, split: Split) -> bool {
        match split {
            Split::Train => self.train_shuffle,
            Split::Valid => false,
        }
    }

    /// Random source for planning and epoch ordering.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// One batch of a [`ConcatPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRef<'a> {
    /// Position of the dataset within its split.
    pub dataset: usize,
    /// Sample indices into that dataset.
    pub samples: &'a [usize],
}

/// Per-dataset plans concatenated into one sequence.
#[derive(Debug, Clone, Default)]
pub struct ConcatPlan {
    plans: Vec<(usize, BucketBatchPlan)>,
}

impl ConcatPlan {
    pub fn push(&mut self, dataset: usize, plan: BucketBatchPlan) {
        self.plans.push((dataset, plan));
    }

    pub fn len(&self) -> usize {
        self.plans.iter().map(|(_, plan)| plan.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, mut position: usize) -> Option<BatchRef<'_>> {
        for (dataset, plan) in &self.plans {
            if position < plan.len() {
                return plan.get(position).map(|samples| BatchRef {
                    dataset: *dataset,
                    samples,
                });
            }
            position -= plan.len();
        }
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = BatchRef<'_>> {
        self.plans.iter().flat_map(|(dataset, plan)| {
            plan.iter().map(move |samples| BatchRef {
                dataset: *dataset,
                samples,
            })
        })
    }

    /// Batch positions in the order one epoch visits them.
    pub fn epoch_order<R: Rng + ?Sized>(&self, shuffle: bool, rng: &mut R) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        if shuffle {
            order.shuffle(rng);
        }
        order
    }
}

/// Builds batch plans for the train and valid splits.
///
/// Target lengths are computed once per split and reused by every later plan.
pub struct BatchPlanner {
    config: BatchingConfig,
    train: Vec<CorpusDataset>,
    valid: Vec<CorpusDataset>,
    train_lengths: Option<Vec<Vec<usize>>>,
    valid_lengths: Option<Vec<Vec<usize>>>,
}

impl BatchPlanner {
    pub fn new(config: BatchingConfig) -> Self {
        Self {
            config,
            train: Vec::new(),
            valid: Vec::new(),
            train_lengths: None,
            valid_lengths: None,
        }
    }

    pub fn config(&self) -> &BatchingConfig {
        &self.config
    }

    pub fn add_dataset(&mut self, split: Split, dataset: CorpusDataset) {
        let (datasets, lengths) = self.split_mut(split);
        datasets.push(dataset);
        *lengths = None;
    }

    pub fn datasets(&self, split: Split) -> &[CorpusDataset] {
        match split {
            Split::Train => &self.train,
            Split::Valid => &self.valid,
        }
    }

    /// Target lengths of every dataset in `split`, computed on first use.
    pub fn lengths(&mut self, split: Split) -> Result<&[Vec<usize>]> {
        let (datasets, memo) = self.split_mut(split);
        if memo.is_none() {
            let lengths = datasets
                .iter()
                .map(CorpusDataset::target_lengths)
                .collect::<Result<Vec<_>>>()?;
            tracing::debug!(%split, datasets = lengths.len(), "computed target lengths");
            *memo = Some(lengths);
        }
        Ok(memo.as_deref().unwrap_or_default())
    }

    /// Plan the batches of `split` with the configured options.
    pub fn plan(&mut self, split: Split) -> Result<ConcatPlan> {
        let options = self.config.options(split);
        self.plan_with(split, &options)
    }

    /// Plan the batches of `split` with explicit assembly options.
    ///
    /// Empty datasets contribute no batches.
    pub fn plan_with(&mut self, split: Split, options: &BatchOptions) -> Result<ConcatPlan> {
        let mut rng = self.config.rng();
        let dataset_lens: Vec<usize> = self.datasets(split).iter().map(CorpusDataset::len).collect();
        let lengths = self.lengths(split)?;

        let mut concat = ConcatPlan::default();
        for (dataset, (len, lengths)) in dataset_lens.into_iter().zip(lengths).enumerate() {
            if len == 0 {
                tracing::warn!(%split, dataset, "skipping empty dataset");
                continue;
            }
            concat.push(dataset, BucketBatchPlan::new(len, lengths, options, &mut rng)?);
        }

        tracing::info!(
            %split,
            batches = concat.len(),
            max_tokens = options.max_tokens,
            num_buckets = options.num_buckets,
            "planned batches"
        );

        Ok(concat)
    }

    fn split_mut(&mut self, split: Split) -> (&mut Vec<CorpusDataset>, &mut Option<Vec<Vec<usize>>>) {
        match split {
            Split::Train => (&mut self.train, &mut self.train_lengths),
            Split::Valid => (&mut self.valid, &mut self.valid_lengths),
        }
    }
}
