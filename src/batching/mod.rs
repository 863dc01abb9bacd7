//! Length-bucketed batch assembly and per-split batch plans.

pub mod assembler;
pub mod bucket;
pub mod plan;

pub use assembler::{
    Batch, BatchOptions, BucketBatchPlan, assemble, assemble_with_rng, pack_by_token_budget,
};
pub use bucket::{bucket_boundaries, bucketize};
pub use plan::{BatchPlanner, BatchRef, ConcatPlan, Split};
