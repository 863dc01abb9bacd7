//! Per-dataset transcript lengths.
//!
//! A [`CorpusDataset`] is the handle a training run builds for one corpus
//! split: its dialect, its index files and the ordered list of sample ids. The
//! [`LengthOracle`] it owns maps each sample id to the character length of its
//! normalized transcript, which is the target length the batch assembler packs.
//!
//! The oracle reads the index files at most once per handle. Caches are never
//! shared between handles.

use crate::dialect::Dialect;
use crate::error::{KorspeechError, Result};
use crate::normalizer::Normalizer;
use crate::transcript_index::{TranscriptRecord, read_indexes};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A normalized transcript and its target length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTranscript {
    pub text: String,
    pub length: usize,
}

type TranscriptTable = HashMap<String, CachedTranscript>;

/// Lazily-populated `sample id → normalized transcript` table.
pub struct LengthOracle {
    dialect: Dialect,
    index_files: Vec<PathBuf>,
    table: Mutex<Option<Arc<TranscriptTable>>>,
    populations: AtomicUsize,
}

impl LengthOracle {
    /// Create an oracle that reads `index_files` on first use.
    pub fn new(dialect: Dialect, index_files: Vec<PathBuf>) -> Self {
        Self {
            dialect,
            index_files,
            table: Mutex::new(None),
            populations: AtomicUsize::new(0),
        }
    }

    /// Create an oracle whose table was already built from `records`.
    fn primed(dialect: Dialect, index_files: Vec<PathBuf>, table: TranscriptTable) -> Self {
        Self {
            dialect,
            index_files,
            table: Mutex::new(Some(Arc::new(table))),
            populations: AtomicUsize::new(1),
        }
    }

    /// How many times the index files have been read and normalized.
    pub fn populations(&self) -> usize {
        self.populations.load(Ordering::Relaxed)
    }

    /// The normalized transcript for `sample_id`.
    pub fn transcript(&self, sample_id: &str) -> Result<CachedTranscript> {
        self.table()?
            .get(sample_id)
            .cloned()
            .ok_or_else(|| KorspeechError::TranscriptNotFound {
                sample_id: sample_id.to_string(),
            })
    }

    /// Target length of one sample.
    pub fn target_length(&self, sample_id: &str) -> Result<usize> {
        self.table()?
            .get(sample_id)
            .map(|entry| entry.length)
            .ok_or_else(|| KorspeechError::TranscriptNotFound {
                sample_id: sample_id.to_string(),
            })
    }

    /// Target lengths aligned one-to-one with `sample_ids`.
    ///
    /// Any id without an accepted transcript fails the whole call: it means
    /// the sample enumeration and the transcript index disagree.
    pub fn target_lengths<S: AsRef<str>>(&self, sample_ids: &[S]) -> Result<Vec<usize>> {
        if !self.dialect.length_supported {
            return Err(KorspeechError::Unsupported {
                dialect: self.dialect.name.clone(),
                operation: "target lengths".to_string(),
            });
        }

        let table = self.table()?;
        sample_ids
            .iter()
            .map(|id| {
                let id = id.as_ref();
                table
                    .get(id)
                    .map(|entry| entry.length)
                    .ok_or_else(|| KorspeechError::TranscriptNotFound {
                        sample_id: id.to_string(),
                    })
            })
            .collect()
    }

    fn table(&self) -> Result<Arc<TranscriptTable>> {
        let mut guard = self
            .table
            .lock()
            .map_err(|_| KorspeechError::Other("transcript cache lock poisoned".to_string()))?;

        if let Some(table) = guard.as_ref() {
            return Ok(Arc::clone(table));
        }

        let records = read_indexes(&self.index_files, &self.dialect.format)?;
        let (table, _) = build_table(&self.dialect, records);
        let table = Arc::new(table);
        *guard = Some(Arc::clone(&table));
        self.populations.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            dialect = %self.dialect.name,
            files = self.index_files.len(),
            transcripts = table.len(),
            "built transcript length table"
        );

        Ok(table)
    }
}

/// Normalize every record. Returns the table of accepted transcripts and the
/// accepted sample ids in first-seen order.
fn build_table(dialect: &Dialect, records: Vec<TranscriptRecord>) -> (TranscriptTable, Vec<String>) {
    let mut normalizer = Normalizer::new(dialect.clone());
    let mut table = TranscriptTable::with_capacity(records.len());
    let mut order = Vec::with_capacity(records.len());
    let mut seen = HashSet::with_capacity(records.len());
    let mut rejected = 0usize;

    for record in records {
        match normalizer.normalize(&record.text) {
            Ok(text) => {
                let length = text.chars().count();
                if seen.insert(record.sample_id.clone()) {
                    order.push(record.sample_id.clone());
                }
                // Later records for the same id win
                table.insert(record.sample_id, CachedTranscript { text, length });
            }
            Err(rejection) => {
                rejected += 1;
                tracing::debug!(
                    sample_id = %record.sample_id,
                    line = record.line,
                    %rejection,
                    "excluding sample"
                );
            }
        }
    }

    if rejected > 0 {
        tracing::debug!(dialect = %dialect.name, rejected, "rejected transcripts");
    }

    (table, order)
}

/// Dataset handle: dialect, index files and the ordered sample ids.
pub struct CorpusDataset {
    dialect: Dialect,
    sample_ids: Vec<String>,
    oracle: LengthOracle,
}

impl CorpusDataset {
    /// Enumerate every sample whose transcript normalizes, in index order.
    ///
    /// The transcripts are normalized once here and the oracle is primed with
    /// the result, so the target lengths always describe the exact strings
    /// that made a sample eligible.
    pub fn from_index_files<P: AsRef<Path>>(dialect: Dialect, index_files: &[P]) -> Result<Self> {
        let index_files: Vec<PathBuf> = index_files.iter().map(|p| p.as_ref().to_path_buf()).collect();
        let records = read_indexes(&index_files, &dialect.format)?;
        let total = records.len();
        let (table, sample_ids) = build_table(&dialect, records);

        tracing::info!(
            dialect = %dialect.name,
            records = total,
            samples = sample_ids.len(),
            "loaded corpus dataset"
        );

        let oracle = LengthOracle::primed(dialect.clone(), index_files, table);
        Ok(Self {
            dialect,
            sample_ids,
            oracle,
        })
    }

    /// Use an externally enumerated id list (e.g. audio files found on disk).
    /// The index files are read lazily on the first length or transcript lookup.
    pub fn with_sample_ids<P: AsRef<Path>>(
        dialect: Dialect,
        index_files: &[P],
        sample_ids: Vec<String>,
    ) -> Self {
        let index_files = index_files.iter().map(|p| p.as_ref().to_path_buf()).collect();
        let oracle = LengthOracle::new(dialect.clone(), index_files);
        Self {
            dialect,
            sample_ids,
            oracle,
        }
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn len(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_ids.is_empty()
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn sample_id(&self, index: usize) -> Option<&str> {
        self.sample_ids.get(index).map(String::as_str)
    }

    pub fn oracle(&self) -> &LengthOracle {
        &self.oracle
    }

    /// Normalized transcript of the `index`-th sample.
    pub fn transcript(&self, index: usize) -> Result<String> {
        let sample_id = self
            .sample_id(index)
            .ok_or_else(|| KorspeechError::SampleOutOfRange {
                index,
                len: self.len(),
            })?;
        Ok(self.oracle.transcript(sample_id)?.text)
    }

    /// Target lengths aligned with [`sample_ids`](Self::sample_ids).
    pub fn target_lengths(&self) -> Result<Vec<usize>> {
        self.oracle.target_lengths(&self.sample_ids)
    }
}
