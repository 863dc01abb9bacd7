//! Tokenizer training corpus.
//!
//! Collects the normalized transcripts of a dataset into one newline-joined
//! text file, the input a subword tokenizer is trained on.

use crate::error::Result;
use crate::length_oracle::CorpusDataset;
use std::fs;
use std::path::Path;

/// Default file name of the aggregated corpus.
pub const AGGREGATED_FILE_NAME: &str = "aggregated_scripts.txt";

/// Every accepted normalized transcript of `dataset`, in sample order.
pub fn aggregate_transcripts(dataset: &CorpusDataset) -> Result<Vec<String>> {
    (0..dataset.len())
        .map(|index| dataset.transcript(index))
        .collect()
}

/// Aggregate several datasets in order.
pub fn aggregate_all<'a, I>(datasets: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = &'a CorpusDataset>,
{
    let mut transcripts = Vec::new();
    for dataset in datasets {
        transcripts.extend(aggregate_transcripts(dataset)?);
    }
    Ok(transcripts)
}

/// Write transcripts joined by `\n`, without a trailing newline.
pub fn write_aggregated(path: &Path, transcripts: &[String]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, transcripts.join("\n"))?;
    tracing::info!(path = %path.display(), transcripts = transcripts.len(), "wrote aggregated transcripts");
    Ok(())
}
