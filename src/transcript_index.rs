//! Reading transcript index files.
//!
//! An index file maps sample identifiers to raw (not yet normalized)
//! transcripts, one record per line. The layout comes from the dialect's
//! [`TranscriptFormat`].

use crate::dialect::TranscriptFormat;
use crate::error::{KorspeechError, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One raw record from an index file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptRecord {
    pub sample_id: String,
    pub text: String,
    /// 1-based line number in the source file.
    pub line: usize,
}

impl TranscriptFormat {
    /// Split one index line into `(sample_id, raw_transcript)`.
    ///
    /// Blank lines yield `Ok(None)`. `Err` carries a human-readable reason.
    pub fn split_record(&self, line: &str) -> std::result::Result<Option<(String, String)>, String> {
        if line.trim().is_empty() {
            return Ok(None);
        }

        match self {
            TranscriptFormat::Delimited { separator, id } => {
                let (id_field, text) = line
                    .split_once(separator.as_str())
                    .ok_or_else(|| format!("missing separator {:?}", separator))?;
                Ok(Some((id.extract(id_field.trim()), text.trim().to_string())))
            }
            TranscriptFormat::JsonLines {
                id_key,
                text_path,
                unescape,
            } => {
                let value: Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
                let sample_id = match value.get(id_key) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    _ => return Err(format!("missing id key {:?}", id_key)),
                };
                let text = lookup_path(&value, text_path)
                    .and_then(Value::as_str)
                    .ok_or_else(|| format!("missing text path {:?}", text_path))?;
                let text = if *unescape {
                    unescape_backslashes(text)
                } else {
                    text.to_string()
                };
                Ok(Some((sample_id, text.trim().to_string())))
            }
        }
    }
}

/// Follow a dot-separated key path through nested JSON objects.
fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, key| current.get(key))
}

/// Drop a backslash and keep the character it escapes.
pub fn unescape_backslashes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Read every record of one index file.
pub fn read_index(path: &Path, format: &TranscriptFormat) -> Result<Vec<TranscriptRecord>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = i + 1;
        match format.split_record(&line) {
            Ok(Some((sample_id, text))) => records.push(TranscriptRecord {
                sample_id,
                text,
                line: line_no,
            }),
            Ok(None) => {}
            Err(message) => {
                return Err(KorspeechError::InvalidRecord {
                    path: path.display().to_string(),
                    line: line_no,
                    message,
                });
            }
        }
    }

    if records.is_empty() {
        tracing::warn!(path = %path.display(), "transcript index has no records");
    }

    Ok(records)
}

/// Read and concatenate several index files, in order.
pub fn read_indexes<P: AsRef<Path>>(
    paths: &[P],
    format: &TranscriptFormat,
) -> Result<Vec<TranscriptRecord>> {
    let mut records = Vec::new();
    for path in paths {
        records.extend(read_index(path.as_ref(), format)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Dialect, IdScheme};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_split_solugate_record() {
        let format = Dialect::solugate().format;
        let record = format
            .split_record("/data/a/b/c/d/e/dialog_01/dialog_00012.wav :: (지금)/(시방) 가자")
            .unwrap();
        assert_eq!(
            record,
            Some((
                "dialog_00012".to_string(),
                "(지금)/(시방) 가자".to_string()
            ))
        );
    }

    #[test]
    fn test_split_kspon_record() {
        let format = Dialect::kspon().format;
        let record = format
            .split_record("KsponSpeech_01/KsponSpeech_0001/KsponSpeech_000001.pcm :: 아 몰라 \n")
            .unwrap();
        assert_eq!(
            record,
            Some(("000001".to_string(), "아 몰라".to_string()))
        );
    }

    #[test]
    fn test_split_kspon_compact_separator() {
        let format = Dialect::kspon().format;
        let record = format
            .split_record("KsponSpeech_000002.pcm::그래서 뭐")
            .unwrap();
        assert_eq!(record, Some(("000002".to_string(), "그래서 뭐".to_string())));
    }

    #[test]
    fn test_split_space_separated_record() {
        let format = TranscriptFormat::Delimited {
            separator: " ".to_string(),
            id: IdScheme::Verbatim,
        };
        let record = format.split_record("utt-001 안녕 하세요").unwrap();
        assert_eq!(
            record,
            Some(("utt-001".to_string(), "안녕 하세요".to_string()))
        );
    }

    #[test]
    fn test_missing_separator_is_error() {
        let format = Dialect::solugate().format;
        let err = format.split_record("no separator here").unwrap_err();
        assert!(err.contains("missing separator"));
    }

    #[test]
    fn test_blank_line_skipped() {
        let format = Dialect::solugate().format;
        assert_eq!(format.split_record("   ").unwrap(), None);
    }

    #[test]
    fn test_split_json_record_nested_path() {
        let format = TranscriptFormat::JsonLines {
            id_key: "id".to_string(),
            text_path: "speech.text".to_string(),
            unescape: true,
        };
        let line = r#"{"id": "spk1_003", "speech": {"text": "그게 \\(정말\\) 맞아요"}}"#;
        let record = format.split_record(line).unwrap();
        assert_eq!(
            record,
            Some(("spk1_003".to_string(), "그게 (정말) 맞아요".to_string()))
        );
    }

    #[test]
    fn test_split_json_numeric_id() {
        let format = Dialect::hallym().format;
        let record = format
            .split_record(r#"{"id": 42, "Transcript": " 천천히 말해요 "}"#)
            .unwrap();
        assert_eq!(
            record,
            Some(("42".to_string(), "천천히 말해요".to_string()))
        );
    }

    #[test]
    fn test_split_json_missing_text() {
        let format = Dialect::hallym().format;
        let err = format.split_record(r#"{"id": "a"}"#).unwrap_err();
        assert!(err.contains("Transcript"));
    }

    #[test]
    fn test_unescape_backslashes() {
        assert_eq!(unescape_backslashes(r"a\/b\\c"), r"a/b\c");
        assert_eq!(unescape_backslashes(r"trailing\"), "trailing");
    }

    #[test]
    fn test_read_index_reports_line_numbers() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a.wav :: 첫 번째 문장").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "broken line").unwrap();

        let err = read_index(file.path(), &Dialect::solugate().format).unwrap_err();
        match err {
            KorspeechError::InvalidRecord { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_indexes_concatenates_in_order() {
        let mut first = NamedTempFile::new().unwrap();
        writeln!(first, "a.wav :: 첫 번째 문장").unwrap();
        let mut second = NamedTempFile::new().unwrap();
        writeln!(second, "b.wav :: 두 번째 문장").unwrap();

        let records = read_indexes(
            &[first.path(), second.path()],
            &Dialect::solugate().format,
        )
        .unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.sample_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(records[1].line, 1);
    }
}
