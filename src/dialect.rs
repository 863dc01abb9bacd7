//! Corpus dialect descriptors.
//!
//! Each supported corpus differs only in how its transcript index is laid out
//! and in a handful of normalization rules. A [`Dialect`] captures those
//! differences as data so one normalizer serves every corpus. Built-in presets
//! cover the known corpora; custom dialects can be declared in the config file.

use crate::defaults::{MAX_TRANSCRIPT_CHARS, MIN_TRANSCRIPT_CHARS};
use serde::{Deserialize, Serialize};

/// How a sample identifier is derived from the id field of an index record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "scheme", rename_all = "kebab-case")]
pub enum IdScheme {
    /// Use the field as-is.
    #[default]
    Verbatim,
    /// Last path component, cut at its first `.`.
    FileStem,
    /// File stem, then the part after the last `delimiter`.
    StemSuffix { delimiter: char },
}

impl IdScheme {
    pub fn extract(&self, field: &str) -> String {
        match self {
            IdScheme::Verbatim => field.to_string(),
            IdScheme::FileStem => file_stem(field).to_string(),
            IdScheme::StemSuffix { delimiter } => {
                let stem = file_stem(field);
                stem.rsplit(*delimiter).next().unwrap_or(stem).to_string()
            }
        }
    }
}

fn file_stem(field: &str) -> &str {
    let name = field.rsplit(['/', '\\']).next().unwrap_or(field);
    name.split('.').next().unwrap_or(name)
}

/// On-disk layout of a transcript index file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TranscriptFormat {
    /// `<id><separator><transcript>` per line.
    Delimited {
        separator: String,
        #[serde(default)]
        id: IdScheme,
    },
    /// One JSON object per line.
    JsonLines {
        id_key: String,
        /// Dot-separated key path to the transcript string, e.g. `"Transcript"`.
        text_path: String,
        /// Drop backslash escapes from the transcript before normalizing.
        #[serde(default)]
        unescape: bool,
    },
}

/// Whether the digit rule for dual forms is always honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NumeralGate {
    /// Deterministic: a digit-bearing first form is always replaced.
    #[default]
    Always,
    /// The replacement only happens when a fair coin lands true. When it
    /// lands false the digit-bearing form is kept, and the line is later
    /// rejected by the residual-digit gate. A fixed `seed` makes runs
    /// reproducible.
    CoinFlip {
        #[serde(default)]
        seed: Option<u64>,
    },
}

/// Which half of a `(A)/(B)` pair survives normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum DualFormPolicy {
    /// Keep `B` when `A` contains a digit, otherwise keep `A`.
    DigitAware {
        #[serde(default)]
        gate: NumeralGate,
    },
    /// Always keep `A`.
    FirstSegment,
}

/// What happens to a parenthesized group that is not part of a dual form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GroupPolicy {
    /// Leave the group in place; the residual-parenthesis gate rejects the line.
    #[default]
    Keep,
    /// Remove the group, markup and inner text alike.
    Strip,
    /// Remove the markup and a leading `TAG:` prefix, keeping the remainder.
    TagStrip,
}

/// Corpus-specific noise markers removed after annotation resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NoiseTable {
    /// Single characters deleted wherever they occur.
    pub chars: String,
    /// Marker tokens (e.g. `b/` for breath) stripped from the start of words.
    pub tokens: Vec<String>,
}

impl NoiseTable {
    pub fn chars(chars: &str) -> Self {
        Self {
            chars: chars.to_string(),
            tokens: Vec::new(),
        }
    }

    pub fn with_tokens(mut self, tokens: &[&str]) -> Self {
        self.tokens = tokens.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// Complete normalization and index-reading rules for one corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialect {
    #[serde(default)]
    pub name: String,
    pub format: TranscriptFormat,
    pub dual_form: DualFormPolicy,
    #[serde(default)]
    pub groups: GroupPolicy,
    #[serde(default)]
    pub noise: NoiseTable,
    /// Reject lines that still contain numerals after dual-form resolution.
    #[serde(default = "default_true")]
    pub reject_digits: bool,
    /// Reject lines whose `(` count is odd, i.e. that cannot consist of
    /// dual-form pairs only.
    #[serde(default = "default_true")]
    pub require_even_groups: bool,
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default)]
    pub max_chars: Option<usize>,
    /// Whether target lengths can be computed for datasets of this dialect.
    #[serde(default = "default_true")]
    pub length_supported: bool,
}

fn default_true() -> bool {
    true
}

fn default_min_chars() -> usize {
    MIN_TRANSCRIPT_CHARS
}

/// Names of the built-in presets, in display order.
pub const BUILTIN_DIALECTS: &[&str] = &["solugate", "kspon", "diquest", "hallym"];

impl Dialect {
    /// Look up a built-in preset by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "solugate" => Some(Self::solugate()),
            "kspon" => Some(Self::kspon()),
            "diquest" => Some(Self::diquest()),
            "hallym" => Some(Self::hallym()),
            _ => None,
        }
    }

    pub fn builtin_names() -> &'static [&'static str] {
        BUILTIN_DIALECTS
    }

    /// Solugate conversational speech: `path :: transcript` script files.
    pub fn solugate() -> Self {
        Self {
            name: "solugate".to_string(),
            format: TranscriptFormat::Delimited {
                separator: " :: ".to_string(),
                id: IdScheme::FileStem,
            },
            dual_form: DualFormPolicy::DigitAware {
                gate: NumeralGate::Always,
            },
            groups: GroupPolicy::Keep,
            noise: NoiseTable::chars("*+/blon.?"),
            reject_digits: true,
            require_even_groups: true,
            min_chars: MIN_TRANSCRIPT_CHARS,
            max_chars: None,
            length_supported: true,
        }
    }

    /// KsponSpeech-style `.trn` scripts: `path::transcript`, id is the numeric
    /// suffix of the file stem.
    pub fn kspon() -> Self {
        Self {
            name: "kspon".to_string(),
            format: TranscriptFormat::Delimited {
                separator: "::".to_string(),
                id: IdScheme::StemSuffix { delimiter: '_' },
            },
            dual_form: DualFormPolicy::DigitAware {
                gate: NumeralGate::CoinFlip { seed: None },
            },
            groups: GroupPolicy::Keep,
            noise: NoiseTable::chars("*+/").with_tokens(&["b/", "l/", "o/", "n/", "u/"]),
            reject_digits: true,
            require_even_groups: true,
            min_chars: MIN_TRANSCRIPT_CHARS,
            max_chars: Some(MAX_TRANSCRIPT_CHARS),
            length_supported: true,
        }
    }

    /// DiQuest read speech: `id transcript`, with `(TAG:text)` noise tags.
    pub fn diquest() -> Self {
        Self {
            name: "diquest".to_string(),
            format: TranscriptFormat::Delimited {
                separator: " ".to_string(),
                id: IdScheme::Verbatim,
            },
            dual_form: DualFormPolicy::DigitAware {
                gate: NumeralGate::Always,
            },
            groups: GroupPolicy::TagStrip,
            noise: NoiseTable::chars("*FNOPS:"),
            reject_digits: true,
            require_even_groups: false,
            min_chars: MIN_TRANSCRIPT_CHARS,
            max_chars: None,
            length_supported: true,
        }
    }

    /// Hallym dysarthric speech: JSON label records with a `Transcript` field.
    pub fn hallym() -> Self {
        Self {
            name: "hallym".to_string(),
            format: TranscriptFormat::JsonLines {
                id_key: "id".to_string(),
                text_path: "Transcript".to_string(),
                unescape: true,
            },
            dual_form: DualFormPolicy::FirstSegment,
            groups: GroupPolicy::Strip,
            noise: NoiseTable::chars("*+/"),
            reject_digits: true,
            require_even_groups: false,
            min_chars: MIN_TRANSCRIPT_CHARS,
            max_chars: None,
            length_supported: false,
        }
    }

    /// Same dialect with the coin-flip gate replaced by the deterministic one.
    pub fn deterministic(mut self) -> Self {
        if let DualFormPolicy::DigitAware { gate } = &mut self.dual_form {
            *gate = NumeralGate::Always;
        }
        self
    }

    /// Same dialect with the coin flip pinned to `seed`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        if let DualFormPolicy::DigitAware {
            gate: NumeralGate::CoinFlip { seed: s },
        } = &mut self.dual_form
        {
            *s = Some(seed);
        }
        self
    }
}
