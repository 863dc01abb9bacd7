//! Transcript normalization.
//!
//! Turns one raw transcript into the exact string a tokenizer or model will be
//! trained on, or a [`Rejection`] saying why the sample must be dropped.
//!
//! The order of the gates matters and mirrors how the corpora were annotated:
//!
//! 1. parse the annotation markup (nested or unbalanced markup rejects)
//! 2. check global parenthesis balance
//! 3. resolve dual forms and stray groups according to the dialect
//! 4. reject leftover numerals
//! 5. reject leftover parentheses
//! 6. strip noise markers
//! 7. collapse whitespace
//! 8. re-check balance
//! 9. enforce length bounds

use crate::annotation::{self, AnnotationParseError, Segment, count_parens};
use crate::dialect::{Dialect, DualFormPolicy, GroupPolicy, NoiseTable, NumeralGate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a transcript was excluded from the trainable set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("malformed annotation: {0}")]
    Annotation(#[from] AnnotationParseError),

    #[error("unpaired parentheses: {open} '(' vs {close} ')'")]
    Unbalanced { open: usize, close: usize },

    #[error("numeral left after dual-form resolution")]
    ResidualDigit,

    #[error("parenthesis left after annotation resolution")]
    ResidualParenthesis,

    #[error("transcript too short: {len} < {min} characters")]
    TooShort { len: usize, min: usize },

    #[error("transcript too long: {len} > {max} characters")]
    TooLong { len: usize, max: usize },
}

impl Rejection {
    /// Short stable label, used as a key in [`NormalizeReport`].
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::Annotation(_) => "annotation",
            Rejection::Unbalanced { .. } => "unbalanced",
            Rejection::ResidualDigit => "residual-digit",
            Rejection::ResidualParenthesis => "residual-parenthesis",
            Rejection::TooShort { .. } => "too-short",
            Rejection::TooLong { .. } => "too-long",
        }
    }
}

/// Outcome of normalizing a batch of lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub accepted: Vec<String>,
    pub rejected: BTreeMap<&'static str, usize>,
}

impl NormalizeReport {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    pub fn total(&self) -> usize {
        self.accepted.len() + self.rejected_total()
    }
}

/// Dialect-driven transcript normalizer.
///
/// Holds its own random source so the coin-flip numeral gate never touches
/// ambient global randomness.
pub struct Normalizer {
    dialect: Dialect,
    rng: StdRng,
}

impl Normalizer {
    /// Create a normalizer. The random source is seeded from the dialect's
    /// coin-flip seed when present, from OS entropy otherwise.
    pub fn new(dialect: Dialect) -> Self {
        let rng = match dialect.dual_form {
            DualFormPolicy::DigitAware {
                gate: NumeralGate::CoinFlip { seed: Some(seed) },
            } => StdRng::seed_from_u64(seed),
            _ => StdRng::from_entropy(),
        };
        Self { dialect, rng }
    }

    /// Create a normalizer with an explicit random source.
    pub fn with_rng(dialect: Dialect, rng: StdRng) -> Self {
        Self { dialect, rng }
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Normalize one transcript.
    pub fn normalize(&mut self, raw: &str) -> Result<String, Rejection> {
        let parsed = annotation::parse(raw)?;

        let (open, close) = count_parens(raw);
        if open != close || (self.dialect.require_even_groups && open % 2 == 1) {
            return Err(Rejection::Unbalanced { open, close });
        }

        let mut resolved = String::with_capacity(raw.len());
        for segment in parsed.segments() {
            match segment {
                Segment::Text(text) => resolved.push_str(text),
                Segment::DualForm(dual) => {
                    let keep_second = match self.dialect.dual_form {
                        DualFormPolicy::FirstSegment => false,
                        DualFormPolicy::DigitAware { gate } => {
                            has_numeral(dual.first.inner) && self.honor_numeral_rule(gate)
                        }
                    };
                    if keep_second {
                        resolved.push_str(dual.second.inner);
                    } else {
                        resolved.push_str(dual.first.inner);
                    }
                }
                Segment::Group(group) => match self.dialect.groups {
                    GroupPolicy::Keep => resolved.push_str(&raw[group.start..group.end]),
                    GroupPolicy::Strip => {}
                    GroupPolicy::TagStrip => resolved.push_str(strip_tag(group.inner)),
                },
            }
        }

        if self.dialect.reject_digits && has_numeral(&resolved) {
            return Err(Rejection::ResidualDigit);
        }

        if resolved.contains(['(', ')']) {
            return Err(Rejection::ResidualParenthesis);
        }

        let stripped = strip_noise(&resolved, &self.dialect.noise);
        let cleaned = collapse_whitespace(&stripped);

        let (open, close) = count_parens(&cleaned);
        if open != close {
            return Err(Rejection::Unbalanced { open, close });
        }

        let len = cleaned.chars().count();
        if len < self.dialect.min_chars {
            return Err(Rejection::TooShort {
                len,
                min: self.dialect.min_chars,
            });
        }
        if let Some(max) = self.dialect.max_chars
            && len > max
        {
            return Err(Rejection::TooLong { len, max });
        }

        Ok(cleaned)
    }

    /// Normalize every line, collecting accepted transcripts and rejection counts.
    pub fn normalize_all<I, S>(&mut self, lines: I) -> NormalizeReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = NormalizeReport::default();
        for line in lines {
            match self.normalize(line.as_ref()) {
                Ok(text) => report.accepted.push(text),
                Err(rejection) => {
                    tracing::trace!(line = line.as_ref(), %rejection, "rejected transcript");
                    *report.rejected.entry(rejection.reason()).or_insert(0) += 1;
                }
            }
        }
        report
    }

    fn honor_numeral_rule(&mut self, gate: NumeralGate) -> bool {
        match gate {
            NumeralGate::Always => true,
            NumeralGate::CoinFlip { .. } => self.rng.gen_bool(0.5),
        }
    }
}

/// ASCII digits only. Circled numbers, fractions and `〇` are left alone.
fn has_numeral(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}

/// `SP:안녕` → `안녕`. Text without a tag is returned unchanged.
fn strip_tag(inner: &str) -> &str {
    match inner.split_once(':') {
        Some((_, rest)) => rest,
        None => inner,
    }
}

fn strip_noise(text: &str, noise: &NoiseTable) -> String {
    let without_tokens = if noise.tokens.is_empty() {
        text.to_string()
    } else {
        text.split(' ')
            .map(|word| strip_marker_prefixes(word, &noise.tokens))
            .collect::<Vec<_>>()
            .join(" ")
    };

    without_tokens
        .chars()
        .filter(|c| !noise.chars.contains(*c))
        .collect()
}

fn strip_marker_prefixes<'a>(mut word: &'a str, tokens: &[String]) -> &'a str {
    while let Some(rest) = tokens
        .iter()
        .find_map(|token| word.strip_prefix(token.as_str()))
    {
        word = rest;
    }
    word
}

/// Collapse whitespace runs to one space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
