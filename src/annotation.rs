//! Parser for the dual-annotation transcription syntax.
//!
//! Corpus transcripts mark alternate readings of one audio region as two
//! adjacent parenthesized groups joined by a slash, e.g. `(02)/(공이)` where the
//! first group is what was spoken and the second is the orthographic form.
//! Other parenthesized groups (noise tags, speaker notes) may appear on their
//! own. This module only locates and classifies those groups; choosing which
//! reading to keep is the normalizer's job.

use thiserror::Error;

/// Errors raised for malformed parenthetical markup.
///
/// A line that fails to parse is rejected as a whole. There is no partial repair.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationParseError {
    #[error("unbalanced parentheses: {open} '(' vs {close} ')'")]
    Unbalanced { open: usize, close: usize },

    #[error("closing parenthesis at byte {position} has no opening match")]
    UnmatchedClose { position: usize },

    #[error("nested parenthesis inside dual-form annotation at byte {position}")]
    NestedInDualForm { position: usize },
}

/// One top-level parenthesized group.
///
/// `start` is the byte offset of `(`, `end` the offset just past the matching `)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationSpan<'a> {
    pub start: usize,
    pub end: usize,
    pub inner: &'a str,
}

impl AnnotationSpan<'_> {
    fn has_paren(&self) -> bool {
        self.inner.contains(['(', ')'])
    }
}

/// Two alternate transcriptions of the same audio region: `(first)/(second)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualForm<'a> {
    pub first: AnnotationSpan<'a>,
    pub second: AnnotationSpan<'a>,
}

impl DualForm<'_> {
    pub fn start(&self) -> usize {
        self.first.start
    }

    pub fn end(&self) -> usize {
        self.second.end
    }
}

/// A piece of a parsed line, in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Plain text outside any annotation.
    Text(&'a str),
    /// A `(A)/(B)` pair.
    DualForm(DualForm<'a>),
    /// A parenthesized group with no slash partner.
    Group(AnnotationSpan<'a>),
}

/// Result of parsing one transcript line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine<'a> {
    source: &'a str,
    segments: Vec<Segment<'a>>,
}

impl<'a> ParsedLine<'a> {
    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn segments(&self) -> &[Segment<'a>] {
        &self.segments
    }

    pub fn dual_forms(&self) -> impl Iterator<Item = &DualForm<'a>> {
        self.segments.iter().filter_map(|s| match s {
            Segment::DualForm(d) => Some(d),
            _ => None,
        })
    }

    pub fn groups(&self) -> impl Iterator<Item = &AnnotationSpan<'a>> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Group(g) => Some(g),
            _ => None,
        })
    }

    /// True when the line has no parenthesized markup at all.
    pub fn is_plain(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Text(_)))
    }
}

/// Count `(` and `)` in a line.
pub fn count_parens(line: &str) -> (usize, usize) {
    line.chars().fold((0, 0), |(open, close), c| match c {
        '(' => (open + 1, close),
        ')' => (open, close + 1),
        _ => (open, close),
    })
}

/// Parse a transcript line into text, dual-form and group segments.
///
/// Fails when the parenthesis counts differ, when a `)` closes nothing, or
/// when either half of a dual form itself contains a parenthesis.
pub fn parse(line: &str) -> Result<ParsedLine<'_>, AnnotationParseError> {
    let (open, close) = count_parens(line);
    if open != close {
        return Err(AnnotationParseError::Unbalanced { open, close });
    }

    let spans = top_level_spans(line)?;

    let mut segments = Vec::with_capacity(spans.len() * 2 + 1);
    let mut cursor = 0;
    let mut i = 0;
    while i < spans.len() {
        let span = spans[i];
        if cursor < span.start {
            segments.push(Segment::Text(&line[cursor..span.start]));
        }

        let partner = spans
            .get(i + 1)
            .filter(|next| &line[span.end..next.start] == "/");

        match partner {
            Some(&second) => {
                if span.has_paren() {
                    return Err(AnnotationParseError::NestedInDualForm {
                        position: span.start,
                    });
                }
                if second.has_paren() {
                    return Err(AnnotationParseError::NestedInDualForm {
                        position: second.start,
                    });
                }
                segments.push(Segment::DualForm(DualForm {
                    first: span,
                    second,
                }));
                cursor = second.end;
                i += 2;
            }
            None => {
                segments.push(Segment::Group(span));
                cursor = span.end;
                i += 1;
            }
        }
    }
    if cursor < line.len() {
        segments.push(Segment::Text(&line[cursor..]));
    }

    Ok(ParsedLine {
        source: line,
        segments,
    })
}

/// Locate every outermost `( … )` group. Inner text may still contain
/// nested parentheses.
fn top_level_spans(line: &str) -> Result<Vec<AnnotationSpan<'_>>, AnnotationParseError> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (pos, c) in line.char_indices() {
        match c {
            '(' => {
                if depth == 0 {
                    start = pos;
                }
                depth += 1;
            }
            ')' => {
                if depth == 0 {
                    return Err(AnnotationParseError::UnmatchedClose { position: pos });
                }
                depth -= 1;
                if depth == 0 {
                    spans.push(AnnotationSpan {
                        start,
                        end: pos + 1,
                        inner: &line[start + 1..pos],
                    });
                }
            }
            _ => {}
        }
    }

    Ok(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_is_single_text_segment() {
        let parsed = parse("그냥 평범한 문장").unwrap();
        assert!(parsed.is_plain());
        assert_eq!(parsed.segments(), &[Segment::Text("그냥 평범한 문장")]);
    }

    #[test]
    fn test_empty_line() {
        let parsed = parse("").unwrap();
        assert!(parsed.segments().is_empty());
        assert!(parsed.is_plain());
    }

    #[test]
    fn test_dual_form_detected() {
        let line = "(02)/(공이) 번";
        let parsed = parse(line).unwrap();
        let duals: Vec<_> = parsed.dual_forms().collect();
        assert_eq!(duals.len(), 1);
        assert_eq!(duals[0].first.inner, "02");
        assert_eq!(duals[0].second.inner, "공이");
        assert_eq!(duals[0].start(), 0);
        assert_eq!(&line[duals[0].end()..], " 번");
    }

    #[test]
    fn test_segments_keep_surrounding_text() {
        let parsed = parse("오늘 (3)/(세) 시에").unwrap();
        let segments = parsed.segments();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], Segment::Text("오늘 "));
        assert!(matches!(segments[1], Segment::DualForm(_)));
        assert_eq!(segments[2], Segment::Text(" 시에"));
    }

    #[test]
    fn test_multiple_dual_forms() {
        let parsed = parse("(1)/(한) 개 (2)/(두) 개").unwrap();
        assert_eq!(parsed.dual_forms().count(), 2);
        assert_eq!(parsed.groups().count(), 0);
    }

    #[test]
    fn test_group_without_slash_partner() {
        let parsed = parse("(SP:안녕) 하세요").unwrap();
        let groups: Vec<_> = parsed.groups().collect();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].inner, "SP:안녕");
        assert_eq!(parsed.dual_forms().count(), 0);
    }

    #[test]
    fn test_slash_with_space_is_not_dual_form() {
        let parsed = parse("(가) / (나)").unwrap();
        assert_eq!(parsed.dual_forms().count(), 0);
        assert_eq!(parsed.groups().count(), 2);
    }

    #[test]
    fn test_nested_paren_in_dual_form_first_half() {
        let err = parse("(A(B))/(C)").unwrap_err();
        assert_eq!(err, AnnotationParseError::NestedInDualForm { position: 0 });
    }

    #[test]
    fn test_nested_paren_in_dual_form_second_half() {
        let err = parse("x (A)/(B(C))").unwrap_err();
        assert_eq!(err, AnnotationParseError::NestedInDualForm { position: 6 });
    }

    #[test]
    fn test_nested_group_without_partner_parses() {
        let parsed = parse("(A(B)) 끝").unwrap();
        let groups: Vec<_> = parsed.groups().collect();
        assert_eq!(groups[0].inner, "A(B)");
    }

    #[test]
    fn test_unbalanced_counts() {
        assert_eq!(
            parse("(02)/(공이").unwrap_err(),
            AnnotationParseError::Unbalanced { open: 2, close: 1 }
        );
        assert_eq!(
            parse("끝)").unwrap_err(),
            AnnotationParseError::Unbalanced { open: 0, close: 1 }
        );
    }

    #[test]
    fn test_unmatched_close_with_equal_counts() {
        assert_eq!(
            parse(")가(").unwrap_err(),
            AnnotationParseError::UnmatchedClose { position: 0 }
        );
    }

    #[test]
    fn test_parse_is_idempotent() {
        let line = "(지금)/(시방) 가자 (noise)";
        assert_eq!(parse(line).unwrap(), parse(line).unwrap());
    }

    #[test]
    fn test_count_parens() {
        assert_eq!(count_parens("(a)/(b) (c"), (3, 2));
        assert_eq!(count_parens("없음"), (0, 0));
    }

    #[test]
    fn test_error_display() {
        let err = AnnotationParseError::Unbalanced { open: 3, close: 2 };
        assert_eq!(err.to_string(), "unbalanced parentheses: 3 '(' vs 2 ')'");
    }
}
