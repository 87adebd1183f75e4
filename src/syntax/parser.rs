//! Recursive-descent parser for the URL-pattern dialect (spec.md §4.2).
//!
//! ```text
//! pattern      := anchor? alternation anchor?
//! anchor       := '^' | '$'
//! alternation  := concat ('|' concat)*
//! concat       := atom*
//! atom         := char | '.' | '[' class ']' | '(' alternation ')'
//! atom         := atom quantifier
//! quantifier   := '?' | '*' | '+'
//! ```
//!
//! `^` and `$` are only meaningful as the very first/last byte of the whole
//! pattern (this is the "Supplemented from original_source" behavior noted
//! in SPEC_FULL.md §4.2: the original WebKit parser rejects a `^` anywhere
//! but the start and a `$` anywhere but the end rather than treating them as
//! literal). Concretely: once the top-level alternation has been parsed, if
//! anything other than a single trailing `$` remains, the pattern is
//! rejected — so both "anchor floats into the middle" and "anchor appears
//! twice" surface as the same plain parse error.

use itertools::Itertools;

use crate::syntax::hir::{ClassRange, Hir};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternError {
    pub pos: usize,
    pub message: String,
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "at byte {}: {}", self.pos, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPattern {
    pub hir: Hir,
    pub anchored_start: bool,
    pub anchored_end: bool,
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    case_sensitive: bool,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn error(&self, message: impl Into<String>) -> PatternError {
        PatternError {
            pos: self.pos,
            message: message.into(),
        }
    }

    fn expect(&mut self, b: u8) -> Result<(), PatternError> {
        if self.peek() == Some(b) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", b as char)))
        }
    }

    fn parse_alternation(&mut self, depth: u32) -> Result<Hir, PatternError> {
        let mut branches = vec![self.parse_concat(depth)?];
        while self.peek() == Some(b'|') {
            self.pos += 1;
            branches.push(self.parse_concat(depth)?);
        }
        Ok(Hir::alternation(branches))
    }

    fn parse_concat(&mut self, depth: u32) -> Result<Hir, PatternError> {
        let mut atoms = Vec::new();
        loop {
            match self.peek() {
                None => break,
                Some(b'|') | Some(b')') => break,
                // '$' only ends a concat at the top level; inside a group
                // it falls through to parse_atom, which rejects it.
                Some(b'$') if depth == 0 => break,
                _ => atoms.push(self.parse_quantified_atom(depth)?),
            }
        }
        Ok(Hir::concat(atoms))
    }

    fn parse_quantified_atom(&mut self, depth: u32) -> Result<Hir, PatternError> {
        let atom = self.parse_atom(depth)?;
        match self.peek() {
            Some(b'?') => {
                self.pos += 1;
                Ok(Hir::ZeroOrOne(Box::new(atom)))
            }
            Some(b'*') => {
                self.pos += 1;
                Ok(Hir::ZeroOrMore(Box::new(atom)))
            }
            Some(b'+') => {
                self.pos += 1;
                Ok(Hir::OneOrMore(Box::new(atom)))
            }
            _ => Ok(atom),
        }
    }

    fn parse_atom(&mut self, depth: u32) -> Result<Hir, PatternError> {
        match self.peek() {
            None => Err(self.error("unexpected end of pattern")),
            Some(b'(') => {
                self.pos += 1;
                let inner = self.parse_alternation(depth + 1)?;
                self.expect(b')')?;
                Ok(inner)
            }
            Some(b'[') => {
                self.pos += 1;
                self.parse_class()
            }
            Some(b'.') => {
                self.pos += 1;
                Ok(Hir::dot())
            }
            Some(b'\\') => {
                self.pos += 1;
                let c = self
                    .bump()
                    .ok_or_else(|| self.error("dangling escape at end of pattern"))?;
                Ok(Hir::literal(c, self.case_sensitive))
            }
            Some(b'^') => Err(self.error("'^' is only valid at the start of a pattern")),
            Some(b'$') => Err(self.error("'$' is only valid at the end of a pattern")),
            Some(c) => {
                self.pos += 1;
                Ok(Hir::literal(c, self.case_sensitive))
            }
        }
    }

    fn parse_class(&mut self) -> Result<Hir, PatternError> {
        let mut ranges = Vec::new();
        loop {
            let lo = match self.peek() {
                None => return Err(self.error("unterminated character class")),
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    self.bump()
                        .ok_or_else(|| self.error("dangling escape in character class"))?
                }
                Some(c) => {
                    self.pos += 1;
                    c
                }
            };

            if self.peek() == Some(b'-') && self.peek_at(1).is_some() && self.peek_at(1) != Some(b']') {
                self.pos += 1; // consume '-'
                let hi = match self.peek() {
                    Some(b'\\') => {
                        self.pos += 1;
                        self.bump()
                            .ok_or_else(|| self.error("dangling escape in character class"))?
                    }
                    Some(c) => {
                        self.pos += 1;
                        c
                    }
                    None => return Err(self.error("unterminated character class")),
                };
                if lo > hi {
                    return Err(self.error("character class range is out of order"));
                }
                ranges.push(ClassRange { lo, hi });
            } else {
                ranges.push(ClassRange { lo, hi: lo });
            }
        }

        if ranges.is_empty() {
            return Err(self.error("empty character class"));
        }

        if !self.case_sensitive {
            ranges = expand_case_fold(&ranges);
        }
        Ok(Hir::Class(ranges))
    }
}

/// For every maximal same-case alphabetic run inside `ranges`, adds the
/// opposite-case run too, so `[a-z]` case-insensitively also accepts `A-Z`.
///
/// Chunking the range into same-case runs with `chunk_by` before folding,
/// rather than case-folding byte by byte, follows the teacher's own
/// `literal_to_ascii_case_insensitive` (`syntax/regex/hir/case.rs`), which
/// chunks a literal's bytes by `is_ascii_alphabetic` for the same reason:
/// one `ClassRange` per run instead of one per byte.
fn expand_case_fold(ranges: &[ClassRange]) -> Vec<ClassRange> {
    let mut out = ranges.to_vec();
    for r in ranges {
        for (bucket, group) in &(r.lo..=r.hi).chunk_by(|b| {
            if b.is_ascii_lowercase() {
                1u8
            } else if b.is_ascii_uppercase() {
                2u8
            } else {
                0u8
            }
        }) {
            if bucket == 0 {
                continue;
            }
            let run: Vec<u8> = group.collect();
            let (lo, hi) = (*run.first().unwrap(), *run.last().unwrap());
            out.push(if bucket == 1 {
                ClassRange {
                    lo: lo.to_ascii_uppercase(),
                    hi: hi.to_ascii_uppercase(),
                }
            } else {
                ClassRange {
                    lo: lo.to_ascii_lowercase(),
                    hi: hi.to_ascii_lowercase(),
                }
            });
        }
    }
    out
}

/// Parses a full pattern. `pattern` must be ASCII, per spec.md §1's
/// restriction on the dialect's alphabet.
pub fn parse_pattern(pattern: &str, case_sensitive: bool) -> Result<ParsedPattern, PatternError> {
    if !pattern.is_ascii() {
        return Err(PatternError {
            pos: 0,
            message: "pattern must be ASCII".to_string(),
        });
    }
    if pattern.is_empty() {
        return Err(PatternError {
            pos: 0,
            message: "pattern must not be empty".to_string(),
        });
    }

    let bytes = pattern.as_bytes();
    let anchored_start = bytes[0] == b'^';
    let start = if anchored_start { 1 } else { 0 };

    let mut parser = Parser {
        bytes,
        pos: start,
        case_sensitive,
    };
    let hir = parser.parse_alternation(0)?;

    let anchored_end = parser.peek() == Some(b'$');
    if anchored_end {
        parser.pos += 1;
    }

    if parser.pos != bytes.len() {
        return Err(parser.error("unexpected character (anchors are only valid at the pattern's edges)"));
    }

    Ok(ParsedPattern {
        hir,
        anchored_start,
        anchored_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_literal_concat() {
        let p = parse_pattern("ads", true).unwrap();
        assert_eq!(
            p.hir,
            Hir::concat(vec![Hir::Byte(b'a'), Hir::Byte(b'd'), Hir::Byte(b's')])
        );
        assert!(!p.anchored_start);
        assert!(!p.anchored_end);
    }

    #[test]
    fn anchors_at_both_ends() {
        let p = parse_pattern("^ads$", true).unwrap();
        assert!(p.anchored_start);
        assert!(p.anchored_end);
    }

    #[test]
    fn interior_caret_is_rejected() {
        assert!(parse_pattern("a^b", true).is_err());
    }

    #[test]
    fn interior_dollar_is_rejected() {
        assert!(parse_pattern("a$b", true).is_err());
    }

    #[test]
    fn alternation_and_groups() {
        let p = parse_pattern("(ad|evil)s?", true).unwrap();
        assert!(matches!(p.hir, Hir::Concat(_)));
    }

    #[test]
    fn class_with_range_and_escape() {
        let p = parse_pattern(r"[a-z0-9\-]", true).unwrap();
        match p.hir {
            Hir::Class(ranges) => {
                assert!(ranges.contains(&ClassRange { lo: b'a', hi: b'z' }));
                assert!(ranges.contains(&ClassRange { lo: b'0', hi: b'9' }));
                assert!(ranges.contains(&ClassRange { lo: b'-', hi: b'-' }));
            }
            other => panic!("expected class, got {other:?}"),
        }
    }

    #[test]
    fn case_insensitive_class_gains_both_cases() {
        let p = parse_pattern("[a-c]", false).unwrap();
        match p.hir {
            Hir::Class(ranges) => {
                assert!(ranges.contains(&ClassRange { lo: b'a', hi: b'c' }));
                assert!(ranges.contains(&ClassRange { lo: b'A', hi: b'C' }));
            }
            other => panic!("expected class, got {other:?}"),
        }
    }

    #[test]
    fn dot_star_parses_to_quantified_dot() {
        let p = parse_pattern(".*", true).unwrap();
        assert!(p.hir.is_dot_star_or_plus());
    }

    #[test]
    fn unbalanced_group_is_invalid() {
        assert!(parse_pattern("(ab", true).is_err());
    }

    #[test]
    fn unterminated_class_is_invalid() {
        assert!(parse_pattern("[abc", true).is_err());
    }
}
