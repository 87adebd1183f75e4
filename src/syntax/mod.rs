/*!
The URL-pattern dialect: a restricted regular expression grammar (spec.md
§4.2) supporting anchors, character classes, alternation, groups and the
`?`/`*`/`+` quantifiers. No backreferences, no lookaround, no Unicode
properties — the dialect promises ASCII and a single linear pass is enough
to build a Thompson NFA for any valid pattern.

This module is organized the way the teacher's own [`regex`](crate::regex)
module is: a parser producing a small IR ([`hir`]), and a lowering pass from
that IR to an automaton ([`thompson`]).
*/

pub mod hir;
pub mod parser;
pub mod thompson;

pub use parser::{parse_pattern, ParsedPattern, PatternError};
pub use thompson::{add_pattern, GroupBuilder, ParseStatus};
