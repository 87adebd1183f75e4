//! Lowers a parsed pattern into a Thompson NFA fragment inside a shared
//! [`Nfa`] arena, and wires up the anchor/search semantics described in
//! spec.md §4.2–§4.3.
//!
//! Patterns in this dialect search for a match starting anywhere in the URL
//! unless `^`-anchored (the grammar never requires the author to spell out
//! an explicit "any prefix" — that's implicit, same as every other
//! substring-searching regex engine). That's implemented the classic
//! Thompson way: a *search hub* state with a self-loop on every real URL
//! byte, epsilon-linked from the group's start; unanchored fragments attach
//! there, anchored ones attach directly to the start state instead, so they
//! can only ever be live at true position zero.
//!
//! A trailing `$` is implemented by routing the fragment's accept state
//! through one extra edge on [`EOF_BYTE`], which the interpreter feeds
//! exactly once after the real input is exhausted (see `nfa` module docs).

use crate::{
    nfa::{ByteRange, Nfa, StateId, EOF_BYTE},
    syntax::{
        hir::Hir,
        parser::{parse_pattern, ParsedPattern, PatternError},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    Ok,
    /// The pattern's language is every non-empty byte string (spec.md
    /// GLOSSARY "Universal pattern"); the caller must not add this pattern's
    /// action to a DFA, but instead collect it as a universal action.
    MatchesEverything,
}

/// Compiles `hir` into a fresh fragment within `nfa`, returning its
/// (start, accept) state pair. Does not touch anchors or actions — see
/// [`add_pattern`] for the full per-pattern wiring.
fn compile_hir(nfa: &mut Nfa, hir: &Hir) -> (StateId, StateId) {
    match hir {
        Hir::Empty => {
            let s = nfa.add_state();
            (s, s)
        }
        Hir::Byte(b) => {
            let s0 = nfa.add_state();
            let s1 = nfa.add_state();
            nfa.add_edge(s0, ByteRange::single(*b), s1);
            (s0, s1)
        }
        Hir::Class(ranges) => {
            let s0 = nfa.add_state();
            let s1 = nfa.add_state();
            for r in ranges {
                nfa.add_edge(s0, ByteRange { lo: r.lo, hi: r.hi }, s1);
            }
            (s0, s1)
        }
        Hir::Concat(subs) => {
            let start = nfa.add_state();
            let mut prev = start;
            for sub in subs {
                let (sub_start, sub_end) = compile_hir(nfa, sub);
                nfa.add_epsilon(prev, sub_start);
                prev = sub_end;
            }
            (start, prev)
        }
        Hir::Alternation(branches) => {
            let start = nfa.add_state();
            let accept = nfa.add_state();
            for branch in branches {
                let (b_start, b_end) = compile_hir(nfa, branch);
                nfa.add_epsilon(start, b_start);
                nfa.add_epsilon(b_end, accept);
            }
            (start, accept)
        }
        Hir::ZeroOrOne(sub) => {
            let (sub_start, sub_end) = compile_hir(nfa, sub);
            let start = nfa.add_state();
            let accept = nfa.add_state();
            nfa.add_epsilon(start, sub_start);
            nfa.add_epsilon(start, accept);
            nfa.add_epsilon(sub_end, accept);
            (start, accept)
        }
        Hir::ZeroOrMore(sub) => {
            let (sub_start, sub_end) = compile_hir(nfa, sub);
            let start = nfa.add_state();
            let accept = nfa.add_state();
            nfa.add_epsilon(start, sub_start);
            nfa.add_epsilon(start, accept);
            nfa.add_epsilon(sub_end, sub_start);
            nfa.add_epsilon(sub_end, accept);
            (start, accept)
        }
        Hir::OneOrMore(sub) => {
            let (sub_start, sub_end) = compile_hir(nfa, sub);
            let accept = nfa.add_state();
            nfa.add_epsilon(sub_end, sub_start);
            nfa.add_epsilon(sub_end, accept);
            (sub_start, accept)
        }
    }
}

/// Per-group state needed to share one search hub across every unanchored
/// pattern added to the same [`Nfa`] (one per
/// [`CombinedUrlFilters`](crate::combined_filters::CombinedUrlFilters) prefix
/// partition).
#[derive(Debug, Default)]
pub struct GroupBuilder {
    search_hub: Option<StateId>,
}

impl GroupBuilder {
    fn search_hub(&mut self, nfa: &mut Nfa) -> StateId {
        if let Some(hub) = self.search_hub {
            return hub;
        }
        let hub = nfa.add_state();
        nfa.add_edge(hub, ByteRange { lo: 0, hi: 127 }, hub);
        // The hub only does anything once it's reachable from wherever
        // matching actually begins.
        nfa.add_epsilon(nfa.start(), hub);
        self.search_hub = Some(hub);
        hub
    }
}

/// Parses `pattern` and adds it to `nfa` (whose start state is the group's
/// shared root), tagging the real accept state with `action_key`.
///
/// Returns `MatchesEverything` without touching `nfa` at all when the
/// pattern reduces to a bare, unanchored `.*`/`.+` — such a pattern
/// contributes nothing to any per-group DFA; the caller collects its action
/// key separately and attaches it to the root of the compiled program
/// instead (spec.md §2 "Universal actions").
pub fn add_pattern(
    group: &mut Nfa,
    group_builder: &mut GroupBuilder,
    pattern: &str,
    case_sensitive: bool,
    action_key: u64,
) -> Result<ParseStatus, PatternError> {
    let ParsedPattern {
        hir,
        anchored_start,
        anchored_end,
    } = parse_pattern(pattern, case_sensitive)?;

    if !anchored_start && !anchored_end && hir.is_dot_star_or_plus() {
        return Ok(ParseStatus::MatchesEverything);
    }

    let (frag_start, frag_accept) = compile_hir(group, &hir);

    let entry = if anchored_start {
        group.start()
    } else {
        group_builder.search_hub(group)
    };
    group.add_epsilon(entry, frag_start);

    let real_accept = if anchored_end {
        let eof_state = group.add_state();
        group.add_edge(frag_accept, ByteRange::single(EOF_BYTE), eof_state);
        eof_state
    } else {
        frag_accept
    };
    group.add_action(real_accept, action_key);

    Ok(ParseStatus::Ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universal_pattern_is_detected_and_untouched() {
        let mut nfa = Nfa::new();
        let mut gb = GroupBuilder::default();
        let status = add_pattern(&mut nfa, &mut gb, ".*", true, 42).unwrap();
        assert_eq!(status, ParseStatus::MatchesEverything);
        assert!(nfa.is_empty_of_patterns());
    }

    #[test]
    fn anchored_dot_star_is_not_universal() {
        let mut nfa = Nfa::new();
        let mut gb = GroupBuilder::default();
        let status = add_pattern(&mut nfa, &mut gb, "^.*", true, 42).unwrap();
        assert_eq!(status, ParseStatus::Ok);
        assert!(!nfa.is_empty_of_patterns());
    }

    #[test]
    fn unanchored_pattern_is_reachable_via_search_hub() {
        let mut nfa = Nfa::new();
        let mut gb = GroupBuilder::default();
        add_pattern(&mut nfa, &mut gb, "ad", true, 1).unwrap();
        // Closure from start must reach a state with an 'a' edge, after
        // passing through the hub's self-loop.
        let closure = nfa.epsilon_closure(nfa.start());
        let reaches_a = closure
            .iter()
            .any(|&s| nfa.edges(s).iter().any(|e| e.range.contains(b'a')));
        assert!(reaches_a);
    }

    #[test]
    fn anchored_pattern_is_not_reachable_through_the_hub_loop() {
        let mut nfa = Nfa::new();
        let mut gb = GroupBuilder::default();
        add_pattern(&mut nfa, &mut gb, "^ad", true, 1).unwrap();
        add_pattern(&mut nfa, &mut gb, "ev", true, 2).unwrap();
        // Only the unanchored pattern's start is reachable from the hub.
        let hub = gb.search_hub(&mut nfa);
        let closure = nfa.epsilon_closure(hub);
        let reaches_a = closure
            .iter()
            .any(|&s| nfa.edges(s).iter().any(|e| e.range.contains(b'a')));
        let reaches_e = closure
            .iter()
            .any(|&s| nfa.edges(s).iter().any(|e| e.range.contains(b'e')));
        assert!(!reaches_a);
        assert!(reaches_e);
    }
}
