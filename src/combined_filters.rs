//! Accumulates every trigger pattern and partitions them into disjoint NFAs
//! by shared literal prefix (spec.md §4.3), bounding the state blow-up that
//! subset construction would otherwise incur if every pattern were thrown
//! into one giant NFA.
//!
//! The partition is a trie over prefix bytes, exactly as described: each
//! trie node corresponds to one shared prefix, and owns at most one NFA
//! (lazily created on first use). `literal_prefix` is a conservative,
//! parser-independent scan for the longest *required* literal run at a
//! pattern's start — conservative because it only affects which NFA a
//! pattern lands in, never whether it matches; an empty prefix is always a
//! safe (if unhelpful) answer.

use std::collections::BTreeMap;

use crate::{
    nfa::Nfa,
    syntax::{
        parser::PatternError,
        thompson::{self, GroupBuilder, ParseStatus},
    },
};

#[derive(Debug, Default)]
struct TrieNode {
    children: BTreeMap<u8, TrieNode>,
    group: Option<usize>,
}

/// The longest run of bytes at the start of `pattern` that every match of
/// the pattern is guaranteed to begin with: plain literal characters (and
/// escaped metacharacters), stopping at the first class/group/alternation
/// construct, and backing off one character early whenever that character
/// is itself made optional by a trailing quantifier.
fn literal_prefix(pattern: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = if pattern.first() == Some(&b'^') { 1 } else { 0 };

    let is_quantifier = |b: Option<u8>| matches!(b, Some(b'?') | Some(b'*') | Some(b'+'));

    while i < pattern.len() {
        match pattern[i] {
            b'\\' => {
                let Some(&lit) = pattern.get(i + 1) else {
                    break;
                };
                if is_quantifier(pattern.get(i + 2).copied()) {
                    break;
                }
                out.push(lit);
                i += 2;
            }
            b'.' | b'[' | b'(' | b'|' | b'^' | b'$' | b'?' | b'*' | b'+' => break,
            c => {
                if is_quantifier(pattern.get(i + 1).copied()) {
                    break;
                }
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Accumulates triggers from every rule before the parser ever runs,
/// partitioning them by shared literal prefix and handing each partition
/// its own NFA arena.
#[derive(Debug, Default)]
pub struct CombinedUrlFilters {
    root: TrieNode,
    groups: Vec<Nfa>,
    builders: Vec<GroupBuilder>,
}

impl CombinedUrlFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `pattern` and adds it to whichever group shares its literal
    /// prefix, tagging the real accept state with `action_key`.
    pub fn add_pattern(
        &mut self,
        pattern: &str,
        case_sensitive: bool,
        action_key: u64,
    ) -> Result<ParseStatus, PatternError> {
        let prefix = literal_prefix(pattern.as_bytes());
        let group = self.group_for_prefix(&prefix);
        thompson::add_pattern(
            &mut self.groups[group],
            &mut self.builders[group],
            pattern,
            case_sensitive,
            action_key,
        )
    }

    fn group_for_prefix(&mut self, prefix: &[u8]) -> usize {
        let mut node = &mut self.root;
        for &b in prefix {
            node = node.children.entry(b).or_default();
        }
        *node.group.get_or_insert_with(|| {
            self.groups.push(Nfa::new());
            self.builders.push(GroupBuilder::default());
            self.groups.len() - 1
        })
    }

    pub fn memory_used(&self) -> usize {
        self.groups.iter().map(Nfa::memory_used).sum()
    }

    /// Emits one NFA per non-empty partition. A group whose only pattern
    /// turned out to be universal (and so never touched its NFA) is dropped
    /// rather than handed downstream as an empty automaton.
    pub fn create_nfas(self) -> Vec<Nfa> {
        self.groups
            .into_iter()
            .filter(|nfa| !nfa.is_empty_of_patterns())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_prefix_lands_in_the_same_group() {
        let mut filters = CombinedUrlFilters::new();
        filters.add_pattern("adserver/a", true, 1).unwrap();
        filters.add_pattern("adserver/b", true, 2).unwrap();
        filters.add_pattern("tracker", true, 3).unwrap();
        let nfas = filters.create_nfas();
        assert_eq!(nfas.len(), 2);
    }

    #[test]
    fn universal_pattern_contributes_no_nfa() {
        let mut filters = CombinedUrlFilters::new();
        let status = filters.add_pattern(".*", true, 1).unwrap();
        assert_eq!(status, ParseStatus::MatchesEverything);
        assert!(filters.create_nfas().is_empty());
    }

    #[test]
    fn literal_prefix_stops_before_an_optional_character() {
        assert_eq!(literal_prefix(b"ads?erver"), b"ad");
        assert_eq!(literal_prefix(b"^ads"), b"ads");
        assert_eq!(literal_prefix(b"ad.*"), b"ad");
        assert_eq!(literal_prefix(br"ad\.com"), b"ad.com");
    }
}
