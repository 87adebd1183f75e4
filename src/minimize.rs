//! Minimizes a subset-constructed [`Dfa`] by partition refinement (spec.md
//! §4.5), merging states that are both equivalent under repeated splitting
//! and carry identical action-key sets.
//!
//! The classical Hopcroft algorithm processes a worklist of splitters to hit
//! an `O(n log n)` bound; this refines the whole partition to a fixed point
//! every round instead. Content-extension rule lists never produce DFAs
//! large enough for the asymptotic difference to matter, and the simpler
//! form is much easier to convince yourself is correct.

use std::collections::HashMap;

use crate::dfa::{Dfa, DfaEdge, DfaNode, DfaStateId};

/// Every symbol a `Dfa` node can transition on; `128` is [`crate::nfa::EOF_BYTE`].
const ALPHABET_LEN: usize = 129;

fn class_signature(dfa: &Dfa) -> Vec<usize> {
    let n = dfa.nodes.len();
    let mut class_of = vec![0usize; n];
    let mut seen: HashMap<Vec<u64>, usize> = HashMap::new();
    for (i, node) in dfa.nodes.iter().enumerate() {
        let acts = dfa.node_actions(DfaStateId(i as u32)).to_vec();
        let next_id = seen.len();
        class_of[i] = *seen.entry(acts).or_insert(next_id);
        let _ = node;
    }
    class_of
}

fn transition_table(dfa: &Dfa) -> Vec<[Option<u32>; ALPHABET_LEN]> {
    let mut table = vec![[None; ALPHABET_LEN]; dfa.nodes.len()];
    for (i, node) in dfa.nodes.iter().enumerate() {
        for edge in &node.edges {
            for b in edge.range.lo..=edge.range.hi {
                table[i][b as usize] = Some(edge.target.0);
            }
        }
    }
    table
}

/// Refines `class_of` until no further split occurs, returning the final
/// partition and its class count.
fn refine(table: &[[Option<u32>; ALPHABET_LEN]], mut class_of: Vec<usize>) -> (Vec<usize>, usize) {
    let n = class_of.len();
    let mut num_classes = class_of.iter().copied().max().map_or(0, |m| m + 1);

    loop {
        let mut signatures: HashMap<(usize, Vec<Option<usize>>), usize> = HashMap::new();
        let mut new_class_of = vec![0usize; n];
        for i in 0..n {
            let sig: Vec<Option<usize>> = table[i]
                .iter()
                .map(|t| t.map(|target| class_of[target as usize]))
                .collect();
            let next_id = signatures.len();
            new_class_of[i] = *signatures.entry((class_of[i], sig)).or_insert(next_id);
        }
        let new_num_classes = signatures.len();
        class_of = new_class_of;
        if new_num_classes == num_classes {
            break;
        }
        num_classes = new_num_classes;
    }

    (class_of, num_classes)
}

/// Builds the minimized automaton from the final partition: one DFA node per
/// class, its representative chosen as the lowest original state index so
/// that identical input always yields byte-identical output.
fn rebuild(dfa: &Dfa, class_of: &[usize], num_classes: usize) -> Dfa {
    let mut representative = vec![usize::MAX; num_classes];
    for (i, &c) in class_of.iter().enumerate() {
        if representative[c] == usize::MAX {
            representative[c] = i;
        }
    }

    let mut nodes = vec![DfaNode::default(); num_classes];
    let mut actions = Vec::new();

    for c in 0..num_classes {
        let rep = representative[c];
        let rep_node = &dfa.nodes[rep];

        let mut merged_targets: HashMap<usize, Vec<(u8, u8)>> = HashMap::new();
        for edge in &rep_node.edges {
            merged_targets
                .entry(class_of[edge.target.0 as usize])
                .or_default()
                .push((edge.range.lo, edge.range.hi));
        }

        let mut edges = Vec::new();
        for (target_class, mut ranges) in merged_targets {
            ranges.sort_unstable();
            let mut coalesced: Vec<(u8, u8)> = Vec::new();
            for (lo, hi) in ranges {
                if let Some(last) = coalesced.last_mut() {
                    if lo as u16 <= last.1 as u16 + 1 {
                        last.1 = last.1.max(hi);
                        continue;
                    }
                }
                coalesced.push((lo, hi));
            }
            for (lo, hi) in coalesced {
                edges.push(DfaEdge {
                    range: crate::nfa::ByteRange { lo, hi },
                    target: DfaStateId(target_class as u32),
                });
            }
        }
        edges.sort_unstable_by_key(|e| e.range.lo);

        let acts = dfa.node_actions(DfaStateId(rep as u32));
        let start = actions.len() as u32;
        actions.extend_from_slice(acts);
        nodes[c] = DfaNode {
            edges,
            actions_start: start,
            actions_len: acts.len() as u32,
        };
    }

    Dfa {
        nodes,
        actions,
        root: DfaStateId(class_of[dfa.root.0 as usize] as u32),
    }
}

/// Minimizes `dfa` in place, preserving both its language and, for every
/// accepting state, its exact set of action keys.
pub fn minimize(dfa: &Dfa) -> Dfa {
    if dfa.nodes.len() <= 1 {
        return dfa.clone();
    }

    let initial = class_signature(dfa);
    let table = transition_table(dfa);
    let (class_of, num_classes) = refine(&table, initial);

    log::trace!(
        "minimization: {} DFA states -> {} states",
        dfa.nodes.len(),
        num_classes
    );
    rebuild(dfa, &class_of, num_classes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dfa;
    use crate::nfa::Nfa;
    use crate::syntax::thompson::{self, GroupBuilder};

    fn build(patterns: &[(&str, u64)]) -> dfa::Dfa {
        let mut nfa = Nfa::new();
        let mut gb = GroupBuilder::default();
        for (pattern, key) in patterns {
            thompson::add_pattern(&mut nfa, &mut gb, pattern, true, *key).unwrap();
        }
        dfa::convert(&nfa)
    }

    fn run(dfa: &dfa::Dfa, input: &[u8]) -> Vec<u64> {
        let mut state = dfa.root;
        let mut seen = Vec::new();
        seen.extend_from_slice(dfa.node_actions(state));
        for &b in input {
            match dfa.nodes[state.0 as usize].transition(b) {
                Some(next) => {
                    state = next;
                    seen.extend_from_slice(dfa.node_actions(state));
                }
                None => break,
            }
        }
        seen.sort_unstable();
        seen.dedup();
        seen
    }

    #[test]
    fn minimized_dfa_preserves_matches() {
        let before = build(&[("ad", 1), ("adserver", 2), ("evil", 3)]);
        let after = minimize(&before);
        assert!(after.nodes.len() <= before.nodes.len());

        for input in [&b"xxadyy"[..], b"adserver", b"evil", b"harmless"] {
            assert_eq!(run(&before, input), run(&after, input), "input {input:?}");
        }
    }

    #[test]
    fn states_with_different_action_sets_never_merge() {
        let before = build(&[("ad", 1), ("ev", 2)]);
        let after = minimize(&before);
        // Two distinct accepting states must remain distinct after
        // minimization since their action sets differ.
        assert_eq!(run(&after, b"xxad"), vec![1]);
        assert_eq!(run(&after, b"xxev"), vec![2]);
    }

    #[test]
    fn equivalent_branches_collapse() {
        // "ad" and "ae" share every state except the literal at depth one;
        // once tagged with the same action they should minimize to a single
        // accepting state.
        let before = build(&[("ad", 9), ("ae", 9)]);
        let after = minimize(&before);
        assert!(after.nodes.len() < before.nodes.len());
        assert_eq!(run(&after, b"xad"), vec![9]);
        assert_eq!(run(&after, b"xae"), vec![9]);
    }
}
