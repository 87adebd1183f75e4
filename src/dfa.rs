//! Subset construction: converts one [`Nfa`] into an equivalent [`Dfa`]
//! (spec.md §4.4), propagating each accepting NFA state's action-key set
//! into the DFA states that subsume it.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::nfa::{canonical_key, ByteRange, Nfa, StateId};

/// Canonical-key dedup map for subset construction. Keyed the same way as
/// [`crate::nfa::canonical_key`], but the value is the *DFA* state a given
/// NFA state set collapsed to, not an NFA state id — so this is its own
/// type rather than a reuse of any NFA-side alias.
type Canonical = HashMap<Box<[u32]>, DfaStateId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DfaStateId(pub u32);

#[derive(Debug, Clone, Copy)]
pub struct DfaEdge {
    pub range: ByteRange,
    pub target: DfaStateId,
}

#[derive(Debug, Clone, Default)]
pub struct DfaNode {
    /// Sorted, non-overlapping transitions. A node with high fanout could in
    /// principle prefer a flat 129-entry array instead (spec.md §4.4); every
    /// DFA built in this crate stays on the sorted-range representation,
    /// since a realistic rule list never drives one node's fanout anywhere
    /// near the full alphabet.
    pub edges: Vec<DfaEdge>,
    pub actions_start: u32,
    pub actions_len: u32,
}

impl DfaNode {
    pub fn has_actions(&self) -> bool {
        self.actions_len > 0
    }

    pub fn set_actions(&mut self, start: u32, len: u32) {
        self.actions_start = start;
        self.actions_len = len;
    }

    pub fn transition(&self, byte: u8) -> Option<DfaStateId> {
        self.edges
            .iter()
            .find(|e| e.range.contains(byte))
            .map(|e| e.target)
    }
}

/// One subset-constructed, possibly not-yet-minimized automaton. `actions`
/// is the side vector every node's `[actions_start, actions_start +
/// actions_len)` range indexes into.
#[derive(Debug, Clone, Default)]
pub struct Dfa {
    pub nodes: Vec<DfaNode>,
    pub actions: Vec<u64>,
    pub root: DfaStateId,
}

impl Dfa {
    pub fn node_actions(&self, id: DfaStateId) -> &[u64] {
        let node = &self.nodes[id.0 as usize];
        &self.actions[node.actions_start as usize..(node.actions_start + node.actions_len) as usize]
    }

    pub fn memory_used(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| {
                std::mem::size_of::<DfaNode>() + n.edges.len() * std::mem::size_of::<DfaEdge>()
            })
            .sum::<usize>()
            + self.actions.len() * std::mem::size_of::<u64>()
    }
}

/// Splits the `0..=128` byte domain covered by `states`' outgoing edges into
/// maximal runs that move to the same set of NFA states, so each run can
/// become a single DFA range edge.
fn boundaries(nfa: &Nfa, states: &[StateId]) -> Vec<u16> {
    let mut set = BTreeSet::new();
    set.insert(0u16);
    set.insert(129u16);
    for &s in states {
        for e in nfa.edges(s) {
            set.insert(e.range.lo as u16);
            set.insert(e.range.hi as u16 + 1);
        }
    }
    set.into_iter().collect()
}

/// Classical subset construction: a DFA state is the epsilon-closure of a
/// set of NFA states, discovered breadth-first and deduplicated by a
/// canonical (sorted) key so two runs over identical input produce
/// byte-identical output (spec.md §4.4 "Determinism").
pub fn convert(nfa: &Nfa) -> Dfa {
    let mut nodes: Vec<DfaNode> = Vec::new();
    let mut actions: Vec<u64> = Vec::new();
    let mut canonical: Canonical = HashMap::new();
    let mut queue: VecDeque<(DfaStateId, Vec<StateId>)> = VecDeque::new();

    let start_closure = nfa.epsilon_closure(nfa.start());
    let root = DfaStateId(0);
    canonical.insert(canonical_key(&start_closure), root);
    nodes.push(DfaNode::default());
    queue.push_back((root, start_closure));

    while let Some((dfa_id, nfa_states)) = queue.pop_front() {
        let mut acc: Vec<u64> = nfa_states
            .iter()
            .flat_map(|&s| nfa.actions(s).iter().copied())
            .collect();
        acc.sort_unstable();
        acc.dedup();
        let start = actions.len() as u32;
        actions.extend_from_slice(&acc);
        nodes[dfa_id.0 as usize].set_actions(start, acc.len() as u32);

        let bounds = boundaries(nfa, &nfa_states);
        for w in bounds.windows(2) {
            let lo = w[0] as u8;
            let hi = (w[1] - 1) as u8;

            let mut targets: Vec<StateId> = Vec::new();
            for &s in &nfa_states {
                for e in nfa.edges(s) {
                    if e.range.lo as u16 <= lo as u16 && hi as u16 <= e.range.hi as u16 {
                        targets.push(e.target);
                    }
                }
            }
            if targets.is_empty() {
                continue;
            }

            let closure = nfa.epsilon_closure_set(&targets);
            let key = canonical_key(&closure);
            let target_id = match canonical.get(&key) {
                Some(&id) => id,
                None => {
                    let id = DfaStateId(nodes.len() as u32);
                    nodes.push(DfaNode::default());
                    canonical.insert(key, id);
                    queue.push_back((id, closure));
                    id
                }
            };
            nodes[dfa_id.0 as usize].edges.push(DfaEdge {
                range: ByteRange { lo, hi },
                target: target_id,
            });
        }
    }

    log::trace!(
        "subset construction: {} NFA states -> {} DFA states",
        nfa.state_count(),
        nodes.len()
    );
    Dfa { nodes, actions, root }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::thompson::{self, GroupBuilder};

    fn build(pattern: &str, action_key: u64) -> Dfa {
        let mut nfa = Nfa::new();
        let mut gb = GroupBuilder::default();
        thompson::add_pattern(&mut nfa, &mut gb, pattern, true, action_key).unwrap();
        convert(&nfa)
    }

    fn run(dfa: &Dfa, input: &[u8]) -> Vec<u64> {
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
    fn literal_pattern_matches_only_its_substring() {
        let dfa = build("ad", 7);
        assert_eq!(run(&dfa, b"xxadyy"), vec![7]);
        assert_eq!(run(&dfa, b"xxxxx"), Vec::<u64>::new());
    }

    #[test]
    fn anchored_pattern_requires_true_start() {
        let dfa = build("^ad", 7);
        assert_eq!(run(&dfa, b"adyy"), vec![7]);
        assert_eq!(run(&dfa, b"xady"), Vec::<u64>::new());
    }

    #[test]
    fn end_anchored_pattern_requires_the_eof_probe() {
        let dfa = build("ad$", 7);
        // The real interpreter feeds an extra EOF byte (128); simulate it
        // here directly against the raw DFA.
        assert_eq!(run(&dfa, b"xxad"), Vec::<u64>::new());
        let mut input = b"xxad".to_vec();
        input.push(crate::nfa::EOF_BYTE);
        assert_eq!(run(&dfa, &input), vec![7]);
    }
}
