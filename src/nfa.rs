//! Byte-oriented Thompson NFA arena (spec.md §3 "NFA", Design Note
//! "Graph ownership").
//!
//! States are addressed by index (`StateId(u32)`) rather than linked through
//! `Rc`/reference-counted pointers — the graph is cyclic (quantifiers loop
//! back on themselves) and an arena sidesteps cycle-aware ownership
//! entirely, the same tradeoff the teacher makes for its own
//! [`regex::nfa::NFA`](crate) (addressed via `regex_automata::util::primitives::StateID`
//! internally).
//!
//! The byte alphabet here is `0..=128`: values `0..=127` are real URL bytes
//! (the dialect promises ASCII), and `128` is a synthetic end-of-input
//! marker the [interpreter](crate::bytecode::interpreter) feeds exactly once
//! after the real input is exhausted, which is what lets a trailing `$`
//! anchor be expressed as an ordinary byte-range edge instead of a special
//! case threaded through every other component.
/// Index of a state in an [`Nfa`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub u32);

/// The synthetic "end of input" byte value. Real URL bytes are `0..=127`.
pub const EOF_BYTE: u8 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub lo: u8,
    pub hi: u8,
}

impl ByteRange {
    pub fn single(b: u8) -> Self {
        Self { lo: b, hi: b }
    }

    pub fn contains(&self, b: u8) -> bool {
        self.lo <= b && b <= self.hi
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub range: ByteRange,
    pub target: StateId,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NfaStateData {
    pub edges: Vec<Edge>,
    pub epsilons: Vec<StateId>,
    /// Action keys (`flags << 32 | action_offset`) that become triggered the
    /// moment this state is live. A non-empty set marks the state accepting.
    pub actions: Vec<u64>,
}

/// A Thompson NFA: one arena of states shared by every pattern that was
/// partitioned into the same prefix group by
/// [`CombinedUrlFilters`](crate::combined_filters::CombinedUrlFilters).
#[derive(Debug, Clone, Default)]
pub struct Nfa {
    pub(crate) states: Vec<NfaStateData>,
    pub(crate) start: StateId,
}

impl Nfa {
    /// Creates an NFA with a single, non-accepting start state.
    pub fn new() -> Self {
        let mut nfa = Self {
            states: Vec::new(),
            start: StateId(0),
        };
        nfa.start = nfa.add_state();
        nfa
    }

    pub fn start(&self) -> StateId {
        self.start
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn add_state(&mut self) -> StateId {
        let id = StateId(self.states.len() as u32);
        self.states.push(NfaStateData::default());
        id
    }

    pub fn add_epsilon(&mut self, from: StateId, to: StateId) {
        self.states[from.0 as usize].epsilons.push(to);
    }

    pub fn add_edge(&mut self, from: StateId, range: ByteRange, to: StateId) {
        self.states[from.0 as usize].edges.push(Edge { range, target: to });
    }

    pub fn add_action(&mut self, state: StateId, action_key: u64) {
        let actions = &mut self.states[state.0 as usize].actions;
        if !actions.contains(&action_key) {
            actions.push(action_key);
        }
    }

    pub fn edges(&self, state: StateId) -> &[Edge] {
        &self.states[state.0 as usize].edges
    }

    pub fn epsilons(&self, state: StateId) -> &[StateId] {
        &self.states[state.0 as usize].epsilons
    }

    pub fn actions(&self, state: StateId) -> &[u64] {
        &self.states[state.0 as usize].actions
    }

    pub fn is_empty_of_patterns(&self) -> bool {
        // Only the start state with no outgoing structure: nothing was ever
        // attached to this group.
        self.states.len() == 1
            && self.states[0].edges.is_empty()
            && self.states[0].epsilons.is_empty()
            && self.states[0].actions.is_empty()
    }

    /// Epsilon-closure of a single state: itself plus everything reachable
    /// through zero or more epsilon edges, as a sorted, deduplicated vector
    /// so it can be hashed canonically during subset construction (Design
    /// Note "Hash-based dedup").
    pub fn epsilon_closure(&self, state: StateId) -> Vec<StateId> {
        let mut closure = vec![state];
        let mut stack = vec![state];
        let mut seen = std::collections::HashSet::new();
        seen.insert(state);
        while let Some(s) = stack.pop() {
            for &next in self.epsilons(s) {
                if seen.insert(next) {
                    closure.push(next);
                    stack.push(next);
                }
            }
        }
        closure.sort_unstable();
        closure
    }

    pub fn epsilon_closure_set(&self, states: &[StateId]) -> Vec<StateId> {
        let mut seen = std::collections::HashSet::new();
        let mut closure = Vec::new();
        let mut stack = Vec::new();
        for &s in states {
            if seen.insert(s) {
                closure.push(s);
                stack.push(s);
            }
        }
        while let Some(s) = stack.pop() {
            for &next in self.epsilons(s) {
                if seen.insert(next) {
                    closure.push(next);
                    stack.push(next);
                }
            }
        }
        closure.sort_unstable();
        closure
    }

    /// Rough byte footprint, used only for diagnostic logging (mirrors
    /// `NFA::memoryUsed()` in the original, which feeds
    /// `LOG_LARGE_STRUCTURES`).
    pub fn memory_used(&self) -> usize {
        self.states
            .iter()
            .map(|s| {
                std::mem::size_of::<NfaStateData>()
                    + s.edges.len() * std::mem::size_of::<Edge>()
                    + s.epsilons.len() * std::mem::size_of::<StateId>()
                    + s.actions.len() * std::mem::size_of::<u64>()
            })
            .sum()
    }
}

/// Canonical key for a DFA-state-in-progress during subset construction:
/// the sorted, deduplicated list of NFA state ids it represents. Cheap to
/// hash and compare, which is all `HashMap`-based dedup needs.
pub(crate) fn canonical_key(states: &[StateId]) -> Box<[u32]> {
    states.iter().map(|s| s.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsilon_closure_follows_chains_and_dedups_diamonds() {
        let mut nfa = Nfa::new();
        let s0 = nfa.start();
        let s1 = nfa.add_state();
        let s2 = nfa.add_state();
        let s3 = nfa.add_state();
        nfa.add_epsilon(s0, s1);
        nfa.add_epsilon(s0, s2);
        nfa.add_epsilon(s1, s3);
        nfa.add_epsilon(s2, s3);

        let closure = nfa.epsilon_closure(s0);
        assert_eq!(closure, vec![s0, s1, s2, s3]);
    }

    #[test]
    fn fresh_nfa_has_one_empty_state() {
        let nfa = Nfa::new();
        assert_eq!(nfa.state_count(), 1);
        assert!(nfa.is_empty_of_patterns());
    }
}
