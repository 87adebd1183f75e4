//! Lowers each minimized [`Dfa`] into one bytecode sub-program (spec.md
//! §4.6). PC slots are assigned in one forward pass over `dfa.nodes` (which
//! subset construction and minimization both leave in a stable,
//! earliest-discovery-first order), since every instruction has a
//! statically known size — there is no iterative fixed point to find, only
//! a prefix sum.

use crate::bytecode::{
    self, APPEND_ACTION_LEN, CHECK_RANGE_LEN, CHECK_VALUE_LEN, MAX_PROGRAM_BYTES, TERMINATE_LEN,
    TEST_FLAGS_AND_APPEND_LEN,
};
use crate::dfa::Dfa;
use crate::error::{ContentExtensionError, Result};

fn split_action_key(key: u64) -> (u16, u32) {
    let flags = ((key >> 32) & 0xffff) as u16;
    let offset = (key & 0xffff_ffff) as u32;
    (flags, offset)
}

fn action_instruction_len(key: u64) -> u32 {
    let (flags, _) = split_action_key(key);
    if flags == 0 {
        APPEND_ACTION_LEN
    } else {
        TEST_FLAGS_AND_APPEND_LEN
    }
}

fn emit_action(buf: &mut Vec<u8>, key: u64) {
    let (flags, offset) = split_action_key(key);
    if flags == 0 {
        buf.push(bytecode::APPEND_ACTION);
        buf.extend_from_slice(&offset.to_le_bytes());
    } else {
        buf.push(bytecode::TEST_FLAGS_AND_APPEND);
        buf.extend_from_slice(&flags.to_le_bytes());
        buf.extend_from_slice(&offset.to_le_bytes());
    }
}

fn node_len(dfa: &Dfa, index: usize, extra_actions: &[u64]) -> u32 {
    let node = &dfa.nodes[index];
    let mut len = extra_actions.iter().map(|&k| action_instruction_len(k)).sum::<u32>();
    len += dfa
        .node_actions(crate::dfa::DfaStateId(index as u32))
        .iter()
        .map(|&k| action_instruction_len(k))
        .sum::<u32>();
    len += node
        .edges
        .iter()
        .map(|e| if e.range.lo == e.range.hi { CHECK_VALUE_LEN } else { CHECK_RANGE_LEN })
        .sum::<u32>();
    len + TERMINATE_LEN
}

/// Emits one DFA's sub-program body (not including its length header).
/// `extra_root_actions` are the universal actions attached to the first
/// DFA's root (spec.md §4.6 step 4); pass an empty slice for every other
/// DFA, and for the root of any DFA that isn't first.
fn emit_subprogram(dfa: &Dfa, extra_root_actions: &[u64], max_bytes: u32) -> Result<Vec<u8>> {
    let n = dfa.nodes.len();
    let mut pc = vec![0u32; n];
    let mut offset = 0u32;
    for i in 0..n {
        pc[i] = offset;
        let extra = if i == dfa.root.0 as usize { extra_root_actions } else { &[] };
        offset = offset
            .checked_add(node_len(dfa, i, extra))
            .ok_or(ContentExtensionError::ProgramTooLarge)?;
    }
    if offset >= max_bytes {
        return Err(ContentExtensionError::ProgramTooLarge);
    }

    let mut buf = Vec::with_capacity(offset as usize);
    for i in 0..n {
        if i == dfa.root.0 as usize {
            for &key in extra_root_actions {
                emit_action(&mut buf, key);
            }
        }
        for &key in dfa.node_actions(crate::dfa::DfaStateId(i as u32)) {
            emit_action(&mut buf, key);
        }
        for edge in &dfa.nodes[i].edges {
            let target_pc = pc[edge.target.0 as usize];
            if edge.range.lo == edge.range.hi {
                buf.push(bytecode::CHECK_VALUE_CASE_SENS);
                buf.push(edge.range.lo);
                bytecode::write_u24_le(&mut buf, target_pc);
            } else {
                buf.push(bytecode::CHECK_RANGE);
                buf.push(edge.range.lo);
                buf.push(edge.range.hi);
                bytecode::write_u24_le(&mut buf, target_pc);
            }
        }
        buf.push(bytecode::TERMINATE);
    }
    debug_assert_eq!(buf.len() as u32, offset);
    Ok(buf)
}

/// A minimal sub-program with no transitions at all, carrying nothing but
/// the universal actions reachable at position zero — needed when a rule
/// list compiles to *only* universal patterns and there are no per-group
/// DFAs to attach them to.
fn emit_leaf_subprogram(actions: &[u64]) -> Vec<u8> {
    let mut buf = Vec::new();
    for &key in actions {
        emit_action(&mut buf, key);
    }
    buf.push(bytecode::TERMINATE);
    buf
}

/// Lowers every DFA into a concatenated bytecode program: one length-headed
/// sub-program per DFA, the first carrying `universal_actions` at its root.
pub fn compile_program(dfas: &[Dfa], universal_actions: &[u64]) -> Result<Vec<u8>> {
    compile_program_with_limit(dfas, universal_actions, MAX_PROGRAM_BYTES)
}

/// As [`compile_program`], but enforcing a caller-supplied per-sub-program
/// byte ceiling instead of the hardware 24-bit jump-target limit (still
/// clamped to that limit by [`crate::config::CompilerConfig`]).
pub fn compile_program_with_limit(
    dfas: &[Dfa],
    universal_actions: &[u64],
    max_bytes: u32,
) -> Result<Vec<u8>> {
    if dfas.is_empty() {
        if universal_actions.is_empty() {
            return Ok(Vec::new());
        }
        let body = emit_leaf_subprogram(universal_actions);
        let mut out = Vec::with_capacity(4 + body.len());
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        return Ok(out);
    }

    let mut out = Vec::new();
    for (i, dfa) in dfas.iter().enumerate() {
        let extra = if i == 0 { universal_actions } else { &[] };
        let body = emit_subprogram(dfa, extra, max_bytes)?;
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
    }
    log::debug!(
        "compiled {} DFAs into a {}-byte bytecode program",
        dfas.len(),
        out.len()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dfa as dfa_mod, minimize, nfa::Nfa, syntax::thompson::{self, GroupBuilder}};

    fn build(pattern: &str, key: u64) -> dfa_mod::Dfa {
        let mut nfa = Nfa::new();
        let mut gb = GroupBuilder::default();
        thompson::add_pattern(&mut nfa, &mut gb, pattern, true, key).unwrap();
        minimize::minimize(&dfa_mod::convert(&nfa))
    }

    #[test]
    fn empty_program_for_no_dfas_and_no_universal_actions() {
        let bytes = compile_program(&[], &[]).unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn leaf_program_for_universal_actions_only() {
        let bytes = compile_program(&[], &[0x0000_0000_0000_0001]).unwrap();
        let len = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        assert_eq!(len as usize, bytes.len() - 4);
        // append instruction immediately followed by terminate
        assert_eq!(bytes[4], bytecode::APPEND_ACTION);
        assert_eq!(*bytes.last().unwrap(), bytecode::TERMINATE);
    }

    #[test]
    fn single_dfa_program_has_one_length_prefixed_subprogram() {
        let dfa = build("ad", 7);
        let bytes = compile_program(&[dfa], &[]).unwrap();
        let len = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        assert_eq!(4 + len as usize, bytes.len());
    }

    #[test]
    fn universal_action_attaches_to_first_subprogram_root() {
        let dfa = build("ad", 7);
        let bytes = compile_program(&[dfa], &[99]).unwrap();
        // First instruction after the length header must be the universal
        // action's append, before any CheckValue/CheckRange for "ad".
        assert_eq!(bytes[4], bytecode::APPEND_ACTION);
        let offset = u32::from_le_bytes(bytes[5..9].try_into().unwrap());
        assert_eq!(offset, 99);
    }
}
