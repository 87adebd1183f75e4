//! Walks a compiled bytecode program against a URL byte string (spec.md
//! §4.7), collecting the 64-bit action keys every matched DFA reports.
//!
//! There is exactly one left-to-right pass over the input per sub-program:
//! "search anywhere" semantics for unanchored patterns are already baked
//! into the automaton (the `syntax::thompson` search hub), so the
//! interpreter never needs to restart at successive offsets itself.

use std::collections::HashSet;

use crate::bytecode::{
    read_u24_le, APPEND_ACTION, APPEND_ACTION_LEN, CHECK_RANGE, CHECK_RANGE_CASE_INSENS,
    CHECK_RANGE_LEN, CHECK_VALUE_CASE_INSENS, CHECK_VALUE_CASE_SENS, CHECK_VALUE_LEN, JUMP,
    TERMINATE, TEST_FLAGS_AND_APPEND, TEST_FLAGS_AND_APPEND_LEN,
};
use crate::nfa::EOF_BYTE;

/// The byte at `position` in the augmented input: real URL bytes, then
/// exactly one synthetic [`EOF_BYTE`] once they're exhausted, then nothing.
fn input_byte(url: &[u8], position: usize) -> Option<u8> {
    match position.cmp(&url.len()) {
        std::cmp::Ordering::Less => Some(url[position]),
        std::cmp::Ordering::Equal => Some(EOF_BYTE),
        std::cmp::Ordering::Greater => None,
    }
}

fn range_contains_folded(lo: u8, hi: u8, byte: u8) -> bool {
    let folded = byte.to_ascii_lowercase();
    let lo_f = lo.to_ascii_lowercase().min(hi.to_ascii_lowercase());
    let hi_f = lo.to_ascii_lowercase().max(hi.to_ascii_lowercase());
    folded >= lo_f && folded <= hi_f
}

fn run_subprogram(body: &[u8], url: &[u8], query_flags: u16, result: &mut HashSet<u64>) {
    let mut pc = 0usize;
    let mut position = 0usize;

    loop {
        if pc >= body.len() {
            break;
        }
        match body[pc] {
            CHECK_VALUE_CASE_SENS => {
                let value = body[pc + 1];
                let target = read_u24_le(body, pc + 2) as usize;
                if input_byte(url, position) == Some(value) {
                    pc = target;
                    position += 1;
                } else {
                    pc += CHECK_VALUE_LEN as usize;
                }
            }
            CHECK_VALUE_CASE_INSENS => {
                let value = body[pc + 1];
                let target = read_u24_le(body, pc + 2) as usize;
                match input_byte(url, position) {
                    Some(b) if b.eq_ignore_ascii_case(&value) => {
                        pc = target;
                        position += 1;
                    }
                    _ => pc += CHECK_VALUE_LEN as usize,
                }
            }
            CHECK_RANGE => {
                let lo = body[pc + 1];
                let hi = body[pc + 2];
                let target = read_u24_le(body, pc + 3) as usize;
                match input_byte(url, position) {
                    Some(b) if b >= lo && b <= hi => {
                        pc = target;
                        position += 1;
                    }
                    _ => pc += CHECK_RANGE_LEN as usize,
                }
            }
            CHECK_RANGE_CASE_INSENS => {
                let lo = body[pc + 1];
                let hi = body[pc + 2];
                let target = read_u24_le(body, pc + 3) as usize;
                match input_byte(url, position) {
                    Some(b) if range_contains_folded(lo, hi, b) => {
                        pc = target;
                        position += 1;
                    }
                    _ => pc += CHECK_RANGE_LEN as usize,
                }
            }
            JUMP => {
                pc = read_u24_le(body, pc + 1) as usize;
            }
            APPEND_ACTION => {
                let offset = u32::from_le_bytes(body[pc + 1..pc + 5].try_into().unwrap());
                result.insert(offset as u64);
                pc += APPEND_ACTION_LEN as usize;
            }
            TEST_FLAGS_AND_APPEND => {
                let mask = u16::from_le_bytes(body[pc + 1..pc + 3].try_into().unwrap());
                let offset = u32::from_le_bytes(body[pc + 3..pc + 7].try_into().unwrap());
                if query_flags & mask == mask {
                    result.insert((mask as u64) << 32 | offset as u64);
                }
                pc += TEST_FLAGS_AND_APPEND_LEN as usize;
            }
            TERMINATE => break,
            other => unreachable!("invalid bytecode opcode {other:#04x}"),
        }
    }
}

/// Runs every sub-program in `bytecode` against `url`, returning the union
/// of every triggered action key. `query_flags` is the load context mask
/// (resource type, first/third-party, …) tested by `TestFlagsAndAppend`.
pub fn match_program(bytecode: &[u8], url: &[u8], query_flags: u16) -> HashSet<u64> {
    let mut result = HashSet::new();
    let mut cursor = 0usize;
    while cursor + 4 <= bytecode.len() {
        let len = u32::from_le_bytes(bytecode[cursor..cursor + 4].try_into().unwrap()) as usize;
        let body_start = cursor + 4;
        let body_end = body_start + len;
        run_subprogram(&bytecode[body_start..body_end], url, query_flags, &mut result);
        cursor = body_end;
    }
    result
}

/// The `actionsFromDFARoot` equivalent: every action reachable at a
/// sub-program's root without consuming any input — by construction
/// (`bytecode::compiler`) this is exactly the leading run of
/// `AppendAction`/`TestFlagsAndAppend` instructions before the first Check,
/// which is where universal actions are attached (spec.md §4.6 step 4).
pub fn root_actions(bytecode: &[u8], query_flags: u16) -> HashSet<u64> {
    let mut result = HashSet::new();
    let mut cursor = 0usize;
    while cursor + 4 <= bytecode.len() {
        let len = u32::from_le_bytes(bytecode[cursor..cursor + 4].try_into().unwrap()) as usize;
        let body_start = cursor + 4;
        let body = &bytecode[body_start..body_start + len];
        let mut pc = 0usize;
        while pc < body.len() {
            match body[pc] {
                APPEND_ACTION => {
                    let offset = u32::from_le_bytes(body[pc + 1..pc + 5].try_into().unwrap());
                    result.insert(offset as u64);
                    pc += APPEND_ACTION_LEN as usize;
                }
                TEST_FLAGS_AND_APPEND => {
                    let mask = u16::from_le_bytes(body[pc + 1..pc + 3].try_into().unwrap());
                    let offset = u32::from_le_bytes(body[pc + 3..pc + 7].try_into().unwrap());
                    if query_flags & mask == mask {
                        result.insert((mask as u64) << 32 | offset as u64);
                    }
                    pc += TEST_FLAGS_AND_APPEND_LEN as usize;
                }
                _ => break,
            }
        }
        cursor = body_start + len;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile_program;
    use crate::dfa as dfa_mod;
    use crate::minimize;
    use crate::nfa::Nfa;
    use crate::syntax::thompson::{self, GroupBuilder};

    fn program(patterns: &[(&str, u64)]) -> Vec<u8> {
        let mut nfa = Nfa::new();
        let mut gb = GroupBuilder::default();
        for (p, k) in patterns {
            thompson::add_pattern(&mut nfa, &mut gb, p, true, *k).unwrap();
        }
        let dfa = minimize::minimize(&dfa_mod::convert(&nfa));
        compile_program(&[dfa], &[]).unwrap()
    }

    #[test]
    fn substring_match_anywhere() {
        let bc = program(&[("ad", 1)]);
        assert_eq!(match_program(&bc, b"xxadyy", 0), HashSet::from([1u64]));
        assert_eq!(match_program(&bc, b"none here", 0), HashSet::new());
    }

    #[test]
    fn anchored_start_requires_position_zero() {
        let bc = program(&[("^ad", 1)]);
        assert_eq!(match_program(&bc, b"adyy", 0), HashSet::from([1u64]));
        assert_eq!(match_program(&bc, b"xady", 0), HashSet::new());
    }

    #[test]
    fn anchored_end_requires_true_suffix() {
        let bc = program(&[("ad$", 1)]);
        assert_eq!(match_program(&bc, b"xxad", 0), HashSet::from([1u64]));
        assert_eq!(match_program(&bc, b"xxadx", 0), HashSet::new());
    }

    #[test]
    fn flag_gated_action_requires_matching_query_flags() {
        let key = (0b10u64 << 32) | 5;
        let mut nfa = Nfa::new();
        let mut gb = GroupBuilder::default();
        thompson::add_pattern(&mut nfa, &mut gb, "ad", true, key).unwrap();
        let dfa = minimize::minimize(&dfa_mod::convert(&nfa));
        let bc = compile_program(&[dfa], &[]).unwrap();

        assert_eq!(match_program(&bc, b"xxad", 0b10), HashSet::from([key]));
        assert_eq!(match_program(&bc, b"xxad", 0b01), HashSet::new());
    }

    #[test]
    fn universal_action_always_fires_via_root() {
        let bc = program(&[("ad", 1)]);
        let bc_with_universal = {
            let mut nfa = Nfa::new();
            let mut gb = GroupBuilder::default();
            thompson::add_pattern(&mut nfa, &mut gb, "ad", true, 1).unwrap();
            let dfa = minimize::minimize(&dfa_mod::convert(&nfa));
            compile_program(&[dfa], &[999]).unwrap()
        };
        let _ = bc;
        assert_eq!(match_program(&bc_with_universal, b"zzzz", 0), HashSet::from([999u64]));
        assert_eq!(root_actions(&bc_with_universal, 0), HashSet::from([999u64]));
    }
}
