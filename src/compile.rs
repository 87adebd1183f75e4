//! Top-level orchestration: `rules → action buffer + bytecode program`
//! (spec.md §2 and §6 "Compiler entry point"). Grounded directly on
//! `compileRuleList` in `ContentExtensionCompiler.cpp`, which runs the same
//! seven steps in the same order.

use crate::{
    action::serialize_actions,
    bytecode,
    combined_filters::CombinedUrlFilters,
    config::CompilerConfig,
    dfa,
    error::{ContentExtensionError, Result},
    minimize,
    rule::{Action, Rule},
    syntax::ParseStatus,
};

/// Sink for the two artifacts a compile produces. Each method is called
/// exactly once, in this order: `write_actions` then `write_bytecode`
/// (spec.md §6).
pub trait CompilationClient {
    fn write_actions(&mut self, bytes: Vec<u8>) -> Result<()>;
    fn write_bytecode(&mut self, bytes: Vec<u8>) -> Result<()>;
}

/// A client that just keeps both buffers in memory; the common case for
/// tests and for callers who don't need streaming output.
#[derive(Debug, Default)]
pub struct InMemoryClient {
    pub actions: Vec<u8>,
    pub bytecode: Vec<u8>,
}

impl CompilationClient for InMemoryClient {
    fn write_actions(&mut self, bytes: Vec<u8>) -> Result<()> {
        self.actions = bytes;
        Ok(())
    }

    fn write_bytecode(&mut self, bytes: Vec<u8>) -> Result<()> {
        self.bytecode = bytes;
        Ok(())
    }
}

/// Runs the full compile pipeline over `rules`, handing the resulting
/// action buffer and bytecode program to `client`.
///
/// Steps, matching spec.md §2(a)-(g): serialize actions and record each
/// rule's offset; feed every trigger into the URL-pattern parser, which
/// either adds it to [`CombinedUrlFilters`] or (for a bare, unanchored
/// `.*`/`.+`) reports it as a universal action; partition into disjoint
/// NFAs; convert and minimize each one, releasing its NFA as soon as its DFA
/// exists; lower every DFA to bytecode, attaching universal actions to the
/// first DFA's root; hand both buffers to `client`.
pub fn compile_rule_list(
    rules: &[Rule],
    client: &mut impl CompilationClient,
    config: &CompilerConfig,
) -> Result<()> {
    let (action_buffer, locations) = serialize_actions(rules)?;

    let mut combined = CombinedUrlFilters::new();
    let mut universal_actions: Vec<u64> = Vec::new();
    let mut saw_ignore_previous_rules = false;

    for (rule, &offset) in rules.iter().zip(locations.iter()) {
        let flags = rule.trigger.flags.bits() as u64;
        let action_key = (flags << 32) | offset as u64;

        let status = combined
            .add_pattern(&rule.trigger.url_pattern, rule.trigger.case_sensitive, action_key)
            .map_err(|e| ContentExtensionError::InvalidRegex {
                pattern: rule.trigger.url_pattern.clone(),
                reason: e.message,
            })?;

        match status {
            ParseStatus::Ok => {}
            ParseStatus::MatchesEverything => {
                if saw_ignore_previous_rules {
                    return Err(ContentExtensionError::RegexMatchesEverythingAfterIgnorePreviousRules);
                }
                universal_actions.push(action_key);
            }
        }

        if rule.action == Action::IgnorePreviousRules {
            saw_ignore_previous_rules = true;
        }
    }

    universal_actions.sort_unstable();
    universal_actions.dedup();
    if universal_actions.len() > config.max_universal_actions() as usize {
        return Err(ContentExtensionError::TooManyUniversalActions);
    }

    let nfas = combined.create_nfas();
    log::debug!("partitioned rule list into {} NFA group(s)", nfas.len());

    // Each NFA is converted and minimized, then dropped, one at a time, so
    // peak memory never holds more than one NFA's working set alongside the
    // DFAs already produced (spec.md §5 "Memory discipline").
    let dfas: Vec<dfa::Dfa> = nfas
        .into_iter()
        .map(|nfa| minimize::minimize(&dfa::convert(&nfa)))
        .collect();

    let program = bytecode::compile_program_with_limit(
        &dfas,
        &universal_actions,
        config.max_program_bytes(),
    )?;

    client.write_actions(action_buffer)?;
    client.write_bytecode(program)?;
    Ok(())
}

/// Matches `url` against a compiled program, returning the set of triggered
/// action keys with `IgnorePreviousRules` semantics already applied: if the
/// result contains an `IgnorePreviousRules` action, every action whose
/// offset is lower than that action's own offset is discarded (spec.md §4.7
/// "Result", resolving the rule-order question left open by the bytecode
/// alone — offsets are assigned in rule order, so "lower offset" here means
/// "authored earlier").
///
/// `url` is a raw byte string, not `&str`: the dialect's alphabet is ASCII,
/// but a URL a caller hands in need not be valid UTF-8.
pub fn match_url(bytecode: &[u8], actions: &[u8], url: &[u8], query_flags: u16) -> std::collections::HashSet<u64> {
    let raw = bytecode::match_program(bytecode, url, query_flags);
    apply_ignore_previous_rules(actions, raw)
}

/// The `actionsFromDFARoot` equivalent: actions reachable without matching
/// any URL at all (currently, only universal actions attached to the first
/// DFA's root).
pub fn root_actions(bytecode: &[u8], query_flags: u16) -> std::collections::HashSet<u64> {
    bytecode::root_actions(bytecode, query_flags)
}

fn apply_ignore_previous_rules(
    actions: &[u8],
    keys: std::collections::HashSet<u64>,
) -> std::collections::HashSet<u64> {
    let cutoff = keys
        .iter()
        .filter(|&&key| crate::action::opcode_at(actions, (key & 0xffff_ffff) as u32) == crate::action::opcode::IGNORE_PREVIOUS_RULES)
        .map(|&key| (key & 0xffff_ffff) as u32)
        .max();

    match cutoff {
        None => keys,
        Some(cutoff) => keys
            .into_iter()
            .filter(|&key| (key & 0xffff_ffff) as u32 >= cutoff)
            .collect(),
    }
}
