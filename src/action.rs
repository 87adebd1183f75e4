//! Encodes [`Action`] values into the action buffer (component 2 of the
//! pipeline) and records, for every rule, the byte offset its action lives
//! at. Grounded directly on `serializeActions`/`serializeSelector` in
//! `ContentExtensionCompiler.cpp`.

use crate::{
    error::{ContentExtensionError, Result},
    rule::{Action, Rule},
};

/// Opcode bytes for the action buffer's binary layout (spec.md §6).
pub mod opcode {
    pub const BLOCK_LOAD: u8 = 0x01;
    pub const BLOCK_COOKIES: u8 = 0x02;
    pub const IGNORE_PREVIOUS_RULES: u8 = 0x03;
    pub const CSS_DISPLAY_NONE_SELECTOR: u8 = 0x04;
    pub const CSS_DISPLAY_NONE_STYLE_SHEET: u8 = 0x05;
}

fn is_latin1(s: &str) -> bool {
    s.chars().all(|c| (c as u32) <= 0xFF)
}

/// The opcode byte of the action record at `offset`, used by match-time
/// post-processing to recognize `IgnorePreviousRules` among a result set of
/// bare offsets (spec.md §4.7 / §9).
pub fn opcode_at(actions: &[u8], offset: u32) -> u8 {
    actions[offset as usize]
}

fn serialize_selector(buf: &mut Vec<u8>, opcode: u8, selector: &str) -> Result<()> {
    buf.push(opcode);

    let wide = !is_latin1(selector);
    let units: Vec<u16> = selector.encode_utf16().collect();
    let length: u32 = units
        .len()
        .try_into()
        .map_err(|_| ContentExtensionError::ActionTooLarge)?;

    buf.extend_from_slice(&length.to_le_bytes());
    buf.push(wide as u8);

    if wide {
        for unit in units {
            buf.extend_from_slice(&unit.to_le_bytes());
        }
    } else {
        for c in selector.chars() {
            buf.push(c as u32 as u8);
        }
    }
    Ok(())
}

fn serialize_plain_action(buf: &mut Vec<u8>, action: &Action) -> Result<()> {
    match action {
        Action::BlockLoad => buf.push(opcode::BLOCK_LOAD),
        Action::BlockCookies => buf.push(opcode::BLOCK_COOKIES),
        Action::IgnorePreviousRules => buf.push(opcode::IGNORE_PREVIOUS_RULES),
        Action::CssDisplayNoneSelector(s) => {
            serialize_selector(buf, opcode::CSS_DISPLAY_NONE_SELECTOR, s)?
        }
        Action::CssDisplayNoneStyleSheet(s) => {
            serialize_selector(buf, opcode::CSS_DISPLAY_NONE_STYLE_SHEET, s)?
        }
    }
    Ok(())
}

/// Serializes every rule's action into `buf`-order bytes, returning the byte
/// offset at which each rule (by original index) finds its action.
///
/// - Adjacent rules sharing an identical trigger whose actions are all CSS
///   selectors are coalesced into one multi-selector action, selectors
///   joined by `,`; every rule in the run shares one offset.
/// - Otherwise, a rule whose action is byte-equal to the immediately
///   preceding rule's action reuses that rule's offset without emitting
///   anything.
/// - Otherwise the action is appended fresh.
pub fn serialize_actions(rules: &[Rule]) -> Result<(Vec<u8>, Vec<u32>)> {
    let mut buf = Vec::new();
    let mut locations = Vec::with_capacity(rules.len());

    let mut i = 0;
    while i < rules.len() {
        let rule = &rules[i];

        if rule.action.is_css_selector() {
            let offset = buf.len() as u32;
            let mut selector = match &rule.action {
                Action::CssDisplayNoneSelector(s) => s.clone(),
                _ => unreachable!(),
            };
            locations.push(offset);

            let mut j = i + 1;
            while j < rules.len()
                && rules[j].trigger == rule.trigger
                && rules[j].action.is_css_selector()
            {
                locations.push(offset);
                if let Action::CssDisplayNoneSelector(s) = &rules[j].action {
                    selector.push(',');
                    selector.push_str(s);
                }
                j += 1;
            }

            serialize_selector(&mut buf, opcode::CSS_DISPLAY_NONE_SELECTOR, &selector)?;
            i = j;
            continue;
        }

        if i > 0 && rule.action == rules[i - 1].action {
            locations.push(locations[i - 1]);
            i += 1;
            continue;
        }

        locations.push(buf.len() as u32);
        serialize_plain_action(&mut buf, &rule.action)?;
        i += 1;
    }

    log::debug!(
        "serialized {} rules into {} action bytes",
        rules.len(),
        buf.len()
    );
    Ok((buf, locations))
}
