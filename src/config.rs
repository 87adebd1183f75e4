//! Compiler-wide knobs, built with [`bon`] the way the teacher's
//! `matcher::config` module assembles its own `Config`.

use bon::bon;

use crate::bytecode::MAX_PROGRAM_BYTES;

/// Tunables for one [`crate::compile::compile_rule_list`] call.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    max_program_bytes: u32,
    max_universal_actions: u16,
}

#[bon]
impl CompilerConfig {
    #[builder]
    pub fn new(max_program_bytes: Option<u32>, max_universal_actions: Option<u16>) -> Self {
        Self {
            max_program_bytes: max_program_bytes
                .unwrap_or(MAX_PROGRAM_BYTES)
                .min(MAX_PROGRAM_BYTES),
            max_universal_actions: max_universal_actions.unwrap_or(u16::MAX),
        }
    }

    pub fn max_program_bytes(&self) -> u32 {
        self.max_program_bytes
    }

    pub fn max_universal_actions(&self) -> u16 {
        self.max_universal_actions
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_the_24_bit_jump_limit() {
        let config = CompilerConfig::default();
        assert_eq!(config.max_program_bytes(), MAX_PROGRAM_BYTES);
    }

    #[test]
    fn caller_supplied_limit_is_clamped_to_the_hardware_ceiling() {
        let config = CompilerConfig::builder().max_program_bytes(1 << 30).build();
        assert_eq!(config.max_program_bytes(), MAX_PROGRAM_BYTES);
    }
}
