use thiserror::Error;

/// Everything that can go wrong while turning a rule list into
/// (action buffer, bytecode), or while the external rule-list decoder turns
/// raw text into [`Rule`](crate::rule::Rule)s.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentExtensionError {
    /// The external rule-list decoder failed. This crate never produces this
    /// variant itself (decoding is out of scope), but it's part of the
    /// public error surface so a caller can fold its own decode errors in.
    #[error("rule list parse error at {line}:{col}: {reason}")]
    ParseFailure { line: u32, col: u32, reason: String },

    /// The URL-pattern parser rejected a trigger's pattern.
    #[error("invalid regex in trigger pattern {pattern:?}: {reason}")]
    InvalidRegex { pattern: String, reason: String },

    /// A pattern equivalent to `.*` was seen after an `IgnorePreviousRules`
    /// action earlier in the same rule list. Such a rule would unconditionally
    /// override the reset, which is almost certainly an authoring mistake.
    #[error(
        "a pattern matching everything follows an IgnorePreviousRules action"
    )]
    RegexMatchesEverythingAfterIgnorePreviousRules,

    /// A CSS selector's UTF-16 length doesn't fit in 32 bits.
    #[error("action payload exceeds 2^32 bytes")]
    ActionTooLarge,

    /// One DFA's bytecode sub-program exceeded the 24-bit jump limit (16 MiB).
    #[error(
        "compiled sub-program for one DFA exceeds the 24-bit jump limit (16 MiB)"
    )]
    ProgramTooLarge,

    /// More universal (`.*`-equivalent) actions were supplied than fit in the
    /// 16-bit action-count field on the root DFA node.
    #[error("more than 65535 universal actions were supplied")]
    TooManyUniversalActions,
}

pub type Result<T> = std::result::Result<T, ContentExtensionError>;
