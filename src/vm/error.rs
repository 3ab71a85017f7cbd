//! Error types for the evaluator
//!
//! Everything except [`VmError::EmptyMatch`] describes a grammar-authoring mistake or a
//! failed parse and aborts evaluation immediately. Empty matches and ordinary `eat`/`guard`
//! failures never surface here while some enclosing frame can recover from them: the
//! evaluator rejects the speculative branch and the calling rule sees a null value.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum VmError {
    /// A matcher named a language that is not reachable from the current one
    UnresolvableLanguage { from: String, reference: String },
    /// The grammar has no production for a non-token type
    UnknownProduction { language: String, node_type: String },
    /// A hold that is not the returned instruction, or whose target is not a node
    InvalidHold { node_type: String, reason: String },
    /// Two matchers supplied conflicting explicit names for one slot
    DoubleSpecifiedPath { outer: String, inner: String },
    /// A token matcher resolved to a type that is not a node
    TokenMustBeNode { node_type: String },
    /// The parse finished without consuming the whole input
    IncompleteConsumption { consumed: usize, total: usize },
    /// A zero-width match on a type the grammar does not mark emptyable
    EmptyMatch { node_type: String },
    /// A finished production issued something other than `write`
    ZombieViolation { node_type: String, verb: String },
    /// The root matcher itself failed
    ParseFailed { consumed: usize },
    /// The root matcher carried a reference of its own
    InvalidRootReference { name: String },
    /// Too many simultaneously active frames
    FrameDepthExceeded { limit: usize },
    /// A pattern failed to compile
    Pattern { pattern: String, message: String },
}

impl VmError {
    /// Whether an enclosing branch may absorb this error as an ordinary match failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, VmError::EmptyMatch { .. })
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::UnresolvableLanguage { from, reference } => {
                write!(f, "Unresolvable language '{}' (from {})", reference, from)
            }
            VmError::UnknownProduction {
                language,
                node_type,
            } => write!(f, "Unknown production {} in {}", node_type, language),
            VmError::InvalidHold { node_type, reason } => {
                write!(f, "Invalid hold for {}: {}", node_type, reason)
            }
            VmError::DoubleSpecifiedPath { outer, inner } => write!(
                f,
                "Double-specified path: '{}' conflicts with '{}'",
                inner, outer
            ),
            VmError::TokenMustBeNode { node_type } => {
                write!(f, "Token type {} must be a node", node_type)
            }
            VmError::IncompleteConsumption { consumed, total } => write!(
                f,
                "Parse ate {} of {} bytes but the input was not consumed",
                consumed, total
            ),
            VmError::EmptyMatch { node_type } => {
                write!(f, "Empty match for non-emptyable type {}", node_type)
            }
            VmError::ZombieViolation { node_type, verb } => write!(
                f,
                "Finished production {} cannot act on {{verb: {}}}",
                node_type, verb
            ),
            VmError::ParseFailed { consumed } => {
                write!(f, "Parse failed after {} bytes", consumed)
            }
            VmError::InvalidRootReference { name } => {
                write!(f, "Root matcher cannot carry a reference ('{}')", name)
            }
            VmError::FrameDepthExceeded { limit } => {
                write!(f, "Frame depth exceeded the limit of {}", limit)
            }
            VmError::Pattern { pattern, message } => {
                write!(f, "Invalid pattern /{}/: {}", pattern, message)
            }
        }
    }
}

impl std::error::Error for VmError {}

pub type VmResult<T> = Result<T, VmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_empty_match_is_recoverable() {
        assert!(VmError::EmptyMatch {
            node_type: "Number".into()
        }
        .is_recoverable());
        assert!(!VmError::ParseFailed { consumed: 0 }.is_recoverable());
        assert!(!VmError::TokenMustBeNode {
            node_type: "Number".into()
        }
        .is_recoverable());
    }

    #[test]
    fn zombie_message_names_verb() {
        let err = VmError::ZombieViolation {
            node_type: "Expression".into(),
            verb: "eat".into(),
        };
        assert_eq!(
            err.to_string(),
            "Finished production Expression cannot act on {verb: eat}"
        );
    }
}
