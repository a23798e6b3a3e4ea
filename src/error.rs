//! Error taxonomy for grammar compilation and automaton driving.
//!
//! Syntax and definition errors are recoverable: the grammar is rejected
//! and the author fixes it. Every other variant signals a broken
//! integration (the filter step was bypassed, or the generation loop fed
//! the processor an inconsistent sequence) and must not be swallowed.

use thiserror::Error;

/// Maximum number of bytes of remaining input quoted in a syntax error.
const NEAR_CONTEXT_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("EBNF syntax error at line {line}, column {column}: {message} (near {near:?})")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
        near: String,
    },

    #[error("rule \"{name}\" is referenced but never defined")]
    UndefinedRule { name: String },

    #[error("start rule \"{name}\" not found in grammar")]
    UnknownStartRule { name: String },

    #[error("end-of-sequence offered but no grammar alternative is complete")]
    EndOfSequenceRejected,

    #[error("token {token_id} rejected by grammar at byte {byte_offset}")]
    TokenRejected { token_id: u32, byte_offset: usize },

    #[error("token {token_id} out of range for vocabulary of size {vocab_size}")]
    TokenOutOfRange { token_id: u32, vocab_size: usize },

    #[error("token {token_id} is a special token with no text representation")]
    SpecialToken { token_id: u32 },

    #[error("input sequence length is {actual}, expected {expected} (one new token per call)")]
    SequenceLength { expected: usize, actual: usize },

    #[error("logits vector has {actual} entries but vocabulary has {expected}")]
    LogitsLength { expected: usize, actual: usize },
}

impl GrammarError {
    /// Build a syntax error quoting the start of `remaining`.
    pub(crate) fn syntax(
        line: usize,
        column: usize,
        message: impl Into<String>,
        remaining: &[u8],
    ) -> Self {
        let cut = remaining.len().min(NEAR_CONTEXT_LEN);
        GrammarError::Syntax {
            line,
            column,
            message: message.into(),
            near: String::from_utf8_lossy(&remaining[..cut]).into_owned(),
        }
    }

    /// True for errors a grammar author can fix (as opposed to integration bugs).
    pub fn is_grammar_error(&self) -> bool {
        matches!(
            self,
            GrammarError::Syntax { .. }
                | GrammarError::UndefinedRule { .. }
                | GrammarError::UnknownStartRule { .. }
        )
    }
}

pub type Result<T, E = GrammarError> = std::result::Result<T, E>;
