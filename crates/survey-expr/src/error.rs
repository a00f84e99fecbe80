//! Error types for expression parsing.

use thiserror::Error;

/// Errors that can occur while parsing a calculation expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// Parse error at a specific position in the input.
    #[error("parse error at position {position}: {message}")]
    ParseError {
        /// Position in the input where the error occurred.
        position: usize,
        /// Description of the error.
        message: String,
    },

    /// Empty input provided.
    #[error("empty calculation expression")]
    EmptyExpression,
}

/// Result type for expression operations.
pub type ExprResult<T> = std::result::Result<T, ExprError>;
