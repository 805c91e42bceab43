//! Translation errors.
//!
//! Every stage of the pipeline fails with one of these. None of them are
//!  retryable: the caller gets the error and no query.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The lexer could not make sense of the input: a unary operator without
    ///  an operand, too many closing parentheses, an unterminated literal.
    #[error("Malformed expression at {position}: {reason}")]
    MalformedExpression { position: usize, reason: String },

    /// A closing parenthesis with no matching opening one (or vice versa).
    /// `position` is the index of the offending token.
    #[error("Unbalanced parentheses at token {position}")]
    UnbalancedParentheses { position: usize },

    #[error("Relational query is wrongly formed: {0}")]
    IllFormedExpression(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),
}

impl Error {
    pub(crate) fn malformed(position: usize, reason: impl Into<String>) -> Self {
        Self::MalformedExpression {
            position,
            reason: reason.into(),
        }
    }

    pub(crate) fn ill_formed(reason: impl Into<String>) -> Self {
        Self::IllFormedExpression(reason.into())
    }
}
