//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violations while walking trees and parsing formulas.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("invalid regular expression '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("cannot parse expression '{expression}': {message}")]
    Syntax { expression: String, message: String },

    #[error("unknown alias: {0}")]
    UnknownAlias(String),

    #[error("cycle detected in alias chain: {}", .0.join(" -> "))]
    AliasCycle(Vec<String>),

    #[error("unknown tree variable: {0}")]
    UnknownVariable(String),

    #[error("unknown friend tree: {0}")]
    UnknownFriend(String),

    #[error("expected between {min:?} and {max:?} matches, found {found}")]
    CountMismatch {
        found: usize,
        min: Option<usize>,
        max: Option<usize>,
    },

    #[error("column length mismatch for '{name}': expected {expected}, found {found}")]
    ColumnLength {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid table format: {0}")]
    InvalidTable(String),
}

impl DomainError {
    pub(crate) fn pattern(pattern: &str, err: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
