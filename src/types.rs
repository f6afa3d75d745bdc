#![forbid(unsafe_code)]

use snafu::Snafu;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("format error: {0}")]
    Format(#[from] serde_json::Error),

    #[error("unknown rule type: {0}")]
    UnknownRuleType(String),

    #[error("missing options for rule type: {0}")]
    MissingRuleOptions(String),

    #[error("unknown logical mode: {0}")]
    UnknownLogicalMode(String),
}

impl RouteError {
    /// Whether the error came from the wire document itself rather than from
    /// a rule assembled in code.
    pub fn is_format(&self) -> bool {
        matches!(self, RouteError::Format(_))
    }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
/// Why a decoded rule tree would be rejected by an evaluator
pub enum ValidityError {
    #[snafu(display("rule[{index}]: missing conditions"))]
    EmptyDefaultRule { index: usize },
    #[snafu(display("rule[{index}]: logical rule without sub rules"))]
    EmptyLogicalRule { index: usize },
    #[snafu(display("rule[{index}]: sub rule[{sub_index}]: missing conditions"))]
    InvalidSubRule { index: usize, sub_index: usize },
}

impl ValidityError {
    pub fn index(&self) -> usize {
        match self {
            ValidityError::EmptyDefaultRule { index }
            | ValidityError::EmptyLogicalRule { index }
            | ValidityError::InvalidSubRule { index, .. } => *index,
        }
    }
}

pub type Result<T, E = RouteError> = std::result::Result<T, E>;
