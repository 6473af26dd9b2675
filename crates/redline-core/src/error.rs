//! Error types for the Redline engine.
//!
//! Each failure domain gets its own enum so callers can recover locally:
//! context and limit errors become short-lived user notices, replacement
//! errors are aggregated into a summary count. Transport errors live in
//! the interaction layer next to the HTTP clients.

use crate::limits::CounterKind;
use thiserror::Error;

/// Errors raised by the context store when attaching a fragment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// The store already holds the maximum number of fragments.
    #[error("a maximum of {max} context fragments can be attached at once")]
    TooManyFragments { max: usize },

    /// A single fragment is larger than the whole context budget.
    #[error("fragment has {len} characters; the maximum allowed is {max}")]
    FragmentTooLarge { len: usize, max: usize },

    /// The fragment does not fit into what is left of the budget.
    #[error("fragment has {len} characters; only {remaining} characters of the budget remain")]
    BudgetExceeded { len: usize, remaining: usize },
}

/// Error raised when a session counter is already at its ceiling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LimitError {
    #[error("limit of {ceiling} {counter} reached for this session")]
    LimitReached { counter: CounterKind, ceiling: u32 },
}

/// Errors produced while reconciling replacement directives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplacementError {
    /// The directive is missing its target or replacement text.
    #[error("directive is missing target or replacement text")]
    InvalidDirective,

    /// Neither an exact nor a fuzzy match was found in the document.
    #[error("no match found for the target text")]
    NoMatchFound,
}
