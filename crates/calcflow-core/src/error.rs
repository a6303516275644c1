//! Error types for calcflow-core

use crate::value::ValueKind;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors raised while building host functions.
///
/// These are detected before any formula runs and are never captured as
/// [`Value::Error`](crate::Value::Error) data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A function was built with no overloads
    #[error("Function '{0}' has no overloads")]
    NoOverloads(String),

    /// A variadic parameter appeared before the last position
    #[error("Function '{function}': only the last parameter may be variadic (overload {overload})")]
    VariadicNotLast { function: String, overload: usize },

    /// Two overloads share the same fixed arity
    #[error("Function '{function}' has more than one overload of arity {arity}")]
    DuplicateArity { function: String, arity: usize },

    /// More than one overload is variadic
    #[error("Function '{0}' has more than one variadic overload")]
    MultipleVariadic(String),

    /// The variadic overload does not have the largest arity
    #[error("Function '{function}': variadic overload arity {variadic} must exceed every other arity (largest is {largest})")]
    VariadicNotLargest {
        function: String,
        variadic: usize,
        largest: usize,
    },

    /// A parameter or return type is not a castable value kind
    #[error("Function '{function}' uses {kind} as a parameter or return type")]
    InvalidKind { function: String, kind: ValueKind },
}

/// The cause carried by a [`Value::Error`](crate::Value::Error).
///
/// Runtime failures are values, not unwinding errors: a formula that fails
/// stores one of these and evaluation carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// Value could not be converted to the requested kind
    #[error("Cannot cast {from} to {to}")]
    Cast { from: ValueKind, to: ValueKind },

    /// Text could not be parsed as the requested kind
    #[error("Cannot parse {text:?} as {to}")]
    Parse { text: String, to: ValueKind },

    /// Object has no member with this name
    #[error("Member '{0}' not found")]
    MissingMember(String),

    /// Value kind does not support member access
    #[error("{0} values have no members")]
    NoMembers(ValueKind),

    /// No overload accepts the given number of arguments
    #[error("No overload of '{function}' accepts {actual} argument(s)")]
    Arity { function: String, actual: usize },

    /// Division or remainder by zero
    #[error("Division by zero")]
    DivideByZero,

    /// Numeric result does not fit the number representation
    #[error("Numeric overflow")]
    Overflow,

    /// Numeric result is not a real number
    #[error("{0} is not a real number")]
    Domain(String),

    /// Value kind cannot be called
    #[error("{0} values cannot be invoked")]
    NotInvocable(ValueKind),

    /// An asynchronous formula produced something other than a promise
    #[error("Asynchronous formula produced {0}, expected Promise")]
    NotAwaitable(ValueKind),

    /// A formula this one depends on failed
    #[error("Dependency failed")]
    Propagated,

    /// An `if` without the branch that was selected
    #[error("'if' has no '{0}' branch")]
    MissingBranch(&'static str),

    /// A `where` without a default and no case matched
    #[error("'where' has no matching case and no default")]
    NoMatchingCase,

    /// An argument was declared but not supplied
    #[error("Argument '{0}' was not supplied")]
    MissingArgument(String),

    /// Failure reported by a host function
    #[error("{0}")]
    Host(String),

    /// A condition no well-formed program reaches
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Fault {
    /// Create a host-function fault with a message
    pub fn host<S: Into<String>>(msg: S) -> Self {
        Fault::Host(msg.into())
    }

    /// Create an internal fault with a message
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Fault::Internal(msg.into())
    }

    /// Whether this fault stands in for an upstream failure
    pub fn is_propagated(&self) -> bool {
        matches!(self, Fault::Propagated)
    }
}
