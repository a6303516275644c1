//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors raised while parsing, emitting or ordering formulas.
///
/// None of these are runtime failures; those are carried as
/// [`Value::Error`](calcflow_core::Value::Error).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Macro called with the wrong number of arguments
    #[error("Wrong number of arguments for {name}: expected {expected}, got {actual}")]
    MacroArity {
        name: String,
        expected: String,
        actual: usize,
    },

    /// Macro argument with the wrong label or position
    #[error("Invalid argument to {name}: {message}")]
    MacroArgument { name: String, message: String },

    /// Macro node with a name the emitter does not know
    #[error("Unknown macro: {0}")]
    UnknownMacro(String),

    /// Edge endpoint missing from the vertex set
    #[error("Edge references unknown vertex: {0}")]
    UnknownVertex(String),

    /// Vertex listed twice
    #[error("Duplicate vertex: {0}")]
    DuplicateVertex(String),

    /// Ordering requested on a cyclic graph
    #[error("Circular reference detected")]
    Cycle,
}
