//! Program assembly and compile errors

use calcflow_formula::FormulaError;
use thiserror::Error;

/// Result type for calcflow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while assembling, compiling or starting a program.
///
/// Failures inside a formula at evaluation time are not errors; they are
/// reported in [`Evaluation::errors`](crate::Evaluation::errors).
#[derive(Debug, Error)]
pub enum Error {
    /// A name is defined twice in the same scope
    #[error("Duplicate name '{name}' in {scope}")]
    DuplicateName { scope: String, name: String },

    /// Import of a module that does not exist
    #[error("Unknown module: {0}")]
    UnknownModule(String),

    /// Import of a formula the module does not define
    #[error("Module '{module}' has no formula '{name}'")]
    UnknownFormula { module: String, name: String },

    /// Formula refers to a name no scope defines
    #[error("Unknown identifier '{name}' in {module}.{formula}")]
    UnknownIdentifier {
        module: String,
        formula: String,
        name: String,
    },

    /// Formulas that depend on each other
    #[error("Circular reference between formulas: {}", .0.join(", "))]
    CircularReference(Vec<String>),

    /// Formula failed to parse or emit
    #[error("Error in formula {module}.{formula}: {source}")]
    Formula {
        module: String,
        formula: String,
        source: FormulaError,
    },

    /// Dependency graph error
    #[error(transparent)]
    Graph(#[from] FormulaError),

    /// Host function definition error
    #[error(transparent)]
    Function(#[from] calcflow_core::Error),

    /// Async runtime unavailable for evaluation
    #[error("Runtime error: {0}")]
    Runtime(String),
}
