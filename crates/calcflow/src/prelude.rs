//! Prelude module - common imports for calcflow users
//!
//! ```rust
//! use calcflow::prelude::*;
//! ```

pub use crate::{
    // Program assembly
    CompiledProgram,
    // Error types
    Error,
    // Evaluation types
    Evaluation,
    EvaluationOptions,
    EvaluationStats,
    Fault,
    Formula,
    FormulaFailure,
    // Host functions
    FunctionBuilder,
    FunctionRegistry,
    Inputs,
    Module,
    ObjectMap,
    Overload,
    Param,
    ProgramBuilder,
    Promise,
    Result,
    // Value model
    Value,
    ValueKind,
};
