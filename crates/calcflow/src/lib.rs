//! # calcflow
//!
//! Compile formula programs into staged execution plans and evaluate them,
//! synchronously or with asynchronous formulas.
//!
//! ## Features
//!
//! - Modules with arguments, constants, imports and formulas
//! - Dependencies derived from the names each formula references
//! - Cycle detection and the fewest possible evaluation stages
//! - Failures captured per formula and propagated to dependents only
//! - Asynchronous formulas awaited together within a stage
//!
//! ## Example
//!
//! ```rust
//! use calcflow::prelude::*;
//!
//! let program = ProgramBuilder::new()
//!     .module(
//!         Module::new("main")
//!             .formula(Formula::new("X", "1 + 2").export())
//!             .formula(Formula::new("Y", "X * 2").export()),
//!     )
//!     .compile()
//!     .unwrap();
//!
//! let evaluation = program.evaluate(&Inputs::new()).unwrap();
//! assert_eq!(evaluation.output("main", "Y"), Some(&Value::from(6)));
//! assert!(evaluation.errors.is_empty());
//! ```

pub mod error;
pub mod evaluation;
pub mod plan;
pub mod prelude;
pub mod program;

pub use error::{Error, Result};
pub use evaluation::{Evaluation, EvaluationOptions, EvaluationStats, FormulaFailure};
pub use plan::ExecutionPlan;
pub use program::{CompiledProgram, Formula, FormulaBody, Inputs, Module, ProgramBuilder};

// Re-export value model
pub use calcflow_core::{
    format_number, parse_number, Decimal, Fault, Function, FunctionBuilder, FunctionRegistry,
    ObjectMap, Overload, Param, Promise, Value, ValueKind,
};

// Re-export formula front end
pub use calcflow_formula::{
    compile_formula, emit, parse_formula, Argument, BinaryOperator, CompiledFormula, Environment,
    Expr, FormulaError, Graph, Literal, Slot, SymbolTable, UnaryOperator,
};
