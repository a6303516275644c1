//! # calcflow-formula
//!
//! Formula front end and compiler for calcflow.
//!
//! This crate provides:
//! - Formula parsing (text → AST)
//! - Emission (AST → [`CompiledFormula`] closure over slots)
//! - The `if`, `where`, `list` and `object` macros
//! - A generic dependency [`Graph`] with cycle detection and stage ordering
//!
//! ## Example
//!
//! ```rust
//! use calcflow_core::Value;
//! use calcflow_formula::{compile_formula, Slot, SymbolTable};
//!
//! let mut scope = SymbolTable::new();
//! scope.define("Price", Slot(0));
//!
//! let formula = compile_formula("if(Price > 10, then: Price * 2, else: 0)", &scope).unwrap();
//! assert_eq!(formula.evaluate(&vec![Value::from(12)]), Value::from(24));
//! ```

pub mod ast;
pub mod dependency;
pub mod emitter;
pub mod error;
pub mod parser;
pub mod symbols;

pub use ast::{Argument, BinaryOperator, Expr, Literal, UnaryOperator};
pub use dependency::Graph;
pub use emitter::{emit, CompiledFormula, Environment};
pub use error::{FormulaError, FormulaResult};
pub use parser::parse_formula;
pub use symbols::{Slot, SymbolTable};

/// Parse and emit formula text in one step
pub fn compile_formula(source: &str, scope: &SymbolTable<'_>) -> FormulaResult<CompiledFormula> {
    emit(&parse_formula(source)?, scope)
}
