//! Formula emitter
//!
//! Translates an [`Expr`] into a [`CompiledFormula`]: a closure that reads
//! its inputs from an [`Environment`] and produces a [`Value`]. Names are
//! resolved to slots once, at emission, and macros are expanded into plain
//! conditionals and collection builders.

mod macros;
mod operators;

use crate::ast::{Expr, Literal};
use crate::error::FormulaResult;
use crate::symbols::{Slot, SymbolTable};
use calcflow_core::{Fault, Value};
use std::fmt;
use std::sync::Arc;

/// Source of slot values during evaluation
pub trait Environment {
    fn load(&self, slot: Slot) -> Value;
}

impl Environment for Vec<Value> {
    fn load(&self, slot: Slot) -> Value {
        self.get(slot.0).cloned().unwrap_or_else(|| {
            Value::error(Fault::internal(format!("slot {} is out of range", slot)))
        })
    }
}

type Body = dyn Fn(&dyn Environment) -> Value + Send + Sync;

/// Executable form of a formula
///
/// Cloning shares the closure; a compiled formula may be evaluated any
/// number of times, concurrently.
#[derive(Clone)]
pub struct CompiledFormula {
    body: Arc<Body>,
}

impl CompiledFormula {
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&dyn Environment) -> Value + Send + Sync + 'static,
    {
        Self {
            body: Arc::new(body),
        }
    }

    /// Formula that always produces `value`
    pub fn constant(value: Value) -> Self {
        Self::new(move |_| value.clone())
    }

    /// Formula that always fails with `fault`
    pub fn failing(fault: Fault) -> Self {
        Self::constant(Value::error(fault))
    }

    pub fn evaluate(&self, env: &dyn Environment) -> Value {
        (self.body)(env)
    }
}

impl fmt::Debug for CompiledFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompiledFormula")
    }
}

/// Compile an expression against a scope
///
/// Malformed macros are reported as errors. An identifier the scope cannot
/// resolve compiles to a formula that fails with an internal fault.
pub fn emit(expr: &Expr, scope: &SymbolTable<'_>) -> FormulaResult<CompiledFormula> {
    match expr {
        Expr::Literal(literal) => Ok(CompiledFormula::constant(literal_value(literal))),

        Expr::Identifier(name) => Ok(emit_identifier(name, scope)),

        Expr::Access { value, member } => {
            let value = emit(value, scope)?;
            let member = member.clone();
            Ok(CompiledFormula::new(move |env| {
                value.evaluate(env).access(&member)
            }))
        }

        Expr::Unary { op, operand } => Ok(operators::unary(*op, emit(operand, scope)?)),

        Expr::Binary { op, left, right } => Ok(operators::binary(
            *op,
            emit(left, scope)?,
            emit(right, scope)?,
        )),

        Expr::Invoke { function, args } => {
            let function = emit(function, scope)?;
            let args = args
                .iter()
                .map(|arg| emit(arg, scope))
                .collect::<FormulaResult<Vec<_>>>()?;
            Ok(CompiledFormula::new(move |env| {
                let callee = function.evaluate(env);
                let values: Vec<Value> = args.iter().map(|arg| arg.evaluate(env)).collect();
                callee.invoke(&values)
            }))
        }

        Expr::Macro { name, args } => macros::emit_macro(name, args, scope),

        Expr::Block(inner) => emit(inner, scope),
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::Number(n) => Value::Number(*n),
        Literal::String(s) => Value::string(s.as_str()),
    }
}

fn emit_identifier(name: &str, scope: &SymbolTable<'_>) -> CompiledFormula {
    match scope.resolve(name) {
        Some(slot) => CompiledFormula::new(move |env| env.load(slot)),
        None => {
            tracing::error!(identifier = name, "unresolved identifier reached emission");
            CompiledFormula::failing(Fault::internal(format!(
                "unresolved identifier '{}'",
                name
            )))
        }
    }
}
