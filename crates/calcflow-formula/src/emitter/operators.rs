//! Operator semantics
//!
//! Every operator except `=` and `<>` casts both operands to its operand
//! kind before running; there is no short-circuiting.

use super::CompiledFormula;
use crate::ast::{BinaryOperator, UnaryOperator};
use calcflow_core::{Decimal, Fault, Value};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::MathematicalOps;

type Arithmetic = fn(Decimal, Decimal) -> Result<Decimal, Fault>;
type Comparison = fn(&Decimal, &Decimal) -> bool;

pub(super) fn unary(op: UnaryOperator, operand: CompiledFormula) -> CompiledFormula {
    match op {
        UnaryOperator::Negate => CompiledFormula::new(move |env| {
            operand
                .evaluate(env)
                .to_number()
                .map_or_else(Value::Error, |n| Value::Number(-n))
        }),
        UnaryOperator::Not => CompiledFormula::new(move |env| {
            operand
                .evaluate(env)
                .to_boolean()
                .map_or_else(Value::Error, |b| Value::Boolean(!b))
        }),
    }
}

pub(super) fn binary(
    op: BinaryOperator,
    left: CompiledFormula,
    right: CompiledFormula,
) -> CompiledFormula {
    match op {
        BinaryOperator::Add => arithmetic(left, right, add),
        BinaryOperator::Subtract => arithmetic(left, right, subtract),
        BinaryOperator::Multiply => arithmetic(left, right, multiply),
        BinaryOperator::Divide => arithmetic(left, right, divide),
        BinaryOperator::Modulo => arithmetic(left, right, modulo),
        BinaryOperator::Power => arithmetic(left, right, power),

        BinaryOperator::LessThan => comparison(left, right, Decimal::lt),
        BinaryOperator::LessEqual => comparison(left, right, Decimal::le),
        BinaryOperator::GreaterThan => comparison(left, right, Decimal::gt),
        BinaryOperator::GreaterEqual => comparison(left, right, Decimal::ge),

        BinaryOperator::Equal => equality(left, right, false),
        BinaryOperator::NotEqual => equality(left, right, true),

        BinaryOperator::And => logical(left, right, |a, b| a && b),
        BinaryOperator::Or => logical(left, right, |a, b| a || b),

        BinaryOperator::Concat => CompiledFormula::new(move |env| {
            let l = left.evaluate(env).to_text();
            let r = right.evaluate(env).to_text();
            match (l, r) {
                (Ok(a), Ok(b)) => Value::string(format!("{}{}", a, b)),
                (Err(fault), _) | (_, Err(fault)) => Value::Error(fault),
            }
        }),
    }
}

fn arithmetic(left: CompiledFormula, right: CompiledFormula, op: Arithmetic) -> CompiledFormula {
    CompiledFormula::new(move |env| {
        let l = left.evaluate(env).to_number();
        let r = right.evaluate(env).to_number();
        match (l, r) {
            (Ok(a), Ok(b)) => op(a, b).map_or_else(Value::error, Value::Number),
            (Err(fault), _) | (_, Err(fault)) => Value::Error(fault),
        }
    })
}

fn comparison(left: CompiledFormula, right: CompiledFormula, op: Comparison) -> CompiledFormula {
    CompiledFormula::new(move |env| {
        let l = left.evaluate(env).to_number();
        let r = right.evaluate(env).to_number();
        match (l, r) {
            (Ok(a), Ok(b)) => Value::Boolean(op(&a, &b)),
            (Err(fault), _) | (_, Err(fault)) => Value::Error(fault),
        }
    })
}

fn logical(
    left: CompiledFormula,
    right: CompiledFormula,
    op: fn(bool, bool) -> bool,
) -> CompiledFormula {
    CompiledFormula::new(move |env| {
        let l = left.evaluate(env).to_boolean();
        let r = right.evaluate(env).to_boolean();
        match (l, r) {
            (Ok(a), Ok(b)) => Value::Boolean(op(a, b)),
            (Err(fault), _) | (_, Err(fault)) => Value::Error(fault),
        }
    })
}

/// Raw comparison via [`Value::equal_to`]; an Error operand is re-raised
fn equality(left: CompiledFormula, right: CompiledFormula, negate: bool) -> CompiledFormula {
    CompiledFormula::new(move |env| {
        let l = left.evaluate(env);
        let r = right.evaluate(env);
        if let Some(fault) = l.fault().or_else(|| r.fault()) {
            return Value::Error(fault.clone());
        }
        Value::Boolean(l.equal_to(&r) != negate)
    })
}

// === Numeric operations ===

fn add(a: Decimal, b: Decimal) -> Result<Decimal, Fault> {
    a.checked_add(b).ok_or(Fault::Overflow)
}

fn subtract(a: Decimal, b: Decimal) -> Result<Decimal, Fault> {
    a.checked_sub(b).ok_or(Fault::Overflow)
}

fn multiply(a: Decimal, b: Decimal) -> Result<Decimal, Fault> {
    a.checked_mul(b).ok_or(Fault::Overflow)
}

fn divide(a: Decimal, b: Decimal) -> Result<Decimal, Fault> {
    if b.is_zero() {
        return Err(Fault::DivideByZero);
    }
    a.checked_div(b).ok_or(Fault::Overflow)
}

fn modulo(a: Decimal, b: Decimal) -> Result<Decimal, Fault> {
    if b.is_zero() {
        return Err(Fault::DivideByZero);
    }
    a.checked_rem(b).ok_or(Fault::Overflow)
}

fn power(base: Decimal, exponent: Decimal) -> Result<Decimal, Fault> {
    if exponent.is_zero() || base == Decimal::ONE {
        return Ok(Decimal::ONE);
    }
    if base.is_zero() {
        return if exponent.is_sign_negative() {
            Err(Fault::DivideByZero)
        } else {
            Ok(Decimal::ZERO)
        };
    }

    let integral = exponent.fract().is_zero();
    if base.is_sign_negative() && !integral {
        return Err(Fault::Domain(format!("{} ^ {}", base, exponent)));
    }

    let result = if !integral {
        base.checked_powd(exponent)
    } else if let Some(e) = exponent.to_i64() {
        base.checked_powi(e)
    } else if base == Decimal::NEGATIVE_ONE {
        let odd = !(exponent % Decimal::TWO).is_zero();
        Some(if odd { Decimal::NEGATIVE_ONE } else { Decimal::ONE })
    } else {
        None
    };

    // Out of range toward zero rounds to zero
    result.map_or_else(
        || {
            if (base.abs() < Decimal::ONE) == exponent.is_sign_positive() {
                Ok(Decimal::ZERO)
            } else {
                Err(Fault::Overflow)
            }
        },
        Ok,
    )
}
