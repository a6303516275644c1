//! Math functions

use crate::error::Fault;
use crate::value::Value;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;

type FnResult = Result<Value, Arc<Fault>>;

fn numbers(tail: &Value) -> Result<Vec<Decimal>, Arc<Fault>> {
    match tail {
        Value::List(items) => items.iter().map(Value::to_number).collect(),
        other => other.to_number().map(|n| vec![n]),
    }
}

/// SUM(number...)
pub fn fn_sum(args: &[Value]) -> FnResult {
    let mut sum = Decimal::ZERO;
    for n in numbers(&args[0])? {
        sum = sum.checked_add(n).ok_or_else(|| Arc::new(Fault::Overflow))?;
    }
    Ok(Value::Number(sum))
}

/// MIN(number, number...)
pub fn fn_min(args: &[Value]) -> FnResult {
    let mut min = args[0].to_number()?;
    for n in numbers(&args[1])? {
        min = min.min(n);
    }
    Ok(Value::Number(min))
}

/// MAX(number, number...)
pub fn fn_max(args: &[Value]) -> FnResult {
    let mut max = args[0].to_number()?;
    for n in numbers(&args[1])? {
        max = max.max(n);
    }
    Ok(Value::Number(max))
}

/// ABS(number)
pub fn fn_abs(args: &[Value]) -> FnResult {
    Ok(Value::Number(args[0].to_number()?.abs()))
}

/// ROUND(number, [num_digits]) - rounds half away from zero
pub fn fn_round(args: &[Value]) -> FnResult {
    let number = args[0].to_number()?;
    let digits = match args.get(1) {
        Some(v) => v
            .to_number()?
            .trunc()
            .to_u32()
            .ok_or_else(|| Arc::new(Fault::host("ROUND digits must be a non-negative integer")))?,
        None => 0,
    };
    Ok(Value::Number(
        number.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_min_max() {
        let tail = Value::list(vec![Value::from(5), Value::from(-2), Value::from(8)]);
        assert_eq!(fn_min(&[Value::from(3), tail.clone()]).unwrap(), Value::from(-2));
        assert_eq!(fn_max(&[Value::from(3), tail]).unwrap(), Value::from(8));
    }

    #[test]
    fn test_round_half_away_from_zero() {
        let half = Value::from(Decimal::new(25, 1));
        assert_eq!(fn_round(&[half]).unwrap(), Value::from(3));
        let neg = Value::from(Decimal::new(-25, 1));
        assert_eq!(fn_round(&[neg]).unwrap(), Value::from(-3));
    }

    #[test]
    fn test_round_rejects_negative_digits() {
        let err = fn_round(&[Value::from(1), Value::from(-1)]).unwrap_err();
        assert!(matches!(*err, Fault::Host(_)));
    }

    #[test]
    fn test_abs() {
        assert_eq!(fn_abs(&[Value::from(-4)]).unwrap(), Value::from(4));
    }
}
