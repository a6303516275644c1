//! Text functions

use crate::error::Fault;
use crate::value::Value;
use rust_decimal::Decimal;
use std::sync::Arc;

type FnResult = Result<Value, Arc<Fault>>;

/// LEN(text) - length in characters
pub fn fn_len(args: &[Value]) -> FnResult {
    let text = args[0].to_text()?;
    Ok(Value::Number(Decimal::from(text.chars().count() as u64)))
}

/// UPPER(text)
pub fn fn_upper(args: &[Value]) -> FnResult {
    Ok(Value::string(args[0].to_text()?.to_uppercase()))
}

/// LOWER(text)
pub fn fn_lower(args: &[Value]) -> FnResult {
    Ok(Value::string(args[0].to_text()?.to_lowercase()))
}

/// TEXT(value) - the value's string form
pub fn fn_text(args: &[Value]) -> FnResult {
    Ok(args[0].clone())
}

/// CONCAT(text...)
pub fn fn_concat(args: &[Value]) -> FnResult {
    let mut out = String::new();
    if let Value::List(items) = &args[0] {
        for item in items.iter() {
            out.push_str(&item.to_text()?);
        }
    }
    Ok(Value::string(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_len_counts_chars() {
        assert_eq!(fn_len(&[Value::from("héllo")]).unwrap(), Value::from(5));
    }

    #[test]
    fn test_case_functions() {
        assert_eq!(fn_upper(&[Value::from("abc")]).unwrap(), Value::from("ABC"));
        assert_eq!(fn_lower(&[Value::from("AbC")]).unwrap(), Value::from("abc"));
    }

    #[test]
    fn test_concat() {
        let tail = Value::list(vec![Value::from("a"), Value::from("b"), Value::from("c")]);
        assert_eq!(fn_concat(&[tail]).unwrap(), Value::from("abc"));
    }
}
