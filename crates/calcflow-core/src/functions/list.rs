//! List functions

use crate::error::Fault;
use crate::value::Value;
use rust_decimal::Decimal;
use std::sync::Arc;

type FnResult = Result<Value, Arc<Fault>>;

fn items(value: &Value) -> Result<&[Value], Arc<Fault>> {
    match value {
        Value::List(items) => Ok(items.as_slice()),
        Value::Error(f) => Err(f.clone()),
        other => Err(Arc::new(Fault::Cast {
            from: other.kind(),
            to: crate::value::ValueKind::List,
        })),
    }
}

/// COUNT(list)
pub fn fn_count(args: &[Value]) -> FnResult {
    Ok(Value::Number(Decimal::from(items(&args[0])?.len() as u64)))
}

/// JOIN(list, [separator]) - defaults to ", "
pub fn fn_join(args: &[Value]) -> FnResult {
    let separator = match args.get(1) {
        Some(v) => v.to_text()?,
        None => Arc::from(", "),
    };
    let parts = items(&args[0])?
        .iter()
        .map(|item| item.to_text().map(|t| t.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::string(parts.join(&*separator)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_count() {
        let list = Value::list(vec![Value::from(1), Value::from(2)]);
        assert_eq!(fn_count(&[list]).unwrap(), Value::from(2));
    }

    #[test]
    fn test_join() {
        let list = Value::list(vec![Value::from(1), Value::from("b"), Value::from(true)]);
        assert_eq!(fn_join(&[list.clone()]).unwrap(), Value::from("1, b, true"));
        assert_eq!(
            fn_join(&[list, Value::from("-")]).unwrap(),
            Value::from("1-b-true")
        );
    }

    #[test]
    fn test_join_rejects_nested_lists() {
        let nested = Value::list(vec![Value::list(vec![])]);
        assert!(fn_join(&[nested]).is_err());
    }
}
