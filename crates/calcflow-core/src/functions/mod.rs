//! Built-in host functions

pub mod list;
pub mod math;
pub mod text;

use crate::error::{Fault, Result};
use crate::function::{Function, FunctionBuilder, Overload, Param};
use crate::promise::Promise;
use crate::value::{Value, ValueKind};
use ahash::AHashMap;
use std::sync::Arc;

type NativeBody = fn(&[Value]) -> std::result::Result<Value, Arc<Fault>>;

/// Function registry
///
/// Maps case-insensitive names to [`Value::Function`]s so they can be bound
/// into a program's root scope.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: AHashMap<String, Value>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all built-in functions
    pub fn standard() -> Result<Self> {
        let mut registry = Self::new();

        registry.register_math_functions()?;
        registry.register_text_functions()?;
        registry.register_list_functions()?;
        registry.register_async_functions()?;

        Ok(registry)
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.functions.get(&name.to_lowercase())
    }

    /// Register a function
    pub fn register(&mut self, function: Function) {
        self.functions
            .insert(function.name().to_lowercase(), Value::function(function));
    }

    /// Iterate registered functions
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.functions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn register_math_functions(&mut self) -> Result<()> {
        // SUM
        self.register(
            FunctionBuilder::new("sum")
                .overload(Overload::new(
                    [Param::Variadic(ValueKind::Number)],
                    ValueKind::Number,
                    math::fn_sum,
                ))
                .build()?,
        );

        // MIN / MAX take at least one number
        self.register(
            FunctionBuilder::new("min")
                .overload(Overload::new(
                    [
                        Param::Single(ValueKind::Number),
                        Param::Variadic(ValueKind::Number),
                    ],
                    ValueKind::Number,
                    math::fn_min,
                ))
                .build()?,
        );
        self.register(
            FunctionBuilder::new("max")
                .overload(Overload::new(
                    [
                        Param::Single(ValueKind::Number),
                        Param::Variadic(ValueKind::Number),
                    ],
                    ValueKind::Number,
                    math::fn_max,
                ))
                .build()?,
        );

        // ABS
        self.register(
            FunctionBuilder::new("abs")
                .overload(Overload::new(
                    [Param::Single(ValueKind::Number)],
                    ValueKind::Number,
                    math::fn_abs,
                ))
                .build()?,
        );

        // ROUND(number) / ROUND(number, digits)
        self.register(
            FunctionBuilder::new("round")
                .overload(Overload::new(
                    [Param::Single(ValueKind::Number)],
                    ValueKind::Number,
                    math::fn_round,
                ))
                .overload(Overload::new(
                    [
                        Param::Single(ValueKind::Number),
                        Param::Single(ValueKind::Number),
                    ],
                    ValueKind::Number,
                    math::fn_round,
                ))
                .build()?,
        );

        // NUMBER
        self.register(
            FunctionBuilder::new("number")
                .overload(Overload::new(
                    [Param::Single(ValueKind::Number)],
                    ValueKind::Number,
                    |args| Ok(args[0].clone()),
                ))
                .build()?,
        );

        Ok(())
    }

    fn register_text_functions(&mut self) -> Result<()> {
        let unary: [(&str, NativeBody, ValueKind); 4] = [
            ("len", text::fn_len, ValueKind::Number),
            ("upper", text::fn_upper, ValueKind::String),
            ("lower", text::fn_lower, ValueKind::String),
            ("text", text::fn_text, ValueKind::String),
        ];
        for (name, body, returns) in unary {
            self.register(
                FunctionBuilder::new(name)
                    .overload(Overload::new(
                        [Param::Single(ValueKind::String)],
                        returns,
                        body,
                    ))
                    .build()?,
            );
        }

        // CONCAT
        self.register(
            FunctionBuilder::new("concat")
                .overload(Overload::new(
                    [Param::Variadic(ValueKind::String)],
                    ValueKind::String,
                    text::fn_concat,
                ))
                .build()?,
        );

        Ok(())
    }

    fn register_list_functions(&mut self) -> Result<()> {
        self.register(
            FunctionBuilder::new("count")
                .overload(Overload::new(
                    [Param::Single(ValueKind::List)],
                    ValueKind::Number,
                    list::fn_count,
                ))
                .build()?,
        );

        // JOIN(list) / JOIN(list, separator)
        self.register(
            FunctionBuilder::new("join")
                .overload(Overload::new(
                    [Param::Single(ValueKind::List)],
                    ValueKind::String,
                    list::fn_join,
                ))
                .overload(Overload::new(
                    [
                        Param::Single(ValueKind::List),
                        Param::Single(ValueKind::String),
                    ],
                    ValueKind::String,
                    list::fn_join,
                ))
                .build()?,
        );

        Ok(())
    }

    fn register_async_functions(&mut self) -> Result<()> {
        // DEFER(number) settles on a later poll
        self.register(
            FunctionBuilder::new("defer")
                .overload(Overload::new(
                    [Param::Single(ValueKind::Number)],
                    ValueKind::Promise,
                    |args| {
                        let value = args[0].clone();
                        Ok(Value::Promise(Promise::new(async move {
                            tokio::task::yield_now().await;
                            value
                        })))
                    },
                ))
                .build()?,
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: &[Value]) -> Value {
        let registry = FunctionRegistry::standard().unwrap();
        registry.get(name).unwrap().invoke(args)
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = FunctionRegistry::standard().unwrap();
        assert!(registry.get("SUM").is_some());
        assert!(registry.get("Round").is_some());
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_sum() {
        assert_eq!(call("sum", &[]), Value::from(0));
        assert_eq!(
            call("sum", &[Value::from(1), Value::from("2"), Value::from(3)]),
            Value::from(6)
        );
    }

    #[test]
    fn test_round_overloads() {
        let n = Value::from(rust_decimal::Decimal::new(31459, 4));
        assert_eq!(call("round", &[n.clone()]), Value::from(3));
        assert_eq!(
            call("round", &[n, Value::from(2)]),
            Value::from(rust_decimal::Decimal::new(315, 2))
        );
        assert!(matches!(
            call("round", &[]).fault().map(|f| &**f),
            Some(Fault::Arity { .. })
        ));
    }

    #[test]
    fn test_number_parses_text() {
        assert_eq!(call("number", &[Value::from("12")]), Value::from(12));
        assert!(call("number", &[Value::from("twelve")]).is_error());
    }

    #[tokio::test]
    async fn test_defer_returns_promise() {
        let result = call("defer", &[Value::from(5)]);
        match result {
            Value::Promise(p) => assert_eq!(p.resolve().await, Value::from(5)),
            other => panic!("Expected Promise, got {:?}", other),
        }
    }
}
