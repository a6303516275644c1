//! Host functions with arity-based overload dispatch
//!
//! A [`Function`] is built from one or more [`Overload`]s. Overloads are
//! keyed by their fixed arity; at most one may end in a variadic parameter
//! and it must have the largest arity. Call-time failures (no overload for
//! the argument count, a parameter that does not cast) are returned as
//! [`Value::Error`], never raised.
//!
//! ## Example
//!
//! ```rust
//! use calcflow_core::{FunctionBuilder, Overload, Param, Value, ValueKind};
//!
//! let twice = FunctionBuilder::new("twice")
//!     .overload(Overload::new(
//!         [Param::Single(ValueKind::Number)],
//!         ValueKind::Number,
//!         |args| Ok(Value::Number(args[0].to_number()? * rust_decimal::Decimal::TWO)),
//!     ))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(twice.call(&[Value::from("4")]), Value::from(8));
//! ```

use crate::error::{Error, Fault, Result};
use crate::value::{Value, ValueKind};
use std::fmt;
use std::sync::Arc;

/// Native implementation signature.
///
/// Arguments arrive already cast to the declared parameter kinds. A variadic
/// tail arrives as a single [`Value::List`] in the last position.
pub type NativeFn = dyn Fn(&[Value]) -> std::result::Result<Value, Arc<Fault>> + Send + Sync;

/// A declared parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// Exactly one argument cast to this kind
    Single(ValueKind),
    /// Any number of trailing arguments, each cast to this kind
    Variadic(ValueKind),
}

impl Param {
    pub fn kind(&self) -> ValueKind {
        match self {
            Param::Single(kind) | Param::Variadic(kind) => *kind,
        }
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self, Param::Variadic(_))
    }
}

/// One native callable and its signature
#[derive(Clone)]
pub struct Overload {
    params: Vec<Param>,
    returns: ValueKind,
    body: Arc<NativeFn>,
}

impl Overload {
    /// Create an overload
    pub fn new<P, F>(params: P, returns: ValueKind, body: F) -> Self
    where
        P: Into<Vec<Param>>,
        F: Fn(&[Value]) -> std::result::Result<Value, Arc<Fault>> + Send + Sync + 'static,
    {
        Self {
            params: params.into(),
            returns,
            body: Arc::new(body),
        }
    }

    /// Fixed arity; a variadic tail is not counted
    pub fn arity(&self) -> usize {
        self.params.iter().filter(|p| !p.is_variadic()).count()
    }

    pub fn is_variadic(&self) -> bool {
        self.params.last().map_or(false, Param::is_variadic)
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn returns(&self) -> ValueKind {
        self.returns
    }

    fn invoke(&self, args: &[Value]) -> Value {
        let fixed = self.arity();
        let mut cast_args = Vec::with_capacity(self.params.len());

        for (param, arg) in self.params.iter().zip(args.iter()).take(fixed) {
            let value = arg.cast(param.kind());
            if value.is_error() {
                return value;
            }
            cast_args.push(value);
        }

        if let Some(Param::Variadic(kind)) = self.params.last() {
            let mut tail = Vec::with_capacity(args.len().saturating_sub(fixed));
            for arg in &args[fixed..] {
                let value = arg.cast(*kind);
                if value.is_error() {
                    return value;
                }
                tail.push(value);
            }
            cast_args.push(Value::list(tail));
        }

        match (self.body)(&cast_args) {
            Ok(value) => value.cast(self.returns),
            Err(fault) => Value::Error(fault),
        }
    }
}

impl fmt::Debug for Overload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overload")
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish()
    }
}

/// A callable value dispatching on argument count
#[derive(Debug)]
pub struct Function {
    name: String,
    /// Non-variadic overloads, sorted by arity
    fixed: Vec<Overload>,
    variadic: Option<Overload>,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Select the overload for a call with `arity` arguments
    pub fn select(&self, arity: usize) -> Option<&Overload> {
        self.fixed
            .binary_search_by_key(&arity, Overload::arity)
            .ok()
            .map(|idx| &self.fixed[idx])
            .or_else(|| self.variadic.as_ref().filter(|v| v.arity() <= arity))
    }

    /// Call the function with raw arguments
    pub fn call(&self, args: &[Value]) -> Value {
        match self.select(args.len()) {
            Some(overload) => overload.invoke(args),
            None => Value::error(Fault::Arity {
                function: self.name.clone(),
                actual: args.len(),
            }),
        }
    }

    /// All overloads in arity order
    pub fn overloads(&self) -> impl Iterator<Item = &Overload> + '_ {
        self.fixed.iter().chain(self.variadic.iter())
    }
}

/// Builder validating a set of overloads into one [`Function`]
pub struct FunctionBuilder {
    name: String,
    overloads: Vec<Overload>,
}

impl FunctionBuilder {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            overloads: Vec::new(),
        }
    }

    /// Add an overload
    pub fn overload(mut self, overload: Overload) -> Self {
        self.overloads.push(overload);
        self
    }

    /// Validate the overload set and build the dispatcher
    pub fn build(self) -> Result<Function> {
        let FunctionBuilder {
            name,
            mut overloads,
        } = self;

        if overloads.is_empty() {
            return Err(Error::NoOverloads(name));
        }

        overloads.sort_by_key(Overload::arity);

        for (idx, overload) in overloads.iter().enumerate() {
            let kinds = overload
                .params
                .iter()
                .map(Param::kind)
                .chain(std::iter::once(overload.returns));
            for kind in kinds {
                if kind == ValueKind::Error {
                    return Err(Error::InvalidKind {
                        function: name,
                        kind,
                    });
                }
            }

            let last = overload.params.len().saturating_sub(1);
            if overload
                .params
                .iter()
                .enumerate()
                .any(|(pos, p)| p.is_variadic() && pos != last)
            {
                return Err(Error::VariadicNotLast {
                    function: name,
                    overload: idx,
                });
            }
        }

        for pair in overloads.windows(2) {
            if pair[0].arity() == pair[1].arity() {
                return Err(Error::DuplicateArity {
                    function: name,
                    arity: pair[0].arity(),
                });
            }
        }

        let mut variadic = None;
        let mut fixed = Vec::with_capacity(overloads.len());
        for overload in overloads {
            if overload.is_variadic() {
                if variadic.is_some() {
                    return Err(Error::MultipleVariadic(name));
                }
                variadic = Some(overload);
            } else {
                fixed.push(overload);
            }
        }

        if let Some(v) = &variadic {
            let largest = fixed.last().map_or(0, Overload::arity);
            if !fixed.is_empty() && v.arity() <= largest {
                return Err(Error::VariadicNotLargest {
                    function: name,
                    variadic: v.arity(),
                    largest,
                });
            }
        }

        Ok(Function {
            name,
            fixed,
            variadic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn describe(tag: &'static str) -> impl Fn(&[Value]) -> std::result::Result<Value, Arc<Fault>> {
        move |args| {
            let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
            Ok(Value::string(format!("{}:{}", tag, parts.join(","))))
        }
    }

    fn dispatcher() -> Function {
        FunctionBuilder::new("pick")
            .overload(Overload::new(
                [
                    Param::Single(ValueKind::Number),
                    Param::Single(ValueKind::Number),
                    Param::Variadic(ValueKind::Number),
                ],
                ValueKind::String,
                describe("variadic"),
            ))
            .overload(Overload::new(
                [Param::Single(ValueKind::Number)],
                ValueKind::String,
                describe("one"),
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_dispatch_by_arity() {
        let f = dispatcher();

        assert_eq!(
            f.call(&[]),
            Value::error(Fault::Arity {
                function: "pick".into(),
                actual: 0
            })
        );
        assert_eq!(f.call(&[Value::from("5")]), Value::from("one:5"));
        assert_eq!(
            f.call(&[1, 2, 3, 4, 5].map(Value::from)),
            Value::from("variadic:1,2,[3, 4, 5]")
        );
        assert_eq!(
            f.call(&[Value::from(1), Value::from(2)]),
            Value::from("variadic:1,2,[]")
        );
    }

    #[test]
    fn test_variadic_arity_counts_fixed_prefix_only() {
        let variadic = Overload::new(
            [
                Param::Single(ValueKind::Number),
                Param::Single(ValueKind::Number),
                Param::Variadic(ValueKind::Number),
            ],
            ValueKind::String,
            describe("variadic"),
        );
        assert_eq!(variadic.arity(), 2);
        assert!(variadic.is_variadic());

        // Five arguments: two fixed, three in the tail
        let f = dispatcher();
        assert_eq!(
            f.call(&[1, 2, 3, 4, 5].map(Value::from)),
            Value::from("variadic:1,2,[3, 4, 5]")
        );
        // One fixed argument is below the variadic prefix and picks the arity-1 overload
        assert_eq!(f.call(&[Value::from(9)]), Value::from("one:9"));
    }

    #[test]
    fn test_variadic_tail_casts_each_element() {
        let f = dispatcher();
        let result = f.call(&[
            Value::from(1),
            Value::from(2),
            Value::from("3"),
            Value::from("4.50"),
        ]);
        assert_eq!(result, Value::from("variadic:1,2,[3, 4.5]"));

        let bad = f.call(&[
            Value::from(1),
            Value::from(2),
            Value::from("three"),
        ]);
        assert!(matches!(bad.fault().map(|f| &**f), Some(Fault::Parse { .. })));
    }

    #[test]
    fn test_return_is_cast() {
        let f = FunctionBuilder::new("answer")
            .overload(Overload::new(Vec::<Param>::new(), ValueKind::String, |_| {
                Ok(Value::from(Decimal::new(4200, 2)))
            }))
            .build()
            .unwrap();
        assert_eq!(f.call(&[]), Value::from("42"));
    }

    #[test]
    fn test_build_rejects_empty() {
        let err = FunctionBuilder::new("none").build().unwrap_err();
        assert_eq!(err, Error::NoOverloads("none".into()));
    }

    #[test]
    fn test_build_rejects_duplicate_arity() {
        let err = FunctionBuilder::new("dup")
            .overload(Overload::new([Param::Single(ValueKind::Number)], ValueKind::Number, |a| Ok(a[0].clone())))
            .overload(Overload::new([Param::Single(ValueKind::String)], ValueKind::String, |a| Ok(a[0].clone())))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateArity {
                function: "dup".into(),
                arity: 1
            }
        );
    }

    #[test]
    fn test_build_rejects_misplaced_variadic() {
        let err = FunctionBuilder::new("bad")
            .overload(Overload::new(
                [Param::Variadic(ValueKind::Number), Param::Single(ValueKind::Number)],
                ValueKind::Number,
                |a| Ok(a[1].clone()),
            ))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::VariadicNotLast { .. }));
    }

    #[test]
    fn test_build_rejects_small_variadic() {
        let err = FunctionBuilder::new("small")
            .overload(Overload::new(
                [Param::Single(ValueKind::Number), Param::Single(ValueKind::Number)],
                ValueKind::Number,
                |a| Ok(a[0].clone()),
            ))
            .overload(Overload::new(
                [Param::Single(ValueKind::Number), Param::Variadic(ValueKind::Number)],
                ValueKind::Number,
                |a| Ok(a[0].clone()),
            ))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            Error::VariadicNotLargest {
                function: "small".into(),
                variadic: 1,
                largest: 2
            }
        );
    }

    #[test]
    fn test_build_rejects_two_variadics() {
        let err = FunctionBuilder::new("two")
            .overload(Overload::new([Param::Variadic(ValueKind::Number)], ValueKind::Number, |a| Ok(a[0].clone())))
            .overload(Overload::new(
                [Param::Single(ValueKind::String), Param::Variadic(ValueKind::Number)],
                ValueKind::Number,
                |a| Ok(a[0].clone()),
            ))
            .build()
            .unwrap_err();
        assert_eq!(err, Error::MultipleVariadic("two".into()));
    }

    #[test]
    fn test_build_rejects_error_kind() {
        let err = FunctionBuilder::new("oops")
            .overload(Overload::new([Param::Single(ValueKind::Error)], ValueKind::Number, |a| Ok(a[0].clone())))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            Error::InvalidKind {
                function: "oops".into(),
                kind: ValueKind::Error
            }
        );
    }
}
