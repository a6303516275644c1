//! # calcflow-core
//!
//! Runtime value model for calcflow formulas.
//!
//! This crate provides:
//! - [`Value`] - the closed set of value kinds, with casts and equality
//! - [`Fault`] - failure causes carried as first-class error values
//! - [`Promise`] - asynchronous computations exposed as values
//! - [`FunctionBuilder`] - host functions with arity-based overload dispatch
//! - [`FunctionRegistry`] - the built-in host functions
//!
//! ## Example
//!
//! ```rust
//! use calcflow_core::Value;
//!
//! assert!(Value::from(1).equal_to(&Value::from("1")));
//! assert_eq!(Value::from("2.50").cast_number(), Value::from(rust_decimal::Decimal::new(25, 1)));
//! assert!(Value::from("abc").cast_number().is_error());
//! ```

pub mod error;
pub mod function;
pub mod functions;
pub mod object;
pub mod promise;
pub mod value;

pub use error::{Error, Fault, Result};
pub use function::{Function, FunctionBuilder, NativeFn, Overload, Param};
pub use functions::FunctionRegistry;
pub use object::ObjectMap;
pub use promise::Promise;
pub use rust_decimal::Decimal;
pub use value::{format_number, parse_number, Value, ValueKind};
