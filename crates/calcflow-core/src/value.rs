//! Runtime value model
//!
//! Every value a formula can produce is a [`Value`]. Failures are values
//! too: [`Value::Error`] carries a [`Fault`] so downstream code can observe
//! an upstream failure without unwinding. Accessing, casting or invoking an
//! error re-raises the same fault.

use crate::error::Fault;
use crate::function::Function;
use crate::object::ObjectMap;
use crate::promise::Promise;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The kinds of [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Boolean,
    Number,
    String,
    List,
    Object,
    Function,
    Promise,
    Error,
}

impl ValueKind {
    /// Kind name as shown in messages
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Boolean => "Boolean",
            ValueKind::Number => "Number",
            ValueKind::String => "String",
            ValueKind::List => "List",
            ValueKind::Object => "Object",
            ValueKind::Function => "Function",
            ValueKind::Promise => "Promise",
            ValueKind::Error => "Error",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A formula value
///
/// Compound kinds are shared behind `Arc`, so cloning a value is cheap and
/// identity comparisons (see [`Value::equal_to`]) are pointer comparisons.
#[derive(Debug, Clone)]
pub enum Value {
    Boolean(bool),
    Number(Decimal),
    String(Arc<str>),
    List(Arc<Vec<Value>>),
    Object(Arc<ObjectMap>),
    Function(Arc<Function>),
    Promise(Promise),
    Error(Arc<Fault>),
}

impl Value {
    /// Create a number value
    pub fn number<N: Into<Decimal>>(n: N) -> Self {
        Value::Number(n.into())
    }

    /// Create a string value
    pub fn string<S: Into<String>>(s: S) -> Self {
        Value::String(Arc::from(s.into()))
    }

    /// Create a list value
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    /// Create an object value
    pub fn object(map: ObjectMap) -> Self {
        Value::Object(Arc::new(map))
    }

    /// Create a function value
    pub fn function(function: Function) -> Self {
        Value::Function(Arc::new(function))
    }

    /// Create an error value
    pub fn error(fault: Fault) -> Self {
        Value::Error(Arc::new(fault))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Object(_) => ValueKind::Object,
            Value::Function(_) => ValueKind::Function,
            Value::Promise(_) => ValueKind::Promise,
            Value::Error(_) => ValueKind::Error,
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Get the fault if this is an error
    pub fn fault(&self) -> Option<&Arc<Fault>> {
        match self {
            Value::Error(f) => Some(f),
            _ => None,
        }
    }

    fn cast_fault(&self, to: ValueKind) -> Arc<Fault> {
        Arc::new(Fault::Cast {
            from: self.kind(),
            to,
        })
    }

    // === Typed casts ===

    /// Convert to a boolean, or the fault explaining why not
    pub fn to_boolean(&self) -> Result<bool, Arc<Fault>> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::String(s) => {
                let text = s.trim();
                if text.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if text.eq_ignore_ascii_case("false") {
                    Ok(false)
                } else {
                    Err(Arc::new(Fault::Parse {
                        text: s.to_string(),
                        to: ValueKind::Boolean,
                    }))
                }
            }
            Value::Error(f) => Err(f.clone()),
            _ => Err(self.cast_fault(ValueKind::Boolean)),
        }
    }

    /// Convert to a number, or the fault explaining why not
    pub fn to_number(&self) -> Result<Decimal, Arc<Fault>> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::String(s) => parse_number(s).ok_or_else(|| {
                Arc::new(Fault::Parse {
                    text: s.to_string(),
                    to: ValueKind::Number,
                })
            }),
            Value::Error(f) => Err(f.clone()),
            _ => Err(self.cast_fault(ValueKind::Number)),
        }
    }

    /// Convert to text, or the fault explaining why not
    pub fn to_text(&self) -> Result<Arc<str>, Arc<Fault>> {
        match self {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(Arc::from(format_number(*n))),
            Value::Boolean(b) => Ok(Arc::from(if *b { "true" } else { "false" })),
            Value::Error(f) => Err(f.clone()),
            _ => Err(self.cast_fault(ValueKind::String)),
        }
    }

    // === Value-level operations ===

    /// Cast to a Boolean value; failures become an Error value
    pub fn cast_boolean(&self) -> Value {
        self.to_boolean().map_or_else(Value::Error, Value::Boolean)
    }

    /// Cast to a Number value; failures become an Error value
    pub fn cast_number(&self) -> Value {
        self.to_number().map_or_else(Value::Error, Value::Number)
    }

    /// Cast to a String value; failures become an Error value
    pub fn cast_string(&self) -> Value {
        self.to_text().map_or_else(Value::Error, Value::String)
    }

    /// Cast to an arbitrary kind.
    ///
    /// Scalar kinds convert; compound kinds only accept values already of
    /// that kind.
    pub fn cast(&self, kind: ValueKind) -> Value {
        match kind {
            ValueKind::Boolean => self.cast_boolean(),
            ValueKind::Number => self.cast_number(),
            ValueKind::String => self.cast_string(),
            _ if self.is_error() || self.kind() == kind => self.clone(),
            _ => Value::Error(self.cast_fault(kind)),
        }
    }

    /// Look up a member
    pub fn access(&self, key: &str) -> Value {
        match self {
            Value::Object(map) => map
                .get(key)
                .cloned()
                .unwrap_or_else(|| Value::error(Fault::MissingMember(key.to_string()))),
            Value::Error(_) => self.clone(),
            other => Value::error(Fault::NoMembers(other.kind())),
        }
    }

    /// Call this value with arguments
    pub fn invoke(&self, args: &[Value]) -> Value {
        match self {
            Value::Function(f) => f.call(args),
            Value::Error(_) => self.clone(),
            other => Value::error(Fault::NotInvocable(other.kind())),
        }
    }

    /// Language-level equality.
    ///
    /// Numbers compare numerically, strings case-insensitively, and a number
    /// equals a string that parses to it. Lists, objects, functions and
    /// promises are equal only to the same instance. Every other pairing is
    /// `false`.
    pub fn equal_to(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a.to_lowercase() == b.to_lowercase(),
            (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
                parse_number(s).map_or(false, |parsed| parsed == *n)
            }
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Parse text using the invariant number format
///
/// Digit separators are rejected. Scientific notation smaller than the
/// number representation can hold rounds toward zero.
pub fn parse_number(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if text.is_empty() || text.contains('_') {
        return None;
    }
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
        .or_else(|| parse_small_scientific(text))
}

/// Most fractional digits a number can carry
const MAX_SCALE: u64 = 28;

fn parse_small_scientific(text: &str) -> Option<Decimal> {
    let (mantissa, exponent) = text.split_once(|c| c == 'e' || c == 'E')?;
    let mantissa = Decimal::from_str(mantissa).ok()?;
    let exponent: i64 = exponent.parse().ok()?;
    if exponent >= 0 {
        return None;
    }

    let scale = u64::from(mantissa.scale()) + exponent.unsigned_abs();
    let excess = scale.saturating_sub(MAX_SCALE);
    let digits = mantissa.mantissa();
    let digits = if excess > 30 {
        0
    } else {
        // Round half away from zero
        let divisor = 10i128.pow(excess as u32);
        let (quotient, remainder) = (digits / divisor, digits % divisor);
        if remainder.abs() * 2 >= divisor {
            quotient + digits.signum()
        } else {
            quotient
        }
    };
    Decimal::try_from_i128_with_scale(digits, (scale - excess) as u32).ok()
}

/// Format a number using the invariant number format (no trailing zeros)
pub fn format_number(n: Decimal) -> String {
    n.normalize().to_string()
}

/// Structural equality for host code and tests.
///
/// This is not the language's `=`; see [`Value::equal_to`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
            (Value::Error(a), Value::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Object(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
            Value::Function(func) => write!(f, "<function {}>", func.name()),
            Value::Promise(_) => f.write_str("<promise>"),
            Value::Error(fault) => write!(f, "#ERROR({})", fault),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Decimal> for Value {
    fn from(n: Decimal) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(Decimal::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Decimal::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

impl From<ObjectMap> for Value {
    fn from(map: ObjectMap) -> Self {
        Value::object(map)
    }
}

impl From<Fault> for Value {
    fn from(fault: Fault) -> Self {
        Value::error(fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn identity_function() -> Function {
        crate::FunctionBuilder::new("identity")
            .overload(crate::Overload::new(
                [crate::Param::Single(ValueKind::Number)],
                ValueKind::Number,
                |args| Ok(args[0].clone()),
            ))
            .build()
            .unwrap()
    }

    fn samples() -> Vec<Value> {
        vec![
            Value::from(true),
            Value::from(42),
            Value::from("12.5"),
            Value::from("hello"),
            Value::list(vec![Value::from(1)]),
            Value::object(ObjectMap::new()),
            Value::function(identity_function()),
            Value::Promise(Promise::resolved(Value::from(1))),
            Value::error(Fault::DivideByZero),
        ]
    }

    #[test]
    fn test_casts_are_total() {
        for value in samples() {
            let b = value.cast_boolean();
            assert!(matches!(b, Value::Boolean(_) | Value::Error(_)), "{:?}", b);
            let n = value.cast_number();
            assert!(matches!(n, Value::Number(_) | Value::Error(_)), "{:?}", n);
            let s = value.cast_string();
            assert!(matches!(s, Value::String(_) | Value::Error(_)), "{:?}", s);
        }
    }

    #[test]
    fn test_number_casts() {
        let n = Value::from(Decimal::new(2500, 2));
        assert_eq!(n.cast_number(), n);
        assert_eq!(n.cast_string(), Value::from("25"));
        assert_eq!(
            n.cast_boolean(),
            Value::error(Fault::Cast {
                from: ValueKind::Number,
                to: ValueKind::Boolean
            })
        );
    }

    #[test]
    fn test_string_casts() {
        assert_eq!(Value::from(" 1.50 ").cast_number(), Value::number(Decimal::new(150, 2)));
        assert_eq!(Value::from("1e3").cast_number(), Value::from(1000));
        assert_eq!(Value::from("TRUE").cast_boolean(), Value::from(true));
        assert!(Value::from("abc").cast_number().is_error());
        assert!(Value::from("yes").cast_boolean().is_error());
    }

    #[test]
    fn test_parse_number_format() {
        assert_eq!(parse_number("1_000"), None);
        assert!(Value::from("1_0").cast_number().is_error());
        assert!(!Value::from("1_000").equal_to(&Value::from(1000)));

        assert_eq!(parse_number("1e-100"), Some(Decimal::ZERO));
        assert_eq!(parse_number("-2.5E-40"), Some(Decimal::ZERO));
        assert_eq!(parse_number("2.5e-3"), Some(Decimal::new(25, 4)));
        assert_eq!(parse_number("1e-x"), None);
    }

    #[test]
    fn test_error_reraises() {
        let err = Value::error(Fault::Overflow);
        assert_eq!(err.cast_number(), err);
        assert_eq!(err.cast_string(), err);
        assert_eq!(err.access("x"), err);
        assert_eq!(err.invoke(&[]), err);
    }

    #[test]
    fn test_equality_rules() {
        assert!(Value::from(1).equal_to(&Value::from("1")));
        assert!(Value::from("1").equal_to(&Value::from(1)));
        assert!(Value::from("1.0").equal_to(&Value::from(1)));
        assert!(Value::from("CAT").equal_to(&Value::from("cat")));
        assert!(!Value::from(1).equal_to(&Value::from("one")));
        assert!(!Value::from(true).equal_to(&Value::from(1)));
        assert!(!Value::error(Fault::Overflow).equal_to(&Value::error(Fault::Overflow)));
    }

    #[test]
    fn test_compound_equality_is_identity() {
        let a = Value::list(vec![Value::from(1)]);
        let b = Value::list(vec![Value::from(1)]);
        assert!(a.equal_to(&a.clone()));
        assert!(!a.equal_to(&b));

        let x = Value::object(ObjectMap::new());
        let y = Value::object(ObjectMap::new());
        assert!(x.equal_to(&x.clone()));
        assert!(!x.equal_to(&y));
    }

    #[test]
    fn test_access() {
        let map: ObjectMap = [("Name", Value::from("calc"))].into_iter().collect();
        let obj = Value::object(map);
        assert_eq!(obj.access("name"), Value::from("calc"));
        assert_eq!(
            obj.access("missing"),
            Value::error(Fault::MissingMember("missing".into()))
        );
        assert_eq!(
            Value::from(1).access("x"),
            Value::error(Fault::NoMembers(ValueKind::Number))
        );
    }

    #[test]
    fn test_invoke_non_function() {
        assert_eq!(
            Value::from("f").invoke(&[]),
            Value::error(Fault::NotInvocable(ValueKind::String))
        );
    }

    #[test]
    fn test_cast_compound_kinds() {
        let list = Value::list(vec![]);
        assert_eq!(list.cast(ValueKind::List), list);
        assert!(list.cast(ValueKind::Object).is_error());
        assert!(Value::from(1).cast(ValueKind::List).is_error());
    }

    #[test]
    fn test_display() {
        let list = Value::list(vec![Value::from(1), Value::from("a"), Value::from(false)]);
        assert_eq!(list.to_string(), "[1, \"a\", false]");
        assert_eq!(Value::error(Fault::DivideByZero).to_string(), "#ERROR(Division by zero)");
    }
}
