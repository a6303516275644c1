//! Compile-time macro expansion
//!
//! Macros bind arguments by label, so they are expanded here into
//! conditionals and collection builders instead of dispatching at runtime.

use super::{emit, CompiledFormula};
use crate::ast::Argument;
use crate::error::{FormulaError, FormulaResult};
use crate::symbols::SymbolTable;
use calcflow_core::{Fault, ObjectMap, Value};

pub(super) fn emit_macro(
    name: &str,
    args: &[Argument],
    scope: &SymbolTable<'_>,
) -> FormulaResult<CompiledFormula> {
    match name.to_ascii_lowercase().as_str() {
        "if" => emit_if(args, scope),
        "where" => emit_where(args, scope),
        "list" => emit_list(args, scope),
        "object" => emit_object(args, scope),
        _ => {
            tracing::error!(name, "unknown macro reached emission");
            Err(FormulaError::UnknownMacro(name.to_string()))
        }
    }
}

fn argument_error(name: &str, message: String) -> FormulaError {
    FormulaError::MacroArgument {
        name: name.to_string(),
        message,
    }
}

fn describe(arg: &Argument) -> String {
    match &arg.name {
        Some(label) => format!("'{}'", label),
        None => "a positional argument".to_string(),
    }
}

/// `condition ? then : otherwise`, with condition cast to Boolean
fn conditional(
    condition: CompiledFormula,
    then: CompiledFormula,
    otherwise: CompiledFormula,
) -> CompiledFormula {
    CompiledFormula::new(move |env| match condition.evaluate(env).to_boolean() {
        Ok(true) => then.evaluate(env),
        Ok(false) => otherwise.evaluate(env),
        Err(fault) => Value::Error(fault),
    })
}

/// IF(condition, then: value, else: value)
///
/// Either branch may be left out; selecting a missing branch fails.
fn emit_if(args: &[Argument], scope: &SymbolTable<'_>) -> FormulaResult<CompiledFormula> {
    let (condition, branches) = match args {
        [condition, branches @ ..] if (1..=2).contains(&branches.len()) => (condition, branches),
        _ => {
            return Err(FormulaError::MacroArity {
                name: "if".into(),
                expected: "2 or 3".into(),
                actual: args.len(),
            })
        }
    };

    if let Some(label) = &condition.name {
        return Err(argument_error(
            "if",
            format!("condition must be positional, got '{}'", label),
        ));
    }

    let mut then = None;
    let mut otherwise = None;
    for branch in branches {
        let (slot, label) = if branch.is_named("then") {
            (&mut then, "then")
        } else if branch.is_named("else") {
            (&mut otherwise, "else")
        } else {
            return Err(argument_error(
                "if",
                format!("expected 'then' or 'else', got {}", describe(branch)),
            ));
        };
        if slot.is_some() {
            return Err(argument_error("if", format!("'{}' given twice", label)));
        }
        *slot = Some(emit(&branch.value, scope)?);
    }

    Ok(conditional(
        emit(&condition.value, scope)?,
        then.unwrap_or_else(|| CompiledFormula::failing(Fault::MissingBranch("then"))),
        otherwise.unwrap_or_else(|| CompiledFormula::failing(Fault::MissingBranch("else"))),
    ))
}

/// WHERE(case: c1, do: v1, case: c2, do: v2, ..., else: default)
///
/// Cases are tested in order and the first true one wins.
fn emit_where(args: &[Argument], scope: &SymbolTable<'_>) -> FormulaResult<CompiledFormula> {
    if args.len() < 2 {
        return Err(FormulaError::MacroArity {
            name: "where".into(),
            expected: "at least 2".into(),
            actual: args.len(),
        });
    }

    let pairs = args.chunks_exact(2);
    let default = match pairs.remainder().first() {
        None => CompiledFormula::failing(Fault::NoMatchingCase),
        Some(last) if last.name.is_none() || last.is_named("else") || last.is_named("default") => {
            emit(&last.value, scope)?
        }
        Some(last) => {
            return Err(argument_error(
                "where",
                format!("expected 'else' or 'default', got {}", describe(last)),
            ))
        }
    };

    let mut cases = Vec::with_capacity(args.len() / 2);
    for pair in pairs {
        let (case, body) = (&pair[0], &pair[1]);
        if !case.is_named("case") {
            return Err(argument_error(
                "where",
                format!("expected 'case', got {}", describe(case)),
            ));
        }
        if !body.is_named("do") {
            return Err(argument_error(
                "where",
                format!("expected 'do', got {}", describe(body)),
            ));
        }
        cases.push((emit(&case.value, scope)?, emit(&body.value, scope)?));
    }

    Ok(cases
        .into_iter()
        .rev()
        .fold(default, |otherwise, (case, body)| {
            conditional(case, body, otherwise)
        }))
}

/// LIST(a, b, ...)
///
/// An Error element makes the whole list that Error.
fn emit_list(args: &[Argument], scope: &SymbolTable<'_>) -> FormulaResult<CompiledFormula> {
    let items = args
        .iter()
        .map(|arg| emit(&arg.value, scope))
        .collect::<FormulaResult<Vec<_>>>()?;

    Ok(CompiledFormula::new(move |env| {
        let mut values = Vec::with_capacity(items.len());
        for item in &items {
            let value = item.evaluate(env);
            if value.is_error() {
                return value;
            }
            values.push(value);
        }
        Value::list(values)
    }))
}

/// OBJECT(key: value, ...)
///
/// Keys are case-insensitive and a repeated key overwrites the earlier one.
fn emit_object(args: &[Argument], scope: &SymbolTable<'_>) -> FormulaResult<CompiledFormula> {
    let mut fields = Vec::with_capacity(args.len());
    for arg in args {
        let Some(key) = &arg.name else {
            return Err(argument_error(
                "object",
                "every argument needs a key".to_string(),
            ));
        };
        fields.push((key.clone(), emit(&arg.value, scope)?));
    }

    Ok(CompiledFormula::new(move |env| {
        let mut map = ObjectMap::new();
        for (key, field) in &fields {
            let value = field.evaluate(env);
            if value.is_error() {
                return value;
            }
            map.insert(key.as_str(), value);
        }
        Value::object(map)
    }))
}
