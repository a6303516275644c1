//! JSON program descriptions
//!
//! ```json
//! {
//!   "modules": [
//!     {
//!       "name": "order",
//!       "arguments": ["Price", "Qty"],
//!       "constants": { "Vat": 0.2 },
//!       "imports": [{ "alias": "M", "module": "rates", "formula": "Multiplier" }],
//!       "formulas": [
//!         { "name": "Net", "source": "Price * Qty" },
//!         { "name": "Gross", "source": "Net * (1 + Vat)", "export": true }
//!       ]
//!     }
//!   ]
//! }
//! ```

use anyhow::{anyhow, bail, Context, Result};
use calcflow::{format_number, parse_number, Formula, Inputs, Module, ObjectMap, ProgramBuilder, Value};
use serde::Deserialize;
use serde_json::Value as Json;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramFile {
    #[serde(default)]
    pub globals: serde_json::Map<String, Json>,
    pub modules: Vec<ModuleFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleFile {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub constants: serde_json::Map<String, Json>,
    #[serde(default)]
    pub imports: Vec<ImportFile>,
    #[serde(default)]
    pub formulas: Vec<FormulaFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportFile {
    pub alias: String,
    pub module: String,
    pub formula: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormulaFile {
    pub name: String,
    pub source: String,
    /// `true` exports under the formula's own name, a string renames it
    #[serde(default)]
    pub export: Option<Export>,
    #[serde(default, rename = "async")]
    pub asynchronous: bool,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Export {
    Flag(bool),
    Named(String),
}

impl ProgramFile {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Invalid program description")
    }

    /// Builder with the standard library, the file's globals and modules
    pub fn into_builder(self) -> Result<ProgramBuilder> {
        let mut builder = ProgramBuilder::new().with_standard_library()?;

        for (name, json) in &self.globals {
            let value = json_to_value(json).with_context(|| format!("Global '{}'", name))?;
            builder = builder.global(name.as_str(), value);
        }

        for file in self.modules {
            let mut module = Module::new(file.name.as_str());
            for argument in file.arguments {
                module = module.argument(argument);
            }
            for (name, json) in &file.constants {
                let value = json_to_value(json)
                    .with_context(|| format!("Constant '{}.{}'", file.name, name))?;
                module = module.constant(name.as_str(), value);
            }
            for import in file.imports {
                module = module.import(import.alias, import.module, import.formula);
            }
            for formula in file.formulas {
                module = module.formula(formula.into_formula());
            }
            builder = builder.module(module);
        }

        Ok(builder)
    }
}

impl FormulaFile {
    fn into_formula(self) -> Formula {
        let mut formula = Formula::new(self.name, self.source);
        if self.asynchronous {
            formula = formula.asynchronous();
        }
        match self.export {
            None | Some(Export::Flag(false)) => formula,
            Some(Export::Flag(true)) => formula.export(),
            Some(Export::Named(name)) => formula.export_as(name),
        }
    }
}

/// Parse `module.name=value` command-line arguments
///
/// The value is read as JSON when it parses as JSON and as a plain string
/// otherwise, so `--arg m.Name=Ada` needs no quoting.
pub fn parse_inputs<S: AsRef<str>>(args: &[S]) -> Result<Inputs> {
    let mut inputs = Inputs::new();
    for arg in args {
        let arg = arg.as_ref();
        let (target, raw) = arg
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected module.name=value, got '{}'", arg))?;
        let (module, name) = target
            .split_once('.')
            .filter(|(m, n)| !m.is_empty() && !n.is_empty())
            .ok_or_else(|| anyhow!("Expected module.name before '=', got '{}'", target))?;

        let value = match serde_json::from_str::<Json>(raw) {
            Ok(json) => json_to_value(&json).with_context(|| format!("Argument '{}'", target))?,
            Err(_) => Value::from(raw),
        };
        inputs.insert(module, name, value);
    }
    Ok(inputs)
}

pub fn json_to_value(json: &Json) -> Result<Value> {
    Ok(match json {
        Json::Null => bail!("null is not a formula value"),
        Json::Bool(b) => Value::from(*b),
        Json::Number(n) => {
            let number = parse_number(&n.to_string())
                .ok_or_else(|| anyhow!("Number {} is out of range", n))?;
            Value::from(number)
        }
        Json::String(s) => Value::from(s.as_str()),
        Json::Array(items) => {
            let items = items.iter().map(json_to_value).collect::<Result<Vec<_>>>()?;
            Value::list(items)
        }
        Json::Object(entries) => {
            let mut map = ObjectMap::new();
            for (key, item) in entries {
                map.insert(key.as_str(), json_to_value(item)?);
            }
            Value::object(map)
        }
    })
}

/// JSON rendering of a value; errors become `{"error": message}`
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Boolean(b) => Json::Bool(*b),
        Value::Number(n) => {
            let text = format_number(*n);
            text.parse::<serde_json::Number>()
                .map(Json::Number)
                .unwrap_or(Json::String(text))
        }
        Value::String(s) => Json::String(s.to_string()),
        Value::List(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Object(map) => Json::Object(
            map.iter()
                .map(|(k, v)| (k.to_string(), value_to_json(v)))
                .collect(),
        ),
        Value::Error(fault) => serde_json::json!({ "error": fault.to_string() }),
        Value::Function(_) | Value::Promise(_) => Json::String(value.to_string()),
    }
}
