//! Program assembly and compilation
//!
//! A program is a set of named modules. Each module declares arguments
//! (supplied per evaluation), constants, imports of other modules' formulas,
//! and formulas. Compiling resolves every name to a slot, derives the
//! dependency graph from the names each formula references, and orders the
//! formulas into stages.
//!
//! # Example
//!
//! ```rust
//! use calcflow::prelude::*;
//!
//! let program = ProgramBuilder::new()
//!     .with_standard_library()?
//!     .module(
//!         Module::new("shared")
//!             .constant("Rate", Value::from(2))
//!             .formula(Formula::new("Base", "10 * Rate")),
//!     )
//!     .module(
//!         Module::new("order")
//!             .argument("Qty")
//!             .import("Base", "shared", "Base")
//!             .formula(Formula::new("Total", "round(Qty * Base, 2)").export()),
//!     )
//!     .compile()?;
//!
//! let evaluation = program.evaluate(&Inputs::new().with("order", "Qty", 3))?;
//! assert_eq!(evaluation.output("order", "Total"), Some(&Value::from(60)));
//! # Ok::<(), calcflow::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::plan::ExecutionPlan;
use ahash::{AHashMap, AHashSet};
use calcflow_core::{FunctionRegistry, Value};
use calcflow_formula::{emit, parse_formula, CompiledFormula, Expr, Graph, Slot, SymbolTable};

/// Body of a formula: source text or a pre-built expression
#[derive(Debug, Clone)]
pub enum FormulaBody {
    Source(String),
    Expr(Expr),
}

/// A named formula declaration
#[derive(Debug, Clone)]
pub struct Formula {
    name: String,
    body: FormulaBody,
    asynchronous: bool,
    export: Option<String>,
}

impl Formula {
    /// Declare a formula from source text
    pub fn new<N: Into<String>, S: Into<String>>(name: N, source: S) -> Self {
        Self::with_body(name, FormulaBody::Source(source.into()))
    }

    /// Declare a formula from an already-built expression
    pub fn from_expr<N: Into<String>>(name: N, expr: Expr) -> Self {
        Self::with_body(name, FormulaBody::Expr(expr))
    }

    fn with_body<N: Into<String>>(name: N, body: FormulaBody) -> Self {
        Self {
            name: name.into(),
            body,
            asynchronous: false,
            export: None,
        }
    }

    /// Mark the formula as producing a promise to be awaited
    pub fn asynchronous(mut self) -> Self {
        self.asynchronous = true;
        self
    }

    /// Export the result under the formula's own name
    pub fn export(mut self) -> Self {
        self.export = Some(self.name.clone());
        self
    }

    /// Export the result under a different name
    pub fn export_as<S: Into<String>>(mut self, name: S) -> Self {
        self.export = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &FormulaBody {
        &self.body
    }

    pub fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }

    pub fn export_name(&self) -> Option<&str> {
        self.export.as_deref()
    }
}

/// Import of another module's formula under a local alias
#[derive(Debug, Clone)]
struct Import {
    alias: String,
    module: String,
    formula: String,
}

/// A module declaration
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    arguments: Vec<String>,
    constants: Vec<(String, Value)>,
    imports: Vec<Import>,
    formulas: Vec<Formula>,
}

impl Module {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            constants: Vec::new(),
            imports: Vec::new(),
            formulas: Vec::new(),
        }
    }

    /// Declare an argument supplied through [`Inputs`]
    pub fn argument<S: Into<String>>(mut self, name: S) -> Self {
        self.arguments.push(name.into());
        self
    }

    /// Declare a fixed value
    pub fn constant<S: Into<String>, V: Into<Value>>(mut self, name: S, value: V) -> Self {
        self.constants.push((name.into(), value.into()));
        self
    }

    /// Bind `alias` to `formula` of `module`
    pub fn import<A, M, F>(mut self, alias: A, module: M, formula: F) -> Self
    where
        A: Into<String>,
        M: Into<String>,
        F: Into<String>,
    {
        self.imports.push(Import {
            alias: alias.into(),
            module: module.into(),
            formula: formula.into(),
        });
        self
    }

    /// Declare a formula
    pub fn formula(mut self, formula: Formula) -> Self {
        self.formulas.push(formula);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Argument values for one evaluation, keyed by module and argument name
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    values: AHashMap<(String, String), Value>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Inputs::insert`]
    pub fn with<V: Into<Value>>(mut self, module: &str, name: &str, value: V) -> Self {
        self.insert(module, name, value);
        self
    }

    /// Set an argument value, replacing any previous one
    pub fn insert<V: Into<Value>>(&mut self, module: &str, name: &str, value: V) {
        self.values.insert(key(module, name), value.into());
    }

    pub fn get(&self, module: &str, name: &str) -> Option<&Value> {
        self.values.get(&key(module, name))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn key(module: &str, name: &str) -> (String, String) {
    (module.to_lowercase(), name.to_lowercase())
}

/// Assembles modules into a [`CompiledProgram`]
#[derive(Debug, Clone, Default)]
pub struct ProgramBuilder {
    globals: Vec<(String, Value)>,
    modules: Vec<Module>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the standard host functions into the root scope
    pub fn with_standard_library(self) -> Result<Self> {
        Ok(self.with_functions(&FunctionRegistry::standard()?))
    }

    /// Bind every function of a registry into the root scope
    pub fn with_functions(mut self, registry: &FunctionRegistry) -> Self {
        let mut functions: Vec<_> = registry.iter().collect();
        functions.sort_by(|a, b| a.0.cmp(b.0));
        for (name, function) in functions {
            self.globals.push((name.to_string(), function.clone()));
        }
        self
    }

    /// Bind a value visible from every module
    pub fn global<S: Into<String>, V: Into<Value>>(mut self, name: S, value: V) -> Self {
        self.globals.push((name.into(), value.into()));
        self
    }

    pub fn module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    /// Resolve, order and emit every formula
    pub fn compile(self) -> Result<CompiledProgram> {
        Compiler::new(self)?.compile()
    }
}

/// Where an environment slot past the formulas gets its value
#[derive(Debug, Clone)]
pub(crate) enum Seed {
    Value(Value),
    Argument { module: usize, name: String },
}

/// A compiled formula and its metadata
#[derive(Debug, Clone)]
pub(crate) struct FormulaNode {
    pub module: usize,
    pub name: String,
    pub export: Option<String>,
    pub asynchronous: bool,
    pub compiled: CompiledFormula,
}

/// A program ready to evaluate any number of times
///
/// Formula `i` owns slot `i` of the environment; constants, globals and
/// arguments follow the formulas.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub(crate) modules: Vec<String>,
    pub(crate) formulas: Vec<FormulaNode>,
    pub(crate) seeds: Vec<Seed>,
    pub(crate) plan: ExecutionPlan,
}

impl CompiledProgram {
    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn formula_count(&self) -> usize {
        self.formulas.len()
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> + '_ {
        self.modules.iter().map(String::as_str)
    }

    /// `module.formula` for a formula id
    pub fn qualified_name(&self, id: usize) -> Option<String> {
        self.formulas
            .get(id)
            .map(|f| format!("{}.{}", self.modules[f.module], f.name))
    }

    /// Formula id by module and formula name
    pub fn formula_id(&self, module: &str, name: &str) -> Option<usize> {
        self.formulas.iter().position(|f| {
            f.name.eq_ignore_ascii_case(name) && self.modules[f.module].eq_ignore_ascii_case(module)
        })
    }

    pub fn has_async_formulas(&self) -> bool {
        self.formulas.iter().any(|f| f.asynchronous)
    }

    /// Stage-by-stage qualified formula names
    pub fn describe_plan(&self) -> Vec<Vec<String>> {
        self.plan
            .stages()
            .iter()
            .map(|stage| {
                stage
                    .iter()
                    .filter_map(|&id| self.qualified_name(id))
                    .collect()
            })
            .collect()
    }
}

/// Resolution state shared by every module during compilation
struct Compiler {
    builder: ProgramBuilder,
    /// (module, formula) lowercased → formula id
    formula_ids: AHashMap<(String, String), usize>,
    /// module name lowercased → module index
    module_ids: AHashMap<String, usize>,
    seeds: Vec<Seed>,
    formula_count: usize,
}

impl Compiler {
    fn new(builder: ProgramBuilder) -> Result<Self> {
        let mut module_ids = AHashMap::new();
        let mut formula_ids = AHashMap::new();

        for (index, module) in builder.modules.iter().enumerate() {
            if module_ids.insert(module.name.to_lowercase(), index).is_some() {
                return Err(Error::DuplicateName {
                    scope: "program".into(),
                    name: module.name.clone(),
                });
            }
            for formula in &module.formulas {
                let id = formula_ids.len();
                if formula_ids.insert(key(&module.name, &formula.name), id).is_some() {
                    return Err(Error::DuplicateName {
                        scope: format!("module '{}'", module.name),
                        name: formula.name.clone(),
                    });
                }
            }
        }

        let formula_count = formula_ids.len();

        Ok(Self {
            builder,
            formula_ids,
            module_ids,
            seeds: Vec::new(),
            formula_count,
        })
    }

    /// Allocate an environment slot after the formula slots
    fn seed(&mut self, seed: Seed) -> Slot {
        self.seeds.push(seed);
        Slot(self.formula_count + self.seeds.len() - 1)
    }

    fn compile(mut self) -> Result<CompiledProgram> {
        let mut root = SymbolTable::new();
        let globals = std::mem::take(&mut self.builder.globals);
        for (name, value) in globals {
            let slot = self.seed(Seed::Value(value));
            if !root.define(&name, slot) {
                return Err(Error::DuplicateName {
                    scope: "globals".into(),
                    name,
                });
            }
        }

        let modules = std::mem::take(&mut self.builder.modules);
        let mut formulas = Vec::with_capacity(self.formula_count);
        let mut edges = Vec::new();

        for (index, module) in modules.iter().enumerate() {
            let mut scope = root.child();
            self.bind_module(index, module, &mut scope)?;

            for formula in &module.formulas {
                let id = formulas.len();
                let (node, dependencies) = self.compile_formula(index, module, formula, &scope)?;
                edges.extend(dependencies.into_iter().map(|dependency| (dependency, id)));
                formulas.push(node);
            }
        }

        let graph = Graph::new(0..self.formula_count, edges)?;
        if graph.is_cyclical() {
            let ordered: AHashSet<usize> = graph.topological_indices().into_iter().collect();
            let names = formulas
                .iter()
                .enumerate()
                .filter(|(id, _)| !ordered.contains(id))
                .map(|(_, f)| format!("{}.{}", modules[f.module].name, f.name))
                .collect();
            return Err(Error::CircularReference(names));
        }
        let plan = ExecutionPlan::from_graph(&graph)?;

        tracing::debug!(
            modules = modules.len(),
            formulas = formulas.len(),
            stages = plan.stage_count(),
            "compiled program"
        );

        Ok(CompiledProgram {
            modules: modules.into_iter().map(|m| m.name).collect(),
            formulas,
            seeds: self.seeds,
            plan,
        })
    }

    /// Define a module's arguments, constants, imports and formulas
    fn bind_module(&mut self, index: usize, module: &Module, scope: &mut SymbolTable<'_>) -> Result<()> {
        let duplicate = |name: &str| Error::DuplicateName {
            scope: format!("module '{}'", module.name),
            name: name.to_string(),
        };

        for name in &module.arguments {
            let slot = self.seed(Seed::Argument {
                module: index,
                name: name.clone(),
            });
            if !scope.define(name, slot) {
                return Err(duplicate(name));
            }
        }

        for (name, value) in &module.constants {
            let slot = self.seed(Seed::Value(value.clone()));
            if !scope.define(name, slot) {
                return Err(duplicate(name));
            }
        }

        for import in &module.imports {
            if !self.module_ids.contains_key(&import.module.to_lowercase()) {
                return Err(Error::UnknownModule(import.module.clone()));
            }
            let id = self
                .formula_ids
                .get(&key(&import.module, &import.formula))
                .copied()
                .ok_or_else(|| Error::UnknownFormula {
                    module: import.module.clone(),
                    name: import.formula.clone(),
                })?;
            if !scope.define(&import.alias, Slot(id)) {
                return Err(duplicate(&import.alias));
            }
        }

        for formula in &module.formulas {
            let Some(&id) = self.formula_ids.get(&key(&module.name, &formula.name)) else {
                continue;
            };
            if !scope.define(&formula.name, Slot(id)) {
                return Err(duplicate(&formula.name));
            }
        }

        Ok(())
    }

    /// Emit one formula and list the formula ids it reads
    fn compile_formula(
        &self,
        module_index: usize,
        module: &Module,
        formula: &Formula,
        scope: &SymbolTable<'_>,
    ) -> Result<(FormulaNode, Vec<usize>)> {
        let formula_error = |source| Error::Formula {
            module: module.name.clone(),
            formula: formula.name.clone(),
            source,
        };

        let parsed;
        let expr = match &formula.body {
            FormulaBody::Source(source) => {
                parsed = parse_formula(source).map_err(formula_error)?;
                &parsed
            }
            FormulaBody::Expr(expr) => expr,
        };

        let mut dependencies = Vec::new();
        for name in expr.identifiers() {
            match scope.resolve(name) {
                Some(Slot(slot)) if slot < self.formula_count => dependencies.push(slot),
                Some(_) => {}
                None => {
                    return Err(Error::UnknownIdentifier {
                        module: module.name.clone(),
                        formula: formula.name.clone(),
                        name: name.to_string(),
                    })
                }
            }
        }
        dependencies.sort_unstable();
        dependencies.dedup();

        let compiled = emit(expr, scope).map_err(formula_error)?;

        Ok((
            FormulaNode {
                module: module_index,
                name: formula.name.clone(),
                export: formula.export.clone(),
                asynchronous: formula.asynchronous,
                compiled,
            },
            dependencies,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stages_follow_references() {
        let program = ProgramBuilder::new()
            .module(
                Module::new("m")
                    .formula(Formula::new("D", "B + C"))
                    .formula(Formula::new("B", "A * 2"))
                    .formula(Formula::new("C", "A * 3"))
                    .formula(Formula::new("A", "1")),
            )
            .compile()
            .unwrap();

        assert_eq!(
            program.describe_plan(),
            vec![vec!["m.A"], vec!["m.B", "m.C"], vec!["m.D"]]
        );
    }

    #[test]
    fn test_imports_create_cross_module_edges() {
        let program = ProgramBuilder::new()
            .module(Module::new("a").import("Y", "b", "Y").formula(Formula::new("X", "Y + 1")))
            .module(Module::new("b").formula(Formula::new("Y", "2")))
            .compile()
            .unwrap();

        assert_eq!(program.describe_plan(), vec![vec!["b.Y"], vec!["a.X"]]);
        assert_eq!(program.formula_id("A", "x"), Some(0));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = ProgramBuilder::new()
            .module(Module::new("m").argument("X").formula(Formula::new("x", "1")))
            .compile();
        assert!(matches!(result, Err(Error::DuplicateName { .. })));

        let result = ProgramBuilder::new()
            .module(Module::new("m"))
            .module(Module::new("M"))
            .compile();
        assert!(matches!(result, Err(Error::DuplicateName { .. })));
    }

    #[test]
    fn test_unknown_imports_rejected() {
        let result = ProgramBuilder::new()
            .module(Module::new("a").import("Y", "nowhere", "Y"))
            .compile();
        assert!(matches!(result, Err(Error::UnknownModule(m)) if m == "nowhere"));

        let result = ProgramBuilder::new()
            .module(Module::new("a").import("Y", "b", "Missing"))
            .module(Module::new("b"))
            .compile();
        assert!(matches!(result, Err(Error::UnknownFormula { .. })));
    }

    #[test]
    fn test_unknown_identifier_rejected() {
        let result = ProgramBuilder::new()
            .module(Module::new("m").formula(Formula::new("X", "Nope + 1")))
            .compile();
        assert!(matches!(
            result,
            Err(Error::UnknownIdentifier { name, .. }) if name == "Nope"
        ));
    }

    #[test]
    fn test_cycle_rejected() {
        let result = ProgramBuilder::new()
            .module(
                Module::new("m")
                    .formula(Formula::new("Ok", "1"))
                    .formula(Formula::new("A", "B + Ok"))
                    .formula(Formula::new("B", "A")),
            )
            .compile();
        match result {
            Err(Error::CircularReference(names)) => assert_eq!(names, vec!["m.A", "m.B"]),
            other => panic!("Expected CircularReference, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors_name_the_formula() {
        let result = ProgramBuilder::new()
            .module(Module::new("m").formula(Formula::new("Bad", "1 +")))
            .compile();
        match result {
            Err(Error::Formula { module, formula, .. }) => {
                assert_eq!((module.as_str(), formula.as_str()), ("m", "Bad"))
            }
            other => panic!("Expected Formula error, got {:?}", other),
        }
    }

    #[test]
    fn test_inputs_are_case_insensitive() {
        let inputs = Inputs::new().with("Order", "Qty", 3);
        assert_eq!(inputs.get("order", "QTY"), Some(&Value::from(3)));
        assert_eq!(inputs.len(), 1);
    }
}
