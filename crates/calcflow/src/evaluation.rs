//! Evaluation scheduler
//!
//! Runs a [`CompiledProgram`] stage by stage. A formula whose body fails
//! stores the failure in its slot and disables its dependents; a disabled
//! formula is never run and stores a propagated failure, disabling its own
//! dependents in turn. Failures never stop unrelated formulas.
//!
//! Asynchronous formulas produce a [`Promise`]; the promises of one stage
//! are awaited together before the next stage starts.

use crate::error::{Error, Result};
use crate::program::{CompiledProgram, Inputs, Seed};
use calcflow_core::{Fault, ObjectMap, Promise, Value};
use calcflow_formula::{Environment, Slot};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Options for evaluation
#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    /// Include propagated failures in [`Evaluation::errors`], not only
    /// root causes (default: true)
    pub report_propagated: bool,
    /// Export failed formulas as Error values instead of leaving them out
    /// of the module outputs (default: true)
    pub export_failures: bool,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            report_propagated: true,
            export_failures: true,
        }
    }
}

/// Statistics from an evaluation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationStats {
    /// Total number of formulas
    pub formula_count: usize,
    /// Number of stages run
    pub stages: usize,
    /// Number of formula bodies invoked
    pub evaluated: usize,
    /// Number of formulas whose own body failed
    pub failed: usize,
    /// Number of formulas skipped because a dependency failed
    pub skipped: usize,
    /// Number of promises awaited
    pub awaited: usize,
}

/// A formula that ended with an Error
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaFailure {
    pub module: String,
    pub formula: String,
    pub fault: Arc<Fault>,
}

impl FormulaFailure {
    /// Whether the formula was skipped because of an upstream failure
    pub fn is_propagated(&self) -> bool {
        self.fault.is_propagated()
    }
}

impl fmt::Display for FormulaFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.module, self.formula, self.fault)
    }
}

/// Result of evaluating a program
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Module name → Object of exported values
    pub outputs: ObjectMap,
    /// Every failure of the run, in evaluation order
    pub errors: Vec<FormulaFailure>,
    pub stats: EvaluationStats,
    values: Vec<Value>,
}

impl Evaluation {
    /// Exported values of a module
    pub fn module(&self, name: &str) -> Option<&ObjectMap> {
        match self.outputs.get(name) {
            Some(Value::Object(map)) => Some(&**map),
            _ => None,
        }
    }

    /// One exported value
    pub fn output(&self, module: &str, name: &str) -> Option<&Value> {
        self.module(module).and_then(|m| m.get(name))
    }

    /// Final value of any formula by id, exported or not
    pub fn value(&self, id: usize) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

impl CompiledProgram {
    /// Evaluate with default options
    ///
    /// Programs with asynchronous formulas are driven on a private
    /// current-thread runtime, so this must not be called from inside an
    /// async runtime; use [`CompiledProgram::evaluate_async`] there.
    pub fn evaluate(&self, inputs: &Inputs) -> Result<Evaluation> {
        self.evaluate_with_options(inputs, &EvaluationOptions::default())
    }

    /// Evaluate with custom options
    pub fn evaluate_with_options(
        &self,
        inputs: &Inputs,
        options: &EvaluationOptions,
    ) -> Result<Evaluation> {
        if !self.has_async_formulas() {
            let mut run = EvaluationRun::new(self, inputs);
            for (index, stage) in self.plan.stages().iter().enumerate() {
                // Only asynchronous formulas leave promises pending
                run.start_stage(index, stage);
            }
            return Ok(run.finish(options));
        }

        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(Error::Runtime(
                "evaluate() cannot block inside an async runtime; use evaluate_async()".into(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(|e| Error::Runtime(e.to_string()))?;

        Ok(runtime.block_on(self.evaluate_async_with_options(inputs, options)))
    }

    /// Evaluate with default options inside the caller's tokio runtime
    pub async fn evaluate_async(&self, inputs: &Inputs) -> Evaluation {
        self.evaluate_async_with_options(inputs, &EvaluationOptions::default())
            .await
    }

    /// Evaluate with custom options inside the caller's tokio runtime
    pub async fn evaluate_async_with_options(
        &self,
        inputs: &Inputs,
        options: &EvaluationOptions,
    ) -> Evaluation {
        let mut run = EvaluationRun::new(self, inputs);
        for (index, stage) in self.plan.stages().iter().enumerate() {
            let pending = run.start_stage(index, stage);
            if !pending.is_empty() {
                let settled = resolve_all(pending).await;
                run.settle_promises(settled);
            }
        }
        run.finish(options)
    }
}

/// Await a stage's promises together
async fn resolve_all(pending: Vec<(usize, Promise)>) -> Vec<(usize, Value)> {
    let ids: Vec<usize> = pending.iter().map(|(id, _)| *id).collect();
    let mut results: Vec<Option<Value>> = vec![None; pending.len()];

    let mut tasks = JoinSet::new();
    for (position, (_, promise)) in pending.into_iter().enumerate() {
        tasks.spawn(async move { (position, promise.resolve().await) });
    }
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((position, value)) => results[position] = Some(value),
            Err(err) => tracing::error!(error = %err, "promise task did not complete"),
        }
    }

    ids.into_iter()
        .zip(results)
        .map(|(id, value)| {
            let value = value
                .unwrap_or_else(|| Value::error(Fault::internal("promise task did not complete")));
            (id, value)
        })
        .collect()
}

/// Per-call mutable state; discarded when the run finishes
struct EvaluationRun<'p> {
    program: &'p CompiledProgram,
    /// Values of the slots after the formula slots
    seeds: Vec<Value>,
    /// Formula results, written once
    slots: Vec<Option<Value>>,
    /// Starts true; set to false when a dependency fails
    may_run: Vec<bool>,
    /// (formula id, fault) in the order failures happened
    failures: Vec<(usize, Arc<Fault>)>,
    propagated: Arc<Fault>,
    stats: EvaluationStats,
}

impl<'p> EvaluationRun<'p> {
    fn new(program: &'p CompiledProgram, inputs: &Inputs) -> Self {
        let seeds = program
            .seeds
            .iter()
            .map(|seed| match seed {
                Seed::Value(value) => value.clone(),
                Seed::Argument { module, name } => {
                    let module = &program.modules[*module];
                    inputs.get(module, name).cloned().unwrap_or_else(|| {
                        Value::error(Fault::MissingArgument(format!("{}.{}", module, name)))
                    })
                }
            })
            .collect();

        let count = program.formulas.len();
        Self {
            program,
            seeds,
            slots: vec![None; count],
            may_run: vec![true; count],
            failures: Vec::new(),
            propagated: Arc::new(Fault::Propagated),
            stats: EvaluationStats {
                formula_count: count,
                ..Default::default()
            },
        }
    }

    fn name(&self, id: usize) -> String {
        self.program.qualified_name(id).unwrap_or_default()
    }

    /// Run the synchronous part of a stage and return its pending promises
    fn start_stage(&mut self, index: usize, stage: &[usize]) -> Vec<(usize, Promise)> {
        tracing::debug!(stage = index, formulas = stage.len(), "starting stage");
        self.stats.stages += 1;

        let program = self.program;
        let mut pending = Vec::new();

        for &id in stage {
            if !self.may_run[id] {
                self.skip(id);
                continue;
            }

            let node = &program.formulas[id];
            tracing::trace!(formula = %self.name(id), "evaluating formula");
            let value = node.compiled.evaluate(&*self);
            self.stats.evaluated += 1;

            if !node.asynchronous {
                self.settle(id, value);
                continue;
            }
            match value {
                Value::Promise(promise) => pending.push((id, promise)),
                Value::Error(fault) => self.fail(id, fault),
                other => self.fail(id, Arc::new(Fault::NotAwaitable(other.kind()))),
            }
        }

        pending
    }

    fn settle_promises<I>(&mut self, settled: I)
    where
        I: IntoIterator<Item = (usize, Value)>,
    {
        for (id, value) in settled {
            self.stats.awaited += 1;
            self.settle(id, value);
        }
    }

    fn settle(&mut self, id: usize, value: Value) {
        match value {
            Value::Error(fault) => self.fail(id, fault),
            value => self.slots[id] = Some(value),
        }
    }

    fn fail(&mut self, id: usize, fault: Arc<Fault>) {
        tracing::warn!(formula = %self.name(id), error = %fault, "formula failed");
        self.stats.failed += 1;
        self.record_failure(id, fault);
    }

    fn skip(&mut self, id: usize) {
        tracing::trace!(formula = %self.name(id), "skipping formula after upstream failure");
        self.stats.skipped += 1;
        let fault = Arc::clone(&self.propagated);
        self.record_failure(id, fault);
    }

    fn record_failure(&mut self, id: usize, fault: Arc<Fault>) {
        self.slots[id] = Some(Value::Error(Arc::clone(&fault)));
        self.failures.push((id, fault));
        for &dependent in self.program.plan.dependents(id) {
            self.may_run[dependent] = false;
        }
    }

    fn finish(self, options: &EvaluationOptions) -> Evaluation {
        let program = self.program;
        let values: Vec<Value> = self
            .slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Value::error(Fault::internal("formula was never scheduled")))
            })
            .collect();

        let mut modules: Vec<ObjectMap> = vec![ObjectMap::new(); program.modules.len()];
        for (node, value) in program.formulas.iter().zip(&values) {
            let Some(export) = &node.export else {
                continue;
            };
            if value.is_error() && !options.export_failures {
                continue;
            }
            modules[node.module].insert(export.as_str(), value.clone());
        }
        let outputs = program
            .modules
            .iter()
            .zip(modules)
            .map(|(name, exports)| (name.as_str(), Value::object(exports)))
            .collect();

        let errors = self
            .failures
            .into_iter()
            .filter(|(_, fault)| options.report_propagated || !fault.is_propagated())
            .map(|(id, fault)| {
                let node = &program.formulas[id];
                FormulaFailure {
                    module: program.modules[node.module].clone(),
                    formula: node.name.clone(),
                    fault,
                }
            })
            .collect();

        let stats = self.stats;
        tracing::info!(
            formulas = stats.formula_count,
            stages = stats.stages,
            evaluated = stats.evaluated,
            failed = stats.failed,
            skipped = stats.skipped,
            awaited = stats.awaited,
            "evaluation finished"
        );

        Evaluation {
            outputs,
            errors,
            stats,
            values,
        }
    }
}

impl Environment for EvaluationRun<'_> {
    fn load(&self, slot: Slot) -> Value {
        let formulas = self.slots.len();
        if slot.0 < formulas {
            return self.slots[slot.0].clone().unwrap_or_else(|| {
                Value::error(Fault::internal(format!(
                    "{} was read before it was evaluated",
                    self.name(slot.0)
                )))
            });
        }
        self.seeds.get(slot.0 - formulas).cloned().unwrap_or_else(|| {
            Value::error(Fault::internal(format!("slot {} is out of range", slot)))
        })
    }
}
