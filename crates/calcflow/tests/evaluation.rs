//! End-to-end tests for compiling and evaluating programs

use calcflow::prelude::*;
use calcflow::Decimal;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Host function `touch(n)` that returns `n` and counts its calls
fn touch(calls: &Arc<AtomicUsize>) -> Value {
    let calls = Arc::clone(calls);
    let function = FunctionBuilder::new("touch")
        .overload(Overload::new(
            [Param::Single(ValueKind::Number)],
            ValueKind::Number,
            move |args| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(args[0].clone())
            },
        ))
        .build()
        .unwrap();
    Value::function(function)
}

fn fault_of(value: Option<&Value>) -> Fault {
    match value {
        Some(Value::Error(fault)) => (**fault).clone(),
        other => panic!("Expected Error, got {:?}", other),
    }
}

/// Two formulas, one depending on the other
#[test]
fn test_evaluate_dependent_formulas() {
    let program = ProgramBuilder::new()
        .module(
            Module::new("main")
                .formula(Formula::new("X", "1 + 2").export())
                .formula(Formula::new("Y", "X * 2").export()),
        )
        .compile()
        .unwrap();

    let evaluation = program.evaluate(&Inputs::new()).unwrap();

    assert_eq!(evaluation.output("main", "X"), Some(&Value::from(3)));
    assert_eq!(evaluation.output("main", "Y"), Some(&Value::from(6)));
    assert!(evaluation.errors.is_empty());
    assert_eq!(
        evaluation.stats,
        EvaluationStats {
            formula_count: 2,
            stages: 2,
            evaluated: 2,
            ..Default::default()
        }
    );
}

/// A failure disables every downstream formula without running it
#[test]
fn test_failure_propagates_to_dependents() {
    let calls = Arc::new(AtomicUsize::new(0));
    let program = ProgramBuilder::new()
        .global("touch", touch(&calls))
        .module(
            Module::new("m")
                .formula(Formula::new("F1", "1 / 0"))
                .formula(Formula::new("F2", "touch(F1)"))
                .formula(Formula::new("F3", "touch(F2) + 1").export())
                .formula(Formula::new("Other", "touch(5)").export()),
        )
        .compile()
        .unwrap();

    let evaluation = program.evaluate(&Inputs::new()).unwrap();
    let id = |name| program.formula_id("m", name).unwrap();

    // Only the unrelated formula reached the host function
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(evaluation.output("m", "Other"), Some(&Value::from(5)));

    assert_eq!(fault_of(evaluation.value(id("F1"))), Fault::DivideByZero);
    assert_eq!(fault_of(evaluation.value(id("F2"))), Fault::Propagated);
    assert_eq!(fault_of(evaluation.value(id("F3"))), Fault::Propagated);
    assert_eq!(fault_of(evaluation.output("m", "F3")), Fault::Propagated);

    let failed: Vec<String> = evaluation.errors.iter().map(|e| e.to_string()).collect();
    assert_eq!(
        failed,
        vec![
            "m.F1: Division by zero",
            "m.F2: Dependency failed",
            "m.F3: Dependency failed",
        ]
    );
    assert_eq!(evaluation.stats.failed, 1);
    assert_eq!(evaluation.stats.skipped, 2);
    assert_eq!(evaluation.stats.evaluated, 2);
}

#[test]
fn test_evaluation_options() {
    let program = ProgramBuilder::new()
        .module(
            Module::new("m")
                .formula(Formula::new("Bad", "\"x\" * 2").export())
                .formula(Formula::new("Worse", "Bad + 1").export())
                .formula(Formula::new("Good", "2").export()),
        )
        .compile()
        .unwrap();

    let options = EvaluationOptions {
        report_propagated: false,
        export_failures: false,
    };
    let evaluation = program
        .evaluate_with_options(&Inputs::new(), &options)
        .unwrap();

    assert_eq!(evaluation.errors.len(), 1);
    assert_eq!(evaluation.errors[0].formula, "Bad");
    assert!(!evaluation.errors[0].is_propagated());

    let exports = evaluation.module("m").unwrap();
    assert_eq!(exports.keys().collect::<Vec<_>>(), vec!["Good"]);
}

#[test]
fn test_arguments_constants_and_imports() {
    let program = ProgramBuilder::new()
        .with_standard_library()
        .unwrap()
        .module(
            Module::new("rates")
                .constant("Vat", Value::from(Decimal::new(2, 1)))
                .formula(Formula::new("Multiplier", "1 + Vat")),
        )
        .module(
            Module::new("order")
                .argument("Price")
                .argument("Qty")
                .import("M", "rates", "Multiplier")
                .formula(Formula::new("Net", "Price * Qty"))
                .formula(Formula::new("Gross", "round(Net * M, 2)").export_as("total")),
        )
        .compile()
        .unwrap();

    let inputs = Inputs::new()
        .with("order", "Price", Decimal::new(999, 2))
        .with("order", "Qty", 3);
    let evaluation = program.evaluate(&inputs).unwrap();

    assert_eq!(
        evaluation.output("order", "TOTAL"),
        Some(&Value::from(Decimal::new(3596, 2)))
    );
    // Modules without exports still get an Object
    assert_eq!(evaluation.module("rates").map(ObjectMap::len), Some(0));
}

#[test]
fn test_missing_argument_fails_dependents() {
    let program = ProgramBuilder::new()
        .module(
            Module::new("m")
                .argument("Qty")
                .formula(Formula::new("Double", "Qty * 2").export()),
        )
        .compile()
        .unwrap();

    let evaluation = program.evaluate(&Inputs::new()).unwrap();
    assert_eq!(
        fault_of(evaluation.output("m", "Double")),
        Fault::MissingArgument("m.Qty".into())
    );

    // The compiled program is reusable with other inputs
    let evaluation = program
        .evaluate(&Inputs::new().with("m", "qty", "21"))
        .unwrap();
    assert_eq!(evaluation.output("m", "Double"), Some(&Value::from(42)));
}

#[test]
fn test_macros_in_programs() {
    let program = ProgramBuilder::new()
        .module(
            Module::new("m")
                .argument("Score")
                .formula(
                    Formula::new(
                        "Grade",
                        "where(case: Score >= 90, do: \"A\", case: Score >= 75, do: \"B\", else: \"C\")",
                    )
                    .export(),
                )
                .formula(Formula::new("Passed", "if(Grade <> \"C\", then: true, else: false)").export())
                .formula(Formula::new("Summary", "object(grade: Grade, passed: Passed)").export()),
        )
        .compile()
        .unwrap();

    let evaluation = program.evaluate(&Inputs::new().with("m", "Score", 80)).unwrap();
    assert_eq!(evaluation.output("m", "Grade"), Some(&Value::from("B")));
    assert_eq!(evaluation.output("m", "Passed"), Some(&Value::from(true)));

    let summary: ObjectMap = [("grade", Value::from("B")), ("passed", Value::from(true))]
        .into_iter()
        .collect();
    assert_eq!(evaluation.output("m", "Summary"), Some(&Value::from(summary)));
    assert_eq!(evaluation.stats.stages, 3);
}

#[test]
fn test_plan_describes_stages() {
    let program = ProgramBuilder::new()
        .module(
            Module::new("m")
                .formula(Formula::new("A", "1"))
                .formula(Formula::new("B", "A + 1"))
                .formula(Formula::new("C", "A + 2"))
                .formula(Formula::new("D", "B + C")),
        )
        .compile()
        .unwrap();

    assert_eq!(program.plan().stage_count(), 3);
    assert_eq!(
        program.describe_plan(),
        vec![vec!["m.A"], vec!["m.B", "m.C"], vec!["m.D"]]
    );
}
