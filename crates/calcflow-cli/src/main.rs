//! calcflow CLI - compile and evaluate formula programs

mod program_file;

use anyhow::{Context, Result};
use calcflow::prelude::*;
use clap::{Parser, Subcommand};
use program_file::{parse_inputs, value_to_json, ProgramFile};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "calcflow")]
#[command(author, version, about = "Formula program compiler and evaluator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a program and print the exported values
    #[command(alias = "run")]
    Eval {
        /// Program description (JSON)
        program: PathBuf,

        /// Argument value as module.name=value (repeatable)
        #[arg(short, long = "arg")]
        args: Vec<String>,

        /// Print the outputs as JSON
        #[arg(short, long)]
        json: bool,

        /// Report only root-cause failures
        #[arg(long)]
        root_causes: bool,
    },

    /// Show the evaluation stages of a program
    Plan {
        /// Program description (JSON)
        program: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Eval {
            program,
            args,
            json,
            root_causes,
        } => eval(&program, &args, json, root_causes),
        Commands::Plan { program } => show_plan(&program),
    }
}

fn load(path: &Path) -> Result<CompiledProgram> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    let file = ProgramFile::from_json(&text)
        .with_context(|| format!("Failed to load '{}'", path.display()))?;
    let program = file
        .into_builder()?
        .compile()
        .with_context(|| format!("Failed to compile '{}'", path.display()))?;
    tracing::debug!(
        formulas = program.formula_count(),
        stages = program.plan().stage_count(),
        "program compiled"
    );
    Ok(program)
}

fn eval(path: &Path, args: &[String], json: bool, root_causes: bool) -> Result<()> {
    let program = load(path)?;
    let inputs = parse_inputs(args)?;
    let options = EvaluationOptions {
        report_propagated: !root_causes,
        ..Default::default()
    };
    let evaluation = program.evaluate_with_options(&inputs, &options)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if json {
        let errors: Vec<String> = evaluation.errors.iter().map(|e| e.to_string()).collect();
        let document = serde_json::json!({
            "outputs": value_to_json(&Value::object(evaluation.outputs.clone())),
            "errors": errors,
        });
        serde_json::to_writer_pretty(&mut out, &document)?;
        writeln!(out)?;
        return Ok(());
    }

    for module in program.modules() {
        let Some(exports) = evaluation.module(module) else {
            continue;
        };
        for (name, value) in exports.iter() {
            writeln!(out, "{}.{} = {}", module, name, value)?;
        }
    }

    if !evaluation.errors.is_empty() {
        eprintln!("{} formula(s) failed:", evaluation.errors.len());
        for failure in &evaluation.errors {
            eprintln!("  {}", failure);
        }
    }

    Ok(())
}

fn show_plan(path: &Path) -> Result<()> {
    let program = load(path)?;

    println!("Formulas: {}", program.formula_count());
    println!("Stages: {}", program.plan().stage_count());
    for (index, stage) in program.describe_plan().iter().enumerate() {
        println!("  {}: {}", index, stage.join(", "));
    }

    Ok(())
}
