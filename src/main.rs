//! `nl` — command-line front end for the Argon execution runtime: assemble
//! a bytecode unit, run it to completion, or benchmark repeated evaluation.
//!
//! Trimmed from the teacher's `nl` binary down to the subcommands this
//! crate actually backs; no front-end compiler, training, or inference
//! machinery exists here, per SPEC_FULL.md §2.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use argon_rt::compiler::{Assembler, Compile};
use argon_rt::config::RuntimeConfig;
use argon_rt::function::{Function, FunctionFlags};
use argon_rt::object::namespace::Namespace;
use argon_rt::object::Value;

#[derive(Parser)]
#[command(name = "nl")]
#[command(version)]
#[command(about = "Argon execution runtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a unit and report its instruction/static counts without running it.
    Asm {
        /// Path to a textual bytecode unit.
        input: PathBuf,
    },
    /// Assemble a unit, run its entry function to completion, and print the result.
    Run {
        /// Path to a textual bytecode unit.
        input: PathBuf,
        #[arg(long, default_value = "main")]
        entry: String,
    },
    /// Assemble a unit and report the mean wall time of `iters` evaluations.
    Bench {
        /// Path to a textual bytecode unit.
        input: PathBuf,
        #[arg(long, default_value_t = 1000)]
        iters: u32,
    },
}

fn read_unit(path: &PathBuf) -> Result<(String, String)> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("reading unit {}", path.display()))?;
    let unit_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unit")
        .to_string();
    Ok((unit_name, source))
}

fn assemble_entry(path: &PathBuf, entry: &str) -> Result<Arc<Function>> {
    let (unit_name, source) = read_unit(path)?;
    let code = Assembler::new()
        .compile(&unit_name, &source)
        .with_context(|| format!("assembling {}", path.display()))?;
    Ok(Function::new_code(
        entry,
        code,
        0,
        FunctionFlags::empty(),
        vec![],
        Arc::new(Namespace::new()),
    ))
}

fn cmd_asm(input: PathBuf) -> Result<()> {
    let (unit_name, source) = read_unit(&input)?;
    let code = Assembler::new()
        .compile(&unit_name, &source)
        .with_context(|| format!("assembling {}", input.display()))?;
    println!(
        "{}: {} instruction(s), {} static(s), {} local(s)",
        unit_name,
        code.instr.len() / argon_rt::eval::opcode::Opcode::len(),
        code.statics.len(),
        code.locals.len(),
    );
    Ok(())
}

fn describe(value: &Value) -> String {
    match value {
        Value::Int(n) => n.to_string(),
        Value::UInt(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Nil => "nil".to_string(),
        Value::Error(e) => format!("{}", e),
        other => format!("<{}>", other.type_name()),
    }
}

fn cmd_run(input: PathBuf, entry: String) -> Result<()> {
    let func = assemble_entry(&input, &entry)?;
    let runtime = argon_rt::initialize(RuntimeConfig::default())
        .map_err(|e| anyhow::anyhow!(e))?;
    let result = runtime.eval(func, vec![]);
    argon_rt::shutdown().map_err(|e| anyhow::anyhow!(e))?;
    match result {
        Ok(value) => {
            println!("{}", describe(&value));
            Ok(())
        }
        Err(err) => Err(anyhow::anyhow!("uncaught panic: {}", describe(&err))),
    }
}

fn cmd_bench(input: PathBuf, iters: u32) -> Result<()> {
    let func = assemble_entry(&input, "bench")?;
    let runtime = argon_rt::initialize(RuntimeConfig::default())
        .map_err(|e| anyhow::anyhow!(e))?;
    let start = Instant::now();
    for _ in 0..iters {
        runtime
            .eval(func.clone(), vec![])
            .map_err(|e| anyhow::anyhow!("uncaught panic: {}", describe(&e)))?;
    }
    let elapsed = start.elapsed();
    argon_rt::shutdown().map_err(|e| anyhow::anyhow!(e))?;
    println!(
        "{} iterations in {:?} ({:?}/iter)",
        iters,
        elapsed,
        elapsed / iters.max(1)
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Asm { input } => cmd_asm(input),
        Commands::Run { input, entry } => cmd_run(input, entry),
        Commands::Bench { input, iters } => cmd_bench(input, iters),
    }
}
