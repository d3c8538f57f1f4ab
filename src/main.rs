//! Tessera CLI entry point.

mod cli;
mod report;

use std::error::Error;

use clap::Parser;
use cli::{Cli, Command};
use tessera_core::TargetInfo;
use tessera_cranelift::{
    MachineType, TesseraCompiler, build_closure_type, constant_allocation_size,
    takes_implicit_context,
};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli.command) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Log to stderr, filtered by `RUST_LOG` (warnings by default).
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .try_init();
}

fn run(command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Layout { captures, json } => {
            let closure = captures.closure()?;
            let target = captures
                .target
                .map(TargetInfo::from_triple)
                .unwrap_or_else(TargetInfo::host);
            debug!(triple = %target.triple(), %closure, "building closure layout");
            let record = build_closure_type(&closure, &MachineType::buffer_metadata(), &target)?;
            if json {
                let report = report::LayoutReport::new(&record, &target);
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{record}");
            }
        }
        Command::Clif { captures, name } => {
            let closure = captures.closure()?;
            let mut compiler = TesseraCompiler::new(captures.target)?;
            let pair = compiler.compile_closure_pair(&name, &closure)?;
            println!("{}\n{}", pair.task_clif, pair.spawn_clif);
        }
        Command::Object {
            captures,
            name,
            out,
        } => {
            let closure = captures.closure()?;
            let mut compiler = TesseraCompiler::new(captures.target)?;
            compiler.compile_closure_pair(&name, &closure)?;
            let bytes = compiler.finish()?;
            std::fs::write(&out, &bytes)?;
            println!("wrote {} bytes to {}", bytes.len(), out.display());
        }
        Command::AllocSize { name, extents } => {
            match constant_allocation_size(&extents, &name)? {
                Some(size) => println!("{size}"),
                None => println!("not constant"),
            }
        }
        Command::Classify { symbol } => {
            let verdict = if takes_implicit_context(&symbol) {
                "takes user_context"
            } else {
                "no user_context"
            };
            println!("{symbol}: {verdict}");
        }
    }
    Ok(())
}
