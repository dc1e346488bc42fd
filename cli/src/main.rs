//! flowerrors CLI: resolve failure scenarios and inspect the error hierarchy.
//!
//! Usage:
//! ```bash
//! # Resolve a scenario and print the attached error
//! flowerrors resolve --scenario fixtures/scenarios/mapped-http.json
//!
//! # Same, as JSON, with resolver debug logs on stderr
//! flowerrors resolve --scenario mapped-http.json --json --log-level debug
//!
//! # Print the error type hierarchy, extension types included
//! flowerrors types --scenario mapped-http.json
//! ```

mod logging;
mod scenario;

use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, Result};

use flowerrors_core::{ErrorType, ErrorTypeRepository};

use crate::logging::{init_tracing, LogConfig};
use crate::scenario::Scenario;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "resolve" => cmd_resolve(&args[2..]),
        "types" => cmd_types(&args[2..]),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("flowerrors {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("flowerrors {}", env!("CARGO_PKG_VERSION"));
    println!("Resolve flow failures into typed errors\n");
    println!("USAGE:");
    println!("    flowerrors <COMMAND>\n");
    println!("COMMANDS:");
    println!("    resolve   Resolve a failure scenario");
    println!("    types     Print the error type hierarchy");
    println!("    version   Print version");
    println!("    help      Print this help\n");
    println!("RESOLVE FLAGS:");
    println!("    --scenario <FILE>    Scenario JSON  [required]");
    println!("    --json               Output as JSON");
    println!("    --log-level <LEVEL>  trace | debug | info | warn | error");
    println!("    --log-json           Emit logs as JSON\n");
    println!("TYPES FLAGS:");
    println!("    --scenario <FILE>    Include the scenario's extension types");
}

#[derive(Default)]
struct Flags {
    scenario: Option<PathBuf>,
    json: bool,
    log: LogConfig,
}

fn parse_flags(args: &[String]) -> Result<Flags> {
    let mut flags = Flags::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--scenario" => {
                i += 1;
                flags.scenario = args.get(i).map(PathBuf::from);
            }
            "--log-level" => {
                i += 1;
                flags.log.level = args
                    .get(i)
                    .cloned()
                    .ok_or_else(|| anyhow!("--log-level needs a value"))?;
            }
            "--json" => flags.json = true,
            "--log-json" => flags.log.json = true,
            flag => return Err(anyhow!("Unknown flag: {flag}")),
        }
        i += 1;
    }
    Ok(flags)
}

fn cmd_resolve(args: &[String]) -> Result<()> {
    let flags = parse_flags(args)?;
    init_tracing(&flags.log);

    let path = flags
        .scenario
        .ok_or_else(|| anyhow!("--scenario is required"))?;
    let scenario = Scenario::load(&path)?;
    let resolution = scenario.run()?;

    if flags.json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
    } else {
        if !scenario.description.is_empty() {
            println!("{}", scenario.description);
        }
        println!("  Error type:  {}", resolution.error_type);
        println!("  Description: {}", resolution.description);
        println!("  Cause:       {}", resolution.cause_kind);
        println!("  Exception:   {}", resolution.exception);
        if let Some(location) = &resolution.location {
            println!("  Location:    {location}");
        }
        println!("  Detail:      {}", resolution.detailed_description);
    }

    if !resolution.mismatches.is_empty() {
        for m in &resolution.mismatches {
            eprintln!("mismatch: {m}");
        }
        return Err(anyhow!(
            "{} expectation(s) not met",
            resolution.mismatches.len()
        ));
    }
    Ok(())
}

fn cmd_types(args: &[String]) -> Result<()> {
    let flags = parse_flags(args)?;
    init_tracing(&flags.log);

    let repo = match &flags.scenario {
        Some(path) => Scenario::load(path)?.repository()?,
        None => ErrorTypeRepository::new(),
    };
    let mut types = repo.all();
    types.sort_by_key(lineage_path);

    if flags.json {
        let rows: Vec<_> = types
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": t,
                    "parent": t.parent(),
                    "critical": t.is_critical(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for t in &types {
            let depth = t.lineage().count().saturating_sub(1);
            println!("{}{t}", "  ".repeat(depth));
        }
    }
    Ok(())
}

/// Root-first path of a type, so sorting groups children under parents.
fn lineage_path(t: &ErrorType) -> Vec<String> {
    let mut path: Vec<String> = t.lineage().map(|a| a.to_string()).collect();
    path.reverse();
    path
}
