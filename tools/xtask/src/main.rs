//! Workspace automation tasks.
//!
//! Run with: `cargo xtask <command>`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::process::Command;

/// Attributes every library root must carry.
const REQUIRED_LIB_ATTRS: &[&str] = &["#![forbid(unsafe_code)]", "#![deny(missing_docs)]"];

#[derive(Parser)]
#[command(name = "xtask", about = "Ensemble workspace automation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all CI checks locally
    Ci,
    /// Validate workspace conventions
    Lint,
    /// Run property tests with an elevated case count
    Props {
        /// Cases per property
        #[arg(long, default_value_t = 2048)]
        cases: u32,
    },
    /// Generate coverage report
    Coverage,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci => run_ci(),
        Commands::Lint => run_lint(),
        Commands::Props { cases } => run_props(cases),
        Commands::Coverage => run_coverage(),
    }
}

fn run_ci() -> Result<()> {
    println!("Running CI checks...\n");

    run_lint()?;
    run_cmd("cargo", &["fmt", "--check"], &[])?;
    run_cmd("cargo", &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"], &[])?;
    run_cmd("cargo", &["test", "--workspace"], &[])?;
    run_cmd("cargo", &["doc", "--workspace", "--no-deps"], &[])?;

    println!("\nAll CI checks passed!");
    Ok(())
}

fn run_lint() -> Result<()> {
    println!("Validating workspace conventions...\n");

    let crates = std::fs::read_dir("crates")?;
    for entry in crates {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with("ensemble-") {
            anyhow::bail!("Crate '{}' does not follow ensemble-* naming", name);
        }

        let manifest = std::fs::read_to_string(entry.path().join("Cargo.toml"))
            .with_context(|| format!("Crate '{name}' has no Cargo.toml"))?;
        if !manifest.contains("[lints]\nworkspace = true") {
            anyhow::bail!("Crate '{}' does not inherit workspace lints", name);
        }

        check_lib_attrs(&name, &entry.path().join("src/lib.rs"))?;
    }

    println!("All conventions validated!");
    Ok(())
}

fn check_lib_attrs(name: &str, lib: &Path) -> Result<()> {
    let source = std::fs::read_to_string(lib)
        .with_context(|| format!("Crate '{name}' has no src/lib.rs"))?;
    for attr in REQUIRED_LIB_ATTRS {
        if !source.contains(attr) {
            anyhow::bail!("Crate '{}' is missing {} in src/lib.rs", name, attr);
        }
    }
    Ok(())
}

fn run_props(cases: u32) -> Result<()> {
    let cases = cases.to_string();
    run_cmd(
        "cargo",
        &["test", "-p", "ensemble-topology", "--test", "property_tests"],
        &[("PROPTEST_CASES", cases.as_str())],
    )
}

fn run_coverage() -> Result<()> {
    run_cmd("cargo", &["llvm-cov", "--workspace", "--html"], &[])?;
    println!("\nCoverage report: target/llvm-cov/html/index.html");
    Ok(())
}

fn run_cmd(cmd: &str, args: &[&str], envs: &[(&str, &str)]) -> Result<()> {
    println!("$ {} {}", cmd, args.join(" "));
    let status = Command::new(cmd)
        .args(args)
        .envs(envs.iter().copied())
        .status()
        .with_context(|| format!("Failed to run: {} {}", cmd, args.join(" ")))?;

    if !status.success() {
        anyhow::bail!("Command failed: {} {}", cmd, args.join(" "));
    }
    Ok(())
}
