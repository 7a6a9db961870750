//! sondeo - empty-tensor gradient probe runner
//!
//! Usage:
//!   sondeo                # run the fixed sequence: bias-add, then matmul
//!   sondeo bias-add       # probe bias addition alone
//!   sondeo matmul         # probe matrix multiplication alone
//!   sondeo all --json     # machine-readable reports
//!
//! Exit status is 0 when every selected probe completes its gradient
//! check, and 1 as soon as one fails. Nothing is caught or retried: the
//! program exists to make such failures visible.

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use sondeo::probe::Scenario;

mod output;

/// sondeo - gradient checks on zero-sized tensors
#[derive(Parser)]
#[command(name = "sondeo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Output reports as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Per-input Jacobian details
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Probe bias addition: rank-3 empty value, rank-1 empty bias
    BiasAdd,

    /// Probe matrix multiplication: rank-2 empty by rank-3 empty
    Matmul,

    /// Run both probes in the fixed sequence (the default)
    All,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let scenarios: Vec<Scenario> = match cli.command.unwrap_or(Command::All) {
        Command::BiasAdd => vec![Scenario::BiasAdd],
        Command::Matmul => vec![Scenario::MatMul],
        Command::All => Scenario::all().to_vec(),
    };

    let opts = output::Options {
        json: cli.json,
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    for scenario in scenarios {
        match scenario.run() {
            Ok(report) => output::render(scenario, &report, &opts),
            Err(err) => {
                eprintln!("sondeo: {scenario} probe failed: {err}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
