mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{convert, inspect, validate, ConvertArgs, InspectArgs, ValidateArgs};
use tracing_subscriber::EnvFilter;

/// Anvil CLI - inspect, validate and convert stored block documents
#[derive(Parser, Debug)]
#[command(name = "anvil")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print an outline of a stored document
    Inspect(InspectArgs),

    /// Check tree invariants and attribute types
    Validate(ValidateArgs),

    /// Convert legacy HTML or block JSON to normalized block JSON
    Convert(ConvertArgs),
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?.display().to_string();

    match cli.command {
        Command::Inspect(args) => inspect(args, &cwd),
        Command::Validate(args) => validate(args, &cwd),
        Command::Convert(args) => convert(args, &cwd),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = run(cli) {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
