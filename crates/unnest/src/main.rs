//! unnest - nested-function elimination for IR modules
//!
//! CLI driver: loads IR modules from JSON, runs the hoisting and frame
//! chaining passes, and checks transformed modules.

mod commands;
mod ir_io;
mod report;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

/// Nested-function elimination for IR modules
#[derive(Parser, Debug)]
#[command(name = "unnest")]
#[command(author, version, about = "Hoist nested functions and chain GC stack frames in IR modules")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pass over an IR module
    Transform(commands::transform::TransformArgs),

    /// Verify transformed IR modules
    Check(commands::check::CheckArgs),

    /// Explain a diagnostic code
    Explain(commands::explain::ExplainArgs),
}

/// Log level for a verbosity count, unless RUST_LOG says otherwise
fn log_filter(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(cli.verbose, cli.quiet)))
        .init();

    // Determine if colors should be used
    let use_color = !cli.no_color && !cli.quiet && atty::is(atty::Stream::Stdout);

    let Some(command) = cli.command else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Transform(args) => commands::transform::run(args, cli.format, use_color, cli.verbose),
        Commands::Check(args) => commands::check::run(args, cli.format, use_color, cli.verbose),
        Commands::Explain(args) => commands::explain::run(args, cli.format, use_color),
    }
}
