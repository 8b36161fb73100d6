//! Variant annotation and query worker main executable

pub mod annos;
pub mod common;
pub mod err;
pub mod query;

use clap::{Args, Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Variant annotation and sample-aware queries",
    long_about = "This tool annotates variants from indexed annotation files and \
                  filters variant queries by the samples carrying them"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[allow(clippy::large_enum_variant)]
#[derive(Debug, Subcommand)]
enum Commands {
    /// Annotation-related commands.
    Annos(Annos),
    /// Run a variant query with sample filters.
    Query(query::Args),
}

/// Parsing of "annos *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Annos {
    /// The sub command to run
    #[command(subcommand)]
    command: AnnosCommands,
}

/// Enum supporting the parsing of "annos *" sub commands.
#[derive(Debug, Subcommand)]
enum AnnosCommands {
    List(annos::list::Args),
    Annotate(annos::annotate::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector globally so that worker threads log, too.
    tracing::subscriber::set_global_default(collector)
        .map_err(|e| anyhow::anyhow!("could not install tracing collector: {}", e))?;

    // Go into sub commands.
    let term = Term::stderr();
    match &cli.command {
        Commands::Annos(annos) => match &annos.command {
            AnnosCommands::List(args) => {
                annos::list::run(&cli.common, args)?;
            }
            AnnosCommands::Annotate(args) => {
                annos::annotate::run(&cli.common, args)?;
            }
        },
        Commands::Query(args) => query::run(&cli.common, args)?,
    }
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}
