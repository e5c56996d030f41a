//! Zhifa CLI: the main entry point.
//!
//! Commands:
//! - `ask`: Single question or interactive consultation
//! - `index`: Build or update a statute / case vector store
//! - `onboard`: Write the default configuration
//! - `doctor`: Diagnose configuration, stores and provider

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "zhifa",
    about = "智法 Zhifa: multi-agent legal consultation assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a legal question
    Ask {
        /// Ask a single question instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Print the decision and tool statuses after each reply
        #[arg(long)]
        show_decision: bool,

        /// Print the full result as JSON (single question only)
        #[arg(long, requires = "message")]
        json: bool,
    },

    /// Index statute or case documents into a vector store
    Index {
        /// Which collection to build
        #[arg(long, value_enum)]
        kind: KindArg,

        /// Directory holding the source documents
        #[arg(long)]
        source: PathBuf,

        /// Store directory (defaults to the configured one)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Write the default configuration
    Onboard,

    /// Diagnose system health
    Doctor,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Legal,
    Case,
}

impl From<KindArg> for zhifa_knowledge::Collection {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Legal => zhifa_knowledge::Collection::Legal,
            KindArg::Case => zhifa_knowledge::Collection::Case,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so replies on stdout stay clean
    let filter = if cli.verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    match cli.command {
        Commands::Ask { message, show_decision, json } => commands::ask::run(message, show_decision, json).await?,
        Commands::Index { kind, source, db } => commands::index::run(kind.into(), source, db).await?,
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
