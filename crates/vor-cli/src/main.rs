use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{MetadataArgs, QueryArgs};

#[derive(Parser, Debug)]
#[command(name = "vor", version, about = "Column-encryption SQL interceptor")]
struct Cli {
    /// Log interceptor decisions at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the query with encrypted columns wrapped in cipher calls.
    Rewrite {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Print the rewritten query together with its modification plan as JSON.
    Explain {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// List the encrypted columns described by a metadata file.
    Columns {
        #[command(flatten)]
        metadata: MetadataArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_directive = if cli.verbose { "warn,vor_intercept=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Rewrite { query } => commands::rewrite::run(&query)?,
        Command::Explain { query } => commands::explain::run(&query)?,
        Command::Columns { metadata } => commands::columns::run(&metadata)?,
    }

    Ok(())
}
