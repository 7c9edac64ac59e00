//! converge — manifest-based resource reconciliation CLI.
//!
//! # Usage
//!
//! ```text
//! converge sync  --server <url> [--service-id <id|all>] [--type <name>]... [--store <dir>] [--json]
//! converge diff  --server <url> [--service-id <id|all>] [--type <name>]... [--store <dir>]
//! converge types --server <url> [--store <dir>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, sync::SyncArgs, types::TypesArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "converge",
    version,
    about = "Converge local shared resources with a remote manifest",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply the remote manifest to the local resource store.
    Sync(SyncArgs),

    /// Show what sync would change, without writing anything.
    Diff(DiffArgs),

    /// List the resource types the server publishes.
    Types(TypesArgs),
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Types(args) => args.run(),
    }
}
