//! Tabula CLI
//!
//! Looks inside a tabula directory without the Rust types of its records.
//!
//! # Commands
//!
//! - `show` - Print one record, or every record of a table
//! - `list` - Print the record IDs of a table
//!
//! Set `TABULA_PASS` to read an encrypted directory.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Tabula record viewer.
#[derive(Parser)]
#[command(name = "tabula")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print records of a table without knowing their type
    Show {
        /// Table directory, e.g. `db/User`
        table: PathBuf,

        /// Record ID; every record is shown when omitted
        id: Option<String>,
    },

    /// Print the record IDs of a table
    List {
        /// Table directory, e.g. `db/User`
        table: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Show { table, id } => match id {
            Some(id) => {
                let id = id
                    .parse::<i64>()
                    .map_err(|_| "Resource ID parameter must be a number")?;
                commands::show::one(&table, id)?;
            }
            None => commands::show::all(&table)?,
        },
        Commands::List { table } => commands::list::run(&table)?,
        Commands::Version => {
            println!("Tabula CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Tabula Core v{}", tabula_core::VERSION);
        }
    }

    Ok(())
}
