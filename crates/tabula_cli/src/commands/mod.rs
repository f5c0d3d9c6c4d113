//! CLI command implementations.

pub mod list;
pub mod show;

use std::path::{Path, PathBuf};
use tabula_core::{Config, CoreError, Database};
use tracing::debug;

/// Environment variable holding the passphrase of an encrypted directory.
pub const PASSPHRASE_VAR: &str = "TABULA_PASS";

/// Opens the directory a table lives in.
///
/// Returns the database and the absolute table path. Encryption is enabled
/// when `TABULA_PASS` is set to a non-empty value.
pub fn open_table(table: &Path) -> Result<(Database, PathBuf), Box<dyn std::error::Error>> {
    let passphrase = std::env::var(PASSPHRASE_VAR).ok();
    open_table_with(table, passphrase.as_deref())
}

fn open_table_with(
    table: &Path,
    passphrase: Option<&str>,
) -> Result<(Database, PathBuf), Box<dyn std::error::Error>> {
    let table = std::path::absolute(table)?;
    if !table.is_dir() {
        return Err(format!("No table found at {}", table.display()).into());
    }
    let base = table
        .parent()
        .ok_or_else(|| format!("{} has no parent directory", table.display()))?;

    let mut config = Config::new(base);
    if let Some(passphrase) = passphrase.filter(|p| !p.is_empty()) {
        config = config.encrypted(passphrase);
    }
    debug!(base = %base.display(), encrypted = config.encrypted, "opening table");

    Ok((Database::open(config)?, table))
}

/// Prints what the operator can do about `err`, if anything.
pub fn explain(err: &CoreError) {
    match err {
        CoreError::DecryptionFailed { .. } => {
            println!("Failed to decrypt with {PASSPHRASE_VAR} environment variable.");
        }
        CoreError::Codec(_) => {
            println!("Failed to decode record. If the directory is encrypted set {PASSPHRASE_VAR} environment variable.");
        }
        _ => {}
    }
}
