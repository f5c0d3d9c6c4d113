//! Database configuration.

use crate::error::{CoreError, CoreResult};
use std::fmt;
use std::path::PathBuf;

/// Configuration for opening a database.
#[derive(Clone, Default)]
pub struct Config {
    /// Base directory holding every table and the index log.
    pub path: PathBuf,

    /// Emit each operation's trace at `INFO` instead of `DEBUG`.
    pub log: bool,

    /// Seal records with AES-256-GCM.
    pub encrypted: bool,

    /// Passphrase the encryption key is derived from.
    pub passphrase: Option<String>,
}

impl Config {
    /// Creates a configuration rooted at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Sets whether operations are logged at `INFO`.
    #[must_use]
    pub const fn log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Enables encryption with a key derived from `passphrase`.
    #[must_use]
    pub fn encrypted(mut self, passphrase: impl Into<String>) -> Self {
        self.encrypted = true;
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Checks that the configuration can be used to open a database.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the path is empty, or if encryption is
    /// requested without a passphrase.
    pub fn validate(&self) -> CoreResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(CoreError::invalid_config("directory path missing"));
        }
        if self.encrypted && !matches!(self.passphrase.as_deref(), Some(p) if !p.is_empty()) {
            return Err(CoreError::invalid_config(
                "encryption requested without a passphrase",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("log", &self.log)
            .field("encrypted", &self.encrypted)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
