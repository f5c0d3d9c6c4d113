//! # Tabula Core
//!
//! Embedded, file-backed record store.
//!
//! This crate provides:
//! - Path-addressed records, one file per record under `<base>/<Model>/`
//! - A per-model identity counter
//! - Optional AES-256-GCM encryption with a passphrase-derived key
//! - A secondary index rebuilt at startup from an append-only log
//! - Where-clause queries with `And` chains and alternatives
//!
//! ## Layout
//!
//! ```text
//! <base>/.idxlog                       index log, one mutation per line
//! <base>/<Model>/metadata/counter      last assigned ID, decimal ASCII
//! <base>/<Model>/0000001               record envelope, maybe sealed
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod counter;
pub mod crypto;
mod database;
mod error;
pub mod index;
pub mod path;
mod query;
mod resource;

pub use config::Config;
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use index::{IndexEntry, IndexLog, IndexOp, SecondaryIndex};
pub use query::{evaluate, Where};
pub use resource::Resource;

/// Crate version, as recorded in its manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export what callers need to implement `Resource` and read raw records.
pub use tabula_codec::Value;
pub use tabula_storage::{FileBackend, InMemoryBackend, StorageBackend};
