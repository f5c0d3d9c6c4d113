//! # tabula storage
//!
//! Storage backend trait and implementations for tabula.
//!
//! Backends address whole files by path. They do not interpret the bytes
//! they store: record envelopes, counters and the index log are all opaque
//! here, and the layout of the base directory is owned by `tabula_core`.
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - Persistent storage on the OS file system
//! - [`InMemoryBackend`] - For testing; counts every call it receives
//!
//! ## Example
//!
//! ```rust
//! use std::path::Path;
//! use tabula_storage::{InMemoryBackend, StorageBackend};
//!
//! let backend = InMemoryBackend::new();
//! backend.create_dir_all(Path::new("/db/User")).unwrap();
//! backend.write(Path::new("/db/User/0000001"), b"hello").unwrap();
//! assert_eq!(backend.read(Path::new("/db/User/0000001")).unwrap(), b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{DirEntry, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
