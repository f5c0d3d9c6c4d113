//! Per-model identity counter.
//!
//! The counter is a decimal ASCII integer without a trailing newline,
//! stored at `<table>/metadata/counter`. A missing file reads as zero.

use crate::error::{CoreError, CoreResult};
use crate::path::Table;
use tabula_storage::StorageBackend;

/// Reads the counter of `table`, or 0 if it was never written.
///
/// # Errors
///
/// Returns `CounterCorrupt` if the file is not a decimal integer.
pub fn read(backend: &dyn StorageBackend, table: &Table) -> CoreResult<i64> {
    let path = table.counter();
    let bytes = match backend.read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.is_not_found() => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let text = String::from_utf8_lossy(&bytes);
    text.trim().parse().map_err(|_| CoreError::CounterCorrupt {
        path,
        content: text.into_owned(),
    })
}

/// Persists `value` as the counter of `table`.
///
/// The metadata directory must already exist.
pub fn write(backend: &dyn StorageBackend, table: &Table, value: i64) -> CoreResult<()> {
    backend.write(&table.counter(), value.to_string().as_bytes())?;
    Ok(())
}

/// Creates the table and metadata directories if they are missing.
pub fn ensure_metadata_dir(backend: &dyn StorageBackend, table: &Table) -> CoreResult<()> {
    let metadata = table.metadata();
    if !backend.is_dir(&metadata)? {
        backend.create_dir_all(&metadata)?;
    }
    Ok(())
}
