//! Show command implementation.

use super::{explain, open_table};
use std::io::{self, Write};
use std::path::Path;
use tabula_core::{CoreResult, Database};

/// Prints record `id` of `table` on one line.
pub fn one(table: &Path, id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let (db, table) = open_table(table)?;
    let mut out = io::stdout().lock();
    write_one(&db, &table, id, &mut out).inspect_err(explain)?;
    Ok(())
}

/// Prints every record of `table`, one per line, in ID order.
pub fn all(table: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (db, table) = open_table(table)?;
    let mut out = io::stdout().lock();
    for id in db.list_record_ids(&table)? {
        write_one(&db, &table, id, &mut out).inspect_err(explain)?;
    }
    Ok(())
}

/// Decodes one record and writes it to `out`.
fn write_one(db: &Database, table: &Path, id: i64, out: &mut impl Write) -> CoreResult<()> {
    let value = db.read_value(table, id)?;
    writeln!(out, "{value}")?;
    Ok(())
}
