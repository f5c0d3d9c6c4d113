//! List command implementation.

use super::open_table;
use std::path::Path;

/// Prints the record IDs of `table`, ascending.
pub fn run(table: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (db, table) = open_table(table)?;
    let ids = db.list_record_ids(&table)?;
    for id in &ids {
        println!("{id}");
    }
    println!("{} record(s) in {}", ids.len(), table.display());
    Ok(())
}
