//! Content checksums for tables and whole databases
//!
//! Hashes every row in rowid order with a type tag per value, so two
//! databases with the same logical contents hash equal regardless of page
//! layout.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, invalid_identifier, Result};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

/// SHA-256 (hex) over all rows of `table`, ordered by rowid
pub fn table_checksum(conn: &Connection, table: &str) -> Result<String> {
    let mut hasher = Sha256::new();
    hash_table(conn, table, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 (hex) over every user table, in name order
pub fn database_checksum(conn: &Connection) -> Result<String> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .map_err(from_rusqlite)?;
    let tables: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    drop(stmt);

    let mut hasher = Sha256::new();
    for table in &tables {
        hasher.update(b"T");
        hasher.update(table.as_bytes());
        hasher.update([0u8]);
        hash_table(conn, table, &mut hasher)?;
    }
    Ok(hex::encode(hasher.finalize()))
}

fn hash_table(conn: &Connection, table: &str, hasher: &mut Sha256) -> Result<()> {
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid_identifier(table));
    }

    let mut stmt = conn
        .prepare(&format!("SELECT * FROM \"{}\" ORDER BY rowid", table))
        .map_err(from_rusqlite)?;
    let columns = stmt.column_count();
    let mut rows = stmt.query([]).map_err(from_rusqlite)?;

    while let Some(row) = rows.next().map_err(from_rusqlite)? {
        hasher.update(b"R");
        for i in 0..columns {
            match row.get_ref(i).map_err(from_rusqlite)? {
                ValueRef::Null => hasher.update(b"n"),
                ValueRef::Integer(v) => {
                    hasher.update(b"i");
                    hasher.update(v.to_le_bytes());
                }
                ValueRef::Real(v) => {
                    hasher.update(b"f");
                    hasher.update(v.to_le_bytes());
                }
                ValueRef::Text(bytes) => {
                    hasher.update(b"t");
                    hasher.update((bytes.len() as u64).to_le_bytes());
                    hasher.update(bytes);
                }
                ValueRef::Blob(bytes) => {
                    hasher.update(b"b");
                    hasher.update((bytes.len() as u64).to_le_bytes());
                    hasher.update(bytes);
                }
            }
        }
    }
    Ok(())
}
