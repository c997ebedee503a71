//! LanceDB connection and housekeeping helpers.
//!
//! Provides database open functions, table lookup, column accessors for
//! result batches, and SQL predicate builders for id filters.

use arrow_array::{Float32Array, RecordBatch, StringArray};
use lancedb::table::Table;
use lancedb::{connect, Connection};

use metarag_core::error::{Error, Result};

pub fn lance_err(e: lancedb::Error) -> Error {
    Error::Connection(format!("lancedb: {e}"))
}

pub fn arrow_err(e: arrow_schema::ArrowError) -> Error {
    Error::Operation(format!("arrow: {e}"))
}

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(lance_err)
}

/// Open `name` if it has been created; a collection with no writes yet has no table.
pub async fn open_table_if_exists(conn: &Connection, name: &str) -> Result<Option<Table>> {
    let names = conn.table_names().execute().await.map_err(lance_err)?;
    if !names.iter().any(|n| n == name) {
        return Ok(None);
    }
    Ok(Some(conn.open_table(name).execute().await.map_err(lance_err)?))
}

pub fn str_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::Operation(format!("column '{name}' missing or not utf8")))
}

pub fn distance_column(batch: &RecordBatch) -> Option<&Float32Array> {
    batch
        .column_by_name(crate::schema::DISTANCE)
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
}

/// SQL string literal with `'` doubled.
pub fn sql_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

pub fn id_in_predicate<'a, I: IntoIterator<Item = &'a String>>(ids: I) -> String {
    let list: Vec<String> = ids.into_iter().map(|id| sql_quote(id)).collect();
    format!("{} IN ({})", crate::schema::ID, list.join(","))
}
