//! Read-only item lookups backing tag preferences.

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use std::collections::HashSet;
use std::path::Path;

use crate::error::StoreError;

/// Lookup of items whose `slot` field matches a tag.
pub trait ItemStore {
    /// Identifiers of all items whose `slot` field contains `tag`.
    ///
    /// # Errors
    /// Returns a [`StoreError`] if the store cannot answer; callers propagate
    /// it without retrying.
    fn matching_items(&self, slot: &str, tag: &str) -> Result<HashSet<String>, StoreError>;
}

impl<S: ItemStore + ?Sized> ItemStore for &S {
    fn matching_items(&self, slot: &str, tag: &str) -> Result<HashSet<String>, StoreError> {
        (**self).matching_items(slot, tag)
    }
}

pub const DEFAULT_TABLE: &str = "movies";
pub const DEFAULT_ID_COLUMN: &str = "ID";

/// SQLite item table queried with `slot LIKE '%tag%'`.
///
/// The slot is interpolated as a column name, so it is checked against the
/// table's actual columns first; the tag is always a bound parameter.
/// Column names compare ASCII case-insensitively, as SQLite resolves them.
pub struct SqliteItemStore {
    conn: Connection,
    table: String,
    id_column: String,
    /// Lowercased column names.
    columns: HashSet<String>,
}

impl SqliteItemStore {
    /// Opens an existing database read-only using the default table layout.
    ///
    /// # Errors
    /// Fails if the file does not exist or the table is missing.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_table(path, DEFAULT_TABLE, DEFAULT_ID_COLUMN)
    }

    /// # Errors
    /// Fails if the file does not exist, the table is missing, or it has no
    /// `id_column`.
    pub fn open_table(path: &Path, table: &str, id_column: &str) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::from_connection(conn, table, id_column)
    }

    /// Wraps an already open connection.
    ///
    /// # Errors
    /// Fails if the table is missing or has no `id_column`.
    pub fn from_connection(
        conn: Connection,
        table: &str,
        id_column: &str,
    ) -> Result<Self, StoreError> {
        let columns = {
            let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
            let rows = stmt.query_map(params![table], |row| {
                row.get::<_, String>(0).map(|name| name.to_ascii_lowercase())
            })?;
            rows.collect::<Result<HashSet<_>, _>>()?
        };
        if columns.is_empty() {
            return Err(StoreError::UnknownTable(table.to_string()));
        }
        if !columns.contains(&id_column.to_ascii_lowercase()) {
            return Err(StoreError::UnknownSlot(id_column.to_string()));
        }
        Ok(Self {
            conn,
            table: table.to_string(),
            id_column: id_column.to_string(),
            columns,
        })
    }

    /// Column names of the item table, lowercased.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn like_pattern(tag: &str) -> String {
    let mut escaped = String::with_capacity(tag.len() + 2);
    escaped.push('%');
    for c in tag.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn id_to_string(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Null | ValueRef::Blob(_) => None,
    }
}

impl ItemStore for SqliteItemStore {
    fn matching_items(&self, slot: &str, tag: &str) -> Result<HashSet<String>, StoreError> {
        if !self.columns.contains(&slot.to_ascii_lowercase()) {
            return Err(StoreError::UnknownSlot(slot.to_string()));
        }
        let sql = format!(
            "SELECT {} FROM {} WHERE {} LIKE ?1 ESCAPE '\\'",
            quote_ident(&self.id_column),
            quote_ident(&self.table),
            quote_ident(slot)
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![like_pattern(tag)], |row| {
            Ok(id_to_string(row.get_ref(0)?))
        })?;
        let mut ids = HashSet::new();
        for id in rows {
            if let Some(id) = id? {
                ids.insert(id);
            }
        }
        tracing::debug!(slot, tag, matches = ids.len(), "item store lookup");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("sci-fi"), "%sci-fi%");
        assert_eq!(like_pattern("100%_"), "%100\\%\\_%");
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("genres"), "\"genres\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
