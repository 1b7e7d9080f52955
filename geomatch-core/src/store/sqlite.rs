//! SQLite-backed store implementation for persisted address records.
//!
//! Each row of [`ADDRESS_TABLE`] holds one canonical address as a JSON object.
//! Filters are translated into `json_extract` predicates so the index never
//! has to be loaded into memory.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Mutex,
};

use rusqlite::{Connection, OpenFlags, params_from_iter, types::Value as SqlValue};
use thiserror::Error;

use super::{AddressStore, Filter, FilterValue, StoreError};
use crate::{AddressRecord, FieldValue, Projection};

/// Table holding one JSON-encoded address per row.
pub const ADDRESS_TABLE: &str = "addresses";

/// Error raised when opening or reading the address database.
#[derive(Debug, Error)]
pub enum SqliteAddressStoreError {
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path:?}: {source}")]
    OpenDatabase {
        /// Location of the SQLite database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// The database has no address table.
    #[error("SQLite database at {path:?} has no `addresses` table")]
    MissingTable {
        /// Location of the SQLite database on disk.
        path: PathBuf,
    },
    /// A stored record was not a JSON object.
    #[error("failed to parse address record {id}: {source}")]
    InvalidRecord {
        /// Row identifier of the offending record.
        id: i64,
        /// JSON decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// Generic SQLite error when reading address rows.
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

/// Read-only address store backed by a single SQLite connection.
pub struct SqliteAddressStore {
    path: PathBuf,
    connection: Mutex<Connection>,
}

impl fmt::Debug for SqliteAddressStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteAddressStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteAddressStore {
    /// Open the address database at `database_path` read-only.
    ///
    /// # Errors
    /// Fails when the database cannot be opened or lacks the address table.
    pub fn open<P>(database_path: P) -> Result<Self, SqliteAddressStoreError>
    where
        P: AsRef<Path>,
    {
        let path = database_path.as_ref().to_path_buf();
        let connection = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|source| SqliteAddressStoreError::OpenDatabase {
                path: path.clone(),
                source,
            })?;

        let tables: i64 = connection.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [ADDRESS_TABLE],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(SqliteAddressStoreError::MissingTable { path });
        }

        Ok(Self {
            path,
            connection: Mutex::new(connection),
        })
    }

    /// Location of the backing database.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn select(
        &self,
        filter: &Filter,
        projection: &Projection,
        limit: Option<usize>,
    ) -> Result<Vec<AddressRecord>, SelectError> {
        let (sql, parameters) = build_select(filter, limit);
        let connection = self.connection.lock().map_err(|_| SelectError::Poisoned)?;
        let mut statement = connection.prepare_cached(&sql)?;
        let mut rows = statement.query(params_from_iter(parameters.iter()))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let payload: String = row.get(1)?;
            let record: AddressRecord = serde_json::from_str(&payload)
                .map_err(|source| SqliteAddressStoreError::InvalidRecord { id, source })?;
            records.push(projection.apply(&record));
        }
        Ok(records)
    }
}

enum SelectError {
    Poisoned,
    Sqlite(SqliteAddressStoreError),
}

impl From<SqliteAddressStoreError> for SelectError {
    fn from(error: SqliteAddressStoreError) -> Self {
        Self::Sqlite(error)
    }
}

impl From<rusqlite::Error> for SelectError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Sqlite(SqliteAddressStoreError::Database(error))
    }
}

impl AddressStore for SqliteAddressStore {
    fn find(
        &self,
        filter: &Filter,
        projection: &Projection,
        limit: Option<usize>,
    ) -> Result<Vec<AddressRecord>, StoreError> {
        self.select(filter, projection, limit)
            .map_err(|error| match error {
                SelectError::Poisoned => StoreError::Unavailable {
                    message: format!("connection to {} is poisoned", self.path.display()),
                },
                SelectError::Sqlite(source) => StoreError::backend(source),
            })
    }
}

/// Translate a filter into a parameterised `SELECT`.
///
/// Exact text compares against the stored value rendered as text and exact
/// numbers against the value cast to real, so loosely typed data still
/// matches. Patterns use `instr`, which is a case-sensitive substring test.
/// Placeholders are numbered because each field path is bound once and read
/// twice.
fn build_select(filter: &Filter, limit: Option<usize>) -> (String, Vec<SqlValue>) {
    let mut predicates = Vec::with_capacity(filter.len());
    let mut parameters = Vec::with_capacity(filter.len() * 2 + 1);

    for (field, value) in filter.iter() {
        parameters.push(SqlValue::Text(json_path(field)));
        let path = parameters.len();
        let operand = path + 1;
        match value {
            FilterValue::Exact(FieldValue::Text(text)) => {
                predicates.push(format!("{} = ?{operand}", stored_text_sql(path)));
                parameters.push(SqlValue::Text(text.clone()));
            }
            FilterValue::Exact(FieldValue::Number(number)) => {
                predicates.push(format!(
                    "json_type(record, ?{path}) IN ('integer', 'real', 'text') AND \
                     CAST(json_extract(record, ?{path}) AS REAL) = ?{operand}"
                ));
                parameters.push(SqlValue::Real(*number));
            }
            FilterValue::Pattern(pattern) => {
                predicates.push(format!("instr({}, ?{operand}) > 0", stored_text_sql(path)));
                parameters.push(SqlValue::Text(pattern.literal().to_owned()));
            }
        }
    }

    let mut sql = format!("SELECT id, record FROM {ADDRESS_TABLE}");
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }
    // SQLite treats a negative limit as "no limit".
    let limit = limit.map_or(-1, |cap| i64::try_from(cap).unwrap_or(i64::MAX));
    parameters.push(SqlValue::Integer(limit));
    sql.push_str(&format!(" ORDER BY id LIMIT ?{}", parameters.len()));

    (sql, parameters)
}

/// The stored scalar at placeholder `path` as text.
///
/// Booleans render as `true` and `false` rather than SQLite's `1` and `0`.
/// Arrays and objects have no textual form and never match.
fn stored_text_sql(path: usize) -> String {
    format!(
        "CASE json_type(record, ?{path}) \
         WHEN 'true' THEN 'true' WHEN 'false' THEN 'false' \
         WHEN 'array' THEN NULL WHEN 'object' THEN NULL \
         ELSE CAST(json_extract(record, ?{path}) AS TEXT) END"
    )
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}
