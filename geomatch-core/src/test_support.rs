//! Test-only, in-memory `AddressStore` implementations and fixtures used by
//! unit and behaviour tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};

use crate::{AddressRecord, AddressStore, Filter, FilterValue, Projection, StoreError};

/// In-memory `AddressStore` performing a linear scan.
///
/// The store counts lookups so tests can assert how many were issued.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<AddressRecord>,
    lookups: AtomicUsize,
}

impl MemoryStore {
    /// Create a store from a collection of records.
    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = AddressRecord>,
    {
        Self {
            records: records.into_iter().collect(),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Number of lookups served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl AddressStore for MemoryStore {
    fn find(
        &self,
        filter: &Filter,
        projection: &Projection,
        limit: Option<usize>,
    ) -> Result<Vec<AddressRecord>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .iter()
            .filter(|record| filter.matches(record))
            .take(limit.unwrap_or(usize::MAX))
            .map(|record| projection.apply(record))
            .collect())
    }
}

/// Store that fails every lookup whose filter mentions a poisoned literal.
///
/// Other lookups are served by the wrapped [`MemoryStore`].
#[derive(Debug)]
pub struct PoisonedStore {
    inner: MemoryStore,
    poison: String,
}

impl PoisonedStore {
    /// Fail lookups whose filter contains `poison` as a value.
    pub fn new(inner: MemoryStore, poison: impl Into<String>) -> Self {
        Self {
            inner,
            poison: poison.into(),
        }
    }

    /// Number of lookups attempted, failed ones included.
    pub fn lookups(&self) -> usize {
        self.inner.lookups()
    }

    fn is_poisoned(&self, filter: &Filter) -> bool {
        filter.iter().any(|(_, value)| match value {
            FilterValue::Exact(exact) => exact.as_text() == Some(self.poison.as_str()),
            FilterValue::Pattern(pattern) => pattern.literal() == self.poison,
        })
    }
}

impl AddressStore for PoisonedStore {
    fn find(
        &self,
        filter: &Filter,
        projection: &Projection,
        limit: Option<usize>,
    ) -> Result<Vec<AddressRecord>, StoreError> {
        if self.is_poisoned(filter) {
            self.inner.lookups.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable {
                message: format!("poisoned value {}", self.poison),
            });
        }
        self.inner.find(filter, projection, limit)
    }
}

/// Store whose every lookup fails, standing in for an unreachable database.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

impl AddressStore for UnavailableStore {
    fn find(
        &self,
        _filter: &Filter,
        _projection: &Projection,
        _limit: Option<usize>,
    ) -> Result<Vec<AddressRecord>, StoreError> {
        Err(StoreError::Unavailable {
            message: "connection refused".to_owned(),
        })
    }
}

/// Convert a JSON object literal into a record; other values yield an empty
/// record.
pub fn record(value: Value) -> AddressRecord {
    match value {
        Value::Object(map) => map,
        _ => AddressRecord::new(),
    }
}

/// A handful of canonical Berlin addresses.
///
/// `Oranienstraße 1` and `Oranienstraße 11` share a prefix, so a substring
/// query for the former is ambiguous without a postal code.
pub fn berlin_sample() -> Vec<AddressRecord> {
    [
        json!({
            "str_hnr": "Kurfürstendamm 86A",
            "strasse": "Kurfürstendamm",
            "hnr": "86",
            "plz": "10709",
            "bezirk": "Charlottenburg-Wilmersdorf",
            "ortsteil": "Halensee",
            "lat": 52.4988,
            "lon": 13.2961
        }),
        json!({
            "str_hnr": "Oranienstraße 1",
            "strasse": "Oranienstraße",
            "hnr": "1",
            "plz": "10997",
            "bezirk": "Friedrichshain-Kreuzberg",
            "ortsteil": "Kreuzberg",
            "lat": 52.5005,
            "lon": 13.4197
        }),
        json!({
            "str_hnr": "Oranienstraße 11",
            "strasse": "Oranienstraße",
            "hnr": "11",
            "plz": "10969",
            "bezirk": "Friedrichshain-Kreuzberg",
            "ortsteil": "Kreuzberg",
            "lat": 52.5021,
            "lon": 13.4149
        }),
        json!({
            "str_hnr": "Elsenstraße 110C",
            "strasse": "Elsenstraße",
            "hnr": "110",
            "plz": "12435",
            "bezirk": "Treptow-Köpenick",
            "ortsteil": "Plänterwald",
            "lat": 52.4935,
            "lon": 13.4564
        }),
        json!({
            "str_hnr": "Karl-Marx-Straße 4",
            "strasse": "Karl-Marx-Straße",
            "hnr": "4",
            "plz": "12043",
            "bezirk": "Neukölln",
            "ortsteil": "Neukölln",
            "lat": 52.4826,
            "lon": 13.4327
        }),
        json!({
            "str_hnr": "Seestraße 12",
            "strasse": "Seestraße",
            "hnr": "12",
            "plz": "13353",
            "bezirk": "Mitte",
            "ortsteil": "Wedding",
            "lat": 52.5466,
            "lon": 13.3521
        }),
    ]
    .into_iter()
    .map(record)
    .collect()
}

/// Persist `records` into a fresh SQLite address database at `path`.
///
/// # Errors
/// Returns the `rusqlite` error when the database cannot be written.
#[cfg(feature = "store-sqlite")]
pub fn write_sqlite_database(
    path: &std::path::Path,
    records: &[AddressRecord],
) -> rusqlite::Result<()> {
    let mut connection = rusqlite::Connection::open(path)?;
    connection.execute(
        "CREATE TABLE addresses (id INTEGER PRIMARY KEY, record TEXT NOT NULL)",
        [],
    )?;
    let transaction = connection.transaction()?;
    {
        let mut statement =
            transaction.prepare("INSERT INTO addresses (id, record) VALUES (?1, ?2)")?;
        for (id, record) in (1_i64..).zip(records) {
            let payload = Value::Object(record.clone()).to_string();
            statement.execute(rusqlite::params![id, payload])?;
        }
    }
    transaction.commit()
}
