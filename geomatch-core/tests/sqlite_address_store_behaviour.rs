//! Behavioural tests for `SqliteAddressStore` using rstest-bdd.
#![cfg(feature = "store-sqlite")]

use std::{cell::RefCell, path::PathBuf};

use geomatch_core::{
    AddressRecord, LookupRequest, Projection, PropertySet, Query, Resolution,
    SqliteAddressStore, SqliteAddressStoreError, lookup, resolve,
    test_support::{berlin_sample, write_sqlite_database},
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::json;
use tempfile::TempDir;

/// Shared state for SQLite store scenarios.
#[derive(Debug)]
struct AddressStoreWorld {
    temp_dir: TempDir,
    db_path: RefCell<Option<PathBuf>>,
    store: RefCell<Option<SqliteAddressStore>>,
    store_error: RefCell<Option<SqliteAddressStoreError>>,
    resolution: RefCell<Option<Resolution>>,
    found: RefCell<Vec<AddressRecord>>,
}

impl AddressStoreWorld {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("create temp dir"),
            db_path: RefCell::new(None),
            store: RefCell::new(None),
            store_error: RefCell::new(None),
            resolution: RefCell::new(None),
            found: RefCell::new(Vec::new()),
        }
    }

    fn database_path(&self) -> PathBuf {
        self.temp_dir.path().join("addresses.db")
    }

    fn with_store<T>(&self, run: impl FnOnce(&SqliteAddressStore) -> T) -> T {
        assert!(self.store_error.borrow().is_none(), "unexpected store error");
        let borrowed = self.store.borrow();
        let store = borrowed
            .as_ref()
            .expect("store should be available for querying");
        run(store)
    }
}

#[fixture]
fn world() -> AddressStoreWorld {
    AddressStoreWorld::new()
}

#[given("a SQLite address database with the Berlin sample")]
fn given_sample_database(world: &AddressStoreWorld) {
    let path = world.database_path();
    write_sqlite_database(&path, &berlin_sample()).expect("persist database");
    world.db_path.replace(Some(path));
}

#[given("a SQLite database without an address table")]
fn given_empty_database(world: &AddressStoreWorld) {
    let path = world.database_path();
    rusqlite::Connection::open(&path)
        .and_then(|connection| connection.execute("CREATE TABLE other (id INTEGER)", []))
        .expect("create unrelated table");
    world.db_path.replace(Some(path));
}

#[when("I open the SQLite address store")]
fn open_store(world: &AddressStoreWorld) {
    let path = world
        .db_path
        .borrow()
        .clone()
        .expect("database should be written before opening");
    match SqliteAddressStore::open(&path) {
        Ok(store) => {
            world.store.replace(Some(store));
            world.store_error.replace(None);
        }
        Err(err) => {
            world.store.replace(None);
            world.store_error.replace(Some(err));
        }
    }
}

#[when("I resolve a misspelt Elsenstraße address")]
fn resolve_misspelt(world: &AddressStoreWorld) {
    let query: Query = [("str_hnr", json!("  Elsenstrasse 110 c"))]
        .into_iter()
        .collect();
    let resolution = world.with_store(|store| {
        resolve(&query, &PropertySet::berlin(), &Projection::new(["plz"]), store)
            .expect("lookup succeeds")
    });
    world.resolution.replace(Some(resolution));
}

#[when("I look up streets containing Oranien")]
fn lookup_oranien(world: &AddressStoreWorld) {
    let request = LookupRequest {
        fuzzy: true,
        projection: Projection::new(["str_hnr"]),
        ..LookupRequest::default()
    }
    .with_filter("strasse", "Oranien");
    let found = world.with_store(|store| {
        lookup(&request, &PropertySet::berlin(), store).expect("lookup succeeds")
    });
    world.found.replace(found);
}

#[then("the resolved postcode is 12435")]
fn then_postcode(world: &AddressStoreWorld) {
    let resolution = world
        .resolution
        .borrow_mut()
        .take()
        .expect("a resolution should be recorded");
    assert_eq!(resolution.into_fields().get("plz"), Some(&json!("12435")));
}

#[then("two records are returned from the SQLite store")]
fn then_two_records(world: &AddressStoreWorld) {
    let found = world.found.borrow();
    let streets: Vec<_> = found
        .iter()
        .filter_map(|record| record.get("str_hnr"))
        .collect();
    assert_eq!(
        streets,
        vec![&json!("Oranienstraße 1"), &json!("Oranienstraße 11")]
    );
}

#[then("opening the SQLite store fails with a missing table error")]
fn then_missing_table(world: &AddressStoreWorld) {
    let binding = world.store_error.borrow();
    let error = binding.as_ref().expect("an error should be recorded");
    assert!(matches!(error, SqliteAddressStoreError::MissingTable { .. }));
}

#[scenario(path = "tests/features/sqlite_address_store.feature", index = 0)]
fn resolves_against_persisted_index(world: AddressStoreWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/sqlite_address_store.feature", index = 1)]
fn substring_lookups(world: AddressStoreWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/sqlite_address_store.feature", index = 2)]
fn missing_table(world: AddressStoreWorld) {
    let _ = world;
}
