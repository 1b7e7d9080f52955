//! Test helpers for laying out CLI inputs in a temporary workspace.

use camino::{Utf8Path, Utf8PathBuf};
use geomatch_core::AddressRecord;
use serde_json::Value;
use tempfile::TempDir;

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    std::fs::write(path, contents).expect("write fixture file");
}

/// Decode CLI JSON output into records.
pub(super) fn decode_records(output: &[u8]) -> Vec<AddressRecord> {
    serde_json::from_slice(output).expect("CLI output should be a JSON array of records")
}

/// A temporary directory holding an address database and input files.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root =
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    /// Write the sample Berlin addresses into `addresses.db`.
    #[cfg(feature = "store-sqlite")]
    pub(super) fn address_database(&self) -> Utf8PathBuf {
        let path = self.path("addresses.db");
        geomatch_core::test_support::write_sqlite_database(
            path.as_std_path(),
            &geomatch_core::test_support::berlin_sample(),
        )
        .expect("write address database");
        path
    }

    /// Write `records` as a JSON array into `name`.
    pub(super) fn json_file(&self, name: &str, records: &Value) -> Utf8PathBuf {
        let path = self.path(name);
        let payload = serde_json::to_vec_pretty(records).expect("serialise fixture");
        write_utf8(&path, &payload);
        path
    }
}
