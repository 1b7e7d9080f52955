//! Loading the inputs shared by the `resolve` and `lookup` commands.

use std::{io::BufReader, sync::Arc};

use camino::Utf8Path;
use geomatch_core::{AddressRecord, AddressStore, PropertySet};

use crate::{ARG_PROPERTIES, ARG_RESOLVE_INPUT, CliError, fs::open_utf8_file};

/// Split a `name=value` option into its halves.
///
/// Surrounding whitespace is trimmed from the name only; the value is kept
/// verbatim so padded inputs reach the normaliser unchanged.
pub(crate) fn parse_pair<'a>(
    raw: &'a str,
    field: &'static str,
) -> Result<(&'a str, &'a str), CliError> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => Err(CliError::InvalidPair {
            field,
            value: raw.to_owned(),
        }),
    }
}

/// Load a JSON array of address records.
pub(crate) fn load_records(path: &Utf8Path) -> Result<Vec<AddressRecord>, CliError> {
    let file = open_utf8_file(path).map_err(|source| CliError::OpenInput {
        field: ARG_RESOLVE_INPUT,
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| CliError::ParseRecords {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a property set file, or fall back to the Berlin whitelist.
pub(crate) fn load_properties(path: Option<&Utf8Path>) -> Result<PropertySet, CliError> {
    let Some(path) = path else {
        return Ok(PropertySet::berlin());
    };
    let file = open_utf8_file(path).map_err(|source| CliError::OpenInput {
        field: ARG_PROPERTIES,
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| CliError::ParseProperties {
        path: path.to_path_buf(),
        source,
    })
}

/// Open the address database read-only.
#[cfg(feature = "store-sqlite")]
pub(crate) fn open_store(path: &Utf8Path) -> Result<Arc<dyn AddressStore>, CliError> {
    let store = geomatch_core::SqliteAddressStore::open(path.as_std_path())?;
    Ok(Arc::new(store))
}

/// Open the address database read-only.
#[cfg(not(feature = "store-sqlite"))]
pub(crate) fn open_store(_path: &Utf8Path) -> Result<Arc<dyn AddressStore>, CliError> {
    Err(CliError::MissingFeature {
        feature: "store-sqlite",
        action: "opening an address database",
    })
}
