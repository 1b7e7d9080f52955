//! Direct lookups by canonical field values.
//!
//! Unlike [`resolve`](crate::resolve), a lookup returns every candidate the
//! store yields up to a caller limit, and values are used as given rather than
//! normalised.

use log::debug;
use serde_json::Value;
use thiserror::Error;

use crate::{
    AddressRecord, AddressStore, FieldValue, Filter, FilterValue, Projection, PropertySet,
    StoreError, SubstringPattern,
};

/// Canonical field filters plus lookup options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupRequest {
    /// Canonical field / value pairs; later pairs replace earlier ones.
    pub filters: Vec<(String, Value)>,
    /// Compare fuzzy properties by substring instead of equality.
    pub fuzzy: bool,
    /// Maximum number of records; `None` or `Some(0)` means no cap.
    pub limit: Option<usize>,
    /// Fields returned for each record.
    pub projection: Projection,
}

impl LookupRequest {
    /// Add a filter on `field`.
    #[must_use]
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|limit| *limit > 0)
    }
}

/// Errors returned by [`lookup`].
#[derive(Debug, Error)]
pub enum LookupError {
    /// No filter names a retrievable property.
    #[error("no usable filters; available properties:\n{available}")]
    NoFilters {
        /// Bullet list of retrievable fields, fuzzy ones marked.
        available: String,
    },
    /// A substring pattern exceeded the `regex` size limit.
    #[error("invalid substring pattern for {field}: {source}")]
    InvalidPattern {
        /// Field the pattern was built for.
        field: String,
        /// Compilation failure.
        #[source]
        source: regex::Error,
    },
    /// The store could not answer.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Look up every record matching `request`.
///
/// # Examples
/// ```
/// use geomatch_core::test_support::{MemoryStore, berlin_sample};
/// use geomatch_core::{LookupRequest, PropertySet, lookup};
///
/// let properties = PropertySet::berlin();
/// let store = MemoryStore::with_records(berlin_sample());
/// let request = LookupRequest {
///     fuzzy: true,
///     projection: properties.projection(Some("str_hnr")),
///     ..LookupRequest::default()
/// }
/// .with_filter("strasse", "Oranien");
/// let found = lookup(&request, &properties, &store)?;
/// assert_eq!(found.len(), 2);
/// # Ok::<(), geomatch_core::LookupError>(())
/// ```
///
/// # Errors
/// Returns [`LookupError::NoFilters`] when nothing usable remains after
/// dropping unknown fields, and propagates store failures.
pub fn lookup<S>(
    request: &LookupRequest,
    properties: &PropertySet,
    store: &S,
) -> Result<Vec<AddressRecord>, LookupError>
where
    S: AddressStore + ?Sized,
{
    let mut filter = Filter::new();
    for (field, raw) in &request.filters {
        if !properties.contains(field) {
            debug!("ignoring filter on unknown property {field}");
            continue;
        }
        let Some(value) = FieldValue::coerce(field, raw) else {
            continue;
        };
        let term = match value {
            FieldValue::Text(text) if request.fuzzy && properties.is_fuzzy(field) => {
                let pattern =
                    SubstringPattern::new(text).map_err(|source| LookupError::InvalidPattern {
                        field: field.clone(),
                        source,
                    })?;
                FilterValue::Pattern(pattern)
            }
            exact => FilterValue::Exact(exact),
        };
        filter.insert(field.as_str(), term);
    }

    if filter.is_empty() {
        return Err(LookupError::NoFilters {
            available: properties.describe(),
        });
    }

    let projection = request.projection.restricted_to(properties);
    let found = store.find(&filter, &projection, request.effective_limit())?;
    debug!("lookup on {} field(s) found {} record(s)", filter.len(), found.len());
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryStore, UnavailableStore, berlin_sample};
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn store() -> MemoryStore {
        MemoryStore::with_records(berlin_sample())
    }

    fn base_request(fuzzy: bool, limit: Option<usize>) -> LookupRequest {
        LookupRequest {
            fuzzy,
            limit,
            projection: Projection::new(["str_hnr"]),
            ..LookupRequest::default()
        }
    }

    #[rstest]
    #[case::fuzzy(true, None, 2)]
    #[case::exact(false, None, 0)]
    #[case::capped(true, Some(1), 1)]
    #[case::zero_is_unlimited(true, Some(0), 2)]
    fn street_lookups(
        store: MemoryStore,
        #[case] fuzzy: bool,
        #[case] limit: Option<usize>,
        #[case] expected: usize,
    ) {
        let request = base_request(fuzzy, limit).with_filter("strasse", "Oranien");
        let found = lookup(&request, &PropertySet::berlin(), &store).expect("lookup succeeds");
        assert_eq!(found.len(), expected);
    }

    #[rstest]
    fn values_are_not_normalised(store: MemoryStore) {
        let request = base_request(true, None).with_filter("str_hnr", "Elsenstrasse 110C");
        let found = lookup(&request, &PropertySet::berlin(), &store).expect("lookup succeeds");
        assert!(found.is_empty());
    }

    #[rstest]
    fn exact_properties_stay_exact_when_fuzzy(store: MemoryStore) {
        let request = base_request(true, None).with_filter("plz", "109");
        let found = lookup(&request, &PropertySet::berlin(), &store).expect("lookup succeeds");
        assert!(found.is_empty());

        let request = base_request(true, None).with_filter("plz", json!(10969));
        let found = lookup(&request, &PropertySet::berlin(), &store).expect("lookup succeeds");
        assert_eq!(found.len(), 1);
    }

    #[rstest]
    fn unknown_filters_are_reported(store: MemoryStore) {
        let request = base_request(false, None).with_filter("colour", "red");
        let err = lookup(&request, &PropertySet::berlin(), &store).expect_err("no usable filter");
        let LookupError::NoFilters { available } = &err else {
            panic!("unexpected error: {err}");
        };
        assert!(available.contains("  - strasse (fuzzy)"));
        assert!(available.contains("  - plz\n"));
        assert_eq!(store.lookups(), 0);
    }

    #[rstest]
    fn projection_is_limited_to_whitelisted_fields(store: MemoryStore) {
        let request = LookupRequest {
            projection: Projection::new(["plz", "etage"]),
            ..LookupRequest::default()
        }
        .with_filter("plz", "13353");
        let found = lookup(&request, &PropertySet::berlin(), &store).expect("lookup succeeds");
        let keys: Vec<_> = found.iter().flat_map(|record| record.keys()).collect();
        assert_eq!(keys, vec!["plz"]);
    }

    #[rstest]
    fn store_failures_propagate() {
        let request = base_request(false, None).with_filter("plz", "10997");
        let err = lookup(&request, &PropertySet::berlin(), &UnavailableStore)
            .expect_err("store is down");
        assert!(matches!(err, LookupError::Store(_)));
    }
}
