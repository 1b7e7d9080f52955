//! Data access traits for canonical address records.
//!
//! The [`AddressStore`] trait is the only capability the resolver needs from
//! its storage collaborator: filter, project, cap. Implementations decide how
//! the index is laid out.

use std::sync::Arc;

use thiserror::Error;

use crate::{AddressRecord, Projection};

mod filter;
#[cfg(feature = "store-sqlite")]
mod sqlite;

pub use filter::{Filter, FilterValue, SubstringPattern};
#[cfg(feature = "store-sqlite")]
pub use sqlite::{ADDRESS_TABLE, SqliteAddressStore, SqliteAddressStoreError};

/// Errors reported by an [`AddressStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot serve lookups at all.
    #[error("address store is unavailable: {message}")]
    Unavailable {
        /// Human-readable cause.
        message: String,
    },
    /// The backend failed while executing a lookup.
    #[error("address lookup failed: {source}")]
    Backend {
        /// Backend-specific error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    /// Wrap a backend error.
    pub fn backend<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(source),
        }
    }
}

/// Read-only access to an address index.
///
/// Implementations must be `Send + Sync`: batch resolution issues lookups
/// from several blocking worker threads at once.
///
/// # Examples
///
/// ```rust
/// use geomatch_core::{AddressRecord, AddressStore, Filter, Projection, StoreError};
///
/// struct MemoryStore {
///     records: Vec<AddressRecord>,
/// }
///
/// impl AddressStore for MemoryStore {
///     fn find(
///         &self,
///         filter: &Filter,
///         projection: &Projection,
///         limit: Option<usize>,
///     ) -> Result<Vec<AddressRecord>, StoreError> {
///         Ok(self
///             .records
///             .iter()
///             .filter(|record| filter.matches(record))
///             .take(limit.unwrap_or(usize::MAX))
///             .map(|record| projection.apply(record))
///             .collect())
///     }
/// }
///
/// let store = MemoryStore { records: vec![AddressRecord::new()] };
/// let found = store.find(&Filter::new(), &Projection::default(), Some(2))?;
/// assert_eq!(found.len(), 1);
/// # Ok::<(), StoreError>(())
/// ```
pub trait AddressStore: Send + Sync {
    /// Return records satisfying every term of `filter`.
    ///
    /// Each record carries only the fields named by `projection`. At most
    /// `limit` records are returned; `None` means no cap. Order is
    /// unspecified.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backend cannot answer.
    fn find(
        &self,
        filter: &Filter,
        projection: &Projection,
        limit: Option<usize>,
    ) -> Result<Vec<AddressRecord>, StoreError>;
}

impl<S> AddressStore for Arc<S>
where
    S: AddressStore + ?Sized,
{
    fn find(
        &self,
        filter: &Filter,
        projection: &Projection,
        limit: Option<usize>,
    ) -> Result<Vec<AddressRecord>, StoreError> {
        (**self).find(filter, projection, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldValue;
    use crate::test_support::{MemoryStore, berlin_sample};
    use rstest::{fixture, rstest};

    #[fixture]
    fn store() -> MemoryStore {
        MemoryStore::with_records(berlin_sample())
    }

    fn postcode(value: &str) -> Filter {
        let mut filter = Filter::new();
        filter.insert("plz", FilterValue::Exact(FieldValue::Text(value.into())));
        filter
    }

    #[rstest]
    fn returns_projected_matches(store: MemoryStore) {
        let projection = Projection::new(["str_hnr"]);
        let found = store
            .find(&postcode("12435"), &projection, None)
            .expect("lookup succeeds");
        assert_eq!(found.len(), 1);
        let keys: Vec<_> = found.iter().flat_map(|record| record.keys()).collect();
        assert_eq!(keys, vec!["str_hnr"]);
    }

    #[rstest]
    fn honours_limit(store: MemoryStore) {
        let found = store
            .find(&Filter::new(), &Projection::default(), Some(2))
            .expect("lookup succeeds");
        assert_eq!(found.len(), 2);
    }

    #[rstest]
    fn returns_empty_when_nothing_matches(store: MemoryStore) {
        let found = store
            .find(&postcode("99999"), &Projection::default(), None)
            .expect("lookup succeeds");
        assert!(found.is_empty());
    }

    #[rstest]
    fn shared_stores_delegate(store: MemoryStore) {
        let shared: Arc<dyn AddressStore> = Arc::new(store);
        let found = shared
            .find(&postcode("12435"), &Projection::default(), None)
            .expect("lookup succeeds");
        assert_eq!(found.len(), 1);
    }
}
