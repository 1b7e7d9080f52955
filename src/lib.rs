//! Facade crate for the geomatch address resolution engine.
//!
//! This crate re-exports the core domain types and exposes the SQLite address
//! store behind a feature flag.

#![forbid(unsafe_code)]

pub use geomatch_core::{
    AddressRecord, AddressStore, BatchError, BatchOutcome, BatchRequest, BatchResolver,
    BatchSummary, Filter, FilterValue, LookupError, LookupRequest, MergeError, Normalizer,
    Projection, PropertySet, PropertySetError, Query, Representation, Resolution, ResolveError,
    StoreError, SubstringPattern, UnresolvedReason, build_query, lookup, merge_batch, normalize,
    resolve,
};

#[cfg(feature = "store-sqlite")]
pub use geomatch_core::{SqliteAddressStore, SqliteAddressStoreError};
