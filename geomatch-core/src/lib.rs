//! Core domain types for the geomatch address resolution engine.
//!
//! Caller records in arbitrary column layouts are mapped onto canonical store
//! fields, normalised, and resolved against an [`AddressStore`]. A record is
//! matched only when the store yields exactly one candidate; otherwise it is
//! left unresolved. Batches are resolved concurrently and merged back in input
//! order.

#![forbid(unsafe_code)]

mod batch;
mod lookup;
mod merge;
mod normalize;
mod properties;
mod query;
mod record;
mod resolver;
mod store;

#[cfg(any(test, feature = "test-support"))]
#[doc(hidden)]
pub mod test_support;

pub use batch::{BatchError, BatchOutcome, BatchRequest, BatchResolver, BatchSummary};
pub use lookup::{LookupError, LookupRequest, lookup};
pub use merge::{MergeError, merge_batch, merge_record};
pub use normalize::{
    COMBINED_STREET_FIELD, FieldScope, Normalizer, RULES, Rewrite, Rule, RuleSpec, STREET_FIELD,
    normalize,
};
pub use properties::{
    BERLIN_EXACT_PROPERTIES, BERLIN_FUZZY_PROPERTIES, Projection, PropertySet, PropertySetError,
};
pub use query::{Query, Representation, Retrievable, build_query};
pub use record::{
    AddressRecord, FieldValue, LATITUDE_FIELD, LONGITUDE_FIELD, is_coordinate_field,
};
pub use resolver::{
    CANDIDATE_LIMIT, Resolution, ResolveError, UnresolvedReason, compile_filter, resolve,
};
pub use store::{AddressStore, Filter, FilterValue, StoreError, SubstringPattern};
#[cfg(feature = "store-sqlite")]
pub use store::{ADDRESS_TABLE, SqliteAddressStore, SqliteAddressStoreError};
