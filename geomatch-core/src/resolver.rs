//! Resolving one query to at most one canonical address.
//!
//! A query is normalised, turned into a store [`Filter`] and sent to the store
//! with a candidate cap of [`CANDIDATE_LIMIT`]. Exactly one candidate is a
//! match; anything else leaves the record unresolved. Ambiguity is an outcome,
//! not an error.

use std::fmt;

use log::{debug, warn};
use thiserror::Error;

use crate::{
    AddressRecord, AddressStore, FieldValue, Filter, FilterValue, Normalizer, Projection,
    PropertySet, Query, StoreError, SubstringPattern,
};

/// Candidates requested per lookup. Two is enough to tell "one" from "many".
pub const CANDIDATE_LIMIT: usize = 2;

/// Why a record was left unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnresolvedReason {
    /// The store returned no candidate, or the query had no usable term.
    NoMatch,
    /// The store returned more than one candidate.
    Ambiguous,
    /// A substring pattern could not be compiled.
    InvalidPattern,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NoMatch => "no match",
            Self::Ambiguous => "ambiguous",
            Self::InvalidPattern => "invalid pattern",
        };
        f.write_str(label)
    }
}

/// Outcome of resolving one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Exactly one candidate; its projected fields.
    Matched(AddressRecord),
    /// No single candidate could be chosen.
    Unresolved(UnresolvedReason),
}

impl Resolution {
    /// Apply the one-candidate rule to a store answer.
    ///
    /// # Examples
    /// ```
    /// use geomatch_core::{AddressRecord, Resolution, UnresolvedReason};
    ///
    /// let one = Resolution::from_candidates(vec![AddressRecord::new()]);
    /// assert!(one.is_matched());
    ///
    /// let two = Resolution::from_candidates(vec![AddressRecord::new(), AddressRecord::new()]);
    /// assert_eq!(two, Resolution::Unresolved(UnresolvedReason::Ambiguous));
    /// ```
    #[must_use]
    pub fn from_candidates(mut candidates: Vec<AddressRecord>) -> Self {
        match candidates.len() {
            0 => Self::Unresolved(UnresolvedReason::NoMatch),
            1 => candidates
                .pop()
                .map_or(Self::Unresolved(UnresolvedReason::NoMatch), Self::Matched),
            _ => Self::Unresolved(UnresolvedReason::Ambiguous),
        }
    }

    /// Whether a single candidate was found.
    #[must_use]
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    /// The reason the record stayed unresolved, if it did.
    #[must_use]
    pub fn unresolved_reason(&self) -> Option<UnresolvedReason> {
        match self {
            Self::Matched(_) => None,
            Self::Unresolved(reason) => Some(*reason),
        }
    }

    /// The matched fields; empty when unresolved.
    #[must_use]
    pub fn into_fields(self) -> AddressRecord {
        match self {
            Self::Matched(fields) => fields,
            Self::Unresolved(_) => AddressRecord::new(),
        }
    }
}

/// Errors returned by [`resolve`].
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The store could not answer the lookup.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Turn a raw query into a store filter.
///
/// Values are coerced and normalised. Fields outside `properties`, values
/// without a scalar form, and blank values are dropped. Fuzzy fields become
/// escaped substring patterns; every other field stays an exact literal.
///
/// # Errors
/// Returns the `regex` error when a substring pattern exceeds the size limit.
pub fn compile_filter(
    query: &Query,
    properties: &PropertySet,
    normalizer: &Normalizer,
) -> Result<Filter, regex::Error> {
    let mut filter = Filter::new();
    for (field, raw) in query.iter() {
        if !properties.contains(field) {
            continue;
        }
        let Some(value) = FieldValue::coerce(field, raw) else {
            continue;
        };
        let value = normalizer.normalize_value(field, value);
        if value.is_blank() {
            continue;
        }
        let term = match value {
            FieldValue::Text(text) if properties.is_fuzzy(field) => {
                FilterValue::Pattern(SubstringPattern::new(text)?)
            }
            exact => FilterValue::Exact(exact),
        };
        filter.insert(field, term);
    }
    Ok(filter)
}

/// Resolve `query` against `store`.
///
/// # Examples
/// ```
/// use geomatch_core::test_support::{MemoryStore, berlin_sample};
/// use geomatch_core::{Projection, PropertySet, Query, resolve};
/// use serde_json::json;
///
/// let store = MemoryStore::with_records(berlin_sample());
/// let query: Query = [("str_hnr", json!("Elsenstrasse 110c"))].into_iter().collect();
/// let resolution = resolve(&query, &PropertySet::berlin(), &Projection::new(["plz"]), &store)?;
/// assert_eq!(resolution.into_fields().get("plz"), Some(&json!("12435")));
/// # Ok::<(), geomatch_core::ResolveError>(())
/// ```
///
/// # Errors
/// Returns [`ResolveError::Store`] when the lookup fails. No match, several
/// matches and uncompilable patterns are not errors.
pub fn resolve<S>(
    query: &Query,
    properties: &PropertySet,
    projection: &Projection,
    store: &S,
) -> Result<Resolution, ResolveError>
where
    S: AddressStore + ?Sized,
{
    let filter = match compile_filter(query, properties, Normalizer::shared()) {
        Ok(filter) => filter,
        Err(err) => {
            warn!("skipping lookup with uncompilable pattern: {err}");
            return Ok(Resolution::Unresolved(UnresolvedReason::InvalidPattern));
        }
    };
    if filter.is_empty() {
        debug!("query has no usable terms; left unresolved");
        return Ok(Resolution::Unresolved(UnresolvedReason::NoMatch));
    }

    let projection = projection.restricted_to(properties);
    let candidates = store.find(&filter, &projection, Some(CANDIDATE_LIMIT))?;
    let resolution = Resolution::from_candidates(candidates);
    match &resolution {
        Resolution::Matched(_) => debug!("resolved query on {} field(s)", filter.len()),
        Resolution::Unresolved(reason) => {
            debug!("query on {} field(s) unresolved: {reason}", filter.len());
        }
    }
    Ok(resolution)
}
