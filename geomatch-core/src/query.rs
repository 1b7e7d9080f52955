//! Building store queries from caller-shaped records.
//!
//! Callers name their columns however they like. A [`Representation`] maps the
//! store's canonical field names onto those columns, and [`build_query`] picks
//! the mapped values out of one record, keeping only whitelisted fields.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::{AddressRecord, PropertySet};

/// Fields a query may be built from.
///
/// Implemented for [`PropertySet`] and for plain lists of names so tests and
/// callers can restrict a query without building a full property set.
pub trait Retrievable {
    /// Whether `field` may appear in a query.
    fn is_retrievable(&self, field: &str) -> bool;
}

impl Retrievable for PropertySet {
    fn is_retrievable(&self, field: &str) -> bool {
        self.contains(field)
    }
}

impl Retrievable for [&str] {
    fn is_retrievable(&self, field: &str) -> bool {
        self.contains(&field)
    }
}

impl<const N: usize> Retrievable for [&str; N] {
    fn is_retrievable(&self, field: &str) -> bool {
        self.contains(&field)
    }
}

/// Mapping from canonical store field names to caller column names.
///
/// # Examples
/// ```
/// use geomatch_core::Representation;
///
/// let representation = Representation::from_iter([("strasse", "Strassenname")]);
/// assert_eq!(representation.source_for("strasse"), Some("Strassenname"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Representation {
    columns: BTreeMap<String, String>,
}

impl Representation {
    /// Create an empty representation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `field` onto the caller column `source`.
    pub fn insert(&mut self, field: impl Into<String>, source: impl Into<String>) {
        self.columns.insert(field.into(), source.into());
    }

    /// The caller column mapped to `field`.
    #[must_use]
    pub fn source_for(&self, field: &str) -> Option<&str> {
        self.columns.get(field).map(String::as_str)
    }

    /// Canonical field / caller column pairs in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .map(|(field, source)| (field.as_str(), source.as_str()))
    }

    /// Number of mapped fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Keep only the fields `retrievable` accepts.
    #[must_use]
    pub fn restricted_to<R>(&self, retrievable: &R) -> Self
    where
        R: Retrievable + ?Sized,
    {
        Self {
            columns: self
                .columns
                .iter()
                .filter(|(field, _)| retrievable.is_retrievable(field))
                .map(|(field, source)| (field.clone(), source.clone()))
                .collect(),
        }
    }
}

impl<F, S> FromIterator<(F, S)> for Representation
where
    F: Into<String>,
    S: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (F, S)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(field, source)| (field.into(), source.into()))
                .collect(),
        }
    }
}

/// Raw, not yet normalised values keyed by canonical field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    terms: BTreeMap<String, Value>,
}

impl Query {
    /// The raw value for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.terms.get(field)
    }

    /// Field / value pairs in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.terms.iter().map(|(field, value)| (field.as_str(), value))
    }

    /// Number of terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the query carries no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl<F> FromIterator<(F, Value)> for Query
where
    F: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (F, Value)>>(iter: I) -> Self {
        Self {
            terms: iter
                .into_iter()
                .map(|(field, value)| (field.into(), value))
                .collect(),
        }
    }
}

/// Pick the values `representation` points at out of `record`.
///
/// Fields outside `retrievable`, and fields whose mapped column is absent from
/// the record, are skipped. An empty query is a valid result.
///
/// # Examples
/// ```
/// use geomatch_core::{Representation, build_query};
/// use serde_json::json;
///
/// let row = json!({"Strassenname": "Kurfürstendamm", "Postleitzahl": "10719"});
/// let row = row.as_object().cloned().unwrap_or_default();
/// let representation =
///     Representation::from_iter([("strasse", "Strassenname"), ("plz", "Postleitzahl")]);
///
/// let query = build_query(&row, &representation, &["strasse", "plz"]);
/// assert_eq!(query.get("strasse"), Some(&json!("Kurfürstendamm")));
/// assert_eq!(query.get("plz"), Some(&json!("10719")));
/// ```
#[must_use]
pub fn build_query<R>(
    record: &AddressRecord,
    representation: &Representation,
    retrievable: &R,
) -> Query
where
    R: Retrievable + ?Sized,
{
    representation
        .iter()
        .filter(|(field, _)| retrievable.is_retrievable(field))
        .filter_map(|(field, source)| record.get(source).map(|value| (field, value.clone())))
        .collect()
}
