//! Whitelists of queryable store fields and the projections derived from them.
//!
//! A [`PropertySet`] is the static configuration a resolver needs: which
//! canonical fields may be queried or returned, and whether each compares by
//! strict equality or by substring. It is passed explicitly so several
//! configurations can coexist.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{AddressRecord, Retrievable};

/// Exact-match fields of the Berlin address index.
pub const BERLIN_EXACT_PROPERTIES: &[&str] = &[
    "bezirk_nr",
    "einschulungsbezirk",
    "etrs89_hoch",
    "etrs89_rechts",
    "finanzamt_nr",
    "hnr",
    "hnr_2",
    "lat",
    "lon",
    "lor_bzr_nr",
    "lor_pgr_nr",
    "lor_plr_nr",
    "mittelbereich",
    "ortsteil_nr",
    "plz",
    "soldner_hoch",
    "soldner_rechts",
    "stat_block",
    "stat_gebaeude",
    "strassen_nr",
    "strassenabschnitt",
    "verkehrsflaeche",
    "verkehrsteilflaeche",
];

/// Substring-match fields of the Berlin address index.
pub const BERLIN_FUZZY_PROPERTIES: &[&str] = &[
    "bezirk",
    "finanzamt",
    "karten",
    "lor_bzr",
    "lor_pgr",
    "lor_plr",
    "ortsteil",
    "str_hnr",
    "strasse",
];

/// Errors returned by [`PropertySet::new`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PropertySetError {
    /// A field was listed as both exact and fuzzy.
    #[error("property {field} is listed as both exact and fuzzy")]
    Overlap {
        /// The offending field name.
        field: String,
    },
    /// A field name was empty.
    #[error("property names must not be empty")]
    EmptyName,
}

/// The retrievable property set: disjoint exact and fuzzy field whitelists.
///
/// # Examples
/// ```
/// use geomatch_core::PropertySet;
///
/// # fn main() -> Result<(), geomatch_core::PropertySetError> {
/// let properties = PropertySet::new(["plz"], ["strasse"])?;
/// assert!(properties.is_exact("plz"));
/// assert!(properties.is_fuzzy("strasse"));
/// assert!(!properties.contains("unknown"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PropertyLists")]
pub struct PropertySet {
    exact: BTreeSet<String>,
    fuzzy: BTreeSet<String>,
}

/// Unvalidated wire form of a [`PropertySet`].
#[derive(Debug, Deserialize)]
struct PropertyLists {
    #[serde(default)]
    exact: Vec<String>,
    #[serde(default)]
    fuzzy: Vec<String>,
}

impl TryFrom<PropertyLists> for PropertySet {
    type Error = PropertySetError;

    fn try_from(lists: PropertyLists) -> Result<Self, Self::Error> {
        Self::new(lists.exact, lists.fuzzy)
    }
}

impl PropertySet {
    /// Validate and construct a property set.
    ///
    /// # Errors
    /// Returns [`PropertySetError::Overlap`] when a field appears in both
    /// lists and [`PropertySetError::EmptyName`] for blank names.
    pub fn new<E, F, S>(exact: E, fuzzy: F) -> Result<Self, PropertySetError>
    where
        E: IntoIterator<Item = S>,
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let exact = collect_names(exact)?;
        let fuzzy = collect_names(fuzzy)?;
        if let Some(field) = exact.intersection(&fuzzy).next() {
            return Err(PropertySetError::Overlap {
                field: field.clone(),
            });
        }
        Ok(Self { exact, fuzzy })
    }

    /// The whitelist of the Berlin address index.
    #[must_use]
    pub fn berlin() -> Self {
        Self {
            exact: BERLIN_EXACT_PROPERTIES
                .iter()
                .map(|name| (*name).to_owned())
                .collect(),
            fuzzy: BERLIN_FUZZY_PROPERTIES
                .iter()
                .map(|name| (*name).to_owned())
                .collect(),
        }
    }

    /// Whether `field` is compared by strict equality.
    #[must_use]
    pub fn is_exact(&self, field: &str) -> bool {
        self.exact.contains(field)
    }

    /// Whether `field` is compared by substring.
    #[must_use]
    pub fn is_fuzzy(&self, field: &str) -> bool {
        self.fuzzy.contains(field)
    }

    /// Whether `field` may be queried or projected at all.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.is_exact(field) || self.is_fuzzy(field)
    }

    /// Whether both whitelists are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.fuzzy.is_empty()
    }

    /// Exact properties in name order.
    pub fn exact(&self) -> impl Iterator<Item = &str> {
        self.exact.iter().map(String::as_str)
    }

    /// Fuzzy properties in name order.
    pub fn fuzzy(&self) -> impl Iterator<Item = &str> {
        self.fuzzy.iter().map(String::as_str)
    }

    /// All retrievable properties in name order.
    #[must_use]
    pub fn all(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.exact().chain(self.fuzzy()).collect();
        names.sort_unstable();
        names
    }

    /// Render the whitelist as a bullet list, marking fuzzy fields.
    ///
    /// Used in messages that tell a caller which fields are available.
    #[must_use]
    pub fn describe(&self) -> String {
        self.all()
            .into_iter()
            .map(|name| {
                if self.is_fuzzy(name) {
                    format!("  - {name} (fuzzy)")
                } else {
                    format!("  - {name}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Derive a projection from a comma-separated field list.
    ///
    /// Unknown names are ignored. No list, or a list naming only unknown
    /// fields, selects every retrievable property.
    #[must_use]
    pub fn projection(&self, requested: Option<&str>) -> Projection {
        let mut fields = Vec::new();
        for name in requested.into_iter().flat_map(|list| list.split(',')) {
            let name = name.trim();
            if self.contains(name) && !fields.iter().any(|field: &String| field == name) {
                fields.push(name.to_owned());
            }
        }
        if fields.is_empty() {
            fields = self.all().into_iter().map(str::to_owned).collect();
        }
        Projection { fields }
    }
}

fn collect_names<I, S>(names: I) -> Result<BTreeSet<String>, PropertySetError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names
        .into_iter()
        .map(|name| {
            let name = name.into();
            if name.trim().is_empty() {
                Err(PropertySetError::EmptyName)
            } else {
                Ok(name)
            }
        })
        .collect()
}

/// Canonical fields requested back from the store, in output order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    fields: Vec<String>,
}

impl Projection {
    /// Build a projection from explicit field names, dropping duplicates.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into();
            if !unique.contains(&field) {
                unique.push(field);
            }
        }
        Self { fields: unique }
    }

    /// Projected field names in output order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Whether `field` is projected.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|name| name == field)
    }

    /// Number of projected fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field is projected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Drop projected fields that `allowed` does not whitelist.
    #[must_use]
    pub fn restricted_to<R>(&self, allowed: &R) -> Self
    where
        R: Retrievable + ?Sized,
    {
        Self {
            fields: self
                .fields
                .iter()
                .filter(|field| allowed.is_retrievable(field))
                .cloned()
                .collect(),
        }
    }

    /// A record with every projected field set to the empty string.
    #[must_use]
    pub fn empty_template(&self) -> AddressRecord {
        self.fields
            .iter()
            .map(|field| (field.clone(), Value::String(String::new())))
            .collect()
    }

    /// Keep only the projected fields of `record`, in projection order.
    #[must_use]
    pub fn apply(&self, record: &AddressRecord) -> AddressRecord {
        self.fields
            .iter()
            .filter_map(|field| {
                record
                    .get(field)
                    .map(|value| (field.clone(), value.clone()))
            })
            .collect()
    }
}
