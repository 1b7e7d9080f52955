//! Store filters: exact literals and escaped substring patterns.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;

use crate::FieldValue;
use crate::record::stored_text;

/// A case-sensitive, unanchored substring pattern.
///
/// The literal is escaped before compilation, so user input never contributes
/// pattern syntax.
///
/// # Examples
/// ```
/// use geomatch_core::SubstringPattern;
///
/// # fn main() -> Result<(), regex::Error> {
/// let pattern = SubstringPattern::new("str. (Nord)")?;
/// assert!(pattern.is_match("Hauptstr. (Nord) 5"));
/// assert!(!pattern.is_match("Hauptstrx (Nord) 5"));
/// assert!(!pattern.is_match("hauptstr. (nord) 5"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SubstringPattern {
    literal: String,
    regex: Regex,
}

impl SubstringPattern {
    /// Escape and compile `literal`.
    ///
    /// # Errors
    /// Fails only when the escaped literal exceeds the `regex` size limit.
    pub fn new(literal: impl Into<String>) -> Result<Self, regex::Error> {
        let literal = literal.into();
        let regex = Regex::new(&regex::escape(&literal))?;
        Ok(Self { literal, regex })
    }

    /// The unescaped literal the pattern searches for.
    #[must_use]
    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// Whether `haystack` contains the literal.
    #[must_use]
    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

impl PartialEq for SubstringPattern {
    fn eq(&self, other: &Self) -> bool {
        self.literal == other.literal
    }
}

/// How one field is compared against stored records.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Strict (loosely typed) equality.
    Exact(FieldValue),
    /// Substring match.
    Pattern(SubstringPattern),
}

impl FilterValue {
    /// Whether a stored value satisfies this filter. Absent values never do.
    #[must_use]
    pub fn matches(&self, stored: Option<&Value>) -> bool {
        let Some(stored) = stored else {
            return false;
        };
        match self {
            Self::Exact(expected) => expected.matches_stored(stored),
            Self::Pattern(pattern) => {
                stored_text(stored).is_some_and(|text| pattern.is_match(&text))
            }
        }
    }
}

/// Field filters handed to an [`AddressStore`](super::AddressStore).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    terms: BTreeMap<String, FilterValue>,
}

impl Filter {
    /// Create an empty filter, which matches every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the filter for `field`.
    pub fn insert(&mut self, field: impl Into<String>, value: FilterValue) {
        self.terms.insert(field.into(), value);
    }

    /// The filter for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.terms.get(field)
    }

    /// Field / filter pairs in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.terms.iter().map(|(field, value)| (field.as_str(), value))
    }

    /// Number of filtered fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether no field is filtered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether `record` satisfies every term.
    #[must_use]
    pub fn matches(&self, record: &crate::AddressRecord) -> bool {
        self.terms
            .iter()
            .all(|(field, value)| value.matches(record.get(field)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn pattern(literal: &str) -> FilterValue {
        FilterValue::Pattern(SubstringPattern::new(literal).expect("escaped literal compiles"))
    }

    #[rstest]
    #[case("Oranienstraße 1", "Oranienstraße 11", true)]
    #[case("straße", "Oranienstraße 1", true)]
    #[case("Straße", "Oranienstraße 1", false)]
    #[case("a.c", "abc", false)]
    #[case("a.c", "xa.cx", true)]
    #[case("(", "(", true)]
    #[case("^Ora", "Oranienstraße", false)]
    fn patterns_match_escaped_substrings(
        #[case] literal: &str,
        #[case] stored: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(pattern(literal).matches(Some(&json!(stored))), expected);
    }

    #[rstest]
    fn patterns_match_numeric_stored_values() {
        assert!(pattern("107").matches(Some(&json!(10719))));
    }

    #[rstest]
    fn absent_values_never_match() {
        assert!(!pattern("").matches(None));
        assert!(!FilterValue::Exact(FieldValue::Text("x".into())).matches(None));
    }

    #[rstest]
    fn filter_requires_every_term() {
        let mut filter = Filter::new();
        filter.insert("plz", FilterValue::Exact(FieldValue::Text("10997".into())));
        filter.insert("str_hnr", pattern("Oranienstraße 1"));

        let hit = json!({"plz": "10997", "str_hnr": "Oranienstraße 1"});
        let miss = json!({"plz": "10969", "str_hnr": "Oranienstraße 11"});
        assert!(filter.matches(hit.as_object().expect("object")));
        assert!(!filter.matches(miss.as_object().expect("object")));
        assert!(Filter::new().matches(miss.as_object().expect("object")));
    }
}
