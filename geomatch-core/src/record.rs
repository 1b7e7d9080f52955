//! Address records and the coerced scalar values queries carry.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An address as supplied by a caller or returned by a store.
///
/// Records are insertion-ordered JSON objects, so merged output keeps the
/// caller's column order.
pub type AddressRecord = serde_json::Map<String, Value>;

/// Latitude field name; coerced to a number rather than text.
pub const LATITUDE_FIELD: &str = "lat";
/// Longitude field name; coerced to a number rather than text.
pub const LONGITUDE_FIELD: &str = "lon";

/// Whether `field` holds a coordinate that stays numeric after coercion.
#[must_use]
pub fn is_coordinate_field(field: &str) -> bool {
    field == LATITUDE_FIELD || field == LONGITUDE_FIELD
}

/// A record value after type coercion.
///
/// Every field except the coordinates is compared as text, so a postal code
/// supplied as `12435` and as `"12435"` produce the same query.
///
/// # Examples
/// ```
/// use geomatch_core::FieldValue;
/// use serde_json::json;
///
/// assert_eq!(
///     FieldValue::coerce("plz", &json!(12435)),
///     Some(FieldValue::Text("12435".into()))
/// );
/// assert_eq!(
///     FieldValue::coerce("lat", &json!("52.5")),
///     Some(FieldValue::Number(52.5))
/// );
/// assert_eq!(FieldValue::coerce("plz", &json!(null)), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Textual value.
    Text(String),
    /// Numeric coordinate.
    Number(f64),
}

impl FieldValue {
    /// Coerce a raw record value for `field`.
    ///
    /// Returns `None` for `null`, arrays and objects, which never take part in
    /// a query.
    #[must_use]
    pub fn coerce(field: &str, raw: &Value) -> Option<Self> {
        let text = match raw {
            Value::String(text) => text.clone(),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => return None,
        };

        if is_coordinate_field(field) {
            if let Some(number) = raw.as_f64() {
                return Some(Self::Number(number));
            }
            if let Ok(number) = text.trim().parse::<f64>()
                && number.is_finite()
            {
                return Some(Self::Number(number));
            }
        }

        Some(Self::Text(text))
    }

    /// Borrow the textual form, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Number(_) => None,
        }
    }

    /// Whether the value carries no information (blank text).
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.as_text().is_some_and(|text| text.trim().is_empty())
    }

    /// Compare against a stored JSON value with loose typing.
    ///
    /// Text compares against the stored value's textual rendering; numbers
    /// compare numerically, accepting stored strings that parse as numbers.
    #[must_use]
    pub fn matches_stored(&self, stored: &Value) -> bool {
        match self {
            Self::Text(text) => stored_text(stored).is_some_and(|stored| stored == *text),
            Self::Number(number) => {
                let stored_number = match stored {
                    Value::Number(value) => value.as_f64(),
                    Value::String(value) => value.trim().parse::<f64>().ok(),
                    _ => None,
                };
                stored_number.is_some_and(|value| value == *number)
            }
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
        }
    }
}

/// Textual rendering of a stored scalar, if it has one.
pub(crate) fn stored_text(stored: &Value) -> Option<String> {
    match stored {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
