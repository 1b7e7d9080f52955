//! Overlaying resolved fields onto the caller's records.

use thiserror::Error;

use crate::{AddressRecord, Resolution};

/// Errors returned by [`merge_batch`].
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum MergeError {
    /// Records and resolutions do not pair up.
    #[error("cannot merge {records} record(s) with {resolutions} resolution(s)")]
    LengthMismatch {
        /// Number of input records.
        records: usize,
        /// Number of resolutions.
        resolutions: usize,
    },
}

/// Merge one record: the original, then `template`, then the matched fields.
///
/// Later layers win on key collisions. Keys keep the position of their first
/// appearance, so caller columns stay in front.
#[must_use]
pub fn merge_record(
    record: &AddressRecord,
    resolution: &Resolution,
    template: &AddressRecord,
) -> AddressRecord {
    let mut merged = record.clone();
    for (field, value) in template {
        merged.insert(field.clone(), value.clone());
    }
    if let Resolution::Matched(fields) = resolution {
        for (field, value) in fields {
            merged.insert(field.clone(), value.clone());
        }
    }
    merged
}

/// Merge a batch position by position.
///
/// # Examples
/// ```
/// use geomatch_core::{AddressRecord, Resolution, UnresolvedReason, merge_batch};
/// use serde_json::json;
///
/// let record = json!({"Adresse": "Oranienstr. 1"}).as_object().cloned().unwrap_or_default();
/// let template = json!({"plz": ""}).as_object().cloned().unwrap_or_default();
/// let merged = merge_batch(
///     &[record],
///     &[Resolution::Unresolved(UnresolvedReason::Ambiguous)],
///     &template,
/// )?;
/// assert_eq!(merged[0].get("plz"), Some(&json!("")));
/// # Ok::<(), geomatch_core::MergeError>(())
/// ```
///
/// # Errors
/// Returns [`MergeError::LengthMismatch`] when the slices differ in length.
pub fn merge_batch(
    records: &[AddressRecord],
    resolutions: &[Resolution],
    template: &AddressRecord,
) -> Result<Vec<AddressRecord>, MergeError> {
    if records.len() != resolutions.len() {
        return Err(MergeError::LengthMismatch {
            records: records.len(),
            resolutions: resolutions.len(),
        });
    }
    Ok(records
        .iter()
        .zip(resolutions)
        .map(|(record, resolution)| merge_record(record, resolution, template))
        .collect())
}
