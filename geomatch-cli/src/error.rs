//! Error types emitted by the geomatch CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use geomatch_core::{BatchError, LookupError};
use thiserror::Error;

/// Errors emitted by the geomatch CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A `key=value` option was malformed.
    #[error("invalid --{field} value {value:?}; expected name=value")]
    InvalidPair { field: &'static str, value: String },
    /// The requested operation requires a missing compile-time feature.
    #[error("{action} requires the `{feature}` feature to be enabled")]
    MissingFeature {
        feature: &'static str,
        action: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Opening an input file failed.
    #[error("failed to open {field} at {path:?}: {source}")]
    OpenInput {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The address records could not be decoded.
    #[error("failed to parse address records at {path:?}: {source}")]
    ParseRecords {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The property set file could not be decoded.
    #[error("failed to parse property set at {path:?}: {source}")]
    ParseProperties {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Opening the address database failed.
    #[cfg(feature = "store-sqlite")]
    #[error(transparent)]
    OpenStore(#[from] geomatch_core::SqliteAddressStoreError),
    /// Building the async runtime failed.
    #[error("failed to start the lookup runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Batch resolution failed.
    #[error(transparent)]
    Resolve(#[from] BatchError),
    /// A single-address lookup failed.
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// Serialising JSON output failed.
    #[error("failed to serialise records: {0}")]
    SerialiseRecords(#[source] serde_json::Error),
    /// Writing CSV output failed.
    #[error("failed to write CSV output: {0}")]
    WriteCsv(#[from] csv::Error),
    /// Writing output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
