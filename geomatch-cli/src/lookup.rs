//! Lookup command implementation for the geomatch CLI.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use geomatch_core::{LookupRequest, lookup};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    ARG_DATABASE, ARG_FIELDS, ARG_FILTER, ARG_FORMAT, ARG_FUZZY, ARG_LIMIT, ARG_PROPERTIES,
    CliError, ENV_LOOKUP_DATABASE, ENV_LOOKUP_FILTER,
    fs::require_existing,
    inputs::{load_properties, open_store, parse_pair},
    output::{OutputFormat, write_records},
};

/// CLI arguments for the `lookup` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Look up canonical addresses by field values. Every --filter \
                 must hold; with --fuzzy, street and district fields match \
                 as case-sensitive substrings. All matches are printed.",
    about = "Look up addresses by field values"
)]
#[ortho_config(prefix = "GEOMATCH")]
pub(crate) struct LookupArgs {
    /// Path to the SQLite address database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Canonical field filter, e.g. `plz=10997`.
    #[arg(long = ARG_FILTER, value_name = "field=value")]
    #[serde(default)]
    pub(crate) filter: Vec<String>,
    /// Match fuzzy properties by substring.
    #[arg(long = ARG_FUZZY)]
    #[serde(default)]
    pub(crate) fuzzy: bool,
    /// Maximum number of records; 0 means no limit.
    #[arg(long = ARG_LIMIT, value_name = "count")]
    #[serde(default)]
    pub(crate) limit: Option<usize>,
    /// Comma-separated canonical fields to return.
    #[arg(long = ARG_FIELDS, value_name = "list")]
    #[serde(default)]
    pub(crate) fields: Option<String>,
    /// Output encoding.
    #[arg(long = ARG_FORMAT, value_enum)]
    #[serde(default)]
    pub(crate) format: Option<OutputFormat>,
    /// JSON file with `exact` and `fuzzy` property lists.
    #[arg(long = ARG_PROPERTIES, value_name = "path")]
    #[serde(default)]
    pub(crate) properties: Option<Utf8PathBuf>,
}

impl LookupArgs {
    pub(crate) fn into_config(self) -> Result<LookupConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        LookupConfig::try_from(merged)
    }
}

/// Resolved `lookup` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LookupConfig {
    /// Path to the SQLite address database.
    pub(crate) database: Utf8PathBuf,
    /// Canonical field / value filters in option order.
    pub(crate) filters: Vec<(String, Value)>,
    /// Substring matching for fuzzy properties.
    pub(crate) fuzzy: bool,
    /// Result cap.
    pub(crate) limit: Option<usize>,
    /// Requested output fields, if any.
    pub(crate) fields: Option<String>,
    /// Output encoding.
    pub(crate) format: OutputFormat,
    /// Optional property set file.
    pub(crate) properties: Option<Utf8PathBuf>,
}

impl LookupConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.database, ARG_DATABASE)?;
        if let Some(properties) = &self.properties {
            require_existing(properties, ARG_PROPERTIES)?;
        }
        Ok(())
    }
}

impl TryFrom<LookupArgs> for LookupConfig {
    type Error = CliError;

    fn try_from(args: LookupArgs) -> Result<Self, Self::Error> {
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_LOOKUP_DATABASE,
        })?;
        if args.filter.is_empty() {
            return Err(CliError::MissingArgument {
                field: ARG_FILTER,
                env: ENV_LOOKUP_FILTER,
            });
        }
        let filters = args
            .filter
            .iter()
            .map(|pair| {
                parse_pair(pair, ARG_FILTER)
                    .map(|(field, value)| (field.to_owned(), Value::String(value.to_owned())))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            database,
            filters,
            fuzzy: args.fuzzy,
            limit: args.limit,
            fields: args.fields,
            format: args.format.unwrap_or_default(),
            properties: args.properties,
        })
    }
}

pub(super) fn run_lookup(args: LookupArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_lookup_with(args, &mut stdout)
}

pub(super) fn run_lookup_with(args: LookupArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    execute_lookup(&config, writer)
}

pub(super) fn execute_lookup(
    config: &LookupConfig,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let properties = load_properties(config.properties.as_deref())?;
    let store = open_store(&config.database)?;
    let request = LookupRequest {
        filters: config.filters.clone(),
        fuzzy: config.fuzzy,
        limit: config.limit,
        projection: properties.projection(config.fields.as_deref()),
    };
    let found = lookup(&request, &properties, &*store)?;
    info!("lookup returned {} record(s)", found.len());
    write_records(writer, config.format, &found)
}
