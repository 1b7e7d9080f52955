//! Resolve command implementation for the geomatch CLI.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use geomatch_core::{BatchRequest, BatchResolver, Representation};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_DATABASE, ARG_FIELDS, ARG_FORMAT, ARG_MAP, ARG_PROPERTIES, ARG_RESOLVE_INPUT, CliError,
    ENV_RESOLVE_DATABASE, ENV_RESOLVE_INPUT, ENV_RESOLVE_MAP,
    fs::require_existing,
    inputs::{load_properties, load_records, open_store, parse_pair},
    output::{OutputFormat, write_records},
};

/// CLI arguments for the `resolve` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Resolve every record of a JSON array against the address \
                 database. Each --map option names a canonical field and the \
                 input column holding its value. Records are printed in input \
                 order with the requested fields filled in, or left empty when \
                 no single address matches.",
    about = "Resolve a batch of addresses"
)]
#[ortho_config(prefix = "GEOMATCH")]
pub(crate) struct ResolveArgs {
    /// Path to a JSON file containing an array of address records.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) input_path: Option<Utf8PathBuf>,
    /// Path to the SQLite address database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Canonical field to input column mapping, e.g. `plz=Postleitzahl`.
    #[arg(long = ARG_MAP, value_name = "field=column")]
    #[serde(default)]
    pub(crate) map: Vec<String>,
    /// Comma-separated canonical fields to add to each record.
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

impl ResolveArgs {
    pub(crate) fn into_config(self) -> Result<ResolveConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ResolveConfig::try_from(merged)
    }
}

/// Resolved `resolve` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolveConfig {
    /// Path to the JSON input records.
    pub(crate) input_path: Utf8PathBuf,
    /// Path to the SQLite address database.
    pub(crate) database: Utf8PathBuf,
    /// Canonical field to input column mapping.
    pub(crate) representation: Representation,
    /// Requested output fields, if any.
    pub(crate) fields: Option<String>,
    /// Output encoding.
    pub(crate) format: OutputFormat,
    /// Optional property set file.
    pub(crate) properties: Option<Utf8PathBuf>,
}

impl ResolveConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.input_path, ARG_RESOLVE_INPUT)?;
        require_existing(&self.database, ARG_DATABASE)?;
        if let Some(properties) = &self.properties {
            require_existing(properties, ARG_PROPERTIES)?;
        }
        Ok(())
    }
}

impl TryFrom<ResolveArgs> for ResolveConfig {
    type Error = CliError;

    fn try_from(args: ResolveArgs) -> Result<Self, Self::Error> {
        let input_path = args.input_path.ok_or(CliError::MissingArgument {
            field: ARG_RESOLVE_INPUT,
            env: ENV_RESOLVE_INPUT,
        })?;
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_RESOLVE_DATABASE,
        })?;
        if args.map.is_empty() {
            return Err(CliError::MissingArgument {
                field: ARG_MAP,
                env: ENV_RESOLVE_MAP,
            });
        }
        let mut representation = Representation::new();
        for pair in &args.map {
            let (field, column) = parse_pair(pair, ARG_MAP)?;
            representation.insert(field, column);
        }
        Ok(Self {
            input_path,
            database,
            representation,
            fields: args.fields,
            format: args.format.unwrap_or_default(),
            properties: args.properties,
        })
    }
}

pub(super) fn run_resolve(args: ResolveArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_resolve_with(args, &mut stdout)
}

pub(super) fn run_resolve_with(args: ResolveArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    execute_resolve(&config, writer)
}

pub(super) fn execute_resolve(
    config: &ResolveConfig,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let properties = load_properties(config.properties.as_deref())?;
    let records = load_records(&config.input_path)?;
    let store = open_store(&config.database)?;
    let projection = properties.projection(config.fields.as_deref());
    let resolver = BatchResolver::new(store, properties);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let outcome = runtime.block_on(resolver.resolve_batch(BatchRequest {
        records,
        representation: config.representation.clone(),
        projection,
    }))?;

    let summary = outcome.summary;
    info!(
        "resolved {} of {} record(s); {} unresolved: {} ambiguous, {} without match, \
         {} with invalid patterns",
        summary.matched,
        summary.total(),
        summary.unresolved(),
        summary.ambiguous,
        summary.no_match,
        summary.invalid_pattern
    );
    write_records(writer, config.format, &outcome.records)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ResolveConfig, CliError> {
    let merged = ResolveArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ResolveConfig::try_from(merged)
}
