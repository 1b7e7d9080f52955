//! Command-line interface for the geomatch address resolution engine.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod fs;
mod inputs;
mod lookup;
mod output;
mod resolve;

pub use error::CliError;

use lookup::{LookupArgs, run_lookup};
use resolve::{ResolveArgs, run_resolve};

pub(crate) const ARG_RESOLVE_INPUT: &str = "input";
pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_MAP: &str = "map";
pub(crate) const ARG_FIELDS: &str = "fields";
pub(crate) const ARG_FORMAT: &str = "format";
pub(crate) const ARG_PROPERTIES: &str = "properties";
pub(crate) const ARG_FILTER: &str = "filter";
pub(crate) const ARG_FUZZY: &str = "fuzzy";
pub(crate) const ARG_LIMIT: &str = "limit";
pub(crate) const ENV_RESOLVE_INPUT: &str = "GEOMATCH_CMDS_RESOLVE_INPUT";
pub(crate) const ENV_RESOLVE_DATABASE: &str = "GEOMATCH_CMDS_RESOLVE_DATABASE";
pub(crate) const ENV_RESOLVE_MAP: &str = "GEOMATCH_CMDS_RESOLVE_MAP";
pub(crate) const ENV_LOOKUP_DATABASE: &str = "GEOMATCH_CMDS_LOOKUP_DATABASE";
pub(crate) const ENV_LOOKUP_FILTER: &str = "GEOMATCH_CMDS_LOOKUP_FILTER";

/// Run the geomatch CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments, configuration, inputs or the address
/// store are unusable, or when output cannot be written.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Resolve(args) => run_resolve(args),
        Command::Lookup(args) => run_lookup(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "geomatch",
    about = "Resolve free-form Berlin addresses against a canonical address index",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve every record of a JSON file and print the merged records.
    Resolve(ResolveArgs),
    /// Look up canonical addresses by field values.
    Lookup(LookupArgs),
}

#[cfg(test)]
mod tests;
