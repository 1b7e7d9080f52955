//! Rendering address records as JSON or CSV.

use std::io::Write;

use clap::ValueEnum;
use geomatch_core::AddressRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CliError;

/// Output encodings supported by the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum OutputFormat {
    /// Pretty-printed JSON array.
    #[default]
    Json,
    /// Comma-separated values with a header row.
    Csv,
}

/// Write `records` to `writer` in `format`.
pub(crate) fn write_records(
    writer: &mut dyn Write,
    format: OutputFormat,
    records: &[AddressRecord],
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => write_json(writer, records),
        OutputFormat::Csv => write_csv(writer, records),
    }
}

fn write_json(writer: &mut dyn Write, records: &[AddressRecord]) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(records).map_err(CliError::SerialiseRecords)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

fn write_csv(writer: &mut dyn Write, records: &[AddressRecord]) -> Result<(), CliError> {
    let headers = column_order(records);
    if headers.is_empty() {
        return Ok(());
    }
    let mut csv_writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    csv_writer.write_record(&headers)?;
    for record in records {
        csv_writer.write_record(headers.iter().map(|column| cell(record.get(*column))))?;
    }
    csv_writer.flush().map_err(CliError::WriteOutput)?;
    Ok(())
}

/// Column names in order of first appearance across all records.
fn column_order(records: &[AddressRecord]) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for column in records.iter().flat_map(|record| record.keys()) {
        if !columns.contains(&column.as_str()) {
            columns.push(column);
        }
    }
    columns
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
