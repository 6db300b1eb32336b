//! CSV to Markdown table conversion.
//!
//! The first record is the header row. Later rows are padded with empty cells or truncated
//! so every row has exactly as many cells as the header.

use crate::Result;
use crate::core::dispatch::ConversionContext;
use crate::core::stream::{ByteSource, decode_text, read_all};
use crate::plugins::{Converter, PRIORITY_SPECIFIC_FORMAT, Plugin};
use crate::types::{ConversionResult, StreamDescriptor};

use super::descriptor_matches;

const ACCEPTED_EXTENSIONS: &[&str] = &[".csv"];
const ACCEPTED_MIME_PREFIXES: &[&str] = &["text/csv", "application/csv"];

/// CSV converter.
pub struct CsvConverter;

impl CsvConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for CsvConverter {
    fn name(&self) -> &str {
        "csv-converter"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn description(&self) -> &str {
        "Converts comma-separated values to a Markdown table"
    }

    fn author(&self) -> &str {
        "Markwerk Team"
    }
}

impl Converter for CsvConverter {
    fn accepts(&self, _source: &mut dyn ByteSource, descriptor: &StreamDescriptor, _ctx: &ConversionContext<'_>) -> bool {
        descriptor_matches(descriptor, ACCEPTED_EXTENSIONS, ACCEPTED_MIME_PREFIXES)
    }

    fn convert(
        &self,
        source: &mut dyn ByteSource,
        descriptor: &StreamDescriptor,
        _ctx: &ConversionContext<'_>,
    ) -> Result<ConversionResult> {
        let bytes = read_all(source)?;
        let text = decode_text(&bytes, descriptor.charset())?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(escape_cell).collect());
        }

        let Some((header, body)) = rows.split_first() else {
            return Ok(ConversionResult::new(String::new())
                .with_metadata("rows", 0)
                .with_metadata("columns", 0));
        };

        let width = header.len();
        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(table_row(header));
        lines.push(table_row(&vec!["---".to_string(); width]));

        for row in body {
            let mut cells = row.clone();
            cells.resize(width, String::new());
            lines.push(table_row(&cells));
        }

        Ok(ConversionResult::new(lines.join("\n"))
            .with_metadata("rows", body.len())
            .with_metadata("columns", width))
    }

    fn default_priority(&self) -> f64 {
        PRIORITY_SPECIFIC_FORMAT
    }
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn table_row(cells: &[String]) -> String {
    format!("| {} |", cells.join(" | "))
}
