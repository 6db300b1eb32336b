//! ZIP archive converter.
//!
//! Every file entry is run through a nested dispatch with the same registry snapshot, so
//! anything the registry can convert at the top level can also be converted inside an
//! archive. Entries appear in archive order under `## File:` headings.

use crate::core::dispatch::ConversionContext;
use crate::core::mime::extension_of;
use crate::core::stream::{ByteSource, read_all};
use crate::plugins::{Converter, PRIORITY_GENERIC_FORMAT, Plugin};
use crate::types::{ConversionResult, StreamDescriptor};
use crate::{MarkwerkError, Result};
use std::io::{Cursor, Read};
use zip::ZipArchive;

use super::descriptor_matches;

const ACCEPTED_EXTENSIONS: &[&str] = &[".zip"];
const ACCEPTED_MIME_PREFIXES: &[&str] = &["application/zip", "application/x-zip-compressed"];

/// ZIP archive converter.
pub struct ZipConverter;

impl ZipConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ZipConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ZipConverter {
    fn name(&self) -> &str {
        "zip-converter"
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
        "Converts every entry of a ZIP archive with the registered converters"
    }

    fn author(&self) -> &str {
        "Markwerk Team"
    }
}

impl Converter for ZipConverter {
    fn accepts(&self, _source: &mut dyn ByteSource, descriptor: &StreamDescriptor, _ctx: &ConversionContext<'_>) -> bool {
        descriptor_matches(descriptor, ACCEPTED_EXTENSIONS, ACCEPTED_MIME_PREFIXES)
    }

    fn convert(
        &self,
        source: &mut dyn ByteSource,
        descriptor: &StreamDescriptor,
        ctx: &ConversionContext<'_>,
    ) -> Result<ConversionResult> {
        let bytes = read_all(source)?;
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice()))
            .map_err(|e| MarkwerkError::parsing_with_source("Failed to read ZIP archive", e))?;

        let archive_name = descriptor.display_name().unwrap_or_else(|| "archive".to_string());
        let mut markdown = format!("Content from the zip file `{}`:\n\n", archive_name);
        let include_failures = ctx.config().zip.include_failures;

        let mut converted = 0usize;
        let mut failed = 0usize;

        for index in 0..archive.len() {
            let name = archive
                .name_for_index(index)
                .map(str::to_string)
                .unwrap_or_else(|| format!("entry-{}", index));
            if name.ends_with('/') {
                continue;
            }

            let outcome = match read_entry(&mut archive, index) {
                Ok(Some(entry_bytes)) => ctx.convert_nested(&entry_bytes, &entry_hints(&name)),
                Ok(None) => continue,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(result) => {
                    converted += 1;
                    markdown.push_str(&format!("## File: {}\n\n{}\n\n", name, result.markdown));
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!("Could not convert archive entry '{}' in {}: {}", name, archive_name, e);
                    if include_failures {
                        markdown.push_str(&format!(
                            "## File: {}\n\n> Could not convert `{}`: {}\n\n",
                            name,
                            name,
                            single_line(&e.to_string())
                        ));
                    }
                }
            }
        }

        Ok(ConversionResult::new(markdown)
            .with_metadata("entries", converted)
            .with_metadata("failed_entries", failed))
    }

    fn default_priority(&self) -> f64 {
        PRIORITY_GENERIC_FORMAT
    }
}

/// Upper bound for pre-allocating an entry buffer; the declared size comes from the archive.
const MAX_ENTRY_PREALLOCATION: u64 = 64 * 1024;

/// Reads one file entry. Returns `None` for directories.
fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, index: usize) -> Result<Option<Vec<u8>>> {
    let mut entry = archive.by_index(index)?;
    if entry.is_dir() {
        return Ok(None);
    }
    let mut entry_bytes = Vec::with_capacity(entry_capacity(entry.size()));
    entry.read_to_end(&mut entry_bytes)?;
    Ok(Some(entry_bytes))
}

fn entry_capacity(declared_size: u64) -> usize {
    usize::try_from(declared_size.min(MAX_ENTRY_PREALLOCATION)).unwrap_or_default()
}

fn entry_hints(name: &str) -> StreamDescriptor {
    let hints = StreamDescriptor::new().with_filename(name);
    match extension_of(name) {
        Some(ext) => hints.with_extension(ext),
        None => hints,
    }
}

/// Error messages can span lines (aggregated attempts); keep the note inside one quote.
fn single_line(message: &str) -> String {
    message.lines().map(str::trim).filter(|l| !l.is_empty()).collect::<Vec<_>>().join(" ")
}
