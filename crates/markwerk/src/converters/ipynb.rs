//! Jupyter notebook converter for .ipynb files.
//!
//! Markdown cells are copied verbatim, code cells become fenced blocks tagged with the
//! notebook language, raw cells become untagged fenced blocks. Cell outputs are dropped.

use crate::core::dispatch::ConversionContext;
use crate::core::mime::{IPYNB_MIME_TYPE, JSON_MIME_TYPE};
use crate::core::stream::{ByteSource, read_all};
use crate::plugins::{Converter, PRIORITY_SPECIFIC_FORMAT, Plugin};
use crate::types::{ConversionResult, StreamDescriptor};
use crate::{MarkwerkError, Result};
use serde_json::Value;

use super::descriptor_matches;

const DEFAULT_LANGUAGE: &str = "python";

/// Jupyter notebook converter.
///
/// Plain `application/json` is accepted too, but only when the content carries both
/// `nbformat` and `nbformat_minor`; this means `accepts` reads the stream.
pub struct IpynbConverter;

impl IpynbConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IpynbConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for IpynbConverter {
    fn name(&self) -> &str {
        "ipynb-converter"
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
        "Converts Jupyter notebooks (.ipynb files) to Markdown"
    }

    fn author(&self) -> &str {
        "Markwerk Team"
    }
}

impl Converter for IpynbConverter {
    fn accepts(&self, source: &mut dyn ByteSource, descriptor: &StreamDescriptor, _ctx: &ConversionContext<'_>) -> bool {
        if descriptor_matches(descriptor, &[".ipynb"], &[IPYNB_MIME_TYPE]) {
            return true;
        }

        if descriptor.mime_type() != Some(JSON_MIME_TYPE) {
            return false;
        }

        match read_all(source) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                text.contains("nbformat") && text.contains("nbformat_minor")
            }
            Err(e) => {
                tracing::debug!("Could not read JSON stream to look for a notebook: {}", e);
                false
            }
        }
    }

    fn convert(
        &self,
        source: &mut dyn ByteSource,
        _descriptor: &StreamDescriptor,
        _ctx: &ConversionContext<'_>,
    ) -> Result<ConversionResult> {
        let bytes = read_all(source)?;
        let notebook: Value = serde_json::from_slice(&bytes)
            .map_err(|e| MarkwerkError::parsing_with_source("Failed to parse notebook JSON", e))?;

        let cells = notebook
            .get("cells")
            .and_then(Value::as_array)
            .ok_or_else(|| MarkwerkError::parsing("Notebook has no 'cells' array"))?;

        let notebook_metadata = notebook.get("metadata");
        let language = notebook_language(notebook_metadata);

        let mut blocks = Vec::with_capacity(cells.len());
        let mut heading_title = None;

        for cell in cells {
            let text = cell.get("source").map(join_source).unwrap_or_default();
            match cell.get("cell_type").and_then(Value::as_str) {
                Some("markdown") => {
                    if heading_title.is_none() {
                        heading_title = first_heading(&text);
                    }
                    blocks.push(text);
                }
                Some("code") => blocks.push(format!("```{}\n{}\n```", language, text)),
                Some("raw") => blocks.push(format!("```\n{}\n```", text)),
                other => tracing::debug!("Skipping notebook cell of type {:?}", other),
            }
        }

        let title = notebook_metadata
            .and_then(|m| m.get("title"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(heading_title);

        let mut result = ConversionResult::new(blocks.join("\n\n"))
            .with_title(title)
            .with_metadata("cells", cells.len())
            .with_metadata("language", language.clone());
        if let Some(nbformat) = notebook.get("nbformat") {
            result = result.with_metadata("nbformat", nbformat.clone());
        }
        Ok(result)
    }

    fn default_priority(&self) -> f64 {
        PRIORITY_SPECIFIC_FORMAT
    }
}

/// Cell sources are either a string or an array of line strings.
fn join_source(source: &Value) -> String {
    match source {
        Value::String(s) => s.clone(),
        Value::Array(lines) => lines.iter().filter_map(Value::as_str).collect::<Vec<_>>().concat(),
        _ => String::new(),
    }
}

fn notebook_language(metadata: Option<&Value>) -> String {
    metadata
        .and_then(|m| {
            m.pointer("/language_info/name")
                .or_else(|| m.pointer("/kernelspec/language"))
        })
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(DEFAULT_LANGUAGE)
        .to_string()
}

fn first_heading(markdown: &str) -> Option<String> {
    markdown
        .lines()
        .find(|line| line.starts_with("# "))
        .map(|line| line.trim_start_matches(['#', ' ']).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConversionConfig;
    use crate::core::dispatch::Dispatcher;
    use crate::plugins::ConverterRegistry;
    use std::sync::Arc;

    const NOTEBOOK: &str = r##"{
        "cells": [
            {"cell_type": "markdown", "metadata": {}, "source": ["# Sales Analysis\n", "\n", "Quarterly numbers."]},
            {"cell_type": "code", "execution_count": 1, "metadata": {}, "outputs": [], "source": ["import pandas as pd\n", "df = pd.read_csv('q3.csv')"]},
            {"cell_type": "raw", "metadata": {}, "source": "raw text"}
        ],
        "metadata": {"language_info": {"name": "python"}},
        "nbformat": 4,
        "nbformat_minor": 5
    }"##;

    fn dispatcher() -> Dispatcher {
        let mut registry = ConverterRegistry::new();
        registry.register_default(Arc::new(IpynbConverter::new())).unwrap();
        Dispatcher::from_registry(registry, ConversionConfig::default())
    }

    #[test]
    fn test_notebook_cells() {
        let hints = StreamDescriptor::new().with_extension(".ipynb");
        let result = dispatcher().convert_bytes(NOTEBOOK.as_bytes(), Some(&hints)).unwrap();

        assert_eq!(
            result.markdown,
            "# Sales Analysis\n\nQuarterly numbers.\n\n\
             ```python\nimport pandas as pd\ndf = pd.read_csv('q3.csv')\n```\n\n\
             ```\nraw text\n```"
        );
        assert_eq!(result.title.as_deref(), Some("Sales Analysis"));
        assert_eq!(result.metadata["cells"], 3);
        assert_eq!(result.metadata["nbformat"], 4);
    }

    #[test]
    fn test_metadata_title_wins() {
        let notebook = r##"{"cells": [{"cell_type": "markdown", "source": "# Heading"}],
            "metadata": {"title": "Notebook Title", "kernelspec": {"language": "julia"}},
            "nbformat": 4, "nbformat_minor": 2}"##;
        let hints = StreamDescriptor::new().with_extension(".ipynb");
        let result = dispatcher().convert_bytes(notebook.as_bytes(), Some(&hints)).unwrap();

        assert_eq!(result.title.as_deref(), Some("Notebook Title"));
        assert_eq!(result.metadata["language"], "julia");
    }

    #[test]
    fn test_plain_json_notebook_is_sniffed() {
        let hints = StreamDescriptor::new().with_mime_type("application/json");
        let result = dispatcher().convert_bytes(NOTEBOOK.as_bytes(), Some(&hints)).unwrap();
        assert!(result.markdown.starts_with("# Sales Analysis"));
    }

    #[test]
    fn test_plain_json_without_nbformat_is_rejected() {
        let hints = StreamDescriptor::new().with_mime_type("application/json");
        let err = dispatcher()
            .convert_bytes(br#"{"cells": []}"#, Some(&hints))
            .unwrap_err();
        assert!(matches!(err, MarkwerkError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_invalid_notebook_json() {
        let hints = StreamDescriptor::new().with_extension(".ipynb");
        let err = dispatcher().convert_bytes(b"{not json", Some(&hints)).unwrap_err();
        assert_eq!(err.attempts()[0].error_kind, "parsing");
    }

    #[test]
    fn test_first_heading() {
        assert_eq!(first_heading("intro\n# Title here \nmore"), Some("Title here".to_string()));
        assert_eq!(first_heading("## Not level one"), None);
    }
}
