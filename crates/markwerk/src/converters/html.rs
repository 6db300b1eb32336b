//! HTML to Markdown conversion.
//!
//! Uses `html-to-markdown-rs`. With [`HtmlConfig::extract_metadata`](crate::HtmlConfig)
//! enabled, the library prepends a YAML frontmatter block carrying `<title>` and `<meta>`
//! values; the block is split off here and its string fields become result metadata.
//!
//! Documents of 512 KiB or more are converted on a dedicated thread with a 16 MiB stack,
//! since deeply nested markup can overflow the default stack.

use crate::core::dispatch::ConversionContext;
use crate::core::stream::{ByteSource, decode_text, read_all};
use crate::plugins::{Converter, PRIORITY_GENERIC_FORMAT, Plugin};
use crate::types::{ConversionResult, Metadata, StreamDescriptor};
use crate::{MarkwerkError, Result};
use html_to_markdown_rs::{ConversionOptions, PreprocessingOptions, convert as convert_html};
use std::{any::Any, thread};

use super::descriptor_matches;

const LARGE_HTML_STACK_THRESHOLD_BYTES: usize = 512 * 1024;
const HTML_CONVERSION_STACK_SIZE_BYTES: usize = 16 * 1024 * 1024;

const ACCEPTED_EXTENSIONS: &[&str] = &[".html", ".htm", ".xhtml"];
const ACCEPTED_MIME_PREFIXES: &[&str] = &["text/html", "application/xhtml"];

/// HTML converter.
pub struct HtmlConverter;

impl HtmlConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HtmlConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for HtmlConverter {
    fn name(&self) -> &str {
        "html-converter"
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
        "Converts HTML documents to Markdown"
    }

    fn author(&self) -> &str {
        "Markwerk Team"
    }
}

impl Converter for HtmlConverter {
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
        let html = decode_text(&bytes, descriptor.charset())?;

        let markdown = convert_html_to_markdown(&html, ctx.config().html.extract_metadata)?;
        let (frontmatter, content) = split_frontmatter(&markdown);

        let mut metadata = Metadata::new();
        let mut title = None;
        if let Some(yaml) = frontmatter {
            match serde_yaml_ng::from_str::<serde_json::Value>(yaml) {
                Ok(serde_json::Value::Object(mapping)) => {
                    for (key, value) in mapping {
                        if let serde_json::Value::String(value) = value {
                            if key == "title" {
                                title = Some(value);
                            } else {
                                metadata.insert(key, serde_json::Value::String(value));
                            }
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("Ignoring unparseable HTML frontmatter: {}", e),
            }
        }

        let mut result = ConversionResult::new(content.trim_start()).with_title(title);
        result.metadata = metadata;
        Ok(result)
    }

    fn default_priority(&self) -> f64 {
        PRIORITY_GENERIC_FORMAT
    }
}

/// Convert an HTML fragment (a feed item body, say) to Markdown without metadata.
pub(crate) fn html_fragment_to_markdown(html: &str) -> Result<String> {
    convert_html_to_markdown(html, false).map(|markdown| markdown.trim().to_string())
}

fn conversion_options(extract_metadata: bool) -> ConversionOptions {
    ConversionOptions {
        extract_metadata,
        preprocessing: PreprocessingOptions {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn convert_html_to_markdown(html: &str, extract_metadata: bool) -> Result<String> {
    let options = conversion_options(extract_metadata);
    if html.len() >= LARGE_HTML_STACK_THRESHOLD_BYTES {
        let html = html.to_string();
        run_on_dedicated_stack(move || convert_html_with_options(&html, options))
    } else {
        convert_html_with_options(html, options)
    }
}

fn convert_html_with_options(html: &str, options: ConversionOptions) -> Result<String> {
    convert_html(html, Some(options))
        .map_err(|e| MarkwerkError::parsing(format!("Failed to convert HTML to Markdown: {}", e)))
}

fn run_on_dedicated_stack<T, F>(job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("markwerk-html-conversion".to_string())
        .stack_size(HTML_CONVERSION_STACK_SIZE_BYTES)
        .spawn(job)
        .map_err(|err| MarkwerkError::Other(format!("Failed to spawn HTML conversion thread: {}", err)))?;

    match handle.join() {
        Ok(result) => result,
        Err(panic) => Err(MarkwerkError::Other(format!(
            "HTML conversion panicked: {}",
            panic_reason(&panic)
        ))),
    }
}

fn panic_reason(panic: &Box<dyn Any + Send + 'static>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Splits a leading `---` delimited YAML block from the Markdown body.
///
/// Returns `(None, markdown)` when there is no complete block.
fn split_frontmatter(markdown: &str) -> (Option<&str>, &str) {
    let Some(after_opening) = markdown
        .strip_prefix("---\r\n")
        .or_else(|| markdown.strip_prefix("---\n"))
    else {
        return (None, markdown);
    };

    if let Some(content) = after_opening
        .strip_prefix("---\r\n")
        .or_else(|| after_opening.strip_prefix("---\n"))
    {
        return (None, content);
    }

    for delimiter in ["\n---\n", "\r\n---\r\n"] {
        if let Some(pos) = after_opening.find(delimiter) {
            return (Some(&after_opening[..pos]), &after_opening[pos + delimiter.len()..]);
        }
    }

    (None, markdown)
}
