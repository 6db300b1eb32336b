//! Plain text and Markdown converter.

use crate::Result;
use crate::core::dispatch::ConversionContext;
use crate::core::stream::{ByteSource, decode_text, read_all};
use crate::plugins::{Converter, PRIORITY_GENERIC_FORMAT, Plugin};
use crate::types::{ConversionResult, StreamDescriptor};

use super::descriptor_matches;

const ACCEPTED_EXTENSIONS: &[&str] = &[".txt", ".text", ".md", ".markdown", ".json", ".jsonl"];
const ACCEPTED_MIME_PREFIXES: &[&str] = &["text/", "application/json", "application/markdown"];

/// Plain text converter.
///
/// Passes text through unchanged after decoding it. Accepts anything with a known charset,
/// which makes it the catch-all for textual content, so it registers at the generic tier.
pub struct PlainTextConverter;

impl PlainTextConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlainTextConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for PlainTextConverter {
    fn name(&self) -> &str {
        "plain-text-converter"
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
        "Passes plain text and Markdown through after charset decoding"
    }

    fn author(&self) -> &str {
        "Markwerk Team"
    }
}

impl Converter for PlainTextConverter {
    fn accepts(&self, _source: &mut dyn ByteSource, descriptor: &StreamDescriptor, _ctx: &ConversionContext<'_>) -> bool {
        descriptor.charset().is_some() || descriptor_matches(descriptor, ACCEPTED_EXTENSIONS, ACCEPTED_MIME_PREFIXES)
    }

    fn convert(
        &self,
        source: &mut dyn ByteSource,
        descriptor: &StreamDescriptor,
        _ctx: &ConversionContext<'_>,
    ) -> Result<ConversionResult> {
        let bytes = read_all(source)?;
        let text = decode_text(&bytes, descriptor.charset())?;

        let line_count = text.lines().count();
        let word_count = text.split_whitespace().count();

        Ok(ConversionResult::new(text)
            .with_metadata("line_count", line_count)
            .with_metadata("word_count", word_count))
    }

    fn default_priority(&self) -> f64 {
        PRIORITY_GENERIC_FORMAT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConversionConfig;
    use crate::core::dispatch::Dispatcher;
    use crate::plugins::ConverterRegistry;
    use std::sync::Arc;

    fn dispatcher() -> Dispatcher {
        let mut registry = ConverterRegistry::new();
        registry.register_default(Arc::new(PlainTextConverter::new())).unwrap();
        Dispatcher::from_registry(registry, ConversionConfig::default())
    }

    #[test]
    fn test_plain_text_passthrough() {
        let hints = StreamDescriptor::new().with_extension(".txt");
        let result = dispatcher().convert_bytes(b"hello\nworld", Some(&hints)).unwrap();

        assert_eq!(result.markdown, "hello\nworld");
        assert_eq!(result.title, None);
        assert_eq!(result.metadata["line_count"], 2);
        assert_eq!(result.metadata["word_count"], 2);
    }

    #[test]
    fn test_declared_charset_is_used() {
        let hints = StreamDescriptor::new()
            .with_mime_type("text/plain")
            .with_charset("iso-8859-1");
        let result = dispatcher().convert_bytes(b"caf\xe9", Some(&hints)).unwrap();
        assert_eq!(result.markdown, "café");
    }

    #[test]
    fn test_rejects_binary_without_hints() {
        let err = dispatcher()
            .convert_bytes(&[0x00, 0xFF, 0xFE, 0x00, 0x01], None)
            .unwrap_err();
        assert!(matches!(err, crate::MarkwerkError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_priority_tier() {
        assert_eq!(PlainTextConverter::new().default_priority(), PRIORITY_GENERIC_FORMAT);
    }
}
