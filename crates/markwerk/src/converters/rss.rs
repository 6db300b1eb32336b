//! RSS and Atom feed converter.
//!
//! `.rss`/`.atom` files and `application/rss*`/`application/atom*` streams are accepted
//! outright. Generic XML is accepted only when it parses as a feed: an `<rss>` element, or
//! a `<feed>` element with at least one `<entry>`.
//!
//! Elements are matched by local name, so namespaced tags such as `content:encoded` are
//! found regardless of prefix.

use crate::core::dispatch::ConversionContext;
use crate::core::stream::{ByteSource, decode_text, read_all};
use crate::plugins::{Converter, PRIORITY_SPECIFIC_FORMAT, Plugin};
use crate::types::{ConversionResult, StreamDescriptor};
use crate::{MarkwerkError, Result};
use roxmltree::{Document, Node};

use super::descriptor_matches;
use super::html::html_fragment_to_markdown;

const FEED_EXTENSIONS: &[&str] = &[".rss", ".atom"];
const FEED_MIME_PREFIXES: &[&str] = &["application/rss", "application/atom"];
const XML_EXTENSIONS: &[&str] = &[".xml"];
const XML_MIME_PREFIXES: &[&str] = &["text/xml", "application/xml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedKind {
    Rss,
    Atom,
}

/// RSS 2.0 and Atom feed converter.
pub struct RssConverter;

impl RssConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RssConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for RssConverter {
    fn name(&self) -> &str {
        "rss-converter"
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
        "Converts RSS and Atom feeds to Markdown"
    }

    fn author(&self) -> &str {
        "Markwerk Team"
    }
}

impl Converter for RssConverter {
    fn accepts(&self, source: &mut dyn ByteSource, descriptor: &StreamDescriptor, _ctx: &ConversionContext<'_>) -> bool {
        if descriptor_matches(descriptor, FEED_EXTENSIONS, FEED_MIME_PREFIXES) {
            return true;
        }

        if !descriptor_matches(descriptor, XML_EXTENSIONS, XML_MIME_PREFIXES) {
            return false;
        }

        let xml = match read_all(source).and_then(|bytes| decode_text(&bytes, descriptor.charset())) {
            Ok(xml) => xml,
            Err(e) => {
                tracing::debug!("Could not read XML stream to look for a feed: {}", e);
                return false;
            }
        };

        match Document::parse(&xml) {
            Ok(doc) => feed_kind(&doc).is_some(),
            Err(e) => {
                tracing::debug!("XML stream is not well-formed: {}", e);
                false
            }
        }
    }

    fn convert(
        &self,
        source: &mut dyn ByteSource,
        descriptor: &StreamDescriptor,
        _ctx: &ConversionContext<'_>,
    ) -> Result<ConversionResult> {
        let bytes = read_all(source)?;
        let xml = decode_text(&bytes, descriptor.charset())?;
        let doc = Document::parse(&xml).map_err(|e| MarkwerkError::parsing_with_source("Failed to parse feed XML", e))?;

        match feed_kind(&doc) {
            Some(FeedKind::Rss) => convert_rss(&doc),
            Some(FeedKind::Atom) => convert_atom(&doc),
            None => Err(MarkwerkError::parsing("Document is neither an RSS nor an Atom feed")),
        }
    }

    fn default_priority(&self) -> f64 {
        PRIORITY_SPECIFIC_FORMAT
    }
}

fn feed_kind(doc: &Document<'_>) -> Option<FeedKind> {
    if find_descendant(doc.root(), "rss").is_some() {
        return Some(FeedKind::Rss);
    }

    find_descendant(doc.root(), "feed")
        .filter(|feed| find_descendant(*feed, "entry").is_some())
        .map(|_| FeedKind::Atom)
}

fn convert_rss(doc: &Document<'_>) -> Result<ConversionResult> {
    let channel = find_descendant(doc.root(), "rss")
        .and_then(|rss| find_descendant(rss, "channel"))
        .ok_or_else(|| MarkwerkError::parsing("No channel found in RSS feed"))?;

    let title = child_text(channel, "title");
    let mut markdown = String::new();
    if let Some(title) = &title {
        markdown.push_str(&format!("# {}\n", title));
    }
    if let Some(description) = child_text(channel, "description") {
        markdown.push_str(&format!("{}\n", description));
    }

    let items: Vec<Node<'_, '_>> = descendants_named(channel, "item").collect();
    for item in &items {
        if let Some(item_title) = child_text(*item, "title") {
            markdown.push_str(&format!("\n## {}\n", item_title));
        }
        if let Some(published) = child_text(*item, "pubDate") {
            markdown.push_str(&format!("Published on: {}\n", published));
        }
        if let Some(description) = child_text(*item, "description") {
            push_content(&mut markdown, &description);
        }
        if let Some(content) = child_text(*item, "encoded") {
            push_content(&mut markdown, &content);
        }
    }

    Ok(ConversionResult::new(markdown)
        .with_title(title)
        .with_metadata("feed_type", "rss")
        .with_metadata("items", items.len()))
}

fn convert_atom(doc: &Document<'_>) -> Result<ConversionResult> {
    let feed = find_descendant(doc.root(), "feed")
        .ok_or_else(|| MarkwerkError::parsing("No feed element found in Atom document"))?;

    let title = child_text(feed, "title");
    let mut markdown = format!("# {}\n", title.as_deref().unwrap_or_default());
    if let Some(subtitle) = child_text(feed, "subtitle") {
        markdown.push_str(&format!("{}\n", subtitle));
    }

    let entries: Vec<Node<'_, '_>> = descendants_named(feed, "entry").collect();
    for entry in &entries {
        if let Some(entry_title) = child_text(*entry, "title") {
            markdown.push_str(&format!("\n## {}\n", entry_title));
        }
        if let Some(updated) = child_text(*entry, "updated") {
            markdown.push_str(&format!("Updated on: {}\n", updated));
        }
        if let Some(summary) = child_text(*entry, "summary") {
            push_content(&mut markdown, &summary);
        }
        if let Some(content) = child_text(*entry, "content") {
            push_content(&mut markdown, &content);
        }
    }

    Ok(ConversionResult::new(markdown)
        .with_title(title)
        .with_metadata("feed_type", "atom")
        .with_metadata("entries", entries.len()))
}

/// Feed bodies are frequently HTML; fall back to the raw text when conversion fails.
fn push_content(markdown: &mut String, content: &str) {
    match html_fragment_to_markdown(content) {
        Ok(converted) => markdown.push_str(&converted),
        Err(e) => {
            tracing::debug!("Feed content is not convertible HTML, keeping raw text: {}", e);
            markdown.push_str(content);
        }
    }
    markdown.push('\n');
}

fn descendants_named<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants()
        .skip(1)
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn find_descendant<'a, 'input: 'a>(node: Node<'a, 'input>, name: &'static str) -> Option<Node<'a, 'input>> {
    if node.is_element() && node.tag_name().name() == name {
        return Some(node);
    }
    descendants_named(node, name).next()
}

/// Text of the first descendant element called `name`, trimmed. `None` when missing or empty.
fn child_text(node: Node<'_, '_>, name: &'static str) -> Option<String> {
    descendants_named(node, name)
        .next()
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConversionConfig;
    use crate::core::dispatch::Dispatcher;
    use crate::plugins::ConverterRegistry;
    use std::sync::Arc;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Release Notes</title>
    <description>Updates from the build team</description>
    <item>
      <title>Version 2.1</title>
      <pubDate>Tue, 02 Sep 2025 10:00:00 GMT</pubDate>
      <description><![CDATA[<p>Faster <strong>startup</strong></p>]]></description>
    </item>
    <item>
      <title>Version 2.0</title>
      <content:encoded><![CDATA[<p>New plugin API</p>]]></content:encoded>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Field Notes</title>
  <subtitle>Weekly observations</subtitle>
  <entry>
    <title>Week 12</title>
    <updated>2025-03-21T09:00:00Z</updated>
    <summary>Rain all week.</summary>
  </entry>
</feed>"#;

    fn dispatcher() -> Dispatcher {
        let mut registry = ConverterRegistry::new();
        registry.register_default(Arc::new(RssConverter::new())).unwrap();
        Dispatcher::from_registry(registry, ConversionConfig::default())
    }

    #[test]
    fn test_rss_feed() {
        let hints = StreamDescriptor::new().with_extension(".rss");
        let result = dispatcher().convert_bytes(RSS.as_bytes(), Some(&hints)).unwrap();

        assert_eq!(result.title.as_deref(), Some("Release Notes"));
        assert!(result.markdown.starts_with("# Release Notes\nUpdates from the build team\n"));
        assert!(result.markdown.contains("\n## Version 2.1\nPublished on: Tue, 02 Sep 2025 10:00:00 GMT\n"));
        assert!(result.markdown.contains("Faster **startup**"));
        assert!(result.markdown.contains("## Version 2.0\nNew plugin API"));
        assert_eq!(result.metadata["items"], 2);
    }

    #[test]
    fn test_atom_feed() {
        let hints = StreamDescriptor::new().with_mime_type("application/atom+xml");
        let result = dispatcher().convert_bytes(ATOM.as_bytes(), Some(&hints)).unwrap();

        assert_eq!(result.title.as_deref(), Some("Field Notes"));
        assert!(result.markdown.starts_with("# Field Notes\nWeekly observations\n"));
        assert!(result.markdown.contains("## Week 12\nUpdated on: 2025-03-21T09:00:00Z\nRain all week."));
        assert_eq!(result.metadata["feed_type"], "atom");
    }

    #[test]
    fn test_generic_xml_feed_is_sniffed() {
        let hints = StreamDescriptor::new().with_extension(".xml");
        let result = dispatcher().convert_bytes(RSS.as_bytes(), Some(&hints)).unwrap();
        assert_eq!(result.title.as_deref(), Some("Release Notes"));
    }

    #[test]
    fn test_generic_xml_without_feed_is_rejected() {
        let hints = StreamDescriptor::new().with_extension(".xml");
        let err = dispatcher()
            .convert_bytes(b"<catalog><book>Dune</book></catalog>", Some(&hints))
            .unwrap_err();
        assert!(matches!(err, MarkwerkError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_feed_without_entries_is_not_atom() {
        let doc = Document::parse("<feed><title>Empty</title></feed>").unwrap();
        assert_eq!(feed_kind(&doc), None);
    }
}
