use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::core::mime::{normalize_extension, normalize_mime_type};

/// Free-form metadata attached to a conversion result.
///
/// Ordered by key so serialized results are stable across runs.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Where the bytes of a stream came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum Origin {
    LocalPath(PathBuf),
    InMemory,
    Url(String),
}

/// Immutable record of what is known or guessed about a byte source.
///
/// Every field is optional. A descriptor never changes after construction: the `with_*`
/// builders consume `self` and return a new value, and [`StreamDescriptor::layered`]
/// combines two descriptors into a third.
///
/// Mime types are stored lowercase without parameters, extensions lowercase with a
/// leading dot, charsets lowercase.
///
/// # Example
///
/// ```rust
/// use markwerk::StreamDescriptor;
///
/// let hints = StreamDescriptor::new()
///     .with_mime_type("Text/HTML; charset=UTF-8")
///     .with_extension("HTM");
///
/// assert_eq!(hints.mime_type(), Some("text/html"));
/// assert_eq!(hints.extension(), Some(".htm"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    charset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin: Option<Origin>,
}

impl StreamDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last-resort candidate: no mime type, extension or charset.
    pub fn generic() -> Self {
        Self::default()
    }

    pub fn with_mime_type(mut self, mime_type: impl AsRef<str>) -> Self {
        self.mime_type = normalize_mime_type(mime_type.as_ref());
        self
    }

    pub fn with_extension(mut self, extension: impl AsRef<str>) -> Self {
        self.extension = normalize_extension(extension.as_ref());
        self
    }

    pub fn with_charset(mut self, charset: impl AsRef<str>) -> Self {
        let charset = charset.as_ref().trim().trim_matches('"').to_ascii_lowercase();
        self.charset = (!charset.is_empty()).then_some(charset);
        self
    }

    /// Sets the filename hint. Only the final path component is kept.
    pub fn with_filename(mut self, filename: impl AsRef<str>) -> Self {
        let name = filename
            .as_ref()
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();
        self.filename = (!name.is_empty()).then(|| name.to_string());
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Returns a new descriptor where every field set on `other` overrides `self`.
    pub fn layered(&self, other: &StreamDescriptor) -> StreamDescriptor {
        StreamDescriptor {
            mime_type: other.mime_type.clone().or_else(|| self.mime_type.clone()),
            extension: other.extension.clone().or_else(|| self.extension.clone()),
            charset: other.charset.clone().or_else(|| self.charset.clone()),
            filename: other.filename.clone().or_else(|| self.filename.clone()),
            origin: other.origin.clone().or_else(|| self.origin.clone()),
        }
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    /// True when the descriptor carries a mime type or an extension.
    pub fn has_format_hint(&self) -> bool {
        self.mime_type.is_some() || self.extension.is_some()
    }

    /// True when no mime type, extension or charset is set.
    pub fn is_generic(&self) -> bool {
        !self.has_format_hint() && self.charset.is_none()
    }

    /// Human-readable label for the stream, used in headings and messages.
    ///
    /// Prefers the URL, then the local path, then the filename.
    pub fn display_name(&self) -> Option<String> {
        match &self.origin {
            Some(Origin::Url(url)) => Some(url.clone()),
            Some(Origin::LocalPath(path)) => Some(path.display().to_string()),
            _ => self.filename.clone(),
        }
    }
}

impl fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(mime_type) = &self.mime_type {
            parts.push(format!("mime_type={}", mime_type));
        }
        if let Some(extension) = &self.extension {
            parts.push(format!("extension={}", extension));
        }
        if let Some(charset) = &self.charset {
            parts.push(format!("charset={}", charset));
        }
        if let Some(filename) = &self.filename {
            parts.push(format!("filename={}", filename));
        }

        if parts.is_empty() {
            write!(f, "<generic stream>")
        } else {
            write!(f, "[{}]", parts.join(", "))
        }
    }
}

/// Output of a successful conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub markdown: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl ConversionResult {
    pub fn new(markdown: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            title: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ConversionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.markdown)
    }
}
