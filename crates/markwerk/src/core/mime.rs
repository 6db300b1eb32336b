//! Extension and MIME type tables.
//!
//! Lookups go through a static table first and fall back to `mime_guess`. The table is the
//! authority for formats where `mime_guess` disagrees with what converters expect (for
//! example `.ipynb`, `.md` and `.rss`).

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;

pub const HTML_MIME_TYPE: &str = "text/html";
pub const MARKDOWN_MIME_TYPE: &str = "text/markdown";
pub const PLAIN_TEXT_MIME_TYPE: &str = "text/plain";
pub const CSV_MIME_TYPE: &str = "text/csv";
pub const JSON_MIME_TYPE: &str = "application/json";
pub const XML_MIME_TYPE: &str = "application/xml";
pub const XML_TEXT_MIME_TYPE: &str = "text/xml";
pub const ZIP_MIME_TYPE: &str = "application/zip";
pub const PDF_MIME_TYPE: &str = "application/pdf";
pub const IPYNB_MIME_TYPE: &str = "application/x-ipynb+json";
pub const RSS_MIME_TYPE: &str = "application/rss+xml";
pub const ATOM_MIME_TYPE: &str = "application/atom+xml";
pub const DOCX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PPTX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const XLSX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XLS_MIME_TYPE: &str = "application/vnd.ms-excel";
pub const EPUB_MIME_TYPE: &str = "application/epub+zip";

/// Known formats as `(extension, mime type)` pairs.
///
/// When several extensions share a mime type, the first listed one is the preferred
/// extension for reverse lookups.
const FORMAT_TABLE: &[(&str, &str)] = &[
    ("txt", PLAIN_TEXT_MIME_TYPE),
    ("text", PLAIN_TEXT_MIME_TYPE),
    ("md", MARKDOWN_MIME_TYPE),
    ("markdown", MARKDOWN_MIME_TYPE),
    ("html", HTML_MIME_TYPE),
    ("htm", HTML_MIME_TYPE),
    ("xhtml", "application/xhtml+xml"),
    ("csv", CSV_MIME_TYPE),
    ("json", JSON_MIME_TYPE),
    ("jsonl", "application/jsonl"),
    ("xml", XML_MIME_TYPE),
    ("ipynb", IPYNB_MIME_TYPE),
    ("rss", RSS_MIME_TYPE),
    ("atom", ATOM_MIME_TYPE),
    ("pdf", PDF_MIME_TYPE),
    ("docx", DOCX_MIME_TYPE),
    ("pptx", PPTX_MIME_TYPE),
    ("xlsx", XLSX_MIME_TYPE),
    ("xls", XLS_MIME_TYPE),
    ("epub", EPUB_MIME_TYPE),
    ("zip", ZIP_MIME_TYPE),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("tiff", "image/tiff"),
    ("tif", "image/tiff"),
    ("webp", "image/webp"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/x-wav"),
    ("m4a", "audio/mp4"),
    ("mp4", "video/mp4"),
    ("flac", "audio/flac"),
    ("ogg", "audio/ogg"),
];

static EXT_TO_MIME: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for (ext, mime) in FORMAT_TABLE {
        m.entry(*ext).or_insert(*mime);
    }
    m
});

static MIME_TO_EXT: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for (ext, mime) in FORMAT_TABLE {
        m.entry(*mime).or_insert(*ext);
    }
    m.insert(XML_TEXT_MIME_TYPE, "xml");
    m.insert("application/csv", "csv");
    m.insert("application/markdown", "md");
    m.insert("application/x-zip-compressed", "zip");
    m
});

/// Lowercases a mime type and strips parameters such as `; charset=`.
///
/// Returns `None` for empty or malformed values (no `/`).
pub fn normalize_mime_type(mime_type: &str) -> Option<String> {
    let essence = mime_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    if essence.is_empty() || !essence.contains('/') {
        return None;
    }
    Some(essence)
}

/// Lowercases an extension and ensures a single leading dot.
pub fn normalize_extension(extension: &str) -> Option<String> {
    let trimmed = extension.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!(".{}", trimmed.to_ascii_lowercase()))
}

/// Extension of a filename or path, normalized. `None` when there is no extension.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(normalize_extension)
}

/// Mime type for an extension (with or without leading dot).
pub fn mime_for_extension(extension: &str) -> Option<String> {
    let key = normalize_extension(extension)?;
    let key = key.trim_start_matches('.');

    if let Some(mime_type) = EXT_TO_MIME.get(key) {
        return Some(mime_type.to_string());
    }

    mime_guess::from_ext(key)
        .first()
        .map(|mime| mime.essence_str().to_ascii_lowercase())
}

/// Preferred extension (with leading dot) for a mime type.
pub fn extension_for_mime(mime_type: &str) -> Option<String> {
    let mime_type = normalize_mime_type(mime_type)?;

    if let Some(ext) = MIME_TO_EXT.get(mime_type.as_str()) {
        return normalize_extension(ext);
    }

    mime_guess::get_mime_extensions_str(&mime_type)
        .and_then(|extensions| extensions.first())
        .and_then(|ext| normalize_extension(ext))
}

/// Best-effort mime type for a path based on its extension. Never touches the filesystem.
pub fn mime_for_path(path: impl AsRef<Path>) -> Option<String> {
    let ext = path.as_ref().extension()?.to_str()?;
    mime_for_extension(ext)
}

/// True for mime types whose payload is text.
pub fn is_text_mime(mime_type: &str) -> bool {
    mime_type.starts_with("text/")
        || mime_type == JSON_MIME_TYPE
        || mime_type == XML_MIME_TYPE
        || mime_type.ends_with("+xml")
        || mime_type.ends_with("+json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mime_type() {
        assert_eq!(
            normalize_mime_type("Text/HTML; charset=ISO-8859-1").as_deref(),
            Some("text/html")
        );
        assert_eq!(normalize_mime_type("  application/pdf ").as_deref(), Some("application/pdf"));
        assert_eq!(normalize_mime_type(""), None);
        assert_eq!(normalize_mime_type("garbage"), None);
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("PDF").as_deref(), Some(".pdf"));
        assert_eq!(normalize_extension(".Tar").as_deref(), Some(".tar"));
        assert_eq!(normalize_extension(".."), None);
        assert_eq!(normalize_extension(""), None);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("archive/Report.DOCX").as_deref(), Some(".docx"));
        assert_eq!(extension_of("Makefile"), None);
    }

    #[test]
    fn test_mime_for_extension_table() {
        assert_eq!(mime_for_extension(".pdf").as_deref(), Some(PDF_MIME_TYPE));
        assert_eq!(mime_for_extension("ipynb").as_deref(), Some(IPYNB_MIME_TYPE));
        assert_eq!(mime_for_extension(".JPG").as_deref(), Some("image/jpeg"));
        assert_eq!(mime_for_extension(".rss").as_deref(), Some(RSS_MIME_TYPE));
        assert_eq!(mime_for_extension(".md").as_deref(), Some(MARKDOWN_MIME_TYPE));
    }

    #[test]
    fn test_mime_for_extension_falls_back_to_mime_guess() {
        assert_eq!(mime_for_extension(".css").as_deref(), Some("text/css"));
    }

    #[test]
    fn test_mime_for_unknown_extension() {
        assert_eq!(mime_for_extension(".definitelynotaformat"), None);
    }

    #[test]
    fn test_extension_for_mime_prefers_first_listed() {
        assert_eq!(extension_for_mime("image/jpeg").as_deref(), Some(".jpg"));
        assert_eq!(extension_for_mime("text/html; charset=utf-8").as_deref(), Some(".html"));
        assert_eq!(extension_for_mime("text/xml").as_deref(), Some(".xml"));
        assert_eq!(extension_for_mime("text/plain").as_deref(), Some(".txt"));
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path("/data/table.csv").as_deref(), Some(CSV_MIME_TYPE));
        assert_eq!(mime_for_path("/data/README"), None);
    }

    #[test]
    fn test_is_text_mime() {
        assert!(is_text_mime("text/csv"));
        assert!(is_text_mime("application/json"));
        assert!(is_text_mime("application/rss+xml"));
        assert!(!is_text_mime("image/png"));
        assert!(!is_text_mime(ZIP_MIME_TYPE));
    }
}
