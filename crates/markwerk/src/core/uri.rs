//! URI handling for `file:` and `data:` URIs, plus hints for fetched HTTP content.
//!
//! No network I/O happens here. Remote content is fetched by the caller and handed over
//! as bytes together with hints from [`StreamDescriptor::from_http_response`].

use crate::core::mime::extension_of;
use crate::types::{Origin, StreamDescriptor};
use crate::{MarkwerkError, Result};
use base64::Engine;
use percent_encoding::percent_decode_str;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A decoded `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: Option<String>,
    /// Parameters such as `charset=utf-8`, keys lowercased.
    pub attributes: BTreeMap<String, String>,
    pub data: Vec<u8>,
}

impl DataUri {
    /// Hints describing the payload.
    pub fn descriptor(&self) -> StreamDescriptor {
        let mut descriptor = StreamDescriptor::new().with_origin(Origin::InMemory);
        if let Some(mime_type) = &self.mime_type {
            descriptor = descriptor.with_mime_type(mime_type);
        }
        if let Some(charset) = self.attributes.get("charset") {
            descriptor = descriptor.with_charset(charset);
        }
        descriptor
    }
}

/// Lowercased scheme of a URI-like string, if it has one.
///
/// Single-letter schemes are treated as Windows drive letters and ignored.
pub fn scheme_of(source: &str) -> Option<String> {
    let (scheme, _) = source.split_once(':')?;
    let valid = scheme.len() > 1
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then(|| scheme.to_ascii_lowercase())
}

/// Converts a `file:` URI into a local path.
///
/// Accepts `file:///abs/path`, `file://localhost/abs/path` and `file:/abs/path`. Remote
/// hosts are rejected.
pub fn file_uri_to_path(uri: &str) -> Result<PathBuf> {
    if scheme_of(uri).as_deref() != Some("file") {
        return Err(MarkwerkError::validation(format!("Not a file URI: {}", uri)));
    }
    let rest = &uri["file:".len()..];

    let path = match rest.strip_prefix("//") {
        Some(authority_and_path) => {
            let (host, path) = match authority_and_path.find('/') {
                Some(idx) => authority_and_path.split_at(idx),
                None => (authority_and_path, ""),
            };
            if !host.is_empty() && !host.eq_ignore_ascii_case("localhost") {
                return Err(MarkwerkError::validation(format!(
                    "Unsupported file URI host '{}': only local files can be converted",
                    host
                )));
            }
            path
        }
        None => rest,
    };

    let path = path.split(['?', '#']).next().unwrap_or_default();
    if path.is_empty() {
        return Err(MarkwerkError::validation(format!("File URI has no path: {}", uri)));
    }

    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map_err(|e| MarkwerkError::validation_with_source(format!("Invalid file URI: {}", uri), e))?;
    Ok(PathBuf::from(decoded.into_owned()))
}

/// Decodes a `data:` URI (RFC 2397).
pub fn parse_data_uri(uri: &str) -> Result<DataUri> {
    if scheme_of(uri).as_deref() != Some("data") {
        return Err(MarkwerkError::validation("Not a data URI"));
    }
    let rest = &uri["data:".len()..];
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| MarkwerkError::validation("Malformed data URI: missing ','"))?;

    let mut parts = header.split(';');
    let mime_type = parts
        .next()
        .map(str::trim)
        .filter(|m| m.contains('/'))
        .map(str::to_ascii_lowercase);

    let mut attributes = BTreeMap::new();
    let mut is_base64 = false;
    for part in parts {
        let part = part.trim();
        if part.eq_ignore_ascii_case("base64") {
            is_base64 = true;
        } else if let Some((key, value)) = part.split_once('=') {
            attributes.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let data = if is_base64 {
        let cleaned: String = percent_decode_str(payload)
            .decode_utf8_lossy()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        base64::engine::general_purpose::STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|e| MarkwerkError::validation_with_source("Invalid base64 payload in data URI", e))?
    } else {
        percent_decode_str(payload).collect()
    };

    Ok(DataUri {
        mime_type,
        attributes,
        data,
    })
}

impl StreamDescriptor {
    /// Hints for a response body the caller fetched over HTTP.
    ///
    /// Mime type and charset come from `Content-Type`. The filename comes from the
    /// `Content-Disposition` `filename=` parameter, falling back to the last segment of
    /// the URL path. The extension follows the filename.
    pub fn from_http_response(url: &str, content_type: Option<&str>, content_disposition: Option<&str>) -> Self {
        let mut descriptor = StreamDescriptor::new().with_origin(Origin::Url(url.to_string()));

        if let Some(content_type) = content_type {
            descriptor = descriptor.with_mime_type(content_type);
            if let Some(charset) = header_parameter(content_type, "charset") {
                descriptor = descriptor.with_charset(charset);
            }
        }

        let filename = content_disposition
            .and_then(|cd| header_parameter(cd, "filename"))
            .or_else(|| filename_from_url(url));

        if let Some(filename) = filename {
            if let Some(ext) = extension_of(&filename) {
                descriptor = descriptor.with_extension(ext);
            }
            descriptor = descriptor.with_filename(filename);
        }

        descriptor
    }
}

fn header_parameter(header: &str, name: &str) -> Option<String> {
    header.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case(name) {
            return None;
        }
        let value = value.trim().trim_matches('"').trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn filename_from_url(url: &str) -> Option<String> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = without_scheme.find('/').map(|idx| &without_scheme[idx..])?;
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let last = path.rsplit('/').next().filter(|segment| !segment.is_empty())?;
    Some(percent_decode_str(last).decode_utf8_lossy().into_owned())
}
