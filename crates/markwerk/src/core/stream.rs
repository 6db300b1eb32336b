//! Seekable byte sources and text decoding.
//!
//! Dispatch needs to rewind a source before every `accepts` and `convert` call, so every
//! input is turned into a [`ByteSource`] (`Read + Seek`) first. Non-seekable readers are
//! buffered into memory with [`buffer_reader`].

use crate::{MarkwerkError, Result};
use std::io::{Cursor, Read, Seek, SeekFrom};

/// A readable, seekable stream of bytes.
///
/// Implemented for every `Read + Seek` type, so `File`, `Cursor<Vec<u8>>` and
/// `Cursor<&[u8]>` can all be handed to converters as `&mut dyn ByteSource`.
pub trait ByteSource: Read + Seek {}

impl<T: Read + Seek> ByteSource for T {}

/// Seeks back to offset zero.
pub fn rewind(source: &mut dyn ByteSource) -> Result<()> {
    source.seek(SeekFrom::Start(0))?;
    Ok(())
}

/// Reads up to `limit` bytes from the current position.
///
/// The caller is responsible for rewinding afterwards.
pub fn read_prefix(source: &mut dyn ByteSource, limit: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(limit.min(64 * 1024));
    source.take(limit as u64).read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Reads the remainder of the source.
pub fn read_all(source: &mut dyn ByteSource) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    source.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Reads up to `limit` bytes from the start of the source and rewinds again.
pub fn peek(source: &mut dyn ByteSource, limit: usize) -> Result<Vec<u8>> {
    rewind(source)?;
    let prefix = read_prefix(source, limit);
    rewind(source)?;
    prefix
}

/// Buffers a non-seekable reader into memory.
pub fn buffer_reader<R: Read>(mut reader: R) -> Result<Cursor<Vec<u8>>> {
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;
    Ok(Cursor::new(buffer))
}

/// Share of C0 control bytes (other than whitespace controls) above which a sample is binary.
const MAX_CONTROL_BYTE_RATIO: f64 = 0.1;

/// Heuristic binary check.
///
/// A sample is binary when it contains a NUL byte, or when more than
/// [`MAX_CONTROL_BYTE_RATIO`] of it is made of C0 control bytes and DEL. Tab, line feed,
/// carriage return and form feed count as text.
pub fn looks_binary(sample: &[u8]) -> bool {
    if sample.contains(&0) {
        return true;
    }
    if sample.is_empty() {
        return false;
    }

    let control_bytes = sample
        .iter()
        .filter(|&&b| (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c)) || b == 0x7f)
        .count();
    control_bytes as f64 / sample.len() as f64 > MAX_CONTROL_BYTE_RATIO
}

/// Best-effort charset guess for a text sample.
///
/// Returns `None` for binary-looking or empty samples. `complete` tells the detector
/// whether `sample` is the whole stream, which matters for multi-byte sequences cut off at
/// the end of a prefix.
pub fn detect_charset(sample: &[u8], complete: bool) -> Option<String> {
    if sample.is_empty() || looks_binary(sample) {
        return None;
    }

    match std::str::from_utf8(sample) {
        Ok(_) => return Some("utf-8".to_string()),
        Err(e) if !complete && e.error_len().is_none() => return Some("utf-8".to_string()),
        Err(_) => {}
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(sample, complete);
    let encoding = detector.guess(None, true);
    Some(encoding.name().to_ascii_lowercase())
}

/// Decodes bytes to a string.
///
/// With a declared charset the bytes must be valid in that encoding. Without one, UTF-8 is
/// tried first and `chardetng` picks the encoding otherwise. A byte order mark overrides
/// the declared charset.
pub fn decode_text(bytes: &[u8], charset: Option<&str>) -> Result<String> {
    let Some(label) = charset else {
        if let Ok(text) = std::str::from_utf8(bytes) {
            return Ok(text.trim_start_matches('\u{feff}').to_string());
        }
        let mut detector = chardetng::EncodingDetector::new();
        detector.feed(bytes, true);
        let encoding = detector.guess(None, true);
        let (text, _, _) = encoding.decode(bytes);
        return Ok(text.into_owned());
    };

    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| MarkwerkError::validation(format!("Unknown charset: {}", label)))?;

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(MarkwerkError::parsing(format!(
            "Content is not valid {}",
            used.name()
        )));
    }
    Ok(text.into_owned())
}
