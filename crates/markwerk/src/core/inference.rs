//! Candidate descriptor inference.
//!
//! Turns caller hints plus a look at the first bytes of a stream into an ordered list of
//! guesses. Dispatch tries converters against each guess in turn, so the order here
//! decides which interpretation of ambiguous content wins.
//!
//! Order of the candidate list:
//!
//! 1. the caller's hints, if they name a mime type or an extension
//! 2. hints refined by magic-byte sniffing
//! 3. hints refined by extension/mime table lookup
//! 4. the most specific guess so far refined by charset detection
//! 5. the generic descriptor
//!
//! Duplicates are removed, keeping the first occurrence.

use crate::core::config::ConversionConfig;
use crate::core::mime::{PLAIN_TEXT_MIME_TYPE, extension_for_mime, extension_of, mime_for_extension};
use crate::core::stream::{ByteSource, detect_charset, looks_binary, read_prefix, rewind};
use crate::types::StreamDescriptor;
use indexmap::IndexSet;

/// What magic-byte sniffing found in a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub mime_type: String,
    pub extension: String,
    /// True when the signature identifies a text format (HTML, XML, shell scripts).
    pub is_text: bool,
}

/// Identifies a format from its leading bytes.
pub fn sniff_signature(prefix: &[u8]) -> Option<Signature> {
    let kind = infer::get(prefix)?;
    Some(Signature {
        mime_type: kind.mime_type().to_string(),
        extension: kind.extension().to_string(),
        is_text: kind.matcher_type() == infer::MatcherType::Text,
    })
}

/// Builds the ordered candidate list for a stream.
///
/// Never fails. Read errors while sniffing are logged and treated as an empty prefix, and
/// the generic descriptor is always the last candidate. The source is left at offset zero
/// whenever it can be rewound.
pub fn infer(source: &mut dyn ByteSource, hints: &StreamDescriptor, config: &ConversionConfig) -> Vec<StreamDescriptor> {
    let prefix = match rewind(source).and_then(|_| read_prefix(source, config.sniff_prefix_bytes)) {
        Ok(prefix) => prefix,
        Err(e) => {
            tracing::debug!("Could not read stream prefix for sniffing: {}", e);
            Vec::new()
        }
    };
    if let Err(e) = rewind(source) {
        tracing::debug!("Could not rewind stream after sniffing: {}", e);
    }

    let complete = prefix.len() < config.sniff_prefix_bytes;
    candidates_from_prefix(&prefix, complete, hints)
}

/// Candidate list for an already-read prefix.
///
/// `complete` is true when `prefix` holds the entire stream.
pub fn candidates_from_prefix(prefix: &[u8], complete: bool, hints: &StreamDescriptor) -> Vec<StreamDescriptor> {
    let base = hints.clone();
    let mut candidates: IndexSet<StreamDescriptor> = IndexSet::new();

    if base.has_format_hint() {
        candidates.insert(base.clone());
    }

    let signature = sniff_signature(prefix);
    if let Some(signature) = &signature {
        let sniffed = StreamDescriptor::new()
            .with_mime_type(&signature.mime_type)
            .with_extension(&signature.extension);
        candidates.insert(base.layered(&sniffed));
    }

    let looked_up = refine_from_tables(&base);
    if let Some(looked_up) = &looked_up {
        candidates.insert(looked_up.clone());
    }

    let binary_signature = signature.as_ref().is_some_and(|s| !s.is_text);
    if !binary_signature && !looks_binary(prefix) {
        let charset = base
            .charset()
            .map(str::to_string)
            .or_else(|| detect_charset(prefix, complete));

        if let Some(charset) = charset {
            let most_specific = candidates
                .iter()
                .rev()
                .find(|c| c.mime_type().is_some())
                .cloned()
                .unwrap_or_else(|| base.clone());
            let textual = if most_specific.mime_type().is_some() {
                most_specific
            } else {
                most_specific.with_mime_type(PLAIN_TEXT_MIME_TYPE)
            };
            candidates.insert(textual.with_charset(charset));
        }
    }

    candidates.insert(StreamDescriptor::generic());

    let candidates: Vec<StreamDescriptor> = candidates.into_iter().collect();
    tracing::debug!(
        "Inferred {} candidate(s): {}",
        candidates.len(),
        candidates.iter().map(ToString::to_string).collect::<Vec<_>>().join(" | ")
    );
    candidates
}

/// Fills in whichever of mime type and extension the hints are missing.
///
/// Returns `None` when the tables add nothing.
fn refine_from_tables(base: &StreamDescriptor) -> Option<StreamDescriptor> {
    let mut refined = base.clone();

    if refined.extension().is_none()
        && let Some(ext) = base.filename().and_then(extension_of)
    {
        refined = refined.with_extension(ext);
    }

    let missing_mime = refined.extension().filter(|_| refined.mime_type().is_none()).and_then(mime_for_extension);
    let missing_ext = refined.mime_type().filter(|_| refined.extension().is_none()).and_then(extension_for_mime);

    if let Some(mime_type) = missing_mime {
        refined = refined.with_mime_type(mime_type);
    }
    if let Some(ext) = missing_ext {
        refined = refined.with_extension(ext);
    }

    (refined != *base).then_some(refined)
}
