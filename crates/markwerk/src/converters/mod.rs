//! Built-in converters.
//!
//! | Converter | Tier | Handles |
//! |-----------|------|---------|
//! | [`CsvConverter`] | specific | `text/csv`, `.csv` |
//! | [`IpynbConverter`] | specific | `.ipynb`, notebook JSON |
//! | [`RssConverter`] | specific | `.rss`, `.atom`, feed XML |
//! | [`ImageConverter`] | specific | `image/*` |
//! | [`HtmlConverter`] | generic | `text/html`, `.html` |
//! | [`ZipConverter`] | generic | `application/zip`, `.zip` |
//! | [`PlainTextConverter`] | generic | `text/*`, anything with a charset |
//!
//! Within the generic tier, registration order decides: HTML and ZIP are registered ahead
//! of plain text so that plain text stays the last resort for textual content.

use crate::plugins::registry::get_converter_registry;
use crate::plugins::{Converter, ConverterRegistry};
use crate::types::StreamDescriptor;
use crate::{MarkwerkError, Result};
use once_cell::sync::Lazy;
use std::sync::Arc;

pub mod ipynb;
pub mod text;

#[cfg(feature = "tabular")]
pub mod csv;

#[cfg(feature = "html")]
pub mod html;

#[cfg(feature = "feeds")]
pub mod rss;

#[cfg(feature = "images")]
pub mod image;

#[cfg(feature = "archives")]
pub mod archive;

pub use ipynb::IpynbConverter;
pub use text::PlainTextConverter;

#[cfg(feature = "tabular")]
pub use csv::CsvConverter;

#[cfg(feature = "html")]
pub use html::HtmlConverter;

#[cfg(feature = "feeds")]
pub use rss::RssConverter;

#[cfg(feature = "images")]
pub use image::ImageConverter;

#[cfg(feature = "archives")]
pub use archive::ZipConverter;

/// True when the descriptor's extension is one of `extensions` or its mime type starts with
/// one of `mime_prefixes`.
pub(crate) fn descriptor_matches(descriptor: &StreamDescriptor, extensions: &[&str], mime_prefixes: &[&str]) -> bool {
    if let Some(ext) = descriptor.extension()
        && extensions.contains(&ext)
    {
        return true;
    }

    descriptor
        .mime_type()
        .is_some_and(|mime| mime_prefixes.iter().any(|prefix| mime.starts_with(prefix)))
}

static CONVERTERS_INITIALIZED: Lazy<Result<()>> = Lazy::new(|| {
    let registry = get_converter_registry();
    let mut registry = registry
        .write()
        .map_err(|e| MarkwerkError::LockPoisoned(format!("Converter registry lock poisoned: {}", e)))?;
    register_default_converters(&mut registry)
});

/// Ensure the built-in converters are in the global registry.
///
/// Registration happens once. If the registry has since been emptied (for example by
/// [`crate::plugins::clear_converters`]), the built-ins are registered again.
pub fn ensure_initialized() -> Result<()> {
    CONVERTERS_INITIALIZED
        .as_ref()
        .map(|_| ())
        .map_err(|e| MarkwerkError::Plugin {
            message: format!("Failed to register default converters: {}", e),
            plugin_name: "built-in-converters".to_string(),
        })?;

    let registry = get_converter_registry();
    let is_empty = registry
        .read()
        .map_err(|e| MarkwerkError::LockPoisoned(format!("Converter registry lock poisoned: {}", e)))?
        .is_empty();

    if is_empty {
        let mut registry = registry
            .write()
            .map_err(|e| MarkwerkError::LockPoisoned(format!("Converter registry lock poisoned: {}", e)))?;
        if registry.is_empty() {
            register_default_converters(&mut registry)?;
        }
    }

    Ok(())
}

/// Register every built-in converter enabled by crate features, each at its default tier.
pub fn register_default_converters(registry: &mut ConverterRegistry) -> Result<()> {
    let mut converters: Vec<Arc<dyn Converter>> = Vec::new();

    #[cfg(feature = "tabular")]
    converters.push(Arc::new(CsvConverter::new()));

    converters.push(Arc::new(IpynbConverter::new()));

    #[cfg(feature = "feeds")]
    converters.push(Arc::new(RssConverter::new()));

    #[cfg(feature = "images")]
    converters.push(Arc::new(ImageConverter::new()));

    #[cfg(feature = "html")]
    converters.push(Arc::new(HtmlConverter::new()));

    #[cfg(feature = "archives")]
    converters.push(Arc::new(ZipConverter::new()));

    converters.push(Arc::new(PlainTextConverter::new()));

    for converter in converters {
        registry.register_default(converter)?;
    }
    Ok(())
}
