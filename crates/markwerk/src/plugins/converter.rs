//! Converter plugin trait.
//!
//! A converter turns one family of formats into Markdown. The dispatcher asks each
//! registered converter, in priority order, whether it `accepts` a candidate descriptor
//! and calls `convert` on the first one that does.

use crate::core::dispatch::ConversionContext;
use crate::core::stream::ByteSource;
use crate::plugins::Plugin;
use crate::types::{ConversionResult, StreamDescriptor};
use crate::{MarkwerkError, Result};
use std::sync::Arc;

/// Tier for converters that handle one well-defined format (CSV, notebooks, images).
pub const PRIORITY_SPECIFIC_FORMAT: f64 = 0.0;

/// Tier for catch-all converters (plain text, HTML, archives). Also the default for
/// converters registered by plugins.
pub const PRIORITY_GENERIC_FORMAT: f64 = 10.0;

/// Default for converters that do not declare a tier.
pub const PRIORITY_UNCLASSIFIED: f64 = 100.0;

/// Trait for format converters.
///
/// # Rewind contract
///
/// The dispatcher seeks `source` back to offset zero before every call to `accepts` and
/// before every call to `convert`. A converter may read as much as it likes in `accepts`
/// (to check a root element, say) without affecting later attempts.
///
/// # Errors
///
/// Errors from `convert` never reach the caller directly. They are recorded as attempt
/// records and dispatch moves on; the caller only sees them in
/// [`MarkwerkError::ConversionFailed`] when nothing else succeeds.
///
/// # Example
///
/// ```rust
/// use markwerk::core::dispatch::ConversionContext;
/// use markwerk::core::stream::{ByteSource, read_all};
/// use markwerk::plugins::{Converter, Plugin, PRIORITY_SPECIFIC_FORMAT};
/// use markwerk::{ConversionResult, Result, StreamDescriptor};
///
/// struct ShoutConverter;
///
/// impl Plugin for ShoutConverter {
///     fn name(&self) -> &str { "shout-converter" }
///     fn version(&self) -> String { "1.0.0".to_string() }
///     fn initialize(&self) -> Result<()> { Ok(()) }
///     fn shutdown(&self) -> Result<()> { Ok(()) }
/// }
///
/// impl Converter for ShoutConverter {
///     fn accepts(&self, _: &mut dyn ByteSource, descriptor: &StreamDescriptor, _: &ConversionContext<'_>) -> bool {
///         descriptor.extension() == Some(".shout")
///     }
///
///     fn convert(
///         &self,
///         source: &mut dyn ByteSource,
///         _: &StreamDescriptor,
///         _: &ConversionContext<'_>,
///     ) -> Result<ConversionResult> {
///         let text = String::from_utf8_lossy(&read_all(source)?).to_uppercase();
///         Ok(ConversionResult::new(text))
///     }
///
///     fn default_priority(&self) -> f64 {
///         PRIORITY_SPECIFIC_FORMAT
///     }
/// }
/// ```
pub trait Converter: Plugin {
    /// Quick check whether this converter handles `descriptor`.
    ///
    /// Usually decided from the mime type and extension alone. Converters for formats
    /// that share a container (JSON notebooks, XML feeds) may inspect the content.
    fn accepts(&self, source: &mut dyn ByteSource, descriptor: &StreamDescriptor, ctx: &ConversionContext<'_>) -> bool;

    /// Converts the whole stream to Markdown.
    fn convert(
        &self,
        source: &mut dyn ByteSource,
        descriptor: &StreamDescriptor,
        ctx: &ConversionContext<'_>,
    ) -> Result<ConversionResult>;

    /// Priority used by [`ConverterRegistry::register_default`](crate::plugins::ConverterRegistry::register_default).
    ///
    /// Lower values are tried first.
    fn default_priority(&self) -> f64 {
        PRIORITY_UNCLASSIFIED
    }
}

/// Produces a textual description of an image.
///
/// The dispatcher holds at most one captioner together with a model identifier and hands
/// both to converters through [`ConversionContext::captioner`]. Nothing in the dispatch
/// engine calls it.
pub trait Captioner: Send + Sync {
    fn caption(&self, image: &[u8], mime_type: &str, model: &str, prompt: &str) -> Result<String>;
}

/// Register a converter with the global registry at its default priority.
///
/// The converter's `initialize()` is called before it is added.
pub fn register_converter(converter: Arc<dyn Converter>) -> Result<()> {
    let priority = converter.default_priority();
    register_converter_with_priority(converter, priority)
}

/// Register a converter with the global registry at an explicit priority.
pub fn register_converter_with_priority(converter: Arc<dyn Converter>, priority: f64) -> Result<()> {
    use crate::plugins::registry::get_converter_registry;

    let registry = get_converter_registry();
    let mut registry = registry
        .write()
        .map_err(|e| MarkwerkError::LockPoisoned(format!("Converter registry lock poisoned: {}", e)))?;

    registry.register(converter, priority)
}

/// Remove every global registration with this name, calling `shutdown()` on each.
///
/// Removing a name that is not registered is not an error.
pub fn unregister_converter(name: &str) -> Result<()> {
    use crate::plugins::registry::get_converter_registry;

    let registry = get_converter_registry();
    let mut registry = registry
        .write()
        .map_err(|e| MarkwerkError::LockPoisoned(format!("Converter registry lock poisoned: {}", e)))?;

    registry.unregister(name)
}

/// Names of all globally registered converters, in dispatch order.
pub fn list_converters() -> Result<Vec<String>> {
    use crate::plugins::registry::get_converter_registry;

    let registry = get_converter_registry();
    let registry = registry
        .read()
        .map_err(|e| MarkwerkError::LockPoisoned(format!("Converter registry lock poisoned: {}", e)))?;

    Ok(registry.list())
}

/// Remove all converters from the global registry.
///
/// The next global conversion re-registers the built-in converters.
pub fn clear_converters() -> Result<()> {
    use crate::plugins::registry::get_converter_registry;

    let registry = get_converter_registry();
    let mut registry = registry
        .write()
        .map_err(|e| MarkwerkError::LockPoisoned(format!("Converter registry lock poisoned: {}", e)))?;

    registry.unregister_all()
}
