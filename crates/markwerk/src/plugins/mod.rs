//! Plugin system for extending markwerk with new formats.
//!
//! # Plugin Types
//!
//! - [`Plugin`] - identity and lifecycle, implemented by every converter
//! - [`Converter`] - turns one family of formats into Markdown
//! - [`ConverterPlugin`] - a third-party bundle that registers converters
//! - [`Captioner`] - optional image description service handed to converters
//!
//! # Lifecycle Pattern
//!
//! Converters are stored as `Arc<dyn Converter>` and shared between the registry and every
//! in-flight conversion:
//!
//! ```rust
//! use markwerk::plugins::{ConverterRegistry, PRIORITY_SPECIFIC_FORMAT};
//! use markwerk::converters::CsvConverter;
//! use std::sync::Arc;
//!
//! let mut registry = ConverterRegistry::new();
//! registry.register(Arc::new(CsvConverter::new()), PRIORITY_SPECIFIC_FORMAT)?;
//! assert_eq!(registry.list(), vec!["csv-converter".to_string()]);
//! # Ok::<(), markwerk::MarkwerkError>(())
//! ```

pub mod converter;
pub mod loader;
pub mod registry;
mod traits;

pub use converter::{
    Captioner, Converter, PRIORITY_GENERIC_FORMAT, PRIORITY_SPECIFIC_FORMAT, PRIORITY_UNCLASSIFIED,
    clear_converters, list_converters, register_converter, register_converter_with_priority, unregister_converter,
};
pub use loader::{
    CallbackPlugin, ConverterPlugin, PLUGIN_INTERFACE_VERSION, PluginLoadReport, PluginRegistrar, SkippedPlugin,
    load_plugins, load_plugins_globally,
};
pub use registry::{ConverterRegistration, ConverterRegistry, get_converter_registry};
pub use traits::Plugin;
