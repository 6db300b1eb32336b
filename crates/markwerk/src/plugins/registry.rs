//! Converter registration and ordering.
//!
//! [`ConverterRegistry`] keeps converters sorted by ascending priority. Entries with equal
//! priority stay in registration order, so the converter registered first is tried first.
//! A process-wide registry is available through [`get_converter_registry`].

use crate::plugins::Converter;
use crate::{MarkwerkError, Result};
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Validate a plugin name before registration.
///
/// Names must be non-empty and free of whitespace.
pub(crate) fn validate_plugin_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MarkwerkError::validation("Plugin name cannot be empty"));
    }

    if name.contains(char::is_whitespace) {
        return Err(MarkwerkError::validation(format!(
            "Plugin name '{}' cannot contain whitespace",
            name
        )));
    }

    Ok(())
}

/// One registered converter together with its priority.
#[derive(Clone)]
pub struct ConverterRegistration {
    pub converter: Arc<dyn Converter>,
    pub priority: f64,
}

impl ConverterRegistration {
    pub fn name(&self) -> &str {
        self.converter.name()
    }
}

impl fmt::Debug for ConverterRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistration")
            .field("converter", &self.converter.name())
            .field("priority", &self.priority)
            .finish()
    }
}

/// Priority-ordered collection of converters.
///
/// # Thread Safety
///
/// The registry itself is a plain value. Shared use goes through
/// `Arc<RwLock<ConverterRegistry>>`; the dispatcher only holds the read lock long enough to
/// clone the entry list.
///
/// # Example
///
/// ```rust
/// use markwerk::plugins::ConverterRegistry;
///
/// let registry = ConverterRegistry::with_defaults().unwrap();
/// assert!(registry.list().contains(&"plain-text-converter".to_string()));
/// ```
#[derive(Default)]
pub struct ConverterRegistry {
    entries: Vec<ConverterRegistration>,
}

impl ConverterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Create a registry seeded with the built-in converters.
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        crate::converters::register_default_converters(&mut registry)?;
        Ok(registry)
    }

    /// Register a converter at `priority`.
    ///
    /// The entry goes after every existing entry with a priority less than or equal to
    /// `priority`. Registering the same instance twice creates two entries.
    ///
    /// # Errors
    ///
    /// - `Validation` if the name is invalid or `priority` is NaN
    /// - whatever the converter's `initialize()` returns
    pub fn register(&mut self, converter: Arc<dyn Converter>, priority: f64) -> Result<()> {
        validate_plugin_name(converter.name())?;
        validate_priority(converter.name(), priority)?;

        converter.initialize()?;
        self.insert(converter, priority);
        Ok(())
    }

    /// Register a converter at its [`Converter::default_priority`].
    pub fn register_default(&mut self, converter: Arc<dyn Converter>) -> Result<()> {
        let priority = converter.default_priority();
        self.register(converter, priority)
    }

    /// Register several converters, all or nothing.
    ///
    /// Every converter is validated and initialized before any is inserted. If one fails,
    /// the ones already initialized are shut down again and the registry is unchanged.
    pub fn register_all(&mut self, converters: Vec<(Arc<dyn Converter>, f64)>) -> Result<()> {
        for (converter, priority) in &converters {
            validate_plugin_name(converter.name())?;
            validate_priority(converter.name(), *priority)?;
        }

        for (idx, (converter, _)) in converters.iter().enumerate() {
            if let Err(e) = converter.initialize() {
                for (initialized, _) in &converters[..idx] {
                    if let Err(shutdown_err) = initialized.shutdown() {
                        tracing::warn!(
                            "Failed to shut down converter '{}' after aborted registration: {}",
                            initialized.name(),
                            shutdown_err
                        );
                    }
                }
                return Err(e);
            }
        }

        for (converter, priority) in converters {
            self.insert(converter, priority);
        }
        Ok(())
    }

    fn insert(&mut self, converter: Arc<dyn Converter>, priority: f64) {
        let position = self.entries.partition_point(|entry| entry.priority <= priority);
        tracing::debug!(
            "Registered converter '{}' at priority {} (position {})",
            converter.name(),
            priority,
            position
        );
        self.entries.insert(position, ConverterRegistration { converter, priority });
    }

    /// Remove every entry named `name`, calling `shutdown()` on each removed entry.
    ///
    /// All matching entries are removed even if a `shutdown()` fails; the first failure is
    /// returned afterwards.
    pub fn unregister(&mut self, name: &str) -> Result<()> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| entry.name() == name);
        self.entries = kept;
        shutdown_entries(removed)
    }

    /// Remove all entries, calling `shutdown()` on each.
    pub fn unregister_all(&mut self) -> Result<()> {
        let removed = std::mem::take(&mut self.entries);
        shutdown_entries(removed)
    }

    /// Entries in dispatch order (ascending priority, then registration order).
    pub fn list_by_priority(&self) -> Vec<ConverterRegistration> {
        self.entries.clone()
    }

    /// Converter names in dispatch order.
    pub fn list(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_priority(name: &str, priority: f64) -> Result<()> {
    if priority.is_nan() {
        return Err(MarkwerkError::validation(format!(
            "Converter '{}' cannot be registered with a NaN priority",
            name
        )));
    }
    Ok(())
}

fn shutdown_entries(entries: Vec<ConverterRegistration>) -> Result<()> {
    let mut first_error = None;
    for entry in entries {
        if let Err(e) = entry.converter.shutdown() {
            tracing::warn!("Converter '{}' failed to shut down: {}", entry.name(), e);
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Global converter registry.
///
/// Empty until [`crate::converters::ensure_initialized`] seeds it with the built-in
/// converters; the global conversion functions do that on first use.
pub static CONVERTER_REGISTRY: Lazy<Arc<RwLock<ConverterRegistry>>> =
    Lazy::new(|| Arc::new(RwLock::new(ConverterRegistry::new())));

/// Get the global converter registry.
pub fn get_converter_registry() -> Arc<RwLock<ConverterRegistry>> {
    CONVERTER_REGISTRY.clone()
}
