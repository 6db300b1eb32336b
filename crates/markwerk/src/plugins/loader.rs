//! Third-party plugin loading.
//!
//! A plugin is a value implementing [`ConverterPlugin`]. There is no discovery: the host
//! application collects the plugins it wants and hands them to [`load_plugins`].
//!
//! Loading a plugin is all or nothing. Converters a plugin registers are staged and only
//! added to the registry once `register_converters` returns `Ok`. A plugin with the wrong
//! interface version, a failing `register_converters`, or a converter that fails
//! `initialize` is skipped with a warning, and the remaining plugins still load.

use crate::core::config::ConversionConfig;
use crate::plugins::registry::get_converter_registry;
use crate::plugins::{Converter, ConverterRegistry, PRIORITY_GENERIC_FORMAT};
use crate::{MarkwerkError, Result};
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Plugin interface version understood by this release.
pub const PLUGIN_INTERFACE_VERSION: u32 = 1;

/// A bundle of converters supplied by a third party.
pub trait ConverterPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Must equal [`PLUGIN_INTERFACE_VERSION`] exactly for the plugin to load.
    fn interface_version(&self) -> u32;

    /// Register this plugin's converters through `registrar`.
    fn register_converters(&self, registrar: &mut PluginRegistrar, config: &ConversionConfig) -> Result<()>;
}

/// Collects the converters a plugin wants to register.
#[derive(Default)]
pub struct PluginRegistrar {
    staged: Vec<(Arc<dyn Converter>, f64)>,
}

impl PluginRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a converter at the generic tier.
    pub fn register(&mut self, converter: Arc<dyn Converter>) {
        self.register_with_priority(converter, PRIORITY_GENERIC_FORMAT);
    }

    /// Stage a converter at an explicit priority.
    pub fn register_with_priority(&mut self, converter: Arc<dyn Converter>, priority: f64) {
        self.staged.push((converter, priority));
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }
}

/// A plugin backed by a closure.
///
/// # Example
///
/// ```rust
/// use markwerk::plugins::{CallbackPlugin, ConverterRegistry, load_plugins};
/// use markwerk::ConversionConfig;
/// use std::sync::Arc;
///
/// let plugin = CallbackPlugin::new("noop-plugin", |_registrar, _config| Ok(()));
/// let mut registry = ConverterRegistry::new();
/// let report = load_plugins(&mut registry, &[Arc::new(plugin)], &ConversionConfig::default());
/// assert_eq!(report.loaded, vec!["noop-plugin".to_string()]);
/// ```
pub struct CallbackPlugin<F> {
    name: String,
    interface_version: u32,
    callback: F,
}

impl<F> CallbackPlugin<F>
where
    F: Fn(&mut PluginRegistrar, &ConversionConfig) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, callback: F) -> Self {
        Self {
            name: name.into(),
            interface_version: PLUGIN_INTERFACE_VERSION,
            callback,
        }
    }

    pub fn with_interface_version(mut self, version: u32) -> Self {
        self.interface_version = version;
        self
    }
}

impl<F> ConverterPlugin for CallbackPlugin<F>
where
    F: Fn(&mut PluginRegistrar, &ConversionConfig) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn interface_version(&self) -> u32 {
        self.interface_version
    }

    fn register_converters(&self, registrar: &mut PluginRegistrar, config: &ConversionConfig) -> Result<()> {
        (self.callback)(registrar, config)
    }
}

/// A plugin that was not loaded and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPlugin {
    pub name: String,
    pub reason: String,
}

/// Outcome of [`load_plugins`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PluginLoadReport {
    pub loaded: Vec<String>,
    pub skipped: Vec<SkippedPlugin>,
}

/// Load plugins into `registry`, in the order given.
///
/// Never fails as a whole; per-plugin failures end up in [`PluginLoadReport::skipped`].
pub fn load_plugins(
    registry: &mut ConverterRegistry,
    plugins: &[Arc<dyn ConverterPlugin>],
    config: &ConversionConfig,
) -> PluginLoadReport {
    let mut report = PluginLoadReport::default();

    for plugin in plugins {
        let name = plugin.name().to_string();
        match load_plugin(registry, plugin.as_ref(), config) {
            Ok(count) => {
                tracing::debug!("Loaded plugin '{}' ({} converter(s))", name, count);
                report.loaded.push(name);
            }
            Err(e) => {
                tracing::warn!("Skipping plugin '{}': {}", name, e);
                report.skipped.push(SkippedPlugin {
                    name,
                    reason: e.to_string(),
                });
            }
        }
    }

    report
}

/// Load plugins into the global converter registry.
pub fn load_plugins_globally(
    plugins: &[Arc<dyn ConverterPlugin>],
    config: &ConversionConfig,
) -> Result<PluginLoadReport> {
    crate::converters::ensure_initialized()?;

    let registry = get_converter_registry();
    let mut registry = registry
        .write()
        .map_err(|e| MarkwerkError::LockPoisoned(format!("Converter registry lock poisoned: {}", e)))?;

    Ok(load_plugins(&mut registry, plugins, config))
}

fn load_plugin(registry: &mut ConverterRegistry, plugin: &dyn ConverterPlugin, config: &ConversionConfig) -> Result<usize> {
    let version = plugin.interface_version();
    if version != PLUGIN_INTERFACE_VERSION {
        return Err(MarkwerkError::Plugin {
            message: format!(
                "interface version {} is not supported (expected {})",
                version, PLUGIN_INTERFACE_VERSION
            ),
            plugin_name: plugin.name().to_string(),
        });
    }

    let mut registrar = PluginRegistrar::new();
    catch_unwind(AssertUnwindSafe(|| plugin.register_converters(&mut registrar, config))).map_err(|_| {
        MarkwerkError::Plugin {
            message: "register_converters panicked".to_string(),
            plugin_name: plugin.name().to_string(),
        }
    })??;

    let count = registrar.len();
    registry.register_all(registrar.staged)?;
    Ok(count)
}
