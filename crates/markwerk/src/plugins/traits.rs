//! Base plugin trait definition.
//!
//! Every converter implements [`Plugin`], which carries identity and lifecycle hooks.

use crate::Result;

/// Base trait shared by all converters.
///
/// `initialize` runs once per registration, `shutdown` once per removed registration.
/// Both default to no-ops in most implementations.
///
/// # Thread Safety
///
/// Plugins must be `Send + Sync`: a registry snapshot is shared across every thread that
/// dispatches conversions.
///
/// # Example
///
/// ```rust
/// use markwerk::plugins::Plugin;
/// use markwerk::Result;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct RtfConverter {
///     ready: AtomicBool,
/// }
///
/// impl Plugin for RtfConverter {
///     fn name(&self) -> &str {
///         "rtf-converter"
///     }
///
///     fn version(&self) -> String {
///         "0.1.0".to_string()
///     }
///
///     fn initialize(&self) -> Result<()> {
///         self.ready.store(true, Ordering::Release);
///         Ok(())
///     }
///
///     fn shutdown(&self) -> Result<()> {
///         self.ready.store(false, Ordering::Release);
///         Ok(())
///     }
/// }
/// ```
pub trait Plugin: Send + Sync {
    /// Unique, whitespace-free identifier, e.g. `"csv-converter"`.
    ///
    /// Used in attempt records and for `unregister`.
    fn name(&self) -> &str;

    /// Semantic version of the plugin.
    fn version(&self) -> String;

    /// Called when the plugin is added to a registry. An error aborts the registration.
    fn initialize(&self) -> Result<()>;

    /// Called when the plugin is removed from a registry.
    fn shutdown(&self) -> Result<()>;

    fn description(&self) -> &str {
        ""
    }

    fn author(&self) -> &str {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct TestPlugin {
        initialized: AtomicBool,
    }

    impl Plugin for TestPlugin {
        fn name(&self) -> &str {
            "test-plugin"
        }

        fn version(&self) -> String {
            "1.0.0".to_string()
        }

        fn initialize(&self) -> Result<()> {
            self.initialized.store(true, Ordering::Release);
            Ok(())
        }

        fn shutdown(&self) -> Result<()> {
            self.initialized.store(false, Ordering::Release);
            Ok(())
        }

        fn description(&self) -> &str {
            "A test plugin"
        }
    }

    #[test]
    fn test_plugin_metadata_defaults() {
        let plugin = TestPlugin {
            initialized: AtomicBool::new(false),
        };
        assert_eq!(plugin.name(), "test-plugin");
        assert_eq!(plugin.version(), "1.0.0");
        assert_eq!(plugin.description(), "A test plugin");
        assert_eq!(plugin.author(), "");
    }

    #[test]
    fn test_plugin_lifecycle() {
        let plugin = TestPlugin {
            initialized: AtomicBool::new(false),
        };

        plugin.initialize().unwrap();
        assert!(plugin.initialized.load(Ordering::Acquire));

        plugin.shutdown().unwrap();
        assert!(!plugin.initialized.load(Ordering::Acquire));
    }
}
