//! Plugin loading and global registry integration tests.
//!
//! Tests touching the process-wide registry are `#[serial]` and restore the built-ins
//! when they are done.

use markwerk::plugins::{
    CallbackPlugin, ConverterPlugin, ConverterRegistry, PRIORITY_SPECIFIC_FORMAT, PluginRegistrar, clear_converters,
    list_converters, load_plugins, load_plugins_globally, register_converter_with_priority, unregister_converter,
};
use markwerk::{ConversionConfig, StreamDescriptor, convert_bytes};
use serial_test::serial;
use std::sync::Arc;

mod helpers;
use helpers::{Behavior, StubConverter};

fn shout_plugin() -> Arc<dyn ConverterPlugin> {
    Arc::new(CallbackPlugin::new(
        "shout-plugin",
        |registrar: &mut PluginRegistrar, _: &ConversionConfig| {
            registrar.register_with_priority(
                Arc::new(
                    StubConverter::new("shout-converter", Behavior::Fixed("SHOUT".into()))
                        .accepting(|d| d.extension() == Some(".shout")),
                ),
                PRIORITY_SPECIFIC_FORMAT,
            );
            Ok(())
        },
    ))
}

fn reset_global_registry() {
    clear_converters().unwrap();
    markwerk::converters::ensure_initialized().unwrap();
}

#[test]
fn test_loaded_plugin_participates_in_dispatch() {
    let mut registry = ConverterRegistry::with_defaults().unwrap();
    let report = load_plugins(&mut registry, &[shout_plugin()], &ConversionConfig::default());
    assert_eq!(report.loaded, vec!["shout-plugin".to_string()]);
    assert!(report.skipped.is_empty());

    let dispatcher = markwerk::Dispatcher::from_registry(registry, ConversionConfig::default());
    let hints = StreamDescriptor::new().with_extension(".shout");
    let result = dispatcher.convert_bytes(b"quiet", Some(&hints)).unwrap();

    assert_eq!(result.markdown, "SHOUT");
}

#[test]
fn test_bad_plugins_are_reported_not_fatal() {
    let outdated: Arc<dyn ConverterPlugin> = Arc::new(
        CallbackPlugin::new("outdated", |_: &mut PluginRegistrar, _: &ConversionConfig| Ok(()))
            .with_interface_version(0),
    );
    let failing: Arc<dyn ConverterPlugin> = Arc::new(CallbackPlugin::new(
        "failing",
        |registrar: &mut PluginRegistrar, _: &ConversionConfig| {
            registrar.register(Arc::new(StubConverter::new("half-registered", Behavior::Echo)));
            Err(markwerk::MarkwerkError::validation("missing model file"))
        },
    ));

    let mut registry = ConverterRegistry::new();
    let report = load_plugins(
        &mut registry,
        &[outdated, failing, shout_plugin()],
        &ConversionConfig::default(),
    );

    assert_eq!(report.loaded, vec!["shout-plugin".to_string()]);
    let skipped: Vec<&str> = report.skipped.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(skipped, vec!["outdated", "failing"]);
    assert!(report.skipped[0].reason.contains("interface version 0"));
    assert!(report.skipped[1].reason.contains("missing model file"));
    assert_eq!(registry.list(), vec!["shout-converter".to_string()]);
}

#[test]
#[serial]
fn test_global_registry_round_trip() {
    reset_global_registry();

    register_converter_with_priority(
        Arc::new(
            StubConverter::new("global-shout", Behavior::Fixed("GLOBAL".into()))
                .accepting(|d| d.extension() == Some(".shout")),
        ),
        PRIORITY_SPECIFIC_FORMAT,
    )
    .unwrap();
    assert!(list_converters().unwrap().contains(&"global-shout".to_string()));

    let hints = StreamDescriptor::new().with_extension(".shout");
    let result = convert_bytes(b"quiet", Some(&hints), &ConversionConfig::default()).unwrap();
    assert_eq!(result.markdown, "GLOBAL");

    unregister_converter("global-shout").unwrap();
    assert!(!list_converters().unwrap().contains(&"global-shout".to_string()));

    reset_global_registry();
}

#[test]
#[serial]
fn test_plugins_load_into_global_registry() {
    reset_global_registry();

    let report = load_plugins_globally(&[shout_plugin()], &ConversionConfig::default()).unwrap();
    assert_eq!(report.loaded, vec!["shout-plugin".to_string()]);

    let names = list_converters().unwrap();
    let shout = names.iter().position(|n| n == "shout-converter").expect("plugin converter registered");
    let html = names.iter().position(|n| n == "html-converter").expect("built-in converter kept");
    assert!(shout < html);
    assert_eq!(names.last().map(String::as_str), Some("plain-text-converter"));

    reset_global_registry();
}

#[test]
#[serial]
fn test_global_registry_reseeds_after_clear() {
    clear_converters().unwrap();

    let result = convert_bytes(
        b"back again",
        Some(&StreamDescriptor::new().with_extension(".txt")),
        &ConversionConfig::default(),
    )
    .unwrap();
    assert_eq!(result.markdown, "back again");
}
