use markwerk::plugins::{CallbackPlugin, ConverterPlugin, ConverterRegistry, PluginRegistrar, load_plugins};
use markwerk::{ConversionConfig, Dispatcher, StreamDescriptor};
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

/// Collects span names and the messages of events at WARN or above.
#[derive(Clone, Default)]
struct Collector {
    spans: Arc<Mutex<Vec<String>>>,
    warnings: Arc<Mutex<Vec<String>>>,
}

struct MessageVisitor<'a>(&'a mut String);

impl Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        }
    }
}

impl<S: Subscriber + for<'a> LookupSpan<'a>> Layer<S> for Collector {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        self.spans.lock().unwrap().push(attrs.metadata().name().to_string());
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() <= Level::WARN {
            let mut message = String::new();
            event.record(&mut MessageVisitor(&mut message));
            self.warnings.lock().unwrap().push(message);
        }
    }
}

#[test]
fn test_dispatch_span_per_nesting_level() {
    let collector = Collector::default();
    let subscriber = tracing_subscriber::registry().with(collector.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let dispatcher = Dispatcher::from_registry(ConverterRegistry::with_defaults().unwrap(), ConversionConfig::default());
    let hints = StreamDescriptor::new().with_extension(".txt");
    dispatcher.convert_bytes(b"traced", Some(&hints)).unwrap();

    let spans = collector.spans.lock().unwrap();
    assert_eq!(spans.iter().filter(|name| name.as_str() == "dispatch").count(), 1);
}

#[test]
fn test_skipped_plugin_logs_warning() {
    let collector = Collector::default();
    let subscriber = tracing_subscriber::registry().with(collector.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let plugin: Arc<dyn ConverterPlugin> = Arc::new(
        CallbackPlugin::new("legacy", |_: &mut PluginRegistrar, _: &ConversionConfig| Ok(())).with_interface_version(7),
    );
    let mut registry = ConverterRegistry::new();
    load_plugins(&mut registry, &[plugin], &ConversionConfig::default());

    let warnings = collector.warnings.lock().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("Skipping plugin 'legacy'"));
}
