//! Detection-and-dispatch engine.
//!
//! For one conversion the [`Dispatcher`]:
//!
//! 1. makes the input seekable (buffering readers that are not),
//! 2. infers an ordered list of candidate descriptors,
//! 3. walks candidates x converters (in priority order), rewinding the stream before
//!    every `accepts` and every `convert`,
//! 4. returns the first successful result, or a single aggregated error.
//!
//! The registry is snapshotted at the start of each top-level call. Converters run without
//! any registry lock held, so a converter may itself register or unregister converters
//! (the change applies to the next call).

use crate::core::config::ConversionConfig;
use crate::core::inference;
use crate::core::mime::extension_of;
use crate::core::stream::{ByteSource, buffer_reader, rewind};
use crate::core::uri::{file_uri_to_path, parse_data_uri, scheme_of};
use crate::error::AttemptRecord;
use crate::plugins::{Captioner, ConverterRegistration, ConverterRegistry};
use crate::types::{ConversionResult, Origin, StreamDescriptor};
use crate::{MarkwerkError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::any::Any;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::{Arc, RwLock};

static BLANK_LINE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("Blank line run regex pattern is valid and should compile"));

/// Successful dispatch together with how it got there.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub result: ConversionResult,
    /// Candidate descriptor the winning converter accepted.
    pub descriptor: StreamDescriptor,
    /// Name of the winning converter.
    pub converter: String,
    /// Conversions that were attempted and failed before the winner, in order.
    pub failed_attempts: Vec<AttemptRecord>,
}

/// Converts byte sources to Markdown using a converter registry.
///
/// # Example
///
/// ```rust
/// use markwerk::{ConversionConfig, Dispatcher, StreamDescriptor};
/// use markwerk::plugins::ConverterRegistry;
///
/// let dispatcher = Dispatcher::from_registry(ConverterRegistry::with_defaults()?, ConversionConfig::default());
/// let hints = StreamDescriptor::new().with_extension(".csv");
/// let result = dispatcher.convert_bytes(b"name,qty\nbolt,4\n", Some(&hints))?;
///
/// assert!(result.markdown.starts_with("| name | qty |"));
/// # Ok::<(), markwerk::MarkwerkError>(())
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<RwLock<ConverterRegistry>>,
    config: ConversionConfig,
    captioner: Option<(Arc<dyn Captioner>, String)>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("captioner_model", &self.captioner.as_ref().map(|(_, model)| model))
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(registry: Arc<RwLock<ConverterRegistry>>, config: ConversionConfig) -> Self {
        Self {
            registry,
            config,
            captioner: None,
        }
    }

    /// Dispatcher over a registry it owns exclusively.
    pub fn from_registry(registry: ConverterRegistry, config: ConversionConfig) -> Self {
        Self::new(Arc::new(RwLock::new(registry)), config)
    }

    /// Dispatcher over the global registry, seeding it with the built-in converters first.
    pub fn with_global_registry(config: ConversionConfig) -> Result<Self> {
        crate::converters::ensure_initialized()?;
        Ok(Self::new(crate::plugins::get_converter_registry(), config))
    }

    /// Make an image captioner available to converters.
    pub fn with_captioner(mut self, captioner: Arc<dyn Captioner>, model: impl Into<String>) -> Self {
        self.captioner = Some((captioner, model.into()));
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<RwLock<ConverterRegistry>> {
        Arc::clone(&self.registry)
    }

    /// Convert a local file.
    ///
    /// The file name and extension are added to the hints; explicit hints win.
    pub fn convert_file(&self, path: impl AsRef<Path>, hints: Option<&StreamDescriptor>) -> Result<ConversionResult> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MarkwerkError::validation(format!("File does not exist: {}", path.display()))
            } else {
                MarkwerkError::Io(e)
            }
        })?;

        let mut base = StreamDescriptor::new().with_origin(Origin::LocalPath(path.to_path_buf()));
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            base = base.with_filename(name);
            if let Some(ext) = extension_of(name) {
                base = base.with_extension(ext);
            }
        }
        let hints = layer_hints(base, hints);

        let mut reader = BufReader::new(file);
        self.convert_stream(&mut reader, Some(&hints))
    }

    /// Convert an in-memory buffer.
    pub fn convert_bytes(&self, bytes: &[u8], hints: Option<&StreamDescriptor>) -> Result<ConversionResult> {
        let hints = layer_hints(StreamDescriptor::new().with_origin(Origin::InMemory), hints);
        let mut cursor = Cursor::new(bytes);
        self.convert_stream(&mut cursor, Some(&hints))
    }

    /// Convert a reader that cannot seek. The whole input is buffered in memory first.
    pub fn convert_reader<R: Read>(&self, reader: R, hints: Option<&StreamDescriptor>) -> Result<ConversionResult> {
        let mut buffered = buffer_reader(reader)?;
        self.convert_stream(&mut buffered, hints)
    }

    /// Convert a seekable stream. The stream is rewound to offset zero first.
    pub fn convert_stream<S: Read + Seek>(
        &self,
        stream: &mut S,
        hints: Option<&StreamDescriptor>,
    ) -> Result<ConversionResult> {
        self.convert_traced(stream, hints).map(|outcome| outcome.result)
    }

    /// Convert a `file:` or `data:` URI.
    ///
    /// `http` and `https` URIs are rejected: fetch the body yourself and pass it to
    /// [`Dispatcher::convert_bytes`] with hints from [`StreamDescriptor::from_http_response`].
    pub fn convert_uri(&self, uri: &str, hints: Option<&StreamDescriptor>) -> Result<ConversionResult> {
        let uri = uri.trim();
        match scheme_of(uri).as_deref() {
            Some("file") => {
                let path = file_uri_to_path(uri)?;
                self.convert_file(path, hints)
            }
            Some("data") => {
                let data_uri = parse_data_uri(uri)?;
                let hints = layer_hints(data_uri.descriptor(), hints);
                let mut cursor = Cursor::new(data_uri.data);
                self.convert_stream(&mut cursor, Some(&hints))
            }
            Some(scheme @ ("http" | "https")) => Err(MarkwerkError::validation(format!(
                "Refusing to fetch {} URI '{}': retrieve the content and use convert_bytes with \
                 StreamDescriptor::from_http_response",
                scheme, uri
            ))),
            Some(other) => Err(MarkwerkError::validation(format!("Unsupported URI scheme: {}", other))),
            None => Err(MarkwerkError::validation(format!("Not a URI: {}", uri))),
        }
    }

    /// Convert a path or URI given as a string.
    pub fn convert_source(&self, source: &str, hints: Option<&StreamDescriptor>) -> Result<ConversionResult> {
        if scheme_of(source.trim()).is_some() {
            self.convert_uri(source, hints)
        } else {
            self.convert_file(source, hints)
        }
    }

    /// Convert a stream and report which converter won and which failed before it.
    pub fn convert_traced(
        &self,
        stream: &mut dyn ByteSource,
        hints: Option<&StreamDescriptor>,
    ) -> Result<DispatchOutcome> {
        let converters = self.snapshot()?;
        let hints = hints.cloned().unwrap_or_default();
        self.dispatch(stream, &hints, &converters, 0)
    }

    fn snapshot(&self) -> Result<Vec<ConverterRegistration>> {
        let registry = self
            .registry
            .read()
            .map_err(|e| MarkwerkError::LockPoisoned(format!("Converter registry lock poisoned: {}", e)))?;
        Ok(registry.list_by_priority())
    }

    #[tracing::instrument(name = "dispatch", skip_all, fields(depth = depth))]
    fn dispatch(
        &self,
        source: &mut dyn ByteSource,
        hints: &StreamDescriptor,
        converters: &[ConverterRegistration],
        depth: usize,
    ) -> Result<DispatchOutcome> {
        rewind(source)?;
        let candidates = inference::infer(source, hints, &self.config);
        let ctx = ConversionContext {
            dispatcher: self,
            converters,
            depth,
        };

        let mut failed_attempts = Vec::new();

        for descriptor in &candidates {
            for registration in converters {
                let name = registration.name();

                rewind(source)?;
                if !call_accepts(registration, source, descriptor, &ctx) {
                    continue;
                }

                rewind(source)?;
                match call_convert(registration, source, descriptor, &ctx) {
                    Ok(result) => {
                        tracing::info!(
                            "Converted {} with '{}' after {} failed attempt(s)",
                            descriptor,
                            name,
                            failed_attempts.len()
                        );
                        let result = if self.config.normalize_output {
                            normalize_result(result)
                        } else {
                            result
                        };
                        return Ok(DispatchOutcome {
                            result,
                            descriptor: descriptor.clone(),
                            converter: name.to_string(),
                            failed_attempts,
                        });
                    }
                    Err(e) => {
                        tracing::debug!("Converter '{}' failed on {}: {}", name, descriptor, e);
                        failed_attempts.push(AttemptRecord::new(name, descriptor.clone(), &e));
                    }
                }
            }
        }

        if failed_attempts.is_empty() {
            let descriptor = candidates.into_iter().next().unwrap_or_default();
            tracing::debug!("No converter accepted {}", descriptor);
            Err(MarkwerkError::UnsupportedFormat {
                descriptor: Box::new(descriptor),
            })
        } else {
            Err(MarkwerkError::ConversionFailed {
                attempts: failed_attempts,
            })
        }
    }
}

/// What a converter can see of the dispatch it runs in.
///
/// Handed to `accepts` and `convert`. Container converters use
/// [`ConversionContext::convert_nested`] to convert their entries with the same registry
/// snapshot and configuration.
pub struct ConversionContext<'a> {
    dispatcher: &'a Dispatcher,
    converters: &'a [ConverterRegistration],
    depth: usize,
}

impl<'a> ConversionContext<'a> {
    pub fn config(&self) -> &ConversionConfig {
        &self.dispatcher.config
    }

    /// Nesting depth of the current conversion; 0 for a top-level call.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The configured captioner and model identifier, if any.
    pub fn captioner(&self) -> Option<(&dyn Captioner, &str)> {
        self.dispatcher
            .captioner
            .as_ref()
            .map(|(captioner, model)| (captioner.as_ref(), model.as_str()))
    }

    /// Run a full dispatch on an inner byte buffer.
    ///
    /// # Errors
    ///
    /// `Validation` when the nesting limit from [`ConversionConfig::max_nesting_depth`] would
    /// be exceeded, otherwise whatever dispatch returns.
    pub fn convert_nested(&self, bytes: &[u8], hints: &StreamDescriptor) -> Result<ConversionResult> {
        let depth = self.depth + 1;
        let limit = self.dispatcher.config.max_nesting_depth;
        if depth > limit {
            return Err(MarkwerkError::validation(format!(
                "Maximum nesting depth of {} exceeded",
                limit
            )));
        }

        let mut cursor = Cursor::new(bytes);
        self.dispatcher
            .dispatch(&mut cursor, hints, self.converters, depth)
            .map(|outcome| outcome.result)
    }
}

fn call_accepts(
    registration: &ConverterRegistration,
    source: &mut dyn ByteSource,
    descriptor: &StreamDescriptor,
    ctx: &ConversionContext<'_>,
) -> bool {
    match catch_unwind(AssertUnwindSafe(|| {
        registration.converter.accepts(source, descriptor, ctx)
    })) {
        Ok(accepted) => {
            if !accepted {
                tracing::debug!("Converter '{}' does not accept {}", registration.name(), descriptor);
            }
            accepted
        }
        Err(payload) => {
            tracing::warn!(
                "Converter '{}' panicked in accepts: {}",
                registration.name(),
                panic_message(payload.as_ref())
            );
            false
        }
    }
}

fn call_convert(
    registration: &ConverterRegistration,
    source: &mut dyn ByteSource,
    descriptor: &StreamDescriptor,
    ctx: &ConversionContext<'_>,
) -> Result<ConversionResult> {
    catch_unwind(AssertUnwindSafe(|| {
        registration.converter.convert(source, descriptor, ctx)
    }))
    .unwrap_or_else(|payload| {
        Err(MarkwerkError::Plugin {
            message: format!("panicked during conversion: {}", panic_message(payload.as_ref())),
            plugin_name: registration.name().to_string(),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn layer_hints(base: StreamDescriptor, hints: Option<&StreamDescriptor>) -> StreamDescriptor {
    match hints {
        Some(hints) => base.layered(hints),
        None => base,
    }
}

/// Strips trailing whitespace from every line, turns CRLF into LF and collapses runs of
/// three or more newlines into one blank line.
pub fn normalize_markdown(markdown: &str) -> String {
    let unified = markdown.replace("\r\n", "\n");
    let trimmed = unified.split('\n').map(str::trim_end).collect::<Vec<_>>().join("\n");
    BLANK_LINE_RUNS.replace_all(&trimmed, "\n\n").into_owned()
}

fn normalize_result(mut result: ConversionResult) -> ConversionResult {
    result.markdown = normalize_markdown(&result.markdown);
    result
}
