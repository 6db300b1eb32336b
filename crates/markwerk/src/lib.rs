//! markwerk - convert files and byte streams to Markdown
//!
//! markwerk takes an opaque byte source, works out what it probably is, and hands it to
//! the first registered converter that accepts it. Converters are plugins: the built-in
//! ones cover text, HTML, CSV, Jupyter notebooks, RSS/Atom feeds, images and ZIP archives,
//! and applications add their own through the same registry.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use markwerk::{convert_file, ConversionConfig};
//!
//! # fn main() -> markwerk::Result<()> {
//! let result = convert_file("report.csv", None, &ConversionConfig::default())?;
//! println!("{}", result.markdown);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Core Module** (`core`): descriptor inference, the dispatch engine, configuration
//! - **Plugin System** (`plugins`): converter trait, priority-ordered registry, plugin loader
//! - **Converters** (`converters`): built-in format converters
//!
//! # Dispatch in brief
//!
//! 1. Caller hints plus magic bytes, extension tables and charset detection produce an
//!    ordered list of candidate [`StreamDescriptor`]s.
//! 2. For each candidate, converters are asked in priority order whether they accept it;
//!    the stream is rewound before every question and every conversion.
//! 3. The first successful conversion wins. Otherwise the caller gets
//!    [`MarkwerkError::UnsupportedFormat`] or [`MarkwerkError::ConversionFailed`].

#![deny(unsafe_code)]

pub mod converters;
pub mod core;
pub mod error;
pub mod plugins;
pub mod types;

pub use error::{AttemptRecord, MarkwerkError, Result};
pub use types::{ConversionResult, Metadata, Origin, StreamDescriptor};

pub use core::config::{ConversionConfig, HtmlConfig, ZipConfig};
pub use core::dispatch::{ConversionContext, DispatchOutcome, Dispatcher};
pub use core::extractor::{
    convert_bytes, convert_file, convert_reader, convert_source, convert_stream, convert_uri,
};

#[cfg(feature = "tokio-runtime")]
pub use core::extractor::{batch_convert_files, batch_convert_files_with};

pub use core::mime::{
    CSV_MIME_TYPE, HTML_MIME_TYPE, JSON_MIME_TYPE, MARKDOWN_MIME_TYPE, PLAIN_TEXT_MIME_TYPE, ZIP_MIME_TYPE,
    extension_for_mime, mime_for_extension,
};
pub use core::stream::ByteSource;

pub use plugins::registry::get_converter_registry;
pub use plugins::{
    Captioner, Converter, ConverterPlugin, ConverterRegistry, PRIORITY_GENERIC_FORMAT, PRIORITY_SPECIFIC_FORMAT,
    PRIORITY_UNCLASSIFIED, Plugin, load_plugins,
};
