//! Core conversion machinery.
//!
//! - **Entry Points**: [`Dispatcher`] and the global functions in [`extractor`]
//! - **Inference**: candidate descriptors from hints, magic bytes, tables and charset
//! - **Dispatch**: priority-ordered converter attempts with rewind between attempts
//! - **Streams**: seekable byte sources and text decoding
//! - **Configuration**: [`ConversionConfig`] and its file loaders

pub mod config;
pub mod dispatch;
pub mod extractor;
pub mod inference;
pub mod mime;
pub mod stream;
pub mod uri;

pub use config::{ConversionConfig, HtmlConfig, ZipConfig};
pub use dispatch::{ConversionContext, DispatchOutcome, Dispatcher};
#[cfg(feature = "tokio-runtime")]
pub use extractor::{batch_convert_files, batch_convert_files_with};
pub use extractor::{convert_bytes, convert_file, convert_reader, convert_source, convert_uri};
