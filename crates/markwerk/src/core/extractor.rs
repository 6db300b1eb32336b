//! Global convenience entry points.
//!
//! These functions convert through the process-wide converter registry, seeding it with
//! the built-in converters on first use. Use a [`Dispatcher`] directly for an isolated
//! registry or a captioner.
//!
//! # Example
//!
//! ```rust,no_run
//! use markwerk::{ConversionConfig, convert_file};
//!
//! let result = convert_file("notes/meeting.html", None, &ConversionConfig::default())?;
//! println!("{}", result.markdown);
//! # Ok::<(), markwerk::MarkwerkError>(())
//! ```

use crate::core::config::ConversionConfig;
use crate::core::dispatch::Dispatcher;
use crate::types::{ConversionResult, StreamDescriptor};
use crate::Result;
use std::io::{Read, Seek};
use std::path::Path;

/// Convert a local file using the global registry.
pub fn convert_file(
    path: impl AsRef<Path>,
    hints: Option<&StreamDescriptor>,
    config: &ConversionConfig,
) -> Result<ConversionResult> {
    Dispatcher::with_global_registry(config.clone())?.convert_file(path, hints)
}

/// Convert an in-memory buffer using the global registry.
pub fn convert_bytes(bytes: &[u8], hints: Option<&StreamDescriptor>, config: &ConversionConfig) -> Result<ConversionResult> {
    Dispatcher::with_global_registry(config.clone())?.convert_bytes(bytes, hints)
}

/// Convert any reader using the global registry. The input is buffered in memory.
pub fn convert_reader<R: Read>(
    reader: R,
    hints: Option<&StreamDescriptor>,
    config: &ConversionConfig,
) -> Result<ConversionResult> {
    Dispatcher::with_global_registry(config.clone())?.convert_reader(reader, hints)
}

/// Convert a seekable stream using the global registry, starting from offset zero.
pub fn convert_stream<S: Read + Seek>(
    stream: &mut S,
    hints: Option<&StreamDescriptor>,
    config: &ConversionConfig,
) -> Result<ConversionResult> {
    Dispatcher::with_global_registry(config.clone())?.convert_stream(stream, hints)
}

/// Convert a `file:` or `data:` URI using the global registry.
pub fn convert_uri(uri: &str, hints: Option<&StreamDescriptor>, config: &ConversionConfig) -> Result<ConversionResult> {
    Dispatcher::with_global_registry(config.clone())?.convert_uri(uri, hints)
}

/// Convert a path or URI string using the global registry.
pub fn convert_source(source: &str, hints: Option<&StreamDescriptor>, config: &ConversionConfig) -> Result<ConversionResult> {
    Dispatcher::with_global_registry(config.clone())?.convert_source(source, hints)
}

/// Convert many files concurrently using the global registry.
///
/// See [`batch_convert_files_with`].
#[cfg(feature = "tokio-runtime")]
pub async fn batch_convert_files(
    paths: Vec<impl AsRef<Path>>,
    config: &ConversionConfig,
) -> Result<Vec<Result<ConversionResult>>> {
    let dispatcher = Dispatcher::with_global_registry(config.clone())?;
    batch_convert_files_with(&dispatcher, paths).await
}

/// Convert many files concurrently with `dispatcher`.
///
/// Each file is converted on a blocking task; at most
/// `config.max_concurrent_conversions` (default: CPU count x 2) run at once. Results come
/// back in input order, and a file that fails yields its own `Err` without affecting the
/// others.
#[cfg(feature = "tokio-runtime")]
pub async fn batch_convert_files_with(
    dispatcher: &Dispatcher,
    paths: Vec<impl AsRef<Path>>,
) -> Result<Vec<Result<ConversionResult>>> {
    use crate::MarkwerkError;
    use std::sync::Arc;
    use tokio::sync::Semaphore;
    use tokio::task::JoinSet;

    if paths.is_empty() {
        return Ok(vec![]);
    }

    let max_concurrent = dispatcher
        .config()
        .max_concurrent_conversions
        .unwrap_or_else(|| num_cpus::get() * 2)
        .max(1);
    let semaphore = Arc::new(Semaphore::new(max_concurrent));

    let mut tasks = JoinSet::new();

    for (index, path) in paths.into_iter().enumerate() {
        let path_buf = path.as_ref().to_path_buf();
        let dispatcher = dispatcher.clone();
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => return (index, Err(MarkwerkError::Other(format!("Batch semaphore closed: {}", e)))),
            };

            let result = tokio::task::spawn_blocking(move || dispatcher.convert_file(&path_buf, None))
                .await
                .unwrap_or_else(|join_err| Err(MarkwerkError::Other(format!("Conversion task panicked: {}", join_err))));
            (index, result)
        });
    }

    let mut results: Vec<Option<Result<ConversionResult>>> = (0..tasks.len()).map(|_| None).collect();

    while let Some(task_result) = tasks.join_next().await {
        match task_result {
            Ok((index, result)) => {
                if let Err(e) = &result {
                    tracing::debug!("Batch entry {} failed: {}", index, e);
                }
                results[index] = Some(result);
            }
            Err(join_err) => {
                return Err(MarkwerkError::Other(format!("Batch task failed: {}", join_err)));
            }
        }
    }

    Ok(results
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(MarkwerkError::Other("Batch task produced no result".to_string()))))
        .collect())
}
