//! Batch conversion integration tests.

#![cfg(feature = "tokio-runtime")]

use markwerk::plugins::ConverterRegistry;
use markwerk::{ConversionConfig, Dispatcher, MarkwerkError, batch_convert_files, batch_convert_files_with};
use std::path::PathBuf;

fn write_files(dir: &tempfile::TempDir, files: &[(&str, &str)]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(name, content)| {
            let path = dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            path
        })
        .collect()
}

#[tokio::test]
async fn test_batch_preserves_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let files: Vec<(String, String)> = (0..12)
        .map(|i| (format!("note-{:02}.txt", i), format!("note number {}", i)))
        .collect();
    let borrowed: Vec<(&str, &str)> = files.iter().map(|(n, c)| (n.as_str(), c.as_str())).collect();
    let paths = write_files(&dir, &borrowed);

    let config = ConversionConfig {
        max_concurrent_conversions: Some(3),
        ..Default::default()
    };
    let dispatcher = Dispatcher::from_registry(ConverterRegistry::with_defaults().unwrap(), config);
    let results = batch_convert_files_with(&dispatcher, paths).await.unwrap();

    assert_eq!(results.len(), 12);
    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap().markdown, format!("note number {}", i));
    }
}

#[tokio::test]
async fn test_batch_failures_stay_per_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = write_files(&dir, &[("a.txt", "alpha"), ("c.csv", "x,y\n1,2\n")]);
    paths.insert(1, dir.path().join("missing.txt"));

    let dispatcher = Dispatcher::from_registry(ConverterRegistry::with_defaults().unwrap(), ConversionConfig::default());
    let results = batch_convert_files_with(&dispatcher, paths).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().markdown, "alpha");
    assert!(matches!(results[1], Err(MarkwerkError::Validation { .. })));
    assert!(results[2].as_ref().unwrap().markdown.starts_with("| x | y |"));
}

#[tokio::test]
async fn test_empty_batch() {
    let results = batch_convert_files(Vec::<PathBuf>::new(), &ConversionConfig::default())
        .await
        .unwrap();
    assert!(results.is_empty());
}
