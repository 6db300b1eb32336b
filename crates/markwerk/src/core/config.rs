//! Configuration loading and management.
//!
//! [`ConversionConfig`] can be built in code, or loaded from TOML, YAML or JSON. Every
//! field has a default, so a config file only needs to name what it changes.

use crate::{MarkwerkError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options that apply to every conversion run by a dispatcher.
///
/// # Example
///
/// ```rust
/// use markwerk::ConversionConfig;
///
/// let config = ConversionConfig {
///     max_nesting_depth: 2,
///     ..Default::default()
/// };
/// assert_eq!(config.sniff_prefix_bytes, 8192);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Bytes read from the start of a stream for signature and charset detection.
    #[serde(default = "default_sniff_prefix_bytes")]
    pub sniff_prefix_bytes: usize,

    /// How many containers deep nested conversion may go.
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,

    /// Strip trailing whitespace per line and collapse blank-line runs in results.
    #[serde(default = "default_true")]
    pub normalize_output: bool,

    /// Upper bound on concurrent conversions in batch mode (None = CPU count x 2).
    #[serde(default)]
    pub max_concurrent_conversions: Option<usize>,

    /// Prompt passed to the captioner; converters use their own default when unset.
    #[serde(default)]
    pub caption_prompt: Option<String>,

    #[serde(default)]
    pub html: HtmlConfig,

    #[serde(default)]
    pub zip: ZipConfig,
}

/// HTML conversion options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlConfig {
    /// Read `<title>` and `<meta>` tags into the result title and metadata.
    #[serde(default = "default_true")]
    pub extract_metadata: bool,
}

/// Archive conversion options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZipConfig {
    /// Render entries that fail to convert as an inline note instead of omitting them.
    #[serde(default = "default_true")]
    pub include_failures: bool,
}

fn default_true() -> bool {
    true
}

fn default_sniff_prefix_bytes() -> usize {
    8192
}

fn default_max_nesting_depth() -> usize {
    8
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            sniff_prefix_bytes: default_sniff_prefix_bytes(),
            max_nesting_depth: default_max_nesting_depth(),
            normalize_output: true,
            max_concurrent_conversions: None,
            caption_prompt: None,
            html: HtmlConfig::default(),
            zip: ZipConfig::default(),
        }
    }
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self { extract_metadata: true }
    }
}

impl Default for ZipConfig {
    fn default() -> Self {
        Self { include_failures: true }
    }
}

impl ConversionConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config_file(path.as_ref())?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| MarkwerkError::validation(format!("Invalid TOML in {}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config_file(path.as_ref())?;
        let config: Self = serde_yaml_ng::from_str(&content)
            .map_err(|e| MarkwerkError::validation(format!("Invalid YAML in {}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config_file(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| MarkwerkError::validation(format!("Invalid JSON in {}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration based on the file extension (`.toml`, `.yaml`/`.yml`, `.json`).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("toml") => Self::from_toml_file(path),
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(MarkwerkError::validation(format!(
                "Unsupported config file format: {}",
                path.display()
            ))),
        }
    }

    /// Discover `markwerk.toml` in the current directory or any parent.
    ///
    /// Returns `Ok(None)` when no file is found.
    pub fn discover() -> Result<Option<Self>> {
        let mut current = std::env::current_dir().map_err(MarkwerkError::Io)?;

        loop {
            let candidate = current.join("markwerk.toml");
            if candidate.exists() {
                return Ok(Some(Self::from_toml_file(candidate)?));
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        Ok(None)
    }

    /// Rejects values that would make dispatch meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.sniff_prefix_bytes == 0 {
            return Err(MarkwerkError::validation("sniff_prefix_bytes must be greater than 0"));
        }
        if self.max_concurrent_conversions == Some(0) {
            return Err(MarkwerkError::validation(
                "max_concurrent_conversions must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| MarkwerkError::validation(format!("Failed to read config file {}: {}", path.display(), e)))
}
