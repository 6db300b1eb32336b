//! Image converter.
//!
//! Produces a short Markdown summary of an image: pixel dimensions, format and common EXIF
//! fields. When the dispatcher carries a [`Captioner`](crate::plugins::Captioner), its
//! description is appended under a `# Description:` heading.

use crate::core::dispatch::ConversionContext;
use crate::core::stream::{ByteSource, read_all};
use crate::plugins::{Converter, PRIORITY_SPECIFIC_FORMAT, Plugin};
use crate::types::{ConversionResult, StreamDescriptor};
use crate::{MarkwerkError, Result};
use exif::{In, Reader, Tag};
use image::ImageReader;
use std::io::Cursor;

const DEFAULT_CAPTION_PROMPT: &str = "Write a detailed caption for this image.";

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".bmp", ".tif", ".tiff", ".webp"];

const EXIF_TAGS: [(Tag, &str); 10] = [
    (Tag::ImageDescription, "ImageDescription"),
    (Tag::Artist, "Artist"),
    (Tag::Make, "Make"),
    (Tag::Model, "Model"),
    (Tag::DateTimeOriginal, "DateTimeOriginal"),
    (Tag::DateTime, "DateTime"),
    (Tag::Software, "Software"),
    (Tag::Orientation, "Orientation"),
    (Tag::GPSLatitude, "GPSLatitude"),
    (Tag::GPSLongitude, "GPSLongitude"),
];

/// Image converter for raster formats.
pub struct ImageConverter;

impl ImageConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ImageConverter {
    fn name(&self) -> &str {
        "image-converter"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn description(&self) -> &str {
        "Describes raster images by dimensions, EXIF data and optional captions"
    }

    fn author(&self) -> &str {
        "Markwerk Team"
    }
}

impl Converter for ImageConverter {
    fn accepts(&self, _source: &mut dyn ByteSource, descriptor: &StreamDescriptor, _ctx: &ConversionContext<'_>) -> bool {
        if descriptor.mime_type().is_some_and(|mime| mime.starts_with("image/svg")) {
            return false;
        }
        super::descriptor_matches(descriptor, IMAGE_EXTENSIONS, &["image/"])
    }

    fn convert(
        &self,
        source: &mut dyn ByteSource,
        descriptor: &StreamDescriptor,
        ctx: &ConversionContext<'_>,
    ) -> Result<ConversionResult> {
        let bytes = read_all(source)?;

        let reader = ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| MarkwerkError::parsing(format!("Failed to read image format: {}", e)))?;
        let format = reader
            .format()
            .ok_or_else(|| MarkwerkError::parsing("Could not determine image format"))?;
        if !format.reading_enabled() {
            return Err(MarkwerkError::MissingDependency(format!(
                "Decoding {:?} images is not enabled in this build of the image crate",
                format
            )));
        }
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| MarkwerkError::parsing(format!("Failed to read image dimensions: {}", e)))?;
        let format_name = format!("{:?}", format).to_uppercase();

        let exif_fields = extract_exif_fields(&bytes);

        let mut markdown = format!("ImageSize: {}x{}\nFormat: {}\n", width, height, format_name);
        for (name, value) in &exif_fields {
            markdown.push_str(&format!("{}: {}\n", name, value));
        }

        if let Some((captioner, model)) = ctx.captioner() {
            let mime_type = descriptor.mime_type().unwrap_or_else(|| format.to_mime_type());
            let prompt = ctx.config().caption_prompt.as_deref().unwrap_or(DEFAULT_CAPTION_PROMPT);
            match captioner.caption(&bytes, mime_type, model, prompt) {
                Ok(caption) if !caption.trim().is_empty() => {
                    markdown.push_str(&format!("\n# Description:\n{}\n", caption.trim()));
                }
                Ok(_) => tracing::debug!("Captioner returned an empty description"),
                Err(e) => tracing::warn!("Image captioning failed, continuing without a description: {}", e),
            }
        }

        let exif: serde_json::Map<String, serde_json::Value> = exif_fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), serde_json::Value::String(value)))
            .collect();

        Ok(ConversionResult::new(markdown)
            .with_metadata("width", width)
            .with_metadata("height", height)
            .with_metadata("format", format_name)
            .with_metadata("exif", serde_json::Value::Object(exif)))
    }

    fn default_priority(&self) -> f64 {
        PRIORITY_SPECIFIC_FORMAT
    }
}

/// EXIF fields present in the image, in a fixed order. Empty when there is no EXIF block.
fn extract_exif_fields(bytes: &[u8]) -> Vec<(&'static str, String)> {
    let exif = match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(e) => {
            tracing::debug!("No readable EXIF data: {}", e);
            return Vec::new();
        }
    };

    EXIF_TAGS
        .iter()
        .filter_map(|(tag, name)| {
            exif.get_field(*tag, In::PRIMARY)
                .map(|field| (*name, field.display_value().to_string().trim_matches('"').to_string()))
        })
        .collect()
}
