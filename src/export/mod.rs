//! Result export
//!
//! Derives a filesystem-safe download name for a result and hands the image
//! to a platform save mechanism.

pub mod directory;
pub mod mock;

pub use directory::DirectoryExporter;
pub use mock::MockExporter;

use crate::mime::MediaType;
use crate::models::ImageAsset;
use crate::Result;
use async_trait::async_trait;

pub const MAX_NAME_LEN: usize = 30;
pub const GENERATED_FALLBACK_NAME: &str = "generated-image";
pub const GENERATED_EXTENSION: &str = "jpeg";
pub const EDITED_BASE_NAME: &str = "edited-image";
pub const EDITED_FALLBACK_EXTENSION: &str = "png";

/// What a download name is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportSource<'a> {
    /// A text-to-image result, named after the prompt that produced it.
    Generated { prompt: &'a str },
    /// An edit result, named after its media type.
    Edited { media_type: &'a MediaType },
}

pub fn export_name(source: ExportSource<'_>) -> String {
    match source {
        ExportSource::Generated { prompt } => {
            let base = sanitize_prompt(prompt);
            let base = if base.is_empty() {
                GENERATED_FALLBACK_NAME.to_string()
            } else {
                base
            };
            format!("{}.{}", base, GENERATED_EXTENSION)
        }
        ExportSource::Edited { media_type } => format!(
            "{}.{}",
            EDITED_BASE_NAME,
            media_type.extension().unwrap_or(EDITED_FALLBACK_EXTENSION)
        ),
    }
}

/// Lowercase alphanumerics joined by single underscores, at most
/// [`MAX_NAME_LEN`] characters, never starting or ending with `_`.
fn sanitize_prompt(prompt: &str) -> String {
    let mut name = String::with_capacity(MAX_NAME_LEN);
    let mut pending_separator = false;

    for c in prompt.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !name.is_empty() {
                if name.len() + 1 >= MAX_NAME_LEN {
                    break;
                }
                name.push('_');
            }
            pending_separator = false;
            if name.len() >= MAX_NAME_LEN {
                break;
            }
            name.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    name
}

#[async_trait]
pub trait Exporter: Send + Sync {
    /// Saves `image` under `filename`, exactly once per call.
    async fn trigger_save(&self, image: &ImageAsset, filename: &str) -> Result<()>;
}
