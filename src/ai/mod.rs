//! Generative image service integration
//!
//! The [`ImageGenerationService`] trait is the boundary to the external
//! model. Implementations make exactly one outbound call per invocation and
//! return an asset whose media type can be rendered as-is.

pub mod gemini;
pub mod mock;

pub use gemini::GeminiImageClient;
pub use mock::MockImageService;

use crate::models::{EncodedImage, ImageAsset};
use crate::{Error, Result};
use async_trait::async_trait;

#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    /// Creates an image from `prompt` alone.
    async fn generate_image(&self, prompt: &str) -> Result<ImageAsset>;

    /// Applies `prompt` to `source`.
    async fn edit_image(&self, source: Option<&EncodedImage>, prompt: &str)
        -> Result<ImageAsset>;
}

/// Rejects an empty or whitespace-only prompt.
pub fn require_prompt(prompt: &str) -> Result<&str> {
    if prompt.trim().is_empty() {
        return Err(Error::InvalidInput("prompt must not be empty".to_string()));
    }
    Ok(prompt)
}

/// Rejects an edit without a source image.
pub fn require_source(source: Option<&EncodedImage>) -> Result<&EncodedImage> {
    source.ok_or_else(|| Error::InvalidInput("source image is required".to_string()))
}
