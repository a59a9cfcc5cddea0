use super::client::GeminiHttpClient;
use super::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, InlineData, Part,
    PredictInstance, PredictParameters, PredictRequest, PredictResponse,
};
use crate::ai::{require_prompt, require_source, ImageGenerationService};
use crate::codec;
use crate::mime::MediaType;
use crate::models::{EncodedImage, ImageAsset};
use crate::{Error, Result};
use async_trait::async_trait;

const GENERATED_MEDIA_TYPE: &str = "image/jpeg";

/// Imagen for text-to-image, an image-capable Gemini model for edits.
pub struct GeminiImageClient {
    http: GeminiHttpClient,
    generation_model: String,
    edit_model: String,
}

impl GeminiImageClient {
    pub fn new(http: GeminiHttpClient, generation_model: String, edit_model: String) -> Self {
        Self {
            http,
            generation_model,
            edit_model,
        }
    }

    pub fn generation_model(&self) -> &str {
        &self.generation_model
    }

    pub fn edit_model(&self) -> &str {
        &self.edit_model
    }
}

/// Turns a base64 payload from the service into a displayable asset.
///
/// A missing or non-image media type is replaced by sniffing the bytes.
fn into_asset(data: String, reported_media_type: Option<&str>) -> Result<ImageAsset> {
    let declared = reported_media_type.and_then(MediaType::parse);
    let encoded = EncodedImage {
        data,
        media_type: declared.clone().unwrap_or_else(MediaType::fallback),
    };
    let asset = codec::decode(&encoded).map_err(|e| {
        Error::Service(format!("Service returned undecodable image data: {}", e))
    })?;

    match declared {
        Some(_) => Ok(asset),
        None => {
            tracing::debug!(
                "Service reported media type {:?}, sniffing instead",
                reported_media_type
            );
            let media_type = MediaType::sniff(asset.bytes());
            Ok(ImageAsset::new(asset.into_bytes(), media_type))
        }
    }
}

#[async_trait]
impl ImageGenerationService for GeminiImageClient {
    async fn generate_image(&self, prompt: &str) -> Result<ImageAsset> {
        let prompt = require_prompt(prompt)?;

        let request = PredictRequest {
            instances: vec![PredictInstance {
                prompt: prompt.to_string(),
            }],
            parameters: PredictParameters {
                sample_count: 1,
                output_mime_type: GENERATED_MEDIA_TYPE.to_string(),
                aspect_ratio: "1:1".to_string(),
            },
        };

        let response: PredictResponse = self
            .http
            .predict(&self.generation_model, &request)
            .await?;

        let prediction = response.predictions.into_iter().next().ok_or_else(|| {
            Error::Service("No image returned (the prompt may have been filtered)".to_string())
        })?;

        let data = match prediction.bytes_base64_encoded {
            Some(data) => data,
            None => {
                let reason = prediction
                    .rai_filtered_reason
                    .unwrap_or_else(|| "no image data in prediction".to_string());
                tracing::error!("Imagen returned no image: {}", reason);
                return Err(Error::Service(format!("No image returned: {}", reason)));
            }
        };

        let asset = into_asset(data, prediction.mime_type.as_deref())?;
        tracing::debug!(
            "Imagen returned {} bytes of {}",
            asset.bytes().len(),
            asset.media_type()
        );
        Ok(asset)
    }

    async fn edit_image(
        &self,
        source: Option<&EncodedImage>,
        prompt: &str,
    ) -> Result<ImageAsset> {
        let source = require_source(source)?;
        let prompt = require_prompt(prompt)?;

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: None,
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: source.media_type.to_string(),
                            data: source.data.clone(),
                        },
                    },
                    Part::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            },
        };

        let response: GenerateContentResponse = self
            .http
            .generate_content(&self.edit_model, &request)
            .await?;

        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            tracing::error!("Gemini blocked the edit prompt: {}", reason);
            return Err(Error::Service(format!("Prompt blocked: {}", reason)));
        }

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::Service("No candidates in Gemini response".to_string()))?;

        let inline_data = candidate
            .content
            .into_iter()
            .flat_map(|content| content.parts)
            .find_map(|part| match part {
                Part::InlineData { inline_data } => Some(inline_data),
                Part::Text { .. } => None,
            });

        let inline_data = match inline_data {
            Some(inline_data) => inline_data,
            None => {
                let reason = candidate
                    .finish_reason
                    .unwrap_or_else(|| "no image data".to_string());
                tracing::error!("Gemini returned no edited image: {}", reason);
                return Err(Error::Service(format!(
                    "No image data in Gemini response: {}",
                    reason
                )));
            }
        };

        tracing::debug!(
            "Gemini returned image with mime_type: {}",
            inline_data.mime_type
        );

        into_asset(inline_data.data, Some(inline_data.mime_type.as_str()))
    }
}
