//! Data models and structures
//!
//! Defines the image forms that flow through the studio, the per-flow
//! request types, and runtime configuration.

use crate::mime::MediaType;
use base64::Engine as _;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// One of the two independent request pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    Generate,
    Edit,
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowKind::Generate => f.write_str("generate"),
            FlowKind::Edit => f.write_str("edit"),
        }
    }
}

/// A decoded image, ready to render or save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    bytes: Vec<u8>,
    media_type: MediaType,
}

impl ImageAsset {
    pub fn new(bytes: Vec<u8>, media_type: MediaType) -> Self {
        Self { bytes, media_type }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// `data:` URL form, as an `<img src>` would take it.
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.media_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// An image in its transport-safe text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: String,
    pub media_type: MediaType,
}

impl EncodedImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// A user-selected file, not yet read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Media type reported by whatever picked the file, if anything.
    pub declared_media_type: Option<String>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            declared_media_type: None,
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.declared_media_type = Some(media_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub prompt: String,
    pub source: Option<SourceFile>,
}

impl EditRequest {
    pub fn new(prompt: impl Into<String>, source: Option<SourceFile>) -> Self {
        Self {
            prompt: prompt.into(),
            source,
        }
    }
}

/// Settlement of exactly one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Success(ImageAsset),
    Failure(crate::ErrorKind),
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RequestOutcome::Success(_))
    }

    pub fn image(&self) -> Option<&ImageAsset> {
        match self {
            RequestOutcome::Success(image) => Some(image),
            RequestOutcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<crate::ErrorKind> {
        match self {
            RequestOutcome::Success(_) => None,
            RequestOutcome::Failure(kind) => Some(*kind),
        }
    }
}

pub const DEFAULT_GENERATION_MODEL: &str = "imagen-4.0-generate-001";
pub const DEFAULT_EDIT_MODEL: &str = "gemini-2.5-flash-image-preview";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_base_url: Option<String>,
    pub generation_model: String,
    pub edit_model: String,
    pub download_dir: PathBuf,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();

        let gemini_api_key = parse_api_key(
            std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("API_KEY"))
                .ok(),
        )?;
        let request_timeout =
            parse_request_timeout(std::env::var("STUDIO_REQUEST_TIMEOUT_SECS").ok().as_deref())?;

        Ok(Self {
            gemini_api_key,
            gemini_base_url: std::env::var("GEMINI_BASE_URL").ok(),
            generation_model: std::env::var("IMAGE_GENERATION_MODEL")
                .unwrap_or_else(|_| DEFAULT_GENERATION_MODEL.to_string()),
            edit_model: std::env::var("IMAGE_EDIT_MODEL")
                .unwrap_or_else(|_| DEFAULT_EDIT_MODEL.to_string()),
            download_dir: std::env::var("STUDIO_DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("downloads")),
            request_timeout,
        })
    }
}

fn parse_api_key(raw: Option<String>) -> crate::Result<String> {
    match raw {
        Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        Some(_) => Err(crate::Error::Config("GEMINI_API_KEY is empty".to_string())),
        None => Err(crate::Error::Config("GEMINI_API_KEY not set".to_string())),
    }
}

fn parse_request_timeout(raw: Option<&str>) -> crate::Result<Duration> {
    let Some(raw) = raw else {
        return Ok(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
    };
    let secs = raw.trim().parse::<u64>().map_err(|e| {
        crate::Error::Config(format!(
            "STUDIO_REQUEST_TIMEOUT_SECS must be a whole number of seconds: {}",
            e
        ))
    })?;
    if secs == 0 {
        return Err(crate::Error::Config(
            "STUDIO_REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_carries_media_type() {
        let asset = ImageAsset::new(vec![1, 2, 3], MediaType::parse("image/jpeg").unwrap());
        assert_eq!(asset.data_url(), "data:image/jpeg;base64,AQID");
    }

    #[test]
    fn test_source_file_builder() {
        let source = SourceFile::new("cat.png").with_media_type("image/png");
        assert_eq!(source.path, PathBuf::from("cat.png"));
        assert_eq!(source.declared_media_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_outcome_accessors() {
        let failed = RequestOutcome::Failure(crate::ErrorKind::Service);
        assert!(!failed.is_success());
        assert_eq!(failed.error(), Some(crate::ErrorKind::Service));
        assert!(failed.image().is_none());
    }

    #[test]
    fn test_flow_kind_serialization() {
        assert_eq!(serde_json::to_string(&FlowKind::Edit).unwrap(), "\"edit\"");
        assert_eq!(FlowKind::Generate.to_string(), "generate");
    }

    #[test]
    fn test_blank_api_key_is_config_error() {
        assert!(matches!(parse_api_key(None), Err(crate::Error::Config(_))));
        assert!(matches!(
            parse_api_key(Some(String::new())),
            Err(crate::Error::Config(_))
        ));
        assert!(matches!(
            parse_api_key(Some("   ".to_string())),
            Err(crate::Error::Config(_))
        ));
        assert_eq!(parse_api_key(Some(" key\n".to_string())).unwrap(), "key");
    }

    #[test]
    fn test_request_timeout_parsing() {
        assert_eq!(
            parse_request_timeout(None).unwrap(),
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
        assert_eq!(parse_request_timeout(Some(" 30 ")).unwrap(), Duration::from_secs(30));

        let zero = parse_request_timeout(Some("0")).unwrap_err();
        assert!(matches!(zero, crate::Error::Config(_)));
        assert_eq!(zero.kind(), crate::ErrorKind::Platform);
        assert!(matches!(
            parse_request_timeout(Some("soon")),
            Err(crate::Error::Config(_))
        ));
    }
}
