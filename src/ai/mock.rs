use super::{require_prompt, require_source, ImageGenerationService};
use crate::mime::MediaType;
use crate::models::{EncodedImage, ImageAsset};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// A tiny valid PNG, returned when no response is configured.
pub const DEFAULT_MOCK_PNG: [u8; 69] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
    0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1 pixel
    0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49,
    0x44, 0x41, // IDAT chunk
    0x54, 0x08, 0x99, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0xE2,
    0x25, 0x00, 0xBC, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, // IEND chunk
    0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[derive(Clone)]
pub struct MockImageService {
    responses: Arc<Mutex<Vec<ImageAsset>>>,
    should_fail: Arc<Mutex<bool>>,
    gate: Option<Arc<Semaphore>>,
    generate_count: Arc<Mutex<usize>>,
    edit_count: Arc<Mutex<usize>>,
    last_prompt: Arc<Mutex<Option<String>>>,
    last_source: Arc<Mutex<Option<EncodedImage>>>,
}

impl MockImageService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
            gate: None,
            generate_count: Arc::new(Mutex::new(0)),
            edit_count: Arc::new(Mutex::new(0)),
            last_prompt: Arc::new(Mutex::new(None)),
            last_source: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_image_response(self, response: ImageAsset) -> Self {
        self.responses.lock().unwrap().push(response);
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    /// Holds every call until `gate` has a permit for it, to keep a request
    /// pending. Each call consumes one permit.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn get_generate_count(&self) -> usize {
        *self.generate_count.lock().unwrap()
    }

    pub fn get_edit_count(&self) -> usize {
        *self.edit_count.lock().unwrap()
    }

    pub fn get_call_count(&self) -> usize {
        self.get_generate_count() + self.get_edit_count()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }

    pub fn last_source(&self) -> Option<EncodedImage> {
        self.last_source.lock().unwrap().clone()
    }

    async fn respond(&self, call: usize) -> Result<ImageAsset> {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        if *self.should_fail.lock().unwrap() {
            return Err(Error::Service("Mock failure".to_string()));
        }

        let responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(ImageAsset::new(
                DEFAULT_MOCK_PNG.to_vec(),
                MediaType::fallback(),
            ))
        } else {
            let index = (call - 1) % responses.len();
            Ok(responses[index].clone())
        }
    }
}

impl Default for MockImageService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageGenerationService for MockImageService {
    async fn generate_image(&self, prompt: &str) -> Result<ImageAsset> {
        let call = {
            let mut count = self.generate_count.lock().unwrap();
            *count += 1;
            *count
        };
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());

        require_prompt(prompt)?;
        self.respond(call).await
    }

    async fn edit_image(
        &self,
        source: Option<&EncodedImage>,
        prompt: &str,
    ) -> Result<ImageAsset> {
        let call = {
            let mut count = self.edit_count.lock().unwrap();
            *count += 1;
            *count
        };
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        *self.last_source.lock().unwrap() = source.cloned();

        require_source(source)?;
        require_prompt(prompt)?;
        self.respond(call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_default_response_is_png() {
        let service = MockImageService::new();

        let asset = service.generate_image("a cat").await.unwrap();
        assert_eq!(asset.media_type().as_str(), "image/png");
        assert_eq!(asset.bytes(), DEFAULT_MOCK_PNG.as_slice());
    }

    #[tokio::test]
    async fn test_mock_custom_responses_cycle() {
        let jpeg = MediaType::parse("image/jpeg").unwrap();
        let service = MockImageService::new()
            .with_image_response(ImageAsset::new(vec![1], jpeg.clone()))
            .with_image_response(ImageAsset::new(vec![2], jpeg));

        assert_eq!(service.generate_image("a").await.unwrap().bytes(), &[1]);
        assert_eq!(service.generate_image("b").await.unwrap().bytes(), &[2]);
        // Should cycle back
        assert_eq!(service.generate_image("c").await.unwrap().bytes(), &[1]);
    }

    #[tokio::test]
    async fn test_mock_call_counts() {
        let service = MockImageService::new();
        assert_eq!(service.get_call_count(), 0);

        service.generate_image("test").await.unwrap();
        assert_eq!(service.get_generate_count(), 1);

        let err = service.edit_image(None, "test").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(service.get_edit_count(), 1);
        assert_eq!(service.get_call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_with_failure() {
        let service = MockImageService::new().with_failure(true);

        let err = service.generate_image("test").await.unwrap_err();
        assert!(matches!(err, Error::Service(_)));
    }

    #[tokio::test]
    async fn test_mock_gate_holds_until_released() {
        let gate = Arc::new(Semaphore::new(0));
        let service = MockImageService::new().with_gate(gate.clone());

        let held = service.clone();
        let handle = tokio::spawn(async move { held.generate_image("held").await });
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        gate.add_permits(1);
        assert!(handle.await.unwrap().is_ok());
    }
}
