use super::Exporter;
use crate::models::ImageAsset;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Records saves in memory instead of touching the platform.
#[derive(Clone)]
pub struct MockExporter {
    saved: Arc<Mutex<Vec<(String, ImageAsset)>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockExporter {
    pub fn new() -> Self {
        Self {
            saved: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_save_count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }

    pub fn saved_names(&self) -> Vec<String> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn get_saved(&self) -> Vec<(String, ImageAsset)> {
        self.saved.lock().unwrap().clone()
    }
}

impl Default for MockExporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Exporter for MockExporter {
    async fn trigger_save(&self, image: &ImageAsset, filename: &str) -> Result<()> {
        if *self.should_fail.lock().unwrap() {
            return Err(Error::Platform("Mock save failure".to_string()));
        }

        self.saved
            .lock()
            .unwrap()
            .push((filename.to_string(), image.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::MediaType;

    #[tokio::test]
    async fn test_mock_records_each_save() {
        let exporter = MockExporter::new();
        let image = ImageAsset::new(vec![1, 2], MediaType::fallback());

        exporter.trigger_save(&image, "one.png").await.unwrap();
        exporter.trigger_save(&image, "two.png").await.unwrap();

        assert_eq!(exporter.get_save_count(), 2);
        assert_eq!(exporter.saved_names(), vec!["one.png", "two.png"]);
        assert!(exporter.get_saved().iter().all(|(_, saved)| *saved == image));
    }

    #[tokio::test]
    async fn test_mock_with_failure() {
        let exporter = MockExporter::new().with_failure(true);
        let image = ImageAsset::new(vec![1], MediaType::fallback());

        let err = exporter.trigger_save(&image, "x.png").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Platform);
        assert_eq!(exporter.get_save_count(), 0);
    }
}
