use super::Exporter;
use crate::models::ImageAsset;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Saves downloads into a directory, the way a browser drops them into the
/// user's download folder.
pub struct DirectoryExporter {
    download_dir: PathBuf,
}

impl DirectoryExporter {
    pub fn new(download_dir: &Path) -> Self {
        Self {
            download_dir: download_dir.to_path_buf(),
        }
    }
}

#[async_trait]
impl Exporter for DirectoryExporter {
    async fn trigger_save(&self, image: &ImageAsset, filename: &str) -> Result<()> {
        let is_plain_name = Path::new(filename)
            .file_name()
            .is_some_and(|name| name == filename);
        if !is_plain_name {
            return Err(Error::Platform(format!(
                "Refusing to save outside the download directory: {}",
                filename
            )));
        }

        let is_dir = tokio::fs::metadata(&self.download_dir)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(Error::Platform(format!(
                "Download directory is unavailable: {}",
                self.download_dir.display()
            )));
        }

        let path = self.download_dir.join(filename);
        tokio::fs::write(&path, image.bytes()).await.map_err(|e| {
            tracing::error!("Failed to save {}: {}", path.display(), e);
            Error::Platform(format!("Failed to save {}: {}", path.display(), e))
        })?;

        tracing::info!(
            "Saved {} ({} bytes) to {}",
            image.media_type(),
            image.bytes().len(),
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::MediaType;
    use tempfile::TempDir;

    fn test_image() -> ImageAsset {
        ImageAsset::new(vec![0xFF, 0xD8, 0xFF], MediaType::parse("image/jpeg").unwrap())
    }

    #[tokio::test]
    async fn test_save_writes_file() {
        let dir = TempDir::new().unwrap();
        let exporter = DirectoryExporter::new(dir.path());

        exporter
            .trigger_save(&test_image(), "a_cat.jpeg")
            .await
            .unwrap();

        let saved = std::fs::read(dir.path().join("a_cat.jpeg")).unwrap();
        assert_eq!(saved, vec![0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_platform_error() {
        let dir = TempDir::new().unwrap();
        let exporter = DirectoryExporter::new(&dir.path().join("gone"));

        let err = exporter
            .trigger_save(&test_image(), "a_cat.jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Platform(_)));
    }

    #[tokio::test]
    async fn test_path_like_filename_is_rejected() {
        let dir = TempDir::new().unwrap();
        let exporter = DirectoryExporter::new(dir.path());

        let err = exporter
            .trigger_save(&test_image(), "../escape.jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Platform(_)));
    }
}
