//! Application facade that the presentation layer drives.
//!
//! Holds one orchestrator per flow and the exporter, and exposes the
//! inbound operations (`submit_generate`, `submit_edit`, `request_download`)
//! plus read access to each flow's state.

use crate::ai::gemini::GeminiHttpClient;
use crate::ai::{GeminiImageClient, ImageGenerationService};
use crate::export::{DirectoryExporter, Exporter};
use crate::models::{Config, EditRequest, FlowKind, GenerationRequest, SourceFile};
use crate::orchestrator::{
    EditFlow, GenerateFlow, Orchestrator, OrchestratorState, PendingRequest, StateWatcher,
};
use crate::Result;
use std::fs;
use std::sync::Arc;
use tracing::{info, warn};

pub struct App {
    generate: Orchestrator<GenerateFlow>,
    edit: Orchestrator<EditFlow>,
    exporter: Box<dyn Exporter>,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub service: Arc<dyn ImageGenerationService>,
    pub exporter: Box<dyn Exporter>,
}

impl App {
    /// Build an app from concrete service dependencies.
    ///
    /// Both flows share the service but get their own orchestrator, so they
    /// never share mutable state.
    pub fn with_services(services: AppServices) -> Self {
        Self {
            generate: Orchestrator::new(GenerateFlow, services.service.clone()),
            edit: Orchestrator::new(EditFlow, services.service),
            exporter: services.exporter,
        }
    }

    /// Construct an app from environment configuration (`Config::from_env`).
    pub fn new() -> Result<Self> {
        let config = Config::from_env()?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut http =
            GeminiHttpClient::new(config.gemini_api_key.clone(), config.request_timeout)?;
        if let Some(base_url) = &config.gemini_base_url {
            info!("Using Gemini base URL override: {}", base_url);
            http = http.with_base_url(base_url.clone());
        }

        let service = GeminiImageClient::new(
            http,
            config.generation_model.clone(),
            config.edit_model.clone(),
        );
        info!(
            "Image models: generation={}, edit={}",
            service.generation_model(),
            service.edit_model()
        );

        if let Err(e) = fs::create_dir_all(&config.download_dir) {
            // Surfaces later as a platform error on the first download.
            warn!(
                "Could not create download directory {}: {}",
                config.download_dir.display(),
                e
            );
        }

        Ok(Self::with_services(AppServices {
            service: Arc::new(service),
            exporter: Box::new(DirectoryExporter::new(&config.download_dir)),
        }))
    }

    pub fn submit_generate(&self, prompt: impl Into<String>) -> Result<PendingRequest> {
        self.generate.submit(GenerationRequest::new(prompt))
    }

    pub fn submit_edit(
        &self,
        prompt: impl Into<String>,
        source: Option<SourceFile>,
    ) -> Result<PendingRequest> {
        self.edit.submit(EditRequest::new(prompt, source))
    }

    /// Saves the flow's current result, returning the file name used.
    pub async fn request_download(&self, flow: FlowKind) -> Result<String> {
        match flow {
            FlowKind::Generate => self.generate.export(self.exporter.as_ref()).await,
            FlowKind::Edit => self.edit.export(self.exporter.as_ref()).await,
        }
    }

    pub fn state(&self, flow: FlowKind) -> OrchestratorState {
        match flow {
            FlowKind::Generate => self.generate.state(),
            FlowKind::Edit => self.edit.state(),
        }
    }

    pub fn watch(&self, flow: FlowKind) -> StateWatcher {
        match flow {
            FlowKind::Generate => self.generate.subscribe(),
            FlowKind::Edit => self.edit.subscribe(),
        }
    }

    pub fn user_message(&self, flow: FlowKind) -> Option<&'static str> {
        match flow {
            FlowKind::Generate => self.generate.user_message(),
            FlowKind::Edit => self.edit.user_message(),
        }
    }

    /// Returns a settled flow to `Idle`, e.g. when its view is closed.
    pub fn reset(&self, flow: FlowKind) -> Result<()> {
        match flow {
            FlowKind::Generate => self.generate.reset(),
            FlowKind::Edit => self.edit.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{App, AppServices};
    use crate::ai::MockImageService;
    use crate::export::MockExporter;
    use crate::models::{Config, FlowKind, SourceFile};
    use crate::orchestrator::OrchestratorState;
    use crate::ErrorKind;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    fn build_test_app(service: MockImageService, exporter: MockExporter) -> App {
        App::with_services(AppServices {
            service: Arc::new(service),
            exporter: Box::new(exporter),
        })
    }

    #[tokio::test]
    async fn test_generate_then_download() {
        let exporter = MockExporter::new();
        let app = build_test_app(MockImageService::new(), exporter.clone());

        let outcome = app
            .submit_generate("A photorealistic cat")
            .unwrap()
            .outcome()
            .await;
        assert!(outcome.is_success());

        let name = app.request_download(FlowKind::Generate).await.unwrap();
        assert_eq!(name, "a_photorealistic_cat.jpeg");
        assert_eq!(exporter.get_save_count(), 1);
        assert_eq!(app.state(FlowKind::Edit), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn test_edit_pending_does_not_block_generate() {
        let gate = Arc::new(Semaphore::new(0));
        let service = MockImageService::new().with_gate(gate.clone());
        let app = build_test_app(service, MockExporter::new());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"\x89PNG\r\n\x1a\n").unwrap();

        let editing = app
            .submit_edit("add a retro filter", Some(SourceFile::new(file.path())))
            .unwrap();
        let generating = app.submit_generate("a cat").unwrap();
        assert!(app.state(FlowKind::Edit).is_pending());
        assert!(app.state(FlowKind::Generate).is_pending());

        let err = app.submit_generate("another cat").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ConcurrentRequest);

        gate.add_permits(2);
        let (edited, generated) = tokio::join!(editing.outcome(), generating.outcome());
        assert!(edited.is_success());
        assert!(generated.is_success());
    }

    #[tokio::test]
    async fn test_download_failure_surfaces_platform_error() {
        let app = build_test_app(MockImageService::new(), MockExporter::new().with_failure(true));

        app.submit_generate("a cat").unwrap().outcome().await;
        let err = app.request_download(FlowKind::Generate).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Platform);
        assert!(app.state(FlowKind::Generate).image().is_some());
    }

    #[tokio::test]
    async fn test_user_message_and_reset() {
        let app = build_test_app(MockImageService::new(), MockExporter::new());

        app.submit_edit("", None).unwrap().outcome().await;
        assert_eq!(
            app.user_message(FlowKind::Edit),
            Some("Please upload an image and enter an editing prompt.")
        );
        assert_eq!(app.user_message(FlowKind::Generate), None);

        app.reset(FlowKind::Edit).unwrap();
        assert_eq!(app.state(FlowKind::Edit), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn test_from_config_creates_download_dir() {
        let dir = tempfile::tempdir().unwrap();
        let download_dir = dir.path().join("downloads");
        let config = Config {
            gemini_api_key: "key".to_string(),
            gemini_base_url: Some("http://127.0.0.1:9".to_string()),
            generation_model: "imagen-test".to_string(),
            edit_model: "gemini-image-test".to_string(),
            download_dir: download_dir.clone(),
            request_timeout: Duration::from_secs(1),
        };

        let app = App::from_config(&config).unwrap();
        assert!(download_dir.is_dir());
        assert_eq!(app.state(FlowKind::Generate), OrchestratorState::Idle);
    }
}
