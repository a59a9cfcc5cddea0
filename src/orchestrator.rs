//! Per-flow request orchestration.
//!
//! An [`Orchestrator`] owns one flow's [`OrchestratorState`] and is the only
//! thing that mutates it:
//!
//! ```text
//! Idle -> Pending -> Succeeded | Failed -> (reset) Idle
//! ```
//!
//! A submission is validated synchronously, then runs as one spawned task
//! whose [`PendingRequest`] handle settles exactly once. While a flow is
//! `Pending`, further submissions are rejected with
//! [`Error::ConcurrentRequest`] and the in-flight request is left alone.
//! Failures never escape as faults; they become `Failed(kind)`.

use crate::ai::{require_prompt, ImageGenerationService};
use crate::codec;
use crate::export::{export_name, ExportSource, Exporter};
use crate::models::{EditRequest, FlowKind, GenerationRequest, ImageAsset, RequestOutcome};
use crate::{Error, ErrorKind, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Pending,
    Succeeded(ImageAsset),
    Failed(ErrorKind),
}

impl OrchestratorState {
    pub fn is_pending(&self) -> bool {
        matches!(self, OrchestratorState::Pending)
    }

    pub fn image(&self) -> Option<&ImageAsset> {
        match self {
            OrchestratorState::Succeeded(image) => Some(image),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<ErrorKind> {
        match self {
            OrchestratorState::Failed(kind) => Some(*kind),
            _ => None,
        }
    }
}

/// State plus the prompt that produced a success, published together.
#[derive(Debug, Clone)]
struct Slot {
    state: OrchestratorState,
    prompt: Option<String>,
}

impl Slot {
    fn idle() -> Self {
        Self {
            state: OrchestratorState::Idle,
            prompt: None,
        }
    }

    fn pending() -> Self {
        Self {
            state: OrchestratorState::Pending,
            prompt: None,
        }
    }

    fn failed(kind: ErrorKind) -> Self {
        Self {
            state: OrchestratorState::Failed(kind),
            prompt: None,
        }
    }

    fn succeeded(image: ImageAsset, prompt: String) -> Self {
        Self {
            state: OrchestratorState::Succeeded(image),
            prompt: Some(prompt),
        }
    }
}

/// What differs between the Generate and Edit pipelines.
#[async_trait]
pub trait Flow: Send + Sync + 'static {
    type Input: Send + 'static;

    fn kind(&self) -> FlowKind;

    fn prompt<'a>(&self, input: &'a Self::Input) -> &'a str;

    /// Synchronous checks made before anything is dispatched.
    fn validate(&self, input: &Self::Input) -> Result<()>;

    async fn run(
        &self,
        service: &dyn ImageGenerationService,
        input: Self::Input,
    ) -> Result<ImageAsset>;

    fn export_source<'a>(&self, prompt: &'a str, image: &'a ImageAsset) -> ExportSource<'a>;

    fn user_message(&self, kind: ErrorKind) -> &'static str;
}

fn shared_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Io => "Could not read the selected file.",
        ErrorKind::Platform => "Could not save the image.",
        ErrorKind::ConcurrentRequest => "A request is already in progress.",
        ErrorKind::InvalidInput | ErrorKind::Service => "Something went wrong. Please try again.",
    }
}

/// Text-to-image.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateFlow;

#[async_trait]
impl Flow for GenerateFlow {
    type Input = GenerationRequest;

    fn kind(&self) -> FlowKind {
        FlowKind::Generate
    }

    fn prompt<'a>(&self, input: &'a GenerationRequest) -> &'a str {
        &input.prompt
    }

    fn validate(&self, input: &GenerationRequest) -> Result<()> {
        require_prompt(&input.prompt).map(|_| ())
    }

    async fn run(
        &self,
        service: &dyn ImageGenerationService,
        input: GenerationRequest,
    ) -> Result<ImageAsset> {
        service.generate_image(&input.prompt).await
    }

    fn export_source<'a>(&self, prompt: &'a str, _image: &'a ImageAsset) -> ExportSource<'a> {
        ExportSource::Generated { prompt }
    }

    fn user_message(&self, kind: ErrorKind) -> &'static str {
        match kind {
            ErrorKind::InvalidInput => "Please enter a prompt.",
            ErrorKind::Service => "Failed to generate image. Please try again.",
            other => shared_message(other),
        }
    }
}

/// Prompt plus source image.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditFlow;

#[async_trait]
impl Flow for EditFlow {
    type Input = EditRequest;

    fn kind(&self) -> FlowKind {
        FlowKind::Edit
    }

    fn prompt<'a>(&self, input: &'a EditRequest) -> &'a str {
        &input.prompt
    }

    fn validate(&self, input: &EditRequest) -> Result<()> {
        if input.source.is_none() {
            return Err(Error::InvalidInput("source image is required".to_string()));
        }
        require_prompt(&input.prompt).map(|_| ())
    }

    async fn run(
        &self,
        service: &dyn ImageGenerationService,
        input: EditRequest,
    ) -> Result<ImageAsset> {
        let source = input
            .source
            .ok_or_else(|| Error::InvalidInput("source image is required".to_string()))?;
        let encoded = codec::encode_file(&source).await?;
        service.edit_image(Some(&encoded), &input.prompt).await
    }

    fn export_source<'a>(&self, _prompt: &'a str, image: &'a ImageAsset) -> ExportSource<'a> {
        ExportSource::Edited {
            media_type: image.media_type(),
        }
    }

    fn user_message(&self, kind: ErrorKind) -> &'static str {
        match kind {
            ErrorKind::InvalidInput => "Please upload an image and enter an editing prompt.",
            ErrorKind::Service => "Failed to edit image. Please try again.",
            other => shared_message(other),
        }
    }
}

/// Handle to one submission. Dropping it does not cancel the request.
pub struct PendingRequest {
    flow: FlowKind,
    settlement: Settlement,
}

enum Settlement {
    Ready(RequestOutcome),
    Running(JoinHandle<RequestOutcome>),
}

impl PendingRequest {
    fn ready(flow: FlowKind, outcome: RequestOutcome) -> Self {
        Self {
            flow,
            settlement: Settlement::Ready(outcome),
        }
    }

    pub fn flow(&self) -> FlowKind {
        self.flow
    }

    pub fn is_settled(&self) -> bool {
        match &self.settlement {
            Settlement::Ready(_) => true,
            Settlement::Running(handle) => handle.is_finished(),
        }
    }

    /// Waits for the request to settle.
    pub async fn outcome(self) -> RequestOutcome {
        match self.settlement {
            Settlement::Ready(outcome) => outcome,
            Settlement::Running(handle) => handle.await.unwrap_or_else(|e| {
                error!("[{}] Request task ended abnormally: {}", self.flow, e);
                RequestOutcome::Failure(ErrorKind::Service)
            }),
        }
    }
}

/// Moves the flow out of `Pending` even if the request task dies.
struct SettleGuard {
    slot: Arc<watch::Sender<Slot>>,
    flow: FlowKind,
    armed: bool,
}

impl SettleGuard {
    fn settle(mut self, next: Slot) {
        self.armed = false;
        self.slot.send_modify(|slot| *slot = next);
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if self.armed {
            error!("[{}] Request task dropped before settling", self.flow);
            self.slot
                .send_modify(|slot| *slot = Slot::failed(ErrorKind::Service));
        }
    }
}

/// Read-only view of a flow's state for the presentation layer.
pub struct StateWatcher {
    rx: watch::Receiver<Slot>,
}

impl StateWatcher {
    pub fn current(&self) -> OrchestratorState {
        self.rx.borrow().state.clone()
    }

    /// Waits for the next transition. `None` once the orchestrator is gone.
    pub async fn changed(&mut self) -> Option<OrchestratorState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().state.clone())
    }
}

pub struct Orchestrator<F: Flow> {
    flow: Arc<F>,
    service: Arc<dyn ImageGenerationService>,
    slot: Arc<watch::Sender<Slot>>,
}

impl<F: Flow> Orchestrator<F> {
    pub fn new(flow: F, service: Arc<dyn ImageGenerationService>) -> Self {
        let (slot, _) = watch::channel(Slot::idle());
        Self {
            flow: Arc::new(flow),
            service,
            slot: Arc::new(slot),
        }
    }

    pub fn kind(&self) -> FlowKind {
        self.flow.kind()
    }

    pub fn state(&self) -> OrchestratorState {
        self.slot.borrow().state.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.slot.borrow().state.is_pending()
    }

    /// User-facing text for the current failure, if the flow has failed.
    pub fn user_message(&self) -> Option<&'static str> {
        self.slot
            .borrow()
            .state
            .error()
            .map(|kind| self.flow.user_message(kind))
    }

    pub fn subscribe(&self) -> StateWatcher {
        StateWatcher {
            rx: self.slot.subscribe(),
        }
    }

    /// Starts a request. Must be called from within a tokio runtime.
    ///
    /// Invalid input settles immediately as `Failed(InvalidInput)` without
    /// reaching the service. The only error returned here is
    /// [`Error::ConcurrentRequest`].
    pub fn submit(&self, input: F::Input) -> Result<PendingRequest> {
        let kind = self.flow.kind();

        if let Err(e) = self.flow.validate(&input) {
            let failure = e.kind();
            let applied = self.slot.send_if_modified(|slot| {
                if slot.state.is_pending() {
                    return false;
                }
                *slot = Slot::failed(failure);
                true
            });
            if !applied {
                warn!("[{}] Rejected submission while a request is pending", kind);
                return Err(Error::ConcurrentRequest(kind));
            }
            warn!("[{}] Invalid submission: {}", kind, e);
            return Ok(PendingRequest::ready(kind, RequestOutcome::Failure(failure)));
        }

        let entered = self.slot.send_if_modified(|slot| {
            if slot.state.is_pending() {
                return false;
            }
            *slot = Slot::pending();
            true
        });
        if !entered {
            warn!("[{}] Rejected submission while a request is pending", kind);
            return Err(Error::ConcurrentRequest(kind));
        }

        info!("[{}] Request pending", kind);

        let guard = SettleGuard {
            slot: self.slot.clone(),
            flow: kind,
            armed: true,
        };
        let flow = self.flow.clone();
        let service = self.service.clone();
        let prompt = self.flow.prompt(&input).to_string();

        let handle = tokio::spawn(async move {
            let (next, outcome) = match flow.run(service.as_ref(), input).await {
                Ok(image) => {
                    info!(
                        "[{}] Request succeeded ({} bytes, {})",
                        kind,
                        image.bytes().len(),
                        image.media_type()
                    );
                    let outcome = RequestOutcome::Success(image.clone());
                    (Slot::succeeded(image, prompt), outcome)
                }
                Err(e) => {
                    error!("[{}] Request failed: {}", kind, e);
                    let failure = e.kind();
                    (Slot::failed(failure), RequestOutcome::Failure(failure))
                }
            };
            guard.settle(next);
            outcome
        });

        Ok(PendingRequest {
            flow: kind,
            settlement: Settlement::Running(handle),
        })
    }

    /// Returns a settled flow to `Idle`.
    pub fn reset(&self) -> Result<()> {
        let reset = self.slot.send_if_modified(|slot| {
            if slot.state.is_pending() {
                return false;
            }
            *slot = Slot::idle();
            true
        });
        if reset {
            Ok(())
        } else {
            Err(Error::ConcurrentRequest(self.flow.kind()))
        }
    }

    /// Saves the current result and returns the name it was saved under.
    ///
    /// Export failures are returned to the caller and leave the flow's state
    /// untouched.
    pub async fn export(&self, exporter: &dyn Exporter) -> Result<String> {
        let (image, prompt) = {
            let slot = self.slot.borrow();
            match &slot.state {
                OrchestratorState::Succeeded(image) => {
                    (image.clone(), slot.prompt.clone().unwrap_or_default())
                }
                _ => {
                    return Err(Error::InvalidInput(format!(
                        "No {} result to download",
                        self.flow.kind()
                    )))
                }
            }
        };

        let filename = export_name(self.flow.export_source(&prompt, &image));
        exporter.trigger_save(&image, &filename).await?;
        info!("[{}] Exported result as {}", self.flow.kind(), filename);
        Ok(filename)
    }
}
