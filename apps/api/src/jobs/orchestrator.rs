//! Job Orchestrator — accepts generation requests and drives each job from
//! `processing` to exactly one terminal state.
//!
//! Flow per job:
//!   submit (sync validation) → insert `processing` → spawn supervisor →
//!   wait for a render permit (FIFO) → compose → render under timeout →
//!   write artifact → `completed` | `failed`
//!
//! The supervisor task owns the outcome. The render runs in a separate task so
//! a panic, a timeout or a cancellation is observed by the supervisor and
//! written to the store; nothing escapes to the host process. The artifact
//! write happens in the supervisor after the render settles and is never
//! aborted halfway.
//!
//! Render slots are handed out by a single admission task in submission
//! order: `spawn_job` enqueues a ticket synchronously and the job's pipeline
//! waits for its permit on that ticket.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::compose::compose;
use crate::jobs::artifacts::ArtifactStore;
use crate::jobs::store::{JobStore, TransitionError};
use crate::models::job::{FailureKind, GenerationJob, JobFailure, JobId, OutputFormat};
use crate::models::payload::{DocumentPayload, PayloadError};
use crate::render::{PageOptions, Renderer};
use crate::templates::{resolve_theme, RegistryError, ThemeSelection};

/// Upper bound on payloads per batch submission.
pub const MAX_BATCH_SIZE: usize = 10;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("payloads[{index}]: {source}")]
    BatchPayload { index: usize, source: PayloadError },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Batch must contain at least one payload")]
    EmptyBatch,

    #[error("Batch of {got} payloads exceeds the limit of {max}")]
    BatchTooLarge { got: usize, max: usize },

    #[error("Service is shutting down")]
    ShuttingDown,
}

/// Renderer per output format.
#[derive(Clone)]
pub struct RendererSet {
    pub pdf: Arc<dyn Renderer>,
    pub html: Arc<dyn Renderer>,
}

impl RendererSet {
    pub fn for_format(&self, format: OutputFormat) -> Arc<dyn Renderer> {
        match format {
            OutputFormat::Pdf => Arc::clone(&self.pdf),
            OutputFormat::Html => Arc::clone(&self.html),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub render_timeout: Duration,
    pub max_concurrent_renders: usize,
    pub page_options: PageOptions,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            render_timeout: Duration::from_secs(60),
            max_concurrent_renders: 4,
            page_options: PageOptions::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub payload: DocumentPayload,
    pub template: String,
    pub theme: Option<String>,
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSubmission {
    /// Client-side grouping only; the store has no batch entity.
    pub batch_id: Uuid,
    pub job_ids: Vec<JobId>,
}

#[derive(Clone)]
pub struct JobOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    store: JobStore,
    artifacts: ArtifactStore,
    renderers: RendererSet,
    permits: Arc<Semaphore>,
    admission: mpsc::UnboundedSender<oneshot::Sender<OwnedSemaphorePermit>>,
    settings: OrchestratorSettings,
    cancellations: DashMap<JobId, CancellationToken>,
    shutdown: CancellationToken,
}

impl JobOrchestrator {
    /// Must be called from within a Tokio runtime; starts the admission task.
    pub fn new(
        store: JobStore,
        artifacts: ArtifactStore,
        renderers: RendererSet,
        settings: OrchestratorSettings,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_renders.max(1)));
        let shutdown = CancellationToken::new();
        let (admission, tickets) = mpsc::unbounded_channel();
        tokio::spawn(admit_in_order(
            Arc::clone(&permits),
            tickets,
            shutdown.clone(),
        ));

        Self {
            inner: Arc::new(Inner {
                store,
                artifacts,
                renderers,
                permits,
                admission,
                settings,
                cancellations: DashMap::new(),
                shutdown,
            }),
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.inner.store
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.inner.artifacts
    }

    pub fn renderer_name(&self, format: OutputFormat) -> &'static str {
        self.inner.renderers.for_format(format).name()
    }

    /// Render permits not currently held by a running job.
    pub fn idle_render_slots(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Validates the request, registers a `processing` record and schedules the
    /// render. Returns without waiting for any rendering work.
    pub fn submit(&self, request: GenerationRequest) -> Result<JobId, SubmitError> {
        self.ensure_accepting()?;
        request.payload.validate()?;
        let selection = resolve_theme(&request.template, request.theme.as_deref())?;

        Ok(self.spawn_job(request.payload, selection, request.format))
    }

    /// Submits up to `MAX_BATCH_SIZE` payloads sharing one template/theme.
    /// Everything is validated before the first job is created, so a rejected
    /// batch leaves no records behind.
    pub fn submit_batch(
        &self,
        payloads: Vec<DocumentPayload>,
        template: &str,
        theme: Option<&str>,
        format: OutputFormat,
    ) -> Result<BatchSubmission, SubmitError> {
        self.ensure_accepting()?;

        if payloads.is_empty() {
            return Err(SubmitError::EmptyBatch);
        }
        if payloads.len() > MAX_BATCH_SIZE {
            return Err(SubmitError::BatchTooLarge {
                got: payloads.len(),
                max: MAX_BATCH_SIZE,
            });
        }

        let selection = resolve_theme(template, theme)?;
        for (index, payload) in payloads.iter().enumerate() {
            payload
                .validate()
                .map_err(|source| SubmitError::BatchPayload { index, source })?;
        }

        let batch_id = Uuid::new_v4();
        let job_ids: Vec<JobId> = payloads
            .into_iter()
            .map(|payload| self.spawn_job(payload, selection.clone(), format))
            .collect();

        info!("Accepted batch {batch_id} with {} jobs", job_ids.len());
        Ok(BatchSubmission { batch_id, job_ids })
    }

    pub fn get_status(&self, job_id: &JobId) -> Option<GenerationJob> {
        self.inner.store.get(job_id)
    }

    /// Moves a processing job straight to `failed` (kind `cancelled`) and
    /// stops its render. The render future is dropped, which releases the browser.
    pub fn cancel(&self, job_id: &JobId) -> Result<GenerationJob, TransitionError> {
        let job = self.inner.store.fail(job_id, JobFailure::cancelled())?;
        if let Some((_, token)) = self.inner.cancellations.remove(job_id) {
            token.cancel();
        }
        info!("Cancelled job {job_id}");
        Ok(job)
    }

    /// Stops accepting work and cancels every in-flight job.
    pub fn shutdown(&self) {
        info!(
            "Cancelling {} in-flight jobs for shutdown",
            self.inner.cancellations.len()
        );
        self.inner.shutdown.cancel();
    }

    /// Drops terminal records older than `retention` and deletes their artifacts.
    pub async fn evict_expired(&self, retention: Duration) -> usize {
        let retention = chrono::Duration::from_std(retention)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        let evicted = self
            .inner
            .store
            .evict_expired(retention, chrono::Utc::now());

        for job in &evicted {
            if let Some(path) = job.artifact_path() {
                self.inner.artifacts.remove(Path::new(path)).await;
            }
        }
        if !evicted.is_empty() {
            info!("Evicted {} expired jobs", evicted.len());
        }
        evicted.len()
    }

    fn ensure_accepting(&self) -> Result<(), SubmitError> {
        if self.inner.shutdown.is_cancelled() {
            Err(SubmitError::ShuttingDown)
        } else {
            Ok(())
        }
    }

    fn spawn_job(
        &self,
        payload: DocumentPayload,
        selection: ThemeSelection,
        format: OutputFormat,
    ) -> JobId {
        let job_id = JobId::new();
        self.inner.store.insert(GenerationJob::processing(
            job_id,
            selection.template.name,
            selection.theme,
            format,
        ));

        let token = self.inner.shutdown.child_token();
        self.inner.cancellations.insert(job_id, token.clone());

        // Queue position is fixed here, before any task is scheduled.
        let (ticket, permit) = oneshot::channel();
        if self.inner.admission.send(ticket).is_err() {
            debug!("Admission queue closed before job {job_id} was queued");
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let work = tokio::spawn(run_pipeline(
                Arc::clone(&inner),
                job_id,
                permit,
                payload,
                selection,
                format,
            ));
            let outcome = match supervise(job_id, work, &token).await {
                Ok(bytes) => inner.store_artifact(job_id, format, bytes).await,
                Err(failure) => Err(failure),
            };
            inner.cancellations.remove(&job_id);
            inner.finish(job_id, format, outcome).await;
        });

        info!(
            "Accepted job {job_id} ({format:?}), {} render slots idle",
            self.idle_render_slots()
        );
        job_id
    }
}

/// Waits for the work task, converting panics and cancellation into failures.
async fn supervise(
    job_id: JobId,
    mut work: JoinHandle<Result<Bytes, JobFailure>>,
    token: &CancellationToken,
) -> Result<Bytes, JobFailure> {
    tokio::select! {
        biased;
        joined = &mut work => match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => {
                error!("Render task for job {job_id} panicked");
                Err(JobFailure::new(FailureKind::Internal, "Render task panicked"))
            }
            Err(_) => Err(JobFailure::cancelled()),
        },
        _ = token.cancelled() => {
            work.abort();
            Err(JobFailure::cancelled())
        }
    }
}

/// Hands out render permits strictly in ticket order until shutdown.
async fn admit_in_order(
    permits: Arc<Semaphore>,
    mut tickets: mpsc::UnboundedReceiver<oneshot::Sender<OwnedSemaphorePermit>>,
    shutdown: CancellationToken,
) {
    loop {
        let ticket = tokio::select! {
            _ = shutdown.cancelled() => break,
            ticket = tickets.recv() => match ticket {
                Some(ticket) => ticket,
                None => break,
            },
        };
        // The job was cancelled while queued.
        if ticket.is_closed() {
            continue;
        }
        let permit = tokio::select! {
            _ = shutdown.cancelled() => break,
            permit = Arc::clone(&permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };
        // A receiver gone by now drops the permit straight back.
        let _ = ticket.send(permit);
    }
    debug!("Admission queue stopped");
}

async fn run_pipeline(
    inner: Arc<Inner>,
    job_id: JobId,
    permit: oneshot::Receiver<OwnedSemaphorePermit>,
    payload: DocumentPayload,
    selection: ThemeSelection,
    format: OutputFormat,
) -> Result<Bytes, JobFailure> {
    // The admission queue only closes on shutdown.
    let _permit = permit.await.map_err(|_| JobFailure::cancelled())?;
    debug!("Job {job_id} acquired a render slot");

    let markup = compose(&payload, &selection).map_err(|e| {
        JobFailure::new(FailureKind::Internal, format!("Failed to compose document: {e}"))
    })?;
    let renderer = inner.renderers.for_format(format);
    let timeout = inner.settings.render_timeout;

    let bytes =
        match tokio::time::timeout(timeout, renderer.render(&markup, &inner.settings.page_options))
            .await
        {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return Err(JobFailure::new(FailureKind::Render, e.to_string())),
            Err(_) => {
                return Err(JobFailure::new(
                    FailureKind::Timeout,
                    format!("Render timed out after {timeout:?}"),
                ))
            }
        };

    if bytes.is_empty() {
        return Err(JobFailure::new(
            FailureKind::Render,
            "Renderer produced an empty document",
        ));
    }

    Ok(bytes)
}

impl Inner {
    /// Runs to completion even if the job is cancelled meanwhile; `finish`
    /// then discards the file.
    async fn store_artifact(
        &self,
        job_id: JobId,
        format: OutputFormat,
        bytes: Bytes,
    ) -> Result<PathBuf, JobFailure> {
        self.artifacts
            .write(job_id, format, bytes)
            .await
            .map_err(|e| JobFailure::new(FailureKind::Internal, format!("Failed to store artifact: {e}")))
    }

    async fn finish(
        &self,
        job_id: JobId,
        format: OutputFormat,
        outcome: Result<PathBuf, JobFailure>,
    ) {
        match outcome {
            Ok(path) => match self.store.complete(&job_id, path.display().to_string()) {
                Ok(_) => info!("Job {job_id} completed: {}", path.display()),
                Err(e) => {
                    // Cancelled while the artifact was being written.
                    debug!("Discarding artifact for job {job_id}: {e}");
                    self.artifacts.remove(&path).await;
                }
            },
            Err(failure) => {
                self.artifacts
                    .remove(&self.artifacts.path_for(job_id, format))
                    .await;
                match self.store.fail(&job_id, failure.clone()) {
                    Ok(_) => warn!(
                        "Job {job_id} failed ({:?}): {}",
                        failure.kind, failure.message
                    ),
                    Err(e) => debug!("Job {job_id} already terminal: {e}"),
                }
            }
        }
    }
}
