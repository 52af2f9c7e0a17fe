//! Job orchestrator
//!
//! Drives one [`Job`] through its state machine:
//! RECEIVED → READING → (WRAPPING) → CONFIGURING → TRANSFORMING → PERSISTING → COMPLETED
//!
//! Each transition is announced to the owning connection with exactly one
//! `progress` event. Any failure is caught here and becomes exactly one `error`
//! event; nothing escapes to the caller.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use webobf_common::events::ChannelEvent;

use crate::error::JobError;
use crate::models::{ArtifactRef, Job, JobState};
use crate::presets;
use crate::services::access_gate;
use crate::services::engine::{self, TransformEngine, TransformationFailed};
use crate::services::storage::Storage;

/// Destination for one job's outbound events
pub trait EventSink: Send + Sync {
    /// Deliver `event`; returns `false` when the receiving side is gone
    fn emit(&self, event: ChannelEvent) -> bool;
}

impl EventSink for mpsc::UnboundedSender<ChannelEvent> {
    fn emit(&self, event: ChannelEvent) -> bool {
        self.send(event).is_ok()
    }
}

/// Announces transitions, keeping percentages monotonic
struct ProgressReporter<'a> {
    sink: &'a dyn EventSink,
    job_id: uuid::Uuid,
    last_percent: u8,
    receiver_gone: bool,
}

impl<'a> ProgressReporter<'a> {
    fn new(sink: &'a dyn EventSink, job_id: uuid::Uuid) -> Self {
        Self {
            sink,
            job_id,
            last_percent: 0,
            receiver_gone: false,
        }
    }

    fn send(&mut self, event: ChannelEvent) {
        if !self.sink.emit(event) && !self.receiver_gone {
            self.receiver_gone = true;
            tracing::info!(
                job_id = %self.job_id,
                "Client disconnected; job continues and its remaining events are discarded"
            );
        }
    }

    fn announce(&mut self, state: JobState, download: Option<String>) {
        if let Some((percent, status)) = state.progress() {
            let percent = percent.max(self.last_percent);
            self.last_percent = percent;
            self.send(ChannelEvent::Progress {
                percent,
                status: status.to_string(),
                download,
            });
        }
    }
}

/// Runs transformation jobs against injected storage and engine
#[derive(Clone)]
pub struct JobOrchestrator {
    storage: Storage,
    engine: Arc<dyn TransformEngine>,
    transform_permits: Option<Arc<Semaphore>>,
}

impl JobOrchestrator {
    /// Orchestrator without a concurrency cap on transformations
    pub fn new(storage: Storage, engine: Arc<dyn TransformEngine>) -> Self {
        Self {
            storage,
            engine,
            transform_permits: None,
        }
    }

    /// Allow at most `limit` jobs in TRANSFORMING at once; others wait their turn
    pub fn with_transform_limit(mut self, limit: usize) -> Self {
        self.transform_permits = Some(Arc::new(Semaphore::new(limit)));
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Drive `job` to a terminal state, reporting through `sink`
    ///
    /// Emits `progress` events in transition order, then exactly one `done`
    /// (on COMPLETED) or one `error` (on FAILED). Returns the terminal job.
    pub async fn run(&self, mut job: Job, sink: &dyn EventSink) -> Job {
        let started = Instant::now();
        let mut reporter = ProgressReporter::new(sink, job.job_id);

        tracing::info!(
            job_id = %job.job_id,
            file = %job.source_file,
            preset = ?job.preset_name,
            gated = job.passphrase.is_some(),
            "Starting transformation job"
        );

        match self.drive(&mut job, &mut reporter).await {
            Ok(artifact) => match job.complete(artifact.clone()) {
                Ok(_) => {
                    reporter.announce(JobState::Completed, Some(artifact.download.clone()));
                    reporter.send(ChannelEvent::Done {
                        download: artifact.download,
                        filename: artifact.filename.clone(),
                    });
                    tracing::info!(
                        job_id = %job.job_id,
                        artifact = %artifact.filename,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Created transformed file"
                    );
                }
                Err(e) => self.fail(&mut job, &mut reporter, JobError::from(e)),
            },
            Err(e) => self.fail(&mut job, &mut reporter, e),
        }

        job
    }

    fn fail(&self, job: &mut Job, reporter: &mut ProgressReporter<'_>, error: JobError) {
        let message = error.to_string();
        tracing::error!(
            job_id = %job.job_id,
            state = ?job.state,
            error = %message,
            "Transformation job failed"
        );
        if let Err(e) = job.fail(message.clone()) {
            tracing::error!(job_id = %job.job_id, error = %e, "Could not mark job as failed");
        }
        reporter.send(ChannelEvent::error(message));
    }

    async fn drive(
        &self,
        job: &mut Job,
        reporter: &mut ProgressReporter<'_>,
    ) -> Result<ArtifactRef, JobError> {
        // RECEIVED: the upload must exist before anything is announced
        let path = self
            .storage
            .locate_upload(&job.source_file)
            .await
            .ok_or_else(|| JobError::SourceNotFound(job.source_file.clone()))?;

        advance(job, reporter, JobState::Reading)?;
        let mut source = self
            .storage
            .read_upload(&path)
            .await
            .map_err(JobError::SourceUnreadable)?;

        if let Some(passphrase) = job.passphrase.clone() {
            advance(job, reporter, JobState::Wrapping)?;
            source = access_gate::wrap(&source, &passphrase);
        }

        advance(job, reporter, JobState::Configuring)?;
        let config = presets::resolve(job.preset_name.as_deref());
        tracing::debug!(job_id = %job.job_id, preset = config.preset.name(), "Preset resolved");

        advance(job, reporter, JobState::Transforming)?;
        let transformed = {
            let _permit = self.acquire_transform_permit().await?;
            let started = Instant::now();
            let text = engine::transform(self.engine.as_ref(), &source, &config).await?;
            tracing::debug!(
                job_id = %job.job_id,
                engine = self.engine.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                output_bytes = text.len(),
                "Transformation finished"
            );
            text
        };

        advance(job, reporter, JobState::Persisting)?;
        self.storage
            .write_artifact(&job.source_file, &transformed)
            .await
            .map_err(JobError::PersistenceFailed)
    }

    async fn acquire_transform_permit(
        &self,
    ) -> Result<Option<OwnedSemaphorePermit>, TransformationFailed> {
        match &self.transform_permits {
            Some(permits) => permits
                .clone()
                .acquire_owned()
                .await
                .map(Some)
                .map_err(|_| TransformationFailed {
                    engine: self.engine.name(),
                    message: "Transformation capacity is unavailable".to_string(),
                }),
            None => Ok(None),
        }
    }
}

/// Transition and announce
fn advance(
    job: &mut Job,
    reporter: &mut ProgressReporter<'_>,
    state: JobState,
) -> Result<(), JobError> {
    job.transition_to(state)?;
    reporter.announce(state, None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::PresetConfig;
    use crate::services::engine::{EngineError, EngineOutput, PassthroughEngine};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<ChannelEvent>>);

    impl EventSink for RecordingSink {
        fn emit(&self, event: ChannelEvent) -> bool {
            self.0.lock().unwrap().push(event);
            true
        }
    }

    impl RecordingSink {
        fn events(&self) -> Vec<ChannelEvent> {
            self.0.lock().unwrap().clone()
        }
    }

    struct BrokenEngine;

    #[async_trait]
    impl TransformEngine for BrokenEngine {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn run(&self, _: &str, _: &PresetConfig) -> Result<EngineOutput, EngineError> {
            Err(EngineError("Unsupported syntax".to_string()))
        }
    }

    async fn setup(engine: Arc<dyn TransformEngine>) -> (TempDir, JobOrchestrator) {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path().join("uploads"), temp.path().join("output"));
        storage.ensure_directories().await.unwrap();
        (temp, JobOrchestrator::new(storage, engine))
    }

    fn percents(events: &[ChannelEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                ChannelEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn completed_job_reports_every_transition_then_done() {
        let (_temp, orchestrator) = setup(Arc::new(PassthroughEngine)).await;
        let upload = orchestrator
            .storage()
            .store_upload("hello.js", b"console.log(1)")
            .await
            .unwrap();
        let sink = RecordingSink::default();

        let job = orchestrator
            .run(Job::new(upload.filename.clone(), Some("nova".into()), None), &sink)
            .await;

        assert_eq!(job.state, JobState::Completed);
        let events = sink.events();
        assert_eq!(percents(&events), vec![5, 25, 40, 90, 100]);
        match events.last().unwrap() {
            ChannelEvent::Done { download, filename } => {
                assert_eq!(download, &format!("/download/{}", filename));
                assert!(filename.starts_with("obf_"));
                assert!(filename.ends_with(&format!("_{}", upload.filename)));
            }
            other => panic!("expected done, got {:?}", other),
        }
        let artifact = job.artifact.unwrap();
        let path = orchestrator.storage().locate_artifact(&artifact.filename).await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "console.log(1)");
    }

    #[tokio::test]
    async fn passphrase_adds_wrapping_step() {
        let (_temp, orchestrator) = setup(Arc::new(PassthroughEngine)).await;
        let upload = orchestrator.storage().store_upload("a.js", b"run()").await.unwrap();
        let sink = RecordingSink::default();

        let job = orchestrator
            .run(Job::new(upload.filename, None, Some("secret".into())), &sink)
            .await;

        assert_eq!(percents(&sink.events()), vec![5, 15, 25, 40, 90, 100]);
        assert!(job.history.iter().any(|t| t.new_state == JobState::Wrapping));
        let path = orchestrator
            .storage()
            .locate_artifact(&job.artifact.unwrap().filename)
            .await
            .unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("rl.question("));
        assert!(text.contains("run()"));
    }

    #[tokio::test]
    async fn missing_source_fails_without_progress() {
        let (_temp, orchestrator) = setup(Arc::new(PassthroughEngine)).await;
        let sink = RecordingSink::default();

        let job = orchestrator
            .run(Job::new("999-nope.js".into(), None, None), &sink)
            .await;

        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.failed_from(), Some(JobState::Received));
        assert_eq!(
            sink.events(),
            vec![ChannelEvent::error("File not found on server.")]
        );
    }

    #[tokio::test]
    async fn engine_failure_halts_at_transforming() {
        let (_temp, orchestrator) = setup(Arc::new(BrokenEngine)).await;
        let upload = orchestrator.storage().store_upload("a.js", b"x").await.unwrap();
        let sink = RecordingSink::default();

        let job = orchestrator.run(Job::new(upload.filename, None, None), &sink).await;

        assert_eq!(job.failed_from(), Some(JobState::Transforming));
        assert_eq!(job.failure_reason.as_deref(), Some("Unsupported syntax"));
        let events = sink.events();
        assert_eq!(percents(&events), vec![5, 25, 40]);
        assert_eq!(events.last(), Some(&ChannelEvent::error("Unsupported syntax")));
        assert_eq!(
            events.iter().filter(|e| e.event_type() == "error").count(),
            1
        );
    }

    #[tokio::test]
    async fn persistence_failure_is_reported() {
        let (temp, orchestrator) = setup(Arc::new(PassthroughEngine)).await;
        let upload = orchestrator.storage().store_upload("a.js", b"x").await.unwrap();
        std::fs::remove_dir_all(temp.path().join("output")).unwrap();
        let sink = RecordingSink::default();

        let job = orchestrator.run(Job::new(upload.filename, None, None), &sink).await;

        assert_eq!(job.failed_from(), Some(JobState::Persisting));
        match sink.events().last().unwrap() {
            ChannelEvent::Error { message } => {
                assert!(message.starts_with("Failed to write output file"), "{}", message)
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn job_finishes_after_receiver_is_dropped() {
        let (_temp, orchestrator) = setup(Arc::new(PassthroughEngine)).await;
        let upload = orchestrator.storage().store_upload("a.js", b"x").await.unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let job = orchestrator.run(Job::new(upload.filename, None, None), &tx).await;

        assert_eq!(job.state, JobState::Completed);
    }

    #[tokio::test]
    async fn transform_limit_still_completes_jobs() {
        let (_temp, orchestrator) = setup(Arc::new(PassthroughEngine)).await;
        let orchestrator = orchestrator.with_transform_limit(1);
        let mut handles = Vec::new();
        for i in 0..4 {
            let orchestrator = orchestrator.clone();
            let upload = orchestrator
                .storage()
                .store_upload(&format!("{}.js", i), b"x")
                .await
                .unwrap();
            handles.push(tokio::spawn(async move {
                let sink = RecordingSink::default();
                orchestrator.run(Job::new(upload.filename, None, None), &sink).await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().state, JobState::Completed);
        }
    }

    #[test]
    fn reporter_never_lowers_percent() {
        let sink = RecordingSink::default();
        let mut reporter = ProgressReporter::new(&sink, uuid::Uuid::new_v4());

        reporter.announce(JobState::Transforming, None);
        reporter.announce(JobState::Reading, None);

        assert_eq!(percents(&sink.events()), vec![40, 40]);
    }
}
