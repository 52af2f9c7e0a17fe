//! Per-connection channel session
//!
//! Owns the outbound event queue of one real-time connection and at most one
//! running job. Jobs never share a queue, so events of one connection can never
//! reach another.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use webobf_common::events::{ChannelEvent, InboundEvent, StartRequest};

use crate::models::Job;
use crate::services::job_orchestrator::{EventSink, JobOrchestrator};

/// Error sent when a second `start` arrives while a job is still running
pub const JOB_ALREADY_RUNNING: &str = "A job is already running on this connection";

/// Counts a running job for as long as it lives
struct ActiveJobGuard(Arc<AtomicUsize>);

impl ActiveJobGuard {
    fn acquire(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveJobGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// State of one real-time connection
pub struct ChannelSession {
    session_id: Uuid,
    orchestrator: JobOrchestrator,
    outbound: mpsc::UnboundedSender<ChannelEvent>,
    active_jobs: Arc<AtomicUsize>,
    running: Option<(Uuid, JoinHandle<Job>)>,
}

impl ChannelSession {
    pub fn new(
        orchestrator: JobOrchestrator,
        outbound: mpsc::UnboundedSender<ChannelEvent>,
        active_jobs: Arc<AtomicUsize>,
    ) -> Self {
        let session_id = Uuid::new_v4();
        info!(session_id = %session_id, "Channel connected");
        Self {
            session_id,
            orchestrator,
            outbound,
            active_jobs,
            running: None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Whether a job started on this connection has not finished yet
    pub fn is_busy(&self) -> bool {
        self.running
            .as_ref()
            .map_or(false, |(_, handle)| !handle.is_finished())
    }

    /// Dispatch one inbound text frame
    ///
    /// A frame that is not a valid inbound event is answered with an `error`
    /// event; the connection stays open.
    pub fn handle_frame(&mut self, frame: &str) {
        match InboundEvent::from_frame(frame) {
            Ok(InboundEvent::Start(request)) => self.start(request),
            Err(e) => {
                debug!(session_id = %self.session_id, error = %e, "Malformed frame");
                self.reject(format!("Malformed event: {}", e));
            }
        }
    }

    /// Start a job for `request` unless one is already running
    pub fn start(&mut self, request: StartRequest) {
        if self.is_busy() {
            warn!(session_id = %self.session_id, file = %request.file, "Start rejected; job in progress");
            self.reject(JOB_ALREADY_RUNNING);
            return;
        }

        let job = Job::new(request.file, request.preset, request.password);
        let job_id = job.job_id;
        let orchestrator = self.orchestrator.clone();
        let sink = self.outbound.clone();
        let guard = ActiveJobGuard::acquire(Arc::clone(&self.active_jobs));

        debug!(session_id = %self.session_id, job_id = %job_id, "Job accepted");
        let handle = tokio::spawn(async move {
            let _guard = guard;
            orchestrator.run(job, &sink).await
        });
        self.running = Some((job_id, handle));
    }

    /// Send an `error` event that is not tied to a job
    pub fn reject(&self, message: impl Into<String>) {
        if !self.outbound.emit(ChannelEvent::error(message)) {
            debug!(session_id = %self.session_id, "Rejection dropped; channel closed");
        }
    }

    /// Connection closed; a running job is left to finish on its own
    pub fn close(self) {
        match self.running {
            Some((job_id, handle)) if !handle.is_finished() => info!(
                session_id = %self.session_id,
                job_id = %job_id,
                "Channel disconnected with job in progress; job will finish and its events are discarded"
            ),
            _ => info!(session_id = %self.session_id, "Channel disconnected"),
        }
    }

    /// Wait for the current job, if any (used by tests and shutdown)
    pub async fn join(&mut self) -> Option<Job> {
        let (_, handle) = self.running.take()?;
        match handle.await {
            Ok(job) => Some(job),
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Job task ended abnormally");
                None
            }
        }
    }
}
