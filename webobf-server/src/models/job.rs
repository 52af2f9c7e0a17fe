//! Transformation job state machine
//!
//! A job progresses strictly forward:
//! RECEIVED → READING → (WRAPPING) → CONFIGURING → TRANSFORMING → PERSISTING → COMPLETED
//!
//! FAILED is reachable from every non-terminal state. No state is re-entered and
//! a terminal job is never mutated again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    /// Start request accepted, upload not yet located
    Received,
    /// Loading the uploaded text
    Reading,
    /// Wrapping the source in a passphrase gate (only with a passphrase)
    Wrapping,
    /// Resolving the preset
    Configuring,
    /// Engine call in flight
    Transforming,
    /// Writing the artifact
    Persisting,
    /// Artifact available for download
    Completed,
    /// Job halted with an error
    Failed,
}

impl JobState {
    /// Progress percentage and status line announced when entering this state
    ///
    /// `None` for states that are not announced with a progress event
    /// (RECEIVED has nothing to report yet; FAILED is reported as an error).
    pub fn progress(&self) -> Option<(u8, &'static str)> {
        match self {
            JobState::Received | JobState::Failed => None,
            JobState::Reading => Some((5, "Reading file")),
            JobState::Wrapping => Some((15, "Preparing source (passphrase wrapper)")),
            JobState::Configuring => Some((25, "Selecting transformation preset")),
            JobState::Transforming => Some((40, "Transforming (this may take a while)")),
            JobState::Persisting => Some((90, "Writing output file")),
            JobState::Completed => Some((100, "Done")),
        }
    }

    /// Whether the state ends the job
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;

        match (self, next) {
            (Completed | Failed, _) => false,
            (_, Failed) => true,
            (Received, Reading)
            | (Reading, Wrapping)
            | (Reading, Configuring)
            | (Wrapping, Configuring)
            | (Configuring, Transforming)
            | (Transforming, Persisting)
            | (Persisting, Completed) => true,
            _ => false,
        }
    }
}

/// Recorded state transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub job_id: Uuid,
    pub old_state: JobState,
    pub new_state: JobState,
    pub transitioned_at: DateTime<Utc>,
}

/// Attempted transition that the state machine does not allow
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Illegal job transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub from: JobState,
    pub to: JobState,
}

/// Finished artifact location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Artifact filename under the output directory
    pub filename: String,
    /// `/download/<filename>`
    pub download: String,
}

impl ArtifactRef {
    pub fn new(filename: String) -> Self {
        let download = format!("/download/{}", filename);
        Self { filename, download }
    }
}

/// One transformation request (in-memory only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier (log correlation)
    pub job_id: Uuid,

    /// Current state
    pub state: JobState,

    /// Uploaded filename named by the start request
    pub source_file: String,

    /// Preset name exactly as requested
    pub preset_name: Option<String>,

    /// Passphrase for access-gate wrapping; empty is treated as absent
    #[serde(skip_serializing)]
    pub passphrase: Option<String>,

    /// Set on COMPLETED
    pub artifact: Option<ArtifactRef>,

    /// Set on FAILED
    pub failure_reason: Option<String>,

    /// Transitions taken so far, in order
    pub history: Vec<StateTransition>,

    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a job in RECEIVED state
    pub fn new(source_file: String, preset_name: Option<String>, passphrase: Option<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            state: JobState::Received,
            source_file,
            preset_name,
            passphrase: passphrase.filter(|p| !p.is_empty()),
            artifact: None,
            failure_reason: None,
            history: Vec::new(),
            created_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Move to `new_state` if the state machine allows it
    pub fn transition_to(&mut self, new_state: JobState) -> Result<StateTransition, IllegalTransition> {
        if !self.state.can_transition_to(new_state) {
            return Err(IllegalTransition {
                from: self.state,
                to: new_state,
            });
        }

        let transition = StateTransition {
            job_id: self.job_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;
        if new_state.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }
        self.history.push(transition.clone());

        Ok(transition)
    }

    /// Enter COMPLETED with the given artifact
    pub fn complete(&mut self, artifact: ArtifactRef) -> Result<StateTransition, IllegalTransition> {
        let transition = self.transition_to(JobState::Completed)?;
        self.artifact = Some(artifact);
        Ok(transition)
    }

    /// Enter FAILED with a human-readable reason
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<StateTransition, IllegalTransition> {
        let transition = self.transition_to(JobState::Failed)?;
        self.failure_reason = Some(reason.into());
        Ok(transition)
    }

    /// Whether the job has finished
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// State the job was in right before FAILED, if it failed
    pub fn failed_from(&self) -> Option<JobState> {
        self.history
            .iter()
            .rev()
            .find(|t| t.new_state == JobState::Failed)
            .map(|t| t.old_state)
    }
}
