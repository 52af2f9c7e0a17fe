//! Data models for webobf-server
//!
//! - Transformation job state machine
//! - Uploaded file identity

pub mod job;
pub mod uploaded_file;

pub use job::{ArtifactRef, IllegalTransition, Job, JobState, StateTransition};
pub use uploaded_file::UploadedFile;
