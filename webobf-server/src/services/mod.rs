//! Business logic services for webobf-server

pub mod access_gate;
pub mod engine;
pub mod job_orchestrator;
pub mod session;
pub mod storage;

pub use engine::{CommandEngine, PassthroughEngine, TransformEngine};
pub use job_orchestrator::{EventSink, JobOrchestrator};
pub use session::ChannelSession;
pub use storage::Storage;
