pub mod orchestrator;
pub mod source;

pub use orchestrator::{OrchestratorConfig, StopRule, StreamingOrchestrator, TickOutcome};
pub use source::{ObservationStream, ReplaySource, SimulatedTickSource};
