pub mod phase;
pub mod runner;
pub mod state;

pub use phase::{BuildPhase, PhaseEvent};
pub use runner::{FailureReason, OrchestratorSettings, PhaseOrchestrator, RunReport};
pub use state::{BuildState, PLAN_FILE, STATE_FILE, StateStore};
