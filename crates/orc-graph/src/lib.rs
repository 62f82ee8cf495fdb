pub mod graph;
pub mod inputs;
pub mod secondary;
pub mod state;
pub mod validate;

pub use graph::{OrchestrationGraph, DEFAULT_MAX_TRANSITIONS};
pub use secondary::detect_secondary_intent;
pub use state::{GraphResult, OrchestratorState};
pub use validate::{validate_cross_agent_info, validate_input, validate_output, GENERIC_ERROR_REPLY};
