pub mod action;
pub mod orchestrator;
pub mod types;

pub use action::{Compensator, Executor, PendingAction};
pub use orchestrator::CompensationOrchestrator;
pub use types::{ActionRecord, ActionStatus, Saga, SagaOutcome};
