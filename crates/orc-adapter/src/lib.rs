pub mod adapter;
pub mod handler;
pub mod stats;
pub mod types;

pub use adapter::{AgentAdapter, InputValidator, OutputValidator};
pub use handler::Handler;
pub use stats::AdapterStats;
pub use types::{AdapterStatsSnapshot, ExecutionState, ExecutionStatus, InvokeResult, ValidationOutcome};
