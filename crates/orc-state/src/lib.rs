pub mod error;
pub mod factory;
pub mod idempotency;
pub mod keys;
pub mod memory;
pub mod merge;
pub mod redis_store;
pub mod store;
pub mod types;

pub use error::StateError;
pub use factory::{build_state_store, StateBackends};
pub use idempotency::IdempotencyStore;
pub use memory::InMemoryStateStore;
pub use redis_store::RedisStateStore;
pub use store::SharedStateStore;
pub use types::StateStats;
