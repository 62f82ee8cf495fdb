pub mod db;
pub mod error;
pub mod log;
pub mod types;

pub use db::init_db;
pub use error::{AuditError, Result};
pub use log::AuditLog;
pub use types::{AuditEntry, AuditStatus};
