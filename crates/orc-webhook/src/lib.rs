pub mod handler;
pub mod outbound;
pub mod payload;

pub use handler::{webhook_handler, WebhookState};
