pub mod render;
pub mod resolver;
pub mod types;

pub use render::{render, RenderVars};
pub use resolver::{PromptResolver, StaticPromptResolver, StoredPrompt, EMERGENCY_TEMPLATE};
pub use types::{Provenance, PromptTemplate};
