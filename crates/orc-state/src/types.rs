use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateStats {
    pub backend: &'static str,
    pub key_count: u64,
}
