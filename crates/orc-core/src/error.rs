use thiserror::Error;

/// Top-level error for the orchestration service.
///
/// Every variant carries a stable `.code()` so the webhook layer can map
/// failures to a wire-safe string without leaking internal detail.
#[derive(Debug, Error)]
pub enum OrcError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown tenant: {company_id}")]
    UnknownTenant { company_id: String },

    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("tool execution failed ({tool}): {reason}")]
    ToolFailure { tool: String, reason: String },

    #[error("external call timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl OrcError {
    /// Short error code string, stable across releases, safe to expose.
    pub fn code(&self) -> &'static str {
        match self {
            OrcError::Config(_) => "CONFIG_ERROR",
            OrcError::UnknownTenant { .. } => "UNKNOWN_TENANT",
            OrcError::InputInvalid(_) => "INPUT_INVALID",
            OrcError::Database(_) => "DATABASE_ERROR",
            OrcError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            OrcError::LlmProvider(_) => "LLM_PROVIDER_ERROR",
            OrcError::ToolFailure { .. } => "TOOL_FAILURE",
            OrcError::Timeout { .. } => "TIMEOUT",
            OrcError::Serialization(_) => "SERIALIZATION_ERROR",
            OrcError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, OrcError>;
