use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned an error: {0}")]
    Backend(String),
}
