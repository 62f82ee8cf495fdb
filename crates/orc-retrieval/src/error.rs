use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("vector backend unavailable: {0}")]
    Unavailable(String),
}
