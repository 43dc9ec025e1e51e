use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}
