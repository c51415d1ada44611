use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to subscribe to service changes: {0}")]
    Subscribe(String),
    #[error("failed to persist settings: {0}")]
    Persist(String),
    #[error("service '{service}': {message}")]
    ServiceAction { service: String, message: String },
}

impl MonitorError {
    pub fn persist(err: impl std::fmt::Display) -> Self {
        Self::Persist(err.to_string())
    }
}
