//! Autopilot error types

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AutopilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Observation error: {0}")]
    Observation(String),

    #[error("Board not found: {0}")]
    BoardNotFound(String),

    #[error("Session lost: {0}")]
    SessionLost(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Engine not found: {0}")]
    EngineMissing(String),

    #[error("Engine not executable: {0}")]
    EnginePermission(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Actuation error: {0}")]
    Actuation(String),

    #[error("Notation error: {0}")]
    Notation(#[from] chess_core::NotationError),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl AutopilotError {
    /// Errors that mean the remote session or its transport is gone, as
    /// opposed to a single read that came back empty or malformed.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::SessionLost(_) | Self::Transport(_))
    }

    pub fn is_engine(&self) -> bool {
        matches!(
            self,
            Self::EngineMissing(_) | Self::EnginePermission(_) | Self::Engine(_)
        )
    }

    /// Attribute a failed oracle call to the engine.
    pub fn into_engine(self) -> Self {
        if self.is_engine() {
            self
        } else {
            Self::Engine(self.to_string())
        }
    }
}

/// Run a collaborator call with a deadline; an elapsed deadline is a failure.
pub async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, AutopilotError>
where
    F: std::future::Future<Output = Result<T, AutopilotError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AutopilotError::Timeout(limit)),
    }
}
