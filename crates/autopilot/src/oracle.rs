//! Move Oracle: the engine that proposes moves for the tracked position.

use async_trait::async_trait;

use crate::error::AutopilotError;

#[async_trait]
pub trait MoveOracle: Send {
    /// Best move in UCI for the current position; `None` if the engine has
    /// nothing to offer. `depth` overrides the configured search depth.
    async fn best_move(&mut self, depth: Option<u32>) -> Result<Option<String>, AutopilotError>;

    /// Replace the position with a FEN.
    async fn set_position(&mut self, fen: &str) -> Result<(), AutopilotError>;

    /// Back to the standard initial position.
    async fn reset_to_initial(&mut self) -> Result<(), AutopilotError>;

    /// Play a UCI move on the current position.
    async fn apply_move(&mut self, uci: &str) -> Result<(), AutopilotError>;
}
