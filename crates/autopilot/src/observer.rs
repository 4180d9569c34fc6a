//! Board Observer: read-only view of the remote game.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AutopilotError;
use crate::session::Color;

/// Opaque reference to the rendered board, passed through to actuation
/// strategies. The controller never looks inside.
#[derive(Clone, PartialEq, Eq)]
pub struct BoardHandle(Arc<str>);

impl BoardHandle {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BoardHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoardHandle({})", self.0)
    }
}

/// One platform's view of the game in progress.
///
/// Implementations are selected once per session; every call is a
/// best-effort read that may fail without side effects.
#[async_trait]
pub trait BoardObserver: Send {
    /// Locate the board and refresh any cached element references.
    /// Called at session start and after every reload.
    async fn attach(&mut self) -> Result<(), AutopilotError>;

    /// Current move list in display notation.
    async fn move_list(&mut self) -> Result<Vec<String>, AutopilotError>;

    async fn is_game_over(&mut self) -> Result<bool, AutopilotError>;

    /// True when a puzzle has been solved and the next one can be loaded.
    async fn is_puzzle_mode(&mut self) -> Result<bool, AutopilotError>;

    async fn advance_puzzle(&mut self) -> Result<bool, AutopilotError>;

    /// Our side, `None` if the page does not tell.
    async fn player_color(&mut self) -> Result<Option<Color>, AutopilotError>;

    fn board_handle(&self) -> BoardHandle;
}
