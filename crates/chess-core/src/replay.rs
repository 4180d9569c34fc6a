//! A position rebuilt from a move list, mirroring what an engine has been told.

use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Color, Move, Position};

use crate::notation;
use crate::NotationError;

/// Position reached by replaying `ply` moves from a base position.
#[derive(Debug, Clone)]
pub struct GameReplay {
    position: Chess,
    base_fen: Option<String>,
    ply: usize,
}

impl Default for GameReplay {
    fn default() -> Self {
        Self::new()
    }
}

impl GameReplay {
    /// Replay starting at the standard initial position.
    pub fn new() -> Self {
        Self {
            position: Chess::default(),
            base_fen: None,
            ply: 0,
        }
    }

    /// Replay whose base is `fen`, standing for `ply` moves already played.
    pub fn from_fen(fen: &str, ply: usize) -> Result<Self, NotationError> {
        let parsed: Fen = fen
            .trim()
            .parse()
            .map_err(|e| NotationError::InvalidFen(format!("{fen}: {e}")))?;
        let position: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| NotationError::InvalidFen(format!("{fen}: {e}")))?;

        Ok(Self {
            position,
            base_fen: Some(fen.trim().to_string()),
            ply,
        })
    }

    /// Number of moves the replay stands for.
    pub fn ply(&self) -> usize {
        self.ply
    }

    pub fn position(&self) -> &Chess {
        &self.position
    }

    /// FEN the replay was built from, `None` for the initial position.
    pub fn base_fen(&self) -> Option<&str> {
        self.base_fen.as_deref()
    }

    pub fn turn(&self) -> Color {
        self.position.turn()
    }

    /// Apply displayed moves in order and return them as UCI.
    ///
    /// All or nothing: if any move fails to resolve, the replay is unchanged.
    pub fn advance<S: AsRef<str>>(&mut self, moves: &[S]) -> Result<Vec<String>, NotationError> {
        let mut position = self.position.clone();
        let mut ucis = Vec::with_capacity(moves.len());

        for text in moves {
            ucis.push(notation::play_display(&mut position, text.as_ref())?);
        }

        self.position = position;
        self.ply += ucis.len();
        Ok(ucis)
    }

    /// Check that `uci` is a legal move in the current position.
    pub fn check_uci(&self, uci: &str) -> Result<Move, NotationError> {
        notation::parse_uci(&self.position, uci)
    }
}
