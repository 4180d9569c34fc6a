//! Session identity: platform, our color and the mode flags.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AutopilotError;

/// Remote platform hosting the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Lichess,
    ChessCom,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Lichess => write!(f, "lichess"),
            Platform::ChessCom => write!(f, "chesscom"),
        }
    }
}

impl FromStr for Platform {
    type Err = AutopilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lichess" | "lichess.org" => Ok(Platform::Lichess),
            "chesscom" | "chess.com" | "chess_com" => Ok(Platform::ChessCom),
            other => Err(AutopilotError::Config(format!("unknown platform '{other}'"))),
        }
    }
}

/// Side of the board. White moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// Side to move once `len` moves have been played.
    pub fn to_move_at(len: usize) -> Color {
        if len % 2 == 0 {
            Color::White
        } else {
            Color::Black
        }
    }

    /// True if a move list of length `len` means it is this side's turn.
    pub fn is_turn(self, len: usize) -> bool {
        Color::to_move_at(len) == self
    }

    pub fn opposite(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

impl From<Color> for shakmaty::Color {
    fn from(color: Color) -> Self {
        match color {
            Color::White => shakmaty::Color::White,
            Color::Black => shakmaty::Color::Black,
        }
    }
}

/// Behaviour switches chosen by the user for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeFlags {
    /// Wait for the host's go-ahead before every move
    pub manual: bool,
    /// Never move the pointer; only script-level strategies
    pub mouseless: bool,
    /// Smoother, multi-step pointer paths
    pub human_like: bool,
    /// Send moves as premoves
    pub premove_only: bool,
    /// Keep advancing to the next puzzle instead of stopping
    pub non_stop_puzzles: bool,
    /// Ask the host for a fresh session after each game
    pub tournament: bool,
}

impl ModeFlags {
    /// Check flag combinations against the platform.
    ///
    /// Tournament mode only exists on Lichess and is cleared elsewhere;
    /// the other conflicts are rejected.
    pub fn validate(mut self, platform: Platform) -> Result<Self, AutopilotError> {
        if self.mouseless && platform != Platform::Lichess {
            return Err(AutopilotError::Config(
                "mouseless mode is only supported on lichess".into(),
            ));
        }
        if self.premove_only && self.mouseless {
            return Err(AutopilotError::Config(
                "premove mode and mouseless mode cannot be used together".into(),
            ));
        }
        if platform != Platform::Lichess {
            self.tournament = false;
        }
        Ok(self)
    }
}

/// One run of the controller against one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub platform: Platform,
    pub color: Color,
    pub modes: ModeFlags,
    pub started_at: DateTime<Utc>,
}

impl GameSession {
    pub fn new(platform: Platform, color: Color, modes: ModeFlags) -> Self {
        Self {
            platform,
            color,
            modes,
            started_at: Utc::now(),
        }
    }

    /// True if a move list of length `len` means it is our turn.
    pub fn is_our_turn(&self, len: usize) -> bool {
        self.color.is_turn(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_parity() {
        assert!(Color::White.is_turn(0));
        assert!(Color::Black.is_turn(1));
        assert!(Color::White.is_turn(4));
        assert!(!Color::Black.is_turn(4));
        assert_eq!(Color::to_move_at(7), Color::Black);
    }

    #[test]
    fn test_platform_from_str() {
        assert_eq!("lichess".parse::<Platform>().unwrap(), Platform::Lichess);
        assert_eq!("Chess.com".parse::<Platform>().unwrap(), Platform::ChessCom);
        assert!("chess24".parse::<Platform>().is_err());
    }

    #[test]
    fn test_mode_validation() {
        let mouseless = ModeFlags {
            mouseless: true,
            ..Default::default()
        };
        assert!(mouseless.validate(Platform::ChessCom).is_err());
        assert!(mouseless.validate(Platform::Lichess).is_ok());

        let conflicting = ModeFlags {
            mouseless: true,
            premove_only: true,
            ..Default::default()
        };
        assert!(conflicting.validate(Platform::Lichess).is_err());

        let tournament = ModeFlags {
            tournament: true,
            ..Default::default()
        };
        assert!(!tournament.validate(Platform::ChessCom).unwrap().tournament);
        assert!(tournament.validate(Platform::Lichess).unwrap().tournament);
    }
}
