//! Chess notation and position replay shared by the autopilot crates.

pub mod notation;
pub mod replay;
pub mod tcn;

pub use replay::GameReplay;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotationError {
    #[error("Empty move text")]
    Empty,

    #[error("Unparseable move: {0}")]
    Unparseable(String),

    #[error("Illegal move: {0}")]
    Illegal(String),

    #[error("Invalid FEN: {0}")]
    InvalidFen(String),
}
