//! Move records, the mirrored move list and oracle candidates.

use std::fmt;

use chess_core::NotationError;
use serde::{Deserialize, Serialize};
use shakmaty::uci::UciMove;
use shakmaty::{Role, Square};

use crate::session::Color;

/// One move of the game as the platform displays it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// 0-based position in the game, shared by both colors
    pub index: usize,
    /// Move text as displayed (SAN, figurine SAN or UCI)
    pub text: String,
    /// Side that played the move
    pub side: Color,
}

impl MoveRecord {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            side: Color::to_move_at(index),
        }
    }
}

/// How a freshly observed move list relates to the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListChange {
    Unchanged,
    /// The observed list appends moves starting at this index
    Extended { from: usize },
    /// The observed list disagrees with the mirror at this index
    Diverged { at: usize },
}

/// Controller-side mirror of the platform's append-only move list.
#[derive(Debug, Clone, Default)]
pub struct MoveList {
    records: Vec<MoveRecord>,
}

impl MoveList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        Self {
            records: texts
                .iter()
                .enumerate()
                .map(|(i, t)| MoveRecord::new(i, t.as_ref().trim()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[MoveRecord] {
        &self.records
    }

    pub fn texts(&self) -> Vec<String> {
        self.records.iter().map(|r| r.text.clone()).collect()
    }

    /// Compare an observed list against the mirror.
    pub fn compare<S: AsRef<str>>(&self, observed: &[S]) -> ListChange {
        let at = self
            .records
            .iter()
            .zip(observed)
            .position(|(record, seen)| record.text != seen.as_ref().trim());

        if let Some(at) = at {
            return ListChange::Diverged { at };
        }
        match observed.len().cmp(&self.records.len()) {
            std::cmp::Ordering::Equal => ListChange::Unchanged,
            std::cmp::Ordering::Greater => ListChange::Extended {
                from: self.records.len(),
            },
            std::cmp::Ordering::Less => ListChange::Diverged { at: observed.len() },
        }
    }

    /// Append the observed moves past the mirror's end and return them.
    /// Callers must have checked that `observed` extends the mirror.
    pub fn append_from<S: AsRef<str>>(&mut self, observed: &[S]) -> &[MoveRecord] {
        let start = self.records.len();
        for (i, text) in observed.iter().enumerate().skip(start) {
            self.records.push(MoveRecord::new(i, text.as_ref().trim()));
        }
        &self.records[start..]
    }
}

/// A move proposed by the oracle, tied to the list length it was computed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
    /// Move list length when the move was proposed
    pub base_len: usize,
}

impl CandidateMove {
    /// Parse oracle output in UCI notation.
    pub fn from_uci(text: &str, base_len: usize) -> Result<Self, NotationError> {
        let uci: UciMove = text
            .trim()
            .parse()
            .map_err(|_| NotationError::Unparseable(text.to_string()))?;
        match uci {
            UciMove::Normal {
                from,
                to,
                promotion,
            } => Ok(Self {
                from,
                to,
                promotion,
                base_len,
            }),
            _ => Err(NotationError::Unparseable(text.to_string())),
        }
    }

    /// UCI text, e.g. `e7e8q`.
    pub fn uci(&self) -> String {
        self.to_string()
    }

    pub fn is_promotion(&self) -> bool {
        self.promotion.is_some()
    }
}

impl fmt::Display for CandidateMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(role) = self.promotion {
            write!(f, "{}", role.char())?;
        }
        Ok(())
    }
}
