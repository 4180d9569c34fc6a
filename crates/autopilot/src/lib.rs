//! Board autopilot core
//!
//! Keeps a remote game and a local engine in step: watches the platform's
//! move list, asks the engine for a move, applies it through pluggable
//! actuation strategies and verifies it landed before moving on.

pub mod config;
pub mod connectivity;
pub mod controller;
pub mod error;
pub mod events;
pub mod executor;
pub mod moves;
pub mod observer;
pub mod oracle;
pub mod repetition;
pub mod resync;
pub mod session;
pub mod state;
pub mod stockfish;
pub mod surface;

pub use config::ControllerConfig;
pub use controller::{Collaborators, Controller, Counters, Outcome, SessionSummary};
pub use error::AutopilotError;
pub use events::{host_channel, ControllerLink, ErrorKind, FatalCause, HostCommand, HostEvent, HostHandle};
pub use executor::{ActionAttempt, ActionExecutor, ActuationStrategy, AttemptOutcome};
pub use moves::{CandidateMove, MoveList, MoveRecord};
pub use observer::{BoardHandle, BoardObserver};
pub use oracle::MoveOracle;
pub use session::{Color, GameSession, ModeFlags, Platform};
pub use state::SyncState;
pub use surface::{FaultKind, RemoteSurface};
