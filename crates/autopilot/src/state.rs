//! Controller states.

use std::fmt;

use crate::events::FatalCause;
use crate::moves::CandidateMove;
use crate::surface::FaultKind;

/// Where the controller is in the current ply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    WaitingTurn,
    Computing,
    /// Manual mode: candidate suggested, waiting for the host's go-ahead
    AwaitingApproval(CandidateMove),
    Executing(CandidateMove),
    Verifying(CandidateMove),
    /// The move list grew by this many records
    Confirmed(usize),
    SuspectDesync,
    ConnectivityFault(FaultKind),
    Recovering,
    GameOver,
    Fatal { cause: FatalCause, detail: String },
}

impl SyncState {
    pub fn name(&self) -> &'static str {
        match self {
            SyncState::WaitingTurn => "WAITING_TURN",
            SyncState::Computing => "COMPUTING",
            SyncState::AwaitingApproval(_) => "AWAITING_APPROVAL",
            SyncState::Executing(_) => "EXECUTING",
            SyncState::Verifying(_) => "VERIFYING",
            SyncState::Confirmed(_) => "CONFIRMED",
            SyncState::SuspectDesync => "SUSPECT_DESYNC",
            SyncState::ConnectivityFault(_) => "CONNECTIVITY_FAULT",
            SyncState::Recovering => "RECOVERING",
            SyncState::GameOver => "GAME_OVER",
            SyncState::Fatal { .. } => "FATAL",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::GameOver | SyncState::Fatal { .. })
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Fatal { cause, .. } => write!(f, "FATAL({cause})"),
            SyncState::ConnectivityFault(kind) => write!(f, "CONNECTIVITY_FAULT({kind})"),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(SyncState::GameOver.is_terminal());
        assert!(SyncState::Fatal {
            cause: FatalCause::ConnectivityLost,
            detail: String::new()
        }
        .is_terminal());
        assert!(!SyncState::Recovering.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            SyncState::ConnectivityFault(FaultKind::SevereLag).to_string(),
            "CONNECTIVITY_FAULT(severe_lag)"
        );
        assert_eq!(
            SyncState::Fatal {
                cause: FatalCause::EngineUnreachable,
                detail: "no move".into()
            }
            .to_string(),
            "FATAL(EngineUnreachable)"
        );
    }
}
