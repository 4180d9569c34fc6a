//! Host link: one-directional events out, control commands in.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::session::GameSession;

/// Startup problems reported to the host for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    EngineUnreachable,
    EnginePermission,
    BoardNotFound,
    ColorUndetermined,
    MoveListNotFound,
    GameAlreadyOver,
}

/// Why a session ended in `FATAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FatalCause {
    EngineUnreachable,
    ConnectivityLost,
    SessionLost,
    ObservationLost,
    DesyncUnrecoverable,
}

impl fmt::Display for FatalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FatalCause::EngineUnreachable => "EngineUnreachable",
            FatalCause::ConnectivityLost => "ConnectivityLost",
            FatalCause::SessionLost => "SessionLost",
            FatalCause::ObservationLost => "ObservationLost",
            FatalCause::DesyncUnrecoverable => "DesyncUnrecoverable",
        };
        f.write_str(name)
    }
}

/// Status messages sent to the host, serialized as one JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostEvent {
    SessionStart { session: GameSession },
    MoveConfirmed { index: usize, text: String },
    MoveBatchConfirmed { texts: Vec<String> },
    MoveSuggested { text: String },
    Error { kind: ErrorKind, detail: String },
    Fatal { cause: FatalCause, detail: String },
    GameOver,
    RestartRequested,
}

/// Commands from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostCommand {
    Stop,
    /// Go-ahead for the suggested move in manual mode
    PlayMove,
}

/// Sending half of the event stream. Sends never block and never fail the
/// controller; a host that went away simply stops receiving.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl EventSink {
    pub fn emit(&self, event: HostEvent) {
        if self.tx.send(event).is_err() {
            debug!("Host event receiver dropped");
        }
    }
}

/// Host side of the link.
#[derive(Debug)]
pub struct HostHandle {
    pub commands: mpsc::UnboundedSender<HostCommand>,
    pub events: mpsc::UnboundedReceiver<HostEvent>,
}

impl HostHandle {
    pub fn stop(&self) {
        let _ = self.commands.send(HostCommand::Stop);
    }

    pub fn play_move(&self) {
        let _ = self.commands.send(HostCommand::PlayMove);
    }

    /// Drain every event received so far.
    pub fn drain(&mut self) -> Vec<HostEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

/// Controller side of the link.
#[derive(Debug)]
pub struct ControllerLink {
    pub events: EventSink,
    pub commands: mpsc::UnboundedReceiver<HostCommand>,
}

/// Create a connected host/controller pair.
pub fn host_channel() -> (HostHandle, ControllerLink) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    (
        HostHandle {
            commands: command_tx,
            events: event_rx,
        },
        ControllerLink {
            events: EventSink { tx: event_tx },
            commands: command_rx,
        },
    )
}
