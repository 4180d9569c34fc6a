//! Remote surface: page-level probes and remedies outside the board itself.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AutopilotError;

/// Connectivity problems a probe can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    /// Browser-level error page (DNS, reset, offline)
    TransportError,
    /// The automation session handle is gone
    SessionLost,
    SevereLag,
    SocketDisconnected,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::TransportError => "transport_error",
            FaultKind::SessionLost => "session_lost",
            FaultKind::SevereLag => "severe_lag",
            FaultKind::SocketDisconnected => "socket_disconnected",
        };
        f.write_str(name)
    }
}

#[async_trait]
pub trait RemoteSurface: Send {
    /// Look for connectivity trouble on the page. Must not act on it.
    async fn probe_connectivity(&mut self) -> Result<Option<FaultKind>, AutopilotError>;

    /// Click an in-page reconnect affordance; `false` if none is shown.
    async fn click_reconnect(&mut self) -> Result<bool, AutopilotError>;

    /// Full page reload.
    async fn reload(&mut self) -> Result<(), AutopilotError>;

    /// Look for an illegal / invalid / not-your-turn indicator and return its text.
    async fn probe_actuation_error(&mut self) -> Result<Option<String>, AutopilotError>;

    /// Authoritative position as FEN, when the page exposes one.
    async fn read_position(&mut self) -> Result<Option<String>, AutopilotError>;

    /// Close dialogs and toasts that may be swallowing input.
    async fn dismiss_overlays(&mut self) -> Result<(), AutopilotError>;
}
