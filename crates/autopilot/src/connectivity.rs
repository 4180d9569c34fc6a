//! Connectivity Monitor: tells a broken platform apart from a move that
//! failed for game reasons, and drives the bounded recovery.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::error::{bounded, AutopilotError};
use crate::observer::BoardObserver;
use crate::surface::{FaultKind, RemoteSurface};

pub struct ConnectivityMonitor {
    budget: u32,
    used: u32,
    reconnect_wait: Duration,
    reload_wait: Duration,
    call_timeout: Duration,
}

impl ConnectivityMonitor {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            budget: config.connectivity_budget,
            used: 0,
            reconnect_wait: config.reconnect_wait,
            reload_wait: config.reload_wait,
            call_timeout: config.call_timeout,
        }
    }

    /// Look for a connectivity fault without acting on it.
    ///
    /// A probe that itself fails with a transport or session error is a
    /// fault of that kind; one that times out counts as severe lag.
    pub async fn probe(&self, surface: &mut dyn RemoteSurface) -> Option<FaultKind> {
        match bounded(self.call_timeout, surface.probe_connectivity()).await {
            Ok(fault) => fault,
            Err(e) => fault_for_error(&e).or_else(|| {
                debug!(error = %e, "Connectivity probe failed");
                None
            }),
        }
    }

    /// True once every recovery attempt of the budget has been spent.
    pub fn exhausted(&self) -> bool {
        self.used >= self.budget
    }

    pub fn attempts_used(&self) -> u32 {
        self.used
    }

    /// A clean probe or a confirmed move gives the budget back.
    pub fn note_clear(&mut self) {
        if self.used > 0 {
            debug!(used = self.used, "Connectivity budget restored");
        }
        self.used = 0;
    }

    /// Spend one attempt on the least destructive remedy that applies.
    ///
    /// A lost session only needs the observer re-attached. Anything else
    /// tries the in-page reconnect first and falls back to a reload.
    pub async fn recover(
        &mut self,
        kind: FaultKind,
        surface: &mut dyn RemoteSurface,
        observer: &mut dyn BoardObserver,
    ) -> bool {
        self.used += 1;
        info!(fault = %kind, attempt = self.used, budget = self.budget, "Recovering connectivity");

        if kind == FaultKind::SessionLost {
            return self.reattach(observer).await;
        }

        match bounded(self.call_timeout, surface.click_reconnect()).await {
            Ok(true) => {
                tokio::time::sleep(self.reconnect_wait).await;
                return true;
            }
            Ok(false) => debug!("No reconnect affordance shown"),
            Err(e) => debug!(error = %e, "Reconnect click failed"),
        }

        if let Err(e) = bounded(self.call_timeout, surface.reload()).await {
            warn!(error = %e, "Reload failed");
            return false;
        }
        tokio::time::sleep(self.reload_wait).await;
        self.reattach(observer).await
    }

    async fn reattach(&self, observer: &mut dyn BoardObserver) -> bool {
        match bounded(self.call_timeout, observer.attach()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Observer re-attachment failed");
                false
            }
        }
    }
}

/// Fault implied by a failed collaborator call, if any.
pub fn fault_for_error(err: &AutopilotError) -> Option<FaultKind> {
    match err {
        AutopilotError::SessionLost(_) => Some(FaultKind::SessionLost),
        AutopilotError::Transport(_) => Some(FaultKind::TransportError),
        AutopilotError::Timeout(_) => Some(FaultKind::SevereLag),
        _ => None,
    }
}
