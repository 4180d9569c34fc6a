//! Synchronization Controller: drives the game to completion one ply at a
//! time against unreliable collaborators.
//!
//! The controller owns the mirrored move list, a replay of the position the
//! oracle has been told, and every retry counter. A move only counts once the
//! observed move list has grown past the length it was proposed at.

use chess_core::GameReplay;
use serde::Serialize;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use crate::config::ControllerConfig;
use crate::connectivity::{fault_for_error, ConnectivityMonitor};
use crate::error::{bounded, AutopilotError};
use crate::events::{ControllerLink, ErrorKind, EventSink, FatalCause, HostCommand, HostEvent};
use crate::executor::{ActionExecutor, ActuationStrategy};
use crate::moves::{CandidateMove, ListChange, MoveList, MoveRecord};
use crate::observer::BoardObserver;
use crate::oracle::MoveOracle;
use crate::repetition::RepetitionGuard;
use crate::resync::Resynchronizer;
use crate::session::{GameSession, ModeFlags, Platform};
use crate::state::SyncState;
use crate::surface::{FaultKind, RemoteSurface};

/// The platform variant and engine a session runs against.
pub struct Collaborators {
    pub observer: Box<dyn BoardObserver>,
    pub surface: Box<dyn RemoteSurface>,
    pub oracle: Box<dyn MoveOracle>,
    /// In priority order
    pub strategies: Vec<Box<dyn ActuationStrategy>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    GameOver,
    Fatal(FatalCause),
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Our moves verified on the platform
    pub confirmed: u32,
    pub failed_verifications: u32,
    pub resyncs: u32,
    pub connectivity_recoveries: u32,
    /// Shallow-search variations that replaced a repeated proposal
    pub variations: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub outcome: Outcome,
    pub moves: Vec<MoveRecord>,
    pub counters: Counters,
}

pub struct Controller {
    session: GameSession,
    config: ControllerConfig,
    observer: Box<dyn BoardObserver>,
    surface: Box<dyn RemoteSurface>,
    oracle: Box<dyn MoveOracle>,
    executor: ActionExecutor,
    guard: RepetitionGuard,
    monitor: ConnectivityMonitor,
    resync: Resynchronizer,
    events: EventSink,
    commands: UnboundedReceiver<HostCommand>,
    state: SyncState,
    mirror: MoveList,
    replay: GameReplay,
    /// Candidate still waiting to be verified, reused on retry
    pending: Option<CandidateMove>,
    /// Consecutive failed verifications
    failures: u32,
    /// Consecutive empty oracle answers
    stalled: u32,
    observation_failures: u32,
    /// Recoveries since the last confirmed move
    recoveries: u32,
    /// Move list length already reported to the host
    reported: usize,
    stop_requested: bool,
    approved: bool,
    counters: Counters,
}

impl Controller {
    /// Attach to the game, identify our side and bring the oracle to the
    /// current position.
    ///
    /// Startup problems are reported to the host as `ERROR` events and end
    /// the session before it begins.
    pub async fn start(
        platform: Platform,
        modes: ModeFlags,
        collaborators: Collaborators,
        config: ControllerConfig,
        link: ControllerLink,
    ) -> Result<Self, AutopilotError> {
        let modes = modes.validate(platform)?;
        let Collaborators {
            mut observer,
            surface,
            oracle,
            strategies,
        } = collaborators;
        let ControllerLink { events, commands } = link;
        let limit = config.call_timeout;

        if let Err(e) = bounded(limit, observer.attach()).await {
            return Err(report(&events, ErrorKind::BoardNotFound, e));
        }

        let color = match bounded(limit, observer.player_color()).await {
            Ok(Some(color)) => color,
            Ok(None) => {
                let e = AutopilotError::Observation("player color not shown".into());
                return Err(report(&events, ErrorKind::ColorUndetermined, e));
            }
            Err(e) => return Err(report(&events, ErrorKind::ColorUndetermined, e)),
        };

        let initial = match bounded(limit, observer.move_list()).await {
            Ok(texts) => texts,
            Err(e) => return Err(report(&events, ErrorKind::MoveListNotFound, e)),
        };

        if let Ok(true) = bounded(limit, observer.is_game_over()).await {
            let e = AutopilotError::Observation("game is already over".into());
            return Err(report(&events, ErrorKind::GameAlreadyOver, e));
        }

        let session = GameSession::new(platform, color, modes);
        info!(%platform, ?color, ply = initial.len(), "Session started");
        events.emit(HostEvent::SessionStart {
            session: session.clone(),
        });

        let mut controller = Self {
            session,
            executor: ActionExecutor::new(strategies, &config),
            guard: RepetitionGuard::new(config.repetition_threshold),
            monitor: ConnectivityMonitor::new(&config),
            resync: Resynchronizer::new(&config),
            config,
            observer,
            surface,
            oracle,
            events,
            commands,
            state: SyncState::WaitingTurn,
            mirror: MoveList::new(),
            replay: GameReplay::new(),
            pending: None,
            failures: 0,
            stalled: 0,
            observation_failures: 0,
            recoveries: 0,
            reported: 0,
            stop_requested: false,
            approved: false,
            counters: Counters::default(),
        };

        match controller.resynchronize().await {
            Ok(()) => {}
            Err(e) if e.is_engine() => {
                return Err(report(&controller.events, ErrorKind::EngineUnreachable, e));
            }
            Err(e) => {
                warn!(error = %e, "Initial sync failed");
                controller.state = SyncState::Recovering;
            }
        }
        Ok(controller)
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn mirror(&self) -> &MoveList {
        &self.mirror
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// Reorder actuation strategies by id.
    pub fn prioritize_strategies(&mut self, order: &[&str]) {
        self.executor.prioritize(order);
    }

    /// Drive the session until it ends or the host asks to stop.
    pub async fn run(mut self) -> SessionSummary {
        loop {
            self.poll_commands();
            if self.stop_requested {
                info!(ply = self.mirror.len(), "Stop requested");
                return self.finish(Outcome::Stopped);
            }
            match &self.state {
                SyncState::GameOver => return self.finish(Outcome::GameOver),
                SyncState::Fatal { cause, .. } => {
                    let cause = *cause;
                    return self.finish(Outcome::Fatal(cause));
                }
                _ => {}
            }
            self.step().await;
        }
    }

    /// Perform one state transition. Terminal states stay put.
    pub async fn step(&mut self) -> &SyncState {
        let from = self.state.name();
        let next = match std::mem::replace(&mut self.state, SyncState::WaitingTurn) {
            SyncState::WaitingTurn => self.wait_turn().await,
            SyncState::Computing => self.compute().await,
            SyncState::AwaitingApproval(candidate) => self.await_approval(candidate).await,
            SyncState::Executing(candidate) => self.execute(candidate).await,
            SyncState::Verifying(candidate) => self.verify(candidate).await,
            SyncState::Confirmed(_) => SyncState::WaitingTurn,
            SyncState::SuspectDesync => self.suspect_desync().await,
            SyncState::ConnectivityFault(kind) => self.connectivity_fault(kind).await,
            SyncState::Recovering => self.recover().await,
            terminal => terminal,
        };

        if next.name() != from {
            debug!(from, to = %next, ply = self.mirror.len(), "Transition");
        }
        self.state = next;
        &self.state
    }

    fn poll_commands(&mut self) {
        loop {
            match self.commands.try_recv() {
                Ok(HostCommand::Stop) => self.stop_requested = true,
                Ok(HostCommand::PlayMove) => self.approved = true,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.stop_requested {
                        debug!("Host command channel closed");
                    }
                    self.stop_requested = true;
                    break;
                }
            }
        }
    }

    async fn wait_turn(&mut self) -> SyncState {
        let limit = self.config.call_timeout;

        let texts = match bounded(limit, self.observer.move_list()).await {
            Ok(texts) => {
                self.observation_failures = 0;
                texts
            }
            Err(e) if e.is_connectivity() => {
                warn!(error = %e, "Move list read lost the connection");
                return SyncState::ConnectivityFault(
                    fault_for_error(&e).unwrap_or(FaultKind::TransportError),
                );
            }
            Err(e) => {
                self.observation_failures += 1;
                if self.observation_failures >= self.config.max_observation_failures {
                    return self.fatal(FatalCause::ObservationLost, e.to_string());
                }
                debug!(error = %e, failures = self.observation_failures, "Move list read failed");
                tokio::time::sleep(self.config.poll_interval).await;
                return SyncState::WaitingTurn;
            }
        };

        if let Err(e) = self.absorb(&texts).await {
            return self.on_sync_error(e);
        }

        if bounded(limit, self.observer.is_puzzle_mode())
            .await
            .unwrap_or(false)
        {
            return self.next_puzzle().await;
        }
        if bounded(limit, self.observer.is_game_over())
            .await
            .unwrap_or(false)
        {
            return self.game_over();
        }

        if self.session.is_our_turn(self.mirror.len()) {
            return SyncState::Computing;
        }
        tokio::time::sleep(self.config.poll_interval).await;
        SyncState::WaitingTurn
    }

    async fn compute(&mut self) -> SyncState {
        let base_len = self.mirror.len();

        let mut candidate = match self.pending.take().filter(|c| c.base_len == base_len) {
            Some(candidate) => candidate,
            None => {
                let text = match self.ask_oracle(None).await {
                    Ok(Some(text)) => text,
                    Ok(None) => return self.oracle_stalled().await,
                    Err(e) => return self.fatal(FatalCause::EngineUnreachable, e.to_string()),
                };
                match self.validate(&text, base_len) {
                    Ok(candidate) => candidate,
                    Err(e) => {
                        warn!(mv = %text, error = %e, "Oracle move does not fit the position");
                        return SyncState::Recovering;
                    }
                }
            }
        };
        self.stalled = 0;

        if self.guard.observe(&candidate.uci()) {
            info!(mv = %candidate, "Repeated proposal, asking for a variation");
            match self.ask_oracle(Some(self.config.shallow_depth)).await {
                Ok(Some(text)) if text.trim() != candidate.uci() => {
                    match self.validate(&text, base_len) {
                        Ok(alternative) => {
                            info!(from = %candidate, to = %alternative, "Variation chosen");
                            self.counters.variations += 1;
                            candidate = alternative;
                        }
                        Err(e) => warn!(mv = %text, error = %e, "Variation rejected"),
                    }
                }
                Ok(_) => debug!("Shallow search offered no alternative"),
                Err(e) => return self.fatal(FatalCause::EngineUnreachable, e.to_string()),
            }
            self.guard.substitute(&candidate.uci());
        }

        if self.session.modes.manual {
            self.approved = false;
            self.events.emit(HostEvent::MoveSuggested {
                text: candidate.uci(),
            });
            return SyncState::AwaitingApproval(candidate);
        }
        SyncState::Executing(candidate)
    }

    async fn await_approval(&mut self, candidate: CandidateMove) -> SyncState {
        self.poll_commands();
        if self.approved {
            self.approved = false;
            return SyncState::Executing(candidate);
        }
        tokio::time::sleep(self.config.poll_interval).await;
        SyncState::AwaitingApproval(candidate)
    }

    async fn execute(&mut self, candidate: CandidateMove) -> SyncState {
        let board = self.observer.board_handle();
        if !self
            .executor
            .execute(&candidate, &board, &self.session.modes)
            .await
        {
            debug!(mv = %candidate, "Nothing dispatched, verifying anyway");
        }
        SyncState::Verifying(candidate)
    }

    async fn verify(&mut self, candidate: CandidateMove) -> SyncState {
        tokio::time::sleep(self.config.settle_delay).await;

        let texts = match bounded(self.config.call_timeout, self.observer.move_list()).await {
            Ok(texts) => texts,
            Err(e) if e.is_connectivity() => {
                self.pending = Some(candidate);
                return SyncState::ConnectivityFault(
                    fault_for_error(&e).unwrap_or(FaultKind::TransportError),
                );
            }
            Err(e) => {
                debug!(error = %e, "Move list unreadable during verification");
                Vec::new()
            }
        };

        if texts.len() > candidate.base_len {
            if let Err(e) = self.absorb(&texts).await {
                return self.on_sync_error(e);
            }
            let grown = self.mirror.len() - candidate.base_len;
            self.confirm(&candidate);
            return SyncState::Confirmed(grown);
        }

        self.pending = Some(candidate);
        self.failures += 1;
        self.counters.failed_verifications += 1;
        warn!(failures = self.failures, "Move did not show up on the board");
        SyncState::SuspectDesync
    }

    async fn suspect_desync(&mut self) -> SyncState {
        if let Some(kind) = self.monitor.probe(self.surface.as_mut()).await {
            warn!(fault = %kind, "Connectivity fault detected");
            return SyncState::ConnectivityFault(kind);
        }
        self.monitor.note_clear();

        match bounded(self.config.call_timeout, self.surface.probe_actuation_error()).await {
            Ok(Some(indicator)) => {
                warn!(%indicator, "Platform rejected the move");
                return SyncState::Recovering;
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Actuation error probe failed"),
        }

        if self.failures >= self.config.max_failed_verifications {
            warn!(failures = self.failures, "Too many failed verifications");
            return SyncState::Recovering;
        }
        SyncState::WaitingTurn
    }

    async fn connectivity_fault(&mut self, kind: FaultKind) -> SyncState {
        if self.monitor.exhausted() {
            let cause = if kind == FaultKind::SessionLost {
                FatalCause::SessionLost
            } else {
                FatalCause::ConnectivityLost
            };
            let detail = format!(
                "{kind} persisted after {} recovery attempts",
                self.monitor.attempts_used()
            );
            return self.fatal(cause, detail);
        }

        let recovered = self
            .monitor
            .recover(kind, self.surface.as_mut(), self.observer.as_mut())
            .await;
        tokio::time::sleep(self.config.recovery_delay).await;

        if recovered {
            self.counters.connectivity_recoveries += 1;
            self.failures = 0;
            SyncState::WaitingTurn
        } else {
            SyncState::ConnectivityFault(kind)
        }
    }

    /// Our move is on the board: clear every per-ply retry counter.
    fn confirm(&mut self, candidate: &CandidateMove) {
        self.failures = 0;
        self.recoveries = 0;
        self.pending = None;
        self.guard.reset();
        self.monitor.note_clear();
        self.counters.confirmed += 1;
        info!(mv = %candidate, ply = self.mirror.len(), "Move confirmed");
    }

    /// Resync; if that fails, reload the surface once and try again.
    async fn recover(&mut self) -> SyncState {
        if self.recoveries >= self.config.max_recoveries {
            let detail = format!("{} recoveries without a confirmed move", self.recoveries);
            return self.fatal(FatalCause::DesyncUnrecoverable, detail);
        }
        self.recoveries += 1;

        match self.resynchronize().await {
            Ok(()) => return self.resumed().await,
            Err(e) if e.is_engine() => return self.fatal(FatalCause::EngineUnreachable, e.to_string()),
            Err(e) => warn!(error = %e, "Resync failed, reloading the surface"),
        }

        let limit = self.config.call_timeout;
        if let Err(e) = bounded(limit, self.surface.dismiss_overlays()).await {
            debug!(error = %e, "Could not dismiss overlays");
        }
        if let Err(e) = bounded(limit, self.surface.reload()).await {
            warn!(error = %e, "Reload failed");
        }
        tokio::time::sleep(self.config.reload_wait).await;

        if let Err(e) = bounded(limit, self.observer.attach()).await {
            return self.fatal(
                FatalCause::DesyncUnrecoverable,
                format!("board lost after reload: {e}"),
            );
        }

        match self.resynchronize().await {
            Ok(()) => self.resumed().await,
            Err(e) if e.is_engine() => self.fatal(FatalCause::EngineUnreachable, e.to_string()),
            Err(e) => self.fatal(FatalCause::DesyncUnrecoverable, e.to_string()),
        }
    }

    async fn resumed(&mut self) -> SyncState {
        tokio::time::sleep(self.config.recovery_delay).await;
        SyncState::WaitingTurn
    }

    /// Adopt the resynchronizer's view of the game and reset per-ply state.
    async fn resynchronize(&mut self) -> Result<(), AutopilotError> {
        let done = self
            .resync
            .resync(
                self.observer.as_mut(),
                self.surface.as_mut(),
                self.oracle.as_mut(),
            )
            .await?;

        self.counters.resyncs += 1;
        let changed = done.mirror.texts() != self.mirror.texts();
        self.mirror = done.mirror;
        self.replay = done.replay;
        self.pending = None;
        self.failures = 0;
        self.guard.reset();
        debug!(outcome = ?done.outcome, ply = self.mirror.len(), "Resynchronized");

        if changed {
            if !self.mirror.is_empty() {
                self.events.emit(HostEvent::MoveBatchConfirmed {
                    texts: self.mirror.texts(),
                });
            }
            // A truncated read must not lower the watermark
            self.reported = self.reported.max(self.mirror.len());
        }
        Ok(())
    }

    /// Bring newly observed moves into the mirror, the replay and the oracle.
    async fn absorb(&mut self, texts: &[String]) -> Result<(), AutopilotError> {
        let from = match self.mirror.compare(texts) {
            ListChange::Unchanged => return Ok(()),
            ListChange::Diverged { at } => {
                return Err(AutopilotError::Observation(format!(
                    "move list diverged at index {at}"
                )));
            }
            ListChange::Extended { from } => from,
        };

        let ucis = self.replay.advance(&texts[from..])?;
        for uci in &ucis {
            bounded(self.config.oracle_timeout, self.oracle.apply_move(uci))
                .await
                .map_err(AutopilotError::into_engine)?;
        }

        let added = self.mirror.append_from(texts).to_vec();
        for record in added {
            debug!(index = record.index, text = %record.text, side = ?record.side, "Move observed");
            if record.index >= self.reported {
                self.events.emit(HostEvent::MoveConfirmed {
                    index: record.index,
                    text: record.text,
                });
                self.reported = record.index + 1;
            }
        }
        // A retried move that landed late counts as confirmed here
        if let Some(candidate) = self.pending.take() {
            if self.mirror.len() > candidate.base_len {
                self.confirm(&candidate);
            } else {
                self.pending = Some(candidate);
            }
        }
        Ok(())
    }

    async fn ask_oracle(&mut self, depth: Option<u32>) -> Result<Option<String>, AutopilotError> {
        match tokio::time::timeout(self.config.oracle_timeout, self.oracle.best_move(depth)).await {
            Ok(result) => result.map_err(AutopilotError::into_engine),
            Err(_) => {
                warn!(?depth, "Oracle search timed out");
                Ok(None)
            }
        }
    }

    async fn oracle_stalled(&mut self) -> SyncState {
        self.stalled += 1;
        if self.stalled >= self.config.max_oracle_failures {
            let detail = format!("no move after {} requests", self.stalled);
            return self.fatal(FatalCause::EngineUnreachable, detail);
        }
        warn!(attempt = self.stalled, "Oracle returned no move");
        tokio::time::sleep(self.config.oracle_retry_delay).await;
        SyncState::Computing
    }

    /// Parse an oracle move and check it is legal where we think we are.
    fn validate(&self, text: &str, base_len: usize) -> Result<CandidateMove, AutopilotError> {
        self.replay.check_uci(text)?;
        Ok(CandidateMove::from_uci(text, base_len)?)
    }

    async fn next_puzzle(&mut self) -> SyncState {
        if !self.session.modes.non_stop_puzzles {
            info!("Puzzle solved");
            return self.game_over();
        }

        match bounded(self.config.call_timeout, self.observer.advance_puzzle()).await {
            Ok(true) => {
                info!("Advanced to the next puzzle");
                tokio::time::sleep(self.config.reload_wait).await;
                match self.resynchronize().await {
                    Ok(()) => SyncState::WaitingTurn,
                    Err(e) => self.on_sync_error(e),
                }
            }
            Ok(false) => {
                warn!("Next puzzle not available yet");
                tokio::time::sleep(self.config.poll_interval).await;
                SyncState::WaitingTurn
            }
            Err(e) => {
                warn!(error = %e, "Could not advance puzzle");
                tokio::time::sleep(self.config.poll_interval).await;
                SyncState::WaitingTurn
            }
        }
    }

    fn on_sync_error(&mut self, e: AutopilotError) -> SyncState {
        if e.is_engine() {
            return self.fatal(FatalCause::EngineUnreachable, e.to_string());
        }
        warn!(error = %e, "Lost track of the game");
        SyncState::Recovering
    }

    fn game_over(&mut self) -> SyncState {
        info!(ply = self.mirror.len(), "Game over");
        self.events.emit(HostEvent::GameOver);
        if self.session.modes.tournament {
            self.events.emit(HostEvent::RestartRequested);
        }
        SyncState::GameOver
    }

    fn fatal(&mut self, cause: FatalCause, detail: String) -> SyncState {
        error!(%cause, %detail, ply = self.mirror.len(), "Session failed");
        self.events.emit(HostEvent::Fatal {
            cause,
            detail: detail.clone(),
        });
        SyncState::Fatal { cause, detail }
    }

    fn finish(self, outcome: Outcome) -> SessionSummary {
        info!(?outcome, counters = ?self.counters, "Session finished");
        SessionSummary {
            outcome,
            moves: self.mirror.records().to_vec(),
            counters: self.counters,
        }
    }
}

/// Report a startup failure to the host and hand the error back.
fn report(events: &EventSink, kind: ErrorKind, e: AutopilotError) -> AutopilotError {
    error!(?kind, error = %e, "Session could not start");
    events.emit(HostEvent::Error {
        kind,
        detail: e.to_string(),
    });
    e
}
