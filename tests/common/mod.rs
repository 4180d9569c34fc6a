//! In-memory collaborators for driving the controller without a browser or engine.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use autopilot::{
    host_channel, ActuationStrategy, AutopilotError, BoardHandle, BoardObserver, CandidateMove,
    Collaborators, Color, Controller, ControllerConfig, FaultKind, HostEvent, HostHandle,
    ModeFlags, MoveOracle, Platform, RemoteSurface,
};

/// FEN after 1.d4 Nf6 2.c4, black to move.
pub const AFTER_D4_NF6_C4: &str = "rnbqkb1r/pppppppp/5n2/8/2PP4/8/PP2PPPP/RNBQKBNR b KQkq c3 0 2";

pub fn indian_opening() -> Vec<String> {
    vec!["d2d4".into(), "g8f6".into(), "c2c4".into()]
}

/// What the fake platform shows, plus counters of what was done to it.
#[derive(Debug, Default)]
pub struct BoardState {
    pub moves: Vec<String>,
    pub color: Option<Color>,
    pub attach_fails: bool,
    pub game_over: bool,
    /// Game ends once the list reaches this length
    pub game_over_at: Option<usize>,
    pub puzzle: bool,
    pub fen: Option<String>,
    /// Every connectivity probe reports this
    pub fault: Option<FaultKind>,
    pub actuation_error: Option<String>,
    /// Strategies put dispatched moves on the board
    pub accept_moves: bool,
    /// Opponent answers appended right after an accepted move
    pub replies: VecDeque<String>,
    /// The next accepted move only shows up after one more read
    pub lands_late: bool,
    /// Moves waiting to show up after the next read
    pub landing: Vec<String>,
    /// Errors returned by upcoming move list reads, before the list itself
    pub read_errors: VecDeque<AutopilotError>,
    /// Every move list read fails
    pub unreadable: bool,
    /// Position shown once the next puzzle is opened
    pub next_puzzle: Option<Vec<String>>,

    pub attaches: u32,
    pub probes: u32,
    pub reconnect_clicks: u32,
    pub reloads: u32,
    pub reads: u32,
    /// UCI of every dispatched move, in order
    pub dispatched: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeBoard(Arc<Mutex<BoardState>>);

impl FakeBoard {
    pub fn new(color: Color, moves: Vec<String>) -> Self {
        let board = Self::default();
        {
            let mut state = board.state();
            state.color = Some(color);
            state.moves = moves;
            state.accept_moves = true;
        }
        board
    }

    pub fn state(&self) -> MutexGuard<'_, BoardState> {
        self.0.lock().unwrap()
    }
}

pub struct FakeObserver(pub FakeBoard);

#[async_trait]
impl BoardObserver for FakeObserver {
    async fn attach(&mut self) -> Result<(), AutopilotError> {
        let mut state = self.0.state();
        state.attaches += 1;
        if state.attach_fails {
            return Err(AutopilotError::BoardNotFound("no board element".into()));
        }
        Ok(())
    }

    async fn move_list(&mut self) -> Result<Vec<String>, AutopilotError> {
        let mut state = self.0.state();
        state.reads += 1;
        if let Some(e) = state.read_errors.pop_front() {
            return Err(e);
        }
        if state.unreadable {
            return Err(AutopilotError::Observation("move list element missing".into()));
        }
        let seen = state.moves.clone();
        let landing = std::mem::take(&mut state.landing);
        state.moves.extend(landing);
        Ok(seen)
    }

    async fn is_game_over(&mut self) -> Result<bool, AutopilotError> {
        let state = self.0.state();
        Ok(state.game_over || state.game_over_at.is_some_and(|n| state.moves.len() >= n))
    }

    async fn is_puzzle_mode(&mut self) -> Result<bool, AutopilotError> {
        Ok(self.0.state().puzzle)
    }

    async fn advance_puzzle(&mut self) -> Result<bool, AutopilotError> {
        let mut state = self.0.state();
        match state.next_puzzle.take() {
            Some(moves) => {
                state.moves = moves;
                state.puzzle = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn player_color(&mut self) -> Result<Option<Color>, AutopilotError> {
        Ok(self.0.state().color)
    }

    fn board_handle(&self) -> BoardHandle {
        BoardHandle::new("fake-board")
    }
}

pub struct FakeSurface(pub FakeBoard);

#[async_trait]
impl RemoteSurface for FakeSurface {
    async fn probe_connectivity(&mut self) -> Result<Option<FaultKind>, AutopilotError> {
        let mut state = self.0.state();
        state.probes += 1;
        Ok(state.fault)
    }

    async fn click_reconnect(&mut self) -> Result<bool, AutopilotError> {
        self.0.state().reconnect_clicks += 1;
        Ok(false)
    }

    async fn reload(&mut self) -> Result<(), AutopilotError> {
        self.0.state().reloads += 1;
        Ok(())
    }

    async fn probe_actuation_error(&mut self) -> Result<Option<String>, AutopilotError> {
        Ok(self.0.state().actuation_error.clone())
    }

    async fn read_position(&mut self) -> Result<Option<String>, AutopilotError> {
        Ok(self.0.state().fen.clone())
    }

    async fn dismiss_overlays(&mut self) -> Result<(), AutopilotError> {
        Ok(())
    }
}

/// Dispatches by writing straight to the fake board.
pub struct BoardStrategy(pub FakeBoard);

#[async_trait]
impl ActuationStrategy for BoardStrategy {
    fn id(&self) -> &'static str {
        "fake_board"
    }

    async fn attempt(
        &self,
        candidate: &CandidateMove,
        _board: &BoardHandle,
        _modes: &ModeFlags,
    ) -> Result<bool, AutopilotError> {
        let mut state = self.0.state();
        state.dispatched.push(candidate.uci());
        if state.accept_moves {
            let mut shown = vec![candidate.uci()];
            shown.extend(state.replies.pop_front());
            if std::mem::take(&mut state.lands_late) {
                state.landing.extend(shown);
            } else {
                state.moves.extend(shown);
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct OracleState {
    /// Answers to full-depth searches, consumed in order
    pub answers: VecDeque<Option<String>>,
    /// Answer once `answers` runs dry
    pub fallback: Option<String>,
    /// Answer to any search with an explicit depth
    pub shallow: Option<String>,
    /// Depth of every `best_move` call
    pub searches: Vec<Option<u32>>,
    /// `set_position`, `reset` and `apply` calls, in order
    pub log: Vec<String>,
    pub reset_fails: bool,
}

#[derive(Clone, Default)]
pub struct ScriptedOracle(Arc<Mutex<OracleState>>);

impl ScriptedOracle {
    pub fn answering(fallback: Option<&str>) -> Self {
        let oracle = Self::default();
        oracle.state().fallback = fallback.map(str::to_string);
        oracle
    }

    pub fn state(&self) -> MutexGuard<'_, OracleState> {
        self.0.lock().unwrap()
    }
}

#[async_trait]
impl MoveOracle for ScriptedOracle {
    async fn best_move(&mut self, depth: Option<u32>) -> Result<Option<String>, AutopilotError> {
        let mut state = self.state();
        state.searches.push(depth);
        if depth.is_some() {
            if let Some(shallow) = state.shallow.clone() {
                return Ok(Some(shallow));
            }
        }
        match state.answers.pop_front() {
            Some(answer) => Ok(answer),
            None => Ok(state.fallback.clone()),
        }
    }

    async fn set_position(&mut self, fen: &str) -> Result<(), AutopilotError> {
        self.state().log.push(format!("position {fen}"));
        Ok(())
    }

    async fn reset_to_initial(&mut self) -> Result<(), AutopilotError> {
        let mut state = self.state();
        if state.reset_fails {
            return Err(AutopilotError::EngineMissing("/usr/local/bin/stockfish".into()));
        }
        state.log.push("reset".into());
        Ok(())
    }

    async fn apply_move(&mut self, uci: &str) -> Result<(), AutopilotError> {
        self.state().log.push(format!("apply {uci}"));
        Ok(())
    }
}

/// Short delays so paused-clock tests stay readable in logs.
pub fn test_config() -> ControllerConfig {
    ControllerConfig {
        poll_interval: Duration::from_millis(10),
        settle_delay: Duration::from_millis(50),
        oracle_retry_delay: Duration::from_millis(10),
        reconnect_wait: Duration::from_millis(100),
        reload_wait: Duration::from_millis(100),
        recovery_delay: Duration::from_millis(100),
        ..ControllerConfig::default()
    }
}

pub fn collaborators(board: &FakeBoard, oracle: &ScriptedOracle) -> Collaborators {
    Collaborators {
        observer: Box::new(FakeObserver(board.clone())),
        surface: Box::new(FakeSurface(board.clone())),
        oracle: Box::new(oracle.clone()),
        strategies: vec![Box::new(BoardStrategy(board.clone()))],
    }
}

pub async fn start(
    platform: Platform,
    modes: ModeFlags,
    board: &FakeBoard,
    oracle: &ScriptedOracle,
) -> (Result<Controller, AutopilotError>, HostHandle) {
    let (host, link) = host_channel();
    let controller = Controller::start(
        platform,
        modes,
        collaborators(board, oracle),
        test_config(),
        link,
    )
    .await;
    (controller, host)
}

/// Start on Lichess with default modes; panics if startup fails.
pub async fn started(board: &FakeBoard, oracle: &ScriptedOracle) -> (Controller, HostHandle) {
    match start(Platform::Lichess, ModeFlags::default(), board, oracle).await {
        (Ok(controller), host) => (controller, host),
        (Err(e), _) => panic!("controller failed to start: {e}"),
    }
}

/// Step until `done` holds, at most `limit` transitions.
pub async fn step_until(
    controller: &mut Controller,
    limit: usize,
    mut done: impl FnMut(&Controller) -> bool,
) -> bool {
    for _ in 0..limit {
        if done(controller) {
            return true;
        }
        controller.step().await;
    }
    done(controller)
}

pub fn confirmed_indices(events: &[HostEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            HostEvent::MoveConfirmed { index, .. } => Some(*index),
            _ => None,
        })
        .collect()
}
