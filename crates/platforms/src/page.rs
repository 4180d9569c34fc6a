//! Observer, surface and generic actuation strategies over a browser page.
//!
//! Everything platform specific lives in a [`PlatformProfile`]: the board
//! selectors and the probe scripts for each read. The types here only run
//! probes and interpret their answers.

use std::sync::Arc;

use async_trait::async_trait;
use autopilot::{
    ActuationStrategy, AutopilotError, BoardHandle, BoardObserver, CandidateMove, Color, FaultKind,
    ModeFlags, Platform, RemoteSurface,
};
use chess_core::{notation, tcn};
use serde_json::{json, Value};
use shakmaty::Role;
use tracing::{debug, info};

use crate::probe::{first_confident, Probe};
use crate::webdriver::{element_arg, ScriptRunner, WebDriver};

/// Selectors and probe scripts for one platform.
pub struct PlatformProfile {
    pub platform: Platform,
    /// Tried in order when attaching
    pub board_selectors: &'static [&'static str],
    /// `"white"` or `"black"`
    pub color: &'static [Probe],
    /// Array of move texts, or `{ "tcn": "..." }`
    pub move_list: &'static [Probe],
    pub game_over: &'static [Probe],
    /// A solved puzzle waiting for the next one
    pub puzzle_solved: &'static [Probe],
    /// Clicks the next-puzzle control
    pub puzzle_next: &'static [Probe],
    /// FEN of the displayed position
    pub position: &'static [Probe],
    /// Fault name, see [`parse_fault`]
    pub connectivity: &'static [Probe],
    /// Clicks an in-page reconnect control
    pub reconnect: &'static [Probe],
    /// Clicks the promotion piece given as `arguments[0]` (`q`, `r`, `b`, `n`)
    pub promotion: &'static [Probe],
}

/// Browser error pages look the same on every site.
const BROWSER_ERRORS: &[Probe] = &[
    Probe {
        name: "chrome_error_page",
        script: r#"
            const text = document.body ? document.body.innerText : '';
            const codes = ['ERR_INTERNET_DISCONNECTED', 'ERR_CONNECTION_RESET',
                'ERR_CONNECTION_REFUSED', 'ERR_NAME_NOT_RESOLVED'];
            if (document.querySelector('.error-code') && codes.some(c => text.includes(c))) {
                return 'transport_error';
            }
            return null;
        "#,
    },
    Probe {
        name: "chrome_offline_page",
        script: r#"
            if (document.querySelector('.icon-offline, .offline-content')) return 'transport_error';
            return null;
        "#,
    },
];

const ACTUATION_ERRORS: &[Probe] = &[
    Probe {
        name: "error_elements",
        script: r#"
            const phrases = ['illegal', 'invalid', 'not your turn'];
            for (const el of document.querySelectorAll('.error, .bad, .nope, .toast, .notification, .notify-app')) {
                const text = (el.innerText || '').toLowerCase();
                if (phrases.some(p => text.includes(p))) return el.innerText.trim();
            }
            return null;
        "#,
    },
    Probe {
        name: "page_text",
        script: r#"
            const body = (document.body ? document.body.innerText : '').toLowerCase();
            const phrases = ['illegal move', 'invalid move', 'not your turn', 'illegal position', 'cannot move'];
            const hit = phrases.find(p => body.includes(p));
            return hit ? 'page: ' + hit : null;
        "#,
    },
];

const DISMISS_OVERLAYS: &str = r#"
    const closers = document.querySelectorAll(
        '.modal .close, .modal-close, .dialog-close, [aria-label="Close"], .toast .close');
    closers.forEach(b => b.click());
    document.body.dispatchEvent(new KeyboardEvent('keydown', { key: 'Escape', bubbles: true }));
    return closers.length;
"#;

/// Viewport centers of two squares of the board passed as `arguments[0]`.
const SQUARE_CENTERS: &str = r#"
    const board = arguments[0];
    if (!board) return null;
    const r = board.getBoundingClientRect();
    const s = r.width / 8;
    const flipped = !!document.querySelector(
        '.cg-wrap.orientation-black, wc-chess-board.flipped, chess-board.flipped');
    const center = (sq) => {
        const f = sq.charCodeAt(0) - 97;
        const k = parseInt(sq[1], 10) - 1;
        const col = flipped ? 7 - f : f;
        const row = flipped ? k : 7 - k;
        return [Math.round(r.left + s * col + s / 2), Math.round(r.top + s * row + s / 2)];
    };
    return { from: center(arguments[1]), to: center(arguments[2]) };
"#;

/// Click-click move through synthetic events at two viewport points.
const DISPATCH_CLICKS: &str = r#"
    const fire = (x, y) => {
        const el = document.elementFromPoint(x, y);
        if (!el) return false;
        const init = { bubbles: true, cancelable: true, clientX: x, clientY: y, button: 0, view: window };
        for (const type of ['pointerdown', 'mousedown', 'pointerup', 'mouseup']) {
            const Ctor = type.startsWith('pointer') ? PointerEvent : MouseEvent;
            el.dispatchEvent(new Ctor(type, init));
        }
        return true;
    };
    return fire(arguments[0], arguments[1]) && fire(arguments[2], arguments[3]);
"#;

/// Result tokens a move list may end with.
const RESULT_TOKENS: &[&str] = &["1-0", "0-1", "1/2-1/2", "½-½", "*"];

/// Words only found in end-of-game banners rendered inside the move list.
const BANNER_WORDS: &[&str] = &[
    "abort", "abandon", "resign", "wins", "won", "victory", "defeat", "draw", "time",
    "checkmate", "stalemate", "agreed", "insufficient", "repetition",
];

/// Move list entries that are known not to be moves: results, banners,
/// bare move numbers and clocks.
fn is_list_decoration(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() || RESULT_TOKENS.contains(&text) {
        return true;
    }
    if text.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ':') {
        return true;
    }
    let lower = text.to_lowercase();
    BANNER_WORDS.iter().any(|word| lower.contains(word))
}

/// Interpret a move list probe answer.
///
/// Anything that is neither a move nor a known decoration is an error:
/// dropping it would shift the ply count.
pub fn parse_move_list(value: Value) -> Result<Vec<String>, AutopilotError> {
    match value {
        Value::Array(items) => {
            let mut moves = Vec::with_capacity(items.len());
            for item in &items {
                let Some(text) = item.as_str() else {
                    return Err(AutopilotError::Observation(format!(
                        "move list entry is not text: {item}"
                    )));
                };
                if is_list_decoration(text) {
                    continue;
                }
                if !notation::is_move_text(text) {
                    return Err(AutopilotError::Observation(format!(
                        "unrecognized move list entry '{text}'"
                    )));
                }
                moves.push(notation::normalize(text));
            }
            Ok(moves)
        }
        Value::Object(map) => match map.get("tcn").and_then(Value::as_str) {
            Some(encoded) => Ok(tcn::decode_tcn_to_san(encoded)?),
            None => Err(AutopilotError::Observation(
                "move list object without tcn".into(),
            )),
        },
        other => Err(AutopilotError::Observation(format!(
            "unexpected move list shape: {other}"
        ))),
    }
}

/// Fault names used by connectivity probes.
pub fn parse_fault(name: &str) -> Option<FaultKind> {
    match name {
        "transport_error" => Some(FaultKind::TransportError),
        "session_lost" => Some(FaultKind::SessionLost),
        "severe_lag" => Some(FaultKind::SevereLag),
        "socket_disconnected" => Some(FaultKind::SocketDisconnected),
        _ => None,
    }
}

fn parse_color(value: &Value) -> Option<Color> {
    match value.as_str()? {
        "white" | "w" => Some(Color::White),
        "black" | "b" => Some(Color::Black),
        _ => None,
    }
}

fn board_args(board: &BoardHandle) -> Vec<Value> {
    if board.as_str().is_empty() {
        vec![Value::Null]
    } else {
        vec![element_arg(board.as_str())]
    }
}

pub struct PageObserver {
    driver: Arc<WebDriver>,
    profile: &'static PlatformProfile,
    board: Option<BoardHandle>,
}

impl PageObserver {
    pub fn new(driver: Arc<WebDriver>, profile: &'static PlatformProfile) -> Self {
        Self {
            driver,
            profile,
            board: None,
        }
    }

    async fn probe(&self, probes: &[Probe]) -> Result<Option<Value>, AutopilotError> {
        let args = board_args(&self.board_handle());
        Ok(first_confident(self.driver.as_ref(), probes, &args)
            .await?
            .map(|(_, value)| value))
    }
}

#[async_trait]
impl BoardObserver for PageObserver {
    async fn attach(&mut self) -> Result<(), AutopilotError> {
        for selector in self.profile.board_selectors {
            if let Some(id) = self.driver.find_css(selector).await? {
                info!(platform = %self.profile.platform, selector, "Board attached");
                self.board = Some(BoardHandle::new(id));
                return Ok(());
            }
        }
        self.board = None;
        Err(AutopilotError::BoardNotFound(format!(
            "no {} board on the page",
            self.profile.platform
        )))
    }

    async fn move_list(&mut self) -> Result<Vec<String>, AutopilotError> {
        match self.probe(self.profile.move_list).await? {
            Some(value) => parse_move_list(value),
            None => Err(AutopilotError::Observation("move list not found".into())),
        }
    }

    async fn is_game_over(&mut self) -> Result<bool, AutopilotError> {
        Ok(self.probe(self.profile.game_over).await?.is_some())
    }

    async fn is_puzzle_mode(&mut self) -> Result<bool, AutopilotError> {
        Ok(self.probe(self.profile.puzzle_solved).await?.is_some())
    }

    async fn advance_puzzle(&mut self) -> Result<bool, AutopilotError> {
        Ok(self.probe(self.profile.puzzle_next).await?.is_some())
    }

    async fn player_color(&mut self) -> Result<Option<Color>, AutopilotError> {
        Ok(self
            .probe(self.profile.color)
            .await?
            .as_ref()
            .and_then(parse_color))
    }

    fn board_handle(&self) -> BoardHandle {
        self.board.clone().unwrap_or_else(|| BoardHandle::new(""))
    }
}

pub struct PageSurface {
    driver: Arc<WebDriver>,
    profile: &'static PlatformProfile,
}

impl PageSurface {
    pub fn new(driver: Arc<WebDriver>, profile: &'static PlatformProfile) -> Self {
        Self { driver, profile }
    }
}

#[async_trait]
impl RemoteSurface for PageSurface {
    async fn probe_connectivity(&mut self) -> Result<Option<FaultKind>, AutopilotError> {
        for probes in [BROWSER_ERRORS, self.profile.connectivity] {
            if let Some((name, value)) = first_confident(self.driver.as_ref(), probes, &[]).await? {
                let fault = value.as_str().and_then(parse_fault);
                debug!(probe = name, ?fault, "Connectivity probe hit");
                if fault.is_some() {
                    return Ok(fault);
                }
            }
        }
        Ok(None)
    }

    async fn click_reconnect(&mut self) -> Result<bool, AutopilotError> {
        Ok(first_confident(self.driver.as_ref(), self.profile.reconnect, &[])
            .await?
            .is_some())
    }

    async fn reload(&mut self) -> Result<(), AutopilotError> {
        info!(platform = %self.profile.platform, "Reloading page");
        self.driver.refresh().await
    }

    async fn probe_actuation_error(&mut self) -> Result<Option<String>, AutopilotError> {
        Ok(first_confident(self.driver.as_ref(), ACTUATION_ERRORS, &[])
            .await?
            .and_then(|(_, value)| value.as_str().map(str::to_string)))
    }

    async fn read_position(&mut self) -> Result<Option<String>, AutopilotError> {
        Ok(first_confident(self.driver.as_ref(), self.profile.position, &[])
            .await?
            .and_then(|(_, value)| value.as_str().map(str::to_string)))
    }

    async fn dismiss_overlays(&mut self) -> Result<(), AutopilotError> {
        let closed = self.driver.execute(DISMISS_OVERLAYS, Vec::new()).await?;
        debug!(%closed, "Overlays dismissed");
        Ok(())
    }
}

/// Viewport centers of the candidate's squares on `board`.
async fn square_centers(
    driver: &WebDriver,
    candidate: &CandidateMove,
    board: &BoardHandle,
) -> Result<Option<((i64, i64), (i64, i64))>, AutopilotError> {
    let mut args = board_args(board);
    args.push(json!(candidate.from.to_string()));
    args.push(json!(candidate.to.to_string()));

    let value = driver.execute(SQUARE_CENTERS, args).await?;
    let point = |key: &str| -> Option<(i64, i64)> {
        let xy = value.get(key)?.as_array()?;
        Some((xy.first()?.as_i64()?, xy.get(1)?.as_i64()?))
    };
    Ok(point("from").zip(point("to")))
}

/// Pick the promotion piece through the profile's promotion probes.
async fn click_promotion(
    driver: &WebDriver,
    profile: &PlatformProfile,
    candidate: &CandidateMove,
) -> Result<bool, AutopilotError> {
    let role = candidate.promotion.unwrap_or(Role::Queen);
    let args = [json!(role.char().to_string())];
    Ok(first_confident(driver, profile.promotion, &args)
        .await?
        .is_some())
}

/// Synthetic pointer and mouse events dispatched from page script. Works
/// without moving the real pointer.
pub struct DomClickStrategy {
    driver: Arc<WebDriver>,
    profile: &'static PlatformProfile,
}

impl DomClickStrategy {
    pub fn new(driver: Arc<WebDriver>, profile: &'static PlatformProfile) -> Self {
        Self { driver, profile }
    }
}

#[async_trait]
impl ActuationStrategy for DomClickStrategy {
    fn id(&self) -> &'static str {
        "dom_click"
    }

    async fn attempt(
        &self,
        candidate: &CandidateMove,
        board: &BoardHandle,
        _modes: &ModeFlags,
    ) -> Result<bool, AutopilotError> {
        let Some(((fx, fy), (tx, ty))) = square_centers(&self.driver, candidate, board).await? else {
            return Ok(false);
        };
        let sent = self
            .driver
            .execute(DISPATCH_CLICKS, vec![json!(fx), json!(fy), json!(tx), json!(ty)])
            .await?;
        Ok(sent.as_bool().unwrap_or(false))
    }

    async fn choose_promotion(
        &self,
        candidate: &CandidateMove,
        _board: &BoardHandle,
        _modes: &ModeFlags,
    ) -> Result<bool, AutopilotError> {
        click_promotion(&self.driver, self.profile, candidate).await
    }
}

/// Real pointer drag through the WebDriver actions API.
pub struct PointerDragStrategy {
    driver: Arc<WebDriver>,
    profile: &'static PlatformProfile,
}

impl PointerDragStrategy {
    pub fn new(driver: Arc<WebDriver>, profile: &'static PlatformProfile) -> Self {
        Self { driver, profile }
    }
}

/// Intermediate pointer moves of a human-like drag.
const HUMAN_STEPS: i64 = 6;

/// Action sequence for a press at `from`, drag, release at `to`.
///
/// Human-like drags ease in and out over several short moves instead of
/// jumping straight to the target.
pub fn drag_actions(from: (i64, i64), to: (i64, i64), human_like: bool) -> Value {
    let mv = |x: i64, y: i64, duration: u64| {
        json!({ "type": "pointerMove", "origin": "viewport", "x": x, "y": y, "duration": duration })
    };

    let mut steps = vec![mv(from.0, from.1, 0), json!({ "type": "pointerDown", "button": 0 })];
    if human_like {
        for i in 1..HUMAN_STEPS {
            let t = i as f64 / HUMAN_STEPS as f64;
            let eased = t * t * (3.0 - 2.0 * t);
            let x = from.0 + ((to.0 - from.0) as f64 * eased).round() as i64;
            let y = from.1 + ((to.1 - from.1) as f64 * eased).round() as i64;
            steps.push(mv(x, y, 40));
        }
    }
    steps.push(mv(to.0, to.1, if human_like { 60 } else { 0 }));
    steps.push(json!({ "type": "pointerUp", "button": 0 }));

    json!([{
        "type": "pointer",
        "id": "mouse",
        "parameters": { "pointerType": "mouse" },
        "actions": steps,
    }])
}

#[async_trait]
impl ActuationStrategy for PointerDragStrategy {
    fn id(&self) -> &'static str {
        "pointer_drag"
    }

    fn requires_pointer(&self) -> bool {
        true
    }

    async fn attempt(
        &self,
        candidate: &CandidateMove,
        board: &BoardHandle,
        modes: &ModeFlags,
    ) -> Result<bool, AutopilotError> {
        let Some((from, to)) = square_centers(&self.driver, candidate, board).await? else {
            return Ok(false);
        };
        self.driver
            .perform_actions(drag_actions(from, to, modes.human_like))
            .await?;
        self.driver.release_actions().await?;
        Ok(true)
    }

    async fn choose_promotion(
        &self,
        candidate: &CandidateMove,
        _board: &BoardHandle,
        _modes: &ModeFlags,
    ) -> Result<bool, AutopilotError> {
        click_promotion(&self.driver, self.profile, candidate).await
    }
}
