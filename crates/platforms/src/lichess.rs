//! Lichess: chessground board, socket move messages.

use std::sync::Arc;

use async_trait::async_trait;
use autopilot::{
    ActuationStrategy, AutopilotError, BoardHandle, CandidateMove, ModeFlags, Platform,
};
use serde_json::{json, Value};

use crate::page::{DomClickStrategy, PageObserver, PageSurface, PlatformProfile, PointerDragStrategy};
use crate::probe::Probe;
use crate::webdriver::{ScriptRunner, WebDriver};
use crate::PlatformAdapter;

pub static PROFILE: PlatformProfile = PlatformProfile {
    platform: Platform::Lichess,
    board_selectors: &["main .round__app cg-container", "main .puzzle__board cg-container", "cg-container"],
    color: &[
        Probe {
            name: "wrap_orientation",
            script: r#"
                const wrap = document.querySelector('.cg-wrap');
                if (!wrap) return null;
                if (wrap.classList.contains('orientation-white')) return 'white';
                if (wrap.classList.contains('orientation-black')) return 'black';
                return null;
            "#,
        },
        Probe {
            name: "rank_coords",
            script: r#"
                const ranks = document.querySelector('cg-container coords.ranks');
                if (!ranks) return null;
                return ranks.classList.contains('black') ? 'black' : 'white';
            "#,
        },
    ],
    move_list: &[
        Probe {
            name: "round_moves",
            script: r#"
                const rm = document.querySelector('rm6');
                if (!rm) return null;
                const list = rm.querySelector('l4x');
                if (!list) return [];
                return Array.from(list.querySelectorAll('kwdb, move')).map(e => e.textContent);
            "#,
        },
        Probe {
            name: "puzzle_moves",
            script: r#"
                const tree = document.querySelector('.puzzle__moves .tview2');
                if (!tree) return null;
                return Array.from(tree.querySelectorAll('move san')).map(e => e.textContent);
            "#,
        },
    ],
    game_over: &[
        Probe {
            name: "round_status",
            script: r#"
                const status = document.querySelector('.rcontrols .follow-up, main aside section.status, .result-wrap');
                return status ? true : null;
            "#,
        },
        Probe {
            name: "result_text",
            script: r#"
                const box = document.querySelector('rm6 .result-wrap, rm6 p.result');
                if (!box) return null;
                const text = box.innerText.toLowerCase();
                const words = ['aborted', 'victory', 'defeat', 'draw', 'checkmate', 'stalemate', 'time'];
                return words.some(w => text.includes(w)) ? true : null;
            "#,
        },
    ],
    puzzle_solved: &[Probe {
        name: "puzzle_complete",
        script: r#"
            const fb = document.querySelector('.puzzle__feedback');
            if (!fb) return null;
            return fb.classList.contains('after') || fb.classList.contains('complete') ? true : null;
        "#,
    }],
    puzzle_next: &[Probe {
        name: "continue_training",
        script: r#"
            const next = document.querySelector('.puzzle__feedback .continue, .puzzle__feedback a.button');
            if (!next) return null;
            next.click();
            return true;
        "#,
    }],
    position: &[
        Probe {
            name: "analyse_api",
            script: r#"
                if (window.lichess && window.lichess.analyse && window.lichess.analyse.getFen) {
                    return window.lichess.analyse.getFen();
                }
                return null;
            "#,
        },
        Probe {
            name: "board_data_fen",
            script: r#"
                const board = document.querySelector('cg-board[data-fen], input[data-fen]');
                return board ? board.getAttribute('data-fen') : null;
            "#,
        },
    ],
    connectivity: &[
        Probe {
            name: "connection_lost_banner",
            script: r#"
                return document.querySelector('.connection-lost, #network-status.offline')
                    ? 'socket_disconnected' : null;
            "#,
        },
        Probe {
            name: "severe_lag",
            script: r#"
                const lag = document.querySelector('.lag');
                return lag && lag.classList.contains('severe') ? 'severe_lag' : null;
            "#,
        },
        Probe {
            name: "disconnect_text",
            script: r#"
                const body = (document.body ? document.body.innerText : '').toLowerCase();
                return body.includes('socket disconnected') || body.includes('connection lost')
                    ? 'socket_disconnected' : null;
            "#,
        },
    ],
    reconnect: &[
        Probe {
            name: "reconnect_button",
            script: r#"
                const btn = document.querySelector('.reconnect, .connection-lost button, .reload-button');
                if (!btn) return null;
                btn.click();
                return true;
            "#,
        },
    ],
    promotion: &[Probe {
        name: "promotion_choice",
        script: r#"
            const names = { q: 'queen', r: 'rook', b: 'bishop', n: 'knight' };
            const piece = document.querySelector('#promotion-choice piece.' + names[arguments[0]]);
            if (!piece) return null;
            const square = piece.closest('square') || piece;
            square.dispatchEvent(new MouseEvent('mousedown', { bubbles: true }));
            square.dispatchEvent(new MouseEvent('click', { bubbles: true }));
            return true;
        "#,
    }],
};

/// Sends the move over the page's own websocket.
const SOCKET_SEND: &str = r#"
    const ws = window.lichess && window.lichess.socket && window.lichess.socket.ws;
    if (!ws || ws.readyState !== 1) return false;
    ws.send(JSON.stringify(arguments[0]));
    return true;
"#;

/// Round-socket message for a move, or a premove when `premove` is set.
pub fn socket_message(candidate: &CandidateMove, premove: bool) -> Value {
    if premove {
        return json!({
            "t": "premove",
            "d": { "orig": candidate.from.to_string(), "dest": candidate.to.to_string() }
        });
    }
    let mut d = json!({ "u": candidate.uci(), "b": 1, "a": candidate.base_len });
    if let Some(role) = candidate.promotion {
        d["p"] = json!(role.char().to_string());
    }
    json!({ "t": "move", "d": d })
}

pub struct SocketMoveStrategy {
    driver: Arc<WebDriver>,
}

#[async_trait]
impl ActuationStrategy for SocketMoveStrategy {
    fn id(&self) -> &'static str {
        "lichess_socket"
    }

    async fn attempt(
        &self,
        candidate: &CandidateMove,
        _board: &BoardHandle,
        modes: &ModeFlags,
    ) -> Result<bool, AutopilotError> {
        let message = socket_message(candidate, modes.premove_only);
        let sent = self.driver.execute(SOCKET_SEND, vec![message]).await?;
        Ok(sent.as_bool().unwrap_or(false))
    }
}

pub fn adapter(driver: Arc<WebDriver>) -> PlatformAdapter {
    PlatformAdapter {
        observer: Box::new(PageObserver::new(driver.clone(), &PROFILE)),
        surface: Box::new(PageSurface::new(driver.clone(), &PROFILE)),
        strategies: vec![
            Box::new(SocketMoveStrategy {
                driver: driver.clone(),
            }),
            Box::new(DomClickStrategy::new(driver.clone(), &PROFILE)),
            Box::new(PointerDragStrategy::new(driver, &PROFILE)),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_move_message() {
        let candidate = CandidateMove::from_uci("e7e8q", 42).unwrap();
        let msg = socket_message(&candidate, false);
        assert_eq!(msg["t"], "move");
        assert_eq!(msg["d"]["u"], "e7e8q");
        assert_eq!(msg["d"]["a"], 42);
        assert_eq!(msg["d"]["p"], "q");
    }

    #[test]
    fn test_socket_premove_message() {
        let candidate = CandidateMove::from_uci("g1f3", 0).unwrap();
        let msg = socket_message(&candidate, true);
        assert_eq!(msg["t"], "premove");
        assert_eq!(msg["d"]["orig"], "g1");
        assert_eq!(msg["d"]["dest"], "f3");
    }
}
