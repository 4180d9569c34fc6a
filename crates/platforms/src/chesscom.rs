//! Chess.com: `wc-chess-board` element and its game client.
//!
//! The move list is read from the board's TCN data when available, so it
//! arrives as SAN regardless of how the page renders it.

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
    platform: Platform::ChessCom,
    board_selectors: &["wc-chess-board", "chess-board", "#board-layout-chessboard .board", ".board"],
    color: &[
        Probe {
            name: "board_flipped",
            script: r#"
                const board = document.querySelector('wc-chess-board, chess-board');
                if (!board) return null;
                return board.classList.contains('flipped') ? 'black' : 'white';
            "#,
        },
        Probe {
            name: "layout_orientation",
            script: r#"
                const layout = document.querySelector('.board-layout-chessboard');
                const o = layout && layout.getAttribute('data-board-orientation');
                return o === 'white' || o === 'black' ? o : null;
            "#,
        },
        Probe {
            name: "bottom_clock",
            script: r#"
                const bottom = document.querySelector('.clock-bottom');
                if (!bottom) return null;
                if (bottom.classList.contains('clock-white')) return 'white';
                if (bottom.classList.contains('clock-black')) return 'black';
                return null;
            "#,
        },
    ],
    move_list: &[
        Probe {
            name: "board_game_tcn",
            script: r#"
                const board = document.querySelector('wc-chess-board, chess-board');
                const game = board && board.game;
                if (!game || !game.getTCNData) return null;
                return { tcn: game.getTCNData() };
            "#,
        },
        Probe {
            name: "game_client_san",
            script: r#"
                const client = window.chesscom && window.chesscom.gameClient;
                if (!client || !client.getGameData) return null;
                const data = client.getGameData();
                return data && data.moveList ? data.moveList.map(m => m.san) : null;
            "#,
        },
        Probe {
            name: "move_nodes",
            script: r#"
                const list = document.querySelector('wc-simple-move-list, .move-list, vertical-move-list');
                if (!list) return null;
                return Array.from(list.querySelectorAll('.node .white, .node .black, .move .white, .move .black'))
                    .map(e => e.textContent.trim())
                    .filter(t => t !== '');
            "#,
        },
    ],
    game_over: &[Probe {
        name: "game_over_modal",
        script: r#"
            const modal = document.querySelector('.game-over-modal, .game-result-component, .game-over-header');
            return modal && modal.offsetParent !== null ? true : null;
        "#,
    }],
    puzzle_solved: &[Probe {
        name: "puzzle_solved_banner",
        script: r#"
            const done = document.querySelector('.puzzle-complete, [data-cy="puzzle-solved"], .daily-puzzle-complete');
            return done ? true : null;
        "#,
    }],
    puzzle_next: &[Probe {
        name: "next_puzzle_button",
        script: r#"
            const labels = ['next', 'next puzzle', 'continue'];
            const btn = Array.from(document.querySelectorAll('button'))
                .find(b => labels.includes(b.innerText.trim().toLowerCase()));
            if (!btn) return null;
            btn.click();
            return true;
        "#,
    }],
    position: &[Probe {
        name: "board_game_fen",
        script: r#"
            const board = document.querySelector('wc-chess-board, chess-board');
            const game = board && board.game;
            if (game && game.getFEN) return game.getFEN();
            return board ? board.getAttribute('fen') : null;
        "#,
    }],
    connectivity: &[Probe {
        name: "reconnecting_text",
        script: r#"
            const body = (document.body ? document.body.innerText : '').toLowerCase();
            return body.includes('reconnecting') || body.includes('connection lost')
                ? 'socket_disconnected' : null;
        "#,
    }],
    reconnect: &[Probe {
        name: "reconnect_button",
        script: r#"
            const btn = Array.from(document.querySelectorAll('button'))
                .find(b => b.innerText.trim().toLowerCase() === 'reconnect');
            if (!btn) return null;
            btn.click();
            return true;
        "#,
    }],
    promotion: &[Probe {
        name: "promotion_window",
        script: r#"
            const role = arguments[0];
            let piece = document.querySelector('.promotion-piece.w' + role + ', .promotion-piece.b' + role);
            if (!piece) {
                const order = { q: 0, n: 1, r: 2, b: 3 };
                piece = document.querySelectorAll('.promotion-piece')[order[role]];
            }
            if (!piece) return null;
            piece.click();
            return true;
        "#,
    }],
};

/// Hands the move to the page's game client.
const CLIENT_MOVE: &str = r#"
    const client = window.chesscom && window.chesscom.gameClient;
    if (!client || !client.makeMove) return false;
    client.makeMove(arguments[0]);
    return true;
"#;

pub fn client_move(candidate: &CandidateMove) -> Value {
    let mut mv = json!({ "from": candidate.from.to_string(), "to": candidate.to.to_string() });
    if let Some(role) = candidate.promotion {
        mv["promotion"] = json!(role.char().to_string());
    }
    mv
}

pub struct GameClientStrategy {
    driver: Arc<WebDriver>,
}

#[async_trait]
impl ActuationStrategy for GameClientStrategy {
    fn id(&self) -> &'static str {
        "chesscom_game_client"
    }

    async fn attempt(
        &self,
        candidate: &CandidateMove,
        _board: &BoardHandle,
        _modes: &ModeFlags,
    ) -> Result<bool, AutopilotError> {
        let sent = self
            .driver
            .execute(CLIENT_MOVE, vec![client_move(candidate)])
            .await?;
        Ok(sent.as_bool().unwrap_or(false))
    }
}

pub fn adapter(driver: Arc<WebDriver>) -> PlatformAdapter {
    PlatformAdapter {
        observer: Box::new(PageObserver::new(driver.clone(), &PROFILE)),
        surface: Box::new(PageSurface::new(driver.clone(), &PROFILE)),
        strategies: vec![
            Box::new(GameClientStrategy {
                driver: driver.clone(),
            }),
            Box::new(DomClickStrategy::new(driver.clone(), &PROFILE)),
            Box::new(PointerDragStrategy::new(driver, &PROFILE)),
        ],
    }
}
