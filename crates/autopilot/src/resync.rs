//! Resynchronizer: rebuild the oracle's position from what the platform shows.

use std::time::Duration;

use chess_core::GameReplay;
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::error::{bounded, AutopilotError};
use crate::moves::MoveList;
use crate::observer::BoardObserver;
use crate::oracle::MoveOracle;
use crate::session::Color;
use crate::surface::RemoteSurface;

/// Which path a successful resync took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResyncOutcome {
    /// Position read from the surface and loaded verbatim
    Imported { fen: String },
    /// Oracle reset and every move replayed
    Replayed { moves: usize },
}

/// Ground truth after a successful resync; the controller adopts it whole.
#[derive(Debug, Clone)]
pub struct Resynced {
    pub outcome: ResyncOutcome,
    pub mirror: MoveList,
    pub replay: GameReplay,
}

pub struct Resynchronizer {
    call_timeout: Duration,
    oracle_timeout: Duration,
}

impl Resynchronizer {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            call_timeout: config.call_timeout,
            oracle_timeout: config.oracle_timeout,
        }
    }

    /// Re-derive the oracle position from the observer's move list.
    ///
    /// Prefers a position import; falls back to a full replay, which aborts
    /// on the first move that does not resolve. Running it twice with no
    /// new moves leaves the oracle in the same position.
    pub async fn resync(
        &self,
        observer: &mut dyn BoardObserver,
        surface: &mut dyn RemoteSurface,
        oracle: &mut dyn MoveOracle,
    ) -> Result<Resynced, AutopilotError> {
        let texts = bounded(self.call_timeout, observer.move_list()).await?;
        let mirror = MoveList::from_texts(&texts);

        if let Some(replay) = self.import_position(surface, mirror.len()).await {
            let fen = replay.base_fen().unwrap_or_default().to_string();
            bounded(self.oracle_timeout, oracle.set_position(&fen))
                .await
                .map_err(AutopilotError::into_engine)?;
            info!(ply = mirror.len(), "Oracle position imported");
            return Ok(Resynced {
                outcome: ResyncOutcome::Imported { fen },
                mirror,
                replay,
            });
        }

        let mut replay = GameReplay::new();
        let ucis = replay.advance(&mirror.texts()).map_err(|e| {
            warn!(error = %e, "Move list replay aborted");
            e
        })?;

        bounded(self.oracle_timeout, oracle.reset_to_initial())
            .await
            .map_err(AutopilotError::into_engine)?;
        for uci in &ucis {
            bounded(self.oracle_timeout, oracle.apply_move(uci))
                .await
                .map_err(AutopilotError::into_engine)?;
        }
        info!(ply = ucis.len(), "Oracle position replayed");

        Ok(Resynced {
            outcome: ResyncOutcome::Replayed { moves: ucis.len() },
            mirror,
            replay,
        })
    }

    /// Read a FEN from the surface, if it parses and agrees with the list on
    /// the side to move.
    async fn import_position(&self, surface: &mut dyn RemoteSurface, ply: usize) -> Option<GameReplay> {
        let fen = match bounded(self.call_timeout, surface.read_position()).await {
            Ok(Some(fen)) => fen,
            Ok(None) => return None,
            Err(e) => {
                debug!(error = %e, "Position read failed");
                return None;
            }
        };

        let replay = match GameReplay::from_fen(&fen, ply) {
            Ok(replay) => replay,
            Err(e) => {
                warn!(error = %e, "Surface position rejected");
                return None;
            }
        };

        let expected: shakmaty::Color = Color::to_move_at(ply).into();
        if replay.turn() != expected {
            warn!(fen = %fen, ply, "Surface position is stale");
            return None;
        }
        Some(replay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::observer::BoardHandle;
    use crate::surface::FaultKind;

    struct Board(Vec<String>);

    #[async_trait]
    impl BoardObserver for Board {
        async fn attach(&mut self) -> Result<(), AutopilotError> {
            Ok(())
        }
        async fn move_list(&mut self) -> Result<Vec<String>, AutopilotError> {
            Ok(self.0.clone())
        }
        async fn is_game_over(&mut self) -> Result<bool, AutopilotError> {
            Ok(false)
        }
        async fn is_puzzle_mode(&mut self) -> Result<bool, AutopilotError> {
            Ok(false)
        }
        async fn advance_puzzle(&mut self) -> Result<bool, AutopilotError> {
            Ok(false)
        }
        async fn player_color(&mut self) -> Result<Option<Color>, AutopilotError> {
            Ok(Some(Color::Black))
        }
        fn board_handle(&self) -> BoardHandle {
            BoardHandle::new("board")
        }
    }

    struct Page(Option<String>);

    #[async_trait]
    impl RemoteSurface for Page {
        async fn probe_connectivity(&mut self) -> Result<Option<FaultKind>, AutopilotError> {
            Ok(None)
        }
        async fn click_reconnect(&mut self) -> Result<bool, AutopilotError> {
            Ok(false)
        }
        async fn reload(&mut self) -> Result<(), AutopilotError> {
            Ok(())
        }
        async fn probe_actuation_error(&mut self) -> Result<Option<String>, AutopilotError> {
            Ok(None)
        }
        async fn read_position(&mut self) -> Result<Option<String>, AutopilotError> {
            Ok(self.0.clone())
        }
        async fn dismiss_overlays(&mut self) -> Result<(), AutopilotError> {
            Ok(())
        }
    }

    /// Records the position it has been told as (base, moves).
    #[derive(Default)]
    struct Recorder {
        base: Option<String>,
        moves: Vec<String>,
    }

    #[async_trait]
    impl MoveOracle for Recorder {
        async fn best_move(&mut self, _depth: Option<u32>) -> Result<Option<String>, AutopilotError> {
            Ok(None)
        }
        async fn set_position(&mut self, fen: &str) -> Result<(), AutopilotError> {
            self.base = Some(fen.to_string());
            self.moves.clear();
            Ok(())
        }
        async fn reset_to_initial(&mut self) -> Result<(), AutopilotError> {
            self.base = None;
            self.moves.clear();
            Ok(())
        }
        async fn apply_move(&mut self, uci: &str) -> Result<(), AutopilotError> {
            self.moves.push(uci.to_string());
            Ok(())
        }
    }

    fn board(moves: &[&str]) -> Board {
        Board(moves.iter().map(|m| m.to_string()).collect())
    }

    const AFTER_E4_E5: &str = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2";

    #[tokio::test]
    async fn test_import_preferred() {
        let resync = Resynchronizer::new(&ControllerConfig::default());
        let mut oracle = Recorder::default();

        let done = resync
            .resync(
                &mut board(&["e4", "e5"]),
                &mut Page(Some(AFTER_E4_E5.into())),
                &mut oracle,
            )
            .await
            .unwrap();

        assert_eq!(
            done.outcome,
            ResyncOutcome::Imported {
                fen: AFTER_E4_E5.into()
            }
        );
        assert_eq!(oracle.base.as_deref(), Some(AFTER_E4_E5));
        assert_eq!(done.mirror.len(), 2);
        assert_eq!(done.replay.ply(), 2);
    }

    #[tokio::test]
    async fn test_replay_when_no_position_or_stale_position() {
        let resync = Resynchronizer::new(&ControllerConfig::default());

        for page in [Page(None), Page(Some(AFTER_E4_E5.into()))] {
            let mut oracle = Recorder::default();
            let mut page = page;
            let done = resync
                .resync(&mut board(&["e4", "e5", "♘f3"]), &mut page, &mut oracle)
                .await
                .unwrap();

            assert_eq!(done.outcome, ResyncOutcome::Replayed { moves: 3 });
            assert_eq!(oracle.base, None);
            assert_eq!(oracle.moves, vec!["e2e4", "e7e5", "g1f3"]);
        }
    }

    #[tokio::test]
    async fn test_replay_aborts_on_bad_record() {
        let resync = Resynchronizer::new(&ControllerConfig::default());
        let mut oracle = Recorder::default();
        oracle.moves.push("d2d4".into());

        let result = resync
            .resync(&mut board(&["e4", "Ke2", "Qh5"]), &mut Page(None), &mut oracle)
            .await;

        assert!(result.is_err());
        // Nothing was sent: the oracle keeps what it had
        assert_eq!(oracle.moves, vec!["d2d4"]);
    }

    #[tokio::test]
    async fn test_resync_is_idempotent() {
        let resync = Resynchronizer::new(&ControllerConfig::default());
        let mut oracle = Recorder::default();
        let mut observer = board(&["d4", "Nf6", "c4"]);
        let mut page = Page(None);

        resync.resync(&mut observer, &mut page, &mut oracle).await.unwrap();
        let first = (oracle.base.clone(), oracle.moves.clone());
        resync.resync(&mut observer, &mut page, &mut oracle).await.unwrap();
        assert_eq!((oracle.base.clone(), oracle.moves.clone()), first);
    }

    /// Never finishes a reset.
    struct Hung;

    #[async_trait]
    impl MoveOracle for Hung {
        async fn best_move(&mut self, _depth: Option<u32>) -> Result<Option<String>, AutopilotError> {
            Ok(None)
        }
        async fn set_position(&mut self, _fen: &str) -> Result<(), AutopilotError> {
            std::future::pending().await
        }
        async fn reset_to_initial(&mut self) -> Result<(), AutopilotError> {
            std::future::pending().await
        }
        async fn apply_move(&mut self, _uci: &str) -> Result<(), AutopilotError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_oracle_is_an_engine_failure() {
        let config = ControllerConfig::default();
        let resync = Resynchronizer::new(&config);

        let started = tokio::time::Instant::now();
        let err = resync
            .resync(&mut board(&["e4"]), &mut Page(None), &mut Hung)
            .await
            .err();

        assert!(err.as_ref().is_some_and(AutopilotError::is_engine));
        assert!(started.elapsed() >= config.oracle_timeout);

        let err = resync
            .resync(
                &mut board(&["e4", "e5"]),
                &mut Page(Some(AFTER_E4_E5.into())),
                &mut Hung,
            )
            .await
            .err();
        assert!(err.as_ref().is_some_and(AutopilotError::is_engine));
    }
}
