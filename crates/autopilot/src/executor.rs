//! Action Executor: applies a candidate move through an ordered list of
//! actuation strategies.
//!
//! A strategy reporting success only means it dispatched its action. Whether
//! the move landed is decided later by the controller, which compares move
//! list lengths. Each attempt is logged in a small ring per candidate; a
//! strategy that already "succeeded" for the same candidate without the move
//! showing up is tried last on the next retry.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::error::AutopilotError;
use crate::moves::CandidateMove;
use crate::observer::BoardHandle;
use crate::session::ModeFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure,
    /// The strategy did not answer before its deadline
    Unknown,
}

/// One actuation try.
#[derive(Debug, Clone, Serialize)]
pub struct ActionAttempt {
    pub strategy: &'static str,
    pub outcome: AttemptOutcome,
    pub at: DateTime<Utc>,
}

/// One way of putting a move on the remote board.
#[async_trait]
pub trait ActuationStrategy: Send + Sync {
    fn id(&self) -> &'static str;

    /// Strategies that move the real pointer are skipped in mouseless mode.
    fn requires_pointer(&self) -> bool {
        false
    }

    /// Dispatch the move. `Ok(true)` means the action was sent, not that it
    /// was accepted.
    async fn attempt(
        &self,
        candidate: &CandidateMove,
        board: &BoardHandle,
        modes: &ModeFlags,
    ) -> Result<bool, AutopilotError>;

    /// Pick the promotion piece once the primary action has been sent.
    /// Strategies that send the piece along with the move keep the default.
    async fn choose_promotion(
        &self,
        _candidate: &CandidateMove,
        _board: &BoardHandle,
        _modes: &ModeFlags,
    ) -> Result<bool, AutopilotError> {
        Ok(true)
    }
}

pub struct ActionExecutor {
    strategies: Vec<Box<dyn ActuationStrategy>>,
    attempts: VecDeque<ActionAttempt>,
    ring: usize,
    /// Candidate the attempt ring belongs to
    current: Option<(String, usize)>,
    strategy_timeout: Duration,
    promotion_delay: Duration,
}

impl ActionExecutor {
    pub fn new(strategies: Vec<Box<dyn ActuationStrategy>>, config: &ControllerConfig) -> Self {
        Self {
            strategies,
            attempts: VecDeque::with_capacity(config.attempt_ring),
            ring: config.attempt_ring.max(1),
            current: None,
            strategy_timeout: config.strategy_timeout,
            promotion_delay: config.promotion_delay,
        }
    }

    /// Reorder strategies by id. Unknown ids are ignored; strategies not
    /// named keep their relative order after the named ones.
    pub fn prioritize(&mut self, order: &[&str]) {
        self.strategies.sort_by_key(|s| {
            order
                .iter()
                .position(|id| *id == s.id())
                .unwrap_or(order.len())
        });
    }

    pub fn strategy_ids(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.id()).collect()
    }

    /// Attempts made for the current candidate, oldest first.
    pub fn attempts(&self) -> impl Iterator<Item = &ActionAttempt> {
        self.attempts.iter()
    }

    /// Try each eligible strategy until one reports success.
    ///
    /// Returns whether any strategy dispatched the move.
    pub async fn execute(
        &mut self,
        candidate: &CandidateMove,
        board: &BoardHandle,
        modes: &ModeFlags,
    ) -> bool {
        let key = (candidate.uci(), candidate.base_len);
        if self.current.as_ref() != Some(&key) {
            self.attempts.clear();
            self.current = Some(key);
        }

        for idx in self.order_for(modes) {
            let strategy = &self.strategies[idx];
            let id = strategy.id();

            let outcome = match tokio::time::timeout(
                self.strategy_timeout,
                strategy.attempt(candidate, board, modes),
            )
            .await
            {
                Ok(Ok(true)) => AttemptOutcome::Success,
                Ok(Ok(false)) => AttemptOutcome::Failure,
                Ok(Err(e)) => {
                    warn!(strategy = id, error = %e, "Actuation strategy errored");
                    AttemptOutcome::Failure
                }
                Err(_) => {
                    warn!(strategy = id, "Actuation strategy timed out");
                    AttemptOutcome::Unknown
                }
            };

            push_ring(
                &mut self.attempts,
                self.ring,
                ActionAttempt {
                    strategy: id,
                    outcome,
                    at: Utc::now(),
                },
            );

            if outcome != AttemptOutcome::Success {
                debug!(strategy = id, ?outcome, mv = %candidate, "Strategy did not dispatch");
                continue;
            }

            info!(strategy = id, mv = %candidate, "Move dispatched");
            if candidate.is_promotion() {
                tokio::time::sleep(self.promotion_delay).await;
                match tokio::time::timeout(
                    self.strategy_timeout,
                    strategy.choose_promotion(candidate, board, modes),
                )
                .await
                {
                    Ok(Ok(true)) => {}
                    Ok(Ok(false)) => warn!(strategy = id, "Promotion piece not selected"),
                    Ok(Err(e)) => warn!(strategy = id, error = %e, "Promotion selection failed"),
                    Err(_) => warn!(strategy = id, "Promotion selection timed out"),
                }
            }
            return true;
        }

        warn!(mv = %candidate, "All actuation strategies failed");
        false
    }

    /// Eligible strategy indices: configured order, with strategies that
    /// already dispatched this candidate moved to the back.
    fn order_for(&self, modes: &ModeFlags) -> Vec<usize> {
        let (fresh, used): (Vec<usize>, Vec<usize>) = (0..self.strategies.len())
            .filter(|&i| !(modes.mouseless && self.strategies[i].requires_pointer()))
            .partition(|&i| {
                let id = self.strategies[i].id();
                !self
                    .attempts
                    .iter()
                    .any(|a| a.strategy == id && a.outcome == AttemptOutcome::Success)
            });
        fresh.into_iter().chain(used).collect()
    }
}

fn push_ring(ring: &mut VecDeque<ActionAttempt>, cap: usize, attempt: ActionAttempt) {
    while ring.len() >= cap {
        ring.pop_front();
    }
    ring.push_back(attempt);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Scripted {
        id: &'static str,
        pointer: bool,
        answer: Result<bool, AutopilotError>,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl ActuationStrategy for Scripted {
        fn id(&self) -> &'static str {
            self.id
        }

        fn requires_pointer(&self) -> bool {
            self.pointer
        }

        async fn attempt(
            &self,
            _candidate: &CandidateMove,
            _board: &BoardHandle,
            _modes: &ModeFlags,
        ) -> Result<bool, AutopilotError> {
            self.calls.lock().unwrap().push(self.id);
            self.answer.clone()
        }

        async fn choose_promotion(
            &self,
            _candidate: &CandidateMove,
            _board: &BoardHandle,
            _modes: &ModeFlags,
        ) -> Result<bool, AutopilotError> {
            self.calls.lock().unwrap().push("promotion");
            Ok(true)
        }
    }

    fn executor(
        defs: &[(&'static str, bool, Result<bool, AutopilotError>)],
    ) -> (ActionExecutor, Arc<Mutex<Vec<&'static str>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let strategies = defs
            .iter()
            .map(|(id, pointer, answer)| {
                Box::new(Scripted {
                    id,
                    pointer: *pointer,
                    answer: answer.clone(),
                    calls: calls.clone(),
                }) as Box<dyn ActuationStrategy>
            })
            .collect();
        (ActionExecutor::new(strategies, &ControllerConfig::default()), calls)
    }

    fn candidate(uci: &str) -> CandidateMove {
        CandidateMove::from_uci(uci, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_wins_and_failures_are_logged() {
        let (mut exec, calls) = executor(&[
            ("socket", false, Ok(false)),
            ("dom", false, Err(AutopilotError::Actuation("no square".into()))),
            ("pointer", true, Ok(true)),
        ]);
        let board = BoardHandle::new("board");

        assert!(exec.execute(&candidate("e2e4"), &board, &ModeFlags::default()).await);
        assert_eq!(*calls.lock().unwrap(), vec!["socket", "dom", "pointer"]);

        let outcomes: Vec<_> = exec.attempts().map(|a| a.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                AttemptOutcome::Failure,
                AttemptOutcome::Failure,
                AttemptOutcome::Success
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_mouseless_skips_pointer_strategies() {
        let (mut exec, calls) = executor(&[("socket", false, Ok(false)), ("pointer", true, Ok(true))]);
        let modes = ModeFlags {
            mouseless: true,
            ..Default::default()
        };
        assert!(!exec.execute(&candidate("e2e4"), &BoardHandle::new("b"), &modes).await);
        assert_eq!(*calls.lock().unwrap(), vec!["socket"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_of_same_candidate_rotates_dispatching_strategy() {
        let (mut exec, calls) = executor(&[("socket", false, Ok(true)), ("dom", false, Ok(true))]);
        let board = BoardHandle::new("b");
        let mv = candidate("g1f3");

        exec.execute(&mv, &board, &ModeFlags::default()).await;
        exec.execute(&mv, &board, &ModeFlags::default()).await;
        assert_eq!(*calls.lock().unwrap(), vec!["socket", "dom"]);

        // A different candidate starts over with the configured order
        exec.execute(&candidate("d2d4"), &board, &ModeFlags::default()).await;
        assert_eq!(calls.lock().unwrap().last(), Some(&"socket"));
        assert_eq!(exec.attempts().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_promotion_follow_up_after_primary() {
        let (mut exec, calls) = executor(&[("dom", false, Ok(true))]);
        exec.execute(&candidate("a7a8q"), &BoardHandle::new("b"), &ModeFlags::default())
            .await;
        assert_eq!(*calls.lock().unwrap(), vec!["dom", "promotion"]);
    }

    #[test]
    fn test_prioritize_reorders_by_id() {
        let (mut exec, _) = executor(&[
            ("pointer", true, Ok(true)),
            ("dom", false, Ok(true)),
            ("socket", false, Ok(true)),
        ]);
        exec.prioritize(&["socket", "dom"]);
        assert_eq!(exec.strategy_ids(), vec!["socket", "dom", "pointer"]);
    }
}
