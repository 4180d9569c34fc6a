//! Repetition Guard: spots the controller proposing the same move over and over.

use tracing::debug;

/// Tracks consecutive identical proposals.
#[derive(Debug, Clone)]
pub struct RepetitionGuard {
    last: Option<String>,
    repeats: u32,
    threshold: u32,
}

impl RepetitionGuard {
    /// `threshold` counts repeats after the first proposal, so with 3 the
    /// fourth identical proposal asks for a variation.
    pub fn new(threshold: u32) -> Self {
        Self {
            last: None,
            repeats: 0,
            threshold: threshold.max(1),
        }
    }

    /// Record a proposal; true when a variation should be forced.
    /// The repeat counter restarts after it fires.
    pub fn observe(&mut self, move_text: &str) -> bool {
        if self.last.as_deref() == Some(move_text) {
            self.repeats += 1;
        } else {
            self.last = Some(move_text.to_string());
            self.repeats = 0;
        }

        if self.repeats >= self.threshold {
            debug!(move_text, repeats = self.repeats, "Repetition threshold reached");
            self.repeats = 0;
            return true;
        }
        false
    }

    /// Record the variation that replaced the repeated proposal.
    pub fn substitute(&mut self, move_text: &str) {
        self.last = Some(move_text.to_string());
        self.repeats = 0;
    }

    /// Forget everything; called once a move is confirmed.
    pub fn reset(&mut self) {
        self.last = None;
        self.repeats = 0;
    }

    pub fn repeats(&self) -> u32 {
        self.repeats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_on_fourth_identical_proposal() {
        let mut guard = RepetitionGuard::new(3);
        assert!(!guard.observe("e2e4"));
        assert!(!guard.observe("e2e4"));
        assert!(!guard.observe("e2e4"));
        assert!(guard.observe("e2e4"));
        assert_eq!(guard.repeats(), 0);
    }

    #[test]
    fn test_different_input_resets() {
        let mut guard = RepetitionGuard::new(3);
        guard.observe("e2e4");
        guard.observe("e2e4");
        guard.observe("e2e4");
        assert!(!guard.observe("d2d4"));
        assert!(!guard.observe("e2e4"));
        assert_eq!(guard.repeats(), 0);
    }

    #[test]
    fn test_reset_and_substitute() {
        let mut guard = RepetitionGuard::new(3);
        for _ in 0..3 {
            guard.observe("g1f3");
        }
        guard.reset();
        assert!(!guard.observe("g1f3"));

        guard.substitute("b1c3");
        assert!(!guard.observe("b1c3"));
        assert_eq!(guard.repeats(), 1);
    }
}
