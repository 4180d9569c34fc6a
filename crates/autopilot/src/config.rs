//! Controller timing and retry configuration from environment variables

use std::env;
use std::time::Duration;

use tracing::info;

/// Intervals, retry budgets and timeouts for the synchronization controller.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Move list poll interval while waiting for our turn
    pub poll_interval: Duration,

    /// Wait between an actuation attempt and verification
    pub settle_delay: Duration,

    /// Wait before asking the oracle again after an empty answer
    pub oracle_retry_delay: Duration,

    /// Consecutive empty oracle answers before the engine is declared unreachable
    pub max_oracle_failures: u32,

    /// Repeats of the same proposal (after the first) that force a variation
    pub repetition_threshold: u32,

    /// Search depth of the variation request
    pub shallow_depth: u32,

    /// Consecutive failed verifications before a resync is forced
    pub max_failed_verifications: u32,

    /// Connectivity recoveries allowed before the fault is fatal
    pub connectivity_budget: u32,

    /// Recoveries allowed without a confirmed move in between
    pub max_recoveries: u32,

    /// Consecutive unreadable move lists before observation is declared lost
    pub max_observation_failures: u32,

    /// Wait after clicking an in-page reconnect affordance
    pub reconnect_wait: Duration,

    /// Wait after a full surface reload
    pub reload_wait: Duration,

    /// Pause after a successful recovery before polling resumes
    pub recovery_delay: Duration,

    /// Wait for a promotion dialog before picking the piece
    pub promotion_delay: Duration,

    /// Deadline for observer and surface calls
    pub call_timeout: Duration,

    /// Deadline for a single oracle search
    pub oracle_timeout: Duration,

    /// Deadline for a single actuation strategy
    pub strategy_timeout: Duration,

    /// Attempts remembered per candidate move
    pub attempt_ring: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            settle_delay: Duration::from_millis(500),
            oracle_retry_delay: Duration::from_millis(500),
            max_oracle_failures: 10,
            repetition_threshold: 3,
            shallow_depth: 2,
            max_failed_verifications: 5,
            connectivity_budget: 3,
            max_recoveries: 5,
            max_observation_failures: 50,
            reconnect_wait: Duration::from_secs(3),
            reload_wait: Duration::from_secs(3),
            recovery_delay: Duration::from_secs(1),
            promotion_delay: Duration::from_millis(800),
            call_timeout: Duration::from_secs(10),
            oracle_timeout: Duration::from_secs(30),
            strategy_timeout: Duration::from_secs(5),
            attempt_ring: 16,
        }
    }
}

impl ControllerConfig {
    /// Defaults overlaid with `AUTOPILOT_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            poll_interval: env_millis("AUTOPILOT_POLL_MS", defaults.poll_interval),
            settle_delay: env_millis("AUTOPILOT_SETTLE_MS", defaults.settle_delay),
            oracle_retry_delay: env_millis("AUTOPILOT_ORACLE_RETRY_MS", defaults.oracle_retry_delay),
            max_oracle_failures: env_parse("AUTOPILOT_MAX_ORACLE_FAILURES", defaults.max_oracle_failures),
            repetition_threshold: env_parse("AUTOPILOT_REPETITION_THRESHOLD", defaults.repetition_threshold),
            shallow_depth: env_parse("AUTOPILOT_SHALLOW_DEPTH", defaults.shallow_depth),
            max_failed_verifications: env_parse(
                "AUTOPILOT_MAX_FAILED_VERIFICATIONS",
                defaults.max_failed_verifications,
            ),
            connectivity_budget: env_parse("AUTOPILOT_CONNECTIVITY_BUDGET", defaults.connectivity_budget),
            max_recoveries: env_parse("AUTOPILOT_MAX_RECOVERIES", defaults.max_recoveries),
            max_observation_failures: env_parse(
                "AUTOPILOT_MAX_OBSERVATION_FAILURES",
                defaults.max_observation_failures,
            ),
            reconnect_wait: env_millis("AUTOPILOT_RECONNECT_WAIT_MS", defaults.reconnect_wait),
            reload_wait: env_millis("AUTOPILOT_RELOAD_WAIT_MS", defaults.reload_wait),
            recovery_delay: env_millis("AUTOPILOT_RECOVERY_DELAY_MS", defaults.recovery_delay),
            promotion_delay: env_millis("AUTOPILOT_PROMOTION_DELAY_MS", defaults.promotion_delay),
            call_timeout: env_millis("AUTOPILOT_CALL_TIMEOUT_MS", defaults.call_timeout),
            oracle_timeout: env_millis("AUTOPILOT_ORACLE_TIMEOUT_MS", defaults.oracle_timeout),
            strategy_timeout: env_millis("AUTOPILOT_STRATEGY_TIMEOUT_MS", defaults.strategy_timeout),
            attempt_ring: env_parse("AUTOPILOT_ATTEMPT_RING", defaults.attempt_ring),
        };

        info!(
            poll_ms = config.poll_interval.as_millis() as u64,
            settle_ms = config.settle_delay.as_millis() as u64,
            connectivity_budget = config.connectivity_budget,
            "Controller config loaded"
        );
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_recommended_values() {
        let config = ControllerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.settle_delay, Duration::from_millis(500));
        assert_eq!(config.repetition_threshold, 3);
        assert_eq!(config.max_failed_verifications, 5);
        assert_eq!(config.connectivity_budget, 3);
        assert_eq!(config.max_oracle_failures, 10);
        assert_eq!(config.max_recoveries, 5);
    }

    #[test]
    fn test_env_overrides_and_ignores_garbage() {
        env::set_var("AUTOPILOT_TEST_PARSE_OK", "7");
        env::set_var("AUTOPILOT_TEST_PARSE_BAD", "seven");
        assert_eq!(env_parse("AUTOPILOT_TEST_PARSE_OK", 3u32), 7);
        assert_eq!(env_parse("AUTOPILOT_TEST_PARSE_BAD", 3u32), 3);
        assert_eq!(
            env_millis("AUTOPILOT_TEST_PARSE_OK", Duration::from_secs(1)),
            Duration::from_millis(7)
        );
    }
}
