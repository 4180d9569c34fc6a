//! Runner configuration from environment variables

use std::env;
use std::time::Duration;

use autopilot::stockfish::EngineOptions;
use autopilot::{AutopilotError, ControllerConfig, ModeFlags, Platform};
use tracing::info;

#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// WebDriver endpoint of the browser hosting the game
    pub webdriver_url: String,

    /// Existing WebDriver session to attach to
    pub session_id: String,

    pub platform: Platform,

    /// Path to Stockfish binary
    pub stockfish_path: String,

    pub engine: EngineOptions,

    pub modes: ModeFlags,

    /// Strategy ids tried first, in this order
    pub strategy_order: Vec<String>,

    /// HTTP timeout for WebDriver commands
    pub webdriver_timeout: Duration,

    pub controller: ControllerConfig,
}

impl RunnerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, AutopilotError> {
        let mut config = Self::from_lookup(|key| env::var(key).ok())?;
        config.controller = ControllerConfig::from_env();

        info!(
            platform = %config.platform,
            webdriver = %config.webdriver_url,
            stockfish_path = %config.stockfish_path,
            depth = config.engine.depth,
            "Runner config loaded"
        );
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AutopilotError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AutopilotError::Config(format!("{key} not set")))
        };
        let number = |key: &str, default: u32| {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let flag = |key: &str| {
            lookup(key)
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false)
        };

        let webdriver_url = required("WEBDRIVER_URL")?;
        let session_id = required("WEBDRIVER_SESSION_ID")?;
        let platform: Platform = required("PLATFORM")?.parse()?;

        let stockfish_path =
            lookup("STOCKFISH_PATH").unwrap_or_else(|| "/usr/local/bin/stockfish".to_string());

        let defaults = EngineOptions::default();
        let engine = EngineOptions {
            depth: number("ENGINE_DEPTH", defaults.depth),
            skill_level: number("ENGINE_SKILL_LEVEL", defaults.skill_level).min(20),
            hash_mb: number("ENGINE_HASH_MB", defaults.hash_mb),
            threads: number("ENGINE_THREADS", defaults.threads).max(1),
            slow_mover: number("ENGINE_SLOW_MOVER", defaults.slow_mover).clamp(10, 1000),
        };

        let modes = ModeFlags {
            manual: flag("MODE_MANUAL"),
            mouseless: flag("MODE_MOUSELESS"),
            human_like: flag("MODE_HUMAN_LIKE"),
            premove_only: flag("MODE_PREMOVE"),
            non_stop_puzzles: flag("MODE_NON_STOP_PUZZLES"),
            tournament: flag("MODE_TOURNAMENT"),
        };

        let strategy_order = lookup("STRATEGY_ORDER")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let webdriver_timeout =
            Duration::from_secs(number("WEBDRIVER_TIMEOUT_SECS", 15).into());

        Ok(Self {
            webdriver_url,
            session_id,
            platform,
            stockfish_path,
            engine,
            modes,
            strategy_order,
            webdriver_timeout,
            controller: ControllerConfig::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: [(&str, &str); 3] = [
        ("WEBDRIVER_URL", "http://127.0.0.1:9515"),
        ("WEBDRIVER_SESSION_ID", "abc123"),
        ("PLATFORM", "lichess"),
    ];

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::from_lookup(lookup(&BASE)).unwrap();
        assert_eq!(config.platform, Platform::Lichess);
        assert_eq!(config.stockfish_path, "/usr/local/bin/stockfish");
        assert_eq!(config.engine.depth, 15);
        assert_eq!(config.modes, ModeFlags::default());
        assert!(config.strategy_order.is_empty());
        assert_eq!(config.webdriver_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_missing_session_is_config_error() {
        let err = RunnerConfig::from_lookup(lookup(&BASE[..1])).unwrap_err();
        assert!(matches!(err, AutopilotError::Config(msg) if msg.contains("WEBDRIVER_SESSION_ID")));
    }

    #[test]
    fn test_unknown_platform_rejected() {
        let mut pairs = BASE.to_vec();
        pairs[2] = ("PLATFORM", "chess24");
        assert!(RunnerConfig::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_modes_engine_and_order() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("PLATFORM", "chess.com"),
            ("MODE_MANUAL", "true"),
            ("MODE_HUMAN_LIKE", "1"),
            ("MODE_PREMOVE", "no"),
            ("ENGINE_SKILL_LEVEL", "35"),
            ("ENGINE_SLOW_MOVER", "5"),
            ("ENGINE_DEPTH", "deep"),
            ("STRATEGY_ORDER", "pointer_drag, dom_click,,"),
        ]);
        let config = RunnerConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.platform, Platform::ChessCom);
        assert!(config.modes.manual);
        assert!(config.modes.human_like);
        assert!(!config.modes.premove_only);
        assert_eq!(config.engine.skill_level, 20);
        assert_eq!(config.engine.slow_mover, 10);
        assert_eq!(config.engine.depth, 15);
        assert_eq!(config.strategy_order, vec!["pointer_drag", "dom_click"]);
    }
}
