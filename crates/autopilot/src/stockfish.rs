//! Stockfish engine wrapper using UCI protocol (async I/O)

use std::io::ErrorKind;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::AutopilotError;
use crate::oracle::MoveOracle;

/// Engine tuning applied once after the UCI handshake.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Default search depth for `go depth`
    pub depth: u32,
    /// Stockfish `Skill Level` (0-20)
    pub skill_level: u32,
    /// Hash table size in MB
    pub hash_mb: u32,
    pub threads: u32,
    /// Stockfish `Slow Mover` (10-1000)
    pub slow_mover: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            depth: 15,
            skill_level: 20,
            hash_mb: 256,
            threads: 1,
            slow_mover: 100,
        }
    }
}

type EngineInput = Box<dyn AsyncWrite + Send + Unpin>;
type EngineOutput = BufReader<Box<dyn AsyncRead + Send + Unpin>>;

/// Stockfish process tracking the position it has been told about.
pub struct StockfishOracle {
    process: Option<Child>,
    stdin: EngineInput,
    stdout: EngineOutput,
    options: EngineOptions,
    /// FEN the position starts from, `None` for startpos
    base_fen: Option<String>,
    /// UCI moves played since the base
    moves: Vec<String>,
    /// A `go` was sent whose `bestmove` has not been read yet
    searching: bool,
}

impl StockfishOracle {
    /// Spawn a new Stockfish process, run the UCI handshake and apply options
    pub async fn spawn(path: &str, options: EngineOptions) -> Result<Self, AutopilotError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => AutopilotError::EngineMissing(path.to_string()),
                ErrorKind::PermissionDenied => AutopilotError::EnginePermission(path.to_string()),
                _ => AutopilotError::Engine(format!("Failed to spawn Stockfish: {e}")),
            })?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| AutopilotError::Engine("Stockfish stdin not captured".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| AutopilotError::Engine("Stockfish stdout not captured".into()))?;

        let mut engine = Self::over(Box::new(stdout), Box::new(stdin), options);
        engine.process = Some(process);

        // Initialize UCI
        engine.send("uci").await?;
        engine.wait_for("uciok").await?;

        let opts = engine.options.clone();
        engine
            .send(&format!("setoption name Threads value {}", opts.threads))
            .await?;
        engine
            .send(&format!("setoption name Hash value {}", opts.hash_mb))
            .await?;
        engine
            .send(&format!("setoption name Skill Level value {}", opts.skill_level))
            .await?;
        engine
            .send(&format!("setoption name Slow Mover value {}", opts.slow_mover))
            .await?;
        engine.send("ucinewgame").await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;

        info!(path, depth = opts.depth, skill = opts.skill_level, "Stockfish ready");
        Ok(engine)
    }

    /// Wrap an already running UCI stream without a child process.
    fn over(
        output: Box<dyn AsyncRead + Send + Unpin>,
        input: EngineInput,
        options: EngineOptions,
    ) -> Self {
        Self {
            process: None,
            stdin: input,
            stdout: BufReader::new(output),
            options,
            base_fen: None,
            moves: Vec::new(),
            searching: false,
        }
    }

    /// Send a command to Stockfish
    async fn send(&mut self, cmd: &str) -> Result<(), AutopilotError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| AutopilotError::Engine(format!("Failed to write to Stockfish: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| AutopilotError::Engine(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    /// Read one line; end of stream means the engine exited
    async fn read_line(&mut self) -> Result<String, AutopilotError> {
        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| AutopilotError::Engine(format!("Failed to read from Stockfish: {e}")))?;
        if read == 0 {
            return Err(AutopilotError::Engine("Stockfish exited".into()));
        }
        let trimmed = line.trim().to_string();
        debug!(line = %trimmed, "SF >");
        Ok(trimmed)
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), AutopilotError> {
        loop {
            if self.read_line().await? == expected {
                return Ok(());
            }
        }
    }

    /// Stop a search abandoned by a cancelled caller and discard its answer
    async fn drain_search(&mut self) -> Result<(), AutopilotError> {
        debug!("Draining abandoned search");
        self.send("stop").await?;
        loop {
            if self.read_line().await?.starts_with("bestmove") {
                self.searching = false;
                return Ok(());
            }
        }
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        if let Some(process) = self.process.as_mut() {
            let _ = process.wait().await;
        }
    }
}

#[async_trait]
impl MoveOracle for StockfishOracle {
    async fn best_move(&mut self, depth: Option<u32>) -> Result<Option<String>, AutopilotError> {
        if self.searching {
            self.drain_search().await?;
        }
        let depth = depth.unwrap_or(self.options.depth);
        let position = position_command(self.base_fen.as_deref(), &self.moves);
        self.send(&position).await?;
        self.searching = true;
        self.send(&format!("go depth {depth}")).await?;

        loop {
            let line = self.read_line().await?;
            if line.starts_with("bestmove") {
                self.searching = false;
                return Ok(parse_bestmove(&line));
            }
        }
    }

    async fn set_position(&mut self, fen: &str) -> Result<(), AutopilotError> {
        self.base_fen = Some(fen.trim().to_string());
        self.moves.clear();
        Ok(())
    }

    async fn reset_to_initial(&mut self) -> Result<(), AutopilotError> {
        self.base_fen = None;
        self.moves.clear();
        Ok(())
    }

    async fn apply_move(&mut self, uci: &str) -> Result<(), AutopilotError> {
        self.moves.push(uci.trim().to_string());
        Ok(())
    }
}

impl Drop for StockfishOracle {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        if let Some(process) = self.process.as_mut() {
            let _ = process.start_kill();
        }
    }
}

/// UCI `position` command for a base and the moves played since.
fn position_command(base_fen: Option<&str>, moves: &[String]) -> String {
    let mut cmd = match base_fen {
        Some(fen) => format!("position fen {fen}"),
        None => "position startpos".to_string(),
    };
    if !moves.is_empty() {
        cmd.push_str(" moves ");
        cmd.push_str(&moves.join(" "));
    }
    cmd
}

/// Parse best move from a `bestmove` line; `(none)` means no legal move
fn parse_bestmove(line: &str) -> Option<String> {
    let mv = line.split_whitespace().nth(1)?;
    if mv == "(none)" || mv == "0000" {
        return None;
    }
    Some(mv.to_string())
}
