//! Autopilot runner
//!
//! Attaches to a browser session through WebDriver, drives one game with a
//! local Stockfish and talks to the host over stdio: events go out as JSON
//! lines on stdout, commands come in as JSON lines on stdin. Logs go to stderr.

mod config;

use std::sync::Arc;

use autopilot::stockfish::StockfishOracle;
use autopilot::{
    host_channel, AutopilotError, Collaborators, Controller, ErrorKind, HostCommand, HostEvent,
    HostHandle, Outcome,
};
use platforms::WebDriver;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::config::RunnerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let config = RunnerConfig::load()?;

    let (host, link) = host_channel();
    let HostHandle { commands, events } = host;
    let forwarder = tokio::spawn(forward_events(events));

    let oracle = match StockfishOracle::spawn(&config.stockfish_path, config.engine.clone()).await {
        Ok(oracle) => oracle,
        Err(e) => {
            let kind = match e {
                AutopilotError::EnginePermission(_) => ErrorKind::EnginePermission,
                _ => ErrorKind::EngineUnreachable,
            };
            error!(error = %e, "Stockfish unavailable");
            link.events.emit(HostEvent::Error {
                kind,
                detail: e.to_string(),
            });
            drop(link);
            let _ = forwarder.await;
            return Err(e.into());
        }
    };

    let driver = Arc::new(WebDriver::attach(
        &config.webdriver_url,
        &config.session_id,
        config.webdriver_timeout,
    )?);
    let adapter = platforms::connect(config.platform, driver);
    let collaborators = Collaborators {
        observer: adapter.observer,
        surface: adapter.surface,
        oracle: Box::new(oracle),
        strategies: adapter.strategies,
    };

    tokio::spawn(read_commands(commands.clone()));
    tokio::spawn(stop_on_signal(commands));

    let started = Controller::start(
        config.platform,
        config.modes,
        collaborators,
        config.controller.clone(),
        link,
    )
    .await;

    let mut controller = match started {
        Ok(controller) => controller,
        Err(e) => {
            // The controller already reported the startup error
            let _ = forwarder.await;
            return Err(e.into());
        }
    };

    if !config.strategy_order.is_empty() {
        let order: Vec<&str> = config.strategy_order.iter().map(String::as_str).collect();
        controller.prioritize_strategies(&order);
    }

    let summary = controller.run().await;
    let _ = forwarder.await;

    info!(
        outcome = ?summary.outcome,
        moves = summary.moves.len(),
        confirmed = summary.counters.confirmed,
        resyncs = summary.counters.resyncs,
        recoveries = summary.counters.connectivity_recoveries,
        "Session finished"
    );

    match summary.outcome {
        Outcome::Fatal(cause) => anyhow::bail!("session ended with FATAL({cause})"),
        Outcome::GameOver | Outcome::Stopped => Ok(()),
    }
}

/// Write each host event as one JSON line until the controller hangs up.
async fn forward_events(mut events: tokio::sync::mpsc::UnboundedReceiver<HostEvent>) {
    let mut stdout = tokio::io::stdout();
    while let Some(event) = events.recv().await {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialize event");
                continue;
            }
        };
        let written = async {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await
        }
        .await;
        if let Err(e) = written {
            warn!(error = %e, "Host stdout closed");
            break;
        }
    }
}

/// Parse JSON-line commands from stdin. End of input means stop.
async fn read_commands(commands: UnboundedSender<HostCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<HostCommand>(line) {
                    Ok(command) => {
                        if commands.send(command).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(error = %e, line, "Ignoring malformed command"),
                }
            }
            Ok(None) => {
                info!("Host closed stdin, stopping");
                let _ = commands.send(HostCommand::Stop);
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stdin, stopping");
                let _ = commands.send(HostCommand::Stop);
                return;
            }
        }
    }
}

async fn stop_on_signal(commands: UnboundedSender<HostCommand>) {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!(error = %e, "SIGTERM handler unavailable");
                    let _ = tokio::signal::ctrl_c().await;
                    let _ = commands.send(HostCommand::Stop);
                    return;
                }
            };
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, stopping"),
            _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, stopping"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl-C, stopping");
    }
    let _ = commands.send(HostCommand::Stop);
}
