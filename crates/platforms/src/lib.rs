//! Platform adapters: Board Observer, remote surface and actuation
//! strategies for Lichess and Chess.com, driven through WebDriver.

pub mod chesscom;
pub mod lichess;
pub mod page;
pub mod probe;
pub mod webdriver;

use std::sync::Arc;

use autopilot::{ActuationStrategy, BoardObserver, Platform, RemoteSurface};

pub use webdriver::WebDriver;

/// One platform's collaborators, strategies in priority order.
pub struct PlatformAdapter {
    pub observer: Box<dyn BoardObserver>,
    pub surface: Box<dyn RemoteSurface>,
    pub strategies: Vec<Box<dyn ActuationStrategy>>,
}

/// Select the platform variant once for the whole session.
pub fn connect(platform: Platform, driver: Arc<WebDriver>) -> PlatformAdapter {
    match platform {
        Platform::Lichess => lichess::adapter(driver),
        Platform::ChessCom => chesscom::adapter(driver),
    }
}
