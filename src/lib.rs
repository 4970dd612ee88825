pub mod api;
pub mod codec;
pub mod config;
pub mod domo;
pub mod error;
pub mod relay;
pub mod session;

pub use config::Config;
pub use error::RelayError;

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use domo::{DomoApi, TokenManager};
use relay::DatasetRelay;
use session::SessionStore;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub config: Config,
    pub tokens: Arc<TokenManager>,
    pub relay: DatasetRelay,
    pub sessions: Arc<SessionStore>,
    shutdown: CancellationToken,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: Config, api: Arc<dyn DomoApi>) -> Self {
        let tokens = Arc::new(TokenManager::new(api.clone(), config.token_scope.clone()));
        Self {
            relay: DatasetRelay::new(api, tokens.clone()),
            tokens,
            sessions: Arc::new(SessionStore::new()),
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Start the hourly session sweep; it runs until [`AppState::shutdown`].
    pub fn start_sweeper(&self) -> JoinHandle<()> {
        session::spawn_sweeper(
            self.sessions.clone(),
            session::SWEEP_INTERVAL,
            self.shutdown.child_token(),
        )
    }

    /// Stop background tasks.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
