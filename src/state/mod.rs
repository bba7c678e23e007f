//! Game core and shared application state.

mod hub;
pub mod registry;
pub mod scoring;
pub mod sequence;
pub mod session;
pub mod state_machine;
pub mod turns;

use std::sync::Arc;

use crate::config::AppConfig;

pub use self::hub::EventHub;
pub use self::registry::{SessionHandle, SessionRegistry};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state: runtime configuration plus every live session.
pub struct AppState {
    config: Arc<AppConfig>,
    sessions: SessionRegistry,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self {
            sessions: SessionRegistry::new(config.event_channel_capacity()),
            config: Arc::new(config),
        })
    }

    /// Build the state from `config/app.json`, or the file named by
    /// `CLIMB_BEAT_BACK_CONFIG_PATH`, falling back to defaults.
    pub fn load() -> SharedState {
        Self::new(AppConfig::load())
    }

    /// Runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    /// Registry of live sessions.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }
}
