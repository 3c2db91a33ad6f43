//! Backend collaborator: game config and play-count telemetry
//!
//! The engine needs exactly two things from the CRUD backend: the level/value
//! configuration for a game id, and a fire-and-forget play-count bump. Both
//! sit behind the `Backend` trait so the simulation never touches the network
//! and tests inject fakes.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::MAX_LEVELS_CAP;

/// Level configuration served by `GET /game-config/{id}`.
///
/// Tolerant of extra fields; absent fields take the defaults, so a sparse
/// response still yields a playable session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Number of levels in the run (clamped to `[1, 5]` by the session)
    #[serde(default = "default_levels")]
    pub levels: u32,
    /// Upper bound for random filler balloon values
    #[serde(default = "default_max_value")]
    pub max_value: u32,
}

fn default_levels() -> u32 {
    MAX_LEVELS_CAP
}

fn default_max_value() -> u32 {
    MAX_LEVELS_CAP
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            levels: default_levels(),
            max_value: default_max_value(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(#[source] Box<ureq::Error>),
    #[error("malformed response: {0}")]
    Decode(#[from] std::io::Error),
}

/// The two read operations the engine consumes from the backend
pub trait Backend {
    fn fetch_config(&self, game_id: &str) -> Result<GameConfig, BackendError>;

    /// Best-effort telemetry; callers swallow the error
    fn post_play_count(&self, game_id: &str) -> Result<(), BackendError>;
}

impl<B: Backend + ?Sized> Backend for std::sync::Arc<B> {
    fn fetch_config(&self, game_id: &str) -> Result<GameConfig, BackendError> {
        (**self).fetch_config(game_id)
    }

    fn post_play_count(&self, game_id: &str) -> Result<(), BackendError> {
        (**self).post_play_count(game_id)
    }
}

/// HTTP backend talking to the real service
pub struct HttpBackend {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(5))
            .build();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            agent,
        }
    }
}

impl Backend for HttpBackend {
    fn fetch_config(&self, game_id: &str) -> Result<GameConfig, BackendError> {
        let url = format!("{}/game-config/{}", self.base_url, game_id);
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| BackendError::Transport(Box::new(e)))?;
        Ok(response.into_json()?)
    }

    fn post_play_count(&self, game_id: &str) -> Result<(), BackendError> {
        let url = format!("{}/play-count", self.base_url);
        self.agent
            .post(&url)
            .send_json(serde_json::json!({ "game_id": game_id }))
            .map_err(|e| BackendError::Transport(Box::new(e)))?;
        Ok(())
    }
}

/// In-process backend for the demo binary and tests: fixed config, counts posts
#[derive(Debug, Default)]
pub struct OfflineBackend {
    config: GameConfig,
    plays: AtomicU32,
}

impl OfflineBackend {
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            plays: AtomicU32::new(0),
        }
    }

    pub fn play_count(&self) -> u32 {
        self.plays.load(Ordering::Relaxed)
    }
}

impl Backend for OfflineBackend {
    fn fetch_config(&self, _game_id: &str) -> Result<GameConfig, BackendError> {
        Ok(self.config)
    }

    fn post_play_count(&self, _game_id: &str) -> Result<(), BackendError> {
        self.plays.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
