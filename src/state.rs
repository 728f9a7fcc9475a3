//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! Everything lives in process memory: registered accounts, the bounded
//! message history, and the live connection registry. Each connection owns
//! an outgoing event channel; a connection becomes a chat member once
//! `join_chat` succeeds.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use events::{ChatMessage, ServerEvent, UserPresence};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::Config;
use crate::rate_limit::RateLimiter;
use crate::services::accounts::avatar_color;

// =============================================================================
// ACCOUNT
// =============================================================================

/// A registered user. Keyed by username in `AppState::accounts`.
#[derive(Debug, Clone)]
pub struct Account {
    pub username: String,
    /// Lowercased email, if one was given at registration.
    pub email: Option<String>,
    /// Hex salt mixed into `password_hash`.
    pub salt: String,
    /// Hex SHA-256 of salt + password.
    pub password_hash: String,
    /// Registration time, `YYYY-MM-DD HH:MM:SS`.
    pub created_at: String,
}

// =============================================================================
// CONNECTIONS
// =============================================================================

/// Identity attached to a connection after a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub username: String,
    pub avatar_color: String,
}

impl Member {
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        let avatar_color = avatar_color(&username).to_owned();
        Self { username, avatar_color }
    }

    #[must_use]
    pub fn presence(&self) -> UserPresence {
        UserPresence { username: self.username.clone(), avatar_color: self.avatar_color.clone() }
    }
}

/// One live WebSocket connection.
pub struct ConnectedClient {
    /// Sender for outgoing events.
    pub tx: mpsc::Sender<ServerEvent>,
    /// `None` until the connection joins the chat.
    pub member: Option<Member>,
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub accounts: Arc<RwLock<HashMap<String, Account>>>,
    /// Oldest first, bounded by `config.history_capacity`.
    pub history: Arc<RwLock<VecDeque<ChatMessage>>>,
    pub clients: Arc<RwLock<HashMap<Uuid, ConnectedClient>>>,
    /// Sliding-window limiter for chat sends.
    pub rate_limiter: RateLimiter,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_rate_limiter(config, RateLimiter::new())
    }

    #[must_use]
    pub fn with_rate_limiter(config: Config, rate_limiter: RateLimiter) -> Self {
        Self {
            config: Arc::new(config),
            accounts: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(RwLock::new(VecDeque::new())),
            clients: Arc::new(RwLock::new(HashMap::new())),
            rate_limiter,
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
