//! Shared event model and JSON codec for the realtime chat transport.
//!
//! This crate owns the wire representation used by both the server and the
//! terminal client. Every WebSocket text message is one envelope:
//!
//! ```json
//! {"event": "send_message", "data": {"message": "hi"}}
//! ```
//!
//! Events without a payload omit `data`. The HTTP registration body and
//! response live here too, along with the validation limits both sides
//! enforce.

use serde::{Deserialize, Serialize};

// =============================================================================
// LIMITS
// =============================================================================

/// Minimum username length, in characters, after trimming.
pub const USERNAME_MIN_LEN: usize = 2;

/// Maximum username length, in characters, after trimming.
pub const USERNAME_MAX_LEN: usize = 20;

/// Minimum password length, in characters.
pub const PASSWORD_MIN_LEN: usize = 3;

/// Maximum chat or private message length, in characters, after trimming.
pub const MESSAGE_MAX_LEN: usize = 1000;

// =============================================================================
// ERRORS
// =============================================================================

/// Error returned by [`decode_client_event`] and [`decode_server_event`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text was not a JSON envelope naming a known event.
    #[error("invalid event: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Credentials submitted with `join_chat`. Either `username` or `email`
/// identifies the account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinChat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

impl JoinChat {
    /// The login identifier: username when non-blank, otherwise email.
    #[must_use]
    pub fn login(&self) -> Option<&str> {
        let non_blank = |s: &&String| !s.trim().is_empty();
        self.username
            .as_ref()
            .filter(non_blank)
            .or_else(|| self.email.as_ref().filter(non_blank))
            .map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateMessage {
    #[serde(default)]
    pub target_user: String,
    #[serde(default)]
    pub message: String,
}

/// Human-readable notice carried by `connected`, `error` and `login_error`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
}

impl Notice {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// One online user, as shown in the roster and in join/leave notices.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserPresence {
    pub username: String,
    pub avatar_color: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub users: Vec<UserPresence>,
}

/// A public chat message as stored in history and broadcast to members.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub username: String,
    pub message: String,
    /// Local wall-clock time, `HH:MM:SS`.
    pub timestamp: String,
    /// Local calendar date, `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub avatar_color: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typing {
    #[serde(default)]
    pub username: String,
}

/// A private message. `avatar_color` is the sender's.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateNote {
    pub from_user: String,
    pub to_user: String,
    pub message: String,
    pub timestamp: String,
    pub avatar_color: String,
}

// =============================================================================
// EVENTS
// =============================================================================

/// Client → server events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinChat(JoinChat),
    SendMessage(SendMessage),
    GetOnlineUsers,
    TypingStart,
    TypingStop,
    PrivateMessage(PrivateMessage),
}

impl ClientEvent {
    /// Wire name of the event, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinChat(_) => "join_chat",
            Self::SendMessage(_) => "send_message",
            Self::GetOnlineUsers => "get_online_users",
            Self::TypingStart => "typing_start",
            Self::TypingStop => "typing_stop",
            Self::PrivateMessage(_) => "private_message",
        }
    }
}

/// Server → client events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected(Notice),
    JoinSuccess(UserPresence),
    UserJoined(UserPresence),
    UserLeft(UserPresence),
    LoginError(Notice),
    Error(Notice),
    NewMessage(ChatMessage),
    OnlineUsersList(Roster),
    OnlineUsersUpdate(Roster),
    UserTyping(Typing),
    UserStoppedTyping(Typing),
    PrivateMessageReceived(PrivateNote),
    PrivateMessageSent(PrivateNote),
}

impl ServerEvent {
    /// Shorthand for an `error` event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(Notice::new(message))
    }

    /// Shorthand for a `login_error` event.
    pub fn login_error(message: impl Into<String>) -> Self {
        Self::LoginError(Notice::new(message))
    }

    /// Wire name of the event, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::JoinSuccess(_) => "join_success",
            Self::UserJoined(_) => "user_joined",
            Self::UserLeft(_) => "user_left",
            Self::LoginError(_) => "login_error",
            Self::Error(_) => "error",
            Self::NewMessage(_) => "new_message",
            Self::OnlineUsersList(_) => "online_users_list",
            Self::OnlineUsersUpdate(_) => "online_users_update",
            Self::UserTyping(_) => "user_typing",
            Self::UserStoppedTyping(_) => "user_stopped_typing",
            Self::PrivateMessageReceived(_) => "private_message_received",
            Self::PrivateMessageSent(_) => "private_message_sent",
        }
    }

    /// Whether this event reports a rejected request.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_) | Self::LoginError(_))
    }
}

// =============================================================================
// HTTP REGISTRATION
// =============================================================================

/// `POST /register` request body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

/// `POST /register` response body. Rejections are `success: false`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
}

impl RegisterResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Encode an event envelope as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode<T: Serialize>(event: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(event)?)
}

/// Decode a client → server envelope.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed JSON, unknown event names, or
/// payloads with the wrong shape.
pub fn decode_client_event(text: &str) -> Result<ClientEvent, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Decode a server → client envelope.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed JSON, unknown event names, or
/// payloads with the wrong shape.
pub fn decode_server_event(text: &str) -> Result<ServerEvent, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Length in characters, the unit every limit above uses.
#[must_use]
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
