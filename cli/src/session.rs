//! Chat session view state.
//!
//! DESIGN
//! ======
//! `ChatSession` is owned by the chat loop. Every inbound event goes
//! through `apply`, which updates the connection flag, the joined identity,
//! the roster, and the typing indicator, and returns the lines to print.
//! Rendering is plain text so the whole thing is testable without a socket.

use std::sync::OnceLock;

use events::{ServerEvent, UserPresence};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

#[derive(Debug, Default)]
pub struct ChatSession {
    connected: bool,
    current_user: Option<String>,
    roster: Vec<UserPresence>,
    typing: Option<String>,
}

impl ChatSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    #[must_use]
    pub fn current_user(&self) -> Option<&str> {
        self.current_user.as_deref()
    }

    #[must_use]
    pub fn roster(&self) -> &[UserPresence] {
        &self.roster
    }

    #[cfg(test)]
    pub fn typing(&self) -> Option<&str> {
        self.typing.as_deref()
    }

    /// Transport dropped. The identity is kept so it can be re-submitted.
    pub fn mark_disconnected(&mut self) -> String {
        self.connected = false;
        self.typing = None;
        "* Disconnected from server".to_owned()
    }

    /// Update state from one server event and return the lines to show.
    /// `today` is `YYYY-MM-DD`, used for the message time display.
    pub fn apply(&mut self, event: &ServerEvent, today: &str) -> Vec<String> {
        match event {
            ServerEvent::Connected(notice) => {
                self.connected = true;
                vec![format!("* {}", notice.message)]
            }
            ServerEvent::JoinSuccess(me) => {
                self.current_user = Some(me.username.clone());
                vec![format!("* Joined as {}", me.username)]
            }
            ServerEvent::UserJoined(user) => {
                if !self.roster.iter().any(|u| u.username == user.username) {
                    self.roster.push(user.clone());
                    self.roster.sort();
                }
                vec![format!("+ {} joined the chat", user.username)]
            }
            ServerEvent::UserLeft(user) => {
                self.roster.retain(|u| u.username != user.username);
                if self.typing.as_deref() == Some(user.username.as_str()) {
                    self.typing = None;
                }
                vec![format!("- {} left the chat", user.username)]
            }
            ServerEvent::LoginError(notice) => {
                self.current_user = None;
                vec![format!("! {}", notice.message)]
            }
            ServerEvent::Error(notice) => vec![format!("! {}", notice.message)],
            ServerEvent::NewMessage(msg) => {
                if self.typing.as_deref() == Some(msg.username.as_str()) {
                    self.typing = None;
                }
                let when = time_display(&msg.timestamp, msg.date.as_deref(), today);
                vec![format!("[{when}] {}: {}", msg.username, msg.message)]
            }
            ServerEvent::OnlineUsersList(roster) => {
                self.roster.clone_from(&roster.users);
                vec![render_roster(&self.roster)]
            }
            ServerEvent::OnlineUsersUpdate(roster) => {
                self.roster.clone_from(&roster.users);
                vec![]
            }
            ServerEvent::UserTyping(typing) => {
                if self.typing.as_deref() == Some(typing.username.as_str()) {
                    return vec![];
                }
                self.typing = Some(typing.username.clone());
                vec![format!("  {} is typing...", typing.username)]
            }
            ServerEvent::UserStoppedTyping(_) => {
                self.typing = None;
                vec![]
            }
            ServerEvent::PrivateMessageReceived(note) => {
                vec![format!("[{}] {} (Private): {}", note.timestamp, note.from_user, note.message)]
            }
            ServerEvent::PrivateMessageSent(note) => {
                vec![format!("[{}] To {}: {}", note.timestamp, note.to_user, note.message)]
            }
        }
    }
}

// =============================================================================
// INPUT
// =============================================================================

/// One line typed at the chat prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Empty,
    Message(&'a str),
    Users,
    Private { target: &'a str, text: &'a str },
    Quit,
    Help,
    /// A slash command that is unknown or missing arguments.
    Invalid(&'a str),
}

#[must_use]
pub fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Message(line);
    };
    let (name, rest) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
    match name {
        "quit" | "exit" => Input::Quit,
        "users" => Input::Users,
        "help" => Input::Help,
        "pm" => match rest.trim().split_once(char::is_whitespace) {
            Some((target, text)) if !text.trim().is_empty() => Input::Private { target, text: text.trim() },
            _ => Input::Invalid("usage: /pm <user> <text>"),
        },
        _ => Input::Invalid("unknown command, try /help"),
    }
}

fn render_roster(users: &[UserPresence]) -> String {
    let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
    format!("Online ({}): {}", names.len(), names.join(", "))
}

/// `Today HH:MM:SS` for today's messages, `YYYY-MM-DD HH:MM:SS` otherwise.
/// Without a date the timestamp is shown as given.
#[must_use]
pub fn time_display(timestamp: &str, date: Option<&str>, today: &str) -> String {
    match date {
        Some(date) if date == today => format!("Today {timestamp}"),
        Some(date) => format!("{date} {timestamp}"),
        None => timestamp.to_owned(),
    }
}

/// Capture the terminal's UTC offset. Call from `main` before the runtime
/// spawns its workers; the offset cannot be read once other threads exist.
pub fn init_local_offset() -> UtcOffset {
    *LOCAL_OFFSET.get_or_init(|| UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
}

/// Local calendar date as `YYYY-MM-DD`, in UTC if no offset was captured.
#[must_use]
pub fn today() -> String {
    let offset = LOCAL_OFFSET.get().copied().unwrap_or(UtcOffset::UTC);
    OffsetDateTime::now_utc()
        .to_offset(offset)
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
