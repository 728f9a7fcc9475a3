//! Message history: bounded in-memory log of public chat messages.
//!
//! The log is capped at `Config::history_capacity`; appending past the cap
//! drops the oldest message. Joiners get the newest `history_replay`
//! messages, oldest first.

use events::ChatMessage;

use crate::services::clock;
use crate::state::{AppState, Member};

/// Stamp, append, and return a message from `member`.
pub async fn record(state: &AppState, member: &Member, text: &str) -> ChatMessage {
    let now = clock::now();
    let message = ChatMessage {
        username: member.username.clone(),
        message: text.to_owned(),
        timestamp: clock::time_of_day(now),
        date: Some(clock::calendar_date(now)),
        avatar_color: member.avatar_color.clone(),
    };

    let capacity = state.config.history_capacity;
    let mut history = state.history.write().await;
    history.push_back(message.clone());
    while history.len() > capacity {
        history.pop_front();
    }
    message
}

/// The newest `limit` messages, oldest first.
pub async fn recent(state: &AppState, limit: usize) -> Vec<ChatMessage> {
    let history = state.history.read().await;
    let skip = history.len().saturating_sub(limit);
    history.iter().skip(skip).cloned().collect()
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
