//! Presence service: connection registry, roster, and event fan-out.
//!
//! DESIGN
//! ======
//! Every socket registers an outgoing channel on connect. `attach` marks the
//! connection as a member under a username; only members receive chat
//! broadcasts. One username may be attached to several connections (tabs),
//! so the roster is de-duplicated and "joined"/"left" are reported only for
//! the first and last connection of a username.
//!
//! Delivery uses `try_send`: a full channel drops the event for that one
//! slow client instead of stalling the sender.

use events::{ServerEvent, UserPresence};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::{AppState, ConnectedClient, Member};

// =============================================================================
// REGISTRY
// =============================================================================

/// Register a new connection. It receives nothing until it joins.
pub async fn connect(state: &AppState, client_id: Uuid, tx: mpsc::Sender<ServerEvent>) {
    let mut clients = state.clients.write().await;
    clients.insert(client_id, ConnectedClient { tx, member: None });
    debug!(%client_id, connections = clients.len(), "presence: connected");
}

/// Remove a connection. Returns its member if that was the username's last
/// connection, i.e. the user has now left.
pub async fn disconnect(state: &AppState, client_id: Uuid) -> Option<Member> {
    let mut clients = state.clients.write().await;
    let member = clients.remove(&client_id)?.member?;
    let still_online = clients
        .values()
        .any(|c| c.member.as_ref().is_some_and(|m| m.username == member.username));
    (!still_online).then_some(member)
}

/// Attach a member identity to a connection. Returns `true` when no other
/// connection carries this username, i.e. the user has just come online.
pub async fn attach(state: &AppState, client_id: Uuid, member: Member) -> bool {
    let mut clients = state.clients.write().await;
    let first = !clients.iter().any(|(id, c)| {
        *id != client_id
            && c.member
                .as_ref()
                .is_some_and(|m| m.username == member.username)
    });
    if let Some(client) = clients.get_mut(&client_id) {
        client.member = Some(member);
    }
    first
}

/// Clear a connection's member identity. Returns the member if that was the
/// username's last connection.
pub async fn detach(state: &AppState, client_id: Uuid) -> Option<Member> {
    let mut clients = state.clients.write().await;
    let member = clients.get_mut(&client_id)?.member.take()?;
    let still_online = clients
        .values()
        .any(|c| c.member.as_ref().is_some_and(|m| m.username == member.username));
    (!still_online).then_some(member)
}

// =============================================================================
// QUERIES
// =============================================================================

/// Distinct online users, sorted by username.
pub async fn roster(state: &AppState) -> Vec<UserPresence> {
    let clients = state.clients.read().await;
    let mut users: Vec<UserPresence> = clients
        .values()
        .filter_map(|c| c.member.as_ref().map(Member::presence))
        .collect();
    users.sort();
    users.dedup_by(|a, b| a.username == b.username);
    users
}

pub async fn is_online(state: &AppState, username: &str) -> bool {
    let clients = state.clients.read().await;
    clients
        .values()
        .any(|c| c.member.as_ref().is_some_and(|m| m.username == username))
}

// =============================================================================
// DELIVERY
// =============================================================================

/// Send an event to every member, optionally excluding one connection.
pub async fn broadcast(state: &AppState, event: &ServerEvent, exclude: Option<Uuid>) {
    let clients = state.clients.read().await;
    for (client_id, client) in clients.iter() {
        if Some(*client_id) == exclude || client.member.is_none() {
            continue;
        }
        deliver(*client_id, &client.tx, event);
    }
}

/// Send an event to every connection of `username`. Returns how many
/// connections it was queued for.
pub async fn send_to_user(state: &AppState, username: &str, event: &ServerEvent) -> usize {
    let clients = state.clients.read().await;
    let mut delivered = 0;
    for (client_id, client) in clients.iter() {
        if client
            .member
            .as_ref()
            .is_some_and(|m| m.username == username)
            && deliver(*client_id, &client.tx, event)
        {
            delivered += 1;
        }
    }
    delivered
}

fn deliver(client_id: Uuid, tx: &mpsc::Sender<ServerEvent>, event: &ServerEvent) -> bool {
    match tx.try_send(event.clone()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(%client_id, event = event.name(), "presence: client channel full, dropping event");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
