//! WebSocket handler: chat event relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID, registers an outgoing channel, and
//! enters a `select!` loop:
//! - Incoming client envelopes → decode + dispatch by event name
//! - Events fanned out by other connections → forward to client
//!
//! Handler functions are business logic: they validate, mutate state, and
//! return an `Outcome`. The dispatch layer owns delivery: reply to sender,
//! broadcast to the other members, or both.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `connected`
//! 2. `join_chat` → `join_success` + history replay to sender,
//!    `user_joined` + `online_users_update` to everyone
//! 3. Chat events → dispatch → handler returns Outcome → delivery
//! 4. Close → `user_left` + `online_users_update` (last tab only) → cleanup

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use events::{
    ClientEvent, JoinChat, MESSAGE_MAX_LEN, Notice, PrivateMessage, PrivateNote, Roster, SendMessage, ServerEvent,
    Typing, USERNAME_MAX_LEN, char_len,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::{accounts, clock, history, presence};
use crate::state::{AppState, Member};

const CLIENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what.
#[derive(Debug)]
enum Outcome {
    /// Send to the sender and every other member.
    Broadcast(ServerEvent),
    /// Send to every other member. Nothing goes back to the sender.
    BroadcastExcludeSender(ServerEvent),
    /// Send to the sender only.
    Reply(Vec<ServerEvent>),
    /// Sender gets `reply` followed by `broadcast`; other members get `broadcast`.
    ReplyAndBroadcast { reply: Vec<ServerEvent>, broadcast: Vec<ServerEvent> },
    /// Nothing to send.
    Ignore,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for events fanned out by other connections.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerEvent>(CLIENT_CHANNEL_CAPACITY);
    presence::connect(&state, client_id, client_tx).await;

    let welcome = ServerEvent::Connected(Notice::new("Connected to ChatMate server"));
    if send_event(&mut socket, &welcome).await.is_err() {
        close_connection(&state, client_id).await;
        return;
    }

    info!(%client_id, "ws: client connected");

    // Identity this connection has joined as, if any.
    let mut current: Option<Member> = None;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = process_inbound_text(&state, client_id, &mut current, text.as_str()).await;
                        if send_all(&mut socket, &replies).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = client_rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    close_connection(&state, client_id).await;
    info!(%client_id, "ws: client disconnected");
}

/// Deregister a connection and announce the departure if it was the
/// user's last one.
async fn close_connection(state: &AppState, client_id: Uuid) {
    state.rate_limiter.forget(client_id);
    if let Some(member) = presence::disconnect(state, client_id).await {
        announce_departure(state, &member).await;
    }
}

async fn announce_departure(state: &AppState, member: &Member) {
    info!(username = %member.username, "ws: user left");
    presence::broadcast(state, &ServerEvent::UserLeft(member.presence()), None).await;
    let roster = ServerEvent::OnlineUsersUpdate(roster_of(state).await);
    presence::broadcast(state, &roster, None).await;
}

// =============================================================================
// EVENT DISPATCH
// =============================================================================

/// Decode and process one inbound envelope and return events for the sender.
///
/// Broadcasts are queued on the other members' channels before this returns.
async fn process_inbound_text(
    state: &AppState,
    client_id: Uuid,
    current: &mut Option<Member>,
    text: &str,
) -> Vec<ServerEvent> {
    let event = match events::decode_client_event(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound event");
            return vec![ServerEvent::error(e.to_string())];
        }
    };

    debug!(%client_id, event = event.name(), "ws: recv event");

    let result = match event {
        ClientEvent::JoinChat(join) => handle_join(state, client_id, current, join).await,
        ClientEvent::SendMessage(msg) => handle_send_message(state, client_id, current.as_ref(), msg).await,
        ClientEvent::GetOnlineUsers => Ok(Outcome::Reply(vec![ServerEvent::OnlineUsersList(roster_of(state).await)])),
        ClientEvent::TypingStart => Ok(handle_typing(current.as_ref(), true)),
        ClientEvent::TypingStop => Ok(handle_typing(current.as_ref(), false)),
        ClientEvent::PrivateMessage(pm) => handle_private_message(state, client_id, current.as_ref(), pm).await,
    };

    match result {
        Ok(Outcome::Broadcast(event)) => {
            presence::broadcast(state, &event, Some(client_id)).await;
            vec![event]
        }
        Ok(Outcome::BroadcastExcludeSender(event)) => {
            presence::broadcast(state, &event, Some(client_id)).await;
            vec![]
        }
        Ok(Outcome::Reply(events)) => events,
        Ok(Outcome::ReplyAndBroadcast { reply, broadcast }) => {
            let mut out = reply;
            for event in broadcast {
                presence::broadcast(state, &event, Some(client_id)).await;
                out.push(event);
            }
            out
        }
        Ok(Outcome::Ignore) => vec![],
        Err(rejection) => vec![rejection],
    }
}

// =============================================================================
// JOIN
// =============================================================================

async fn handle_join(
    state: &AppState,
    client_id: Uuid,
    current: &mut Option<Member>,
    join: JoinChat,
) -> Result<Outcome, ServerEvent> {
    let Some(login) = join.login().map(str::trim) else {
        return Err(ServerEvent::login_error("Username cannot be empty"));
    };
    if !login.contains('@') && char_len(login) > USERNAME_MAX_LEN {
        return Err(ServerEvent::login_error("Username too long (max 20 characters)"));
    }

    let username = match accounts::verify(state, login, &join.password).await {
        Ok(username) => username,
        Err(e) => {
            info!(%client_id, login, "ws: join rejected");
            return Err(ServerEvent::login_error(e.to_string()));
        }
    };

    // Switching identity on the same connection parts the old one first.
    let rejoin = current.as_ref().is_some_and(|m| m.username == username);
    if !rejoin && current.take().is_some() {
        if let Some(left) = presence::detach(state, client_id).await {
            announce_departure(state, &left).await;
        }
    }

    // Snapshot the replay before attaching: anything recorded after this
    // point arrives on the channel instead, so nothing is delivered twice.
    let replay = history::recent(state, state.config.history_replay).await;

    let member = Member::new(username);
    let came_online = presence::attach(state, client_id, member.clone()).await && !rejoin;
    *current = Some(member.clone());
    info!(%client_id, username = %member.username, came_online, "ws: user joined");

    let mut reply = vec![ServerEvent::JoinSuccess(member.presence())];
    reply.extend(replay.into_iter().map(ServerEvent::NewMessage));

    let mut broadcast = Vec::with_capacity(2);
    if came_online {
        broadcast.push(ServerEvent::UserJoined(member.presence()));
    }
    broadcast.push(ServerEvent::OnlineUsersUpdate(roster_of(state).await));

    Ok(Outcome::ReplyAndBroadcast { reply, broadcast })
}

// =============================================================================
// MESSAGES
// =============================================================================

async fn handle_send_message(
    state: &AppState,
    client_id: Uuid,
    current: Option<&Member>,
    msg: SendMessage,
) -> Result<Outcome, ServerEvent> {
    let Some(member) = current else {
        return Err(ServerEvent::error("Join the chat first"));
    };

    let text = msg.message.trim();
    if text.is_empty() {
        return Ok(Outcome::Ignore);
    }
    check_length(text)?;
    state
        .rate_limiter
        .check_and_record(client_id)
        .map_err(|e| ServerEvent::error(e.to_string()))?;

    let message = history::record(state, member, text).await;
    Ok(Outcome::Broadcast(ServerEvent::NewMessage(message)))
}

async fn handle_private_message(
    state: &AppState,
    client_id: Uuid,
    current: Option<&Member>,
    pm: PrivateMessage,
) -> Result<Outcome, ServerEvent> {
    let Some(member) = current else {
        return Err(ServerEvent::error("Join the chat first"));
    };

    let text = pm.message.trim();
    if text.is_empty() {
        return Ok(Outcome::Ignore);
    }
    let target = pm.target_user.trim();
    if target.is_empty() {
        return Err(ServerEvent::error("Choose someone to message"));
    }
    if target == member.username {
        return Err(ServerEvent::error("You cannot message yourself"));
    }
    check_length(text)?;
    if !presence::is_online(state, target).await {
        return Err(ServerEvent::error(format!("User {target} is not online")));
    }
    state
        .rate_limiter
        .check_and_record(client_id)
        .map_err(|e| ServerEvent::error(e.to_string()))?;

    let note = PrivateNote {
        from_user: member.username.clone(),
        to_user: target.to_owned(),
        message: text.to_owned(),
        timestamp: clock::time_of_day(clock::now()),
        avatar_color: member.avatar_color.clone(),
    };
    let delivered = presence::send_to_user(state, target, &ServerEvent::PrivateMessageReceived(note.clone())).await;
    debug!(%client_id, from = %note.from_user, to = %note.to_user, delivered, "ws: private message");

    Ok(Outcome::Reply(vec![ServerEvent::PrivateMessageSent(note)]))
}

fn check_length(text: &str) -> Result<(), ServerEvent> {
    if char_len(text) > MESSAGE_MAX_LEN {
        return Err(ServerEvent::error("Message too long (max 1000 characters)"));
    }
    Ok(())
}

// =============================================================================
// TYPING
// =============================================================================

fn handle_typing(current: Option<&Member>, started: bool) -> Outcome {
    let Some(member) = current else {
        // Typing before joining is ignored.
        return Outcome::Ignore;
    };
    let typing = Typing { username: member.username.clone() };
    if started {
        Outcome::BroadcastExcludeSender(ServerEvent::UserTyping(typing))
    } else {
        Outcome::BroadcastExcludeSender(ServerEvent::UserStoppedTyping(typing))
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn roster_of(state: &AppState) -> Roster {
    Roster { users: presence::roster(state).await }
}

async fn send_all(socket: &mut WebSocket, events: &[ServerEvent]) -> Result<(), ()> {
    for event in events {
        send_event(socket, event).await?;
    }
    Ok(())
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), ()> {
    let json = match events::encode(event) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, event = event.name(), "ws: failed to encode event");
            return Err(());
        }
    };
    if let ServerEvent::Error(notice) | ServerEvent::LoginError(notice) = event {
        debug!(event = event.name(), message = %notice.message, "ws: send rejection");
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
