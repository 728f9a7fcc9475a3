//! WebSocket transport: connect, event I/O, reconnect, typing idle tracking.

use std::time::{Duration, Instant};

use events::{ClientEvent, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::CliError;

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Chat socket URL for an HTTP base URL.
///
/// # Errors
///
/// Returns [`CliError::InvalidBaseUrl`] unless the scheme is http(s) or ws(s).
pub fn ws_url(base_url: &str) -> Result<String, CliError> {
    let base = base_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/ws"));
    }
    if let Some(rest) = base.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/ws"));
    }
    if base.starts_with("ws://") || base.starts_with("wss://") {
        return Ok(format!("{base}/ws"));
    }

    Err(CliError::InvalidBaseUrl(base_url.to_owned()))
}

/// # Errors
///
/// Returns [`CliError::WsConnect`] or [`CliError::Timeout`].
pub async fn connect(url: &str) -> Result<WsStream, CliError> {
    let (stream, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url))
        .await
        .map_err(|_| CliError::Timeout)?
        .map_err(|error| CliError::WsConnect(Box::new(error)))?;
    Ok(stream)
}

/// # Errors
///
/// Returns an encode or socket error.
pub async fn send_event(stream: &mut WsStream, event: &ClientEvent) -> Result<(), CliError> {
    let text = events::encode(event)?;
    stream
        .send(Message::text(text))
        .await
        .map_err(|error| CliError::WsConnect(Box::new(error)))
}

/// Next server event, or `None` once the server closes the socket.
///
/// # Errors
///
/// Returns a socket error, or [`CliError::Decode`] for an envelope this
/// client does not understand.
pub async fn next_event(stream: &mut WsStream) -> Result<Option<ServerEvent>, CliError> {
    loop {
        let Some(message) = stream.next().await else {
            return Ok(None);
        };
        match message.map_err(|error| CliError::WsConnect(Box::new(error)))? {
            Message::Text(text) => {
                return events::decode_server_event(text.as_str())
                    .map(Some)
                    .map_err(CliError::from);
            }
            Message::Close(_) => return Ok(None),
            _ => {}
        }
    }
}

// =============================================================================
// RECONNECT
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

/// Reconnect with a fixed delay between attempts, then re-send `join` on the
/// fresh socket so the server restores the identity.
///
/// # Errors
///
/// Returns [`CliError::ReconnectFailed`] once every attempt has failed.
pub async fn reconnect(url: &str, policy: ReconnectPolicy, join: Option<&ClientEvent>) -> Result<WsStream, CliError> {
    for attempt in 1..=policy.attempts {
        tokio::time::sleep(policy.delay).await;
        eprintln!("reconnecting ({attempt}/{})...", policy.attempts);

        let mut stream = match connect(url).await {
            Ok(stream) => stream,
            Err(error) => {
                eprintln!("reconnect attempt {attempt} failed: {error}");
                continue;
            }
        };
        if let Some(join) = join {
            if let Err(error) = send_event(&mut stream, join).await {
                eprintln!("reconnect attempt {attempt} failed: {error}");
                continue;
            }
        }
        return Ok(stream);
    }

    Err(CliError::ReconnectFailed(policy.attempts))
}

// =============================================================================
// TYPING
// =============================================================================

/// Tracks whether a `typing_start` is outstanding. Input opens a typing
/// period; it closes once no input has arrived for `idle`.
#[derive(Debug)]
pub struct TypingTracker {
    idle: Duration,
    last_input: Option<Instant>,
}

impl TypingTracker {
    #[must_use]
    pub fn new(idle: Duration) -> Self {
        Self { idle, last_input: None }
    }

    /// Record input. Returns `true` when `typing_start` should be sent.
    pub fn input(&mut self, now: Instant) -> bool {
        let started = self.last_input.is_none();
        self.last_input = Some(now);
        started
    }

    /// Returns `true` once when the idle period has elapsed and
    /// `typing_stop` should be sent.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.last_input {
            Some(at) if now.saturating_duration_since(at) >= self.idle => {
                self.last_input = None;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn is_typing(&self) -> bool {
        self.last_input.is_some()
    }

    /// Forget an outstanding period without signalling, e.g. after a reconnect.
    pub fn reset(&mut self) {
        self.last_input = None;
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Bind a local listener and return its chat URL.
    pub async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        (listener, url)
    }

    /// Accept one socket and hand back the first event the client sends.
    pub fn first_client_event(listener: TcpListener) -> JoinHandle<ClientEvent> {
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            loop {
                if let Message::Text(text) = ws.next().await.unwrap().unwrap() {
                    return events::decode_client_event(text.as_str()).unwrap();
                }
            }
        })
    }

    /// Accept one socket, complete the handshake, then drop it.
    pub fn accept_and_drop(listener: TcpListener) -> JoinHandle<()> {
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            drop(tokio_tungstenite::accept_async(tcp).await.unwrap());
        })
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
