mod form;
mod session;
mod transport;

use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use events::{ClientEvent, JoinChat, PrivateMessage, RegisterRequest, RegisterResponse, SendMessage, ServerEvent};
use tokio::io::{AsyncBufReadExt, BufReader};

use session::{ChatSession, Input};
use transport::{ReconnectPolicy, TypingTracker, WsStream};

const TYPING_IDLE: Duration = Duration::from_secs(1);
const TYPING_TICK: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Error connecting to server")]
    Unreachable,
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("timed out connecting to server")]
    Timeout,
    #[error("event decode failed: {0}")]
    Decode(#[from] events::CodecError),
    #[error("{0}")]
    Form(#[from] form::FormError),
    #[error("{0}")]
    Rejected(String),
    #[error("server returned HTTP {status}")]
    ServerError { status: u16 },
    #[error("gave up after {0} reconnect attempts")]
    ReconnectFailed(u32),
    #[error("terminal i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "chatmate", about = "ChatMate terminal client")]
struct Cli {
    #[arg(long, env = "CHATMATE_BASE_URL", default_value = "http://127.0.0.1:8080")]
    base_url: String,

    #[arg(long, default_value_t = 5)]
    reconnect_attempts: u32,

    #[arg(long, default_value_t = 1000)]
    reconnect_delay_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    base_url: String,
    reconnect: ReconnectPolicy,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the server is up.
    Ping,
    /// Create an account.
    Register(RegisterArgs),
    /// Log in and chat.
    Chat(ChatArgs),
    /// Show password strength and match indicators.
    Strength {
        password: String,
        #[arg(long)]
        confirm: Option<String>,
    },
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    password: String,
    #[arg(long)]
    confirm: String,
}

#[derive(Args, Debug)]
struct ChatArgs {
    #[arg(long, conflicts_with = "email", required_unless_present = "email")]
    username: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    password: String,
}

fn main() {
    let cli = Cli::parse();
    // Must be read before the runtime starts its worker threads.
    session::init_local_offset();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("error: failed to start runtime: {error}");
            std::process::exit(1);
        }
    };
    runtime.block_on(run(cli));
}

async fn run(cli: Cli) {
    let ctx = CliContext {
        base_url: cli.base_url,
        reconnect: ReconnectPolicy {
            attempts: cli.reconnect_attempts,
            delay: Duration::from_millis(cli.reconnect_delay_ms),
        },
    };

    let result = match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Register(args) => run_register(&ctx, args).await,
        Command::Chat(args) => run_chat(&ctx, args).await,
        Command::Strength { password, confirm } => {
            println!("{}", form::render_indicators(&password, confirm.as_deref()));
            Ok(())
        }
    };

    if let Err(error) = result {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

async fn run_ping(cli: &CliContext) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let url = format!("{}/healthz", cli.base_url.trim_end_matches('/'));
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError { status: status.as_u16() });
    }
    println!("ok");
    Ok(())
}

async fn run_register(cli: &CliContext, args: RegisterArgs) -> Result<(), CliError> {
    eprintln!("password: {}", form::render_indicators(&args.password, Some(&args.confirm)));
    let username = form::validate_registration(&args.username, &args.password, &args.confirm)?;

    let request = RegisterRequest { username, email: args.email, password: args.password };
    let url = format!("{}/register", cli.base_url.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(url)
        .json(&request)
        .send()
        .await
        .map_err(|_| CliError::Unreachable)?;
    let body = response
        .json::<RegisterResponse>()
        .await
        .map_err(|_| CliError::Unreachable)?;

    if !body.success {
        return Err(CliError::Rejected(body.message));
    }
    println!("Account created successfully! You can now login.");
    Ok(())
}

// =============================================================================
// CHAT
// =============================================================================

async fn run_chat(cli: &CliContext, args: ChatArgs) -> Result<(), CliError> {
    let raw_login = args.username.or(args.email).unwrap_or_default();
    let login = form::validate_login(&raw_login, &args.password)?;
    let join = ClientEvent::JoinChat(if login.contains('@') {
        JoinChat { username: None, email: Some(login), password: args.password }
    } else {
        JoinChat { username: Some(login), email: None, password: args.password }
    });

    let url = transport::ws_url(&cli.base_url)?;
    let mut stream = transport::connect(&url).await?;
    transport::send_event(&mut stream, &join).await?;

    let mut session = ChatSession::new();
    let mut typing = TypingTracker::new(TYPING_IDLE);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(TYPING_TICK);

    loop {
        tokio::select! {
            inbound = transport::next_event(&mut stream) => {
                match inbound {
                    Ok(Some(event)) => {
                        for line in session.apply(&event, &session::today()) {
                            println!("{line}");
                        }
                        match &event {
                            ServerEvent::LoginError(notice) => return Err(CliError::Rejected(notice.message.clone())),
                            ServerEvent::JoinSuccess(_) => eprintln!("type to chat, /help for commands"),
                            _ => {}
                        }
                    }
                    Ok(None) => stream = resume(cli, &url, &join, &mut session, &mut typing).await?,
                    Err(error) if is_connection_lost(&error) => {
                        stream = resume(cli, &url, &join, &mut session, &mut typing).await?;
                    }
                    Err(error) => eprintln!("ignoring server event: {error}"),
                }
            }
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                match handle_input(&mut stream, &session, &mut typing, &line).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(error) if is_connection_lost(&error) => {
                        stream = resume(cli, &url, &join, &mut session, &mut typing).await?;
                    }
                    Err(error) => return Err(error),
                }
            }
            _ = ticker.tick() => {
                if typing.poll(Instant::now()) {
                    match transport::send_event(&mut stream, &ClientEvent::TypingStop).await {
                        Ok(()) => {}
                        Err(error) if is_connection_lost(&error) => {
                            stream = resume(cli, &url, &join, &mut session, &mut typing).await?;
                        }
                        Err(error) => return Err(error),
                    }
                }
            }
        }
    }

    // Leaving anyway, so a dead socket here is not worth reporting.
    if typing.is_typing() {
        let _ = transport::send_event(&mut stream, &ClientEvent::TypingStop).await;
    }
    let _ = stream.close(None).await;
    Ok(())
}

/// A read or write failed because the socket is gone.
fn is_connection_lost(error: &CliError) -> bool {
    matches!(error, CliError::WsConnect(_))
}

/// Socket lost: clear per-connection view state and reconnect. Credentials
/// are re-sent so the identity survives.
async fn resume(
    cli: &CliContext,
    url: &str,
    join: &ClientEvent,
    session: &mut ChatSession,
    typing: &mut TypingTracker,
) -> Result<WsStream, CliError> {
    println!("{}", session.mark_disconnected());
    typing.reset();
    transport::reconnect(url, cli.reconnect, Some(join)).await
}

/// Act on one prompt line. Returns `false` when the user asked to leave.
async fn handle_input(
    stream: &mut WsStream,
    session: &ChatSession,
    typing: &mut TypingTracker,
    line: &str,
) -> Result<bool, CliError> {
    let input = session::parse_input(line);
    if !matches!(input, Input::Quit | Input::Help | Input::Empty) && !session.is_connected() {
        println!("! Not connected");
        return Ok(true);
    }

    match input {
        Input::Empty => {}
        Input::Quit => return Ok(false),
        Input::Help => {
            println!("  <text>              send to everyone");
            println!("  /pm <user> <text>   private message");
            println!("  /users              list who is online ({} now)", session.roster().len());
            println!("  /quit               leave");
        }
        Input::Invalid(hint) => println!("! {hint}"),
        Input::Users => transport::send_event(stream, &ClientEvent::GetOnlineUsers).await?,
        Input::Private { target, text } => {
            if session.current_user() == Some(target) {
                println!("! You cannot message yourself");
            } else {
                let pm = PrivateMessage { target_user: target.to_owned(), message: text.to_owned() };
                transport::send_event(stream, &ClientEvent::PrivateMessage(pm)).await?;
            }
        }
        Input::Message(text) => {
            if typing.input(Instant::now()) {
                transport::send_event(stream, &ClientEvent::TypingStart).await?;
            }
            let msg = SendMessage { message: text.to_owned() };
            transport::send_event(stream, &ClientEvent::SendMessage(msg)).await?;
        }
    }
    Ok(true)
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
