//! Per-connection protocol handler
//!
//! Drives one connection through its lifecycle: prompt for a username
//! until one is claimed, then loop over incoming lines and the session's
//! outbox until the peer quits, the stream ends, or the server drops the
//! session (kick or shutdown). Dropping the outbox sender is what unblocks
//! a handler parked on a read, so a forced disconnect needs no extra
//! signalling.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::error::AppError;
use crate::message::{ClientCommand, ServerMessage};
use crate::server::ServerCommand;
use crate::session::OUTBOX_CAPACITY;
use crate::types::{SessionId, Username};

type LineReader = Lines<BufReader<OwnedReadHalf>>;

/// Handle a new TCP connection
///
/// Registers the session with the server actor, runs the protocol state
/// machine, and always reports the disconnect back to the actor on the
/// way out, whatever ended the session.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> Result<(), AppError> {
    let addr = stream.peer_addr()?;
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half).lines();
    let mut writer = write_half;

    let id = SessionId::new();
    debug!("New TCP connection from {}", addr);

    // Register with the server actor before anything else
    let (msg_tx, msg_rx) = mpsc::channel::<ServerMessage>(OUTBOX_CAPACITY);
    cmd_tx
        .send(ServerCommand::Connect {
            id,
            addr,
            sender: msg_tx,
        })
        .await
        .map_err(|_| AppError::ChannelSend)?;

    let result = run_session(id, &cmd_tx, &mut reader, &mut writer, msg_rx).await;

    // Disconnect is idempotent server-side; safe to send unconditionally
    let _ = cmd_tx.send(ServerCommand::Disconnect { id }).await;
    debug!("Session {} closed", id);

    result
}

/// Run the authenticated part of the session after username negotiation
async fn run_session(
    id: SessionId,
    cmd_tx: &mpsc::Sender<ServerCommand>,
    reader: &mut LineReader,
    writer: &mut OwnedWriteHalf,
    msg_rx: mpsc::Receiver<ServerMessage>,
) -> Result<(), AppError> {
    let Some(name) = authenticate(id, cmd_tx, reader, writer).await? else {
        // Peer vanished before claiming a name
        return Ok(());
    };
    info!("Session {} active as '{}'", id, name);

    active_loop(id, cmd_tx, reader, writer, msg_rx).await
}

/// Username negotiation loop
///
/// Re-prompts on invalid or already-taken names; the losing side of a
/// claim race stays connected and just tries again. Returns None when the
/// peer closes the stream before authenticating.
async fn authenticate(
    id: SessionId,
    cmd_tx: &mpsc::Sender<ServerCommand>,
    reader: &mut LineReader,
    writer: &mut OwnedWriteHalf,
) -> Result<Option<Username>, AppError> {
    loop {
        write_line(writer, &ServerMessage::Prompt).await?;

        let Some(line) = reader.next_line().await? else {
            return Ok(None);
        };

        let name = match Username::parse(&line) {
            Ok(name) => name,
            Err(e) => {
                write_line(writer, &ServerMessage::from(e)).await?;
                continue;
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        cmd_tx
            .send(ServerCommand::Authenticate {
                id,
                name: name.clone(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| AppError::ChannelSend)?;

        if reply_rx.await.map_err(|_| AppError::ChannelSend)? {
            return Ok(Some(name));
        }

        let taken = AppError::NameTaken(name.as_str().to_string());
        write_line(writer, &ServerMessage::from(taken)).await?;
    }
}

/// Main read loop for an authenticated session
///
/// Multiplexes incoming lines with the session's outbox. Exits on `/quit`,
/// end of stream, a read or write failure, or the outbox closing (the
/// server dropped the session).
async fn active_loop(
    id: SessionId,
    cmd_tx: &mpsc::Sender<ServerCommand>,
    reader: &mut LineReader,
    writer: &mut OwnedWriteHalf,
    mut msg_rx: mpsc::Receiver<ServerMessage>,
) -> Result<(), AppError> {
    loop {
        tokio::select! {
            line = reader.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match ClientCommand::parse(&line) {
                            Ok(ClientCommand::Quit) => {
                                debug!("Session {} quit", id);
                                return Ok(());
                            }
                            Ok(ClientCommand::Help) => {
                                write_line(writer, &help_message()).await?;
                            }
                            Ok(cmd) => {
                                if cmd_tx.send(to_server_command(id, cmd)).await.is_err() {
                                    debug!("Server closed, ending session {}", id);
                                    return Ok(());
                                }
                            }
                            Err(e) => {
                                // Protocol error: report to this session only
                                write_line(writer, &ServerMessage::System(e.to_string())).await?;
                            }
                        }
                    }
                    Ok(None) => {
                        debug!("Session {}: peer closed the stream", id);
                        return Ok(());
                    }
                    Err(e) => {
                        debug!("Session {}: read error: {}", id, e);
                        return Err(e.into());
                    }
                }
            }
            msg = msg_rx.recv() => {
                match msg {
                    Some(msg) => {
                        write_line(writer, &msg).await?;
                    }
                    None => {
                        debug!("Session {}: outbox closed (kicked or server shutdown)", id);
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Convert a parsed client command into a server actor command
///
/// `Quit` and `Help` never reach this point; the loop handles them locally.
fn to_server_command(id: SessionId, cmd: ClientCommand) -> ServerCommand {
    match cmd {
        ClientCommand::Chat(text) => ServerCommand::Chat { id, text },
        ClientCommand::SwitchRoom(room) => ServerCommand::SwitchRoom { id, room },
        ClientCommand::PrivateMessage { to, text } => {
            ServerCommand::PrivateMessage { id, to, text }
        }
        ClientCommand::Users => ServerCommand::ListUsers { id },
        ClientCommand::Rooms => ServerCommand::ListRooms { id },
        ClientCommand::Quit | ClientCommand::Help => ServerCommand::Disconnect { id },
    }
}

fn help_message() -> ServerMessage {
    ServerMessage::System(
        "Commands: /room <name>, /pm <user> <text>, /users, /rooms, /help, /quit".to_string(),
    )
}

/// Write one protocol line to the peer
async fn write_line(writer: &mut OwnedWriteHalf, msg: &ServerMessage) -> Result<(), AppError> {
    writer.write_all(format!("{}\n", msg).as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ChatServer;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::watch;
    use tokio::time::timeout;

    const READ_TIMEOUT: Duration = Duration::from_secs(5);

    async fn start_tcp_server() -> (SocketAddr, mpsc::Sender<ServerCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        tokio::spawn(ChatServer::new(cmd_rx, shutdown_tx).run());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept_tx = cmd_tx.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(handle_connection(stream, accept_tx.clone()));
            }
        });

        (addr, cmd_tx)
    }

    struct TestClient {
        reader: Lines<BufReader<OwnedReadHalf>>,
        writer: OwnedWriteHalf,
    }

    impl TestClient {
        async fn connect(addr: SocketAddr) -> Self {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (read_half, write_half) = stream.into_split();
            Self {
                reader: BufReader::new(read_half).lines(),
                writer: write_half,
            }
        }

        async fn send(&mut self, line: &str) {
            self.writer
                .write_all(format!("{}\n", line).as_bytes())
                .await
                .unwrap();
        }

        async fn read_line(&mut self) -> String {
            timeout(READ_TIMEOUT, self.reader.next_line())
                .await
                .expect("timed out waiting for a line")
                .unwrap()
                .expect("stream closed unexpectedly")
        }

        /// Read lines until one contains the pattern, skipping pushed
        /// snapshots like [USERLIST] that may interleave
        async fn expect_containing(&mut self, pattern: &str) -> String {
            for _ in 0..20 {
                let line = self.read_line().await;
                if line.contains(pattern) {
                    return line;
                }
            }
            panic!("did not receive a line containing {:?}", pattern);
        }

        async fn login(&mut self, name: &str) {
            self.expect_containing("Enter your username:").await;
            self.send(name).await;
            self.expect_containing(&format!("Welcome, {}!", name)).await;
        }
    }

    #[tokio::test]
    async fn test_login_and_room_chat_over_tcp() {
        let (addr, _cmd_tx) = start_tcp_server().await;

        let mut alice = TestClient::connect(addr).await;
        alice.login("Alice").await;

        let mut bob = TestClient::connect(addr).await;
        bob.login("Bob").await;

        alice.expect_containing("Bob joined the chat").await;

        bob.send("hi all").await;
        let line = alice.expect_containing("hi all").await;
        assert_eq!(line, "[lobby] Bob: hi all");
    }

    #[tokio::test]
    async fn test_invalid_then_taken_username_reprompts() {
        let (addr, _cmd_tx) = start_tcp_server().await;

        let mut alice = TestClient::connect(addr).await;
        alice.login("Alice").await;

        let mut other = TestClient::connect(addr).await;
        other.expect_containing("Enter your username:").await;
        other.send("x!").await;
        other.expect_containing("Invalid username").await;
        other.expect_containing("Enter your username:").await;
        other.send("alice").await;
        other.expect_containing("already taken").await;
        other.expect_containing("Enter your username:").await;
        other.send("Bob").await;
        other.expect_containing("Welcome, Bob!").await;
    }

    #[tokio::test]
    async fn test_quit_announces_departure() {
        let (addr, _cmd_tx) = start_tcp_server().await;

        let mut alice = TestClient::connect(addr).await;
        alice.login("Alice").await;
        let mut bob = TestClient::connect(addr).await;
        bob.login("Bob").await;

        bob.send("/quit").await;
        alice.expect_containing("Bob left the chat").await;
    }

    #[tokio::test]
    async fn test_unknown_command_keeps_session_alive() {
        let (addr, _cmd_tx) = start_tcp_server().await;

        let mut alice = TestClient::connect(addr).await;
        alice.login("Alice").await;
        let mut bob = TestClient::connect(addr).await;
        bob.login("Bob").await;

        bob.send("/dance").await;
        bob.expect_containing("Unknown command '/dance'").await;

        // The session is unaffected by the protocol error
        bob.send("still here").await;
        alice.expect_containing("[lobby] Bob: still here").await;
    }

    #[tokio::test]
    async fn test_room_switch_over_tcp() {
        let (addr, _cmd_tx) = start_tcp_server().await;

        let mut alice = TestClient::connect(addr).await;
        alice.login("Alice").await;

        alice.send("/room games").await;
        alice.expect_containing("[ROOMCHANGE]games").await;

        alice.send("/rooms").await;
        let line = alice.expect_containing("[ROOMLIST]").await;
        assert!(line.contains("games"));
    }

    #[tokio::test]
    async fn test_kick_closes_connection() {
        let (addr, cmd_tx) = start_tcp_server().await;

        let mut alice = TestClient::connect(addr).await;
        alice.login("Alice").await;

        let (tx, rx) = oneshot::channel();
        cmd_tx
            .send(ServerCommand::Kick {
                name: "alice".to_string(),
                reply: tx,
            })
            .await
            .unwrap();
        assert!(rx.await.unwrap());

        alice.expect_containing("You have been kicked").await;
        // The server closes the connection; reads drain and then terminate
        loop {
            let line = timeout(READ_TIMEOUT, alice.reader.next_line())
                .await
                .expect("timed out waiting for close")
                .unwrap();
            if line.is_none() {
                break;
            }
        }
    }
}
