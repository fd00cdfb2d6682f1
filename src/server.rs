//! ChatServer actor implementation
//!
//! The central actor that owns all mutable state: the session table, the
//! user registry, and the room registry. Uses the Actor pattern with mpsc
//! channels; because every mutation and every room broadcast runs on this
//! one task, registry updates are atomic with respect to each other and
//! messages from one sender reach a room's members in the order they were
//! issued.

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use crate::broadcast;
use crate::error::AppError;
use crate::message::ServerMessage;
use crate::registry::{RoomRegistry, UserRegistry, LOBBY};
use crate::session::Session;
use crate::types::{SessionId, Username};

/// Commands sent from connection handlers and the admin console
#[derive(Debug)]
pub enum ServerCommand {
    /// New connection accepted
    Connect {
        id: SessionId,
        addr: SocketAddr,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Claim a username for a connecting session
    ///
    /// Replies true on success; false means the name is already taken and
    /// the handler should re-prompt.
    Authenticate {
        id: SessionId,
        name: Username,
        reply: oneshot::Sender<bool>,
    },
    /// Chat text for the session's current room
    Chat { id: SessionId, text: String },
    /// Move the session to another room, creating it if absent
    SwitchRoom { id: SessionId, room: String },
    /// Private message to a named user
    PrivateMessage {
        id: SessionId,
        to: String,
        text: String,
    },
    /// Send the session a user list snapshot
    ListUsers { id: SessionId },
    /// Send the session a room list snapshot
    ListRooms { id: SessionId },
    /// Connection ended (quit, EOF, or I/O failure)
    Disconnect { id: SessionId },
    /// Admin: snapshot of authenticated sessions
    ListSessions {
        reply: oneshot::Sender<Vec<SessionInfo>>,
    },
    /// Admin: snapshot of rooms with member counts
    RoomOverview {
        reply: oneshot::Sender<Vec<(String, usize)>>,
    },
    /// Admin: force-disconnect a user; replies false if not connected
    Kick {
        name: String,
        reply: oneshot::Sender<bool>,
    },
    /// Admin: delete a room, moving members to the lobby
    ///
    /// Replies with the number of members moved.
    DeleteRoom {
        name: String,
        reply: oneshot::Sender<Result<usize, AppError>>,
    },
    /// Admin: graceful shutdown of the whole server
    Shutdown,
}

/// One row of the admin `/list` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub name: String,
    pub room: String,
    pub addr: SocketAddr,
}

/// The main ChatServer actor
///
/// Consumes commands until the channel closes or a `Shutdown` arrives.
pub struct ChatServer {
    /// All connected sessions, authenticated or not
    sessions: HashMap<SessionId, Session>,
    /// Username uniqueness and lookup
    users: UserRegistry,
    /// Room membership
    rooms: RoomRegistry,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
    /// Flipped to true on shutdown; the accept loop watches this
    shutdown: watch::Sender<bool>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>, shutdown: watch::Sender<bool>) -> Self {
        Self {
            sessions: HashMap::new(),
            users: UserRegistry::new(),
            rooms: RoomRegistry::new(),
            receiver,
            shutdown,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are
    /// dropped or a `Shutdown` command is handled.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            let stop = matches!(cmd, ServerCommand::Shutdown);
            self.handle_command(cmd);
            if stop {
                break;
            }
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { id, addr, sender } => {
                self.handle_connect(id, addr, sender);
            }
            ServerCommand::Authenticate { id, name, reply } => {
                self.handle_authenticate(id, name, reply);
            }
            ServerCommand::Chat { id, text } => {
                self.handle_chat(id, text);
            }
            ServerCommand::SwitchRoom { id, room } => {
                self.handle_switch_room(id, room);
            }
            ServerCommand::PrivateMessage { id, to, text } => {
                self.handle_private_message(id, to, text);
            }
            ServerCommand::ListUsers { id } => {
                broadcast::to_session(
                    &self.sessions,
                    id,
                    ServerMessage::UserList(self.users.names()),
                );
            }
            ServerCommand::ListRooms { id } => {
                broadcast::to_session(
                    &self.sessions,
                    id,
                    ServerMessage::RoomList(self.rooms.names()),
                );
            }
            ServerCommand::Disconnect { id } => {
                self.handle_disconnect(id);
            }
            ServerCommand::ListSessions { reply } => {
                let _ = reply.send(self.session_infos());
            }
            ServerCommand::RoomOverview { reply } => {
                let _ = reply.send(self.rooms.overview());
            }
            ServerCommand::Kick { name, reply } => {
                let _ = reply.send(self.handle_kick(&name));
            }
            ServerCommand::DeleteRoom { name, reply } => {
                let _ = reply.send(self.handle_delete_room(&name));
            }
            ServerCommand::Shutdown => {
                self.handle_shutdown();
            }
        }
    }

    /// Handle new connection registration
    fn handle_connect(&mut self, id: SessionId, addr: SocketAddr, sender: mpsc::Sender<ServerMessage>) {
        info!("Session {} connected from {}", id, addr);
        self.sessions.insert(id, Session::new(id, addr, sender));
        debug!(
            "Total sessions: {}, Total rooms: {}",
            self.sessions.len(),
            self.rooms.len()
        );
    }

    /// Handle a username claim
    ///
    /// On success the session enters the lobby, gets a direct welcome, and
    /// the lobby hears a join announcement.
    fn handle_authenticate(&mut self, id: SessionId, name: Username, reply: oneshot::Sender<bool>) {
        let Some(session) = self.sessions.get_mut(&id) else {
            let _ = reply.send(false);
            return;
        };

        if let Err(e) = self.users.claim(name.clone(), id) {
            debug!("Session {}: {}", id, e);
            let _ = reply.send(false);
            return;
        }

        session.username = Some(name.clone());
        session.room = LOBBY.to_string();
        self.rooms.join(id, LOBBY);

        info!("Session {} authenticated as '{}'", id, name);

        broadcast::to_session(
            &self.sessions,
            id,
            ServerMessage::System(format!("Welcome, {}!", name)),
        );
        let members = self.rooms.members(LOBBY);
        broadcast::to_room(
            &self.sessions,
            &members,
            &ServerMessage::System(format!("{} joined the chat", name)),
            Some(id),
        );
        broadcast::to_all(&self.sessions, &ServerMessage::UserList(self.users.names()));

        let _ = reply.send(true);
    }

    /// Handle a chat line for the sender's current room
    ///
    /// The sender never receives its own echo; its client displays the
    /// line locally.
    fn handle_chat(&mut self, id: SessionId, text: String) {
        let Some(session) = self.sessions.get(&id) else {
            return;
        };
        if !session.is_authenticated() {
            return;
        }

        let room = session.room.clone();
        let from = session.display_name().to_string();
        debug!("[{}] {}: {}", room, from, text);

        let members = self.rooms.members(&room);
        broadcast::to_room(
            &self.sessions,
            &members,
            &ServerMessage::Chat { room, from, text },
            Some(id),
        );
    }

    /// Handle a room switch, creating the target room if it is new
    fn handle_switch_room(&mut self, id: SessionId, room: String) {
        let Some(session) = self.sessions.get(&id) else {
            return;
        };
        if !session.is_authenticated() {
            return;
        }

        let name = session.display_name().to_string();
        let old_room = session.room.clone();

        if old_room == room {
            broadcast::to_session(
                &self.sessions,
                id,
                ServerMessage::System(format!("You are already in '{}'", room)),
            );
            return;
        }

        let created = !self.rooms.contains(&room);
        self.rooms.leave(id, &old_room);
        self.rooms.join(id, &room);
        if let Some(session) = self.sessions.get_mut(&id) {
            session.room = room.clone();
        }

        info!("{} moved from '{}' to '{}'", name, old_room, room);

        let old_members = self.rooms.members(&old_room);
        broadcast::to_room(
            &self.sessions,
            &old_members,
            &ServerMessage::System(format!("{} left the room", name)),
            None,
        );
        let new_members = self.rooms.members(&room);
        broadcast::to_room(
            &self.sessions,
            &new_members,
            &ServerMessage::System(format!("{} joined the room", name)),
            Some(id),
        );
        broadcast::to_session(&self.sessions, id, ServerMessage::RoomChange(room));

        if created {
            broadcast::to_all(&self.sessions, &ServerMessage::RoomList(self.rooms.names()));
        }
    }

    /// Handle a private message
    ///
    /// An unknown target produces an error reply to the sender; it is
    /// never dropped silently.
    fn handle_private_message(&mut self, id: SessionId, to: String, text: String) {
        let Some(sender) = self.sessions.get(&id) else {
            return;
        };
        if !sender.is_authenticated() {
            return;
        }
        let from = sender.display_name().to_string();

        let Some(target) = self.users.lookup(&to) else {
            broadcast::to_session(
                &self.sessions,
                id,
                ServerMessage::from(AppError::UserNotFound(to)),
            );
            return;
        };

        let to_name = self
            .sessions
            .get(&target)
            .map(|s| s.display_name().to_string())
            .unwrap_or(to);

        broadcast::to_session(
            &self.sessions,
            target,
            ServerMessage::PrivateFrom {
                from,
                text: text.clone(),
            },
        );
        broadcast::to_session(
            &self.sessions,
            id,
            ServerMessage::PrivateTo { to: to_name, text },
        );
    }

    /// Handle a connection ending for any reason
    ///
    /// Repeated disconnects for the same session are no-ops: the first
    /// removal takes the session out of the table, so no duplicate
    /// departure announcements are possible.
    fn handle_disconnect(&mut self, id: SessionId) {
        let Some(session) = self.remove_session(id) else {
            return;
        };

        if let Some(name) = &session.username {
            broadcast::to_all(
                &self.sessions,
                &ServerMessage::System(format!("{} left the chat", name)),
            );
            broadcast::to_all(&self.sessions, &ServerMessage::UserList(self.users.names()));
            info!("'{}' disconnected", name);
        } else {
            debug!("Unauthenticated session {} closed", id);
        }

        debug!(
            "Total sessions: {}, Total rooms: {}",
            self.sessions.len(),
            self.rooms.len()
        );
    }

    /// Handle an administrative kick
    ///
    /// The victim gets an `[ADMIN]` notice queued before its outbox is
    /// dropped; dropping the outbox unblocks the handler's read loop and
    /// drives it to disconnect.
    fn handle_kick(&mut self, name: &str) -> bool {
        let Some(id) = self.users.lookup(name) else {
            return false;
        };

        broadcast::to_session(
            &self.sessions,
            id,
            ServerMessage::Admin("You have been kicked by an admin".to_string()),
        );

        let display_name = self
            .remove_session(id)
            .and_then(|s| s.username)
            .map(|n| n.as_str().to_string())
            .unwrap_or_else(|| name.to_string());

        broadcast::to_all(
            &self.sessions,
            &ServerMessage::System(format!("{} was kicked by admin", display_name)),
        );
        broadcast::to_all(&self.sessions, &ServerMessage::UserList(self.users.names()));
        info!("Kicked user: {}", display_name);
        true
    }

    /// Handle an administrative room deletion
    fn handle_delete_room(&mut self, name: &str) -> Result<usize, AppError> {
        let moved = self.rooms.delete(name)?;

        for id in &moved {
            if let Some(session) = self.sessions.get_mut(id) {
                session.room = LOBBY.to_string();
            }
            broadcast::to_session(
                &self.sessions,
                *id,
                ServerMessage::Admin("Your room was deleted. Moved to lobby.".to_string()),
            );
            broadcast::to_session(
                &self.sessions,
                *id,
                ServerMessage::RoomChange(LOBBY.to_string()),
            );
        }

        broadcast::to_all(
            &self.sessions,
            &ServerMessage::System(format!("Room '{}' was deleted by admin", name)),
        );
        broadcast::to_all(&self.sessions, &ServerMessage::RoomList(self.rooms.names()));
        info!("Deleted room: {} ({} members moved)", name, moved.len());
        Ok(moved.len())
    }

    /// Handle graceful shutdown
    ///
    /// Dropping every session's outbox sender unblocks all handler loops.
    fn handle_shutdown(&mut self) {
        info!("Shutting down server...");
        broadcast::to_all(
            &self.sessions,
            &ServerMessage::System("Server is shutting down".to_string()),
        );
        let _ = self.shutdown.send(true);
        self.sessions.clear();
    }

    /// Helper: remove a session from the table and both registries
    ///
    /// Announces the departure to the session's room. Returns None if the
    /// session was already removed.
    fn remove_session(&mut self, id: SessionId) -> Option<Session> {
        let mut session = self.sessions.remove(&id)?;
        session.mark_disconnected();

        if let Some(name) = session.username.clone() {
            self.rooms.leave(id, &session.room);
            let members = self.rooms.members(&session.room);
            broadcast::to_room(
                &self.sessions,
                &members,
                &ServerMessage::System(format!("{} left the room", name)),
                None,
            );
            self.users.remove(name.as_str());
        }

        Some(session)
    }

    /// Helper: admin listing of authenticated sessions, sorted by name
    fn session_infos(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self
            .sessions
            .values()
            .filter(|s| s.is_authenticated())
            .map(|s| SessionInfo {
                name: s.display_name().to_string(),
                room: s.room.clone(),
                addr: s.addr,
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}
