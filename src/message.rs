//! Wire protocol definitions
//!
//! Line-oriented text protocol: every server-to-client message renders as
//! one tagged line via `Display`, and every client-to-server line parses
//! into a [`ClientCommand`].

use crate::error::{AppError, CommandError};

/// Server → Client message
///
/// Each variant renders as exactly one protocol line. List payloads are
/// comma-joined so GUI clients can split them for side panels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Username prompt sent while a connection is authenticating
    Prompt,
    /// Snapshot of all connected usernames
    UserList(Vec<String>),
    /// Snapshot of all room names
    RoomList(Vec<String>),
    /// The session's current room changed
    RoomChange(String),
    /// Server-originated notice
    System(String),
    /// Administrative notice
    Admin(String),
    /// Incoming private message
    PrivateFrom { from: String, text: String },
    /// Confirmation copy of an outgoing private message
    PrivateTo { to: String, text: String },
    /// Room chat line
    Chat {
        room: String,
        from: String,
        text: String,
    },
}

impl std::fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Prompt => write!(f, "Enter your username:"),
            Self::UserList(names) => write!(f, "[USERLIST]{}", names.join(",")),
            Self::RoomList(rooms) => write!(f, "[ROOMLIST]{}", rooms.join(",")),
            Self::RoomChange(room) => write!(f, "[ROOMCHANGE]{}", room),
            Self::System(text) => write!(f, "[SYSTEM] {}", text),
            Self::Admin(text) => write!(f, "[ADMIN] {}", text),
            Self::PrivateFrom { from, text } => write!(f, "[PM from {}] {}", from, text),
            Self::PrivateTo { to, text } => write!(f, "[PM to {}] {}", to, text),
            Self::Chat { room, from, text } => write!(f, "[{}] {}: {}", room, from, text),
        }
    }
}

/// Convert AppError to ServerMessage for client notification
///
/// Business errors become a `[SYSTEM]` line on the offending session.
/// Fatal errors are not converted (the connection closes instead).
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        ServerMessage::System(err.to_string())
    }
}

/// Client → Server input line
///
/// Lines starting with `/` are commands; everything else is chat text for
/// the session's current room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// `/quit` - leave the server
    Quit,
    /// `/help` - command summary
    Help,
    /// `/users` - request a user list snapshot
    Users,
    /// `/rooms` - request a room list snapshot
    Rooms,
    /// `/room <name>` - switch to another room
    SwitchRoom(String),
    /// `/pm <user> <text>` - private message
    PrivateMessage { to: String, text: String },
    /// Any non-command line: chat text for the current room
    Chat(String),
}

impl ClientCommand {
    /// Parse one input line
    ///
    /// The command token is case-insensitive; arguments keep their casing.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if !line.starts_with('/') {
            return Ok(Self::Chat(line.to_string()));
        }

        let mut parts = line.splitn(2, ' ');
        let token = parts.next().unwrap_or_default().to_lowercase();
        let rest = parts.next().unwrap_or("").trim();

        match token.as_str() {
            "/quit" => Ok(Self::Quit),
            "/help" => Ok(Self::Help),
            "/users" => Ok(Self::Users),
            "/rooms" => Ok(Self::Rooms),
            "/room" => {
                if rest.is_empty() {
                    Err(CommandError::MissingArgument("/room <name>"))
                } else {
                    Ok(Self::SwitchRoom(rest.to_string()))
                }
            }
            "/pm" => {
                let mut args = rest.splitn(2, ' ');
                let to = args.next().unwrap_or("").trim();
                let text = args.next().unwrap_or("").trim();
                if to.is_empty() || text.is_empty() {
                    Err(CommandError::MissingArgument("/pm <user> <text>"))
                } else {
                    Ok(Self::PrivateMessage {
                        to: to.to_string(),
                        text: text.to_string(),
                    })
                }
            }
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }
}
