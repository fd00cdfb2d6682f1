//! Session struct definition
//!
//! Represents one connected client with its state and outbound channel.

use std::net::SocketAddr;

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::registry::LOBBY;
use crate::types::{SessionId, Username};

/// Bounded outbox capacity per session. When a receiver falls this far
/// behind, further messages to it are dropped rather than blocking the
/// server actor.
pub const OUTBOX_CAPACITY: usize = 64;

/// Server-side state for one connection
///
/// Created on accept, before authentication; `username` is `None` until a
/// name is claimed. The `connected` flag goes false exactly once, when the
/// session is removed from the server.
#[derive(Debug)]
pub struct Session {
    /// Unique identifier for this session
    pub id: SessionId,
    /// Claimed username (None while authenticating)
    pub username: Option<Username>,
    /// Name of the room this session currently belongs to
    pub room: String,
    /// Remote peer address
    pub addr: SocketAddr,
    /// Server → client outbox
    sender: mpsc::Sender<ServerMessage>,
    /// Liveness flag; cleared once on disconnect
    connected: bool,
}

impl Session {
    /// Create a new unauthenticated session
    pub fn new(id: SessionId, addr: SocketAddr, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            username: None,
            room: LOBBY.to_string(),
            addr,
            sender,
            connected: true,
        }
    }

    /// Push a line onto this session's outbox, best-effort
    ///
    /// Never blocks: a closed outbox (peer gone) or a full outbox (slow
    /// receiver) returns an error the caller is free to discard.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
            mpsc::error::TrySendError::Full(_) => SendError::Full,
        })
    }

    /// Get the display name for this session
    ///
    /// Returns the username if claimed, otherwise "unknown".
    pub fn display_name(&self) -> &str {
        self.username.as_ref().map(Username::as_str).unwrap_or("unknown")
    }

    /// Check whether this session has completed authentication
    pub fn is_authenticated(&self) -> bool {
        self.username.is_some()
    }

    /// Check the liveness flag
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Clear the liveness flag
    ///
    /// Returns true only on the first call; repeated disconnects are no-ops.
    pub fn mark_disconnected(&mut self) -> bool {
        let was_connected = self.connected;
        self.connected = false;
        was_connected
    }
}
