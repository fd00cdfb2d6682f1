//! Error types for the chat server
//!
//! Defines application-level errors, command parse errors, and message
//! send errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (reported back to the offending session).
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal for the affected connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - the server actor is gone)
    #[error("Channel send error")]
    ChannelSend,

    /// Username does not meet the 3-12 alphanumeric policy
    #[error("Invalid username: '{0}' (must be 3-12 alphanumeric characters)")]
    InvalidUsername(String),

    /// Username already claimed by a connected session
    #[error("Username '{0}' is already taken")]
    NameTaken(String),

    /// No connected session with the given username
    #[error("User '{0}' is not connected")]
    UserNotFound(String),

    /// No room with the given name
    #[error("Room '{0}' does not exist")]
    RoomNotFound(String),

    /// The lobby cannot be deleted
    #[error("The lobby cannot be deleted")]
    LobbyProtected,
}

/// Command parse errors
///
/// Raised for malformed `/`-prefixed input lines. Reported to the issuing
/// session only; never alters session state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Command token not recognized
    #[error("Unknown command '{0}'. Type /help for available commands")]
    UnknownCommand(String),

    /// Command recognized but an argument is missing
    #[error("Usage: {0}")]
    MissingArgument(&'static str),
}

/// Message send errors
///
/// Occurs when attempting to push a line onto a session's outbox.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The receiving end of the outbox has been closed
    #[error("Outbox closed")]
    Closed,

    /// The outbox is full (slow receiver); the message is dropped
    #[error("Outbox full")]
    Full,
}
