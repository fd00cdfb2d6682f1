//! Best-effort message fan-out
//!
//! Delivery helpers over the session table. Every send is fire-and-forget
//! onto a session's bounded outbox: a closed or full outbox is skipped and
//! logged, never retried, and never aborts delivery to the remaining
//! recipients. Callers (the server actor) invoke these with a membership
//! snapshot taken at call time, so a session joining mid-broadcast simply
//! misses that one message.

use std::collections::HashMap;

use tracing::debug;

use crate::message::ServerMessage;
use crate::session::Session;
use crate::types::SessionId;

/// Send to every authenticated session, regardless of room
pub fn to_all(sessions: &HashMap<SessionId, Session>, msg: &ServerMessage) {
    for session in sessions.values().filter(|s| s.is_authenticated()) {
        if let Err(e) = session.send(msg.clone()) {
            debug!("Dropping message to {}: {}", session.display_name(), e);
        }
    }
}

/// Send to the given room members, optionally excluding one session
///
/// `members` is the caller's snapshot of the target room at call time.
pub fn to_room(
    sessions: &HashMap<SessionId, Session>,
    members: &[SessionId],
    msg: &ServerMessage,
    exclude: Option<SessionId>,
) {
    for id in members {
        if exclude == Some(*id) {
            continue;
        }
        if let Some(session) = sessions.get(id) {
            if let Err(e) = session.send(msg.clone()) {
                debug!("Dropping message to {}: {}", session.display_name(), e);
            }
        }
    }
}

/// Send to exactly one session
///
/// Returns true if the message was accepted by the target's outbox.
pub fn to_session(
    sessions: &HashMap<SessionId, Session>,
    id: SessionId,
    msg: ServerMessage,
) -> bool {
    match sessions.get(&id) {
        Some(session) => match session.send(msg) {
            Ok(()) => true,
            Err(e) => {
                debug!("Dropping message to {}: {}", session.display_name(), e);
                false
            }
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::OUTBOX_CAPACITY;
    use crate::types::Username;
    use tokio::sync::mpsc;

    fn make_session(
        sessions: &mut HashMap<SessionId, Session>,
        name: Option<&str>,
    ) -> (SessionId, mpsc::Receiver<ServerMessage>) {
        let id = SessionId::new();
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        let mut session = Session::new(id, "127.0.0.1:1234".parse().unwrap(), tx);
        if let Some(name) = name {
            session.username = Some(Username::parse(name).unwrap());
        }
        sessions.insert(id, session);
        (id, rx)
    }

    #[tokio::test]
    async fn test_to_all_skips_unauthenticated() {
        let mut sessions = HashMap::new();
        let (_alice, mut alice_rx) = make_session(&mut sessions, Some("alice"));
        let (_anon, mut anon_rx) = make_session(&mut sessions, None);

        to_all(&sessions, &ServerMessage::System("notice".into()));

        assert_eq!(
            alice_rx.recv().await,
            Some(ServerMessage::System("notice".into()))
        );
        assert!(anon_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_to_room_excludes_sender() {
        let mut sessions = HashMap::new();
        let (alice, mut alice_rx) = make_session(&mut sessions, Some("alice"));
        let (bob, mut bob_rx) = make_session(&mut sessions, Some("bob"));
        let (_carol, mut carol_rx) = make_session(&mut sessions, Some("carol"));

        let msg = ServerMessage::Chat {
            room: "general".into(),
            from: "alice".into(),
            text: "hi".into(),
        };
        to_room(&sessions, &[alice, bob], &msg, Some(alice));

        assert_eq!(bob_rx.recv().await, Some(msg));
        assert!(alice_rx.try_recv().is_err());
        // carol is not a member
        assert!(carol_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_to_room_survives_closed_outbox() {
        let mut sessions = HashMap::new();
        let (alice, alice_rx) = make_session(&mut sessions, Some("alice"));
        let (bob, mut bob_rx) = make_session(&mut sessions, Some("bob"));
        drop(alice_rx);

        let msg = ServerMessage::System("still delivered".into());
        to_room(&sessions, &[alice, bob], &msg, None);

        assert_eq!(bob_rx.recv().await, Some(msg));
    }

    #[tokio::test]
    async fn test_to_session_unknown_target() {
        let sessions = HashMap::new();
        assert!(!to_session(
            &sessions,
            SessionId::new(),
            ServerMessage::System("hi".into())
        ));
    }
}
