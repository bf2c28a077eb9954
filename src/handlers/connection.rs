//! 연결 핸들러

use crate::error::SignalError;
use crate::protocol::ServerMessage;
use crate::room::Participant;
use crate::state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::Sender;

/// 방에 참여한 연결 하나. 닫히거나 드롭될 때 정확히 한 번 leave 한다.
pub struct Session {
    state: Arc<AppState>,
    room_id: String,
    client_id: String,
    left: AtomicBool,
}

impl Session {
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// 여러 번 호출돼도 leave는 한 번만
    pub fn close(&self) {
        if !self.left.swap(true, Ordering::AcqRel) {
            handle_disconnect(&self.state, &self.room_id, &self.client_id);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// 새 연결 처리 (OnConnect)
pub fn handle_connect(
    state: Arc<AppState>,
    room_id: &str,
    client_id: &str,
    sender: Sender<ServerMessage>,
) -> Result<Session, SignalError> {
    let room_id = room_id.trim();
    let participant = Participant::new(client_id, sender)?;
    let (room, outcome) = state.rooms.connect(room_id, participant)?;

    tracing::info!(
        client_id = %client_id,
        room_id = %room.id(),
        user_count = outcome.participant_count,
        polite = outcome.role.is_polite(),
        flushed = outcome.flushed,
        "User joined room"
    );

    Ok(Session {
        state,
        room_id: room_id.to_string(),
        client_id: client_id.to_string(),
        left: AtomicBool::new(false),
    })
}

/// 연결 해제 처리 (OnDisconnect). 이미 나간 참가자면 조용히 무시.
pub fn handle_disconnect(state: &AppState, room_id: &str, client_id: &str) {
    match state.rooms.leave(room_id, client_id) {
        Ok(remaining) => {
            tracing::info!(
                client_id = %client_id,
                room_id = %room_id,
                remaining = remaining,
                "User left room"
            );
        }
        Err(SignalError::NotFound { what, id }) => {
            tracing::debug!(client_id = %client_id, what = what, id = %id, "Disconnect for absent participant");
        }
        Err(e) => {
            tracing::warn!(client_id = %client_id, room_id = %room_id, error = %e, "Leave failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tokio::sync::mpsc;

    fn app_state() -> Arc<AppState> {
        Arc::new(AppState::new(Config::default()))
    }

    #[test]
    fn test_session_leaves_exactly_once() {
        let state = app_state();
        let (tx_a, _rx_a) = mpsc::channel(8);
        let (tx_b, _rx_b) = mpsc::channel(8);

        let a = handle_connect(state.clone(), "555", "a", tx_a).unwrap();
        let _b = handle_connect(state.clone(), "555", "b", tx_b).unwrap();
        assert_eq!(state.rooms.participant_count("555").unwrap(), 2);

        a.close();
        a.close();
        drop(a);
        assert_eq!(state.rooms.participant_count("555").unwrap(), 1);
    }

    #[test]
    fn test_dropping_last_session_tears_down_room() {
        let state = app_state();
        let (tx, _rx) = mpsc::channel(8);

        let session = handle_connect(state.clone(), "555", "a", tx).unwrap();
        assert_eq!(session.room_id(), "555");
        drop(session);

        assert!(state.rooms.is_empty());
    }

    #[test]
    fn test_connect_to_full_room_fails() {
        let state = app_state();
        let mut sessions = Vec::new();
        for id in ["a", "b"] {
            let (tx, rx) = mpsc::channel(8);
            sessions.push((handle_connect(state.clone(), "555", id, tx).unwrap(), rx));
        }

        let (tx, _rx) = mpsc::channel(8);
        let err = handle_connect(state.clone(), "555", "c", tx).err().unwrap();
        assert!(matches!(err, SignalError::RoomFull { .. }));
        assert_eq!(state.rooms.participant_count("555").unwrap(), 2);
    }

    #[test]
    fn test_disconnect_for_unknown_room_is_ignored() {
        let state = app_state();
        handle_disconnect(&state, "nowhere", "ghost");
        assert!(state.rooms.is_empty());
    }
}
