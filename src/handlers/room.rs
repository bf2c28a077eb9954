//! 방 조회/정리 핸들러

use crate::error::SignalError;
use crate::state::AppState;

/// 방 인원 조회 (GetParticipantCount)
pub fn room_participant_count(state: &AppState, room_id: &str) -> Result<usize, SignalError> {
    state.rooms.participant_count(room_id.trim())
}

/// 유휴 방 정리
pub fn cleanup_idle_rooms(state: &AppState) -> usize {
    let deleted = state.rooms.sweep_idle(state.config.room.idle_timeout());
    if deleted > 0 {
        tracing::info!(deleted_rooms = deleted, "Cleanup completed");
    }
    deleted
}
