//! 방 레지스트리 (room_id -> Room)
//!
//! 맵 구조는 DashMap 샤드 락으로, 방 내부 상태는 방 자체의 락으로 보호한다.
//! 락 순서는 항상 레지스트리 → 방이며, 방 연산은 레지스트리를 건드리지 않는다.

use super::{JoinOutcome, Participant, Room, DEFAULT_WAITING_LIMIT};
use crate::error::SignalError;
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 빈 방 정리 시점
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownPolicy {
    /// 마지막 참가자가 나가는 즉시 제거
    OnEmpty,
    /// 주기적 정리 작업이 유휴 시간 초과 후 제거
    Idle,
}

impl TeardownPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "on_empty" | "on-empty" | "immediate" => Some(Self::OnEmpty),
            "idle" => Some(Self::Idle),
            _ => None,
        }
    }
}

pub enum Resolution {
    /// 새 방을 만들고 첫 참가자를 넣음
    Created { room: Arc<Room>, outcome: JoinOutcome },
    /// 이미 있는 방. 참가자는 호출자가 직접 join 해야 한다.
    Existing {
        room: Arc<Room>,
        participant: Participant,
    },
}

pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
    teardown: TeardownPolicy,
    waiting_limit: usize,
}

impl RoomRegistry {
    pub fn new(teardown: TeardownPolicy) -> Self {
        Self {
            rooms: DashMap::new(),
            teardown,
            waiting_limit: DEFAULT_WAITING_LIMIT,
        }
    }

    /// 새로 만드는 방의 대기 큐 한도
    pub fn with_waiting_limit(mut self, waiting_limit: usize) -> Self {
        self.waiting_limit = waiting_limit;
        self
    }

    /// 같은 id로 동시에 들어와도 방은 하나만 생성된다 (entry가 샤드 쓰기 락을 잡음)
    pub fn resolve_or_create(
        &self,
        room_id: &str,
        first: Participant,
    ) -> Result<Resolution, SignalError> {
        match self.rooms.entry(room_id.to_string()) {
            Entry::Occupied(entry) => Ok(Resolution::Existing {
                room: entry.get().clone(),
                participant: first,
            }),
            Entry::Vacant(entry) => {
                let room = Arc::new(Room::with_waiting_limit(room_id, self.waiting_limit));
                let outcome = room.join(first)?;
                entry.insert(room.clone());
                tracing::info!(room_id = %room_id, "Room created");
                Ok(Resolution::Created { room, outcome })
            }
        }
    }

    /// resolve_or_create + join. 조회와 join 사이에 방이 제거됐으면 다시 시도한다.
    pub fn connect(
        &self,
        room_id: &str,
        participant: Participant,
    ) -> Result<(Arc<Room>, JoinOutcome), SignalError> {
        let mut participant = participant;
        loop {
            match self.resolve_or_create(room_id, participant)? {
                Resolution::Created { room, outcome } => return Ok((room, outcome)),
                Resolution::Existing {
                    room,
                    participant: pending,
                } => match room.join(pending.clone()) {
                    Ok(outcome) => return Ok((room, outcome)),
                    Err(SignalError::RoomClosed { .. }) => {
                        tracing::debug!(room_id = %room_id, "Room closed during join, retrying");
                        participant = pending;
                    }
                    Err(e) => return Err(e),
                },
            }
        }
    }

    pub fn lookup(&self, room_id: &str) -> Result<Arc<Room>, SignalError> {
        self.rooms
            .get(room_id)
            .map(|room| room.clone())
            .ok_or_else(|| SignalError::room_not_found(room_id))
    }

    /// 방 락을 잡기 전에 레지스트리 샤드 락을 풀어둔다
    pub fn leave(&self, room_id: &str, participant_id: &str) -> Result<usize, SignalError> {
        let room = self.lookup(room_id)?;
        let remaining = room.leave(participant_id)?;

        if remaining == 0 && self.teardown == TeardownPolicy::OnEmpty {
            self.remove(room_id);
        }
        Ok(remaining)
    }

    /// 비어 있을 때만 제거. 비었는지 확인과 삭제가 같은 샤드 락 안에서 일어난다.
    pub fn remove(&self, room_id: &str) -> bool {
        let removed = self
            .rooms
            .remove_if(room_id, |_, room| room.close_if_empty())
            .is_some();
        if removed {
            tracing::info!(room_id = %room_id, "Room deleted");
        }
        removed
    }

    pub fn participant_count(&self, room_id: &str) -> Result<usize, SignalError> {
        self.lookup(room_id).map(|room| room.participant_count())
    }

    /// `idle` 이상 비어 있던 방 제거. 제거된 방 수를 반환.
    pub fn sweep_idle(&self, idle: Duration) -> usize {
        let now = Instant::now();
        let mut deleted = 0;

        self.rooms.retain(|room_id, room| {
            if room.close_if_idle(idle, now) {
                tracing::info!(room_id = %room_id, "Cleaned up idle room");
                deleted += 1;
                false
            } else {
                true
            }
        });

        deleted
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
