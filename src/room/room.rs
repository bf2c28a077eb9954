//! 2인 방 상태 머신
//!
//! Empty(0) → Waiting(1) → Paired(2). 모든 연산은 방 단위 락 안에서 선형화되며,
//! 락을 잡은 채로 await하거나 레지스트리에 접근하지 않는다.

use super::{Message, NegotiationGate, Participant, Role};
use crate::error::SignalError;
use crate::protocol::Notice;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// 방 최대 인원
pub const ROOM_CAPACITY: usize = 2;

/// 대기 큐 기본 한도
pub const DEFAULT_WAITING_LIMIT: usize = 32;

/// join 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    pub role: Role,
    pub participant_count: usize,
    /// 이번 join으로 실제 전달된 대기 메시지 수
    pub flushed: usize,
}

/// route_message 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// 상대가 없어 대기 큐에 들어감
    Queued { depth: usize },
    Delivered { recipients: usize },
}

pub struct Room {
    id: String,
    /// 대기 큐 최대 길이. 참가자 송신 큐보다 작아야 flush가 한 번에 들어간다.
    waiting_limit: usize,
    state: Mutex<RoomState>,
}

struct RoomState {
    /// 참가 순서 유지
    participants: Vec<Participant>,
    waiting: VecDeque<Message>,
    gate: NegotiationGate,
    /// 레지스트리에서 제거됨. 이후 join은 RoomClosed.
    closed: bool,
    empty_since: Option<Instant>,
}

impl Room {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_waiting_limit(id, DEFAULT_WAITING_LIMIT)
    }

    pub fn with_waiting_limit(id: impl Into<String>, waiting_limit: usize) -> Self {
        Self {
            id: id.into(),
            waiting_limit,
            state: Mutex::new(RoomState {
                participants: Vec::with_capacity(ROOM_CAPACITY),
                waiting: VecDeque::new(),
                gate: NegotiationGate::default(),
                closed: false,
                empty_since: Some(Instant::now()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn join(&self, participant: Participant) -> Result<JoinOutcome, SignalError> {
        let mut state = self.state.lock();

        if state.closed {
            return Err(SignalError::RoomClosed {
                room_id: self.id.clone(),
            });
        }
        if state.participants.len() >= ROOM_CAPACITY {
            tracing::warn!(
                room_id = %self.id,
                client_id = %participant.id(),
                "Room full, rejected join"
            );
            return Err(SignalError::RoomFull {
                room_id: self.id.clone(),
            });
        }

        let role = Role::for_position(state.participants.len());
        if let Err(e) = participant.greet(&self.id, role) {
            tracing::warn!(
                room_id = %self.id,
                client_id = %participant.id(),
                error = %e,
                "Failed to send greeting"
            );
        }
        state.participants.push(participant);
        state.empty_since = None;

        // 두 번째 참가자가 들어오면 대기 메시지를 원래 순서대로 라우팅
        let mut flushed = 0;
        if state.participants.len() == ROOM_CAPACITY {
            while let Some(message) = state.waiting.pop_front() {
                match state.deliver_to_peers(&self.id, &message) {
                    Ok(0) => {}
                    Ok(_) => flushed += 1,
                    Err(e) => state.notify_sender(&message, &e),
                }
            }
        }

        Ok(JoinOutcome {
            role,
            participant_count: state.participants.len(),
            flushed,
        })
    }

    /// 남은 인원 수를 반환. 없는 참가자면 NotFound (상태 변화 없음).
    pub fn leave(&self, participant_id: &str) -> Result<usize, SignalError> {
        let mut state = self.state.lock();

        let before = state.participants.len();
        state.participants.retain(|p| p.id() != participant_id);
        let remaining = state.participants.len();
        if remaining == before {
            return Err(SignalError::participant_not_found(participant_id));
        }

        // 대기 큐는 flush하지 않는다. 받을 사람이 없다.
        if remaining < ROOM_CAPACITY {
            state.gate.reset();
        }
        if remaining == 0 {
            state.empty_since = Some(Instant::now());
        }

        Ok(remaining)
    }

    pub fn route_message(&self, message: Message) -> Result<Routing, SignalError> {
        let mut state = self.state.lock();

        if state.closed {
            return Err(SignalError::RoomClosed {
                room_id: self.id.clone(),
            });
        }

        let kind = message.kind();
        if !state.gate.admits(kind) {
            tracing::debug!(
                room_id = %self.id,
                from = %message.sender_id(),
                "Offer rejected, negotiation already in flight"
            );
            return Err(SignalError::OfferRejected {
                room_id: self.id.clone(),
            });
        }

        if state.participants.len() < ROOM_CAPACITY {
            if state.waiting.len() >= self.waiting_limit {
                tracing::debug!(
                    room_id = %self.id,
                    from = %message.sender_id(),
                    limit = self.waiting_limit,
                    "Waiting queue full, message dropped"
                );
                return Err(SignalError::QueueFull {
                    room_id: self.id.clone(),
                    limit: self.waiting_limit,
                });
            }
            state.waiting.push_back(message);
            state.gate.record(kind);
            return Ok(Routing::Queued {
                depth: state.waiting.len(),
            });
        }

        let delivered = state.deliver_to_peers(&self.id, &message);
        // 전송 실패가 있어도 게이트 변경은 되돌리지 않는다
        state.gate.record(kind);
        delivered.map(|recipients| Routing::Delivered { recipients })
    }

    pub fn participant_count(&self) -> usize {
        self.state.lock().participants.len()
    }

    #[cfg(test)]
    pub fn is_accepting_offers(&self) -> bool {
        self.state.lock().gate.is_accepting_offers()
    }

    #[cfg(test)]
    pub fn waiting_len(&self) -> usize {
        self.state.lock().waiting.len()
    }

    /// 비어 있으면 닫고 true. 레지스트리 락 안에서만 호출된다.
    pub(crate) fn close_if_empty(&self) -> bool {
        let mut state = self.state.lock();
        if state.participants.is_empty() {
            state.closed = true;
        }
        state.closed
    }

    /// `idle` 이상 비어 있었으면 닫고 true
    pub(crate) fn close_if_idle(&self, idle: Duration, now: Instant) -> bool {
        let mut state = self.state.lock();
        let expired = state
            .empty_since
            .map(|since| now.saturating_duration_since(since) >= idle)
            .unwrap_or(false);
        if expired && state.participants.is_empty() {
            state.closed = true;
        }
        state.closed
    }
}

impl RoomState {
    /// flush 중 전달 실패를 원래 발신자에게 알린다 (아직 방에 있을 때만)
    fn notify_sender(&self, message: &Message, err: &SignalError) {
        let Some(sender) = self
            .participants
            .iter()
            .find(|p| p.id() == message.sender_id())
        else {
            return;
        };
        if let Err(e) = sender.notify(Notice::from_error(err)) {
            tracing::debug!(to = %sender.id(), error = %e, "Dropped delivery failure notice");
        }
    }

    /// 발신자를 제외한 모든 참가자에게 전송. 한 명이 실패해도 나머지는 계속 시도하고,
    /// 첫 번째 실패를 반환한다.
    fn deliver_to_peers(&self, room_id: &str, message: &Message) -> Result<usize, SignalError> {
        let mut recipients = 0;
        let mut failure = None;

        for peer in self
            .participants
            .iter()
            .filter(|p| p.id() != message.sender_id())
        {
            match peer.deliver(message) {
                Ok(()) => recipients += 1,
                Err(e) => {
                    tracing::warn!(
                        room_id = %room_id,
                        to = %peer.id(),
                        kind = %message.kind(),
                        error = %e,
                        "Failed to deliver message"
                    );
                    failure.get_or_insert(SignalError::DeliveryFailed {
                        participant_id: peer.id().to_string(),
                        source: e,
                    });
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(recipients),
        }
    }
}
