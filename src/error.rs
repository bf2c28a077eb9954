//! 시그널링 에러 타입

use thiserror::Error;

/// 방/참가자 연산 에러
#[derive(Debug, Error)]
pub enum SignalError {
    /// 이미 두 명이 참여 중인 방에 join 시도
    #[error("room {room_id} is full")]
    RoomFull { room_id: String },

    /// 응답되지 않은 offer가 있는 상태에서 새 offer
    #[error("offer rejected in room {room_id}: a negotiation is already in flight")]
    OfferRejected { room_id: String },

    /// 상대가 없는 동안 쌓인 대기 메시지가 한도에 도달
    #[error("waiting queue of room {room_id} is full ({limit} messages)")]
    QueueFull { room_id: String, limit: usize },

    /// 존재하지 않는 방 또는 참가자
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// 특정 참가자에게 전송 실패
    #[error("delivery to {participant_id} failed: {source}")]
    DeliveryFailed {
        participant_id: String,
        #[source]
        source: DeliveryError,
    },

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// 레지스트리에서 제거된 방 (호출자가 새 방으로 재시도)
    #[error("room {room_id} is closed")]
    RoomClosed { room_id: String },
}

impl SignalError {
    pub fn room_not_found(room_id: &str) -> Self {
        Self::NotFound {
            what: "room",
            id: room_id.to_string(),
        }
    }

    pub fn participant_not_found(participant_id: &str) -> Self {
        Self::NotFound {
            what: "participant",
            id: participant_id.to_string(),
        }
    }

    /// 클라이언트에게 내려보내는 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoomFull { .. } => "ROOM_FULL",
            Self::OfferRejected { .. } => "OFFER_REJECTED",
            Self::QueueFull { .. } => "QUEUE_FULL",
            Self::NotFound { .. } | Self::RoomClosed { .. } => "NOT_FOUND",
            Self::DeliveryFailed { .. } => "DELIVERY_FAILED",
            Self::InvalidMessage(_) => "INVALID_MESSAGE",
        }
    }
}

/// 참가자 송신 큐 에러
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// 송신 큐가 가득 참 (느린 피어)
    #[error("outbound queue is full")]
    Backpressure,

    /// 연결이 이미 닫힘
    #[error("connection closed")]
    Disconnected,
}
