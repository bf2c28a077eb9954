//! 방 참가자와 송신 핸들

use crate::error::{DeliveryError, SignalError};
use crate::protocol::{Notice, ServerMessage, WireMessage};
use crate::room::Message;
use tokio::sync::mpsc::{error::TrySendError, Sender};

/// Perfect negotiation 역할. 참가 시점의 순서로만 결정된다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// 빈 방에 먼저 들어온 쪽
    Impolite,
    /// 상대가 이미 있는 방에 들어온 쪽
    Polite,
}

impl Role {
    /// `position`: 참가 직전의 인원 수
    pub fn for_position(position: usize) -> Self {
        if position == 0 {
            Self::Impolite
        } else {
            Self::Polite
        }
    }

    pub fn is_polite(&self) -> bool {
        matches!(self, Self::Polite)
    }
}

/// 클라이언트 ID + 해당 연결의 송신 큐
#[derive(Debug, Clone)]
pub struct Participant {
    id: String,
    sender: Sender<ServerMessage>,
}

impl Participant {
    pub fn new(id: impl Into<String>, sender: Sender<ServerMessage>) -> Result<Self, SignalError> {
        let id = id.into();
        if id.is_empty() {
            return Err(SignalError::InvalidMessage(
                "participant id must not be empty".to_string(),
            ));
        }
        Ok(Self { id, sender })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 메시지를 송신 큐에 넘긴다. 네트워크 쓰기는 연결의 송신 태스크가 담당하므로
    /// 호출자는 절대 블로킹되지 않는다.
    pub fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        self.push(ServerMessage::Signal(WireMessage::from(message)))
    }

    /// 참가 인사 + 역할 통지
    pub fn greet(&self, room_id: &str, role: Role) -> Result<(), DeliveryError> {
        self.push(ServerMessage::Notice(Notice::greeting(
            &self.id, room_id, role,
        )))
    }

    /// 서버 알림 (에러 등)
    pub fn notify(&self, notice: Notice) -> Result<(), DeliveryError> {
        self.push(ServerMessage::Notice(notice))
    }

    fn push(&self, message: ServerMessage) -> Result<(), DeliveryError> {
        self.sender.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Backpressure,
            TrySendError::Closed(_) => DeliveryError::Disconnected,
        })
    }
}
