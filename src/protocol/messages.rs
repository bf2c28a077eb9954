//! 클라이언트-서버 메시지 프로토콜 정의

use crate::error::SignalError;
use crate::room::{Message, MessageKind, Role};
use serde::{Deserialize, Serialize};

/// 시그널링 메시지 (양방향 동일 형식)
///
/// `{"MessageType":"offer","Body":"...","SenderID":"..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "MessageType", alias = "type")]
    pub message_type: MessageKind,
    #[serde(rename = "Body", alias = "body", default)]
    pub body: String,
    #[serde(rename = "SenderID", alias = "senderId", default)]
    pub sender_id: String,
}

impl WireMessage {
    /// 발신자는 항상 연결의 client id로 덮어쓴다
    pub fn into_message(self, client_id: &str) -> Result<Message, SignalError> {
        if !self.sender_id.is_empty() && self.sender_id != client_id {
            tracing::debug!(
                claimed = %self.sender_id,
                client_id = %client_id,
                "Ignoring claimed sender id"
            );
        }
        Message::new(self.message_type, self.body, client_id)
    }
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            message_type: message.kind(),
            body: message.body().to_string(),
            sender_id: message.sender_id().to_string(),
        }
    }
}

/// 서버 알림
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Notice {
    /// 참가 인사 + negotiation 역할
    Polite { body: String, polite: bool },
    Error { code: String, body: String },
}

impl Notice {
    pub fn greeting(client_id: &str, room_id: &str, role: Role) -> Self {
        Self::Polite {
            body: format!(
                "Hi {}! You connected to the server at chatID: {}",
                client_id, room_id
            ),
            polite: role.is_polite(),
        }
    }

    pub fn from_error(err: &SignalError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            body: err.to_string(),
        }
    }
}

/// 서버 → 클라이언트 메시지
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Signal(WireMessage),
    Notice(Notice),
}

/// 방 인원 조회 응답
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStatus {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "numClients", skip_serializing_if = "Option::is_none")]
    pub num_clients: Option<usize>,
    pub body: String,
}

impl RoomStatus {
    pub fn found(num_clients: usize) -> Self {
        Self {
            kind: "message".to_string(),
            num_clients: Some(num_clients),
            body: String::new(),
        }
    }

    pub fn missing() -> Self {
        Self {
            kind: "message".to_string(),
            num_clients: None,
            body: "Chat Room does not exist".to_string(),
        }
    }
}
