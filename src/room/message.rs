//! 협상 메시지 값 타입

use crate::error::SignalError;
use serde::{Deserialize, Serialize};

/// 메시지 종류. 릴레이는 offer 게이팅 외에는 종류를 해석하지 않는다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Offer,
    Answer,
    Candidate,
    #[serde(rename = "message")]
    PlainText,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Candidate => "candidate",
            Self::PlainText => "message",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 불변 시그널링 메시지
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageKind,
    body: String,
    sender_id: String,
}

impl Message {
    /// 발신자가 비어 있으면 거부
    pub fn new(
        kind: MessageKind,
        body: impl Into<String>,
        sender_id: impl Into<String>,
    ) -> Result<Self, SignalError> {
        let sender_id = sender_id.into();
        if sender_id.is_empty() {
            return Err(SignalError::InvalidMessage(
                "sender id must not be empty".to_string(),
            ));
        }
        Ok(Self {
            kind,
            body: body.into(),
            sender_id,
        })
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }
}
