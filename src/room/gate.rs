//! Offer 게이트: 방 하나에 응답 대기 중인 offer는 최대 하나

use super::MessageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationGate {
    accepting_offers: bool,
}

impl Default for NegotiationGate {
    fn default() -> Self {
        Self {
            accepting_offers: true,
        }
    }
}

impl NegotiationGate {
    pub fn is_accepting_offers(&self) -> bool {
        self.accepting_offers
    }

    /// 라우팅 전에 호출. offer가 아니면 항상 통과한다.
    pub fn admits(&self, kind: MessageKind) -> bool {
        kind != MessageKind::Offer || self.accepting_offers
    }

    /// 라우팅 후에 호출. offer가 라우팅(또는 큐잉)되면 게이트를 닫는다.
    pub fn record(&mut self, kind: MessageKind) {
        if kind == MessageKind::Offer {
            self.accepting_offers = false;
        }
    }

    /// 인원이 2명 미만으로 떨어지면 새 협상 사이클 시작
    pub fn reset(&mut self) {
        self.accepting_offers = true;
    }
}
