//! WebRTC 시그널링 핸들러

use super::Session;
use crate::error::SignalError;
use crate::protocol::WireMessage;
use crate::room::Routing;

/// 수신 메시지 처리 (OnMessage)
pub fn handle_signal(session: &Session, wire: WireMessage) -> Result<Routing, SignalError> {
    let message = wire.into_message(session.client_id())?;
    let kind = message.kind();
    let room = session.state().rooms.lookup(session.room_id())?;
    let routing = room.route_message(message)?;

    match routing {
        Routing::Queued { depth } => tracing::debug!(
            from = %session.client_id(),
            room_id = %session.room_id(),
            kind = %kind,
            depth = depth,
            "Queued message until peer joins"
        ),
        Routing::Delivered { recipients } => tracing::debug!(
            from = %session.client_id(),
            room_id = %session.room_id(),
            kind = %kind,
            recipients = recipients,
            "Relayed message"
        ),
    }

    Ok(routing)
}
