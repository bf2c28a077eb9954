//! AirSignals 시그널링 릴레이 서버

mod config;
mod error;
mod handlers;
mod protocol;
mod room;
mod state;

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::{HeaderValue, Method, StatusCode},
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use config::Config;
use error::SignalError;
use futures::{SinkExt, StreamExt};
use protocol::{Notice, RoomStatus, ServerMessage, WireMessage};
use state::AppState;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = Arc::new(AppState::new(config.clone()));

    // 유휴 방 정리 스케줄러
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_state.config.room.sweep_interval());
        loop {
            interval.tick().await;
            handlers::cleanup_idle_rooms(&cleanup_state);
        }
    });

    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("AirSignals relay started");
    tracing::info!("Address: {}", addr);
    tracing::info!("WebSocket: ws://{}/ws/:room_id/:client_id", addr);
    tracing::info!(teardown = ?config.room.teardown, "Room teardown policy");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("AirSignals relay stopped");
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/ws/:room_id/:client_id", get(ws_handler))
        .route("/rooms/:room_id/clients", get(room_clients_handler))
        .route("/getConnectedClients/:room_id", get(room_clients_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// CORS 설정. origin 목록이 비어 있으면 모두 허용.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any);

    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::warn!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::warn!("Received terminate signal, shutting down"),
    }
}

async fn index_handler() -> Html<&'static str> {
    Html("<h1>AirSignals Signaling Relay</h1><p>WebSocket endpoint: /ws/:room_id/:client_id</p>")
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "airsignals-rs",
        "rooms": state.rooms.len(),
        "timestamp": std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }))
}

/// 방 인원 조회
async fn room_clients_handler(
    Path(room_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<RoomStatus>) {
    match handlers::room_participant_count(&state, &room_id) {
        Ok(count) => (StatusCode::OK, Json(RoomStatus::found(count))),
        Err(_) => (StatusCode::NOT_FOUND, Json(RoomStatus::missing())),
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path((room_id, client_id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, room_id, client_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, room_id: String, client_id: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.config.connection.outbound_buffer);

    // 송신 태스크
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to encode outbound message"),
            }
        }
        let _ = ws_sender.close().await;
    });

    tracing::debug!(client_id = %client_id, room_id = %room_id, "Connection established");

    // 방 참여
    let session = match handlers::handle_connect(state.clone(), &room_id, &client_id, tx.clone()) {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(client_id = %client_id, room_id = %room_id, error = %e, "Join rejected");
            notify_error(&tx, &e);
            // 알림을 내보낸 뒤 송신 태스크가 연결을 닫는다
            drop(tx);
            let _ = send_task.await;
            return;
        }
    };

    // 수신 처리
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let routed = serde_json::from_str::<WireMessage>(&text)
                    .map_err(|e| SignalError::InvalidMessage(e.to_string()))
                    .and_then(|wire| handlers::handle_signal(&session, wire));
                if let Err(e) = routed {
                    tracing::debug!(client_id = %client_id, room_id = %room_id, error = %e, "Message not relayed");
                    notify_error(&tx, &e);
                }
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    // 연결 해제
    session.close();
    tracing::info!(client_id = %client_id, room_id = %room_id, "Connection closed");
    send_task.abort();
}

/// 요청한 클라이언트에게 에러 알림
fn notify_error(sender: &mpsc::Sender<ServerMessage>, err: &SignalError) {
    if sender
        .try_send(ServerMessage::Notice(Notice::from_error(err)))
        .is_err()
    {
        tracing::debug!(error = %err, "Dropped error notice, outbound queue unavailable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio_tungstenite::{
        connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
    };
    use tower::ServiceExt;

    type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn spawn_server() -> (String, Arc<AppState>) {
        let state = Arc::new(AppState::new(Config::default()));
        let app = build_router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("ws://{}", addr), state)
    }

    async fn connect(base: &str, room_id: &str, client_id: &str) -> WsStream {
        let (ws, _) = connect_async(format!("{}/ws/{}/{}", base, room_id, client_id))
            .await
            .unwrap();
        ws
    }

    async fn next_json(ws: &mut WsStream) -> Value {
        loop {
            let msg = tokio::time::timeout(TIMEOUT, ws.next())
                .await
                .expect("timeout waiting for message")
                .expect("stream closed")
                .expect("ws error");
            if let WsMessage::Text(text) = msg {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    async fn send_json(ws: &mut WsStream, value: Value) {
        ws.send(WsMessage::Text(value.to_string())).await.unwrap();
    }

    #[tokio::test]
    async fn test_health() {
        let state = Arc::new(AppState::new(Config::default()));
        let (status, body) = get_json(build_router(state), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["rooms"], 0);
    }

    #[tokio::test]
    async fn test_room_clients_status() {
        let state = Arc::new(AppState::new(Config::default()));

        let (status, body) = get_json(build_router(state.clone()), "/rooms/555/clients").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"type": "message", "body": "Chat Room does not exist"}));

        let (tx, _rx) = mpsc::channel(8);
        let _session = handlers::handle_connect(state.clone(), "555", "a", tx).unwrap();

        let (status, body) = get_json(build_router(state.clone()), "/getConnectedClients/555").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"type": "message", "numClients": 1, "body": ""}));
    }

    #[tokio::test]
    async fn test_relay_end_to_end() {
        let (base, state) = spawn_server().await;

        let mut alice = connect(&base, "555", "alice").await;
        let greeting = next_json(&mut alice).await;
        assert_eq!(greeting["type"], "polite");
        assert_eq!(greeting["polite"], false);

        // bob이 오기 전의 offer는 대기 큐로
        send_json(
            &mut alice,
            json!({"MessageType": "offer", "Body": "sdp-alice", "SenderID": "alice"}),
        )
        .await;

        let mut bob = connect(&base, "555", "bob").await;
        let greeting = next_json(&mut bob).await;
        assert_eq!(greeting["polite"], true);

        let offer = next_json(&mut bob).await;
        assert_eq!(
            offer,
            json!({"MessageType": "offer", "Body": "sdp-alice", "SenderID": "alice"})
        );

        // 두 번째 offer는 거부
        send_json(&mut bob, json!({"MessageType": "offer", "Body": "sdp-bob"})).await;
        let rejected = next_json(&mut bob).await;
        assert_eq!(rejected["type"], "error");
        assert_eq!(rejected["code"], "OFFER_REJECTED");

        send_json(&mut bob, json!({"MessageType": "answer", "Body": "answer-bob"})).await;
        let answer = next_json(&mut alice).await;
        assert_eq!(answer["MessageType"], "answer");
        assert_eq!(answer["SenderID"], "bob");

        // 세 번째 참가자는 거절
        let mut carol = connect(&base, "555", "carol").await;
        let full = next_json(&mut carol).await;
        assert_eq!(full["code"], "ROOM_FULL");

        alice.close(None).await.unwrap();
        let deadline = tokio::time::Instant::now() + TIMEOUT;
        while state.rooms.participant_count("555").unwrap() != 1 {
            assert!(tokio::time::Instant::now() < deadline, "alice never left");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_invalid_message_gets_error_notice() {
        let (base, _state) = spawn_server().await;

        let mut alice = connect(&base, "777", "alice").await;
        next_json(&mut alice).await;

        alice.send(WsMessage::Text("not json".to_string())).await.unwrap();
        let notice = next_json(&mut alice).await;
        assert_eq!(notice["code"], "INVALID_MESSAGE");
    }
}
