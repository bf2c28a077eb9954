//! 애플리케이션 상태 관리

use crate::config::Config;
use crate::room::RoomRegistry;
use std::sync::Arc;

/// 전역 애플리케이션 상태
pub struct AppState {
    /// 방 레지스트리 (room_id -> Room)
    pub rooms: RoomRegistry,
    /// 설정
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            rooms: RoomRegistry::new(config.room.teardown)
                .with_waiting_limit(config.effective_waiting_limit()),
            config: Arc::new(config),
        }
    }
}
