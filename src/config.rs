//! 환경 변수 기반 설정 관리

use crate::room::{TeardownPolicy, DEFAULT_WAITING_LIMIT};
use std::env;
use std::time::Duration;

/// 서버 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    /// 비어 있으면 모든 origin 허용
    pub cors_origins: Vec<String>,
    pub room: RoomConfig,
    pub connection: ConnectionConfig,
    pub log_level: String,
}

/// 방 설정
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub teardown: TeardownPolicy,
    pub idle_timeout_ms: u64,
    pub sweep_interval_secs: u64,
    /// 상대가 없는 동안 방에 쌓을 수 있는 메시지 수
    pub waiting_limit: usize,
}

impl RoomConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// 연결 설정
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// 참가자별 송신 큐 크기
    pub outbound_buffer: usize,
}

impl Config {
    /// 실제 적용되는 대기 큐 한도. 두 번째 참가자의 송신 큐에 인사 + 대기 메시지 전부가
    /// 들어가야 하므로 송신 큐 크기 - 1 을 넘지 않는다.
    pub fn effective_waiting_limit(&self) -> usize {
        self.room
            .waiting_limit
            .min(self.connection.outbound_buffer.saturating_sub(1))
    }

    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            port: var("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            cors_origins: var("CORS_ORIGINS")
                .unwrap_or_else(|| "*".to_string())
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty() && *s != "*")
                .map(|s| s.to_string())
                .collect(),
            room: RoomConfig {
                teardown: var("ROOM_TEARDOWN")
                    .and_then(|v| TeardownPolicy::parse(&v))
                    .unwrap_or(TeardownPolicy::OnEmpty),
                idle_timeout_ms: var("ROOM_IDLE_TIMEOUT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300_000),
                sweep_interval_secs: var("ROOM_SWEEP_INTERVAL")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
                waiting_limit: var("ROOM_WAITING_LIMIT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_WAITING_LIMIT),
            },
            connection: ConnectionConfig {
                outbound_buffer: var("OUTBOUND_BUFFER")
                    .and_then(|v| v.parse().ok())
                    .filter(|n: &usize| *n > 0)
                    .unwrap_or(64),
            },
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_vars(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.room.teardown, TeardownPolicy::OnEmpty);
        assert_eq!(config.room.idle_timeout(), Duration::from_secs(300));
        assert_eq!(config.connection.outbound_buffer, 64);
        assert_eq!(config.room.waiting_limit, DEFAULT_WAITING_LIMIT);
        assert_eq!(config.effective_waiting_limit(), DEFAULT_WAITING_LIMIT);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("CORS_ORIGINS", "http://a.test, http://b.test"),
            ("ROOM_TEARDOWN", "idle"),
            ("ROOM_SWEEP_INTERVAL", "0"),
            ("OUTBOUND_BUFFER", "8"),
            ("ROOM_WAITING_LIMIT", "100"),
        ]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.room.teardown, TeardownPolicy::Idle);
        assert_eq!(config.room.sweep_interval(), Duration::from_secs(1));
        assert_eq!(config.connection.outbound_buffer, 8);
        assert_eq!(config.room.waiting_limit, 100);
        // 송신 큐에 인사 한 칸을 남긴다
        assert_eq!(config.effective_waiting_limit(), 7);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("PORT", "not-a-port"),
            ("ROOM_TEARDOWN", "never"),
            ("OUTBOUND_BUFFER", "0"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.room.teardown, TeardownPolicy::OnEmpty);
        assert_eq!(config.connection.outbound_buffer, 64);
    }
}
