//! 설정 관리.
//!
//! 설정은 다음 순서로 병합됩니다 (뒤가 우선):
//! 1. 각 섹션의 기본값 (`Default`)
//! 2. TOML 파일 (선택, 기본 `config/default.toml`)
//! 3. `LIVE__{SECTION}__{KEY}` 환경 변수 (`.env` 포함)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::logging::LogFormat;
use crate::CoreResult;

/// 환경 변수 접두사.
pub const ENV_PREFIX: &str = "LIVE";

/// 기본 설정 파일 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 실시간 전송 계층 설정
    pub transport: TransportConfig,
    /// 재연결 정책
    pub reconnect: ReconnectConfig,
    /// 배치 퍼블리셔 설정
    pub publisher: PublisherConfig,
    /// 채널 버퍼 크기
    pub channels: ChannelConfig,
    /// 합성 데이터 생성기 설정
    pub simulator: SimulatorConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// 데이터 소스 종류.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// 합성 데이터 생성기 (실제 전송 계층이 없을 때)
    #[default]
    Simulated,
    /// STOMP over WebSocket
    Stomp,
}

/// 전송 계층 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// 데이터 소스 종류
    pub mode: TransportMode,
    /// WebSocket URL 템플릿 (`{ip}`는 교차로 RSU IP로 치환)
    pub url_template: String,
    /// 토픽 루트 (`/{root}/{rr}/{id}/{kind}`)
    pub stream_root: String,
    /// Bearer 토큰 (선택)
    pub token: Option<String>,
    /// 연결 수립 타임아웃 (밀리초)
    pub connect_timeout_ms: u64,
    /// WebSocket ping 간격 (초)
    pub ping_interval_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::Simulated,
            url_template: "ws://{ip}:8080/stomp".to_string(),
            stream_root: "live".to_string(),
            token: None,
            connect_timeout_ms: 10_000,
            ping_interval_secs: 30,
        }
    }
}

impl TransportConfig {
    /// 연결 타임아웃을 Duration으로 반환
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// ping 간격을 Duration으로 반환
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// 교차로 IP로 접속 URL 생성.
    pub fn url_for(&self, ip: &str) -> String {
        self.url_template.replace("{ip}", ip)
    }
}

/// 전송 종료 후 재연결 정책.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// 최대 재연결 시도 횟수 (0이면 재연결하지 않음)
    pub max_attempts: u32,
    /// 첫 재시도 대기 (밀리초)
    pub initial_delay_ms: u64,
    /// 대기 상한 (밀리초)
    pub max_delay_ms: u64,
    /// 대기 증가 배율
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

/// 배치 퍼블리셔 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// 스냅샷 발행 주기 (밀리초)
    pub period_ms: u64,
    /// 관리자 생성 시 바로 시작할지 여부
    pub autostart: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            period_ms: 1_000,
            autostart: true,
        }
    }
}

impl PublisherConfig {
    /// 발행 주기를 Duration으로 반환. 0은 1ms로 올림
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms.max(1))
    }
}

/// 채널 버퍼 크기.
///
/// 소비자 채널은 broadcast 채널이므로 느린 소비자는 가장 오래된 항목부터 잃습니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// 원시 이벤트 broadcast 버퍼
    pub event_capacity: usize,
    /// 스냅샷 broadcast 버퍼
    pub snapshot_capacity: usize,
    /// 토픽별 전송 계층 버퍼
    pub transport_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
            snapshot_capacity: 16,
            transport_buffer: 1000,
        }
    }
}

/// 합성 데이터 생성기 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// MAP 생성 주기 (밀리초)
    pub map_period_ms: u64,
    /// SPAT 생성 주기 (밀리초)
    pub spat_period_ms: u64,
    /// BSM 생성 주기 (밀리초)
    pub bsm_period_ms: u64,
    /// 교차로당 가상 차량 수
    pub vehicles_per_intersection: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            map_period_ms: 100,
            spat_period_ms: 100,
            bsm_period_ms: 100,
            vehicles_per_intersection: 10,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: LogFormat,
    /// span 진입/종료 이벤트 출력
    pub span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            span_events: false,
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> CoreResult<Self> {
        Self::load(DEFAULT_CONFIG_PATH)
    }
}
