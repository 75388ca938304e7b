//! tracing을 사용한 로깅 인프라.
//!
//! 스트림 관리자는 교차로 수 x 메시지 종류만큼의 구독 태스크를 동시에 돌리므로
//! 모든 로그는 구조화된 필드(`intersection_id`, `kind`)를 포함합니다.
//! 출력 형식:
//! - **pretty**: 개발용 사람이 읽기 쉬운 형식
//! - **json**: 운영환경/로그 집계용 JSON 형식
//! - **compact**: 로그 크기를 줄이기 위한 간결한 형식

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::LoggingConfig;

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 색상이 포함된 사람이 읽기 쉬운 형식 (개발용)
    #[default]
    Pretty,
    /// 로그 집계용 JSON 형식 (운영용)
    Json,
    /// 간결한 한 줄 형식
    Compact,
}

/// 로깅 초기화 설정. 설정 파일의 `[logging]` 섹션에서 만들어집니다.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 로그 레벨 필터 (예: "info", "live_stream=debug")
    pub level: String,
    pub format: LogFormat,
    /// 구독 span 진입/종료 출력
    pub span_events: bool,
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::default(),
            span_events: false,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// 레벨만 교체 (CLI `--log-level`).
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            format: config.format,
            span_events: config.span_events,
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// 형식별 출력 레이어.
fn fmt_layer(config: &LogConfig) -> BoxedLayer {
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    match config.format {
        LogFormat::Pretty => fmt::layer().pretty().with_span_events(span_events).boxed(),
        // 집계 시스템이 교차로/종류 필드로 검색할 수 있게 현재 span을 함께 기록
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_span_events(span_events)
            .boxed(),
    }
}

/// 주어진 설정으로 로깅 시스템을 초기화합니다.
///
/// `RUST_LOG`가 설정되어 있으면 `config.level`보다 우선합니다.
///
/// # 예제
///
/// ```no_run
/// use live_core::logging::{init_logging, LogConfig, LogFormat};
///
/// let config = LogConfig::new("live_stream=debug,info")
///     .with_format(LogFormat::Json);
/// init_logging(config).unwrap();
/// ```
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    tracing_subscriber::registry()
        .with(fmt_layer(&config))
        .with(env_filter)
        .try_init()?;

    tracing::info!(
        format = ?config.format,
        level = %config.level,
        "Logging initialized"
    );

    Ok(())
}

/// 구독 단위 span을 생성하는 매크로.
///
/// 구독 감시 태스크 전체를 이 span으로 감싸 교차로/종류별 로그를 묶습니다.
#[macro_export]
macro_rules! subscription_span {
    ($name:expr, $intersection_id:expr, $kind:expr, $topic:expr) => {
        tracing::info_span!(
            $name,
            intersection_id = %$intersection_id,
            kind = %$kind,
            topic = %$topic
        )
    };
}
