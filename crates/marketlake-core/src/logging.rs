//! 수집기 로깅 초기화.
//!
//! 배치, 심볼, 속성 단위로 구조화된 이벤트를 남깁니다. 출력 형식은
//! `pretty`(개발), `json`(로그 수집기), `compact`(cron 배치 로그) 중 하나입니다.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 로그 레벨 필터 (예: "info", "marketlake_data=debug")
    pub level: String,
    pub format: LogFormat,
    /// 배치/심볼 span의 시작과 종료도 기록
    pub span_events: bool,
}

impl LogConfig {
    /// `RUST_LOG`, `LOG_FORMAT`, `LOG_SPAN_EVENTS`에서 설정을 읽습니다.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            format: lookup("LOG_FORMAT")
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            span_events: lookup("LOG_SPAN_EVENTS")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }
}

/// 로깅 시스템을 초기화합니다. `RUST_LOG`가 있으면 `config.level`보다 우선합니다.
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = match config.format {
        LogFormat::Pretty => fmt::layer().pretty().with_span_events(span_events).boxed(),
        LogFormat::Json => fmt::layer().json().with_span_events(span_events).boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_span_events(span_events)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()?;

    tracing::debug!(format = ?config.format, level = %config.level, "로깅 초기화");
    Ok(())
}

/// 수집 경로와 배치 번호가 붙은 span.
#[macro_export]
macro_rules! work_span {
    ($name:expr, $workflow:expr, $batch:expr) => {
        tracing::info_span!($name, workflow = %$workflow, batch = $batch)
    };
}
