//! 데이터 프로바이더 추상화.
//!
//! 파이프라인은 구체적인 프로바이더가 아니라 이 모듈의 trait에만 의존합니다.
//! 어댑터는 실패를 [`ProviderErrorKind`]로 분류해서 돌려주고, 재시도 정책은
//! 이 분류만 보고 결정합니다.

pub mod alpha_vantage;
pub mod yahoo;

pub use alpha_vantage::{AlphaVantageProvider, StatementPeriod};
pub use yahoo::YahooProvider;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use marketlake_core::{Attribute, RawDataset, Symbol, WideFrame};

/// 프로바이더 실패 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    /// 호출 한도 초과 (대기 후 재시도 가능)
    RateLimited,
    /// 심볼/데이터 없음, 상장폐지 등
    NotFound,
    /// 응답 형식 오류
    Malformed,
    /// 네트워크/연결 오류
    Network,
    /// 인증 실패
    Unauthorized,
    /// 지원하지 않는 속성
    Unsupported,
    /// 운영자 중단
    Cancelled,
    /// 기타
    Other,
}

impl ProviderErrorKind {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RateLimited => "rate_limited",
            Self::NotFound => "not_found",
            Self::Malformed => "malformed",
            Self::Network => "network",
            Self::Unauthorized => "unauthorized",
            Self::Unsupported => "unsupported",
            Self::Cancelled => "cancelled",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// 분류된 프로바이더 오류.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::NotFound, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Malformed, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ProviderErrorKind::Cancelled, "interrupted by operator")
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind.is_rate_limited()
    }
}

/// 오류 메시지에 rate limit 신호가 있는지 확인합니다.
///
/// 구조화된 상태 코드를 주지 않는 클라이언트 라이브러리의 오류를 분류할 때만
/// 어댑터 내부에서 사용합니다.
pub(crate) fn mentions_rate_limit(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("call frequency")
}

/// OHLCV 조회 요청.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// 프로바이더 간격 문자열 (예: "1d", "1h", "1wk")
    pub interval: String,
}

impl BarRequest {
    pub fn daily(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            interval: "1d".to_string(),
        }
    }
}

/// 배치 단위 OHLCV 프로바이더.
///
/// 응답은 `(field, symbol)` 컬럼의 [`RawDataset::Wide`]입니다.
#[async_trait]
pub trait BarProvider: Send + Sync {
    /// 프로바이더 이름.
    fn name(&self) -> &str;

    /// 심볼 하나의 OHLCV. 데이터가 없으면 빈 프레임 또는 `NotFound`.
    async fn fetch_symbol_bars(
        &self,
        symbol: &Symbol,
        request: &BarRequest,
    ) -> Result<WideFrame, ProviderError>;

    /// 배치의 모든 심볼을 순서대로 조회해서 하나의 wide 프레임으로 합칩니다.
    ///
    /// 데이터가 없는 심볼(빈 프레임, `NotFound`)만 건너뜁니다. 그 밖의 오류는
    /// 한 심볼이라도 배치 전체를 같은 분류로 실패시키므로, 배치는 항상 하나의
    /// 단위로 적재되거나 다시 시도됩니다.
    async fn fetch_bars(
        &self,
        symbols: &[Symbol],
        request: &BarRequest,
    ) -> Result<RawDataset, ProviderError> {
        let mut frames = Vec::with_capacity(symbols.len());

        for symbol in symbols {
            match self.fetch_symbol_bars(symbol, request).await {
                Ok(frame) if frame.is_empty() => {
                    debug!(symbol = %symbol, "데이터 없음, 건너뜀");
                }
                Ok(frame) => frames.push(frame),
                Err(e) if e.kind == ProviderErrorKind::NotFound => {
                    debug!(symbol = %symbol, error = %e, "데이터 없음, 건너뜀");
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "심볼 조회 실패, 배치 전체 실패");
                    return Err(e);
                }
            }
        }

        Ok(RawDataset::Wide(WideFrame::combine(frames)))
    }
}

/// 심볼 × 속성 단위 참조 데이터 프로바이더.
#[async_trait]
pub trait AttributeProvider: Send + Sync {
    /// 프로바이더 이름.
    fn name(&self) -> &str;

    /// 속성 지원 여부.
    fn supports(&self, attribute: Attribute) -> bool;

    async fn fetch_attribute(
        &self,
        symbol: &Symbol,
        attribute: Attribute,
    ) -> Result<RawDataset, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mentions_rate_limit() {
        assert!(mentions_rate_limit("HTTP 429 Too Many Requests"));
        assert!(mentions_rate_limit("API Rate Limit exceeded"));
        assert!(mentions_rate_limit(
            "Our standard API call frequency is 5 calls per minute"
        ));
        assert!(!mentions_rate_limit("No data found, symbol may be delisted"));
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::rate_limited("slow down");
        assert!(err.is_rate_limited());
        assert_eq!(err.to_string(), "rate_limited: slow down");
    }

    /// 심볼별로 정해 둔 결과를 돌려주는 프로바이더.
    struct ScriptedBars(Vec<(&'static str, std::result::Result<bool, ProviderErrorKind>)>);

    #[async_trait]
    impl BarProvider for ScriptedBars {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch_symbol_bars(
            &self,
            symbol: &Symbol,
            _request: &BarRequest,
        ) -> std::result::Result<WideFrame, ProviderError> {
            let day = NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            let (_, outcome) = self
                .0
                .iter()
                .find(|(s, _)| *s == symbol.as_str())
                .unwrap();
            match outcome {
                Ok(true) => {
                    let mut frame = WideFrame::new(vec![day]);
                    frame
                        .push_column(
                            marketlake_core::ColumnKey::new("close", symbol.clone()),
                            vec![Some(1.0)],
                        )
                        .unwrap();
                    Ok(frame)
                }
                Ok(false) => Ok(WideFrame::new(vec![])),
                Err(kind) => Err(ProviderError::new(*kind, "scripted")),
            }
        }
    }

    fn request() -> BarRequest {
        BarRequest::daily(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_fetch_bars_skips_symbols_without_data() {
        let provider = ScriptedBars(vec![
            ("AAA", Ok(true)),
            ("GONE", Err(ProviderErrorKind::NotFound)),
            ("THIN", Ok(false)),
        ]);
        let batch = vec![Symbol::from("AAA"), Symbol::from("GONE"), Symbol::from("THIN")];

        match provider.fetch_bars(&batch, &request()).await.unwrap() {
            RawDataset::Wide(frame) => assert_eq!(frame.entities(), vec![Symbol::from("AAA")]),
            other => panic!("unexpected shape: {:?}", other.kind()),
        }
    }

    #[tokio::test]
    async fn test_fetch_bars_fails_batch_on_symbol_error() {
        for kind in [
            ProviderErrorKind::Network,
            ProviderErrorKind::Unauthorized,
            ProviderErrorKind::Malformed,
            ProviderErrorKind::Other,
            ProviderErrorKind::RateLimited,
        ] {
            let provider = ScriptedBars(vec![("AAA", Ok(true)), ("BBB", Err(kind))]);
            let batch = vec![Symbol::from("AAA"), Symbol::from("BBB")];

            let err = provider.fetch_bars(&batch, &request()).await.unwrap_err();
            assert_eq!(err.kind, kind);
        }
    }
}
