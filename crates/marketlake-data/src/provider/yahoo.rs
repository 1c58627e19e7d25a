//! Yahoo Finance 프로바이더.
//!
//! 주식/암호화폐 OHLCV 배치 조회와 배당/분할 이력 조회를 제공합니다.
//! `yahoo_finance_api`는 상태 코드를 구조화해서 주지 않으므로 오류는 여기서
//! 한 번 분류하고, 이후 단계는 [`ProviderErrorKind`]만 봅니다.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use time::OffsetDateTime;
use tracing::debug;
use yahoo_finance_api::{YahooConnector, YahooError};

use super::{
    mentions_rate_limit, AttributeProvider, BarProvider, BarRequest, ProviderError,
    ProviderErrorKind,
};
use crate::error::{DataError, Result};
use marketlake_core::{Attribute, ColumnKey, RawDataset, Symbol, Value, WideFrame};

/// wide 프레임에 기록하는 OHLCV 필드 순서.
pub const BAR_FIELDS: [&str; 6] = ["open", "high", "low", "close", "adj_close", "volume"];

/// Yahoo Finance 프로바이더.
pub struct YahooProvider {
    connector: YahooConnector,
    history_start: NaiveDate,
    history_end: Option<NaiveDate>,
}

impl YahooProvider {
    pub fn new() -> Result<Self> {
        let connector = YahooConnector::new()
            .map_err(|e| DataError::ConnectionError(format!("Yahoo Finance 연결 실패: {}", e)))?;
        let history_start = NaiveDate::from_ymd_opt(1970, 1, 1)
            .ok_or_else(|| DataError::InvalidData("invalid history start".to_string()))?;

        Ok(Self {
            connector,
            history_start,
            history_end: None,
        })
    }

    /// 배당/분할 이력 조회 범위를 설정합니다. `end`가 없으면 오늘까지.
    pub fn with_history_range(mut self, start: NaiveDate, end: Option<NaiveDate>) -> Self {
        self.history_start = start;
        self.history_end = end;
        self
    }

    async fn fetch_events(
        &self,
        symbol: &Symbol,
        attribute: Attribute,
    ) -> std::result::Result<RawDataset, ProviderError> {
        let start = to_offset_datetime(self.history_start)?;
        let end_date = self.history_end.unwrap_or_else(|| Utc::now().date_naive());
        let end = to_offset_datetime(end_date)?;

        debug!(symbol = %symbol, attribute = %attribute, "Yahoo Finance 이벤트 이력 호출");

        let response = self
            .connector
            .get_quote_history_interval(symbol.as_str(), start, end, "1d")
            .await
            .map_err(|e| classify_error(symbol, &e))?;

        let mut points: Vec<(i64, f64)> = match attribute {
            Attribute::Dividends => response
                .dividends()
                .map_err(|e| classify_error(symbol, &e))?
                .iter()
                .map(|d| (d.date as i64, d.amount as f64))
                .collect(),
            Attribute::Splits => response
                .splits()
                .map_err(|e| classify_error(symbol, &e))?
                .iter()
                .filter(|s| s.denominator as f64 != 0.0)
                .map(|s| (s.date as i64, s.numerator as f64 / s.denominator as f64))
                .collect(),
            other => {
                return Err(ProviderError::new(
                    ProviderErrorKind::Unsupported,
                    format!("Yahoo Finance does not provide {}", other),
                ))
            }
        };
        points.sort_by_key(|(date, _)| *date);

        let mut index = Vec::with_capacity(points.len());
        let mut values = Vec::with_capacity(points.len());
        for (date, value) in points {
            if let Some(ts) = DateTime::from_timestamp(date, 0) {
                index.push(Value::Timestamp(ts.naive_utc()));
                values.push(Value::from(value));
            }
        }

        Ok(RawDataset::Series {
            name: attribute.value_column().to_string(),
            index,
            values,
        })
    }
}

#[async_trait]
impl BarProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn fetch_symbol_bars(
        &self,
        symbol: &Symbol,
        request: &BarRequest,
    ) -> std::result::Result<WideFrame, ProviderError> {
        let start = to_offset_datetime(request.start)?;
        let end = to_offset_datetime(request.end)?;

        debug!(
            symbol = %symbol,
            interval = %request.interval,
            start = %request.start,
            end = %request.end,
            "Yahoo Finance API 날짜 범위 호출"
        );

        let response = self
            .connector
            .get_quote_history_interval(symbol.as_str(), start, end, &request.interval)
            .await
            .map_err(|e| classify_error(symbol, &e))?;

        let quotes = response.quotes().map_err(|e| classify_error(symbol, &e))?;

        let daily = is_daily_interval(&request.interval);
        let mut rows: Vec<(NaiveDateTime, [Option<f64>; 6])> = quotes
            .iter()
            .filter_map(|q| {
                let ts = DateTime::from_timestamp(q.timestamp as i64, 0)?.naive_utc();
                let ts = if daily {
                    ts.date().and_hms_opt(0, 0, 0)?
                } else {
                    ts
                };
                Some((
                    ts,
                    [
                        finite(q.open),
                        finite(q.high),
                        finite(q.low),
                        finite(q.close),
                        finite(q.adjclose),
                        Some(q.volume as f64),
                    ],
                ))
            })
            .collect();
        rows.sort_by_key(|(ts, _)| *ts);
        rows.dedup_by_key(|(ts, _)| *ts);

        let mut frame = WideFrame::new(rows.iter().map(|(ts, _)| *ts).collect());
        for (i, field) in BAR_FIELDS.iter().enumerate() {
            let values = rows.iter().map(|(_, bar)| bar[i]).collect();
            frame
                .push_column(ColumnKey::new(*field, symbol.clone()), values)
                .map_err(|e| ProviderError::malformed(e.to_string()))?;
        }

        Ok(frame)
    }
}

#[async_trait]
impl AttributeProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn supports(&self, attribute: Attribute) -> bool {
        matches!(attribute, Attribute::Dividends | Attribute::Splits)
    }

    async fn fetch_attribute(
        &self,
        symbol: &Symbol,
        attribute: Attribute,
    ) -> std::result::Result<RawDataset, ProviderError> {
        match self.fetch_events(symbol, attribute).await {
            Err(e) if e.kind == ProviderErrorKind::NotFound => Ok(RawDataset::Series {
                name: attribute.value_column().to_string(),
                index: Vec::new(),
                values: Vec::new(),
            }),
            other => other,
        }
    }
}

/// `yahoo_finance_api` 오류를 분류합니다.
fn classify_error(symbol: &Symbol, err: &YahooError) -> ProviderError {
    classify_message(symbol, &format!("{} ({:?})", err, err))
}

fn classify_message(symbol: &Symbol, text: &str) -> ProviderError {
    let lower = text.to_lowercase();
    let kind = if mentions_rate_limit(text) {
        ProviderErrorKind::RateLimited
    } else if lower.contains("noquotes")
        || lower.contains("noresult")
        || lower.contains("emptydataset")
        || lower.contains("not found")
        || lower.contains("no data")
        || lower.contains("delisted")
    {
        ProviderErrorKind::NotFound
    } else if lower.contains("unauthorized") || lower.contains("crumb") || lower.contains("cookie")
    {
        ProviderErrorKind::Unauthorized
    } else if lower.contains("connection") || lower.contains("timed out") {
        ProviderErrorKind::Network
    } else if lower.contains("deserialize") || lower.contains("json") || lower.contains("inconsisten")
    {
        ProviderErrorKind::Malformed
    } else {
        ProviderErrorKind::Other
    };

    ProviderError::new(kind, format!("Yahoo Finance API 오류 ({}): {}", symbol, text))
}

fn is_daily_interval(interval: &str) -> bool {
    matches!(interval, "1d" | "5d" | "1wk" | "1mo" | "3mo")
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// NaiveDate를 OffsetDateTime으로 변환.
fn to_offset_datetime(date: NaiveDate) -> std::result::Result<OffsetDateTime, ProviderError> {
    let month = time::Month::try_from(date.month() as u8)
        .map_err(|e| ProviderError::malformed(format!("invalid month in {}: {}", date, e)))?;
    time::Date::from_calendar_date(date.year(), month, date.day() as u8)
        .map(|d| d.midnight().assume_utc())
        .map_err(|e| ProviderError::malformed(format!("invalid date {}: {}", date, e)))
}
