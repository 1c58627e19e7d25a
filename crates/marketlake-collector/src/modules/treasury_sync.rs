//! 미국 국채 금리 동기화.
//!
//! 만기 하나의 금리 시계열을 받아 백테스터가 쓰는 일간 무위험 수익률
//! 컬럼을 덧붙여 적재합니다.

use std::time::Instant;
use tracing::{error, info, warn};

use crate::context::CollectorContext;
use crate::error::Result;
use crate::stats::CollectionStats;
use marketlake_core::{Attribute, Symbol, Value};
use marketlake_data::{
    normalize, AlphaVantageProvider, AttributeProvider, DataError, FetchResult, Fetcher,
    ProviderErrorKind, SchemaIngestor, TableStore,
};

/// 파생 컬럼 이름.
pub const RISK_FREE_RATE_COLUMN: &str = "daily_risk_free_rate_decimal";
/// 연간 거래일 수.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// 연 수익률(%)을 일간 소수 수익률로 변환합니다.
pub fn daily_risk_free_rate(annual_percent: &Value) -> Value {
    match annual_percent {
        Value::Float(y) => Value::from(y / 100.0 / TRADING_DAYS_PER_YEAR),
        Value::Int(y) => Value::from(*y as f64 / 100.0 / TRADING_DAYS_PER_YEAR),
        _ => Value::Null,
    }
}

/// 국채 금리 동기화 실행기.
pub struct TreasurySyncer<'a> {
    provider: &'a dyn AttributeProvider,
    store: &'a dyn TableStore,
    fetcher: Fetcher,
}

impl<'a> TreasurySyncer<'a> {
    pub fn new(provider: &'a dyn AttributeProvider, store: &'a dyn TableStore, fetcher: Fetcher) -> Self {
        Self {
            provider,
            store,
            fetcher,
        }
    }

    /// 만기 하나의 금리 시계열을 `table`에 적재합니다.
    pub async fn run(&self, maturity: &str, table: &str) -> Result<CollectionStats> {
        let start = Instant::now();
        let mut stats = CollectionStats {
            total: 1,
            ..Default::default()
        };
        let symbol = Symbol::new(maturity);
        let attribute = Attribute::TreasuryYield;

        info!(maturity = %symbol, table = table, "국채 금리 동기화 시작");

        let fetched = self
            .fetcher
            .fetch(maturity, || self.provider.fetch_attribute(&symbol, attribute))
            .await;

        let raw = match fetched.result {
            FetchResult::Success(raw) => raw,
            FetchResult::Empty => {
                warn!(maturity = %symbol, "국채 금리 데이터 없음");
                stats.empty = 1;
                stats.elapsed = start.elapsed();
                return Ok(stats);
            }
            FetchResult::Failed(e) if e.kind == ProviderErrorKind::Cancelled => {
                stats.interrupted = true;
                stats.total = 0;
                stats.elapsed = start.elapsed();
                return Ok(stats);
            }
            FetchResult::Failed(e) => {
                error!(maturity = %symbol, attempts = fetched.attempts, error = %e, "국채 금리 조회 실패");
                stats.errors = 1;
                stats.elapsed = start.elapsed();
                return Ok(stats);
            }
        };

        let mut dataset = normalize(raw, attribute.kind(), &symbol)?;
        let value_column = attribute.value_column();
        let idx = dataset.column_index(value_column).ok_or_else(|| {
            DataError::InvalidData(format!("treasury dataset has no {} column", value_column))
        })?;
        dataset.add_derived_column(RISK_FREE_RATE_COLUMN, |_, row| daily_risk_free_rate(&row[idx]))?;

        let result = SchemaIngestor::new(self.store).ingest(&dataset, table).await?;
        stats.success = 1;
        stats.rows_inserted = result.rows_inserted;
        stats.columns_added = result.columns_added;
        stats.elapsed = start.elapsed();
        Ok(stats)
    }
}

/// 국채 금리 동기화 (Alpha Vantage).
///
/// API 키가 없으면 이 경로만 `FatalPrecondition`으로 중단합니다.
pub async fn sync_treasury(ctx: &CollectorContext) -> Result<CollectionStats> {
    let config = &ctx.config.treasury;
    let api_key = ctx.config.require_api_key()?;
    let provider =
        AlphaVantageProvider::new(api_key.clone())?.with_treasury_interval(config.interval.clone());

    let stats = TreasurySyncer::new(
        &provider,
        ctx.store.as_ref(),
        ctx.fetcher(config.retry_policy()),
    )
    .run(&config.maturity, &config.table)
    .await?;

    stats.log_summary("국채 금리 동기화");
    Ok(stats)
}
