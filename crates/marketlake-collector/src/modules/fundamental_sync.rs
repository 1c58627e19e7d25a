//! 재무 데이터와 기업 이벤트 동기화 경로.

use chrono::NaiveDate;
use tracing::info;

use crate::context::CollectorContext;
use crate::error::{CollectorError, Result};
use crate::modules::attribute_sync::{AttributePlan, AttributeSyncer};
use crate::stats::CollectionStats;
use marketlake_core::{Attribute, Universe};
use marketlake_data::{AlphaVantageProvider, StatementPeriod, YahooProvider};

/// 재무 데이터 동기화 (Alpha Vantage: 개요, 손익, 재무상태, 현금흐름).
///
/// API 키가 없으면 이 경로만 `FatalPrecondition`으로 중단합니다.
pub async fn sync_fundamentals(
    ctx: &CollectorContext,
    universe: &Universe,
) -> Result<CollectionStats> {
    let config = &ctx.config.fundamental;
    let api_key = ctx.config.require_api_key()?;
    let period: StatementPeriod = config.period.parse().map_err(CollectorError::Config)?;

    let provider = AlphaVantageProvider::new(api_key.clone())?.with_period(period);
    let progress = ctx.progress_log(&config.progress_file);
    let plan = AttributePlan {
        workflow: "fundamentals".to_string(),
        attributes: Attribute::FUNDAMENTALS.to_vec(),
        batch_size: config.batch_size,
        request_delay: config.request_delay(),
    };

    info!(period = %config.period, "재무 데이터 동기화 시작");
    let stats = AttributeSyncer::new(
        &provider,
        ctx.store.as_ref(),
        progress.as_ref(),
        ctx.fetcher(config.retry_policy()),
    )
    .run(universe, &plan)
    .await?;

    stats.log_summary("재무 데이터 동기화");
    Ok(stats)
}

/// 기업 이벤트 동기화 (Yahoo Finance: 배당, 분할).
pub async fn sync_corporate_actions(
    ctx: &CollectorContext,
    universe: &Universe,
) -> Result<CollectionStats> {
    let config = &ctx.config.corporate_action;
    let history_start = NaiveDate::from_ymd_opt(1970, 1, 1)
        .ok_or_else(|| CollectorError::Config("invalid history start".to_string()))?;
    let provider = YahooProvider::new()?.with_history_range(history_start, None);
    let progress = ctx.progress_log(&config.progress_file);
    let plan = AttributePlan {
        workflow: "corporate_actions".to_string(),
        attributes: Attribute::CORPORATE_ACTIONS.to_vec(),
        batch_size: config.batch_size,
        request_delay: config.request_delay(),
    };

    let stats = AttributeSyncer::new(
        &provider,
        ctx.store.as_ref(),
        progress.as_ref(),
        ctx.fetcher(config.retry_policy()),
    )
    .run(universe, &plan)
    .await?;

    stats.log_summary("기업 이벤트 동기화");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AttributeSyncConfig, BarCollectConfig, CollectorConfig, TreasuryConfig,
    };
    use marketlake_data::MemoryTableStore;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn config_without_key() -> CollectorConfig {
        CollectorConfig {
            database_url: None,
            alpha_vantage_api_key: None,
            universe_file: None,
            ohlcv: BarCollectConfig::equity_defaults(),
            crypto: BarCollectConfig::crypto_defaults(),
            crypto_pairs: vec![],
            fundamental: AttributeSyncConfig::fundamental_defaults(),
            corporate_action: AttributeSyncConfig::corporate_action_defaults(),
            treasury: TreasuryConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_fundamentals_require_api_key() {
        let store = Arc::new(MemoryTableStore::new());
        let ctx = CollectorContext::new(config_without_key(), store.clone(), CancellationToken::new())
            .with_dry_run(true);

        let result = sync_fundamentals(&ctx, &Universe::new(["IBM"])).await;

        assert!(matches!(result, Err(CollectorError::FatalPrecondition(_))));
        assert!(store.table_names().await.is_empty());
    }
}
