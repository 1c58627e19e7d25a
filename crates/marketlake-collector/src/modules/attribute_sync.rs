//! 심볼 × 속성 단위 참조 데이터 동기화.
//!
//! 재무 데이터와 기업 이벤트가 공유하는 실행기입니다. 배치 안에서 심볼마다
//! 속성을 하나씩 조회해서 속성별 테이블에 적재하고, 모든 속성이 적재되었거나
//! 비어 있던 심볼만 배치가 끝난 뒤 한 번에 진행 로그에 기록합니다.

use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn, Instrument};

use crate::error::Result;
use crate::modules::progress::ProgressLog;
use crate::stats::CollectionStats;
use marketlake_core::{partition, work_span, Attribute, Symbol, Universe};
use marketlake_data::{
    normalize, AttributeProvider, FetchResult, Fetcher, ProviderErrorKind, SchemaIngestor,
    TableStore,
};

/// 한 번의 동기화 계획.
#[derive(Debug, Clone)]
pub struct AttributePlan {
    /// 로그용 경로 이름
    pub workflow: String,
    pub attributes: Vec<Attribute>,
    pub batch_size: i64,
    /// 연속된 API 호출 사이 대기
    pub request_delay: Duration,
}

/// 속성 하나의 처리 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeOutcome {
    Ingested { rows: u64, columns_added: usize },
    Empty,
    Failed { rate_limited: bool },
    Interrupted,
}

/// 심볼 하나의 처리 결과.
#[derive(Debug, Default)]
struct SymbolOutcome {
    rows: u64,
    columns_added: usize,
    ingested: usize,
    failed: usize,
    interrupted: bool,
}

impl SymbolOutcome {
    fn is_complete(&self) -> bool {
        self.failed == 0 && !self.interrupted
    }
}

/// 심볼 × 속성 동기화 실행기.
pub struct AttributeSyncer<'a> {
    provider: &'a dyn AttributeProvider,
    store: &'a dyn TableStore,
    progress: &'a dyn ProgressLog,
    fetcher: Fetcher,
}

impl<'a> AttributeSyncer<'a> {
    pub fn new(
        provider: &'a dyn AttributeProvider,
        store: &'a dyn TableStore,
        progress: &'a dyn ProgressLog,
        fetcher: Fetcher,
    ) -> Self {
        Self {
            provider,
            store,
            progress,
            fetcher,
        }
    }

    /// 유니버스 중 미처리 심볼을 동기화합니다.
    pub async fn run(&self, universe: &Universe, plan: &AttributePlan) -> Result<CollectionStats> {
        let start = Instant::now();
        let mut stats = CollectionStats::new();

        let attributes: Vec<Attribute> = plan
            .attributes
            .iter()
            .copied()
            .filter(|a| {
                let supported = self.provider.supports(*a);
                if !supported {
                    warn!(provider = self.provider.name(), attribute = %a, "지원하지 않는 속성, 제외");
                }
                supported
            })
            .collect();

        let processed = self.progress.load().await?;
        let pending = universe.pending(&processed);
        stats.skipped = universe.len() - pending.len();

        info!(
            workflow = %plan.workflow,
            provider = self.provider.name(),
            attributes = attributes.len(),
            universe = universe.len(),
            pending = pending.len(),
            skipped = stats.skipped,
            "동기화 시작"
        );

        if pending.is_empty() || attributes.is_empty() {
            stats.elapsed = start.elapsed();
            return Ok(stats);
        }

        let batches = partition(&pending, plan.batch_size)?;
        let mut first_call = true;

        'batches: for (i, batch) in batches.iter().enumerate() {
            let mut completed: Vec<Symbol> = Vec::with_capacity(batch.len());

            for symbol in &batch.symbols {
                if self.fetcher.is_cancelled() {
                    stats.interrupted = true;
                    break;
                }

                stats.total += 1;
                let span = work_span!("attribute_symbol", plan.workflow, batch.index);
                let outcome = self
                    .sync_symbol(symbol, &attributes, plan, &mut first_call)
                    .instrument(span)
                    .await;

                stats.rows_inserted += outcome.rows;
                stats.columns_added += outcome.columns_added;

                if outcome.interrupted {
                    stats.total -= 1;
                    stats.interrupted = true;
                    break;
                }
                if outcome.is_complete() {
                    if outcome.ingested > 0 {
                        stats.success += 1;
                    } else {
                        stats.empty += 1;
                    }
                    completed.push(symbol.clone());
                } else {
                    stats.errors += 1;
                    info!(symbol = %symbol, failed = outcome.failed, "일부 속성 실패, 다음 실행에서 재시도");
                }
            }

            // 중단되었더라도 이미 끝난 심볼은 기록
            self.progress.record(&completed).await?;
            debug!(batch = batch.index, completed = completed.len(), "배치 진행 기록");

            if stats.interrupted {
                break 'batches;
            }

            info!(
                workflow = %plan.workflow,
                progress = format!("{}/{}", i + 1, batches.len()),
                success = stats.success,
                empty = stats.empty,
                errors = stats.errors,
                "배치 완료"
            );

            if i + 1 < batches.len() && !self.fetcher.pause_between_batches().await {
                stats.interrupted = true;
                break;
            }
        }

        stats.elapsed = start.elapsed();
        Ok(stats)
    }

    async fn sync_symbol(
        &self,
        symbol: &Symbol,
        attributes: &[Attribute],
        plan: &AttributePlan,
        first_call: &mut bool,
    ) -> SymbolOutcome {
        let mut outcome = SymbolOutcome::default();

        for attribute in attributes {
            if !*first_call && !self.fetcher.pause(plan.request_delay).await {
                outcome.interrupted = true;
                break;
            }
            *first_call = false;

            match self.sync_attribute(symbol, *attribute).await {
                AttributeOutcome::Ingested {
                    rows,
                    columns_added,
                } => {
                    outcome.rows += rows;
                    outcome.columns_added += columns_added;
                    outcome.ingested += 1;
                }
                AttributeOutcome::Empty => {}
                AttributeOutcome::Failed { rate_limited } => {
                    outcome.failed += 1;
                    if !rate_limited && !self.fetcher.cool_down().await {
                        outcome.interrupted = true;
                        break;
                    }
                }
                AttributeOutcome::Interrupted => {
                    outcome.interrupted = true;
                    break;
                }
            }
        }

        outcome
    }

    async fn sync_attribute(&self, symbol: &Symbol, attribute: Attribute) -> AttributeOutcome {
        let label = format!("{}/{}", symbol, attribute);
        let fetched = self
            .fetcher
            .fetch(&label, || self.provider.fetch_attribute(symbol, attribute))
            .await;

        let raw = match fetched.result {
            FetchResult::Success(raw) => raw,
            FetchResult::Empty => {
                debug!(symbol = %symbol, attribute = %attribute, "데이터 없음");
                return AttributeOutcome::Empty;
            }
            FetchResult::Failed(e) if e.kind == ProviderErrorKind::Cancelled => {
                return AttributeOutcome::Interrupted;
            }
            FetchResult::Failed(e) => {
                warn!(
                    symbol = %symbol,
                    attribute = %attribute,
                    attempts = fetched.attempts,
                    elapsed = fetched.elapsed.as_secs(),
                    error = %e,
                    "속성 조회 실패"
                );
                return AttributeOutcome::Failed {
                    rate_limited: e.is_rate_limited(),
                };
            }
        };

        let dataset = match normalize(raw, attribute.kind(), symbol) {
            Ok(dataset) => dataset,
            Err(e) => {
                error!(symbol = %symbol, attribute = %attribute, error = %e, "정규화 실패");
                return AttributeOutcome::Failed {
                    rate_limited: false,
                };
            }
        };
        if dataset.is_empty() {
            return AttributeOutcome::Empty;
        }

        let table = attribute.table_name();
        match SchemaIngestor::new(self.store).ingest(&dataset, table).await {
            Ok(result) => {
                debug!(
                    symbol = %symbol,
                    attribute = %attribute,
                    table = table,
                    rows = result.rows_inserted,
                    "속성 적재 완료"
                );
                AttributeOutcome::Ingested {
                    rows: result.rows_inserted,
                    columns_added: result.columns_added,
                }
            }
            Err(e) => {
                error!(symbol = %symbol, attribute = %attribute, table = table, error = %e, "속성 적재 실패");
                AttributeOutcome::Failed {
                    rate_limited: false,
                }
            }
        }
    }
}
