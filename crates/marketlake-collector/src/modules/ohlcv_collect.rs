//! OHLCV 배치 수집 모듈.
//!
//! 유니버스에서 진행 로그에 없는 심볼만 골라 배치로 나누고, 배치마다
//! 프로바이더 조회 → (청크 파일 기록) → un-pivot → 적재 → 진행 기록 순으로
//! 처리합니다. 한 배치의 실패는 다음 배치에 영향을 주지 않으며, 실패한
//! 배치의 심볼은 기록하지 않으므로 다음 실행에서 다시 시도됩니다.

use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn, Instrument};

use crate::context::CollectorContext;
use crate::error::{CollectorError, Result};
use crate::modules::progress::ProgressLog;
use crate::stats::CollectionStats;
use marketlake_core::{partition, work_span, Batch, RawDataset, Universe};
use marketlake_data::{
    quote_ident, unpivot_bars, BarProvider, BarRequest, ChunkStore, FetchResult, Fetcher,
    IngestResult, ProviderError, ProviderErrorKind, SchemaIngestor, TableStore, YahooProvider,
    DATE_COLUMN, SYMBOL_COLUMN,
};

/// 한 번의 OHLCV 수집 계획.
#[derive(Debug, Clone)]
pub struct BarPlan {
    /// 로그용 경로 이름
    pub workflow: String,
    pub batch_size: i64,
    pub request: BarRequest,
    pub table: String,
}

/// 배치 하나의 처리 결과.
enum BatchOutcome {
    Ingested(IngestResult),
    Empty,
    FetchFailed(ProviderError),
    IngestFailed,
    Interrupted,
}

/// 배치 단위 OHLCV 수집기.
pub struct BarCollector<'a> {
    provider: &'a dyn BarProvider,
    store: &'a dyn TableStore,
    progress: &'a dyn ProgressLog,
    fetcher: Fetcher,
    chunks: Option<ChunkStore>,
}

impl<'a> BarCollector<'a> {
    pub fn new(
        provider: &'a dyn BarProvider,
        store: &'a dyn TableStore,
        progress: &'a dyn ProgressLog,
        fetcher: Fetcher,
    ) -> Self {
        Self {
            provider,
            store,
            progress,
            fetcher,
            chunks: None,
        }
    }

    /// 배치 결과를 parquet 청크로도 남깁니다.
    pub fn with_chunks(mut self, chunks: ChunkStore) -> Self {
        self.chunks = Some(chunks);
        self
    }

    /// 유니버스 중 미처리 심볼을 수집합니다.
    pub async fn run(&self, universe: &Universe, plan: &BarPlan) -> Result<CollectionStats> {
        let start = Instant::now();
        let mut stats = CollectionStats::new();

        let processed = self.progress.load().await?;
        let pending = universe.pending(&processed);
        stats.skipped = universe.len() - pending.len();

        info!(
            workflow = %plan.workflow,
            provider = self.provider.name(),
            universe = universe.len(),
            pending = pending.len(),
            skipped = stats.skipped,
            "OHLCV 수집 시작"
        );

        if pending.is_empty() {
            info!(workflow = %plan.workflow, "모든 심볼이 이미 처리됨");
            stats.elapsed = start.elapsed();
            return Ok(stats);
        }

        let batches = partition(&pending, plan.batch_size)?;
        let mut next_chunk = self.first_chunk_index();

        for (i, batch) in batches.iter().enumerate() {
            if self.fetcher.is_cancelled() {
                stats.interrupted = true;
                break;
            }

            stats.total += batch.len();
            let span = work_span!("ohlcv_batch", plan.workflow, batch.index);
            let outcome = self
                .process_batch(batch, plan, &mut next_chunk)
                .instrument(span)
                .await?;

            match outcome {
                BatchOutcome::Ingested(result) => {
                    stats.success += batch.len();
                    stats.rows_inserted += result.rows_inserted;
                    stats.columns_added += result.columns_added;
                }
                BatchOutcome::Empty => stats.empty += batch.len(),
                BatchOutcome::IngestFailed => stats.errors += batch.len(),
                BatchOutcome::FetchFailed(e) => {
                    stats.errors += batch.len();
                    if !e.is_rate_limited() && !self.fetcher.cool_down().await {
                        stats.interrupted = true;
                        break;
                    }
                }
                BatchOutcome::Interrupted => {
                    stats.total -= batch.len();
                    stats.interrupted = true;
                    break;
                }
            }

            if (i + 1) % 10 == 0 {
                info!(
                    workflow = %plan.workflow,
                    progress = format!("{}/{}", i + 1, batches.len()),
                    success = stats.success,
                    errors = stats.errors,
                    "진행 중"
                );
            }

            if i + 1 < batches.len() && !self.fetcher.pause_between_batches().await {
                stats.interrupted = true;
                break;
            }
        }

        if stats.rows_inserted > 0 {
            self.ensure_key_index(&plan.table).await;
        }

        stats.elapsed = start.elapsed();
        Ok(stats)
    }

    async fn process_batch(
        &self,
        batch: &Batch,
        plan: &BarPlan,
        next_chunk: &mut Option<usize>,
    ) -> Result<BatchOutcome> {
        let label = batch.label();
        let fetched = self
            .fetcher
            .fetch(&label, || self.provider.fetch_bars(&batch.symbols, &plan.request))
            .await;

        let frame = match fetched.result {
            FetchResult::Success(RawDataset::Wide(frame)) => frame,
            FetchResult::Success(other) => {
                error!(batch = %label, kind = %other.kind(), "wide 프레임이 아닌 OHLCV 응답");
                return Ok(BatchOutcome::FetchFailed(ProviderError::malformed(
                    "unexpected response shape",
                )));
            }
            FetchResult::Empty => {
                info!(batch = %label, symbols = batch.len(), "데이터 없음, 처리 완료로 기록");
                self.progress.record(&batch.symbols).await?;
                return Ok(BatchOutcome::Empty);
            }
            FetchResult::Failed(e) if e.kind == ProviderErrorKind::Cancelled => {
                return Ok(BatchOutcome::Interrupted);
            }
            FetchResult::Failed(e) => {
                error!(
                    batch = %label,
                    attempts = fetched.attempts,
                    elapsed = fetched.elapsed.as_secs(),
                    error = %e,
                    "배치 조회 실패, 다음 실행에서 재시도"
                );
                return Ok(BatchOutcome::FetchFailed(e));
            }
        };

        if let (Some(chunks), Some(n)) = (&self.chunks, next_chunk.as_mut()) {
            match chunks.write_chunk(*n, &frame) {
                Ok(path) => {
                    info!(batch = %label, chunk = *n, path = %path.display(), "청크 저장");
                    *n += 1;
                }
                Err(e) => warn!(batch = %label, chunk = *n, error = %e, "청크 저장 실패"),
            }
        }

        let dataset = match unpivot_bars(&frame) {
            Ok(dataset) => dataset,
            Err(e) => {
                error!(batch = %label, error = %e, "un-pivot 실패");
                return Ok(BatchOutcome::IngestFailed);
            }
        };
        match SchemaIngestor::new(self.store).ingest(&dataset, &plan.table).await {
            Ok(result) => {
                self.progress.record(&batch.symbols).await?;
                info!(
                    batch = %label,
                    symbols = batch.len(),
                    rows = result.rows_inserted,
                    attempts = fetched.attempts,
                    "배치 적재 완료"
                );
                Ok(BatchOutcome::Ingested(result))
            }
            Err(e) => {
                error!(batch = %label, table = %plan.table, error = %e, "배치 적재 실패");
                Ok(BatchOutcome::IngestFailed)
            }
        }
    }

    fn first_chunk_index(&self) -> Option<usize> {
        let chunks = self.chunks.as_ref()?;
        match chunks.next_chunk_index() {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(dir = %chunks.dir().display(), error = %e, "청크 디렉터리 확인 실패, 청크 저장 생략");
                None
            }
        }
    }

    /// `(symbol, date)` 조회용 인덱스. 실패해도 수집 결과에는 영향 없음.
    async fn ensure_key_index(&self, table: &str) {
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({}, {})",
            quote_ident(&format!("idx_{}_symbol_date", table)),
            quote_ident(table),
            quote_ident(SYMBOL_COLUMN),
            quote_ident(DATE_COLUMN),
        );
        if let Err(e) = self.store.execute(&sql).await {
            warn!(table = table, error = %e, "인덱스 생성 실패");
        }
    }
}

/// 주식 OHLCV 수집 (Yahoo Finance, 청크 파일 병행).
pub async fn collect_equity_ohlcv(
    ctx: &CollectorContext,
    universe: &Universe,
) -> Result<CollectionStats> {
    let config = &ctx.config.ohlcv;
    let provider = YahooProvider::new()?;
    let progress = ctx.progress_log(&config.progress_file);
    let plan = BarPlan {
        workflow: "equity_ohlcv".to_string(),
        batch_size: config.chunk_size,
        request: config.bar_request()?,
        table: config.table.clone(),
    };

    let mut collector = BarCollector::new(
        &provider,
        ctx.store.as_ref(),
        progress.as_ref(),
        ctx.fetcher(config.retry_policy()),
    );
    if config.write_chunks && !ctx.dry_run {
        collector = collector.with_chunks(ChunkStore::new(&config.chunk_dir, &config.chunk_prefix));
    }

    let stats = collector.run(universe, &plan).await?;
    stats.log_summary("주식 OHLCV 수집");
    Ok(stats)
}

/// 암호화폐 OHLCV 수집 (Yahoo Finance).
pub async fn collect_crypto_ohlcv(
    ctx: &CollectorContext,
    universe: &Universe,
) -> Result<CollectionStats> {
    let config = &ctx.config.crypto;
    let provider = YahooProvider::new()?;
    let progress = ctx.progress_log(&config.progress_file);
    let plan = BarPlan {
        workflow: "crypto_ohlcv".to_string(),
        batch_size: config.chunk_size,
        request: config.bar_request()?,
        table: config.table.clone(),
    };

    let mut collector = BarCollector::new(
        &provider,
        ctx.store.as_ref(),
        progress.as_ref(),
        ctx.fetcher(config.retry_policy()),
    );
    if config.write_chunks && !ctx.dry_run {
        collector = collector.with_chunks(ChunkStore::new(&config.chunk_dir, &config.chunk_prefix));
    }

    let stats = collector.run(universe, &plan).await?;
    stats.log_summary("암호화폐 OHLCV 수집");
    Ok(stats)
}

/// 청크 결합 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineSummary {
    pub chunks: usize,
    pub rows: usize,
    pub columns: usize,
    pub output: PathBuf,
}

/// 청크 디렉터리의 모든 청크를 하나의 parquet 파일로 합칩니다.
pub fn combine_chunks(chunks: &ChunkStore, output: Option<PathBuf>) -> Result<CombineSummary> {
    let count = chunks.list_chunks()?.len();
    if count == 0 {
        return Err(CollectorError::FatalPrecondition(format!(
            "no chunk files in {}",
            chunks.dir().display()
        )));
    }

    let output = output.unwrap_or_else(|| chunks.dir().join("combined.parquet"));
    let frame = chunks.read_all_chunks()?;
    chunks.write_combined(&frame, &output)?;

    Ok(CombineSummary {
        chunks: count,
        rows: frame.row_count(),
        columns: frame.column_count(),
        output,
    })
}
