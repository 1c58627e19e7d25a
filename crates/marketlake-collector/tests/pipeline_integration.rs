//! 가짜 프로바이더와 메모리 저장소로 수집 경로 전체를 검증합니다.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use marketlake_collector::modules::{
    AttributePlan, AttributeSyncer, BarCollector, BarPlan, MemoryProgressLog, TreasurySyncer,
    RISK_FREE_RATE_COLUMN,
};
use marketlake_core::{
    Attribute, ColumnKey, ColumnType, RawDataset, Symbol, TableSchema, Universe, Value, WideFrame,
};
use marketlake_data::{
    AttributeProvider, BarProvider, BarRequest, ChunkStore, DataError, Fetcher, MemoryTableStore,
    ProviderError, ProviderErrorKind, RetryPolicy, TableStore,
};

fn day(d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn symbols(ids: &[&str]) -> Vec<Symbol> {
    ids.iter().map(|s| Symbol::from(*s)).collect()
}

// ── Fake bar provider ───────────────────────────────────────────────

/// 요청받은 심볼마다 2일치 close/volume 컬럼을 돌려주는 가짜 OHLCV 프로바이더.
#[derive(Default)]
struct FakeBars {
    calls: Mutex<Vec<Vec<Symbol>>>,
    /// 이 심볼이 포함된 배치는 네트워크 오류
    failing: HashSet<String>,
    /// 이 심볼로만 구성된 배치는 빈 응답
    empty: HashSet<String>,
    /// 처음 N번 호출은 rate limit
    rate_limited_calls: AtomicU32,
}

impl FakeBars {
    fn failing(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }

    fn empty(mut self, symbol: &str) -> Self {
        self.empty.insert(symbol.to_string());
        self
    }

    fn rate_limited(self, calls: u32) -> Self {
        self.rate_limited_calls.store(calls, Ordering::SeqCst);
        self
    }

    fn calls(&self) -> Vec<Vec<Symbol>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BarProvider for FakeBars {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch_bars(
        &self,
        batch: &[Symbol],
        _request: &BarRequest,
    ) -> Result<RawDataset, ProviderError> {
        self.calls.lock().unwrap().push(batch.to_vec());

        let remaining = self.rate_limited_calls.load(Ordering::SeqCst);
        if remaining > 0 {
            self.rate_limited_calls.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::rate_limited("Too Many Requests"));
        }
        if batch.iter().any(|s| self.failing.contains(s.as_str())) {
            return Err(ProviderError::new(ProviderErrorKind::Network, "connection reset"));
        }
        if batch.iter().all(|s| self.empty.contains(s.as_str())) {
            return Ok(RawDataset::Wide(WideFrame::new(vec![])));
        }

        let frames = batch
            .iter()
            .enumerate()
            .map(|(i, symbol)| two_day_frame(symbol, 100.0 + i as f64));
        Ok(RawDataset::Wide(WideFrame::combine(frames)))
    }

    async fn fetch_symbol_bars(
        &self,
        symbol: &Symbol,
        _request: &BarRequest,
    ) -> Result<WideFrame, ProviderError> {
        Ok(two_day_frame(symbol, 100.0))
    }
}

/// 심볼 하나의 2일치 close/volume 프레임.
fn two_day_frame(symbol: &Symbol, base: f64) -> WideFrame {
    let mut frame = WideFrame::new(vec![day(2), day(3)]);
    frame
        .push_column(ColumnKey::new("close", symbol.clone()), vec![Some(base), Some(base + 1.0)])
        .unwrap();
    frame
        .push_column(ColumnKey::new("volume", symbol.clone()), vec![Some(1_000.0), None])
        .unwrap();
    frame
}

/// 심볼 단위 조회만 구현하고 배치 조립은 기본 구현을 쓰는 프로바이더.
#[derive(Default)]
struct PerSymbolBars {
    /// 네트워크 오류를 내는 심볼
    failing: HashSet<String>,
    /// 데이터가 없는 심볼
    missing: HashSet<String>,
}

#[async_trait]
impl BarProvider for PerSymbolBars {
    fn name(&self) -> &str {
        "per_symbol"
    }

    async fn fetch_symbol_bars(
        &self,
        symbol: &Symbol,
        _request: &BarRequest,
    ) -> Result<WideFrame, ProviderError> {
        if self.failing.contains(symbol.as_str()) {
            return Err(ProviderError::new(ProviderErrorKind::Network, "connection failed"));
        }
        if self.missing.contains(symbol.as_str()) {
            return Err(ProviderError::not_found("no quotes"));
        }
        Ok(two_day_frame(symbol, 100.0))
    }
}

fn bar_plan(batch_size: i64) -> BarPlan {
    BarPlan {
        workflow: "test_ohlcv".to_string(),
        batch_size,
        request: BarRequest::daily(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        ),
        table: "stock_data".to_string(),
    }
}

fn bar_policy() -> RetryPolicy {
    RetryPolicy::attempts(3, Duration::from_secs(600))
        .with_other_error_delay(Duration::from_secs(30))
        .with_inter_batch_delay(Duration::from_secs(30))
}

// ── OHLCV pipeline ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_resume_skips_processed_symbols() {
    let provider = FakeBars::default();
    let store = MemoryTableStore::new();
    let progress = MemoryProgressLog::with_processed(["A", "B"]);
    let universe = Universe::new(["A", "B", "C", "D"]);

    let stats = BarCollector::new(&provider, &store, &progress, Fetcher::new(bar_policy()))
        .run(&universe, &bar_plan(2))
        .await
        .unwrap();

    assert_eq!(provider.calls(), vec![symbols(&["C", "D"])]);
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.success, 2);
    // 2일 × 2심볼
    assert_eq!(store.row_count("stock_data").await, 4);
    assert_eq!(progress.records().await, vec![symbols(&["C", "D"])]);

    let schema = store.schema("stock_data").await.unwrap();
    assert_eq!(schema.column_type("date"), Some(ColumnType::Timestamp));
    assert_eq!(schema.column_type("symbol"), Some(ColumnType::Text));
    assert_eq!(schema.column_type("close"), Some(ColumnType::Float));
}

#[tokio::test(start_paused = true)]
async fn test_second_run_adds_no_columns() {
    let provider = FakeBars::default();
    let store = MemoryTableStore::new();
    let universe = Universe::new(["A", "B"]);

    let first = MemoryProgressLog::new();
    BarCollector::new(&provider, &store, &first, Fetcher::new(bar_policy()))
        .run(&universe, &bar_plan(2))
        .await
        .unwrap();
    let changes = store.schema_changes().await;

    // 새 진행 로그로 같은 데이터를 다시 적재
    let second = MemoryProgressLog::new();
    let stats = BarCollector::new(&provider, &store, &second, Fetcher::new(bar_policy()))
        .run(&universe, &bar_plan(2))
        .await
        .unwrap();

    assert_eq!(stats.columns_added, 0);
    assert_eq!(store.schema_changes().await, changes);
    assert_eq!(store.row_count("stock_data").await, 8);
}

#[tokio::test(start_paused = true)]
async fn test_failed_batch_is_not_recorded_and_siblings_continue() {
    let provider = FakeBars::default().failing("B");
    let store = MemoryTableStore::new();
    let progress = MemoryProgressLog::new();
    let universe = Universe::new(["A", "B", "C"]);

    let stats = BarCollector::new(&provider, &store, &progress, Fetcher::new(bar_policy()))
        .run(&universe, &bar_plan(1))
        .await
        .unwrap();

    assert_eq!(provider.calls().len(), 3);
    assert_eq!(stats.success, 2);
    assert_eq!(stats.errors, 1);
    assert!(!stats.interrupted);

    let processed = progress.processed().await;
    assert!(processed.contains(&Symbol::from("A")));
    assert!(!processed.contains(&Symbol::from("B")));
    assert!(processed.contains(&Symbol::from("C")));
}

#[tokio::test(start_paused = true)]
async fn test_symbol_failure_inside_batch_leaves_whole_batch_unrecorded() {
    let provider = PerSymbolBars {
        failing: HashSet::from(["BBB".to_string()]),
        ..Default::default()
    };
    let store = MemoryTableStore::new();
    let progress = MemoryProgressLog::new();
    let universe = Universe::new(["AAA", "BBB", "CCC"]);

    let stats = BarCollector::new(&provider, &store, &progress, Fetcher::new(bar_policy()))
        .run(&universe, &bar_plan(2))
        .await
        .unwrap();

    assert_eq!(stats.errors, 2);
    assert_eq!(stats.success, 1);
    // AAA는 조회에 성공했지만 같은 배치의 BBB가 실패했으므로 적재하지 않음
    assert_eq!(store.row_count("stock_data").await, 2);
    assert_eq!(progress.records().await, vec![symbols(&["CCC"])]);

    // 다음 실행에서 AAA, BBB를 다시 시도
    let pending = universe.pending(&progress.processed().await);
    assert_eq!(pending, symbols(&["AAA", "BBB"]));
}

#[tokio::test(start_paused = true)]
async fn test_symbol_without_data_is_recorded_with_its_batch() {
    let provider = PerSymbolBars {
        missing: HashSet::from(["GONE".to_string()]),
        ..Default::default()
    };
    let store = MemoryTableStore::new();
    let progress = MemoryProgressLog::new();
    let universe = Universe::new(["AAA", "GONE"]);

    let stats = BarCollector::new(&provider, &store, &progress, Fetcher::new(bar_policy()))
        .run(&universe, &bar_plan(2))
        .await
        .unwrap();

    assert_eq!(stats.success, 2);
    assert_eq!(store.row_count("stock_data").await, 2);
    assert_eq!(progress.records().await, vec![symbols(&["AAA", "GONE"])]);
}

#[tokio::test(start_paused = true)]
async fn test_no_delay_after_last_batch() {
    let provider = FakeBars::default();
    let store = MemoryTableStore::new();
    let progress = MemoryProgressLog::new();
    let universe = Universe::new(["A", "B", "C"]);

    let started = tokio::time::Instant::now();
    BarCollector::new(&provider, &store, &progress, Fetcher::new(bar_policy()))
        .run(&universe, &bar_plan(1))
        .await
        .unwrap();

    // 배치 3개 사이의 대기 2번
    assert_eq!(started.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_other_error_cools_down_before_next_batch() {
    let provider = FakeBars::default().failing("A");
    let store = MemoryTableStore::new();
    let progress = MemoryProgressLog::new();
    let universe = Universe::new(["A", "B"]);

    let started = tokio::time::Instant::now();
    BarCollector::new(&provider, &store, &progress, Fetcher::new(bar_policy()))
        .run(&universe, &bar_plan(1))
        .await
        .unwrap();

    // 실패 후 대기 30초 + 배치 사이 대기 30초
    assert_eq!(started.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_batch_is_retried_as_unit() {
    let provider = FakeBars::default().rate_limited(2);
    let store = MemoryTableStore::new();
    let progress = MemoryProgressLog::new();
    let universe = Universe::new(["A", "B"]);

    let stats = BarCollector::new(&provider, &store, &progress, Fetcher::new(bar_policy()))
        .run(&universe, &bar_plan(2))
        .await
        .unwrap();

    assert_eq!(provider.calls(), vec![symbols(&["A", "B"]); 3]);
    assert_eq!(stats.success, 2);
    assert_eq!(progress.records().await, vec![symbols(&["A", "B"])]);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_budget_exhausted_leaves_batch_unrecorded() {
    let provider = FakeBars::default().rate_limited(10);
    let store = MemoryTableStore::new();
    let progress = MemoryProgressLog::new();
    let universe = Universe::new(["A"]);

    let stats = BarCollector::new(&provider, &store, &progress, Fetcher::new(bar_policy()))
        .run(&universe, &bar_plan(1))
        .await
        .unwrap();

    assert_eq!(provider.calls().len(), 3);
    assert_eq!(stats.errors, 1);
    assert!(progress.records().await.is_empty());
    assert_eq!(store.row_count("stock_data").await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_batch_is_recorded_without_rows() {
    let provider = FakeBars::default().empty("DELISTED");
    let store = MemoryTableStore::new();
    let progress = MemoryProgressLog::new();
    let universe = Universe::new(["DELISTED"]);

    let stats = BarCollector::new(&provider, &store, &progress, Fetcher::new(bar_policy()))
        .run(&universe, &bar_plan(1))
        .await
        .unwrap();

    assert_eq!(stats.empty, 1);
    assert_eq!(progress.records().await, vec![symbols(&["DELISTED"])]);
    assert!(store.table_names().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_chunks_continue_after_existing_numbers() {
    let dir = TempDir::new().unwrap();
    let chunks = ChunkStore::new(dir.path(), "stock_data");
    let mut seed = WideFrame::new(vec![day(2)]);
    seed.push_column(ColumnKey::new("close", "OLD"), vec![Some(1.0)])
        .unwrap();
    chunks.write_chunk(3, &seed).unwrap();

    let provider = FakeBars::default();
    let store = MemoryTableStore::new();
    let progress = MemoryProgressLog::new();
    let universe = Universe::new(["A", "B"]);

    BarCollector::new(&provider, &store, &progress, Fetcher::new(bar_policy()))
        .with_chunks(chunks.clone())
        .run(&universe, &bar_plan(1))
        .await
        .unwrap();

    let numbers: Vec<usize> = chunks
        .list_chunks()
        .unwrap()
        .into_iter()
        .map(|(n, _)| n)
        .collect();
    assert_eq!(numbers, vec![3, 4, 5]);

    let combined = chunks.read_all_chunks().unwrap();
    assert_eq!(combined.entities(), symbols(&["OLD", "A", "B"]));
}

#[tokio::test(start_paused = true)]
async fn test_key_index_created_after_ingest() {
    let provider = FakeBars::default();
    let store = MemoryTableStore::new();
    let progress = MemoryProgressLog::new();

    BarCollector::new(&provider, &store, &progress, Fetcher::new(bar_policy()))
        .run(&Universe::new(["A"]), &bar_plan(1))
        .await
        .unwrap();

    let executed = store.executed().await;
    assert_eq!(executed.len(), 1);
    assert!(executed[0].starts_with("CREATE INDEX IF NOT EXISTS"));
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_during_inter_batch_delay() {
    let provider = FakeBars::default();
    let store = MemoryTableStore::new();
    let progress = MemoryProgressLog::new();
    let universe = Universe::new(["A", "B", "C"]);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        trigger.cancel();
    });

    let stats = BarCollector::new(
        &provider,
        &store,
        &progress,
        Fetcher::new(bar_policy()).with_cancellation(cancel),
    )
    .run(&universe, &bar_plan(1))
    .await
    .unwrap();

    assert!(stats.interrupted);
    assert_eq!(provider.calls().len(), 1);
    assert_eq!(progress.records().await, vec![symbols(&["A"])]);
}

/// 삽입만 실패하는 저장소.
struct FailingInsertStore {
    inner: MemoryTableStore,
}

#[async_trait]
impl TableStore for FailingInsertStore {
    async fn create_table_if_missing(&self, table: &str) -> marketlake_data::Result<()> {
        self.inner.create_table_if_missing(table).await
    }

    async fn list_columns(&self, table: &str) -> marketlake_data::Result<TableSchema> {
        self.inner.list_columns(table).await
    }

    async fn add_column(
        &self,
        table: &str,
        column: &str,
        ty: ColumnType,
    ) -> marketlake_data::Result<()> {
        self.inner.add_column(table, column, ty).await
    }

    async fn insert_rows(
        &self,
        table: &str,
        _columns: &[(String, ColumnType)],
        _rows: &[Vec<Value>],
    ) -> marketlake_data::Result<u64> {
        Err(DataError::InsertError(format!("{}: disk full", table)))
    }

    async fn execute(&self, sql: &str) -> marketlake_data::Result<u64> {
        self.inner.execute(sql).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_progress_recorded_only_after_ingest() {
    let provider = FakeBars::default();
    let store = FailingInsertStore {
        inner: MemoryTableStore::new(),
    };
    let progress = MemoryProgressLog::new();

    let stats = BarCollector::new(&provider, &store, &progress, Fetcher::new(bar_policy()))
        .run(&Universe::new(["A", "B"]), &bar_plan(2))
        .await
        .unwrap();

    assert_eq!(stats.errors, 2);
    assert_eq!(stats.success, 0);
    assert!(progress.records().await.is_empty());
}

// ── Attribute pipeline ──────────────────────────────────────────────

/// 심볼 × 속성별로 응답을 정할 수 있는 가짜 참조 데이터 프로바이더.
#[derive(Default)]
struct FakeAttributes {
    calls: Mutex<Vec<(Symbol, Attribute)>>,
    failures: HashMap<(String, Attribute), ProviderErrorKind>,
    empty: HashSet<(String, Attribute)>,
}

impl FakeAttributes {
    fn failing(mut self, symbol: &str, attribute: Attribute, kind: ProviderErrorKind) -> Self {
        self.failures.insert((symbol.to_string(), attribute), kind);
        self
    }

    fn empty(mut self, symbol: &str, attribute: Attribute) -> Self {
        self.empty.insert((symbol.to_string(), attribute));
        self
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AttributeProvider for FakeAttributes {
    fn name(&self) -> &str {
        "fake"
    }

    fn supports(&self, _attribute: Attribute) -> bool {
        true
    }

    async fn fetch_attribute(
        &self,
        symbol: &Symbol,
        attribute: Attribute,
    ) -> Result<RawDataset, ProviderError> {
        self.calls.lock().unwrap().push((symbol.clone(), attribute));

        let key = (symbol.to_string(), attribute);
        if let Some(kind) = self.failures.get(&key) {
            return Err(ProviderError::new(*kind, "scripted failure"));
        }
        if self.empty.contains(&key) {
            return Ok(RawDataset::Mapping { entries: vec![] });
        }

        Ok(match attribute {
            Attribute::Overview => RawDataset::Mapping {
                entries: vec![
                    ("Sector".to_string(), Value::from("TECHNOLOGY")),
                    ("PERatio".to_string(), Value::Float(21.5)),
                ],
            },
            Attribute::IncomeStatement | Attribute::BalanceSheet | Attribute::CashFlow => {
                RawDataset::Table {
                    index: vec!["2024-03-31".to_string(), "2023-12-31".to_string()],
                    columns: vec!["totalRevenue".to_string()],
                    cells: vec![vec![Value::Int(120)], vec![Value::Int(100)]],
                }
            }
            Attribute::Dividends | Attribute::Splits | Attribute::TreasuryYield => {
                RawDataset::Series {
                    name: attribute.value_column().to_string(),
                    index: vec![Value::from("2024-01-02"), Value::from("2024-01-03")],
                    values: vec![Value::Float(5.04), Value::Null],
                }
            }
        })
    }
}

fn attribute_plan(attributes: &[Attribute], request_delay: Duration) -> AttributePlan {
    AttributePlan {
        workflow: "test_attributes".to_string(),
        attributes: attributes.to_vec(),
        batch_size: 10,
        request_delay,
    }
}

fn attribute_policy() -> RetryPolicy {
    RetryPolicy::time_budget(Duration::from_secs(100), Duration::from_secs(30))
}

#[tokio::test(start_paused = true)]
async fn test_fundamentals_land_in_per_attribute_tables() {
    let provider = FakeAttributes::default();
    let store = MemoryTableStore::new();
    let progress = MemoryProgressLog::new();

    let stats = AttributeSyncer::new(&provider, &store, &progress, Fetcher::new(attribute_policy()))
        .run(
            &Universe::new(["IBM"]),
            &attribute_plan(&Attribute::FUNDAMENTALS, Duration::ZERO),
        )
        .await
        .unwrap();

    assert_eq!(stats.success, 1);
    assert_eq!(store.row_count("company_overview").await, 2);
    assert_eq!(store.row_count("income_statement").await, 2);
    assert_eq!(store.row_count("balance_sheet").await, 2);
    assert_eq!(store.row_count("cash_flow").await, 2);
    assert_eq!(progress.records().await, vec![symbols(&["IBM"])]);

    let schema = store.schema("income_statement").await.unwrap();
    assert_eq!(schema.column_type("period"), Some(ColumnType::Timestamp));
    assert_eq!(schema.column_type("value"), Some(ColumnType::Integer));
}

#[tokio::test(start_paused = true)]
async fn test_symbol_with_failed_attribute_is_not_recorded() {
    let provider = FakeAttributes::default().failing(
        "MSFT",
        Attribute::BalanceSheet,
        ProviderErrorKind::Malformed,
    );
    let store = MemoryTableStore::new();
    let progress = MemoryProgressLog::new();

    let stats = AttributeSyncer::new(&provider, &store, &progress, Fetcher::new(attribute_policy()))
        .run(
            &Universe::new(["IBM", "MSFT"]),
            &attribute_plan(&Attribute::FUNDAMENTALS, Duration::ZERO),
        )
        .await
        .unwrap();

    assert_eq!(stats.success, 1);
    assert_eq!(stats.errors, 1);
    // 실패한 속성 뒤의 속성도 계속 조회
    assert_eq!(provider.call_count(), 8);
    assert_eq!(progress.records().await, vec![symbols(&["IBM"])]);
}

#[tokio::test(start_paused = true)]
async fn test_all_empty_attributes_count_as_processed() {
    let provider = FakeAttributes::default()
        .empty("NEWCO", Attribute::Dividends)
        .empty("NEWCO", Attribute::Splits);
    let store = MemoryTableStore::new();
    let progress = MemoryProgressLog::new();

    let stats = AttributeSyncer::new(&provider, &store, &progress, Fetcher::new(attribute_policy()))
        .run(
            &Universe::new(["NEWCO"]),
            &attribute_plan(&Attribute::CORPORATE_ACTIONS, Duration::ZERO),
        )
        .await
        .unwrap();

    assert_eq!(stats.empty, 1);
    assert_eq!(progress.records().await, vec![symbols(&["NEWCO"])]);
    assert!(store.table_names().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_request_delay_between_calls() {
    let provider = FakeAttributes::default();
    let store = MemoryTableStore::new();
    let progress = MemoryProgressLog::new();

    let started = tokio::time::Instant::now();
    AttributeSyncer::new(&provider, &store, &progress, Fetcher::new(attribute_policy()))
        .run(
            &Universe::new(["AAPL", "MSFT"]),
            &attribute_plan(&Attribute::CORPORATE_ACTIONS, Duration::from_secs(12)),
        )
        .await
        .unwrap();

    // 호출 4번 사이의 대기 3번
    assert_eq!(provider.call_count(), 4);
    assert_eq!(started.elapsed(), Duration::from_secs(36));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_attribute_respects_time_budget() {
    let provider =
        FakeAttributes::default().failing("IBM", Attribute::Overview, ProviderErrorKind::RateLimited);
    let store = MemoryTableStore::new();
    let progress = MemoryProgressLog::new();

    let stats = AttributeSyncer::new(&provider, &store, &progress, Fetcher::new(attribute_policy()))
        .run(
            &Universe::new(["IBM"]),
            &attribute_plan(&[Attribute::Overview], Duration::ZERO),
        )
        .await
        .unwrap();

    // 0, 30, 60, 90초에 시도. 다음 시도는 120초라 한도 초과
    assert_eq!(provider.call_count(), 4);
    assert_eq!(stats.errors, 1);
    assert!(progress.records().await.is_empty());
}

// ── Treasury ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_treasury_adds_daily_risk_free_rate() {
    let provider = FakeAttributes::default();
    let store = MemoryTableStore::new();

    let stats = TreasurySyncer::new(&provider, &store, Fetcher::new(attribute_policy()))
        .run("3month", "treasury_yields")
        .await
        .unwrap();

    assert_eq!(stats.success, 1);
    assert_eq!(stats.rows_inserted, 2);

    let schema = store.schema("treasury_yields").await.unwrap();
    assert_eq!(schema.column_type(RISK_FREE_RATE_COLUMN), Some(ColumnType::Float));

    let rows = store.rows("treasury_yields").await;
    assert_eq!(rows[0]["symbol"], Value::from("3month"));
    let Value::Float(rate) = rows[0][RISK_FREE_RATE_COLUMN] else {
        panic!("expected float rate");
    };
    assert!((rate - 5.04 / 100.0 / 252.0).abs() < 1e-12);
    assert_eq!(rows[1][RISK_FREE_RATE_COLUMN], Value::Null);
}

#[tokio::test(start_paused = true)]
async fn test_treasury_failure_is_reported_not_raised() {
    let provider = FakeAttributes::default().failing(
        "3month",
        Attribute::TreasuryYield,
        ProviderErrorKind::Unauthorized,
    );
    let store = MemoryTableStore::new();

    let stats = TreasurySyncer::new(&provider, &store, Fetcher::new(attribute_policy()))
        .run("3month", "treasury_yields")
        .await
        .unwrap();

    assert_eq!(stats.errors, 1);
    assert!(store.table_names().await.is_empty());
}
