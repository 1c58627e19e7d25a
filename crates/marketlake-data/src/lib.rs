//! 시장 데이터 수집과 적재.
//!
//! 이 crate는 다음을 제공합니다:
//! - 프로바이더 추상화와 구현 (Yahoo Finance, Alpha Vantage)
//! - rate limit을 인지하는 재시도 fetcher
//! - 원시 응답을 long 포맷으로 바꾸는 정규화
//! - 스키마를 점진적으로 확장하는 적재기 (PostgreSQL / 메모리)
//! - 배치 결과를 parquet 청크로 보관하는 청크 저장소

pub mod error;
pub mod fetch;
pub mod normalize;
pub mod provider;
pub mod storage;

pub use error::{DataError, Result};
pub use fetch::{FetchResult, Fetched, Fetcher, RetryBudget, RetryPolicy};
pub use normalize::{normalize, unpivot_bars, DATE_COLUMN, INDEX_KEY_COLUMN, SYMBOL_COLUMN};

// 프로바이더 재내보내기
pub use provider::{
    AlphaVantageProvider, AttributeProvider, BarProvider, BarRequest, ProviderError,
    ProviderErrorKind, StatementPeriod, YahooProvider,
};

// 저장소 재내보내기
pub use storage::{
    quote_ident, ChunkStore, DatabaseConfig, IngestResult, MemoryTableStore, PgTableStore,
    SchemaIngestor, TableStore,
};
