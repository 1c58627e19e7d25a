//! 시장 데이터 배치 수집기.
//!
//! 이 crate는 다음 수집 경로를 제공하는 바이너리와 라이브러리입니다:
//! - 주식 OHLCV (Yahoo Finance, parquet 청크 병행 저장)
//! - 암호화폐 OHLCV (Yahoo Finance)
//! - 재무 데이터 (Alpha Vantage: 개요, 손익, 재무상태, 현금흐름)
//! - 기업 이벤트 (Yahoo Finance: 배당, 분할)
//! - 미국 국채 금리 (Alpha Vantage)
//!
//! 모든 경로는 진행 로그를 참조해 이미 처리된 심볼을 건너뛰므로 중단 후
//! 다시 실행하면 남은 작업만 이어서 처리합니다.

pub mod config;
pub mod context;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::CollectorConfig;
pub use context::CollectorContext;
pub use error::{CollectorError, Result};
pub use stats::CollectionStats;
