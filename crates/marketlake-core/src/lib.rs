//! # MarketLake Core
//!
//! 시장 데이터 수집 파이프라인의 핵심 도메인 타입을 제공합니다.
//!
//! 이 크레이트는 I/O 없이 파이프라인 전반에서 공유되는 타입을 정의합니다:
//! - 심볼, 유니버스, 배치 분할
//! - 셀 값과 컬럼 저장 타입 추론
//! - 프로바이더 원시 응답(`RawDataset`)과 정규화된 long 포맷(`LongDataset`)
//! - 테이블 스키마
//! - 로깅 인프라

pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
