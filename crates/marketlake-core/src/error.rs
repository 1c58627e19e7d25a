//! 핵심 도메인 에러 타입.

use thiserror::Error;

/// 도메인 타입 생성/변환 에러.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// 배치 크기는 1 이상이어야 함
    #[error("invalid batch size: {0} (must be positive)")]
    InvalidBatchSize(i64),

    /// 잘못된 입력
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// 도메인 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;
