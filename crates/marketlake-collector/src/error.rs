//! 에러 타입 정의.

use thiserror::Error;

use marketlake_core::CoreError;
use marketlake_data::DataError;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 데이터 계층 에러 (저장소, 프로바이더, 청크 파일)
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// 도메인 에러
    #[error("Domain error: {0}")]
    Core(#[from] CoreError),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 수집 경로 실행 전제 조건 실패 (예: API 키 없음)
    #[error("Precondition failed: {0}")]
    FatalPrecondition(String),

    /// 운영자 중단
    #[error("Interrupted by operator")]
    Interrupted,

    /// 파일 입출력 에러 (진행 로그, 유니버스 파일)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
