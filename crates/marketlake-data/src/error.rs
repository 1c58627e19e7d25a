//! 데이터 모듈 오류 타입.

use thiserror::Error;

use crate::provider::ProviderError;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 테이블을 찾을 수 없음
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// 스키마 변경(컬럼 추가) 실패
    #[error("Schema conflict on {table}.{column}: {message}")]
    SchemaConflict {
        table: String,
        column: String,
        message: String,
    },

    /// 데이터 삽입 오류
    #[error("Insert error: {0}")]
    InsertError(String),

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// parquet 읽기/쓰기 오류
    #[error("Parquet error: {0}")]
    ParquetError(String),

    /// 파일 입출력 오류
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// 파싱 오류
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 프로바이더 오류
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                DataError::ConnectionError(err.to_string())
            }
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                if code == "42P01" {
                    // PostgreSQL undefined_table
                    DataError::TableNotFound(db_err.message().to_string())
                } else {
                    DataError::QueryError(db_err.message().to_string())
                }
            }
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<polars::prelude::PolarsError> for DataError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        DataError::ParquetError(err.to_string())
    }
}

impl From<marketlake_core::CoreError> for DataError {
    fn from(err: marketlake_core::CoreError) -> Self {
        DataError::InvalidData(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::ParseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
