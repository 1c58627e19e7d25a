//! 목적지 테이블 저장소.
//!
//! 적재기는 [`TableStore`] trait에만 의존합니다. 운영에서는 PostgreSQL,
//! 테스트와 dry-run에서는 메모리 구현을 씁니다.

pub mod chunk;
pub mod ingest;
pub mod memory;
pub mod postgres;

pub use chunk::ChunkStore;
pub use ingest::{IngestResult, SchemaIngestor};
pub use memory::MemoryTableStore;
pub use postgres::{DatabaseConfig, PgTableStore};

use async_trait::async_trait;

use crate::error::Result;
use marketlake_core::{ColumnType, TableSchema, Value};

/// 테이블마다 만들어지는 식별 컬럼.
pub const ID_COLUMN: &str = "id";
/// 적재 시각 컬럼.
pub const INGESTED_AT_COLUMN: &str = "ingested_at";

/// 컬럼 추가만 허용하는 관계형 저장소.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// 식별 컬럼만 가진 테이블을 없으면 만듭니다.
    async fn create_table_if_missing(&self, table: &str) -> Result<()>;

    /// 현재 컬럼 목록 (순서 유지).
    async fn list_columns(&self, table: &str) -> Result<TableSchema>;

    /// 컬럼을 추가합니다. 이미 있거나 이름을 쓸 수 없으면 실패합니다.
    async fn add_column(&self, table: &str, column: &str, ty: ColumnType) -> Result<()>;

    /// 컬럼 이름 기준으로 행을 삽입합니다.
    ///
    /// 한 호출의 모든 행은 전부 적용되거나 전부 실패합니다.
    async fn insert_rows(
        &self,
        table: &str,
        columns: &[(String, ColumnType)],
        rows: &[Vec<Value>],
    ) -> Result<u64>;

    /// 임의의 집합 연산 쿼리를 실행하고 영향받은 행 수를 돌려줍니다.
    async fn execute(&self, sql: &str) -> Result<u64>;
}

/// SQL 식별자를 큰따옴표로 감쌉니다.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("close"), "\"close\"");
        assert_eq!(quote_ident("adj\"close"), "\"adj\"\"close\"");
        assert_eq!(quote_ident("order"), "\"order\"");
    }
}
