//! 메모리 테이블 저장소.
//!
//! 테스트와 `--dry-run` 실행용입니다. PostgreSQL 구현과 같은 규칙을 따릅니다:
//! 컬럼 추가만 가능하고, 이미 있는 컬럼 추가는 실패하며, 삽입 값은 컬럼
//! 타입과 맞아야 합니다.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;

use super::{TableStore, ID_COLUMN, INGESTED_AT_COLUMN};
use crate::error::{DataError, Result};
use marketlake_core::{ColumnType, TableSchema, Value};

#[derive(Debug, Default)]
struct MemoryTable {
    schema: TableSchema,
    rows: Vec<Vec<Value>>,
    next_id: i64,
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, MemoryTable>,
    schema_changes: usize,
    executed: Vec<String>,
}

/// 메모리 기반 [`TableStore`].
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    state: Mutex<State>,
    rejected_columns: HashSet<String>,
    text_only_columns: HashSet<String>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 해당 이름의 컬럼 추가를 항상 실패시킵니다.
    pub fn with_rejected_column(mut self, column: impl Into<String>) -> Self {
        self.rejected_columns.insert(column.into());
        self
    }

    /// 해당 이름의 컬럼은 TEXT로만 추가할 수 있게 합니다.
    pub fn with_text_only_column(mut self, column: impl Into<String>) -> Self {
        self.text_only_columns.insert(column.into());
        self
    }

    /// 테이블 행 수.
    pub async fn row_count(&self, table: &str) -> usize {
        self.state
            .lock()
            .await
            .tables
            .get(table)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    /// 테이블 스키마.
    pub async fn schema(&self, table: &str) -> Option<TableSchema> {
        self.state
            .lock()
            .await
            .tables
            .get(table)
            .map(|t| t.schema.clone())
    }

    /// 컬럼 이름 → 값 형태의 전체 행.
    pub async fn rows(&self, table: &str) -> Vec<BTreeMap<String, Value>> {
        let state = self.state.lock().await;
        let Some(t) = state.tables.get(table) else {
            return Vec::new();
        };
        t.rows
            .iter()
            .map(|row| {
                t.schema
                    .names()
                    .map(str::to_string)
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// 지금까지 성공한 컬럼 추가 횟수.
    pub async fn schema_changes(&self) -> usize {
        self.state.lock().await.schema_changes
    }

    /// `execute`로 받은 쿼리 목록.
    pub async fn executed(&self) -> Vec<String> {
        self.state.lock().await.executed.clone()
    }

    pub async fn table_names(&self) -> Vec<String> {
        self.state.lock().await.tables.keys().cloned().collect()
    }
}

fn value_fits(value: &Value, ty: ColumnType) -> bool {
    matches!(
        (ty, value),
        (_, Value::Null)
            | (ColumnType::Text, Value::Text(_))
            | (ColumnType::Integer, Value::Int(_))
            | (ColumnType::Float, Value::Float(_))
            | (ColumnType::Float, Value::Int(_))
            | (ColumnType::Boolean, Value::Bool(_))
            | (ColumnType::Timestamp, Value::Timestamp(_))
    )
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn create_table_if_missing(&self, table: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.tables.entry(table.to_string()).or_insert_with(|| {
            let mut schema = TableSchema::default();
            schema.push(ID_COLUMN, ColumnType::Integer);
            schema.push(INGESTED_AT_COLUMN, ColumnType::Timestamp);
            MemoryTable {
                schema,
                rows: Vec::new(),
                next_id: 1,
            }
        });
        Ok(())
    }

    async fn list_columns(&self, table: &str) -> Result<TableSchema> {
        Ok(self
            .state
            .lock()
            .await
            .tables
            .get(table)
            .map(|t| t.schema.clone())
            .unwrap_or_default())
    }

    async fn add_column(&self, table: &str, column: &str, ty: ColumnType) -> Result<()> {
        let conflict = |message: &str| DataError::SchemaConflict {
            table: table.to_string(),
            column: column.to_string(),
            message: message.to_string(),
        };

        if self.rejected_columns.contains(column) {
            return Err(conflict("column name rejected"));
        }
        if ty != ColumnType::Text && self.text_only_columns.contains(column) {
            return Err(conflict("typed column rejected"));
        }

        let mut state = self.state.lock().await;
        let t = state
            .tables
            .get_mut(table)
            .ok_or_else(|| DataError::TableNotFound(table.to_string()))?;
        if t.schema.contains(column) {
            return Err(conflict("column already exists"));
        }

        t.schema.push(column, ty);
        for row in &mut t.rows {
            row.push(Value::Null);
        }
        state.schema_changes += 1;
        Ok(())
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[(String, ColumnType)],
        rows: &[Vec<Value>],
    ) -> Result<u64> {
        let mut state = self.state.lock().await;
        let t = state
            .tables
            .get_mut(table)
            .ok_or_else(|| DataError::TableNotFound(table.to_string()))?;

        let mut positions = Vec::with_capacity(columns.len());
        for (name, _) in columns {
            let pos = t
                .schema
                .names()
                .position(|c| c == name)
                .ok_or_else(|| DataError::InsertError(format!("{}: no column {}", table, name)))?;
            positions.push(pos);
        }

        // 전부 검증한 뒤에 적용
        let width = t.schema.len();
        let mut prepared = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != columns.len() {
                return Err(DataError::InsertError(format!(
                    "{}: row has {} values for {} columns",
                    table,
                    row.len(),
                    columns.len()
                )));
            }
            let mut record = vec![Value::Null; width];
            for ((value, pos), (name, _)) in row.iter().zip(&positions).zip(columns) {
                let ty = t.schema.columns()[*pos].1;
                if !value_fits(value, ty) {
                    return Err(DataError::InsertError(format!(
                        "{}: value {} does not fit {} column {}",
                        table, value, ty, name
                    )));
                }
                record[*pos] = value.clone();
            }
            prepared.push(record);
        }

        let id_pos = t.schema.names().position(|c| c == ID_COLUMN);
        for mut record in prepared {
            if let Some(pos) = id_pos {
                if record[pos].is_null() {
                    record[pos] = Value::Int(t.next_id);
                }
            }
            t.next_id += 1;
            t.rows.push(record);
        }

        Ok(rows.len() as u64)
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        self.state.lock().await.executed.push(sql.to_string());
        Ok(0)
    }
}
