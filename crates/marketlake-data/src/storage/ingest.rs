//! 스키마를 점진적으로 확장하는 적재기.
//!
//! # 동작 방식
//!
//! 1. 테이블이 없으면 식별 컬럼만으로 생성
//! 2. 현재 컬럼 목록 조회
//! 3. 테이블에 없는 컬럼마다 값 도메인으로 타입을 추론해서 추가
//!    (`typed 추가 → 실패 시 TEXT 추가 → 실패 시 건너뜀`)
//! 4. 컬럼 목록 재조회
//! 5. 테이블에 존재하는 컬럼으로만 행을 투영해서 이름 기준으로 삽입
//!
//! 이미 있는 컬럼의 타입으로 변환할 수 없는 값은 `{column}_text` TEXT 컬럼에
//! 저장합니다. 이 컬럼도 같은 상태 머신으로 추가되며, 원래 컬럼에는 NULL이
//! 들어갑니다. 추가에 실패한 컬럼의 값은 버려집니다. 삽입 오류는 호출자에게
//! 전파됩니다.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::TableStore;
use crate::error::Result;
use marketlake_core::{
    infer_column_type, ColumnType, LongDataset, Value, DEFAULT_INFERENCE_SAMPLE,
};

/// 적재 결과.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestResult {
    pub rows_inserted: u64,
    /// 새로 추가된 컬럼 수 (TEXT로 대체된 컬럼 포함)
    pub columns_added: usize,
    /// 추론 타입으로 추가하지 못해 TEXT로 추가된 컬럼
    pub columns_degraded: Vec<String>,
    /// 추가하지 못해 값이 버려진 컬럼
    pub columns_skipped: Vec<String>,
    /// 기존 컬럼 타입으로 변환할 수 없어 `{column}_text` 컬럼에 저장된 값 수
    pub values_preserved_as_text: u64,
    /// 변환도 보존도 하지 못해 버려진 값 수
    pub values_dropped: u64,
}

/// 타입 충돌 값을 보존하는 TEXT 컬럼 이름.
pub fn text_column_name(column: &str) -> String {
    format!("{}_text", column)
}

/// 컬럼 하나의 스키마 변경 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnOutcome {
    Added(ColumnType),
    Degraded,
    Skipped,
}

/// 스키마 확장 적재기.
pub struct SchemaIngestor<'a, S: TableStore + ?Sized> {
    store: &'a S,
    sample: usize,
}

impl<'a, S: TableStore + ?Sized> SchemaIngestor<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            sample: DEFAULT_INFERENCE_SAMPLE,
        }
    }

    /// 타입 추론에 쓰는 non-null 샘플 수.
    pub fn with_sample_size(mut self, sample: usize) -> Self {
        self.sample = sample.max(1);
        self
    }

    /// long 데이터셋을 테이블에 적재합니다.
    pub async fn ingest(&self, dataset: &LongDataset, table: &str) -> Result<IngestResult> {
        let mut result = IngestResult::default();
        if dataset.is_empty() {
            debug!(table = table, "빈 데이터셋, 적재 생략");
            return Ok(result);
        }

        self.store.create_table_if_missing(table).await?;
        let existing = self.store.list_columns(table).await?;

        for (idx, column) in dataset.columns().iter().enumerate() {
            if existing.contains(column) {
                continue;
            }

            let proposed = infer_column_type(dataset.column_values(idx), self.sample);
            match self.evolve_column(table, column, proposed).await {
                ColumnOutcome::Added(_) => result.columns_added += 1,
                ColumnOutcome::Degraded => {
                    result.columns_added += 1;
                    result.columns_degraded.push(column.clone());
                }
                ColumnOutcome::Skipped => result.columns_skipped.push(column.clone()),
            }
        }

        let mut schema = self.store.list_columns(table).await?;

        let projection: Vec<(usize, String, ColumnType)> = dataset
            .columns()
            .iter()
            .enumerate()
            .filter_map(|(idx, name)| {
                schema
                    .column_type(name)
                    .map(|ty| (idx, name.clone(), ty))
            })
            .collect();

        if projection.is_empty() {
            warn!(table = table, "적재할 수 있는 컬럼 없음");
            return Ok(result);
        }

        // 기존 컬럼 타입과 맞지 않는 값은 `{column}_text` 컬럼에 보존
        let conflicts: Vec<usize> = projection
            .iter()
            .enumerate()
            .filter(|(_, (idx, _, ty))| {
                *ty != ColumnType::Text
                    && dataset
                        .column_values(*idx)
                        .any(|v| v.coerce_to(*ty).is_none())
            })
            .map(|(p, _)| p)
            .collect();

        let mut added_text_column = false;
        for &p in &conflicts {
            let (_, name, ty) = &projection[p];
            let text_column = text_column_name(name);
            if schema.contains(&text_column) || dataset.column_index(&text_column).is_some() {
                continue;
            }

            warn!(
                table = table,
                column = %name,
                column_type = %ty,
                text_column = %text_column,
                "컬럼 타입과 맞지 않는 값, TEXT 컬럼으로 보존"
            );
            match self.evolve_column(table, &text_column, ColumnType::Text).await {
                ColumnOutcome::Skipped => result.columns_skipped.push(text_column),
                _ => {
                    result.columns_added += 1;
                    added_text_column = true;
                }
            }
        }
        if added_text_column {
            schema = self.store.list_columns(table).await?;
        }

        let mut columns: Vec<(String, ColumnType)> = projection
            .iter()
            .map(|(_, name, ty)| (name.clone(), *ty))
            .collect();
        let mut text_slot: Vec<Option<usize>> = vec![None; projection.len()];
        for &p in &conflicts {
            let text_column = text_column_name(&projection[p].1);
            if dataset.column_index(&text_column).is_some() {
                continue;
            }
            if let Some(ty) = schema.column_type(&text_column) {
                text_slot[p] = Some(columns.len());
                columns.push((text_column, ty));
            }
        }

        let mut dropped_by_column = vec![0u64; projection.len()];
        let rows: Vec<Vec<Value>> = dataset
            .rows()
            .iter()
            .map(|row| {
                let mut record = vec![Value::Null; columns.len()];
                for (p, (idx, _, ty)) in projection.iter().enumerate() {
                    let value = &row[*idx];
                    if let Some(coerced) = value.coerce_to(*ty) {
                        record[p] = coerced;
                        continue;
                    }
                    match text_slot[p].and_then(|slot| {
                        value.coerce_to(columns[slot].1).map(|v| (slot, v))
                    }) {
                        Some((slot, text)) => {
                            record[slot] = text;
                            result.values_preserved_as_text += 1;
                        }
                        None => dropped_by_column[p] += 1,
                    }
                }
                record
            })
            .collect();

        for ((_, name, ty), dropped) in projection.iter().zip(&dropped_by_column) {
            if *dropped > 0 {
                warn!(
                    table = table,
                    column = %name,
                    column_type = %ty,
                    dropped = *dropped,
                    "보존할 TEXT 컬럼이 없어 값을 버림"
                );
            }
        }
        result.values_dropped = dropped_by_column.iter().sum();

        result.rows_inserted = self.store.insert_rows(table, &columns, &rows).await?;

        info!(
            table = table,
            rows = result.rows_inserted,
            columns_added = result.columns_added,
            degraded = result.columns_degraded.len(),
            skipped = result.columns_skipped.len(),
            preserved_as_text = result.values_preserved_as_text,
            "적재 완료"
        );

        Ok(result)
    }

    /// 컬럼 추가 상태 머신: typed 추가 → TEXT 추가 → 건너뜀.
    async fn evolve_column(&self, table: &str, column: &str, proposed: ColumnType) -> ColumnOutcome {
        debug!(table = table, column = column, proposed = %proposed, "컬럼 타입 제안");

        let typed_error = match self.store.add_column(table, column, proposed).await {
            Ok(()) => {
                info!(table = table, column = column, column_type = %proposed, "컬럼 추가");
                return ColumnOutcome::Added(proposed);
            }
            Err(e) => e,
        };

        if proposed == ColumnType::Text {
            warn!(table = table, column = column, error = %typed_error, "컬럼 추가 실패, 건너뜀");
            return ColumnOutcome::Skipped;
        }

        warn!(
            table = table,
            column = column,
            column_type = %proposed,
            error = %typed_error,
            "컬럼 추가 실패, TEXT로 재시도"
        );

        match self.store.add_column(table, column, ColumnType::Text).await {
            Ok(()) => {
                info!(table = table, column = column, "컬럼을 TEXT로 추가");
                ColumnOutcome::Degraded
            }
            Err(e) => {
                warn!(table = table, column = column, error = %e, "TEXT 컬럼 추가 실패, 건너뜀");
                ColumnOutcome::Skipped
            }
        }
    }
}
