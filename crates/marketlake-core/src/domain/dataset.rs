//! 원시 응답, long 포맷 데이터셋, 테이블 스키마.

use serde::{Deserialize, Serialize};

use super::attribute::AttributeKind;
use super::wide::WideFrame;
use crate::error::{CoreError, CoreResult};
use crate::types::{ColumnType, Value};

/// 정규화 이전의 프로바이더 응답.
///
/// 형태별로 태그가 붙어 있으므로 정규화는 런타임 타입 검사 없이 태그로 분기합니다.
#[derive(Debug, Clone, PartialEq)]
pub enum RawDataset {
    /// 평면 key→value 매핑 (입력 순서 유지)
    Mapping { entries: Vec<(String, Value)> },
    /// 이름이 붙은 1차원 시계열
    Series {
        name: String,
        index: Vec<Value>,
        values: Vec<Value>,
    },
    /// 2차원 테이블 (`cells[row][col]`)
    Table {
        index: Vec<String>,
        columns: Vec<String>,
        cells: Vec<Vec<Value>>,
    },
    /// `(field, entity)` 복합 컬럼 테이블
    Wide(WideFrame),
}

impl RawDataset {
    /// 응답 형태에 대응하는 속성 분류.
    pub fn kind(&self) -> AttributeKind {
        match self {
            Self::Mapping { .. } => AttributeKind::ScalarMapping,
            Self::Series { .. } => AttributeKind::TimeSeries,
            Self::Table { .. } => AttributeKind::PeriodicStatement,
            Self::Wide(_) => AttributeKind::WideBars,
        }
    }

    /// 구조는 있지만 행/키가 없는 응답.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Mapping { entries } => entries.is_empty(),
            Self::Series { index, .. } => index.is_empty(),
            Self::Table { index, columns, .. } => index.is_empty() || columns.is_empty(),
            Self::Wide(frame) => frame.is_empty(),
        }
    }
}

/// 하나의 스키마를 공유하는 long 포맷 행 집합.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LongDataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl LongDataset {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// 행을 추가합니다. 컬럼 수가 다르면 에러.
    pub fn push_row(&mut self, row: Vec<Value>) -> CoreResult<()> {
        if row.len() != self.columns.len() {
            return Err(CoreError::InvalidInput(format!(
                "row has {} values, dataset has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// 특정 컬럼의 값들.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().filter_map(move |row| row.get(idx))
    }

    /// 기존 행에서 계산한 값으로 새 컬럼을 추가합니다.
    pub fn add_derived_column<F>(&mut self, name: impl Into<String>, derive: F) -> CoreResult<()>
    where
        F: Fn(&[String], &[Value]) -> Value,
    {
        let name = name.into();
        if self.column_index(&name).is_some() {
            return Err(CoreError::InvalidInput(format!(
                "column {} already exists",
                name
            )));
        }
        for row in &mut self.rows {
            let value = derive(&self.columns, row);
            row.push(value);
        }
        self.columns.push(name);
        Ok(())
    }
}

/// 목적지 테이블의 컬럼 이름 → 저장 타입 (순서 유지).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    columns: Vec<(String, ColumnType)>,
}

impl TableSchema {
    pub fn new(columns: Vec<(String, ColumnType)>) -> Self {
        Self { columns }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|(c, _)| c == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(c, _)| c == name)
            .map(|(_, ty)| *ty)
    }

    /// 컬럼을 추가합니다. 이미 있으면 아무것도 하지 않습니다.
    pub fn push(&mut self, name: impl Into<String>, ty: ColumnType) {
        let name = name.into();
        if !self.contains(&name) {
            self.columns.push((name, ty));
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(c, _)| c.as_str())
    }

    pub fn columns(&self) -> &[(String, ColumnType)] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
