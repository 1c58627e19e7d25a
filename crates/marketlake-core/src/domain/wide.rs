//! `(field, entity)` 복합 컬럼 키를 가진 wide 프레임.
//!
//! 다종목 OHLCV 응답은 날짜 인덱스 하나에 종목별 필드 컬럼이 펼쳐진 형태로
//! 들어옵니다. 청크 파일과 un-pivot 모두 이 구조를 기준으로 동작합니다.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::types::Symbol;

/// 청크 파일 컬럼 이름에서 필드와 엔티티를 구분하는 문자.
pub const COLUMN_KEY_SEPARATOR: char = ':';

/// wide 프레임의 복합 컬럼 키.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnKey {
    pub field: String,
    pub entity: Symbol,
}

impl ColumnKey {
    pub fn new(field: impl Into<String>, entity: impl Into<Symbol>) -> Self {
        Self {
            field: field.into(),
            entity: entity.into(),
        }
    }

    /// 평면 컬럼 이름 (`close:AAPL`).
    pub fn label(&self) -> String {
        format!("{}{}{}", self.field, COLUMN_KEY_SEPARATOR, self.entity)
    }

    /// 평면 컬럼 이름을 복합 키로 되돌립니다.
    pub fn parse_label(label: &str) -> Option<Self> {
        let (field, entity) = label.split_once(COLUMN_KEY_SEPARATOR)?;
        if field.is_empty() || entity.trim().is_empty() {
            return None;
        }
        Some(Self::new(field, entity))
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// 하나의 wide 컬럼.
#[derive(Debug, Clone, PartialEq)]
pub struct WideColumn {
    pub key: ColumnKey,
    pub values: Vec<Option<f64>>,
}

/// 날짜 인덱스 + 복합 키 컬럼 테이블.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WideFrame {
    index: Vec<NaiveDateTime>,
    columns: Vec<WideColumn>,
}

impl WideFrame {
    pub fn new(index: Vec<NaiveDateTime>) -> Self {
        Self {
            index,
            columns: Vec::new(),
        }
    }

    /// 컬럼을 추가합니다.
    ///
    /// 같은 키가 이미 있으면 먼저 들어온 컬럼을 유지하고 `false`를 반환합니다.
    pub fn push_column(
        &mut self,
        key: ColumnKey,
        values: Vec<Option<f64>>,
    ) -> CoreResult<bool> {
        if values.len() != self.index.len() {
            return Err(CoreError::InvalidInput(format!(
                "column {} has {} values for an index of {}",
                key,
                values.len(),
                self.index.len()
            )));
        }
        if self.columns.iter().any(|c| c.key == key) {
            return Ok(false);
        }
        self.columns.push(WideColumn { key, values });
        Ok(true)
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn columns(&self) -> &[WideColumn] {
        &self.columns
    }

    pub fn get(&self, field: &str, entity: &Symbol) -> Option<&WideColumn> {
        self.columns
            .iter()
            .find(|c| c.key.field == field && &c.key.entity == entity)
    }

    /// 처음 등장한 순서대로의 엔티티 목록.
    pub fn entities(&self) -> Vec<Symbol> {
        let mut seen = HashSet::new();
        self.columns
            .iter()
            .filter(|c| seen.insert(c.key.entity.clone()))
            .map(|c| c.key.entity.clone())
            .collect()
    }

    /// 처음 등장한 순서대로의 필드 목록.
    pub fn fields(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.columns
            .iter()
            .filter(|c| seen.insert(c.key.field.clone()))
            .map(|c| c.key.field.clone())
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.index.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// 행이나 컬럼이 하나도 없으면 빈 프레임.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    /// 여러 프레임을 컬럼 방향으로 합칩니다.
    ///
    /// 인덱스는 모든 날짜의 합집합(오름차순)이며, 없는 날짜는 `None`으로 채웁니다.
    /// 중복 컬럼 키는 먼저 등장한 프레임의 것만 남습니다.
    pub fn combine<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = WideFrame>,
    {
        let frames: Vec<WideFrame> = frames.into_iter().collect();

        let index: Vec<NaiveDateTime> = frames
            .iter()
            .flat_map(|f| f.index.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let position: BTreeMap<NaiveDateTime, usize> =
            index.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut combined = WideFrame::new(index);
        let mut seen = HashSet::new();

        for frame in frames {
            for column in frame.columns {
                if !seen.insert(column.key.clone()) {
                    continue;
                }
                let mut values = vec![None; combined.index.len()];
                for (date, value) in frame.index.iter().zip(column.values) {
                    if let Some(&row) = position.get(date) {
                        values[row] = value;
                    }
                }
                combined.columns.push(WideColumn {
                    key: column.key,
                    values,
                });
            }
        }

        combined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_column_key_label_roundtrip() {
        let key = ColumnKey::new("adj_close", "BRK-B");
        assert_eq!(key.label(), "adj_close:BRK-B");
        assert_eq!(ColumnKey::parse_label("adj_close:BRK-B"), Some(key));
        assert_eq!(ColumnKey::parse_label("date"), None);
    }

    #[test]
    fn test_push_column_keeps_first_duplicate() {
        let mut frame = WideFrame::new(vec![day(2)]);
        assert!(frame
            .push_column(ColumnKey::new("close", "AAA"), vec![Some(1.0)])
            .unwrap());
        assert!(!frame
            .push_column(ColumnKey::new("close", "AAA"), vec![Some(2.0)])
            .unwrap());

        assert_eq!(frame.column_count(), 1);
        assert_eq!(
            frame.get("close", &Symbol::from("AAA")).unwrap().values,
            vec![Some(1.0)]
        );
    }

    #[test]
    fn test_push_column_length_mismatch() {
        let mut frame = WideFrame::new(vec![day(2), day(3)]);
        let result = frame.push_column(ColumnKey::new("close", "AAA"), vec![Some(1.0)]);
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn test_combine_aligns_dates_and_keeps_first() {
        let mut a = WideFrame::new(vec![day(2), day(3)]);
        a.push_column(ColumnKey::new("close", "AAA"), vec![Some(1.0), Some(2.0)])
            .unwrap();

        let mut b = WideFrame::new(vec![day(3), day(4)]);
        b.push_column(ColumnKey::new("close", "BBB"), vec![Some(10.0), Some(11.0)])
            .unwrap();
        b.push_column(ColumnKey::new("close", "AAA"), vec![Some(99.0), Some(99.0)])
            .unwrap();

        let combined = WideFrame::combine(vec![a, b]);

        assert_eq!(combined.index(), &[day(2), day(3), day(4)]);
        assert_eq!(combined.column_count(), 2);
        assert_eq!(
            combined.get("close", &Symbol::from("AAA")).unwrap().values,
            vec![Some(1.0), Some(2.0), None]
        );
        assert_eq!(
            combined.get("close", &Symbol::from("BBB")).unwrap().values,
            vec![None, Some(10.0), Some(11.0)]
        );
        assert_eq!(combined.entities(), vec![Symbol::from("AAA"), Symbol::from("BBB")]);
    }
}
