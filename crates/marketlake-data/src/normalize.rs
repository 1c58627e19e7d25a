//! 원시 응답을 long 포맷으로 정규화.
//!
//! 형태 태그별 규칙:
//! - 매핑: 키마다 `(symbol, field, value)` 한 행
//! - 시계열: 인덱스 항목마다 `(symbol, date, <값 컬럼>)` 한 행. 날짜가 아닌
//!   키는 `date`를 비우고 `index_key`에 원래 키를 남김
//! - 재무제표: `(symbol, metric, period, value)`로 기간을 행으로 펼침.
//!   날짜로 해석되지 않는 기간 라벨의 행은 버림
//! - wide OHLCV: `(date, symbol, 필드...)`로 un-pivot, `(date, symbol)`마다 한 행

use tracing::debug;

use crate::error::{DataError, Result};
use marketlake_core::{
    parse_timestamp, AttributeKind, LongDataset, RawDataset, Symbol, Value, WideFrame,
};

/// 엔티티 키 컬럼 이름.
pub const SYMBOL_COLUMN: &str = "symbol";
/// 날짜 컬럼 이름.
pub const DATE_COLUMN: &str = "date";
/// 날짜로 해석되지 않는 시계열 인덱스 키를 담는 컬럼 이름.
pub const INDEX_KEY_COLUMN: &str = "index_key";

/// 원시 응답을 정규화합니다.
///
/// `kind`는 응답 태그와 일치해야 합니다. wide 응답은 엔티티가 컬럼 키에
/// 들어 있으므로 `entity`를 쓰지 않습니다.
pub fn normalize(raw: RawDataset, kind: AttributeKind, entity: &Symbol) -> Result<LongDataset> {
    if raw.kind() != kind {
        return Err(DataError::InvalidData(format!(
            "{} response cannot be normalized as {}",
            raw.kind(),
            kind
        )));
    }

    match raw {
        RawDataset::Mapping { entries } => normalize_mapping(entries, entity),
        RawDataset::Series {
            name,
            index,
            values,
        } => normalize_series(&name, index, values, entity),
        RawDataset::Table {
            index,
            columns,
            cells,
        } => normalize_statement(index, columns, cells, entity),
        RawDataset::Wide(frame) => unpivot_bars(&frame),
    }
}

fn normalize_mapping(entries: Vec<(String, Value)>, entity: &Symbol) -> Result<LongDataset> {
    let mut dataset = LongDataset::new([SYMBOL_COLUMN, "field", "value"]);
    for (field, value) in entries {
        dataset.push_row(vec![Value::from(entity.as_str()), Value::Text(field), value])?;
    }
    Ok(dataset)
}

fn normalize_series(
    name: &str,
    index: Vec<Value>,
    values: Vec<Value>,
    entity: &Symbol,
) -> Result<LongDataset> {
    if index.len() != values.len() {
        return Err(DataError::InvalidData(format!(
            "series {} has {} index entries and {} values",
            name,
            index.len(),
            values.len()
        )));
    }

    let dates: Vec<Option<Value>> = index.iter().map(index_timestamp).collect();
    let unparsed = dates.iter().filter(|d| d.is_none()).count();

    let mut columns = vec![SYMBOL_COLUMN, DATE_COLUMN, name];
    if unparsed > 0 {
        debug!(symbol = %entity, series = name, unparsed, "날짜가 아닌 인덱스 항목은 원래 키로 보존");
        columns.push(INDEX_KEY_COLUMN);
    }

    let mut dataset = LongDataset::new(columns);
    for ((key, date), value) in index.into_iter().zip(dates).zip(values) {
        let mut row = vec![Value::from(entity.as_str())];
        if unparsed > 0 {
            let raw_key = match &date {
                Some(_) => Value::Null,
                None => Value::from(key.render()),
            };
            row.extend([date.unwrap_or(Value::Null), value, raw_key]);
        } else {
            row.extend([date.unwrap_or(Value::Null), value]);
        }
        dataset.push_row(row)?;
    }

    Ok(dataset)
}

fn normalize_statement(
    index: Vec<String>,
    columns: Vec<String>,
    cells: Vec<Vec<Value>>,
    entity: &Symbol,
) -> Result<LongDataset> {
    if cells.len() != index.len() {
        return Err(DataError::InvalidData(format!(
            "statement has {} index labels and {} rows",
            index.len(),
            cells.len()
        )));
    }

    let mut dataset = LongDataset::new([SYMBOL_COLUMN, "metric", "period", "value"]);
    let mut dropped = 0usize;

    for (label, row) in index.iter().zip(cells) {
        let Some(period) = parse_timestamp(label) else {
            dropped += 1;
            continue;
        };
        if row.len() != columns.len() {
            return Err(DataError::InvalidData(format!(
                "statement row {} has {} cells for {} columns",
                label,
                row.len(),
                columns.len()
            )));
        }
        for (metric, value) in columns.iter().zip(row) {
            dataset.push_row(vec![
                Value::from(entity.as_str()),
                Value::from(metric.as_str()),
                Value::Timestamp(period),
                value,
            ])?;
        }
    }

    if dropped > 0 {
        debug!(symbol = %entity, dropped, "기간 라벨이 날짜가 아닌 행 제외");
    }
    Ok(dataset)
}

/// wide OHLCV 프레임을 `(date, symbol)` 단위 행으로 펼칩니다.
///
/// 모든 필드가 비어 있는 `(date, symbol)` 조합은 만들지 않습니다.
pub fn unpivot_bars(frame: &WideFrame) -> Result<LongDataset> {
    let fields = frame.fields();
    let entities = frame.entities();

    let mut columns = vec![DATE_COLUMN.to_string(), SYMBOL_COLUMN.to_string()];
    columns.extend(fields.iter().cloned());
    let mut dataset = LongDataset::new(columns);

    for (row, date) in frame.index().iter().enumerate() {
        for entity in &entities {
            let values: Vec<Option<f64>> = fields
                .iter()
                .map(|field| {
                    frame
                        .get(field, entity)
                        .and_then(|c| c.values.get(row).copied().flatten())
                })
                .collect();
            if values.iter().all(Option::is_none) {
                continue;
            }

            let mut record = Vec::with_capacity(values.len() + 2);
            record.push(Value::Timestamp(*date));
            record.push(Value::from(entity.as_str()));
            record.extend(values.into_iter().map(Value::from));
            dataset.push_row(record)?;
        }
    }

    Ok(dataset)
}

fn index_timestamp(key: &Value) -> Option<Value> {
    match key {
        Value::Timestamp(ts) => Some(Value::Timestamp(*ts)),
        Value::Text(s) => parse_timestamp(s).map(Value::Timestamp),
        _ => None,
    }
}
