//! 셀 값, 컬럼 저장 타입, 타입 추론.
//!
//! 프로바이더 응답은 숫자/문자열/날짜가 섞여 들어오므로 모든 셀은 `Value`로
//! 표현하고, 테이블 컬럼의 저장 타입은 값 도메인을 샘플링하여 추론합니다.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 컬럼 저장 타입.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
}

impl ColumnType {
    /// PostgreSQL 컬럼 타입 이름.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "BIGINT",
            Self::Float => "DOUBLE PRECISION",
            Self::Boolean => "BOOLEAN",
            Self::Timestamp => "TIMESTAMP",
        }
    }

    /// `information_schema.columns.data_type` 값을 저장 타입으로 매핑합니다.
    ///
    /// 알 수 없는 타입은 `Text`로 취급합니다.
    pub fn from_sql_type(data_type: &str) -> Self {
        match data_type.trim().to_lowercase().as_str() {
            "bigint" | "integer" | "smallint" | "int8" | "int4" | "int2" => Self::Integer,
            "double precision" | "real" | "numeric" | "float8" | "float4" | "decimal" => {
                Self::Float
            }
            "boolean" | "bool" => Self::Boolean,
            "date"
            | "timestamp"
            | "timestamptz"
            | "timestamp without time zone"
            | "timestamp with time zone" => Self::Timestamp,
            _ => Self::Text,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}

/// 하나의 셀 값.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// 프로바이더가 문자열로 보내는 값을 가장 구체적인 타입으로 해석합니다.
    ///
    /// - 빈 문자열, `None`, `null`, `NaN`, `-`, `.` → `Null`
    /// - 정수/실수 문자열 → `Int`/`Float`
    /// - `true`/`false` → `Bool`
    /// - 그 외 → `Text` (날짜 해석은 하지 않음, 추론 단계에서 처리)
    pub fn parse_lenient(raw: &str) -> Self {
        let s = raw.trim();
        match s {
            "" | "None" | "none" | "null" | "NULL" | "NaN" | "nan" | "-" | "." => {
                return Self::Null
            }
            "true" | "True" | "TRUE" => return Self::Bool(true),
            "false" | "False" | "FALSE" => return Self::Bool(false),
            _ => {}
        }

        if let Ok(i) = s.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            if f.is_finite() {
                return Self::Float(f);
            }
        }
        Self::Text(s.to_string())
    }

    /// 저장용 문자열 표현.
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Timestamp(ts) => Some(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    /// 컬럼 저장 타입에 맞게 값을 변환합니다.
    ///
    /// 표현할 수 없는 조합이면 `None`을 반환합니다. `Text` 컬럼은 모든 값을 받습니다.
    pub fn coerce_to(&self, ty: ColumnType) -> Option<Value> {
        if self.is_null() {
            return Some(Self::Null);
        }

        match (ty, self) {
            (ColumnType::Text, v) => v.render().map(Self::Text),

            (ColumnType::Integer, Self::Int(i)) => Some(Self::Int(*i)),
            (ColumnType::Integer, Self::Float(f)) if is_integral(*f) => Some(Self::Int(*f as i64)),
            (ColumnType::Integer, Self::Text(s)) => s.trim().parse().ok().map(Self::Int),

            (ColumnType::Float, Self::Int(i)) => Some(Self::Float(*i as f64)),
            (ColumnType::Float, Self::Float(f)) => Some(Self::Float(*f)),
            (ColumnType::Float, Self::Text(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Self::Float),

            (ColumnType::Boolean, Self::Bool(b)) => Some(Self::Bool(*b)),
            (ColumnType::Boolean, Self::Text(s)) => match s.trim().to_lowercase().as_str() {
                "true" => Some(Self::Bool(true)),
                "false" => Some(Self::Bool(false)),
                _ => None,
            },

            (ColumnType::Timestamp, Self::Timestamp(ts)) => Some(Self::Timestamp(*ts)),
            (ColumnType::Timestamp, Self::Text(s)) => parse_timestamp(s).map(Self::Timestamp),

            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render() {
            Some(s) => f.write_str(&s),
            None => f.write_str("NULL"),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        if v.is_finite() {
            Self::Float(v)
        } else {
            Self::Null
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

fn is_integral(f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64
}

/// 컬럼 추론 시 기본 샘플 크기.
pub const DEFAULT_INFERENCE_SAMPLE: usize = 1_000;

/// 값 도메인을 샘플링하여 저장 타입을 추론합니다.
///
/// NULL은 무시하며, 앞에서부터 최대 `sample`개의 non-null 값만 봅니다.
/// - 모두 `Int` → `Integer`
/// - 모두 숫자이고 `Float`가 하나라도 있음 → `Float`
/// - 모두 `Bool` → `Boolean`
/// - 모두 `Timestamp`이거나 날짜로 해석되는 문자열 → `Timestamp`
/// - 그 외 (혼합, 일반 문자열, non-null 값 없음) → `Text`
pub fn infer_column_type<'a, I>(values: I, sample: usize) -> ColumnType
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut seen = 0usize;
    let mut ints = 0usize;
    let mut floats = 0usize;
    let mut bools = 0usize;
    let mut timestamps = 0usize;

    for value in values.into_iter().filter(|v| !v.is_null()).take(sample) {
        seen += 1;
        match value {
            Value::Int(_) => ints += 1,
            Value::Float(_) => floats += 1,
            Value::Bool(_) => bools += 1,
            Value::Timestamp(_) => timestamps += 1,
            Value::Text(s) if parse_timestamp(s).is_some() => timestamps += 1,
            Value::Text(_) => return ColumnType::Text,
            Value::Null => {}
        }
    }

    if seen == 0 {
        ColumnType::Text
    } else if ints == seen {
        ColumnType::Integer
    } else if ints + floats == seen {
        ColumnType::Float
    } else if bools == seen {
        ColumnType::Boolean
    } else if timestamps == seen {
        ColumnType::Timestamp
    } else {
        ColumnType::Text
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// 문자열을 날짜/시각으로 해석합니다.
///
/// ISO 날짜/시각, RFC 3339, 슬래시 날짜, 분기 라벨(`Q1 2023`, `2023Q1`, `2023-Q1`)을
/// 지원합니다. 분기 라벨은 분기 말일 00:00으로 해석합니다.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.len() < 6 {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    parse_quarter_label(s)
}

fn parse_quarter_label(s: &str) -> Option<NaiveDateTime> {
    let upper = s.to_uppercase().replace(['-', ' '], "");
    let (quarter, year) = if let Some(rest) = upper.strip_prefix('Q') {
        // Q12023
        (rest.get(..1)?, rest.get(1..)?)
    } else {
        // 2023Q1
        let idx = upper.find('Q')?;
        (upper.get(idx + 1..)?, upper.get(..idx)?)
    };

    let quarter: u32 = quarter.parse().ok()?;
    let year: i32 = year.parse().ok()?;
    if !(1..=4).contains(&quarter) || year.to_string().len() != 4 {
        return None;
    }

    let end = match quarter {
        1 => NaiveDate::from_ymd_opt(year, 3, 31),
        2 => NaiveDate::from_ymd_opt(year, 6, 30),
        3 => NaiveDate::from_ymd_opt(year, 9, 30),
        _ => NaiveDate::from_ymd_opt(year, 12, 31),
    }?;
    end.and_hms_opt(0, 0, 0)
}
