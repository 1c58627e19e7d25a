//! parquet 청크 저장소.
//!
//! 주식 OHLCV 배치 결과를 배치마다 하나의 parquet 파일로 남기고,
//! 나중에 디렉터리의 청크를 모두 읽어 하나의 산출물로 합칩니다.
//!
//! 파일 레이아웃: `{dir}/{prefix}_chunk_{n}.parquet` (snappy 압축)
//! 컬럼: `date` (Datetime ms) + `{field}:{symbol}` (f64)

use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{DataError, Result};
use marketlake_core::{ColumnKey, WideFrame};

const DATE_COLUMN: &str = "date";
const EXTENSION: &str = "parquet";

/// 청크 파일 디렉터리.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    dir: PathBuf,
    prefix: String,
}

impl ChunkStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `n`번 청크 파일 경로.
    pub fn chunk_path(&self, n: usize) -> PathBuf {
        self.dir
            .join(format!("{}_chunk_{}.{}", self.prefix, n, EXTENSION))
    }

    /// 파일 이름에서 청크 번호를 읽습니다.
    fn chunk_number(&self, file_name: &str) -> Option<usize> {
        file_name
            .strip_prefix(&self.prefix)?
            .strip_prefix("_chunk_")?
            .strip_suffix(&format!(".{}", EXTENSION))?
            .parse()
            .ok()
    }

    /// 디렉터리의 청크 파일 목록 (번호 오름차순).
    pub fn list_chunks(&self) -> Result<Vec<(usize, PathBuf)>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut chunks = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(n) = name.to_str().and_then(|s| self.chunk_number(s)) {
                chunks.push((n, entry.path()));
            }
        }
        chunks.sort_by_key(|(n, _)| *n);
        Ok(chunks)
    }

    /// 다음에 쓸 청크 번호. 기존 번호 다음부터 이어서 매깁니다.
    pub fn next_chunk_index(&self) -> Result<usize> {
        Ok(self
            .list_chunks()?
            .last()
            .map(|(n, _)| n + 1)
            .unwrap_or(1))
    }

    /// 청크 하나를 기록합니다.
    pub fn write_chunk(&self, n: usize, frame: &WideFrame) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.chunk_path(n);
        write_frame(frame, &path)?;

        debug!(
            path = %path.display(),
            rows = frame.row_count(),
            columns = frame.column_count(),
            "청크 저장"
        );
        Ok(path)
    }

    /// 모든 청크를 읽어 하나로 합칩니다.
    ///
    /// 읽지 못한 청크는 경고만 남기고 건너뜁니다. 중복 컬럼은 앞 청크의 것을 유지합니다.
    pub fn read_all_chunks(&self) -> Result<WideFrame> {
        let chunks = self.list_chunks()?;
        let mut frames = Vec::with_capacity(chunks.len());

        for (n, path) in &chunks {
            match read_frame(path) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    warn!(chunk = n, path = %path.display(), error = %e, "청크 읽기 실패, 건너뜀");
                }
            }
        }

        let combined = WideFrame::combine(frames);
        info!(
            chunks = chunks.len(),
            rows = combined.row_count(),
            columns = combined.column_count(),
            "청크 결합 완료"
        );
        Ok(combined)
    }

    /// 결합된 프레임을 단일 파일로 기록합니다.
    pub fn write_combined(&self, frame: &WideFrame, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        write_frame(frame, path)?;
        info!(path = %path.display(), rows = frame.row_count(), "결합 파일 저장");
        Ok(())
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

/// WideFrame을 Polars DataFrame으로 변환.
fn frame_to_dataframe(frame: &WideFrame) -> Result<DataFrame> {
    let millis: Vec<i64> = frame
        .index()
        .iter()
        .map(|ts| ts.and_utc().timestamp_millis())
        .collect();

    let mut columns = Vec::with_capacity(frame.column_count() + 1);
    columns.push(
        Column::new(DATE_COLUMN.into(), millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
    );
    for column in frame.columns() {
        columns.push(Column::new(
            column.key.label().as_str().into(),
            column.values.clone(),
        ));
    }

    DataFrame::new(columns).map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

/// Polars DataFrame을 WideFrame으로 변환.
fn dataframe_to_frame(df: &DataFrame) -> Result<WideFrame> {
    let dates = df
        .column(DATE_COLUMN)
        .map_err(|e| DataError::ParquetError(format!("missing date column: {e}")))?
        .cast(&DataType::Int64)
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;
    let dates = dates
        .i64()
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;

    let mut index = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let ms = dates
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        let ts = chrono::DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| DataError::ParquetError(format!("invalid date at row {i}")))?;
        index.push(ts.naive_utc());
    }

    let mut frame = WideFrame::new(index);
    for column in df.get_columns() {
        if column.name().as_str() == DATE_COLUMN {
            continue;
        }
        let Some(key) = ColumnKey::parse_label(column.name().as_str()) else {
            debug!(column = %column.name(), "알 수 없는 컬럼 무시");
            continue;
        };
        let values = column
            .cast(&DataType::Float64)
            .map_err(|e| DataError::ParquetError(format!("{} column type: {e}", key)))?;
        let values = values
            .f64()
            .map_err(|e| DataError::ParquetError(format!("{} column type: {e}", key)))?;
        frame.push_column(key, values.into_iter().collect())?;
    }

    Ok(frame)
}

/// Write a DataFrame to a snappy-compressed Parquet file.
fn write_frame(frame: &WideFrame, path: &Path) -> Result<()> {
    let mut df = frame_to_dataframe(frame)?;
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Snappy)
        .finish(&mut df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn read_frame(path: &Path) -> Result<WideFrame> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;
    dataframe_to_frame(&df)
}
