//! 처리 완료 심볼 진행 로그.
//!
//! 재실행 시 이미 적재된 심볼을 건너뛰기 위한 append-only 기록입니다.
//! 심볼은 해당 배치(또는 심볼)의 적재가 끝난 뒤에만 기록하므로, 기록된
//! 심볼은 항상 저장소에 데이터가 있거나 조회 결과가 비어 있던 심볼입니다.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use marketlake_core::Symbol;

/// 처리 완료 심볼 집합의 영속 저장소.
#[async_trait]
pub trait ProgressLog: Send + Sync {
    /// 지금까지 기록된 심볼 집합.
    async fn load(&self) -> Result<BTreeSet<Symbol>>;

    /// 심볼들을 처리 완료로 기록합니다. 반환 전에 내구성 있게 저장되어야 합니다.
    async fn record(&self, processed: &[Symbol]) -> Result<()>;
}

/// 한 줄에 심볼 하나씩 덧붙이는 파일 진행 로그.
#[derive(Debug, Clone)]
pub struct FileProgressLog {
    path: PathBuf,
}

impl FileProgressLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProgressLog for FileProgressLog {
    async fn load(&self) -> Result<BTreeSet<Symbol>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };

        let processed: BTreeSet<Symbol> = content
            .lines()
            .map(Symbol::new)
            .filter(|s| !s.is_empty())
            .collect();

        debug!(path = %self.path.display(), count = processed.len(), "진행 로그 로드");
        Ok(processed)
    }

    async fn record(&self, processed: &[Symbol]) -> Result<()> {
        if processed.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut buf = String::new();
        for symbol in processed {
            buf.push_str(symbol.as_str());
            buf.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.sync_data().await?;

        debug!(path = %self.path.display(), count = processed.len(), "진행 로그 기록");
        Ok(())
    }
}

/// 메모리 진행 로그 (테스트, dry-run).
#[derive(Debug, Default)]
pub struct MemoryProgressLog {
    processed: Mutex<BTreeSet<Symbol>>,
    records: Mutex<Vec<Vec<Symbol>>>,
}

impl MemoryProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 이미 처리된 심볼로 시작합니다.
    pub fn with_processed<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        Self {
            processed: Mutex::new(symbols.into_iter().map(Into::into).collect()),
            records: Mutex::new(Vec::new()),
        }
    }

    /// `record` 호출마다 받은 심볼 목록.
    pub async fn records(&self) -> Vec<Vec<Symbol>> {
        self.records.lock().await.clone()
    }

    pub async fn processed(&self) -> BTreeSet<Symbol> {
        self.processed.lock().await.clone()
    }
}

#[async_trait]
impl ProgressLog for MemoryProgressLog {
    async fn load(&self) -> Result<BTreeSet<Symbol>> {
        Ok(self.processed.lock().await.clone())
    }

    async fn record(&self, processed: &[Symbol]) -> Result<()> {
        if processed.is_empty() {
            return Ok(());
        }
        self.processed
            .lock()
            .await
            .extend(processed.iter().cloned());
        self.records.lock().await.push(processed.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn symbols(ids: &[&str]) -> Vec<Symbol> {
        ids.iter().map(|s| Symbol::from(*s)).collect()
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = FileProgressLog::new(dir.path().join("none.txt"));
        assert!(log.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_log_appends_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress").join("ohlcv.txt");

        FileProgressLog::new(&path)
            .record(&symbols(&["AAPL", "MSFT"]))
            .await
            .unwrap();
        FileProgressLog::new(&path)
            .record(&symbols(&["GOOG", "AAPL"]))
            .await
            .unwrap();

        let loaded = FileProgressLog::new(&path).load().await.unwrap();
        assert_eq!(
            loaded.into_iter().collect::<Vec<_>>(),
            symbols(&["AAPL", "GOOG", "MSFT"])
        );
    }

    #[tokio::test]
    async fn test_file_log_ignores_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.txt");
        std::fs::write(&path, "AAPL\n\n  \nMSFT\n").unwrap();

        let loaded = FileProgressLog::new(&path).load().await.unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn test_memory_log_tracks_records() {
        let log = MemoryProgressLog::with_processed(["A"]);
        log.record(&symbols(&["B", "C"])).await.unwrap();
        log.record(&[]).await.unwrap();

        assert_eq!(log.records().await, vec![symbols(&["B", "C"])]);
        assert_eq!(log.load().await.unwrap().len(), 3);
    }
}
