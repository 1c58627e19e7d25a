//! 수집 대상 유니버스 소스.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use marketlake_core::Universe;

/// 유니버스 로더.
#[async_trait]
pub trait UniverseSource: Send + Sync {
    async fn load(&self) -> Result<Universe>;
}

/// 명시적으로 주어진 심볼 목록.
#[derive(Debug, Clone, Default)]
pub struct ListUniverse {
    symbols: Vec<String>,
}

impl ListUniverse {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl UniverseSource for ListUniverse {
    async fn load(&self) -> Result<Universe> {
        Ok(Universe::new(self.symbols.iter().map(String::as_str)))
    }
}

/// 한 줄에 심볼 하나씩 적힌 파일. `#` 뒤는 주석입니다.
#[derive(Debug, Clone)]
pub struct FileUniverse {
    path: PathBuf,
}

impl FileUniverse {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// 심볼 파일 내용을 파싱합니다.
pub fn parse_symbols_file(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .collect()
}

#[async_trait]
impl UniverseSource for FileUniverse {
    async fn load(&self) -> Result<Universe> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let universe = Universe::new(parse_symbols_file(&content));
        info!(path = %self.path.display(), symbols = universe.len(), "유니버스 파일 로드");
        Ok(universe)
    }
}
