//! 수집 경로 공통 실행 컨텍스트.

use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::CollectorConfig;
use crate::modules::progress::{FileProgressLog, MemoryProgressLog, ProgressLog};
use marketlake_data::{Fetcher, RetryPolicy, TableStore};

/// 모든 수집 경로가 공유하는 설정, 저장소, 중단 토큰.
pub struct CollectorContext {
    pub config: CollectorConfig,
    pub store: Arc<dyn TableStore>,
    pub cancel: CancellationToken,
    /// 메모리 저장소로 실행 중이면 진행 로그와 청크 파일도 남기지 않음
    pub dry_run: bool,
}

impl CollectorContext {
    pub fn new(config: CollectorConfig, store: Arc<dyn TableStore>, cancel: CancellationToken) -> Self {
        Self {
            config,
            store,
            cancel,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 경로별 진행 로그. dry-run이면 메모리 로그.
    pub fn progress_log(&self, path: &Path) -> Box<dyn ProgressLog> {
        if self.dry_run {
            Box::new(MemoryProgressLog::new())
        } else {
            Box::new(FileProgressLog::new(path))
        }
    }

    /// 중단 토큰이 연결된 fetcher.
    pub fn fetcher(&self, policy: RetryPolicy) -> Fetcher {
        Fetcher::new(policy).with_cancellation(self.cancel.clone())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
