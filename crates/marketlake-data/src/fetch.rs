//! rate limit을 인지하는 재시도 fetcher.
//!
//! 프로바이더 호출 하나(배치 × 구간, 또는 심볼 × 속성)를 감싸서
//! rate limit 실패만 대기 후 재시도하고, 그 외 실패는 즉시 돌려줍니다.
//!
//! # 정책
//!
//! - `RateLimited`: `rate_limit_delay`만큼 대기 후 재시도. 배치 경로는 시도 횟수,
//!   심볼 경로는 경과 시간으로 제한
//! - 그 외 오류: 재시도하지 않고 `Failed`
//! - 빈 응답: 오류가 아닌 `Empty`
//!
//! 모든 대기는 취소 토큰과 경쟁하므로 운영자 중단 시 즉시 빠져나옵니다.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::provider::ProviderError;
use marketlake_core::RawDataset;

/// 재시도 한도.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryBudget {
    /// 총 시도 횟수 한도 (배치 경로)
    Attempts(u32),
    /// 첫 시도부터의 경과 시간 한도 (심볼 경로)
    Elapsed(Duration),
}

/// 재시도/대기 정책.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub budget: RetryBudget,
    /// rate limit 실패 후 대기 시간
    pub rate_limit_delay: Duration,
    /// 그 외 실패 후 다음 작업 전 대기 시간
    pub other_error_delay: Duration,
    /// 배치 사이 대기 시간
    pub inter_batch_delay: Duration,
}

impl RetryPolicy {
    /// 시도 횟수 기반 정책 (OHLCV 배치).
    pub fn attempts(max_attempts: u32, rate_limit_delay: Duration) -> Self {
        Self {
            budget: RetryBudget::Attempts(max_attempts.max(1)),
            rate_limit_delay,
            other_error_delay: Duration::ZERO,
            inter_batch_delay: Duration::ZERO,
        }
    }

    /// 경과 시간 기반 정책 (심볼 단위 참조 데이터).
    pub fn time_budget(max_elapsed: Duration, rate_limit_delay: Duration) -> Self {
        Self {
            budget: RetryBudget::Elapsed(max_elapsed),
            rate_limit_delay,
            other_error_delay: Duration::ZERO,
            inter_batch_delay: Duration::ZERO,
        }
    }

    pub fn with_other_error_delay(mut self, delay: Duration) -> Self {
        self.other_error_delay = delay;
        self
    }

    pub fn with_inter_batch_delay(mut self, delay: Duration) -> Self {
        self.inter_batch_delay = delay;
        self
    }

    /// 다음 시도를 할 수 없으면 `true`. 시간 한도는 대기 후 시작할 시도까지 셉니다.
    fn exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        match self.budget {
            RetryBudget::Attempts(max) => attempts >= max,
            RetryBudget::Elapsed(max) => elapsed + self.rate_limit_delay > max,
        }
    }
}

/// 한 번의 fetch 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult<T = RawDataset> {
    Success(T),
    /// 구조는 있지만 행이 없는 응답
    Empty,
    Failed(ProviderError),
}

impl<T> FetchResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// fetch 결과와 시도 기록.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T = RawDataset> {
    pub result: FetchResult<T>,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// 재시도 정책을 적용해 프로바이더 호출을 실행합니다.
#[derive(Debug, Clone)]
pub struct Fetcher {
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// 운영자 중단 토큰을 연결합니다.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 호출을 실행합니다.
    ///
    /// `op`는 시도마다 새 future를 만듭니다. 한도는 이 호출의 첫 시도부터 따로 잽니다.
    pub async fn fetch<F, Fut>(&self, label: &str, mut op: F) -> Fetched
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RawDataset, ProviderError>>,
    {
        let started = Instant::now();
        let mut attempts = 0u32;

        let result = loop {
            if self.cancel.is_cancelled() {
                break FetchResult::Failed(ProviderError::cancelled());
            }

            attempts += 1;
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(ProviderError::cancelled()),
                outcome = op() => outcome,
            };

            match outcome {
                Ok(raw) if raw.is_empty() => {
                    debug!(target_label = label, attempt = attempts, "빈 응답");
                    break FetchResult::Empty;
                }
                Ok(raw) => break FetchResult::Success(raw),
                Err(e) if e.is_rate_limited() => {
                    let elapsed = started.elapsed();
                    if self.policy.exhausted(attempts, elapsed) {
                        warn!(
                            target_label = label,
                            attempt = attempts,
                            elapsed_secs = elapsed.as_secs(),
                            "rate limit 재시도 한도 초과"
                        );
                        break FetchResult::Failed(e);
                    }

                    info!(
                        target_label = label,
                        attempt = attempts,
                        delay_secs = self.policy.rate_limit_delay.as_secs(),
                        "rate limit, 대기 후 재시도"
                    );
                    if !self.pause(self.policy.rate_limit_delay).await {
                        break FetchResult::Failed(ProviderError::cancelled());
                    }
                }
                Err(e) => {
                    warn!(
                        target_label = label,
                        attempt = attempts,
                        kind = %e.kind,
                        error = %e.message,
                        "조회 실패, 재시도하지 않음"
                    );
                    break FetchResult::Failed(e);
                }
            }
        };

        Fetched {
            result,
            attempts,
            elapsed: started.elapsed(),
        }
    }

    /// 주어진 시간만큼 대기합니다. 중단되면 `false`.
    pub async fn pause(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = sleep(delay) => true,
        }
    }

    /// 배치 사이 대기.
    pub async fn pause_between_batches(&self) -> bool {
        self.pause(self.policy.inter_batch_delay).await
    }

    /// rate limit 이외의 실패 뒤 다음 작업 전 대기.
    pub async fn cool_down(&self) -> bool {
        self.pause(self.policy.other_error_delay).await
    }
}
