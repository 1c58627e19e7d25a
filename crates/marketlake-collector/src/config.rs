//! 환경변수 기반 설정 모듈.

use chrono::{Months, NaiveDate, Utc};
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CollectorError, Result};
use marketlake_data::{BarRequest, RetryPolicy};

/// 기본 수집 기간 (년)
const DEFAULT_HISTORY_YEARS: u32 = 15;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL (`--dry-run`이 아니면 필수)
    pub database_url: Option<String>,
    /// Alpha Vantage API 키 (재무/국채 경로에서만 필요)
    pub alpha_vantage_api_key: Option<SecretString>,
    /// 기본 유니버스 파일 (`--symbols`, `--symbols-file`이 없을 때)
    pub universe_file: Option<PathBuf>,
    /// 주식 OHLCV 수집 설정
    pub ohlcv: BarCollectConfig,
    /// 암호화폐 OHLCV 수집 설정
    pub crypto: BarCollectConfig,
    /// 암호화폐 수집 대상 페어
    pub crypto_pairs: Vec<String>,
    /// 재무 데이터 동기화 설정
    pub fundamental: AttributeSyncConfig,
    /// 기업 이벤트(배당/분할) 동기화 설정
    pub corporate_action: AttributeSyncConfig,
    /// 국채 금리 동기화 설정
    pub treasury: TreasuryConfig,
}

/// OHLCV 배치 수집 설정
#[derive(Debug, Clone)]
pub struct BarCollectConfig {
    /// 배치당 심볼 수
    pub chunk_size: i64,
    /// 배치 사이 대기 (초)
    pub batch_delay_secs: u64,
    /// 배치당 최대 시도 횟수
    pub max_retries: u32,
    /// rate limit 후 대기 (초)
    pub rate_limit_delay_secs: u64,
    /// 그 외 실패 후 대기 (초)
    pub other_error_delay_secs: u64,
    /// 조회 간격 (예: 1d, 1h)
    pub interval: String,
    /// 수집 시작 날짜 (YYYY-MM-DD)
    pub start_date: Option<String>,
    /// 수집 종료 날짜 (YYYY-MM-DD)
    pub end_date: Option<String>,
    /// 적재 테이블
    pub table: String,
    /// parquet 청크 기록 여부
    pub write_chunks: bool,
    /// 청크 디렉터리
    pub chunk_dir: PathBuf,
    /// 청크 파일 접두어
    pub chunk_prefix: String,
    /// 진행 로그 파일
    pub progress_file: PathBuf,
}

/// 심볼 × 속성 동기화 설정
#[derive(Debug, Clone)]
pub struct AttributeSyncConfig {
    /// 배치당 심볼 수
    pub batch_size: i64,
    /// 호출 하나의 rate limit 재시도 시간 한도 (초)
    pub max_elapsed_secs: u64,
    /// rate limit 후 대기 (초)
    pub rate_limit_delay_secs: u64,
    /// 그 외 실패 후 대기 (초)
    pub other_error_delay_secs: u64,
    /// API 요청 간 딜레이 (밀리초)
    pub request_delay_ms: u64,
    /// 배치 사이 대기 (초)
    pub batch_delay_secs: u64,
    /// 재무제표 기간 (quarterly | annual)
    pub period: String,
    /// 진행 로그 파일
    pub progress_file: PathBuf,
}

/// 국채 금리 동기화 설정
#[derive(Debug, Clone)]
pub struct TreasuryConfig {
    /// 만기 (예: 3month, 10year)
    pub maturity: String,
    /// 조회 간격 (daily | weekly | monthly)
    pub interval: String,
    /// 적재 테이블
    pub table: String,
    /// rate limit 재시도 시간 한도 (초)
    pub max_elapsed_secs: u64,
    /// rate limit 후 대기 (초)
    pub rate_limit_delay_secs: u64,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env_var_opt("DATABASE_URL");
        let alpha_vantage_api_key = env_var_opt("ALPHAVANTAGE_API_KEY").map(SecretString::from);

        Ok(Self {
            database_url,
            alpha_vantage_api_key,
            universe_file: env_var_opt("UNIVERSE_FILE").map(PathBuf::from),
            ohlcv: BarCollectConfig::from_env("OHLCV", BarCollectConfig::equity_defaults()),
            crypto: BarCollectConfig::from_env("CRYPTO", BarCollectConfig::crypto_defaults()),
            crypto_pairs: parse_list(
                &std::env::var("CRYPTO_PAIRS").unwrap_or_else(|_| "BTC-USD,ETH-USD".to_string()),
            ),
            fundamental: AttributeSyncConfig::from_env(
                "FUNDAMENTAL",
                AttributeSyncConfig::fundamental_defaults(),
            ),
            corporate_action: AttributeSyncConfig::from_env(
                "CORPORATE_ACTION",
                AttributeSyncConfig::corporate_action_defaults(),
            ),
            treasury: TreasuryConfig::from_env(),
        })
    }

    /// 데이터베이스 URL. 없으면 설정 에러.
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            CollectorError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })
    }

    /// Alpha Vantage API 키. 없으면 해당 경로만 중단하는 전제 조건 에러.
    pub fn require_api_key(&self) -> Result<&SecretString> {
        self.alpha_vantage_api_key.as_ref().ok_or_else(|| {
            CollectorError::FatalPrecondition(
                "ALPHAVANTAGE_API_KEY 환경변수가 설정되지 않았습니다".to_string(),
            )
        })
    }
}

impl BarCollectConfig {
    /// 주식 OHLCV 기본값
    pub fn equity_defaults() -> Self {
        Self {
            chunk_size: 100,
            batch_delay_secs: 30,
            max_retries: 5,
            rate_limit_delay_secs: 600,
            other_error_delay_secs: 30,
            interval: "1d".to_string(),
            start_date: None,
            end_date: None,
            table: "stock_data".to_string(),
            write_chunks: true,
            chunk_dir: PathBuf::from("./stock_data_chunks"),
            chunk_prefix: "stock_data".to_string(),
            progress_file: PathBuf::from("./progress/ohlcv.txt"),
        }
    }

    /// 암호화폐 OHLCV 기본값 (청크 파일 없음)
    pub fn crypto_defaults() -> Self {
        Self {
            chunk_size: 10,
            table: "crypto_data".to_string(),
            write_chunks: false,
            chunk_dir: PathBuf::from("./crypto_data_chunks"),
            chunk_prefix: "crypto_data".to_string(),
            progress_file: PathBuf::from("./progress/crypto.txt"),
            ..Self::equity_defaults()
        }
    }

    fn from_env(prefix: &str, defaults: Self) -> Self {
        let key = |name: &str| format!("{}_{}", prefix, name);

        Self {
            chunk_size: env_var_parse(&key("CHUNK_SIZE"), defaults.chunk_size),
            batch_delay_secs: env_var_parse(&key("BATCH_DELAY_SECS"), defaults.batch_delay_secs),
            max_retries: env_var_parse(&key("MAX_RETRIES"), defaults.max_retries),
            rate_limit_delay_secs: env_var_parse(
                &key("RATE_LIMIT_DELAY_SECS"),
                defaults.rate_limit_delay_secs,
            ),
            other_error_delay_secs: env_var_parse(
                &key("OTHER_ERROR_DELAY_SECS"),
                defaults.other_error_delay_secs,
            ),
            interval: std::env::var(key("INTERVAL")).unwrap_or(defaults.interval),
            start_date: env_var_opt(&key("START_DATE")),
            end_date: env_var_opt(&key("END_DATE")),
            table: std::env::var(key("TABLE")).unwrap_or(defaults.table),
            write_chunks: env_var_bool(&key("WRITE_CHUNKS"), defaults.write_chunks),
            chunk_dir: env_var_opt(&key("CHUNK_DIR"))
                .map(PathBuf::from)
                .unwrap_or(defaults.chunk_dir),
            chunk_prefix: std::env::var(key("CHUNK_PREFIX")).unwrap_or(defaults.chunk_prefix),
            progress_file: env_var_opt(&key("PROGRESS_FILE"))
                .map(PathBuf::from)
                .unwrap_or(defaults.progress_file),
        }
    }

    /// 배치 재시도 정책 (시도 횟수 기반)
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::attempts(
            self.max_retries,
            Duration::from_secs(self.rate_limit_delay_secs),
        )
        .with_other_error_delay(Duration::from_secs(self.other_error_delay_secs))
        .with_inter_batch_delay(Duration::from_secs(self.batch_delay_secs))
    }

    /// 수집 기간. 지정이 없으면 오늘 기준 15년 전부터 오늘까지.
    pub fn date_range(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
        let end = match &self.end_date {
            Some(s) => parse_date(s)?,
            None => today,
        };
        let start = match &self.start_date {
            Some(s) => parse_date(s)?,
            None => end
                .checked_sub_months(Months::new(12 * DEFAULT_HISTORY_YEARS))
                .ok_or_else(|| CollectorError::Config(format!("invalid end date: {}", end)))?,
        };

        if start > end {
            return Err(CollectorError::Config(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        Ok((start, end))
    }

    /// 오늘 날짜 기준 조회 요청
    pub fn bar_request(&self) -> Result<BarRequest> {
        let (start, end) = self.date_range(Utc::now().date_naive())?;
        Ok(BarRequest {
            start,
            end,
            interval: self.interval.clone(),
        })
    }
}

impl AttributeSyncConfig {
    /// 재무 데이터 기본값 (Alpha Vantage 무료 한도: 분당 5회)
    pub fn fundamental_defaults() -> Self {
        Self {
            batch_size: 25,
            max_elapsed_secs: 900,
            rate_limit_delay_secs: 60,
            other_error_delay_secs: 5,
            request_delay_ms: 12_000,
            batch_delay_secs: 0,
            period: "quarterly".to_string(),
            progress_file: PathBuf::from("./progress/fundamentals.txt"),
        }
    }

    /// 기업 이벤트 기본값
    pub fn corporate_action_defaults() -> Self {
        Self {
            batch_size: 50,
            max_elapsed_secs: 600,
            rate_limit_delay_secs: 60,
            other_error_delay_secs: 5,
            request_delay_ms: 500,
            batch_delay_secs: 10,
            period: "quarterly".to_string(),
            progress_file: PathBuf::from("./progress/corporate_actions.txt"),
        }
    }

    fn from_env(prefix: &str, defaults: Self) -> Self {
        let key = |name: &str| format!("{}_{}", prefix, name);

        Self {
            batch_size: env_var_parse(&key("BATCH_SIZE"), defaults.batch_size),
            max_elapsed_secs: env_var_parse(&key("MAX_ELAPSED_SECS"), defaults.max_elapsed_secs),
            rate_limit_delay_secs: env_var_parse(
                &key("RATE_LIMIT_DELAY_SECS"),
                defaults.rate_limit_delay_secs,
            ),
            other_error_delay_secs: env_var_parse(
                &key("OTHER_ERROR_DELAY_SECS"),
                defaults.other_error_delay_secs,
            ),
            request_delay_ms: env_var_parse(&key("REQUEST_DELAY_MS"), defaults.request_delay_ms),
            batch_delay_secs: env_var_parse(&key("BATCH_DELAY_SECS"), defaults.batch_delay_secs),
            period: std::env::var(key("PERIOD")).unwrap_or(defaults.period),
            progress_file: env_var_opt(&key("PROGRESS_FILE"))
                .map(PathBuf::from)
                .unwrap_or(defaults.progress_file),
        }
    }

    /// 호출 재시도 정책 (경과 시간 기반)
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::time_budget(
            Duration::from_secs(self.max_elapsed_secs),
            Duration::from_secs(self.rate_limit_delay_secs),
        )
        .with_other_error_delay(Duration::from_secs(self.other_error_delay_secs))
        .with_inter_batch_delay(Duration::from_secs(self.batch_delay_secs))
    }

    /// API 요청 간 딜레이
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        Self {
            maturity: "3month".to_string(),
            interval: "daily".to_string(),
            table: "treasury_yields".to_string(),
            max_elapsed_secs: 600,
            rate_limit_delay_secs: 60,
        }
    }
}

impl TreasuryConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            maturity: std::env::var("TREASURY_MATURITY").unwrap_or(defaults.maturity),
            interval: std::env::var("TREASURY_INTERVAL").unwrap_or(defaults.interval),
            table: std::env::var("TREASURY_TABLE").unwrap_or(defaults.table),
            max_elapsed_secs: env_var_parse("TREASURY_MAX_ELAPSED_SECS", defaults.max_elapsed_secs),
            rate_limit_delay_secs: env_var_parse(
                "TREASURY_RATE_LIMIT_DELAY_SECS",
                defaults.rate_limit_delay_secs,
            ),
        }
    }

    /// 호출 재시도 정책 (경과 시간 기반)
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::time_budget(
            Duration::from_secs(self.max_elapsed_secs),
            Duration::from_secs(self.rate_limit_delay_secs),
        )
    }
}

/// 쉼표로 구분된 목록 파싱 (공백 제거, 빈 항목 제외)
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| CollectorError::Config(format!("invalid date '{}': {}", raw, e)))
}

/// 환경변수 파싱 헬퍼
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 bool 값 파싱
fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

/// 비어 있지 않은 환경변수 값
fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_date_range_is_fifteen_years() {
        let config = BarCollectConfig::equity_defaults();
        let (start, end) = config.date_range(date(2024, 6, 30)).unwrap();
        assert_eq!(start, date(2009, 6, 30));
        assert_eq!(end, date(2024, 6, 30));
    }

    #[test]
    fn test_explicit_date_range() {
        let config = BarCollectConfig {
            start_date: Some("2020-01-01".to_string()),
            end_date: Some("2020-12-31".to_string()),
            ..BarCollectConfig::equity_defaults()
        };
        let (start, end) = config.date_range(date(2024, 6, 30)).unwrap();
        assert_eq!(start, date(2020, 1, 1));
        assert_eq!(end, date(2020, 12, 31));
    }

    #[test]
    fn test_invalid_date_range() {
        let reversed = BarCollectConfig {
            start_date: Some("2021-01-01".to_string()),
            end_date: Some("2020-01-01".to_string()),
            ..BarCollectConfig::equity_defaults()
        };
        assert!(reversed.date_range(date(2024, 1, 1)).is_err());

        let garbage = BarCollectConfig {
            start_date: Some("20200101".to_string()),
            ..BarCollectConfig::equity_defaults()
        };
        assert!(matches!(
            garbage.date_range(date(2024, 1, 1)),
            Err(CollectorError::Config(_))
        ));
    }

    #[test]
    fn test_equity_retry_policy() {
        let policy = BarCollectConfig::equity_defaults().retry_policy();
        assert_eq!(policy.budget, marketlake_data::RetryBudget::Attempts(5));
        assert_eq!(policy.rate_limit_delay, Duration::from_secs(600));
        assert_eq!(policy.other_error_delay, Duration::from_secs(30));
        assert_eq!(policy.inter_batch_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_crypto_defaults_skip_chunks() {
        let crypto = BarCollectConfig::crypto_defaults();
        assert_eq!(crypto.table, "crypto_data");
        assert!(!crypto.write_chunks);
        assert_eq!(crypto.max_retries, 5);
    }

    #[test]
    fn test_env_var_helpers() {
        std::env::set_var("MARKETLAKE_TEST_PARSE", "42");
        std::env::set_var("MARKETLAKE_TEST_BAD", "forty-two");
        std::env::set_var("MARKETLAKE_TEST_BOOL", "1");

        assert_eq!(env_var_parse("MARKETLAKE_TEST_PARSE", 7i64), 42);
        assert_eq!(env_var_parse("MARKETLAKE_TEST_BAD", 7i64), 7);
        assert_eq!(env_var_parse("MARKETLAKE_TEST_MISSING", 7i64), 7);
        assert!(env_var_bool("MARKETLAKE_TEST_BOOL", false));
        assert!(env_var_bool("MARKETLAKE_TEST_MISSING", true));
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list(" BTC-USD, ,ETH-USD ,"),
            vec!["BTC-USD".to_string(), "ETH-USD".to_string()]
        );
    }

    #[test]
    fn test_missing_api_key_is_precondition_error() {
        let config = CollectorConfig {
            database_url: None,
            alpha_vantage_api_key: None,
            universe_file: None,
            ohlcv: BarCollectConfig::equity_defaults(),
            crypto: BarCollectConfig::crypto_defaults(),
            crypto_pairs: vec![],
            fundamental: AttributeSyncConfig::fundamental_defaults(),
            corporate_action: AttributeSyncConfig::corporate_action_defaults(),
            treasury: TreasuryConfig::default(),
        };

        assert!(matches!(
            config.require_api_key(),
            Err(CollectorError::FatalPrecondition(_))
        ));
        assert!(matches!(
            config.require_database_url(),
            Err(CollectorError::Config(_))
        ));
    }
}
