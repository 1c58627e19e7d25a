//! Standalone market data collector CLI.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use marketlake_collector::config::parse_list;
use marketlake_collector::modules::{self, FileUniverse, ListUniverse, UniverseSource};
use marketlake_collector::{CollectionStats, CollectorConfig, CollectorContext, CollectorError};
use marketlake_core::{init_logging, LogConfig, Universe};
use marketlake_data::{ChunkStore, DatabaseConfig, MemoryTableStore, PgTableStore, TableStore};

#[derive(Parser)]
#[command(name = "marketlake-collector")]
#[command(about = "MarketLake Batch Market Data Collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// 로그 형식 (pretty, json, compact). 없으면 LOG_FORMAT
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// 데이터베이스 대신 메모리 저장소 사용 (진행 로그, 청크 파일도 남기지 않음)
    #[arg(long, global = true)]
    dry_run: bool,
}

/// 수집 대상 유니버스 지정
#[derive(Args, Clone, Default)]
struct UniverseArgs {
    /// 수집할 심볼 (쉼표로 구분, 예: "AAPL,MSFT")
    #[arg(long)]
    symbols: Option<String>,

    /// 심볼 파일 (한 줄에 하나, # 주석 허용)
    #[arg(long)]
    symbols_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// 주식 OHLCV 수집 (Yahoo Finance, parquet 청크 병행)
    CollectOhlcv {
        #[command(flatten)]
        universe: UniverseArgs,
    },

    /// 암호화폐 OHLCV 수집 (Yahoo Finance)
    CollectCrypto {
        /// 수집할 페어 (쉼표로 구분). 없으면 CRYPTO_PAIRS
        #[arg(long)]
        pairs: Option<String>,
    },

    /// 재무 데이터 동기화 (Alpha Vantage)
    SyncFundamentals {
        #[command(flatten)]
        universe: UniverseArgs,
    },

    /// 배당/분할 동기화 (Yahoo Finance)
    SyncCorporateActions {
        #[command(flatten)]
        universe: UniverseArgs,
    },

    /// 국채 금리 동기화 (Alpha Vantage)
    SyncTreasury,

    /// 주식 OHLCV 청크 파일을 하나의 parquet 파일로 결합
    CombineChunks {
        /// 결과 파일 경로 (기본: 청크 디렉터리의 combined.parquet)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// 전체 워크플로우 실행 (주식 → 암호화폐 → 기업 이벤트 → 재무 → 국채)
    RunAll {
        #[command(flatten)]
        universe: UniverseArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 로깅 초기화
    let mut log_config = LogConfig::from_env();
    log_config.level = cli.log_level.clone();
    if let Some(format) = &cli.log_format {
        log_config.format = format.parse().map_err(anyhow::Error::msg)?;
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(dry_run = cli.dry_run, "MarketLake Data Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env()?;

    // 운영자 중단
    let cancel = CancellationToken::new();
    let listener = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("종료 신호 수신, 현재 작업을 마무리하고 중단합니다");
            listener.cancel();
        }
    });

    // 저장소 연결
    let (store, pg): (Arc<dyn TableStore>, Option<PgTableStore>) = if cli.dry_run {
        tracing::info!("dry-run: 메모리 저장소 사용");
        (Arc::new(MemoryTableStore::new()), None)
    } else {
        let url = config.require_database_url()?;
        let pg = PgTableStore::connect(&DatabaseConfig::new(url)).await?;
        (Arc::new(pg.clone()), Some(pg))
    };

    let ctx = CollectorContext::new(config, store, cancel).with_dry_run(cli.dry_run);

    // 명령 실행
    let result = run(&ctx, cli.command).await;

    if let Some(pg) = pg {
        pg.close().await;
    }
    result
}

async fn run(ctx: &CollectorContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::CollectOhlcv { universe } => {
            let universe = load_universe(ctx, &universe).await?;
            let stats = modules::collect_equity_ohlcv(ctx, &universe).await?;
            check_interrupted(&stats)?;
        }
        Commands::CollectCrypto { pairs } => {
            let stats = modules::collect_crypto_ohlcv(ctx, &crypto_universe(ctx, pairs)).await?;
            check_interrupted(&stats)?;
        }
        Commands::SyncFundamentals { universe } => {
            let universe = load_universe(ctx, &universe).await?;
            let stats = modules::sync_fundamentals(ctx, &universe).await?;
            check_interrupted(&stats)?;
        }
        Commands::SyncCorporateActions { universe } => {
            let universe = load_universe(ctx, &universe).await?;
            let stats = modules::sync_corporate_actions(ctx, &universe).await?;
            check_interrupted(&stats)?;
        }
        Commands::SyncTreasury => {
            let stats = modules::sync_treasury(ctx).await?;
            check_interrupted(&stats)?;
        }
        Commands::CombineChunks { output } => {
            let config = &ctx.config.ohlcv;
            let chunks = ChunkStore::new(&config.chunk_dir, &config.chunk_prefix);
            let summary = modules::combine_chunks(&chunks, output)?;
            tracing::info!(
                chunks = summary.chunks,
                rows = summary.rows,
                columns = summary.columns,
                output = %summary.output.display(),
                "청크 결합 완료"
            );
        }
        Commands::RunAll { universe } => run_all(ctx, &universe).await?,
    }

    Ok(())
}

/// 전체 워크플로우. 한 경로의 실패는 기록만 하고 다음 경로로 넘어갑니다.
async fn run_all(ctx: &CollectorContext, args: &UniverseArgs) -> anyhow::Result<()> {
    tracing::info!("=== 전체 워크플로우 시작 ===");

    let universe = load_universe(ctx, args).await?;
    let crypto = crypto_universe(ctx, None);
    let mut failed = Vec::new();

    tracing::info!("Step 1/5: 주식 OHLCV 수집");
    let result = modules::collect_equity_ohlcv(ctx, &universe).await;
    record_step("equity_ohlcv", result, &mut failed)?;

    tracing::info!("Step 2/5: 암호화폐 OHLCV 수집");
    let result = modules::collect_crypto_ohlcv(ctx, &crypto).await;
    record_step("crypto_ohlcv", result, &mut failed)?;

    tracing::info!("Step 3/5: 기업 이벤트 동기화");
    let result = modules::sync_corporate_actions(ctx, &universe).await;
    record_step("corporate_actions", result, &mut failed)?;

    tracing::info!("Step 4/5: 재무 데이터 동기화");
    let result = modules::sync_fundamentals(ctx, &universe).await;
    record_step("fundamentals", result, &mut failed)?;

    tracing::info!("Step 5/5: 국채 금리 동기화");
    let result = modules::sync_treasury(ctx).await;
    record_step("treasury", result, &mut failed)?;

    if failed.is_empty() {
        tracing::info!("=== 전체 워크플로우 완료 ===");
        Ok(())
    } else {
        tracing::error!(failed = ?failed, "=== 전체 워크플로우 완료 (일부 실패) ===");
        anyhow::bail!("workflow steps failed: {}", failed.join(", "))
    }
}

/// 단계 결과를 기록합니다. 운영자 중단만 에러로 돌려줍니다.
fn record_step(
    name: &'static str,
    result: marketlake_collector::Result<CollectionStats>,
    failed: &mut Vec<&'static str>,
) -> Result<(), CollectorError> {
    match result {
        Ok(stats) => check_interrupted(&stats),
        Err(CollectorError::FatalPrecondition(reason)) => {
            tracing::error!(step = name, reason = %reason, "전제 조건 실패, 단계 건너뜀");
            Ok(())
        }
        Err(e) => {
            tracing::error!(step = name, error = %e, "단계 실패");
            failed.push(name);
            Ok(())
        }
    }
}

fn check_interrupted(stats: &CollectionStats) -> Result<(), CollectorError> {
    if stats.interrupted {
        tracing::warn!(
            success = stats.success,
            errors = stats.errors,
            "운영자 중단: 처리된 배치는 기록되었으며 다음 실행에서 이어서 진행합니다"
        );
        return Err(CollectorError::Interrupted);
    }
    Ok(())
}

/// `--symbols-file`, `--symbols`, `UNIVERSE_FILE` 순으로 유니버스를 정합니다.
async fn load_universe(ctx: &CollectorContext, args: &UniverseArgs) -> anyhow::Result<Universe> {
    let source: Box<dyn UniverseSource> = if let Some(path) = &args.symbols_file {
        Box::new(FileUniverse::new(path))
    } else if let Some(symbols) = &args.symbols {
        Box::new(ListUniverse::new(parse_list(symbols)))
    } else if let Some(path) = &ctx.config.universe_file {
        Box::new(FileUniverse::new(path))
    } else {
        anyhow::bail!("no symbol universe: pass --symbols, --symbols-file or set UNIVERSE_FILE");
    };

    let universe = source.load().await.context("failed to load symbol universe")?;
    if universe.is_empty() {
        anyhow::bail!("symbol universe is empty");
    }
    tracing::info!(symbols = universe.len(), "유니버스 로드 완료");
    Ok(universe)
}

fn crypto_universe(ctx: &CollectorContext, pairs: Option<String>) -> Universe {
    match pairs {
        Some(pairs) => Universe::new(parse_list(&pairs)),
        None => Universe::new(ctx.config.crypto_pairs.iter().map(String::as_str)),
    }
}
