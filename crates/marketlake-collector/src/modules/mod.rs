//! 수집 경로 모듈.

pub mod attribute_sync;
pub mod fundamental_sync;
pub mod ohlcv_collect;
pub mod progress;
pub mod treasury_sync;
pub mod universe;

pub use attribute_sync::{AttributePlan, AttributeSyncer};
pub use fundamental_sync::{sync_corporate_actions, sync_fundamentals};
pub use ohlcv_collect::{
    collect_crypto_ohlcv, collect_equity_ohlcv, combine_chunks, BarCollector, BarPlan,
    CombineSummary,
};
pub use progress::{FileProgressLog, MemoryProgressLog, ProgressLog};
pub use treasury_sync::{sync_treasury, TreasurySyncer, RISK_FREE_RATE_COLUMN};
pub use universe::{FileUniverse, ListUniverse, UniverseSource};
