//! 심볼 배치 분할.

use super::symbol::Symbol;
use crate::error::{CoreError, CoreResult};

/// 유니버스의 연속된 구간. Fetcher가 정확히 한 번 소비합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 0부터 시작하는 배치 순번
    pub index: usize,
    /// 배치에 포함된 심볼 (입력 순서 유지)
    pub symbols: Vec<Symbol>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// 첫 심볼과 마지막 심볼로 만든 로그용 구간 문자열 (예: "AAPL..MSFT").
    pub fn label(&self) -> String {
        match (self.symbols.first(), self.symbols.last()) {
            (Some(first), Some(last)) if first != last => format!("{}..{}", first, last),
            (Some(first), _) => first.to_string(),
            _ => String::new(),
        }
    }
}

/// 심볼 시퀀스를 최대 `size`개씩의 배치로 나눕니다.
///
/// 입력 순서를 보존하며 마지막 배치는 `size`보다 짧을 수 있습니다.
/// `size <= 0`이면 에러를 반환합니다.
pub fn partition(symbols: &[Symbol], size: i64) -> CoreResult<Vec<Batch>> {
    if size <= 0 {
        return Err(CoreError::InvalidBatchSize(size));
    }

    Ok(symbols
        .chunks(size as usize)
        .enumerate()
        .map(|(index, chunk)| Batch {
            index,
            symbols: chunk.to_vec(),
        })
        .collect())
}
