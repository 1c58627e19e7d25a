//! 심볼 및 유니버스 정의.
//!
//! - `Symbol` - 거래 가능한 상품의 불투명 식별자 (주식 티커, 암호화폐 페어 등)
//! - `Universe` - 중복 제거 및 정렬된 심볼 집합

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// 거래 가능한 상품을 나타내는 불투명 식별자.
///
/// 생성 시 앞뒤 공백만 제거하며 대소문자는 그대로 유지합니다.
/// (예: `AAPL`, `BRK.B`, `BTC-USD`, `3month`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// 새 심볼을 생성합니다.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_string())
    }

    /// 식별자 문자열을 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 빈 식별자인지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 수집 대상 심볼 유니버스.
///
/// 생성 시점에 공백 심볼을 버리고, 중복을 제거하고, 정렬합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Universe {
    symbols: Vec<Symbol>,
}

impl Universe {
    /// 임의의 심볼 목록으로부터 유니버스를 생성합니다.
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        let set: BTreeSet<Symbol> = symbols
            .into_iter()
            .map(Into::into)
            .filter(|s: &Symbol| !s.is_empty())
            .collect();

        Self {
            symbols: set.into_iter().collect(),
        }
    }

    /// 정렬된 심볼 슬라이스.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// 이미 처리된 심볼을 제외한 나머지 심볼을 순서대로 반환합니다.
    pub fn pending(&self, processed: &BTreeSet<Symbol>) -> Vec<Symbol> {
        self.symbols
            .iter()
            .filter(|s| !processed.contains(*s))
            .cloned()
            .collect()
    }
}

impl FromIterator<Symbol> for Universe {
    fn from_iter<T: IntoIterator<Item = Symbol>>(iter: T) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_trims_but_keeps_case() {
        let symbol = Symbol::new("  brk.B ");
        assert_eq!(symbol.as_str(), "brk.B");
        assert_eq!(symbol.to_string(), "brk.B");
    }

    #[test]
    fn test_universe_dedup_and_sort() {
        let universe = Universe::new(["MSFT", "AAPL", " ", "MSFT", "AAPL ", "GOOG"]);
        let ids: Vec<&str> = universe.symbols().iter().map(Symbol::as_str).collect();
        assert_eq!(ids, vec!["AAPL", "GOOG", "MSFT"]);
    }

    #[test]
    fn test_universe_pending_skips_processed() {
        let universe = Universe::new(["A", "B", "C", "D"]);
        let processed: BTreeSet<Symbol> = ["A", "B"].into_iter().map(Symbol::from).collect();

        let pending = universe.pending(&processed);
        assert_eq!(pending, vec![Symbol::from("C"), Symbol::from("D")]);
    }
}
