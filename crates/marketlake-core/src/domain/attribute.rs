//! 수집 대상 속성 정의.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 원시 응답의 형태 분류.
///
/// 정규화 규칙은 이 값으로 선택됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// 평면 key→value (회사 개요 등)
    ScalarMapping,
    /// 날짜 인덱스의 단일 시계열 (배당, 분할, 금리)
    TimeSeries,
    /// 항목 × 기간 재무제표
    PeriodicStatement,
    /// `(field, entity)` 복합 컬럼의 다종목 OHLCV
    WideBars,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ScalarMapping => "scalar_mapping",
            Self::TimeSeries => "time_series",
            Self::PeriodicStatement => "periodic_statement",
            Self::WideBars => "wide_bars",
        };
        f.write_str(s)
    }
}

/// 심볼 단위로 수집하는 참조 데이터 속성.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Overview,
    IncomeStatement,
    BalanceSheet,
    CashFlow,
    Dividends,
    Splits,
    TreasuryYield,
}

impl Attribute {
    /// 재무 데이터 동기화 대상 속성.
    pub const FUNDAMENTALS: [Attribute; 4] = [
        Attribute::Overview,
        Attribute::IncomeStatement,
        Attribute::BalanceSheet,
        Attribute::CashFlow,
    ];

    /// 기업 이벤트 동기화 대상 속성.
    pub const CORPORATE_ACTIONS: [Attribute; 2] = [Attribute::Dividends, Attribute::Splits];

    pub fn kind(&self) -> AttributeKind {
        match self {
            Self::Overview => AttributeKind::ScalarMapping,
            Self::IncomeStatement | Self::BalanceSheet | Self::CashFlow => {
                AttributeKind::PeriodicStatement
            }
            Self::Dividends | Self::Splits | Self::TreasuryYield => AttributeKind::TimeSeries,
        }
    }

    /// 적재 대상 테이블 이름.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Overview => "company_overview",
            Self::IncomeStatement => "income_statement",
            Self::BalanceSheet => "balance_sheet",
            Self::CashFlow => "cash_flow",
            Self::Dividends => "dividends",
            Self::Splits => "splits",
            Self::TreasuryYield => "treasury_yields",
        }
    }

    /// 시계열 속성의 값 컬럼 이름.
    pub fn value_column(&self) -> &'static str {
        match self {
            Self::Dividends => "dividend",
            Self::Splits => "split_ratio",
            Self::TreasuryYield => "yield",
            _ => "value",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::IncomeStatement => "income_statement",
            Self::BalanceSheet => "balance_sheet",
            Self::CashFlow => "cash_flow",
            Self::Dividends => "dividends",
            Self::Splits => "splits",
            Self::TreasuryYield => "treasury_yield",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Attribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overview" => Ok(Self::Overview),
            "income_statement" => Ok(Self::IncomeStatement),
            "balance_sheet" => Ok(Self::BalanceSheet),
            "cash_flow" => Ok(Self::CashFlow),
            "dividends" => Ok(Self::Dividends),
            "splits" => Ok(Self::Splits),
            "treasury_yield" => Ok(Self::TreasuryYield),
            _ => Err(format!("Unknown attribute: {}", s)),
        }
    }
}
