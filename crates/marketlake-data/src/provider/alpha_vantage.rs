//! Alpha Vantage 프로바이더.
//!
//! 회사 개요, 재무제표(손익/재무상태/현금흐름), 미국 국채 금리를 제공합니다.
//! Alpha Vantage는 호출 한도 초과를 HTTP 200 + `Note`/`Information` 본문으로
//! 알려주기 때문에 응답 본문까지 확인해서 분류합니다.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value as Json};
use std::time::Duration;
use tracing::debug;

use super::{mentions_rate_limit, AttributeProvider, ProviderError, ProviderErrorKind};
use crate::error::{DataError, Result};
use marketlake_core::{Attribute, RawDataset, Symbol, Value};

/// 기본 API 엔드포인트.
pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";

/// 재무제표 기간 단위.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementPeriod {
    #[default]
    Quarterly,
    Annual,
}

impl StatementPeriod {
    fn report_key(&self) -> &'static str {
        match self {
            Self::Quarterly => "quarterlyReports",
            Self::Annual => "annualReports",
        }
    }
}

impl std::str::FromStr for StatementPeriod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quarterly" => Ok(Self::Quarterly),
            "annual" => Ok(Self::Annual),
            _ => Err(format!("Unknown statement period: {}", s)),
        }
    }
}

/// Alpha Vantage 프로바이더.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: SecretString,
    base_url: String,
    period: StatementPeriod,
    treasury_interval: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: SecretString) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::ConnectionError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            period: StatementPeriod::default(),
            treasury_interval: "daily".to_string(),
        })
    }

    /// 엔드포인트를 변경합니다 (테스트용 mock 서버 등).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_period(mut self, period: StatementPeriod) -> Self {
        self.period = period;
        self
    }

    pub fn with_treasury_interval(mut self, interval: impl Into<String>) -> Self {
        self.treasury_interval = interval.into();
        self
    }

    fn function_name(attribute: Attribute) -> Option<&'static str> {
        match attribute {
            Attribute::Overview => Some("OVERVIEW"),
            Attribute::IncomeStatement => Some("INCOME_STATEMENT"),
            Attribute::BalanceSheet => Some("BALANCE_SHEET"),
            Attribute::CashFlow => Some("CASH_FLOW"),
            Attribute::TreasuryYield => Some("TREASURY_YIELD"),
            Attribute::Dividends | Attribute::Splits => None,
        }
    }

    async fn request(
        &self,
        function: &str,
        symbol: &Symbol,
        attribute: Attribute,
    ) -> std::result::Result<Json, ProviderError> {
        let mut params: Vec<(&str, &str)> = vec![("function", function)];
        if attribute == Attribute::TreasuryYield {
            params.push(("interval", self.treasury_interval.as_str()));
            params.push(("maturity", symbol.as_str()));
        } else {
            params.push(("symbol", symbol.as_str()));
        }
        params.push(("apikey", self.api_key.expose_secret()));

        debug!(function = function, symbol = %symbol, "Alpha Vantage API 호출");

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() || e.is_connect() {
                    ProviderErrorKind::Network
                } else {
                    ProviderErrorKind::Other
                };
                ProviderError::new(kind, format!("Alpha Vantage 요청 실패 ({}): {}", symbol, e))
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::rate_limited(format!(
                "HTTP {} for {}",
                status, symbol
            )));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::new(
                ProviderErrorKind::Unauthorized,
                format!("HTTP {} for {}", status, symbol),
            ));
        }
        if !status.is_success() {
            let kind = if status.is_server_error() {
                ProviderErrorKind::Network
            } else {
                ProviderErrorKind::Other
            };
            return Err(ProviderError::new(
                kind,
                format!("HTTP {} for {}", status, symbol),
            ));
        }

        response.json::<Json>().await.map_err(|e| {
            ProviderError::malformed(format!("Alpha Vantage 응답 파싱 실패 ({}): {}", symbol, e))
        })
    }
}

#[async_trait]
impl AttributeProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        "alpha_vantage"
    }

    fn supports(&self, attribute: Attribute) -> bool {
        Self::function_name(attribute).is_some()
    }

    async fn fetch_attribute(
        &self,
        symbol: &Symbol,
        attribute: Attribute,
    ) -> std::result::Result<RawDataset, ProviderError> {
        let function = Self::function_name(attribute).ok_or_else(|| {
            ProviderError::new(
                ProviderErrorKind::Unsupported,
                format!("Alpha Vantage does not provide {}", attribute),
            )
        })?;

        let body = self.request(function, symbol, attribute).await?;
        parse_response(&body, attribute, self.period)
    }
}

/// 응답 본문을 속성에 맞는 원시 데이터셋으로 변환합니다.
pub fn parse_response(
    body: &Json,
    attribute: Attribute,
    period: StatementPeriod,
) -> std::result::Result<RawDataset, ProviderError> {
    let object = body
        .as_object()
        .ok_or_else(|| ProviderError::malformed("response is not a JSON object"))?;

    if let Some(err) = classify_body(object) {
        return Err(err);
    }

    match attribute {
        Attribute::Overview => Ok(parse_overview(object)),
        Attribute::IncomeStatement | Attribute::BalanceSheet | Attribute::CashFlow => {
            parse_statement(object, period)
        }
        Attribute::TreasuryYield => parse_treasury(object, attribute.value_column()),
        other => Err(ProviderError::new(
            ProviderErrorKind::Unsupported,
            format!("Alpha Vantage does not provide {}", other),
        )),
    }
}

/// 본문에 담긴 오류/한도 메시지를 분류합니다.
fn classify_body(object: &Map<String, Json>) -> Option<ProviderError> {
    if let Some(message) = object.get("Error Message").and_then(Json::as_str) {
        return Some(ProviderError::not_found(message));
    }

    for key in ["Note", "Information"] {
        if let Some(message) = object.get(key).and_then(Json::as_str) {
            let lower = message.to_lowercase();
            let kind = if mentions_rate_limit(message) || lower.contains("requests per day") {
                ProviderErrorKind::RateLimited
            } else if lower.contains("premium") || lower.contains("api key") {
                ProviderErrorKind::Unauthorized
            } else {
                ProviderErrorKind::Other
            };
            return Some(ProviderError::new(kind, message));
        }
    }

    None
}

fn json_to_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::from(n.as_f64()),
        },
        Json::String(s) => Value::parse_lenient(s),
        other => Value::Text(other.to_string()),
    }
}

fn parse_overview(object: &Map<String, Json>) -> RawDataset {
    let entries = object
        .iter()
        .map(|(key, value)| (key.clone(), json_to_value(value)))
        .collect();
    RawDataset::Mapping { entries }
}

const PERIOD_KEY: &str = "fiscalDateEnding";
const CURRENCY_KEY: &str = "reportedCurrency";

fn parse_statement(
    object: &Map<String, Json>,
    period: StatementPeriod,
) -> std::result::Result<RawDataset, ProviderError> {
    let reports = match object.get(period.report_key()) {
        Some(Json::Array(reports)) => reports.as_slice(),
        Some(_) => {
            return Err(ProviderError::malformed(format!(
                "{} is not an array",
                period.report_key()
            )))
        }
        None if object.is_empty() => &[],
        None => {
            return Err(ProviderError::malformed(format!(
                "missing {}",
                period.report_key()
            )))
        }
    };

    let mut columns: Vec<String> = Vec::new();
    for report in reports.iter().filter_map(Json::as_object) {
        for key in report.keys() {
            if key != PERIOD_KEY && key != CURRENCY_KEY && !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let mut index = Vec::with_capacity(reports.len());
    let mut cells = Vec::with_capacity(reports.len());
    for report in reports.iter().filter_map(Json::as_object) {
        let label = report
            .get(PERIOD_KEY)
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_string();
        let row = columns
            .iter()
            .map(|c| report.get(c).map(json_to_value).unwrap_or(Value::Null))
            .collect();
        index.push(label);
        cells.push(row);
    }

    Ok(RawDataset::Table {
        index,
        columns,
        cells,
    })
}

fn parse_treasury(
    object: &Map<String, Json>,
    name: &str,
) -> std::result::Result<RawDataset, ProviderError> {
    let points = match object.get("data") {
        Some(Json::Array(points)) => points.as_slice(),
        Some(_) => return Err(ProviderError::malformed("data is not an array")),
        None if object.is_empty() => &[],
        None => return Err(ProviderError::malformed("missing data")),
    };

    let mut index = Vec::with_capacity(points.len());
    let mut values = Vec::with_capacity(points.len());
    for point in points {
        let date = point.get("date").and_then(Json::as_str).unwrap_or_default();
        let value = point.get("value").map(json_to_value).unwrap_or(Value::Null);
        index.push(Value::Text(date.to_string()));
        values.push(value);
    }

    Ok(RawDataset::Series {
        name: name.to_string(),
        index,
        values,
    })
}
