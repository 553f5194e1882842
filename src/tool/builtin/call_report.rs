use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use serde_json::{Value, json};
use url::Url;

use crate::{
    config::ExternalApiSettings,
    error::FinchError,
    tool::{ToolBehavior, builtin::{ApiClient, string_arg}},
    value::{ToolDesc, ToolDescBuilder},
};

/// How many quarters to walk back looking for a filed report. Filings lag the
/// quarter end by several weeks, so the newest quarter is often still empty.
const PERIOD_LOOKBACK: usize = 8;

/// Fetches quarterly regulatory call report data for a bank, discovering the
/// most recent period that actually has a filing.
#[derive(Clone, Debug)]
pub struct CallReportTool {
    api: ApiClient,
    base_url: String,
}

/// The quarter-end dates on or before `today`, newest first.
fn quarter_ends(today: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut ends = Vec::with_capacity(count);
    let mut year = today.year();
    let mut quarter = (today.month0() / 3) as i32; // 0..=3
    for _ in 0..=count {
        let (month, day) = match quarter {
            0 => (3, 31),
            1 => (6, 30),
            2 => (9, 30),
            _ => (12, 31),
        };
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day)
            && date <= today
        {
            ends.push(date);
            if ends.len() == count {
                break;
            }
        }
        quarter -= 1;
        if quarter < 0 {
            quarter = 3;
            year -= 1;
        }
    }
    ends
}

impl CallReportTool {
    pub fn new(settings: &ExternalApiSettings, client: reqwest::Client) -> Self {
        Self {
            api: ApiClient::new(settings, "call report service", client),
            base_url: settings.call_report_base_url.trim_end_matches('/').to_owned(),
        }
    }

    fn report_url(&self, cert: &str, period: NaiveDate) -> Result<String, FinchError> {
        let mut url = Url::parse(&format!("{}/call-report", self.base_url))
            .map_err(|e| FinchError::Config(format!("bad call report base url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("cert", cert)
            .append_pair("period", &period.format("%Y-%m-%d").to_string())
            .append_pair("format", "json");
        Ok(url.into())
    }

    /// Walks back quarter-by-quarter from today until a period returns data.
    /// Returns the report plus the period it came from.
    pub(crate) async fn fetch_latest(
        &self,
        cert: &str,
    ) -> Result<Option<(NaiveDate, Value)>, FinchError> {
        for period in quarter_ends(Utc::now().date_naive(), PERIOD_LOOKBACK) {
            let url = self.report_url(cert, period)?;
            match self.api.get_json(&url).await {
                Ok(body) if body["data"].as_object().is_some_and(|o| !o.is_empty()) => {
                    return Ok(Some((period, body["data"].clone())));
                }
                Ok(_) => {
                    log::debug!("no call report for cert {cert} at {period}; walking back");
                }
                Err(err) if !err.is_transient() => {
                    log::debug!("period {period} unavailable for cert {cert}: {err}");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl ToolBehavior for CallReportTool {
    fn desc(&self) -> ToolDesc {
        ToolDescBuilder::new("call_report")
            .description(
                "Fetch the most recent quarterly call report filing for a bank, \
                 identified by its FDIC certificate number.",
            )
            .parameters(json!({
                "type": "object",
                "properties": {
                    "cert": {
                        "type": "string",
                        "description": "FDIC certificate number"
                    }
                },
                "required": ["cert"]
            }))
            .build()
    }

    async fn run(&self, args: Value) -> anyhow::Result<Value> {
        let cert = match string_arg(&args, "cert") {
            Ok(cert) => cert,
            Err(error) => return Ok(error),
        };
        match self.fetch_latest(&cert).await? {
            Some((period, report)) => Ok(json!({
                "cert": cert,
                "period": period.format("%Y-%m-%d").to_string(),
                "report": report,
            })),
            None => Ok(json!({
                "cert": cert,
                "report": Value::Null,
                "note": format!("no filed call report found in the last {PERIOD_LOOKBACK} quarters"),
            })),
        }
    }
}

/// Derives standard financial ratios from a bank's latest call report.
#[derive(Clone, Debug)]
pub struct FinancialRatiosTool {
    reports: CallReportTool,
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Value {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => json!(n / d),
        _ => Value::Null,
    }
}

impl FinancialRatiosTool {
    /// Takes the call report tool rather than building its own, so both
    /// tools share one response cache and a filing is fetched once.
    pub fn new(reports: CallReportTool) -> Self {
        Self { reports }
    }
}

#[async_trait]
impl ToolBehavior for FinancialRatiosTool {
    fn desc(&self) -> ToolDesc {
        ToolDescBuilder::new("financial_ratios")
            .description(
                "Compute return on assets, return on equity, equity ratio and \
                 loan-to-deposit ratio from a bank's latest call report.",
            )
            .parameters(json!({
                "type": "object",
                "properties": {
                    "cert": {
                        "type": "string",
                        "description": "FDIC certificate number"
                    }
                },
                "required": ["cert"]
            }))
            .build()
    }

    async fn run(&self, args: Value) -> anyhow::Result<Value> {
        let cert = match string_arg(&args, "cert") {
            Ok(cert) => cert,
            Err(error) => return Ok(error),
        };
        let Some((period, report)) = self.reports.fetch_latest(&cert).await? else {
            return Ok(json!({
                "cert": cert,
                "ratios": Value::Null,
                "note": "no call report available to compute ratios from",
            }));
        };

        let field = |name: &str| report.get(name).and_then(Value::as_f64);
        let net_income = field("net_income");
        let assets = field("total_assets");
        let equity = field("total_equity");
        let loans = field("net_loans");
        let deposits = field("total_deposits");

        Ok(json!({
            "cert": cert,
            "period": period.format("%Y-%m-%d").to_string(),
            "ratios": {
                "return_on_assets": ratio(net_income, assets),
                "return_on_equity": ratio(net_income, equity),
                "equity_ratio": ratio(equity, assets),
                "loan_to_deposit": ratio(loans, deposits),
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use yare::parameterized;

    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[parameterized(
        mid_quarter = { d(2026, 8, 25), d(2026, 6, 30) },
        on_quarter_end = { d(2026, 6, 30), d(2026, 6, 30) },
        early_january = { d(2026, 1, 5), d(2025, 12, 31) },
        early_april = { d(2026, 4, 1), d(2026, 3, 31) },
    )]
    fn newest_quarter_end_is_on_or_before_today(today: NaiveDate, expected: NaiveDate) {
        assert_eq!(quarter_ends(today, 8)[0], expected);
    }

    #[test]
    fn quarter_walk_steps_back_one_quarter_at_a_time() {
        let ends = quarter_ends(d(2026, 8, 25), 5);
        assert_eq!(
            ends,
            vec![
                d(2026, 6, 30),
                d(2026, 3, 31),
                d(2025, 12, 31),
                d(2025, 9, 30),
                d(2025, 6, 30),
            ]
        );
    }

    #[test]
    fn ratio_handles_missing_and_zero_denominator() {
        assert_eq!(ratio(Some(10.0), Some(100.0)), json!(0.1));
        assert_eq!(ratio(Some(10.0), Some(0.0)), Value::Null);
        assert_eq!(ratio(None, Some(100.0)), Value::Null);
    }

    #[tokio::test]
    async fn missing_cert_is_a_tool_level_error() -> anyhow::Result<()> {
        let tool = CallReportTool::new(&ExternalApiSettings::default(), reqwest::Client::new());
        let out = tool.run(json!({})).await?;
        assert!(out["error"].as_str().unwrap().contains("cert"));
        Ok(())
    }

    #[test]
    fn ratios_share_the_call_report_response_cache() {
        let reports = CallReportTool::new(&ExternalApiSettings::default(), reqwest::Client::new());
        let ratios = FinancialRatiosTool::new(reports.clone());
        assert!(std::sync::Arc::ptr_eq(
            &reports.api.cache,
            &ratios.reports.api.cache
        ));
    }
}
