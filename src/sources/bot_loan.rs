use super::{iso_date, today};
use crate::config::BotConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::normalize::parse_number;
use crate::types::BotEnvelope;
use crate::upstream::Upstream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

const COMMERCIAL_BANK_AVERAGE: &str = "Commercial Banks registered in Thailand";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRateDetail {
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub name_th: Option<String>,
    #[serde(default)]
    pub name_eng: Option<String>,
    #[serde(default)]
    pub mor: Option<String>,
    #[serde(default)]
    pub mlr: Option<String>,
    #[serde(default)]
    pub mrr: Option<String>,
    #[serde(default)]
    pub ceiling_rate: Option<String>,
    #[serde(default)]
    pub default_rate: Option<String>,
    #[serde(default)]
    pub creditcard_min: Option<String>,
    #[serde(default)]
    pub creditcard_max: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub type LoanRateResponse = BotEnvelope<LoanRateDetail>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanRates {
    pub mor: f64,
    pub mlr: f64,
    pub mrr: f64,
    pub ceiling_rate: f64,
    pub default_rate: f64,
    pub creditcard_min: f64,
    pub creditcard_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestLoanRates {
    pub period: String,
    pub rates: LoanRates,
}

pub struct BotLoanRate {
    upstream: Upstream,
    loan_rate_url: String,
    avg_loan_rate_url: String,
    api_key: String,
}

impl BotLoanRate {
    pub fn new(upstream: Upstream, cfg: &BotConfig) -> Self {
        Self {
            upstream,
            loan_rate_url: cfg.loan_rate_url.clone(),
            avg_loan_rate_url: cfg.avg_loan_rate_url.clone(),
            api_key: cfg.api_key.clone(),
        }
    }

    /// Per-bank MOR/MLR/MRR and card rates.
    pub async fn individual(
        &self,
        start_period: Option<String>,
        end_period: Option<String>,
    ) -> ProviderResult<LoanRateResponse> {
        info!("Fetching loan rates from BOT API");
        self.fetch(&self.loan_rate_url, start_period, end_period).await
    }

    pub async fn average(
        &self,
        start_period: Option<String>,
        end_period: Option<String>,
    ) -> ProviderResult<LoanRateResponse> {
        info!("Fetching average loan rates from BOT API");
        self.fetch(&self.avg_loan_rate_url, start_period, end_period)
            .await
    }

    pub async fn latest(&self) -> ProviderResult<LatestLoanRates> {
        let data = self.average(None, None).await?;
        let latest = latest_from(&data)?;
        info!(
            "Latest loan rates ({}): MOR {} MLR {} MRR {}",
            latest.period, latest.rates.mor, latest.rates.mlr, latest.rates.mrr
        );
        Ok(latest)
    }

    async fn fetch(
        &self,
        url: &str,
        start_period: Option<String>,
        end_period: Option<String>,
    ) -> ProviderResult<LoanRateResponse> {
        let today = iso_date(today());
        let start = start_period.unwrap_or_else(|| today.clone());
        let end = end_period.unwrap_or(today);
        self.upstream
            .get_json(
                url,
                &[("start_period", start), ("end_period", end)],
                Some(&self.api_key),
            )
            .await
    }
}

/// Prefer the commercial-bank average row, otherwise the first row.
pub fn latest_from(data: &LoanRateResponse) -> ProviderResult<LatestLoanRates> {
    let details = data.details();
    let row = details
        .iter()
        .find(|r| {
            r.name_eng
                .as_deref()
                .is_some_and(|n| n.contains(COMMERCIAL_BANK_AVERAGE))
        })
        .or_else(|| details.first())
        .ok_or_else(|| ProviderError::NoData("No loan rate data available".into()))?;

    Ok(LatestLoanRates {
        period: row.period.clone().unwrap_or_default(),
        rates: LoanRates {
            mor: rate("mor", row.mor.as_deref())?,
            mlr: rate("mlr", row.mlr.as_deref())?,
            mrr: rate("mrr", row.mrr.as_deref())?,
            ceiling_rate: rate("ceiling_rate", row.ceiling_rate.as_deref())?,
            default_rate: rate("default_rate", row.default_rate.as_deref())?,
            creditcard_min: rate("creditcard_min", row.creditcard_min.as_deref())?,
            creditcard_max: rate("creditcard_max", row.creditcard_max.as_deref())?,
        },
    })
}

fn rate(field: &str, raw: Option<&str>) -> ProviderResult<f64> {
    parse_number(field, raw.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{client, StubUpstream};
    use serde_json::json;

    fn row(name: &str, mor: &str) -> Value {
        json!({
            "period": "2024-11-20",
            "name_th": "",
            "name_eng": name,
            "mor": mor,
            "mlr": "7.0971",
            "mrr": "8.3883",
            "ceiling_rate": "23.0182",
            "default_rate": "24.7879",
            "creditcard_min": "19.4444",
            "creditcard_max": "19.4444"
        })
    }

    fn envelope(rows: Vec<Value>) -> Value {
        json!({ "result": { "api": "Average Loan Interest Rates", "timestamp": "2024-11-20 16:46:27",
            "data": { "data_detail": rows } } })
    }

    #[test]
    fn commercial_bank_average_row_is_preferred() {
        let data: LoanRateResponse = serde_json::from_value(envelope(vec![
            row("Average of Foreign Bank Branches", "6.5"),
            row("Average of Commercial Banks registered in Thailand", "7.9166"),
        ]))
        .unwrap();
        let latest = latest_from(&data).unwrap();
        assert_eq!(latest.period, "2024-11-20");
        assert_eq!(latest.rates.mor, 7.9166);
        assert_eq!(latest.rates.creditcard_max, 19.4444);
    }

    #[test]
    fn falls_back_to_first_row() {
        let data: LoanRateResponse =
            serde_json::from_value(envelope(vec![row("Bangkok Bank", "7.50")])).unwrap();
        assert_eq!(latest_from(&data).unwrap().rates.mor, 7.5);
    }

    #[test]
    fn empty_rows_are_no_data() {
        let data: LoanRateResponse = serde_json::from_value(envelope(vec![])).unwrap();
        assert!(matches!(latest_from(&data), Err(ProviderError::NoData(_))));
    }

    #[test]
    fn null_rates_in_bank_rows_still_decode() {
        let mut card_less = row("Land and Houses Bank", "7.45");
        card_less["creditcard_min"] = Value::Null;
        card_less["creditcard_max"] = Value::Null;
        let raw = envelope(vec![card_less]);
        let data: LoanRateResponse = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(data.details()[0].creditcard_min, None);
        assert_eq!(data.details()[0].mor.as_deref(), Some("7.45"));
        assert_eq!(serde_json::to_value(&data).unwrap(), raw);
        assert!(matches!(
            latest_from(&data),
            Err(ProviderError::InvalidNumber { .. })
        ));
    }

    #[tokio::test]
    async fn individual_and_average_hit_their_own_urls() {
        let stub = StubUpstream::start(
            axum::Router::new()
                .route(
                    "/loan",
                    axum::routing::get(|| async {
                        axum::Json(envelope(vec![row("Bangkok Bank", "7.50")]))
                    }),
                )
                .route(
                    "/avg",
                    axum::routing::get(|| async {
                        axum::Json(envelope(vec![row(
                            "Average of Commercial Banks registered in Thailand",
                            "7.9166",
                        )]))
                    }),
                ),
        )
        .await;
        let cfg = BotConfig {
            loan_rate_url: stub.url("/loan"),
            avg_loan_rate_url: stub.url("/avg"),
            ..BotConfig::default()
        };
        let loans = BotLoanRate::new(Upstream::new(client(), "bot", None), &cfg);

        let individual = loans.individual(None, None).await.unwrap();
        assert_eq!(
            individual.details()[0].name_eng.as_deref(),
            Some("Bangkok Bank")
        );
        let latest = loans.latest().await.unwrap();
        assert_eq!(latest.rates.mor, 7.9166);
        assert_eq!(stub.hits("/loan"), 1);
        assert_eq!(stub.hits("/avg"), 1);
    }
}
