use super::{iso_date, today};
use crate::config::BotConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::normalize::parse_number;
use crate::types::BotEnvelope;
use crate::upstream::Upstream;
use chrono::Days;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRateDetail {
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub policy_rate: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub type PolicyRateResponse = BotEnvelope<PolicyRateDetail>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentPolicyRate {
    pub rate: f64,
    pub date: String,
    pub timestamp: String,
}

/// Monetary Policy Committee benchmark rate.
pub struct BotPolicyRate {
    upstream: Upstream,
    url: String,
    api_key: String,
}

impl BotPolicyRate {
    pub fn new(upstream: Upstream, cfg: &BotConfig) -> Self {
        Self {
            upstream,
            url: cfg.policy_rate_url.clone(),
            api_key: cfg.api_key.clone(),
        }
    }

    /// Defaults to the last 30 days.
    pub async fn policy_rate(
        &self,
        start_period: Option<String>,
        end_period: Option<String>,
    ) -> ProviderResult<PolicyRateResponse> {
        let end = end_period.unwrap_or_else(|| iso_date(today()));
        let start = start_period.unwrap_or_else(|| days_back(30));
        info!("Fetching policy rate from {} to {}", start, end);
        self.fetch(start, end).await
    }

    pub async fn current(&self) -> ProviderResult<CurrentPolicyRate> {
        info!("Fetching current policy rate");
        let data = self.fetch(days_back(7), iso_date(today())).await?;
        let current = current_from(&data)?;
        info!("Current policy rate: {}% (as of {})", current.rate, current.date);
        Ok(current)
    }

    pub async fn by_year(&self, year: i32) -> ProviderResult<PolicyRateResponse> {
        info!("Fetching policy rate for year {}", year);
        self.fetch(format!("{}-01-01", year), format!("{}-12-31", year))
            .await
    }

    async fn fetch(&self, start: String, end: String) -> ProviderResult<PolicyRateResponse> {
        self.upstream
            .get_json(
                &self.url,
                &[("start_period", start), ("end_period", end)],
                Some(&self.api_key),
            )
            .await
    }
}

fn days_back(days: u64) -> String {
    let today = today();
    iso_date(today.checked_sub_days(Days::new(days)).unwrap_or(today))
}

/// Policy-rate rows run oldest to newest, so the last row is current.
pub fn current_from(data: &PolicyRateResponse) -> ProviderResult<CurrentPolicyRate> {
    let latest = data
        .details()
        .last()
        .ok_or_else(|| ProviderError::NoData("No policy rate data available".into()))?;
    Ok(CurrentPolicyRate {
        rate: parse_number(
            "policy_rate",
            latest.policy_rate.as_deref().unwrap_or_default(),
        )?,
        date: latest.period.clone().unwrap_or_default(),
        timestamp: data.result.timestamp.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{client, has_param, StubUpstream};
    use serde_json::json;

    fn body() -> Value {
        json!({ "result": { "api": "Policy Interest Rate", "timestamp": "2024-11-20T10:00:00Z",
            "data": { "data_header": { "report_name_eng": "Policy Interest Rate" },
                "data_detail": [
                    { "period": "2024-10-16", "policy_rate": "2.50" },
                    { "period": "2024-10-17", "policy_rate": "2.25" }
                ] } } })
    }

    fn provider(stub: &StubUpstream) -> BotPolicyRate {
        let cfg = BotConfig {
            policy_rate_url: stub.url("/policy"),
            ..BotConfig::default()
        };
        BotPolicyRate::new(Upstream::new(client(), "bot", None), &cfg)
    }

    #[tokio::test]
    async fn current_takes_last_row_and_upstream_timestamp() {
        let stub = StubUpstream::json("/policy", body()).await;
        let current = provider(&stub).current().await.unwrap();
        assert_eq!(
            current,
            CurrentPolicyRate {
                rate: 2.25,
                date: "2024-10-17".into(),
                timestamp: "2024-11-20T10:00:00Z".into(),
            }
        );
        let q = &stub.queries("/policy")[0];
        assert!(has_param(q, "start_period", &days_back(7)));
        assert!(has_param(q, "end_period", &iso_date(today())));
    }

    #[tokio::test]
    async fn default_window_is_thirty_days() {
        let stub = StubUpstream::json("/policy", body()).await;
        provider(&stub).policy_rate(None, None).await.unwrap();
        assert!(has_param(
            &stub.queries("/policy")[0],
            "start_period",
            &days_back(30)
        ));
    }

    #[tokio::test]
    async fn by_year_spans_calendar_year() {
        let stub = StubUpstream::json("/policy", body()).await;
        provider(&stub).by_year(2023).await.unwrap();
        let q = &stub.queries("/policy")[0];
        assert!(has_param(q, "start_period", "2023-01-01"));
        assert!(has_param(q, "end_period", "2023-12-31"));
    }

    #[tokio::test]
    async fn null_rate_rows_pass_through() {
        let raw = json!({ "result": { "api": "Policy Interest Rate", "timestamp": "",
            "data": { "data_detail": [
                { "period": "2024-10-16", "policy_rate": null },
                { "period": "2024-10-17", "policy_rate": "2.25" }
            ] } } });
        let stub = StubUpstream::json("/policy", raw.clone()).await;
        let data = provider(&stub).policy_rate(None, None).await.unwrap();
        assert_eq!(data.details()[0].policy_rate, None);
        assert_eq!(serde_json::to_value(&data).unwrap(), raw);
        assert_eq!(current_from(&data).unwrap().rate, 2.25);
    }

    #[test]
    fn empty_rows_are_no_data() {
        let data: PolicyRateResponse = serde_json::from_value(json!({
            "result": { "api": "", "timestamp": "", "data": { "data_detail": [] } }
        }))
        .unwrap();
        assert!(matches!(current_from(&data), Err(ProviderError::NoData(_))));
    }
}
