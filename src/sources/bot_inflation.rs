use super::today;
use crate::config::BotConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::normalize::{mean, parse_number, round_to};
use crate::types::BotEnvelope;
use crate::upstream::Upstream;
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InflationDetail {
    #[serde(default)]
    pub period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline_inflation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_inflation: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub type InflationResponse = BotEnvelope<InflationDetail>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentInflation {
    pub headline: f64,
    pub core: f64,
    pub period: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageInflation {
    pub year: i32,
    pub headline_avg: f64,
    pub core_avg: f64,
    pub months: usize,
}

/// Headline/core inflation and CPI from the BOT economic-indicator products.
pub struct BotInflation {
    upstream: Upstream,
    cpi_url: String,
    inflation_url: String,
    api_key: String,
}

impl BotInflation {
    pub fn new(upstream: Upstream, cfg: &BotConfig) -> Self {
        Self {
            upstream,
            cpi_url: cfg.cpi_url.clone(),
            inflation_url: cfg.inflation_url.clone(),
            api_key: cfg.api_key.clone(),
        }
    }

    /// Periods are `YYYY-MM`; defaults cover the last 12 months.
    pub async fn cpi(
        &self,
        start_period: Option<String>,
        end_period: Option<String>,
    ) -> ProviderResult<InflationResponse> {
        let (start, end) = window(start_period, end_period, 12);
        info!("Fetching CPI data from {} to {}", start, end);
        self.fetch(&self.cpi_url, start, end).await
    }

    pub async fn inflation_rate(
        &self,
        start_period: Option<String>,
        end_period: Option<String>,
    ) -> ProviderResult<InflationResponse> {
        let (start, end) = window(start_period, end_period, 12);
        info!("Fetching inflation rate from {} to {}", start, end);
        self.fetch(&self.inflation_url, start, end).await
    }

    pub async fn current(&self) -> ProviderResult<CurrentInflation> {
        info!("Fetching current inflation rate");
        let (start, end) = window(None, None, 3);
        let data = self.fetch(&self.inflation_url, start, end).await?;
        let current = current_from(&data)?;
        info!(
            "Current inflation - headline {}%, core {}% ({})",
            current.headline, current.core, current.period
        );
        Ok(current)
    }

    pub async fn by_year(&self, year: i32) -> ProviderResult<InflationResponse> {
        info!("Fetching inflation data for year {}", year);
        self.fetch(
            &self.inflation_url,
            format!("{}-01", year),
            format!("{}-12", year),
        )
        .await
    }

    pub async fn average(&self, year: i32) -> ProviderResult<AverageInflation> {
        let data = self.by_year(year).await?;
        let avg = average_from(year, &data)?;
        info!(
            "Average inflation {} - headline {:.2}%, core {:.2}% over {} months",
            year, avg.headline_avg, avg.core_avg, avg.months
        );
        Ok(avg)
    }

    async fn fetch(&self, url: &str, start: String, end: String) -> ProviderResult<InflationResponse> {
        self.upstream
            .get_json(
                url,
                &[("start_period", start), ("end_period", end)],
                Some(&self.api_key),
            )
            .await
    }
}

fn month_of(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

fn window(start: Option<String>, end: Option<String>, months_back: u32) -> (String, String) {
    let today = today();
    let end = end.unwrap_or_else(|| month_of(today));
    let start = start.unwrap_or_else(|| {
        month_of(
            today
                .checked_sub_months(Months::new(months_back))
                .unwrap_or(today),
        )
    });
    (start, end)
}

fn headline(row: &InflationDetail) -> ProviderResult<f64> {
    parse_number(
        "headline_inflation",
        row.headline_inflation.as_deref().unwrap_or_default(),
    )
}

fn core(row: &InflationDetail) -> ProviderResult<f64> {
    parse_number(
        "core_inflation",
        row.core_inflation.as_deref().unwrap_or_default(),
    )
}

/// Inflation rows run oldest to newest.
pub fn current_from(data: &InflationResponse) -> ProviderResult<CurrentInflation> {
    let latest = data
        .details()
        .last()
        .ok_or_else(|| ProviderError::NoData("No inflation data available".into()))?;
    Ok(CurrentInflation {
        headline: headline(latest)?,
        core: core(latest)?,
        period: latest.period.clone(),
        timestamp: data.result.timestamp.clone(),
    })
}

/// Means over the months actually published, not an assumed twelve.
pub fn average_from(year: i32, data: &InflationResponse) -> ProviderResult<AverageInflation> {
    let details = data.details();
    let headlines = details.iter().map(headline).collect::<ProviderResult<Vec<_>>>()?;
    let cores = details.iter().map(core).collect::<ProviderResult<Vec<_>>>()?;
    let no_data = || ProviderError::NoData(format!("No inflation data available for year {}", year));
    Ok(AverageInflation {
        year,
        headline_avg: round_to(mean(&headlines).ok_or_else(no_data)?, 2),
        core_avg: round_to(mean(&cores).ok_or_else(no_data)?, 2),
        months: details.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{client, has_param, StubUpstream};
    use serde_json::json;

    fn rows(values: &[(&str, &str)]) -> Value {
        let detail: Vec<Value> = values
            .iter()
            .enumerate()
            .map(|(i, (h, c))| {
                json!({ "period": format!("2023-{:02}", i + 1), "headline_inflation": h, "core_inflation": c })
            })
            .collect();
        json!({ "result": { "api": "Inflation", "timestamp": "2024-01-05", "data": { "data_detail": detail } } })
    }

    #[test]
    fn average_counts_only_published_months() {
        let values = [
            ("1.1", "0.5"), ("0.9", "0.6"), ("0.5", "0.7"), ("-0.3", "0.8"),
            ("0.2", "0.9"), ("0.8", "1.0"), ("0.4", "0.6"), ("0.6", "0.6"),
            ("0.7", "0.7"), ("1.0", "0.8"), ("0.3", "0.9"),
        ];
        let data: InflationResponse = serde_json::from_value(rows(&values)).unwrap();
        let avg = average_from(2023, &data).unwrap();
        assert_eq!(avg.months, 11);
        assert_eq!(avg.headline_avg, 0.56);
        assert_eq!(avg.core_avg, 0.74);
    }

    #[test]
    fn empty_year_is_no_data() {
        let data: InflationResponse = serde_json::from_value(rows(&[])).unwrap();
        assert!(matches!(average_from(2023, &data), Err(ProviderError::NoData(_))));
    }

    #[test]
    fn current_takes_last_row() {
        let data: InflationResponse =
            serde_json::from_value(rows(&[("1.0", "0.5"), ("0.4", "0.6")])).unwrap();
        let current = current_from(&data).unwrap();
        assert_eq!(current.headline, 0.4);
        assert_eq!(current.core, 0.6);
        assert_eq!(current.period, "2023-02");
        assert_eq!(current.timestamp, "2024-01-05");
    }

    #[test]
    fn missing_headline_fails_loudly() {
        let data: InflationResponse = serde_json::from_value(json!({
            "result": { "api": "", "timestamp": "", "data": { "data_detail": [
                { "period": "2023-01", "core_inflation": "0.5" }
            ] } }
        }))
        .unwrap();
        assert!(matches!(
            current_from(&data),
            Err(ProviderError::InvalidNumber { .. })
        ));
    }

    #[tokio::test]
    async fn by_year_and_default_windows_use_month_periods() {
        let stub = StubUpstream::json("/inflation", rows(&[("1.0", "0.5")])).await;
        let cfg = BotConfig {
            inflation_url: stub.url("/inflation"),
            cpi_url: stub.url("/inflation"),
            ..BotConfig::default()
        };
        let provider = BotInflation::new(Upstream::new(client(), "bot", None), &cfg);

        provider.by_year(2023).await.unwrap();
        provider.cpi(None, None).await.unwrap();

        let queries = stub.queries("/inflation");
        assert!(has_param(&queries[0], "start_period", "2023-01"));
        assert!(has_param(&queries[0], "end_period", "2023-12"));
        assert!(has_param(&queries[1], "end_period", &month_of(today())));
    }
}
