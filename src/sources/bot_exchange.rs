use super::{iso_date, today};
use crate::config::BotConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::normalize::{average_bid_offer, round_to};
use crate::types::BotEnvelope;
use crate::upstream::Upstream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotRateDetail {
    #[serde(default)]
    pub period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub type SpotRateResponse = BotEnvelope<SpotRateDetail>;

/// USD/THB spot quotes from the BOT exchange-rate product.
pub struct BotExchangeRate {
    upstream: Upstream,
    url: String,
    api_key: String,
}

impl BotExchangeRate {
    pub fn new(upstream: Upstream, cfg: &BotConfig) -> Self {
        Self {
            upstream,
            url: cfg.exchange_rate_url.clone(),
            api_key: cfg.api_key.clone(),
        }
    }

    /// Dates are `YYYY-MM-DD`; both default to today.
    pub async fn spot_rate(
        &self,
        start_period: Option<String>,
        end_period: Option<String>,
    ) -> ProviderResult<SpotRateResponse> {
        let today = iso_date(today());
        let start = start_period.unwrap_or_else(|| today.clone());
        let end = end_period.unwrap_or(today);

        info!("Fetching spot rate from BOT API ({} to {})", start, end);
        let data = self
            .upstream
            .get_json(
                &self.url,
                &[("start_period", start), ("end_period", end)],
                Some(&self.api_key),
            )
            .await?;
        info!("Successfully fetched spot rate data");
        Ok(data)
    }

    /// Mid rate of today's first quote row.
    pub async fn current_rate(&self) -> ProviderResult<f64> {
        let data = self.spot_rate(None, None).await?;
        let rate = current_rate_from(&data)?;
        info!("Current USD/THB rate: {:.4}", rate);
        Ok(rate)
    }
}

/// BOT lists the most recent row first.
pub fn current_rate_from(data: &SpotRateResponse) -> ProviderResult<f64> {
    let latest = data
        .details()
        .first()
        .ok_or_else(|| ProviderError::NoData("No spot rate data available".into()))?;
    let bid = latest.bid.as_deref().unwrap_or_default();
    let offer = latest.offer.as_deref().unwrap_or_default();
    Ok(round_to(average_bid_offer(bid, offer)?, 4))
}
