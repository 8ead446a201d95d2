use crate::config::GoldThaiConfig;
use crate::error::ProviderResult;
use crate::normalize::parse_number;
use crate::upstream::Upstream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldPriceResponse {
    #[serde(default)]
    pub status: String,
    pub response: GoldPriceBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldPriceBody {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub update_time: String,
    pub price: GoldPrices,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldPrices {
    pub gold: BuySell,
    pub gold_bar: BuySell,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Baht prices as published, e.g. `"41,050.00"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuySell {
    pub buy: String,
    pub sell: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldQuote {
    pub buy: f64,
    pub sell: f64,
    pub date: String,
    pub update_time: String,
}

/// Thai Gold Traders Association prices, relayed by api.chnwt.dev.
pub struct GoldThai {
    upstream: Upstream,
    url: String,
}

impl GoldThai {
    pub fn new(upstream: Upstream, cfg: &GoldThaiConfig) -> Self {
        Self {
            upstream,
            url: cfg.url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn latest(&self) -> ProviderResult<GoldPriceResponse> {
        let url = format!("{}/latest", self.url);
        info!("Fetching latest gold prices from: {}", url);
        let data = self.upstream.get_json(&url, &[], None).await?;
        info!("Successfully fetched gold prices");
        Ok(data)
    }

    /// 96.5% gold bar.
    pub async fn bar(&self) -> ProviderResult<GoldQuote> {
        let data = self.latest().await?;
        quote(&data.response, &data.response.price.gold_bar)
    }

    /// 96.5% ornament gold.
    pub async fn ornament(&self) -> ProviderResult<GoldQuote> {
        let data = self.latest().await?;
        quote(&data.response, &data.response.price.gold)
    }
}

fn quote(body: &GoldPriceBody, prices: &BuySell) -> ProviderResult<GoldQuote> {
    Ok(GoldQuote {
        buy: parse_number("buy", &prices.buy)?,
        sell: parse_number("sell", &prices.sell)?,
        date: body.date.clone(),
        update_time: body.update_time.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::testutil::{client, StubUpstream};
    use serde_json::json;

    fn body(bar_buy: &str) -> Value {
        json!({
            "status": "success",
            "response": {
                "date": "20 พฤศจิกายน 2567",
                "update_time": "เวลา 09:29 น.",
                "price": {
                    "gold": { "buy": "40,652.36", "sell": "41,650.00" },
                    "gold_bar": { "buy": bar_buy, "sell": "41,150.00" },
                    "change": { "compare_previous": "+50", "compare_yesterday": "+400" }
                }
            }
        })
    }

    fn provider(stub: &StubUpstream) -> GoldThai {
        let cfg = GoldThaiConfig {
            url: stub.base(),
            ..GoldThaiConfig::default()
        };
        GoldThai::new(Upstream::new(client(), "gold_thai", None), &cfg)
    }

    #[tokio::test]
    async fn bar_and_ornament_parse_thai_formatted_prices() {
        let stub = StubUpstream::json("/latest", body("41,050.00")).await;
        let gold = provider(&stub);

        let bar = gold.bar().await.unwrap();
        assert_eq!(bar.buy, 41050.0);
        assert_eq!(bar.sell, 41150.0);
        assert_eq!(bar.update_time, "เวลา 09:29 น.");

        let ornament = gold.ornament().await.unwrap();
        assert_eq!(ornament.buy, 40652.36);
        assert_eq!(
            serde_json::to_value(&ornament).unwrap()["updateTime"],
            "เวลา 09:29 น."
        );
    }

    #[tokio::test]
    async fn latest_keeps_unmodelled_price_fields() {
        let stub = StubUpstream::json("/latest", body("41,050.00")).await;
        let latest = provider(&stub).latest().await.unwrap();
        assert_eq!(serde_json::to_value(&latest).unwrap(), body("41,050.00"));
    }

    #[tokio::test]
    async fn unparseable_price_is_an_error() {
        let stub = StubUpstream::json("/latest", body("-")).await;
        assert!(matches!(
            provider(&stub).bar().await,
            Err(ProviderError::InvalidNumber { .. })
        ));
    }
}
