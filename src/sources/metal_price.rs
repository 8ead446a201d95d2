use crate::config::MetalPriceConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::normalize::{invert_rate, round_to};
use crate::upstream::Upstream;
use chrono::{DateTime, NaiveDate, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{info, warn};

const PROVIDER: &str = "metal_price";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetalPriceResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub rates: HashMap<String, f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetalQuote {
    pub price_per_oz: f64,
    pub price_in_thb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetalPrice {
    #[serde(flatten)]
    pub quote: MetalQuote,
    pub timestamp: i64,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllMetals {
    pub gold: MetalQuote,
    pub silver: MetalQuote,
    pub platinum: MetalQuote,
    pub palladium: MetalQuote,
    pub timestamp: i64,
    pub date: String,
}

/// metalpriceapi.com. Rates are metal units per one unit of `base`.
pub struct MetalPriceApi {
    upstream: Upstream,
    latest_url: String,
    root: String,
    api_key: String,
}

impl MetalPriceApi {
    pub fn new(upstream: Upstream, cfg: &MetalPriceConfig) -> Self {
        let latest_url = cfg.url.trim_end_matches('/').to_string();
        let root = latest_url
            .strip_suffix("/latest")
            .unwrap_or(&latest_url)
            .to_string();
        Self {
            upstream,
            latest_url,
            root,
            api_key: cfg.api_key.clone(),
        }
    }

    pub async fn latest(
        &self,
        base: Option<String>,
        currencies: Option<String>,
    ) -> ProviderResult<MetalPriceResponse> {
        info!("Fetching latest metal prices from: {}", self.latest_url);
        let body = self
            .get(&self.latest_url, self.rate_query(base, currencies))
            .await?;
        let data = serde_json::from_value(body).map_err(|e| ProviderError::decode(PROVIDER, e))?;
        info!("Successfully fetched metal prices");
        Ok(data)
    }

    pub async fn gold(&self) -> ProviderResult<MetalPrice> {
        let data = self.latest(None, Some("XAU,THB".into())).await?;
        let quote = metal_quote(&data, "XAU")?;
        Ok(MetalPrice {
            quote,
            timestamp: data.timestamp,
            date: iso_timestamp(data.timestamp),
        })
    }

    pub async fn silver(&self) -> ProviderResult<MetalPrice> {
        let data = self.latest(None, Some("XAG,THB".into())).await?;
        let quote = metal_quote(&data, "XAG")?;
        Ok(MetalPrice {
            quote,
            timestamp: data.timestamp,
            date: iso_timestamp(data.timestamp),
        })
    }

    pub async fn all_metals(&self) -> ProviderResult<AllMetals> {
        let data = self
            .latest(None, Some("XAU,XAG,XPT,XPD,THB".into()))
            .await?;
        all_metals_from(&data)
    }

    pub async fn convert(&self, from: &str, to: &str, amount: f64) -> ProviderResult<Value> {
        info!("Converting {} {} to {}", amount, from, to);
        self.get(
            &format!("{}/convert", self.root),
            vec![
                ("api_key", self.api_key.clone()),
                ("from", from.to_string()),
                ("to", to.to_string()),
                ("amount", amount.to_string()),
            ],
        )
        .await
    }

    /// Prices on `date` (`YYYY-MM-DD`).
    pub async fn historical(
        &self,
        date: &str,
        base: Option<String>,
        currencies: Option<String>,
    ) -> ProviderResult<Value> {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            ProviderError::InvalidParam(format!("date must be YYYY-MM-DD, got '{}'", date))
        })?;
        info!("Fetching historical prices for date: {}", date);
        self.get(
            &format!("{}/{}", self.root, date),
            self.rate_query(base, currencies),
        )
        .await
    }

    pub async fn change(
        &self,
        start_date: &str,
        end_date: &str,
        base: Option<String>,
        currencies: Option<String>,
    ) -> ProviderResult<Value> {
        info!("Fetching price change from {} to {}", start_date, end_date);
        self.get(
            &format!("{}/change", self.root),
            vec![
                ("api_key", self.api_key.clone()),
                ("start_date", start_date.to_string()),
                ("end_date", end_date.to_string()),
                ("base", base.unwrap_or_else(|| "USD".into())),
                ("currencies", currencies.unwrap_or_else(|| "XAU,XAG".into())),
            ],
        )
        .await
    }

    fn rate_query(
        &self,
        base: Option<String>,
        currencies: Option<String>,
    ) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("api_key", self.api_key.clone()),
            ("base", base.unwrap_or_else(|| "USD".into())),
        ];
        if let Some(c) = currencies {
            query.push(("currencies", c));
        }
        query
    }

    async fn get(&self, url: &str, query: Vec<(&'static str, String)>) -> ProviderResult<Value> {
        let body: Value = self.upstream.get_json(url, &query, None).await?;
        check_success(body)
    }
}

/// metalpriceapi answers failures with HTTP 200 and `success: false`.
fn check_success(body: Value) -> ProviderResult<Value> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let message = body
            .pointer("/error/info")
            .or_else(|| body.pointer("/error/message"))
            .and_then(Value::as_str)
            .unwrap_or("request was not successful")
            .to_string();
        warn!("metal_price: API error: {}", message);
        return Err(ProviderError::Api {
            provider: PROVIDER,
            message,
        });
    }
    Ok(body)
}

fn thb_rate(data: &MetalPriceResponse) -> f64 {
    match data.rates.get("THB") {
        Some(r) if r.is_finite() && *r > 0.0 => *r,
        _ => {
            warn!("metal_price: THB rate missing from response, pricing THB at 1:1");
            1.0
        }
    }
}

pub fn metal_quote(data: &MetalPriceResponse, symbol: &str) -> ProviderResult<MetalQuote> {
    let usd = invert_rate(symbol, data.rates.get(symbol).copied())?;
    Ok(MetalQuote {
        price_per_oz: round_to(usd, 2),
        price_in_thb: round_to(usd * thb_rate(data), 2),
    })
}

pub fn all_metals_from(data: &MetalPriceResponse) -> ProviderResult<AllMetals> {
    Ok(AllMetals {
        gold: metal_quote(data, "XAU")?,
        silver: metal_quote(data, "XAG")?,
        platinum: metal_quote(data, "XPT")?,
        palladium: metal_quote(data, "XPD")?,
        timestamp: data.timestamp,
        date: iso_timestamp(data.timestamp),
    })
}

/// Unix seconds as `2024-11-20T10:00:00.000Z`.
fn iso_timestamp(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}
