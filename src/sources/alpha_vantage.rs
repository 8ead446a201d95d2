use crate::config::AlphaVantageConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::upstream::Upstream;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tracing::{info, warn};

const PROVIDER: &str = "alpha_vantage";

/// Closed set of values accepted by one query parameter.
macro_rules! wire_enum {
    ($name:ident, default = $default:ident, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(GdpInterval, default = Annual, {
    Quarterly => "quarterly",
    Annual => "annual",
});

wire_enum!(CpiInterval, default = Monthly, {
    Monthly => "monthly",
    Semiannual => "semiannual",
});

wire_enum!(SeriesInterval, default = Monthly, {
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
});

wire_enum!(CopperInterval, default = Monthly, {
    Monthly => "monthly",
    Quarterly => "quarterly",
    Annual => "annual",
});

wire_enum!(Maturity, default = TenYear, {
    ThreeMonth => "3month",
    TwoYear => "2year",
    FiveYear => "5year",
    SevenYear => "7year",
    TenYear => "10year",
    ThirtyYear => "30year",
});

wire_enum!(OutputSize, default = Compact, {
    Compact => "compact",
    Full => "full",
});

/// Alpha Vantage query API. Every call is one `function=` on the same URL;
/// bodies are relayed as-is once checked for in-band errors.
pub struct AlphaVantage {
    upstream: Upstream,
    url: String,
    api_key: String,
}

impl AlphaVantage {
    pub fn new(upstream: Upstream, cfg: &AlphaVantageConfig) -> Self {
        Self {
            upstream,
            url: cfg.url.clone(),
            api_key: cfg.api_key.clone(),
        }
    }

    pub async fn real_gdp(&self, interval: GdpInterval) -> ProviderResult<Value> {
        info!("Fetching Real GDP data ({})", interval);
        self.call("REAL_GDP", vec![("interval", interval.to_string())])
            .await
    }

    pub async fn cpi(&self, interval: CpiInterval) -> ProviderResult<Value> {
        info!("Fetching CPI data ({})", interval);
        self.call("CPI", vec![("interval", interval.to_string())]).await
    }

    pub async fn inflation(&self) -> ProviderResult<Value> {
        info!("Fetching inflation data");
        self.call("INFLATION", vec![]).await
    }

    pub async fn unemployment(&self) -> ProviderResult<Value> {
        info!("Fetching unemployment rate");
        self.call("UNEMPLOYMENT", vec![]).await
    }

    pub async fn federal_funds_rate(&self, interval: SeriesInterval) -> ProviderResult<Value> {
        info!("Fetching Federal Funds Rate ({})", interval);
        self.call("FEDERAL_FUNDS_RATE", vec![("interval", interval.to_string())])
            .await
    }

    pub async fn treasury_yield(
        &self,
        interval: SeriesInterval,
        maturity: Maturity,
    ) -> ProviderResult<Value> {
        info!("Fetching Treasury Yield ({}, {})", maturity, interval);
        self.call(
            "TREASURY_YIELD",
            vec![
                ("interval", interval.to_string()),
                ("maturity", maturity.to_string()),
            ],
        )
        .await
    }

    /// Realtime rate; also serves crypto pairs such as BTC/USD.
    pub async fn exchange_rate(&self, from: &str, to: &str) -> ProviderResult<Value> {
        info!("Fetching exchange rate: {}/{}", from, to);
        self.call(
            "CURRENCY_EXCHANGE_RATE",
            vec![
                ("from_currency", from.to_string()),
                ("to_currency", to.to_string()),
            ],
        )
        .await
    }

    pub async fn forex_daily(
        &self,
        from: &str,
        to: &str,
        outputsize: OutputSize,
    ) -> ProviderResult<Value> {
        info!("Fetching Forex daily data: {}/{}", from, to);
        self.call(
            "FX_DAILY",
            vec![
                ("from_symbol", from.to_string()),
                ("to_symbol", to.to_string()),
                ("outputsize", outputsize.to_string()),
            ],
        )
        .await
    }

    pub async fn crude_oil_wti(&self, interval: SeriesInterval) -> ProviderResult<Value> {
        info!("Fetching Crude Oil WTI prices ({})", interval);
        self.call("WTI", vec![("interval", interval.to_string())]).await
    }

    pub async fn crude_oil_brent(&self, interval: SeriesInterval) -> ProviderResult<Value> {
        info!("Fetching Crude Oil Brent prices ({})", interval);
        self.call("BRENT", vec![("interval", interval.to_string())]).await
    }

    pub async fn natural_gas(&self, interval: SeriesInterval) -> ProviderResult<Value> {
        info!("Fetching Natural Gas prices ({})", interval);
        self.call("NATURAL_GAS", vec![("interval", interval.to_string())])
            .await
    }

    pub async fn copper(&self, interval: CopperInterval) -> ProviderResult<Value> {
        info!("Fetching Copper prices ({})", interval);
        self.call("COPPER", vec![("interval", interval.to_string())])
            .await
    }

    pub async fn global_quote(&self, symbol: &str) -> ProviderResult<Value> {
        info!("Fetching quote for {}", symbol);
        self.call("GLOBAL_QUOTE", vec![("symbol", symbol.to_string())])
            .await
    }

    pub async fn news(
        &self,
        tickers: Option<&str>,
        topics: Option<&str>,
        limit: u32,
    ) -> ProviderResult<Value> {
        info!("Fetching market news (limit {})", limit);
        let mut params = vec![("limit", limit.to_string())];
        if let Some(t) = tickers {
            params.push(("tickers", t.to_string()));
        }
        if let Some(t) = topics {
            params.push(("topics", t.to_string()));
        }
        self.call("NEWS_SENTIMENT", params).await
    }

    pub async fn crypto_daily(&self, symbol: &str, market: &str) -> ProviderResult<Value> {
        info!("Fetching crypto daily data: {}/{}", symbol, market);
        self.call(
            "DIGITAL_CURRENCY_DAILY",
            vec![("symbol", symbol.to_string()), ("market", market.to_string())],
        )
        .await
    }

    pub async fn top_gainers_losers(&self) -> ProviderResult<Value> {
        info!("Fetching top gainers & losers");
        self.call("TOP_GAINERS_LOSERS", vec![]).await
    }

    async fn call(
        &self,
        function: &'static str,
        params: Vec<(&'static str, String)>,
    ) -> ProviderResult<Value> {
        let mut query = vec![("function", function.to_string())];
        query.extend(params);
        query.push(("apikey", self.api_key.clone()));
        let body: Value = self.upstream.get_json(&self.url, &query, None).await?;
        check_body(function, body)
    }
}

/// Alpha Vantage reports failures with HTTP 200 and a single message key.
fn check_body(function: &str, body: Value) -> ProviderResult<Value> {
    let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);

    if let Some(message) = text("Error Message") {
        warn!("{}: {} failed: {}", PROVIDER, function, message);
        return Err(ProviderError::Api {
            provider: PROVIDER,
            message,
        });
    }
    if let Some(message) = text("Note").or_else(|| text("Information")) {
        warn!("{}: quota notice on {}: {}", PROVIDER, function, message);
        return Err(ProviderError::Quota {
            provider: PROVIDER,
            message,
        });
    }
    Ok(body)
}
