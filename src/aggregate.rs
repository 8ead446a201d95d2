//! Composite views built from several provider calls.
//!
//! Sub-calls run concurrently and each keeps its own `Result`; a failed
//! call becomes a `null` leaf and never fails the composite.

use crate::error::ProviderResult;
use crate::sources::alpha_vantage::{AlphaVantage, GdpInterval, SeriesInterval};
use crate::sources::today;
use crate::sources::world_bank::{country_name, Indicator, IndicatorResponse, WorldBank};
use crate::types::IndicatorValue;
use chrono::{Datelike, SecondsFormat, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

fn settle<T>(label: &str, result: ProviderResult<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("{} unavailable, reported as null: {}", label, e);
            None
        }
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn last_year() -> i32 {
    today().year() - 1
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyEconomicSummary {
    pub timestamp: String,
    pub economic_indicators: EconomicIndicators,
    pub commodities: Commodities,
    pub forex: Forex,
    pub crypto: Crypto,
    pub stock_market: StockMarket,
    pub news: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EconomicIndicators {
    pub gdp: Option<Value>,
    pub inflation: Option<Value>,
    pub unemployment: Option<Value>,
    pub federal_funds_rate: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Commodities {
    pub crude_oil_wti: Option<Value>,
    pub crude_oil_brent: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forex {
    pub usd_eur: Option<Value>,
    pub usd_thb: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Crypto {
    pub btc_usd: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockMarket {
    pub sp500: Option<Value>,
}

impl DailyEconomicSummary {
    /// Sub-results that came back null.
    pub fn missing(&self) -> usize {
        [
            &self.economic_indicators.gdp,
            &self.economic_indicators.inflation,
            &self.economic_indicators.unemployment,
            &self.economic_indicators.federal_funds_rate,
            &self.commodities.crude_oil_wti,
            &self.commodities.crude_oil_brent,
            &self.forex.usd_eur,
            &self.forex.usd_thb,
            &self.crypto.btc_usd,
            &self.stock_market.sp500,
            &self.news,
        ]
        .iter()
        .filter(|v| v.is_none())
        .count()
    }
}

/// Eleven Alpha Vantage calls in one snapshot. Never fails.
pub async fn daily_economic_summary(av: &AlphaVantage) -> DailyEconomicSummary {
    info!("Fetching daily economic summary");
    let (gdp, inflation, unemployment, fed_funds, wti, brent, usd_eur, usd_thb, btc_usd, sp500, news) = tokio::join!(
        av.real_gdp(GdpInterval::Annual),
        av.inflation(),
        av.unemployment(),
        av.federal_funds_rate(SeriesInterval::Monthly),
        av.crude_oil_wti(SeriesInterval::Daily),
        av.crude_oil_brent(SeriesInterval::Daily),
        av.exchange_rate("USD", "EUR"),
        av.exchange_rate("USD", "THB"),
        av.exchange_rate("BTC", "USD"),
        av.global_quote("SPY"),
        av.news(None, Some("economy"), 10),
    );

    let summary = DailyEconomicSummary {
        timestamp: now_iso(),
        economic_indicators: EconomicIndicators {
            gdp: settle("real GDP", gdp),
            inflation: settle("inflation", inflation),
            unemployment: settle("unemployment", unemployment),
            federal_funds_rate: settle("federal funds rate", fed_funds),
        },
        commodities: Commodities {
            crude_oil_wti: settle("crude oil WTI", wti),
            crude_oil_brent: settle("crude oil Brent", brent),
        },
        forex: Forex {
            usd_eur: settle("USD/EUR", usd_eur),
            usd_thb: settle("USD/THB", usd_thb),
        },
        crypto: Crypto {
            btc_usd: settle("BTC/USD", btc_usd),
        },
        stock_market: StockMarket {
            sp500: settle("SPY quote", sp500),
        },
        news: settle("economy news", news),
    };
    let missing = summary.missing();
    if missing > 0 {
        warn!("Daily economic summary: {} of 11 sources unavailable", missing);
    }
    summary
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomicSummary {
    pub country: String,
    pub country_code: String,
    pub year: String,
    pub indicators: SummaryIndicators,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryIndicators {
    pub gdp: IndicatorValue,
    pub gdp_growth: IndicatorValue,
    pub gdp_per_capita: IndicatorValue,
    pub population: IndicatorValue,
    pub inflation: IndicatorValue,
    pub unemployment: IndicatorValue,
    pub fdi: IndicatorValue,
    pub exports: IndicatorValue,
    pub imports: IndicatorValue,
}

fn leaf(
    indicator: Indicator,
    label: &str,
    unit: &str,
    result: ProviderResult<IndicatorResponse>,
) -> IndicatorValue {
    let value = settle(indicator.code(), result).and_then(|r| r.latest().map(|(_, v)| v));
    IndicatorValue::new(value, label, unit)
}

/// Country info plus nine headline indicators for one year (default: last year).
pub async fn economic_summary(wb: &WorldBank, country: &str, year: Option<i32>) -> EconomicSummary {
    let year = year.unwrap_or_else(last_year);
    info!("Fetching economic summary for {} ({})", country, year);

    let y = Some(year);
    let (info, gdp, gdp_growth, gdp_per_capita, population, inflation, unemployment, fdi, exports, imports) = tokio::join!(
        wb.country_info(country),
        wb.named(Indicator::Gdp, country, y, y),
        wb.named(Indicator::GdpGrowth, country, y, y),
        wb.named(Indicator::GdpPerCapita, country, y, y),
        wb.named(Indicator::Population, country, y, y),
        wb.named(Indicator::Inflation, country, y, y),
        wb.named(Indicator::Unemployment, country, y, y),
        wb.named(Indicator::Fdi, country, y, y),
        wb.named(Indicator::Exports, country, y, y),
        wb.named(Indicator::Imports, country, y, y),
    );

    let indicators = SummaryIndicators {
        gdp: leaf(Indicator::Gdp, "GDP (current US$)", "USD", gdp),
        gdp_growth: leaf(Indicator::GdpGrowth, "GDP growth", "%", gdp_growth),
        gdp_per_capita: leaf(Indicator::GdpPerCapita, "GDP per capita", "USD", gdp_per_capita),
        population: leaf(Indicator::Population, "Population, total", "people", population),
        inflation: leaf(Indicator::Inflation, "Inflation, consumer prices", "%", inflation),
        unemployment: leaf(
            Indicator::Unemployment,
            "Unemployment, total",
            "% of labor force",
            unemployment,
        ),
        fdi: leaf(
            Indicator::Fdi,
            "Foreign direct investment, net inflows",
            "% of GDP",
            fdi,
        ),
        exports: leaf(Indicator::Exports, "Exports of goods and services", "% of GDP", exports),
        imports: leaf(Indicator::Imports, "Imports of goods and services", "% of GDP", imports),
    };

    let info = settle("country info", info);
    EconomicSummary {
        country: info
            .as_ref()
            .and_then(country_name)
            .unwrap_or(country)
            .to_string(),
        country_code: country.to_uppercase(),
        year: year.to_string(),
        indicators,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryComparison {
    pub indicator: String,
    pub year: i32,
    pub comparison: Vec<ComparisonEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonEntry {
    pub country: String,
    pub country_code: String,
    pub value: Option<f64>,
    pub year: String,
    pub unit: String,
    pub indicator: String,
}

async fn compare_one(wb: &WorldBank, country: &str, code: &str, year: i32) -> ComparisonEntry {
    let (info, data) = tokio::join!(
        wb.country_info(country),
        wb.indicator(country, code, Some(year), Some(year))
    );
    let info = settle(&format!("country info {}", country), info);
    let data = settle(&format!("{} for {}", code, country), data);
    let latest = data.as_ref().and_then(|d| d.latest());

    ComparisonEntry {
        country: info
            .as_ref()
            .and_then(country_name)
            .unwrap_or(country)
            .to_string(),
        country_code: country.to_uppercase(),
        value: latest.map(|(_, v)| v),
        year: latest
            .map(|(p, _)| p.date.clone())
            .unwrap_or_else(|| year.to_string()),
        unit: latest.map(|(p, _)| p.unit.clone()).unwrap_or_default(),
        indicator: latest
            .and_then(|(p, _)| p.indicator.as_ref())
            .map(|i| i.value.clone())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| code.to_string()),
    }
}

/// Values descending, missing values last; ties keep request order.
pub fn rank(entries: &mut [ComparisonEntry]) {
    entries.sort_by(|a, b| match (a.value, b.value) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

pub async fn compare_countries(
    wb: &WorldBank,
    countries: &[String],
    indicator: &str,
    year: Option<i32>,
) -> CountryComparison {
    let year = year.unwrap_or_else(last_year);
    info!(
        "Comparing indicator {} for countries: {}",
        indicator,
        countries.join(", ")
    );
    let mut comparison =
        join_all(countries.iter().map(|c| compare_one(wb, c, indicator, year))).await;
    rank(&mut comparison);
    CountryComparison {
        indicator: indicator.to_string(),
        year,
        comparison,
    }
}
