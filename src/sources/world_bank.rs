use crate::config::WorldBankConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::normalize::first_with_value;
use crate::upstream::Upstream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

const PROVIDER: &str = "world_bank";

/// World Bank indicators exposed under their own route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Gdp,
    GdpGrowth,
    GdpPerCapita,
    Population,
    Inflation,
    Unemployment,
    Poverty,
    LifeExpectancy,
    LiteracyRate,
    TertiaryEducation,
    Fdi,
    Exports,
    Imports,
    Co2Emissions,
    ElectricPower,
    InternetUsers,
    MobileSubscriptions,
}

impl Indicator {
    pub const ALL: [Indicator; 17] = [
        Indicator::Gdp,
        Indicator::GdpGrowth,
        Indicator::GdpPerCapita,
        Indicator::Population,
        Indicator::Inflation,
        Indicator::Unemployment,
        Indicator::Poverty,
        Indicator::LifeExpectancy,
        Indicator::LiteracyRate,
        Indicator::TertiaryEducation,
        Indicator::Fdi,
        Indicator::Exports,
        Indicator::Imports,
        Indicator::Co2Emissions,
        Indicator::ElectricPower,
        Indicator::InternetUsers,
        Indicator::MobileSubscriptions,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Indicator::Gdp => "NY.GDP.MKTP.CD",
            Indicator::GdpGrowth => "NY.GDP.MKTP.KD.ZG",
            Indicator::GdpPerCapita => "NY.GDP.PCAP.CD",
            Indicator::Population => "SP.POP.TOTL",
            Indicator::Inflation => "FP.CPI.TOTL.ZG",
            Indicator::Unemployment => "SL.UEM.TOTL.ZS",
            Indicator::Poverty => "SI.POV.DDAY",
            Indicator::LifeExpectancy => "SP.DYN.LE00.IN",
            Indicator::LiteracyRate => "SE.ADT.LITR.ZS",
            Indicator::TertiaryEducation => "SE.TER.ENRR",
            Indicator::Fdi => "BX.KLT.DINV.WD.GD.ZS",
            Indicator::Exports => "NE.EXP.GNFS.ZS",
            Indicator::Imports => "NE.IMP.GNFS.ZS",
            Indicator::Co2Emissions => "EN.ATM.CO2E.PC",
            Indicator::ElectricPower => "EG.USE.ELEC.KH.PC",
            Indicator::InternetUsers => "IT.NET.USER.ZS",
            Indicator::MobileSubscriptions => "IT.CEL.SETS.P2",
        }
    }

    /// Path segment under `world-bank/`.
    pub fn slug(self) -> &'static str {
        match self {
            Indicator::Gdp => "gdp",
            Indicator::GdpGrowth => "gdp-growth",
            Indicator::GdpPerCapita => "gdp-per-capita",
            Indicator::Population => "population",
            Indicator::Inflation => "inflation",
            Indicator::Unemployment => "unemployment",
            Indicator::Poverty => "poverty",
            Indicator::LifeExpectancy => "life-expectancy",
            Indicator::LiteracyRate => "literacy-rate",
            Indicator::TertiaryEducation => "tertiary-education",
            Indicator::Fdi => "fdi",
            Indicator::Exports => "exports",
            Indicator::Imports => "imports",
            Indicator::Co2Emissions => "co2-emissions",
            Indicator::ElectricPower => "electric-power",
            Indicator::InternetUsers => "internet-users",
            Indicator::MobileSubscriptions => "mobile-subscriptions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdValue {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator: Option<IdValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<IdValue>,
    #[serde(default)]
    pub countryiso3code: String,
    #[serde(default)]
    pub date: String,
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub obs_status: String,
    #[serde(default)]
    pub decimal: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Indicator payload. Paged `[metadata, data]` answers are split into named
/// fields; anything else (e.g. the API's own error message array) is relayed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IndicatorResponse {
    Series {
        metadata: Value,
        data: Vec<IndicatorPoint>,
    },
    Raw(Value),
}

impl IndicatorResponse {
    /// Newest non-null observation; the API lists most recent years first.
    pub fn latest(&self) -> Option<(&IndicatorPoint, f64)> {
        match self {
            IndicatorResponse::Series { data, .. } => first_with_value(data, |p| p.value),
            IndicatorResponse::Raw(_) => None,
        }
    }
}

/// Splits a `[metadata, page]` body; `None` when the body has another shape.
fn paged(body: &mut Value) -> Option<(Value, Value)> {
    match body.as_array_mut() {
        Some(items) if items.len() > 1 => Some((items[0].take(), items[1].take())),
        _ => None,
    }
}

pub struct WorldBank {
    upstream: Upstream,
    url: String,
}

impl WorldBank {
    pub fn new(upstream: Upstream, cfg: &WorldBankConfig) -> Self {
        Self {
            upstream,
            url: cfg.url.trim_end_matches('/').to_string(),
        }
    }

    /// The year range is applied only when both ends are given.
    pub async fn indicator(
        &self,
        country: &str,
        code: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> ProviderResult<IndicatorResponse> {
        let url = format!("{}/country/{}/indicator/{}", self.url, country, code);
        let mut query = vec![("format", "json".to_string()), ("per_page", "100".to_string())];
        if let (Some(start), Some(end)) = (start_year, end_year) {
            query.push(("date", format!("{}:{}", start, end)));
        }

        info!("Fetching World Bank indicator {} for {}", code, country);
        let mut body: Value = self.upstream.get_json(&url, &query, None).await?;
        match paged(&mut body) {
            Some((metadata, page)) => {
                let data = if page.is_null() {
                    Vec::new()
                } else {
                    serde_json::from_value(page).map_err(|e| ProviderError::decode(PROVIDER, e))?
                };
                Ok(IndicatorResponse::Series { metadata, data })
            }
            None => Ok(IndicatorResponse::Raw(body)),
        }
    }

    pub async fn named(
        &self,
        indicator: Indicator,
        country: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> ProviderResult<IndicatorResponse> {
        self.indicator(country, indicator.code(), start_year, end_year)
            .await
    }

    pub async fn country_info(&self, country: &str) -> ProviderResult<Value> {
        let url = format!("{}/country/{}", self.url, country);
        info!("Fetching World Bank country info for {}", country);
        let mut body: Value = self
            .upstream
            .get_json(&url, &[("format", "json".to_string())], None)
            .await?;
        match paged(&mut body) {
            Some((_, mut page)) => Ok(page
                .get_mut(0)
                .map(Value::take)
                .unwrap_or(Value::Null)),
            None => Ok(body),
        }
    }

    pub async fn countries(&self) -> ProviderResult<Value> {
        let url = format!("{}/country", self.url);
        info!("Fetching World Bank countries list");
        let mut body: Value = self
            .upstream
            .get_json(
                &url,
                &[("format", "json".to_string()), ("per_page", "300".to_string())],
                None,
            )
            .await?;
        match paged(&mut body) {
            Some((metadata, countries)) => Ok(json!({ "metadata": metadata, "countries": countries })),
            None => Ok(body),
        }
    }
}

/// Display name from a `country_info` answer.
pub fn country_name(info: &Value) -> Option<&str> {
    info.get("name").and_then(Value::as_str).filter(|n| !n.is_empty())
}
