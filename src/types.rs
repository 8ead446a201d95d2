use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope shared by every Bank of Thailand gateway product.
/// Fields not modelled here are carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotEnvelope<D> {
    pub result: BotResult<D>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotResult<D> {
    #[serde(default)]
    pub api: String,
    #[serde(default)]
    pub timestamp: String,
    pub data: BotData<D>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotData<D> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_header: Option<Value>,
    #[serde(default = "Vec::new")]
    pub data_detail: Vec<D>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<D> BotEnvelope<D> {
    pub fn details(&self) -> &[D] {
        &self.result.data.data_detail
    }
}

/// One indicator leaf inside a composite summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorValue {
    pub value: Option<f64>,
    pub indicator: String,
    pub unit: String,
}

impl IndicatorValue {
    /// Unit is only reported alongside an actual value.
    pub fn new(value: Option<f64>, indicator: &str, unit: &str) -> Self {
        let unit = if value.is_some() { unit } else { "" };
        Self {
            value,
            indicator: indicator.to_string(),
            unit: unit.to_string(),
        }
    }
}

/// `{rate, timestamp}` answer of the current-rate route.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentRate {
    pub rate: f64,
    pub timestamp: String,
}
