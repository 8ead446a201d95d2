use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const BOT_GATEWAY: &str = "https://gateway.api.bot.or.th";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub gold_thai: GoldThaiConfig,
    #[serde(default)]
    pub metal_price: MetalPriceConfig,
    #[serde(default)]
    pub alpha_vantage: AlphaVantageConfig,
    #[serde(default)]
    pub world_bank: WorldBankConfig,
}

/// All Bank of Thailand gateway products share one API key.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(skip)]
    pub api_key: String,
    #[serde(default = "default_bot_exchange_rate_url")]
    pub exchange_rate_url: String,
    #[serde(default = "default_bot_loan_rate_url")]
    pub loan_rate_url: String,
    #[serde(default = "default_bot_avg_loan_rate_url")]
    pub avg_loan_rate_url: String,
    #[serde(default = "default_bot_holiday_url")]
    pub holiday_url: String,
    #[serde(default = "default_bot_policy_rate_url")]
    pub policy_rate_url: String,
    #[serde(default = "default_bot_cpi_url")]
    pub cpi_url: String,
    #[serde(default = "default_bot_inflation_url")]
    pub inflation_url: String,
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            exchange_rate_url: default_bot_exchange_rate_url(),
            loan_rate_url: default_bot_loan_rate_url(),
            avg_loan_rate_url: default_bot_avg_loan_rate_url(),
            holiday_url: default_bot_holiday_url(),
            policy_rate_url: default_bot_policy_rate_url(),
            cpi_url: default_bot_cpi_url(),
            inflation_url: default_bot_inflation_url(),
            rate_limit_per_minute: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoldThaiConfig {
    #[serde(default = "default_gold_thai_url")]
    pub url: String,
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,
}

impl Default for GoldThaiConfig {
    fn default() -> Self {
        Self {
            url: default_gold_thai_url(),
            rate_limit_per_minute: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetalPriceConfig {
    #[serde(skip)]
    pub api_key: String,
    /// The `/latest` endpoint; sibling endpoints are derived from it.
    #[serde(default = "default_metal_price_url")]
    pub url: String,
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,
}

impl Default for MetalPriceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: default_metal_price_url(),
            rate_limit_per_minute: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlphaVantageConfig {
    #[serde(skip)]
    pub api_key: String,
    #[serde(default = "default_alpha_vantage_url")]
    pub url: String,
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,
}

impl Default for AlphaVantageConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: default_alpha_vantage_url(),
            rate_limit_per_minute: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorldBankConfig {
    #[serde(default = "default_world_bank_url")]
    pub url: String,
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,
}

impl Default for WorldBankConfig {
    fn default() -> Self {
        Self {
            url: default_world_bank_url(),
            rate_limit_per_minute: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3002
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("pawn-market-data/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_bot_exchange_rate_url() -> String {
    format!("{}/Stat-ExchangeRate/v2/DAILY_AVG_EXG_RATE/", BOT_GATEWAY)
}

fn default_bot_loan_rate_url() -> String {
    format!("{}/LoanRate/v2/loan_rate/", BOT_GATEWAY)
}

fn default_bot_avg_loan_rate_url() -> String {
    format!("{}/LoanRate/v2/avg_loan_rate/", BOT_GATEWAY)
}

fn default_bot_holiday_url() -> String {
    format!("{}/financial-institutions-holidays/", BOT_GATEWAY)
}

fn default_bot_policy_rate_url() -> String {
    format!("{}/PolicyRate/v2/policy_rate/", BOT_GATEWAY)
}

fn default_bot_cpi_url() -> String {
    format!("{}/EconomicIndicators/v2/cpi/", BOT_GATEWAY)
}

fn default_bot_inflation_url() -> String {
    format!("{}/EconomicIndicators/v2/inflation/", BOT_GATEWAY)
}

fn default_gold_thai_url() -> String {
    "https://api.chnwt.dev/thai-gold-api".to_string()
}

fn default_metal_price_url() -> String {
    "https://api.metalpriceapi.com/v1/latest".to_string()
}

fn default_alpha_vantage_url() -> String {
    "https://www.alphavantage.co/query".to_string()
}

fn default_world_bank_url() -> String {
    "https://api.worldbank.org/v2".to_string()
}

impl Config {
    /// Load from YAML. A missing file at the default location yields defaults;
    /// a missing file that was asked for explicitly is an error.
    pub fn load(path: &Path, explicit: bool) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("parsing {}", path.display()))?
        } else if explicit {
            anyhow::bail!("config file {} not found", path.display());
        } else {
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables. Keys only ever come from here.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let p = &mut self.providers;

        if let Some(v) = get("BOT_API_KEY") {
            p.bot.api_key = v;
        }
        if let Some(v) = get("GOLD_API_KEY") {
            p.metal_price.api_key = v;
        }
        if let Some(v) = get("Alpha_Vantage_key") {
            p.alpha_vantage.api_key = v;
        }

        let urls: [(&str, &mut String); 11] = [
            ("BOT_EXCHANGE_RATE_API_URL", &mut p.bot.exchange_rate_url),
            ("BOT_LOAN_RATE_API_URL", &mut p.bot.loan_rate_url),
            ("BOT_AVG_LOAN_RATE_API_URL", &mut p.bot.avg_loan_rate_url),
            ("BOT_HOLIDAY_API_URL", &mut p.bot.holiday_url),
            ("BOT_POLICY_RATE_API_URL", &mut p.bot.policy_rate_url),
            ("BOT_CPI_API_URL", &mut p.bot.cpi_url),
            ("BOT_INFLATION_API_URL", &mut p.bot.inflation_url),
            ("GOLD_THAI_API_URL", &mut p.gold_thai.url),
            ("GOLD_GLOBAL_API_URL", &mut p.metal_price.url),
            ("ALPHA_VANTAGE_API_URL", &mut p.alpha_vantage.url),
            ("WORLD_BANK_API_URL", &mut p.world_bank.url),
        ];
        for (key, slot) in urls {
            if let Some(v) = get(key) {
                *slot = v;
            }
        }

        if let Some(origin) = get("FRONTEND_URL") {
            if !self.server.cors_origins.contains(&origin) {
                self.server.cors_origins.push(origin);
            }
        }
        if let Some(port) = get("BACKEND_PORT").and_then(|v| parse_port(&v)) {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }
        if self.upstream.timeout_secs == 0 {
            anyhow::bail!("upstream.timeout_secs must be non-zero");
        }

        let p = &self.providers;
        let urls = [
            ("providers.bot.exchange_rate_url", &p.bot.exchange_rate_url),
            ("providers.bot.loan_rate_url", &p.bot.loan_rate_url),
            ("providers.bot.avg_loan_rate_url", &p.bot.avg_loan_rate_url),
            ("providers.bot.holiday_url", &p.bot.holiday_url),
            ("providers.bot.policy_rate_url", &p.bot.policy_rate_url),
            ("providers.bot.cpi_url", &p.bot.cpi_url),
            ("providers.bot.inflation_url", &p.bot.inflation_url),
            ("providers.gold_thai.url", &p.gold_thai.url),
            ("providers.metal_price.url", &p.metal_price.url),
            ("providers.alpha_vantage.url", &p.alpha_vantage.url),
            ("providers.world_bank.url", &p.world_bank.url),
        ];
        for (name, url) in urls {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("{} must be an http(s) URL, got '{}'", name, url);
            }
        }

        let limits = [
            ("bot", p.bot.rate_limit_per_minute),
            ("gold_thai", p.gold_thai.rate_limit_per_minute),
            ("metal_price", p.metal_price.rate_limit_per_minute),
            ("alpha_vantage", p.alpha_vantage.rate_limit_per_minute),
            ("world_bank", p.world_bank.rate_limit_per_minute),
        ];
        for (name, limit) in limits {
            if limit == Some(0) {
                anyhow::bail!(
                    "providers.{}.rate_limit_per_minute must be positive when set",
                    name
                );
            }
        }
        Ok(())
    }

    /// Names of providers whose API key is missing.
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let p = &self.providers;
        let mut missing = Vec::new();
        if p.bot.api_key.is_empty() {
            missing.push("BOT_API_KEY");
        }
        if p.metal_price.api_key.is_empty() {
            missing.push("GOLD_API_KEY");
        }
        if p.alpha_vantage.api_key.is_empty() {
            missing.push("Alpha_Vantage_key");
        }
        missing
    }
}

/// `BACKEND_PORT` holds either a bare port or a URL such as
/// `http://localhost:3002`.
fn parse_port(raw: &str) -> Option<u16> {
    raw.trim()
        .trim_end_matches('/')
        .rsplit(':')
        .next()
        .and_then(|p| p.parse().ok())
}
