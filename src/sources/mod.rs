pub mod alpha_vantage;
pub mod bot_exchange;
pub mod bot_holidays;
pub mod bot_inflation;
pub mod bot_loan;
pub mod bot_policy;
pub mod gold_thai;
pub mod metal_price;
pub mod world_bank;

use crate::config::Config;
use crate::upstream::Upstream;
use chrono::{NaiveDate, Utc};

/// Provider defaults are computed against the UTC calendar date.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Every upstream provider, each wired to its own slice of the config.
pub struct SourceRegistry {
    pub exchange_rate: bot_exchange::BotExchangeRate,
    pub loan_rate: bot_loan::BotLoanRate,
    pub holidays: bot_holidays::BotHolidays,
    pub policy_rate: bot_policy::BotPolicyRate,
    pub inflation: bot_inflation::BotInflation,
    pub gold_thai: gold_thai::GoldThai,
    pub metal_price: metal_price::MetalPriceApi,
    pub alpha_vantage: alpha_vantage::AlphaVantage,
    pub world_bank: world_bank::WorldBank,
}

impl SourceRegistry {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        let p = &config.providers;
        // BOT products share one key and therefore one quota.
        let bot = Upstream::new(client.clone(), "bot", p.bot.rate_limit_per_minute);

        Self {
            exchange_rate: bot_exchange::BotExchangeRate::new(bot.clone(), &p.bot),
            loan_rate: bot_loan::BotLoanRate::new(bot.clone(), &p.bot),
            holidays: bot_holidays::BotHolidays::new(bot.clone(), &p.bot),
            policy_rate: bot_policy::BotPolicyRate::new(bot.clone(), &p.bot),
            inflation: bot_inflation::BotInflation::new(bot, &p.bot),
            gold_thai: gold_thai::GoldThai::new(
                Upstream::new(client.clone(), "gold_thai", p.gold_thai.rate_limit_per_minute),
                &p.gold_thai,
            ),
            metal_price: metal_price::MetalPriceApi::new(
                Upstream::new(client.clone(), "metal_price", p.metal_price.rate_limit_per_minute),
                &p.metal_price,
            ),
            alpha_vantage: alpha_vantage::AlphaVantage::new(
                Upstream::new(
                    client.clone(),
                    "alpha_vantage",
                    p.alpha_vantage.rate_limit_per_minute,
                ),
                &p.alpha_vantage,
            ),
            world_bank: world_bank::WorldBank::new(
                Upstream::new(client, "world_bank", p.world_bank.rate_limit_per_minute),
                &p.world_bank,
            ),
        }
    }
}
