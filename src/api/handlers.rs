//! Route handlers: parameter defaults and validation, then one provider or
//! aggregator call each.

use crate::aggregate::{self, CountryComparison, DailyEconomicSummary, EconomicSummary};
use crate::error::{ApiError, ProviderError};
use crate::sources::alpha_vantage::{CopperInterval, CpiInterval, GdpInterval, Maturity, OutputSize, SeriesInterval};
use crate::sources::bot_exchange::SpotRateResponse;
use crate::sources::bot_holidays::{HolidayDetail, HolidayResponse};
use crate::sources::bot_inflation::{AverageInflation, CurrentInflation, InflationResponse};
use crate::sources::bot_loan::{LatestLoanRates, LoanRateResponse};
use crate::sources::bot_policy::{CurrentPolicyRate, PolicyRateResponse};
use crate::sources::gold_thai::{GoldPriceResponse, GoldQuote};
use crate::sources::metal_price::{AllMetals, MetalPrice, MetalPriceResponse};
use crate::sources::world_bank::{Indicator, IndicatorResponse};
use crate::sources::SourceRegistry;
use crate::types::CurrentRate;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

pub struct AppState {
    pub sources: SourceRegistry,
}

pub type SharedState = Arc<AppState>;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Log the provider failure and map it to a response carrying `message`.
fn fail(message: &'static str) -> impl FnOnce(ProviderError) -> ApiError {
    move |e| {
        error!("{}: {}", message, e);
        ApiError::from_provider(e, message)
    }
}

fn query<T>(q: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    q.map(|Query(v)| v)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn path<T>(p: Result<Path<T>, PathRejection>) -> Result<T, ApiError> {
    p.map(|Path(v)| v)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Query parameter '{}' is required", name)))
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    timestamp: String,
}

pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        timestamp: now_iso(),
    })
}

// BOT exchange rate, loan rate, policy rate and inflation

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    start_period: Option<String>,
    end_period: Option<String>,
}

pub async fn spot_rate(
    State(state): State<SharedState>,
    q: Result<Query<PeriodQuery>, QueryRejection>,
) -> ApiResult<SpotRateResponse> {
    let q = query(q)?;
    state
        .sources
        .exchange_rate
        .spot_rate(q.start_period, q.end_period)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch spot rate"))
}

pub async fn current_rate(State(state): State<SharedState>) -> ApiResult<CurrentRate> {
    let rate = state
        .sources
        .exchange_rate
        .current_rate()
        .await
        .map_err(fail("Failed to fetch current exchange rate"))?;
    Ok(Json(CurrentRate {
        rate,
        timestamp: now_iso(),
    }))
}

pub async fn loan_individual(
    State(state): State<SharedState>,
    q: Result<Query<PeriodQuery>, QueryRejection>,
) -> ApiResult<LoanRateResponse> {
    let q = query(q)?;
    state
        .sources
        .loan_rate
        .individual(q.start_period, q.end_period)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch loan rates"))
}

pub async fn loan_average(
    State(state): State<SharedState>,
    q: Result<Query<PeriodQuery>, QueryRejection>,
) -> ApiResult<LoanRateResponse> {
    let q = query(q)?;
    state
        .sources
        .loan_rate
        .average(q.start_period, q.end_period)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch average loan rates"))
}

pub async fn loan_latest(State(state): State<SharedState>) -> ApiResult<LatestLoanRates> {
    state
        .sources
        .loan_rate
        .latest()
        .await
        .map(Json)
        .map_err(fail("Failed to fetch latest loan rates"))
}

pub async fn policy_rate(
    State(state): State<SharedState>,
    q: Result<Query<PeriodQuery>, QueryRejection>,
) -> ApiResult<PolicyRateResponse> {
    let q = query(q)?;
    state
        .sources
        .policy_rate
        .policy_rate(q.start_period, q.end_period)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch policy rate"))
}

pub async fn policy_rate_current(State(state): State<SharedState>) -> ApiResult<CurrentPolicyRate> {
    state
        .sources
        .policy_rate
        .current()
        .await
        .map(Json)
        .map_err(fail("Failed to fetch current policy rate"))
}

pub async fn policy_rate_by_year(
    State(state): State<SharedState>,
    year: Result<Path<i32>, PathRejection>,
) -> ApiResult<PolicyRateResponse> {
    let year = path(year)?;
    state
        .sources
        .policy_rate
        .by_year(year)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch policy rate for year"))
}

pub async fn inflation_cpi(
    State(state): State<SharedState>,
    q: Result<Query<PeriodQuery>, QueryRejection>,
) -> ApiResult<InflationResponse> {
    let q = query(q)?;
    state
        .sources
        .inflation
        .cpi(q.start_period, q.end_period)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch CPI data"))
}

pub async fn inflation_rate(
    State(state): State<SharedState>,
    q: Result<Query<PeriodQuery>, QueryRejection>,
) -> ApiResult<InflationResponse> {
    let q = query(q)?;
    state
        .sources
        .inflation
        .inflation_rate(q.start_period, q.end_period)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch inflation rate"))
}

pub async fn inflation_current(State(state): State<SharedState>) -> ApiResult<CurrentInflation> {
    state
        .sources
        .inflation
        .current()
        .await
        .map(Json)
        .map_err(fail("Failed to fetch current inflation"))
}

pub async fn inflation_by_year(
    State(state): State<SharedState>,
    year: Result<Path<i32>, PathRejection>,
) -> ApiResult<InflationResponse> {
    let year = path(year)?;
    state
        .sources
        .inflation
        .by_year(year)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch inflation for year"))
}

pub async fn inflation_average(
    State(state): State<SharedState>,
    year: Result<Path<i32>, PathRejection>,
) -> ApiResult<AverageInflation> {
    let year = path(year)?;
    state
        .sources
        .inflation
        .average(year)
        .await
        .map(Json)
        .map_err(fail("Failed to compute average inflation"))
}

// BOT holidays

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    limit: Option<usize>,
}

pub async fn holidays(
    State(state): State<SharedState>,
    q: Result<Query<YearQuery>, QueryRejection>,
) -> ApiResult<HolidayResponse> {
    let q = query(q)?;
    state
        .sources
        .holidays
        .holidays(q.year)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch holidays"))
}

pub async fn holidays_upcoming(
    State(state): State<SharedState>,
    q: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<HolidayResponse> {
    let q = query(q)?;
    state
        .sources
        .holidays
        .upcoming(q.limit.unwrap_or(5))
        .await
        .map(Json)
        .map_err(fail("Failed to fetch upcoming holidays"))
}

pub async fn holidays_check(
    State(state): State<SharedState>,
    date: Result<Path<String>, PathRejection>,
) -> ApiResult<Option<HolidayDetail>> {
    let date = path(date)?;
    state
        .sources
        .holidays
        .check(&date)
        .await
        .map(Json)
        .map_err(fail("Failed to check holiday"))
}

pub async fn holidays_by_month(
    State(state): State<SharedState>,
    ym: Result<Path<(i32, u32)>, PathRejection>,
) -> ApiResult<HolidayResponse> {
    let (year, month) = path(ym)?;
    state
        .sources
        .holidays
        .by_month(year, month)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch holidays by month"))
}

// Thai gold and global metals

pub async fn gold_thai_latest(State(state): State<SharedState>) -> ApiResult<GoldPriceResponse> {
    state
        .sources
        .gold_thai
        .latest()
        .await
        .map(Json)
        .map_err(fail("Failed to fetch Thai gold prices"))
}

pub async fn gold_thai_bar(State(state): State<SharedState>) -> ApiResult<GoldQuote> {
    state
        .sources
        .gold_thai
        .bar()
        .await
        .map(Json)
        .map_err(fail("Failed to fetch gold bar prices"))
}

pub async fn gold_thai_ornament(State(state): State<SharedState>) -> ApiResult<GoldQuote> {
    state
        .sources
        .gold_thai
        .ornament()
        .await
        .map(Json)
        .map_err(fail("Failed to fetch gold ornament prices"))
}

#[derive(Debug, Deserialize)]
pub struct RatesQuery {
    base: Option<String>,
    currencies: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConvertQuery {
    from: Option<String>,
    to: Option<String>,
    amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    base: Option<String>,
    currencies: Option<String>,
}

pub async fn metals_latest(
    State(state): State<SharedState>,
    q: Result<Query<RatesQuery>, QueryRejection>,
) -> ApiResult<MetalPriceResponse> {
    let q = query(q)?;
    state
        .sources
        .metal_price
        .latest(q.base, q.currencies)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch metal prices"))
}

pub async fn metals_gold(State(state): State<SharedState>) -> ApiResult<MetalPrice> {
    state
        .sources
        .metal_price
        .gold()
        .await
        .map(Json)
        .map_err(fail("Failed to fetch gold price"))
}

pub async fn metals_silver(State(state): State<SharedState>) -> ApiResult<MetalPrice> {
    state
        .sources
        .metal_price
        .silver()
        .await
        .map(Json)
        .map_err(fail("Failed to fetch silver price"))
}

pub async fn metals_all(State(state): State<SharedState>) -> ApiResult<AllMetals> {
    state
        .sources
        .metal_price
        .all_metals()
        .await
        .map(Json)
        .map_err(fail("Failed to fetch metal prices"))
}

pub async fn metals_convert(
    State(state): State<SharedState>,
    q: Result<Query<ConvertQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query(q)?;
    let from = required(q.from, "from")?;
    let to = required(q.to, "to")?;
    let amount = q
        .amount
        .filter(|a| a.is_finite())
        .ok_or_else(|| ApiError::BadRequest("Query parameter 'amount' is required".into()))?;
    state
        .sources
        .metal_price
        .convert(&from, &to, amount)
        .await
        .map(Json)
        .map_err(fail("Failed to convert currency"))
}

pub async fn metals_historical(
    State(state): State<SharedState>,
    date: Result<Path<String>, PathRejection>,
    q: Result<Query<RatesQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let date = path(date)?;
    let q = query(q)?;
    state
        .sources
        .metal_price
        .historical(&date, q.base, q.currencies)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch historical prices"))
}

pub async fn metals_change(
    State(state): State<SharedState>,
    q: Result<Query<ChangeQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query(q)?;
    let start = required(q.start_date, "start_date")?;
    let end = required(q.end_date, "end_date")?;
    state
        .sources
        .metal_price
        .change(&start, &end, q.base, q.currencies)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch price change"))
}

// Alpha Vantage

#[derive(Debug, Deserialize)]
pub struct IntervalQuery<I> {
    interval: Option<I>,
}

#[derive(Debug, Deserialize)]
pub struct TreasuryQuery {
    interval: Option<SeriesInterval>,
    maturity: Option<Maturity>,
}

#[derive(Debug, Deserialize)]
pub struct PairQuery {
    from: Option<String>,
    to: Option<String>,
    outputsize: Option<OutputSize>,
}

#[derive(Debug, Deserialize)]
pub struct SymbolQuery {
    symbol: Option<String>,
    market: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CryptoQuery {
    crypto: Option<String>,
    market: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewsQuery {
    tickers: Option<String>,
    topics: Option<String>,
    limit: Option<u32>,
}

pub async fn av_gdp(
    State(state): State<SharedState>,
    q: Result<Query<IntervalQuery<GdpInterval>>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query(q)?;
    state
        .sources
        .alpha_vantage
        .real_gdp(q.interval.unwrap_or_default())
        .await
        .map(Json)
        .map_err(fail("Failed to fetch real GDP"))
}

pub async fn av_cpi(
    State(state): State<SharedState>,
    q: Result<Query<IntervalQuery<CpiInterval>>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query(q)?;
    state
        .sources
        .alpha_vantage
        .cpi(q.interval.unwrap_or_default())
        .await
        .map(Json)
        .map_err(fail("Failed to fetch CPI"))
}

pub async fn av_inflation(State(state): State<SharedState>) -> ApiResult<Value> {
    state
        .sources
        .alpha_vantage
        .inflation()
        .await
        .map(Json)
        .map_err(fail("Failed to fetch inflation"))
}

pub async fn av_unemployment(State(state): State<SharedState>) -> ApiResult<Value> {
    state
        .sources
        .alpha_vantage
        .unemployment()
        .await
        .map(Json)
        .map_err(fail("Failed to fetch unemployment"))
}

pub async fn av_federal_funds_rate(
    State(state): State<SharedState>,
    q: Result<Query<IntervalQuery<SeriesInterval>>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query(q)?;
    state
        .sources
        .alpha_vantage
        .federal_funds_rate(q.interval.unwrap_or_default())
        .await
        .map(Json)
        .map_err(fail("Failed to fetch federal funds rate"))
}

pub async fn av_treasury_yield(
    State(state): State<SharedState>,
    q: Result<Query<TreasuryQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query(q)?;
    state
        .sources
        .alpha_vantage
        .treasury_yield(q.interval.unwrap_or_default(), q.maturity.unwrap_or_default())
        .await
        .map(Json)
        .map_err(fail("Failed to fetch treasury yield"))
}

pub async fn av_forex_rate(
    State(state): State<SharedState>,
    q: Result<Query<PairQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query(q)?;
    let from = required(q.from, "from")?;
    let to = required(q.to, "to")?;
    state
        .sources
        .alpha_vantage
        .exchange_rate(&from, &to)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch forex rate"))
}

pub async fn av_forex_daily(
    State(state): State<SharedState>,
    q: Result<Query<PairQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query(q)?;
    let from = required(q.from, "from")?;
    let to = required(q.to, "to")?;
    state
        .sources
        .alpha_vantage
        .forex_daily(&from, &to, q.outputsize.unwrap_or_default())
        .await
        .map(Json)
        .map_err(fail("Failed to fetch forex daily series"))
}

pub async fn av_oil_wti(
    State(state): State<SharedState>,
    q: Result<Query<IntervalQuery<SeriesInterval>>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query(q)?;
    state
        .sources
        .alpha_vantage
        .crude_oil_wti(q.interval.unwrap_or_default())
        .await
        .map(Json)
        .map_err(fail("Failed to fetch WTI prices"))
}

pub async fn av_oil_brent(
    State(state): State<SharedState>,
    q: Result<Query<IntervalQuery<SeriesInterval>>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query(q)?;
    state
        .sources
        .alpha_vantage
        .crude_oil_brent(q.interval.unwrap_or_default())
        .await
        .map(Json)
        .map_err(fail("Failed to fetch Brent prices"))
}

pub async fn av_natural_gas(
    State(state): State<SharedState>,
    q: Result<Query<IntervalQuery<SeriesInterval>>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query(q)?;
    state
        .sources
        .alpha_vantage
        .natural_gas(q.interval.unwrap_or_default())
        .await
        .map(Json)
        .map_err(fail("Failed to fetch natural gas prices"))
}

pub async fn av_copper(
    State(state): State<SharedState>,
    q: Result<Query<IntervalQuery<CopperInterval>>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query(q)?;
    state
        .sources
        .alpha_vantage
        .copper(q.interval.unwrap_or_default())
        .await
        .map(Json)
        .map_err(fail("Failed to fetch copper prices"))
}

pub async fn av_quote(
    State(state): State<SharedState>,
    q: Result<Query<SymbolQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let symbol = required(query(q)?.symbol, "symbol")?;
    state
        .sources
        .alpha_vantage
        .global_quote(&symbol)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch stock quote"))
}

pub async fn av_top_gainers_losers(State(state): State<SharedState>) -> ApiResult<Value> {
    state
        .sources
        .alpha_vantage
        .top_gainers_losers()
        .await
        .map(Json)
        .map_err(fail("Failed to fetch top gainers and losers"))
}

pub async fn av_news(
    State(state): State<SharedState>,
    q: Result<Query<NewsQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query(q)?;
    state
        .sources
        .alpha_vantage
        .news(q.tickers.as_deref(), q.topics.as_deref(), q.limit.unwrap_or(50))
        .await
        .map(Json)
        .map_err(fail("Failed to fetch market news"))
}

pub async fn av_crypto_rate(
    State(state): State<SharedState>,
    q: Result<Query<CryptoQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query(q)?;
    let crypto = required(q.crypto, "crypto")?;
    let market = q.market.unwrap_or_else(|| "USD".into());
    state
        .sources
        .alpha_vantage
        .exchange_rate(&crypto, &market)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch crypto rate"))
}

pub async fn av_crypto_daily(
    State(state): State<SharedState>,
    q: Result<Query<SymbolQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query(q)?;
    let symbol = required(q.symbol, "symbol")?;
    let market = q.market.unwrap_or_else(|| "USD".into());
    state
        .sources
        .alpha_vantage
        .crypto_daily(&symbol, &market)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch crypto daily series"))
}

pub async fn av_daily_summary(State(state): State<SharedState>) -> Json<DailyEconomicSummary> {
    Json(aggregate::daily_economic_summary(&state.sources.alpha_vantage).await)
}

// World Bank

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryRangeQuery {
    country: Option<String>,
    indicator: Option<String>,
    start_year: Option<i32>,
    end_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CountryYearQuery {
    country: Option<String>,
    year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    countries: Option<String>,
    indicator: Option<String>,
    year: Option<i32>,
}

/// One of the fixed-code indicator routes, e.g. `world-bank/gdp`.
pub async fn world_bank_named(
    state: SharedState,
    q: Result<Query<CountryRangeQuery>, QueryRejection>,
    indicator: Indicator,
) -> ApiResult<IndicatorResponse> {
    let q = query(q)?;
    let country = required(q.country, "country")?;
    state
        .sources
        .world_bank
        .named(indicator, &country, q.start_year, q.end_year)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch World Bank indicator"))
}

pub async fn world_bank_indicator(
    State(state): State<SharedState>,
    q: Result<Query<CountryRangeQuery>, QueryRejection>,
) -> ApiResult<IndicatorResponse> {
    let q = query(q)?;
    let country = required(q.country, "country")?;
    let code = required(q.indicator, "indicator")?;
    state
        .sources
        .world_bank
        .indicator(&country, &code, q.start_year, q.end_year)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch World Bank indicator"))
}

pub async fn world_bank_country_info(
    State(state): State<SharedState>,
    q: Result<Query<CountryYearQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let country = required(query(q)?.country, "country")?;
    state
        .sources
        .world_bank
        .country_info(&country)
        .await
        .map(Json)
        .map_err(fail("Failed to fetch country info"))
}

pub async fn world_bank_countries(State(state): State<SharedState>) -> ApiResult<Value> {
    state
        .sources
        .world_bank
        .countries()
        .await
        .map(Json)
        .map_err(fail("Failed to fetch countries"))
}

pub async fn world_bank_economic_summary(
    State(state): State<SharedState>,
    q: Result<Query<CountryYearQuery>, QueryRejection>,
) -> ApiResult<EconomicSummary> {
    let q = query(q)?;
    let country = required(q.country, "country")?;
    Ok(Json(
        aggregate::economic_summary(&state.sources.world_bank, &country, q.year).await,
    ))
}

/// `countries` is a comma-separated list of country codes.
pub fn split_countries(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn world_bank_compare(
    State(state): State<SharedState>,
    q: Result<Query<CompareQuery>, QueryRejection>,
) -> ApiResult<CountryComparison> {
    let q = query(q)?;
    let countries = split_countries(&required(q.countries, "countries")?);
    if countries.is_empty() {
        return Err(ApiError::BadRequest(
            "Query parameter 'countries' must name at least one country".into(),
        ));
    }
    let indicator = required(q.indicator, "indicator")?;
    Ok(Json(
        aggregate::compare_countries(&state.sources.world_bank, &countries, &indicator, q.year)
            .await,
    ))
}
