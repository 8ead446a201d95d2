use super::handlers::{self, AppState, SharedState};
use crate::config::ServerConfig;
use crate::sources::world_bank::Indicator;
use crate::sources::SourceRegistry;
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub const API_PREFIX: &str = "/api/external-api";

fn cors(origins: &[String]) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);
    if origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }
    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin '{}'", o))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

fn api_routes() -> Router<SharedState> {
    let mut router = Router::new()
        // Bank of Thailand
        .route("/bot/spot-rate", get(handlers::spot_rate))
        .route("/bot/current-rate", get(handlers::current_rate))
        .route("/loan-rate/individual", get(handlers::loan_individual))
        .route("/loan-rate/average", get(handlers::loan_average))
        .route("/loan-rate/latest", get(handlers::loan_latest))
        .route("/holidays", get(handlers::holidays))
        .route("/holidays/upcoming", get(handlers::holidays_upcoming))
        .route("/holidays/check/:date", get(handlers::holidays_check))
        .route("/holidays/by-month/:year/:month", get(handlers::holidays_by_month))
        .route("/policy-rate", get(handlers::policy_rate))
        .route("/policy-rate/current", get(handlers::policy_rate_current))
        .route("/policy-rate/year/:year", get(handlers::policy_rate_by_year))
        .route("/inflation/cpi", get(handlers::inflation_cpi))
        .route("/inflation/rate", get(handlers::inflation_rate))
        .route("/inflation/current", get(handlers::inflation_current))
        .route("/inflation/year/:year", get(handlers::inflation_by_year))
        .route("/inflation/average/:year", get(handlers::inflation_average))
        // Gold and metals
        .route("/gold-thai/latest", get(handlers::gold_thai_latest))
        .route("/gold-thai/bar", get(handlers::gold_thai_bar))
        .route("/gold-thai/ornament", get(handlers::gold_thai_ornament))
        .route("/gold-global/latest", get(handlers::metals_latest))
        .route("/gold-global/gold", get(handlers::metals_gold))
        .route("/gold-global/silver", get(handlers::metals_silver))
        .route("/gold-global/all-metals", get(handlers::metals_all))
        .route("/gold-global/convert", get(handlers::metals_convert))
        .route("/gold-global/historical/:date", get(handlers::metals_historical))
        .route("/gold-global/change", get(handlers::metals_change))
        // Alpha Vantage
        .route("/alpha-vantage/economic/gdp", get(handlers::av_gdp))
        .route("/alpha-vantage/economic/cpi", get(handlers::av_cpi))
        .route("/alpha-vantage/economic/inflation", get(handlers::av_inflation))
        .route("/alpha-vantage/economic/unemployment", get(handlers::av_unemployment))
        .route(
            "/alpha-vantage/economic/federal-funds-rate",
            get(handlers::av_federal_funds_rate),
        )
        .route(
            "/alpha-vantage/economic/treasury-yield",
            get(handlers::av_treasury_yield),
        )
        .route("/alpha-vantage/forex/rate", get(handlers::av_forex_rate))
        .route("/alpha-vantage/forex/daily", get(handlers::av_forex_daily))
        .route("/alpha-vantage/commodities/oil-wti", get(handlers::av_oil_wti))
        .route("/alpha-vantage/commodities/oil-brent", get(handlers::av_oil_brent))
        .route("/alpha-vantage/commodities/natural-gas", get(handlers::av_natural_gas))
        .route("/alpha-vantage/commodities/copper", get(handlers::av_copper))
        .route("/alpha-vantage/stock/quote", get(handlers::av_quote))
        .route(
            "/alpha-vantage/stock/top-gainers-losers",
            get(handlers::av_top_gainers_losers),
        )
        .route("/alpha-vantage/news", get(handlers::av_news))
        .route("/alpha-vantage/crypto/rate", get(handlers::av_crypto_rate))
        .route("/alpha-vantage/crypto/daily", get(handlers::av_crypto_daily))
        .route("/alpha-vantage/summary/daily", get(handlers::av_daily_summary))
        // World Bank
        .route("/world-bank/indicator", get(handlers::world_bank_indicator))
        .route("/world-bank/country-info", get(handlers::world_bank_country_info))
        .route("/world-bank/countries", get(handlers::world_bank_countries))
        .route(
            "/world-bank/economic-summary",
            get(handlers::world_bank_economic_summary),
        )
        .route("/world-bank/compare-countries", get(handlers::world_bank_compare));

    for indicator in Indicator::ALL {
        router = router.route(
            &format!("/world-bank/{}", indicator.slug()),
            get(
                move |State(state): State<SharedState>,
                      q: Result<Query<handlers::CountryRangeQuery>, QueryRejection>| async move {
                    handlers::world_bank_named(state, q, indicator).await
                },
            ),
        );
    }
    router
}

pub fn router(sources: SourceRegistry, cors_origins: &[String]) -> Result<Router> {
    let state: SharedState = Arc::new(AppState { sources });
    Ok(Router::new()
        .route("/health", get(handlers::health))
        .nest(API_PREFIX, api_routes())
        .with_state(state)
        .layer(cors(cors_origins)?)
        .layer(TraceLayer::new_for_http()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}

/// Serve until Ctrl-C.
pub async fn serve(cfg: &ServerConfig, sources: SourceRegistry) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;
    let app = router(sources, &cfg.cors_origins)?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Market data API listening on http://{}{}", addr, API_PREFIX);
    if cfg.cors_origins.is_empty() {
        info!("CORS: any origin");
    } else {
        info!("CORS: {}", cfg.cors_origins.join(", "));
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testutil::{client, has_param, StubUpstream};
    use axum::{http::StatusCode, response::IntoResponse, Json};
    use serde_json::{json, Value};

    /// Every provider pointed at one stub, each under its own path.
    fn config_for(stub: &StubUpstream) -> Config {
        let mut cfg = Config::default();
        let p = &mut cfg.providers;
        p.bot.exchange_rate_url = stub.url("/bot/rates");
        p.bot.holiday_url = stub.url("/bot/holidays");
        p.gold_thai.url = stub.url("/gold");
        p.metal_price.url = stub.url("/metals/latest");
        p.alpha_vantage.url = stub.url("/av");
        p.world_bank.url = stub.url("/wb");
        cfg
    }

    async fn upstream() -> StubUpstream {
        StubUpstream::start(
            Router::new()
                .route(
                    "/bot/rates",
                    axum::routing::get(|| async {
                        Json(json!({ "result": { "api": "x", "timestamp": "t", "data": {
                            "data_detail": [{ "period": "Spot", "bid": "33.85", "offer": "33.95" }]
                        } } }))
                    }),
                )
                .route(
                    "/bot/holidays",
                    axum::routing::get(|| async { Json(json!([{ "Date": "2024-04-06" }])) }),
                )
                .route(
                    "/gold/latest",
                    axum::routing::get(|| async { StatusCode::BAD_GATEWAY.into_response() }),
                )
                .route(
                    "/av",
                    axum::routing::get(|| async { Json(json!({ "ok": true })) }),
                )
                .route(
                    "/wb/country/:country",
                    axum::routing::get(|| async { Json(json!([{ "page": 1 }, [{ "name": "Somewhere" }]])) }),
                )
                .route(
                    "/wb/country/:country/indicator/:code",
                    axum::routing::get(|axum::extract::Path((country, code)): axum::extract::Path<(String, String)>| async move {
                        let value = if country == "US" { json!(2.0) } else { json!(1.0) };
                        Json(json!([{ "page": 1 }, [{ "indicator": { "id": code, "value": "X" }, "date": "2023", "value": value }]]))
                    }),
                ),
        )
        .await
    }

    async fn spawn(cfg: &Config) -> String {
        let app = router(SourceRegistry::new(client(), cfg), &cfg.server.cors_origins).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn get_json(url: String) -> (u16, Value) {
        let resp = client().get(url).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let stub = upstream().await;
        let base = spawn(&config_for(&stub)).await;
        let (status, body) = get_json(format!("{}/health", base)).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn current_rate_is_served_under_prefix() {
        let stub = upstream().await;
        let base = spawn(&config_for(&stub)).await;
        let (status, body) = get_json(format!("{}{}/bot/current-rate", base, API_PREFIX)).await;
        assert_eq!(status, 200);
        assert_eq!(body["rate"], 33.9);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn upstream_failure_is_503_with_generic_message() {
        let stub = upstream().await;
        let base = spawn(&config_for(&stub)).await;
        let (status, body) = get_json(format!("{}{}/gold-thai/bar", base, API_PREFIX)).await;
        assert_eq!(status, 503);
        assert_eq!(body["statusCode"], 503);
        assert_eq!(body["code"], "UPSTREAM_UNAVAILABLE");
        assert_eq!(body["message"], "Failed to fetch gold bar prices");
    }

    #[tokio::test]
    async fn invalid_parameters_are_400() {
        let stub = upstream().await;
        let base = spawn(&config_for(&stub)).await;

        let (status, body) =
            get_json(format!("{}{}/holidays/by-month/2024/13", base, API_PREFIX)).await;
        assert_eq!(status, 400);
        assert_eq!(body["code"], "BAD_REQUEST");
        assert_eq!(stub.hits("/bot/holidays"), 0);

        let (status, _) = get_json(format!(
            "{}{}/alpha-vantage/economic/gdp?interval=weekly",
            base, API_PREFIX
        ))
        .await;
        assert_eq!(status, 400);
        assert_eq!(stub.hits("/av"), 0);

        let (status, _) = get_json(format!("{}{}/world-bank/gdp", base, API_PREFIX)).await;
        assert_eq!(status, 400);

        let (status, _) =
            get_json(format!("{}{}/holidays/check/2024-13-45", base, API_PREFIX)).await;
        assert_eq!(status, 400);

        let (status, _) =
            get_json(format!("{}{}/gold-global/historical/convert", base, API_PREFIX)).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn named_world_bank_route_uses_its_code() {
        let stub = upstream().await;
        let base = spawn(&config_for(&stub)).await;
        let (status, body) = get_json(format!(
            "{}{}/world-bank/internet-users?country=TH&startYear=2020&endYear=2023",
            base, API_PREFIX
        ))
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["data"][0]["indicator"]["id"], "IT.NET.USER.ZS");
        let q = &stub.queries("/wb/country/TH/indicator/IT.NET.USER.ZS")[0];
        assert!(has_param(q, "date", "2020:2023"));
    }

    #[tokio::test]
    async fn compare_countries_splits_list_and_ranks() {
        let stub = upstream().await;
        let base = spawn(&config_for(&stub)).await;
        let (status, body) = get_json(format!(
            "{}{}/world-bank/compare-countries?countries=TH,%20US&indicator=NY.GDP.MKTP.CD&year=2023",
            base, API_PREFIX
        ))
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["year"], 2023);
        assert_eq!(body["comparison"][0]["countryCode"], "US");
        assert_eq!(body["comparison"][1]["countryCode"], "TH");
    }

    #[tokio::test]
    async fn daily_summary_route_never_fails() {
        let stub = upstream().await;
        let base = spawn(&config_for(&stub)).await;
        let (status, body) =
            get_json(format!("{}{}/alpha-vantage/summary/daily", base, API_PREFIX)).await;
        assert_eq!(status, 200);
        assert_eq!(body["forex"]["usd_thb"], json!({ "ok": true }));
    }

    #[tokio::test]
    async fn exhausted_local_limit_is_429() {
        let stub = upstream().await;
        let mut cfg = config_for(&stub);
        cfg.providers.alpha_vantage.rate_limit_per_minute = Some(1);
        let base = spawn(&cfg).await;

        let url = format!("{}{}/alpha-vantage/economic/inflation", base, API_PREFIX);
        let (first, _) = get_json(url.clone()).await;
        assert_eq!(first, 200);
        let (second, body) = get_json(url).await;
        assert_eq!(second, 429);
        assert_eq!(body["code"], "RATE_LIMITED");
    }

    #[test]
    fn bad_cors_origin_is_rejected() {
        assert!(cors(&["http://localhost:3000".to_string()]).is_ok());
        assert!(cors(&["bad\norigin".to_string()]).is_err());
    }
}
