mod aggregate;
mod api;
mod config;
mod error;
mod limiter;
mod normalize;
mod output;
mod sources;
#[cfg(test)]
mod testutil;
mod types;
mod upstream;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};

const DEFAULT_CONFIG: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(
    name = "pawn-market-data",
    about = "Market and macro data for the pawn-shop dashboard: BOT rates, gold, Alpha Vantage and World Bank"
)]
struct Args {
    /// Path to config YAML file (defaults to ./config.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the Alpha Vantage daily economic summary
    DailySummary,
    /// Print the World Bank economic summary for one country
    EconomicSummary {
        #[arg(long)]
        country: String,
        /// Defaults to last year
        #[arg(long)]
        year: Option<i32>,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        output: OutputFormat,
    },
    /// Compare one World Bank indicator across countries
    Compare {
        /// Comma-separated country codes, e.g. TH,VN,MY
        #[arg(long)]
        countries: String,
        /// Indicator code, e.g. NY.GDP.MKTP.CD
        #[arg(long)]
        indicator: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let (path, explicit) = match &args.config {
        Some(p) => (p.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    let mut cfg = config::Config::load(&path, explicit)
        .with_context(|| format!("loading config from {}", path.display()))?;

    for key in cfg.missing_keys() {
        warn!("{} not set; requests to that provider will be rejected upstream", key);
    }

    let client = upstream::build_client(&cfg.upstream)?;
    let registry = sources::SourceRegistry::new(client, &cfg);
    info!(
        "Providers ready (timeout {}s)",
        cfg.upstream.timeout_secs
    );

    match args.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                cfg.server.host = host;
            }
            if let Some(port) = port {
                cfg.server.port = port;
            }
            api::serve(&cfg.server, registry).await?;
        }
        Command::DailySummary => {
            let summary = aggregate::daily_economic_summary(&registry.alpha_vantage).await;
            output::print_json(&summary)?;
        }
        Command::EconomicSummary {
            country,
            year,
            output: format,
        } => {
            let summary =
                aggregate::economic_summary(&registry.world_bank, &country, year).await;
            match format {
                OutputFormat::Json => output::print_json(&summary)?,
                OutputFormat::Table => print!("{}", output::summary_table(&summary)),
            }
        }
        Command::Compare {
            countries,
            indicator,
            year,
            output: format,
        } => {
            let codes = api::handlers::split_countries(&countries);
            if codes.is_empty() {
                anyhow::bail!("--countries must name at least one country code");
            }
            let cmp =
                aggregate::compare_countries(&registry.world_bank, &codes, &indicator, year).await;
            match format {
                OutputFormat::Json => output::print_json(&cmp)?,
                OutputFormat::Table => print!("{}", output::comparison_table(&cmp)),
            }
        }
    }

    Ok(())
}
