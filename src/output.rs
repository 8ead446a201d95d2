use crate::aggregate::{CountryComparison, EconomicSummary};
use anyhow::{Context, Result};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{}", json);
    Ok(())
}

fn fmt_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.abs() >= 1e6 => format!("{:.0}", v),
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

pub fn comparison_table(cmp: &CountryComparison) -> String {
    let mut out = format!(
        "\n{} ({})\n{:<6} {:<28} {:>22} {:<6} {}\n{}\n",
        cmp.indicator,
        cmp.year,
        "Rank",
        "Country",
        "Value",
        "Year",
        "Unit",
        "-".repeat(80)
    );
    for (i, e) in cmp.comparison.iter().enumerate() {
        out.push_str(&format!(
            "{:<6} {:<28} {:>22} {:<6} {}\n",
            i + 1,
            format!("{} ({})", e.country, e.country_code),
            fmt_value(e.value),
            e.year,
            e.unit
        ));
    }
    out
}

pub fn summary_table(summary: &EconomicSummary) -> String {
    let i = &summary.indicators;
    let rows = [
        &i.gdp,
        &i.gdp_growth,
        &i.gdp_per_capita,
        &i.population,
        &i.inflation,
        &i.unemployment,
        &i.fdi,
        &i.exports,
        &i.imports,
    ];
    let mut out = format!(
        "\n{} ({}) {}\n{:<42} {:>22} {}\n{}\n",
        summary.country,
        summary.country_code,
        summary.year,
        "Indicator",
        "Value",
        "Unit",
        "-".repeat(80)
    );
    for leaf in rows {
        out.push_str(&format!(
            "{:<42} {:>22} {}\n",
            leaf.indicator,
            fmt_value(leaf.value),
            leaf.unit
        ));
    }
    out
}
