use super::today;
use crate::config::BotConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::upstream::Upstream;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HolidayDetail {
    #[serde(default)]
    pub holiday_week_day: String,
    #[serde(default)]
    pub holiday_week_day_thai: String,
    pub date: String,
    #[serde(default)]
    pub date_thai: String,
    #[serde(default)]
    pub holiday_description: String,
    #[serde(default)]
    pub holiday_description_thai: String,
}

impl HolidayDetail {
    fn parsed_date(&self) -> Option<NaiveDate> {
        let parsed = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok();
        if parsed.is_none() {
            warn!("Skipping holiday with unparseable date '{}'", self.date);
        }
        parsed
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HolidayResponse {
    pub holidays: Vec<HolidayDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub total: usize,
}

impl HolidayResponse {
    fn new(holidays: Vec<HolidayDetail>, year: Option<i32>) -> Self {
        let total = holidays.len();
        Self {
            holidays,
            year,
            total,
        }
    }
}

/// Financial-institution holidays published by the BOT.
pub struct BotHolidays {
    upstream: Upstream,
    url: String,
    api_key: String,
}

impl BotHolidays {
    pub fn new(upstream: Upstream, cfg: &BotConfig) -> Self {
        Self {
            upstream,
            url: cfg.holiday_url.clone(),
            api_key: cfg.api_key.clone(),
        }
    }

    async fn fetch_year(&self, year: i32) -> ProviderResult<Vec<HolidayDetail>> {
        self.upstream
            .get_json(
                &self.url,
                &[("year", year.to_string())],
                Some(&self.api_key),
            )
            .await
    }

    pub async fn holidays(&self, year: Option<i32>) -> ProviderResult<HolidayResponse> {
        let year = year.unwrap_or_else(|| today().year());
        info!("Fetching financial institutions holidays for year {}", year);
        let holidays = self.fetch_year(year).await?;
        info!("Fetched {} holidays for year {}", holidays.len(), year);
        Ok(HolidayResponse::new(holidays, Some(year)))
    }

    /// Next `limit` holidays from today, looking into next year as well.
    pub async fn upcoming(&self, limit: usize) -> ProviderResult<HolidayResponse> {
        let today = today();
        info!("Fetching {} upcoming holidays", limit);
        let (this_year, next_year) = tokio::try_join!(
            self.fetch_year(today.year()),
            self.fetch_year(today.year() + 1)
        )?;
        let all: Vec<HolidayDetail> = this_year.into_iter().chain(next_year).collect();
        let upcoming = upcoming_from(all, today, limit);
        info!("Found {} upcoming holidays", upcoming.len());
        Ok(HolidayResponse::new(upcoming, None))
    }

    /// The holiday falling on `date`, if any.
    pub async fn check(&self, date: &str) -> ProviderResult<Option<HolidayDetail>> {
        let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            ProviderError::InvalidParam(format!("date must be YYYY-MM-DD, got '{}'", date))
        })?;
        let holidays = self.fetch_year(day.year()).await?;
        let found = holidays.into_iter().find(|h| h.date == date);
        match &found {
            Some(h) => info!("{} is a holiday: {}", date, h.holiday_description),
            None => info!("{} is not a holiday", date),
        }
        Ok(found)
    }

    pub async fn by_month(&self, year: i32, month: u32) -> ProviderResult<HolidayResponse> {
        if !(1..=12).contains(&month) {
            return Err(ProviderError::InvalidParam(format!(
                "month must be between 1 and 12, got {}",
                month
            )));
        }
        info!("Fetching holidays for {}-{:02}", year, month);
        let holidays = in_month(self.fetch_year(year).await?, year, month);
        info!("Found {} holidays in {}-{:02}", holidays.len(), year, month);
        Ok(HolidayResponse::new(holidays, Some(year)))
    }
}

pub fn upcoming_from(
    holidays: Vec<HolidayDetail>,
    today: NaiveDate,
    limit: usize,
) -> Vec<HolidayDetail> {
    let mut dated: Vec<(NaiveDate, HolidayDetail)> = holidays
        .into_iter()
        .filter_map(|h| h.parsed_date().map(|d| (d, h)))
        .filter(|(d, _)| *d >= today)
        .collect();
    dated.sort_by_key(|(d, _)| *d);
    dated.into_iter().take(limit).map(|(_, h)| h).collect()
}

pub fn in_month(holidays: Vec<HolidayDetail>, year: i32, month: u32) -> Vec<HolidayDetail> {
    holidays
        .into_iter()
        .filter(|h| {
            h.parsed_date()
                .map(|d| d.year() == year && d.month() == month)
                .unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{client, has_param, StubUpstream};
    use serde_json::json;

    fn holiday(date: &str, name: &str) -> HolidayDetail {
        HolidayDetail {
            holiday_week_day: String::new(),
            holiday_week_day_thai: String::new(),
            date: date.to_string(),
            date_thai: String::new(),
            holiday_description: name.to_string(),
            holiday_description_thai: String::new(),
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn wire_names_are_pascal_case() {
        let raw = json!({
            "HolidayWeekDay": "Monday",
            "HolidayWeekDayThai": "วันจันทร์",
            "Date": "2024-01-01",
            "DateThai": "01/01/2567",
            "HolidayDescription": "New Year's Day",
            "HolidayDescriptionThai": "วันขึ้นปีใหม่"
        });
        let h: HolidayDetail = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(h.date, "2024-01-01");
        assert_eq!(serde_json::to_value(&h).unwrap(), raw);
    }

    #[test]
    fn upcoming_filters_sorts_and_limits() {
        let all = vec![
            holiday("2025-01-01", "New Year's Day"),
            holiday("2024-12-31", "New Year's Eve"),
            holiday("2024-12-05", "Father's Day"),
            holiday("2024-12-10", "Constitution Day"),
            holiday("not-a-date", "Broken"),
        ];
        let out = upcoming_from(all, d("2024-12-10"), 2);
        let names: Vec<_> = out.iter().map(|h| h.holiday_description.as_str()).collect();
        assert_eq!(names, vec!["Constitution Day", "New Year's Eve"]);
    }

    #[test]
    fn month_filter_matches_year_and_month() {
        let all = vec![
            holiday("2024-01-01", "a"),
            holiday("2024-02-10", "b"),
            holiday("2025-01-01", "c"),
        ];
        let out = in_month(all, 2024, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].holiday_description, "a");
    }

    fn stub_body() -> serde_json::Value {
        json!([
            { "Date": "2024-01-01", "HolidayDescription": "New Year's Day" },
            { "Date": "2024-04-06", "HolidayDescription": "Chakri Memorial Day" }
        ])
    }

    fn provider(stub: &StubUpstream) -> BotHolidays {
        let cfg = BotConfig {
            api_key: "k".into(),
            holiday_url: stub.url("/holidays"),
            ..BotConfig::default()
        };
        BotHolidays::new(Upstream::new(client(), "bot", None), &cfg)
    }

    #[tokio::test]
    async fn holidays_reports_year_and_total() {
        let stub = StubUpstream::json("/holidays", stub_body()).await;
        let out = provider(&stub).holidays(Some(2024)).await.unwrap();
        assert_eq!(out.year, Some(2024));
        assert_eq!(out.total, 2);
        assert!(has_param(&stub.queries("/holidays")[0], "year", "2024"));
    }

    #[tokio::test]
    async fn check_finds_exact_date() {
        let stub = StubUpstream::json("/holidays", stub_body()).await;
        let holidays = provider(&stub);
        let hit = holidays.check("2024-04-06").await.unwrap();
        assert_eq!(hit.unwrap().holiday_description, "Chakri Memorial Day");
        assert!(holidays.check("2024-04-07").await.unwrap().is_none());
        assert!(matches!(
            holidays.check("06/04/2024").await,
            Err(ProviderError::InvalidParam(_))
        ));
    }

    #[tokio::test]
    async fn by_month_rejects_bad_month_without_calling_upstream() {
        let stub = StubUpstream::json("/holidays", stub_body()).await;
        let holidays = provider(&stub);
        assert!(matches!(
            holidays.by_month(2024, 13).await,
            Err(ProviderError::InvalidParam(_))
        ));
        assert_eq!(stub.hits("/holidays"), 0);

        let april = holidays.by_month(2024, 4).await.unwrap();
        assert_eq!(april.total, 1);
    }

    #[tokio::test]
    async fn upcoming_queries_this_and_next_year() {
        let stub = StubUpstream::json("/holidays", json!([])).await;
        let out = provider(&stub).upcoming(5).await.unwrap();
        assert_eq!(out.total, 0);
        assert!(out.year.is_none());
        let year = today().year();
        let queries = stub.queries("/holidays");
        assert_eq!(queries.len(), 2);
        assert!(queries.iter().any(|q| has_param(q, "year", &year.to_string())));
        assert!(queries
            .iter()
            .any(|q| has_param(q, "year", &(year + 1).to_string())));
    }
}
