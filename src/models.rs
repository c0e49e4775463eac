use crate::aggregation::RateTier;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// One submitted weekly report. Counts are always non-negative; anything
/// loosely typed is coerced on the way in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub date: NaiveDate,
    pub branch: String,
    pub rep: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub one_time_quotes: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub one_time_sales: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub weekly_quotes: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub weekly_sales: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub biweekly_quotes: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub biweekly_sales: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub monthly_quotes: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub monthly_sales: u64,
}

impl ReportRow {
    pub fn quotes_for(&self, category: Category) -> u64 {
        match category {
            Category::OneTime => self.one_time_quotes,
            Category::Weekly => self.weekly_quotes,
            Category::Biweekly => self.biweekly_quotes,
            Category::Monthly => self.monthly_quotes,
        }
    }

    pub fn sales_for(&self, category: Category) -> u64 {
        match category {
            Category::OneTime => self.one_time_sales,
            Category::Weekly => self.weekly_sales,
            Category::Biweekly => self.biweekly_sales,
            Category::Monthly => self.monthly_sales,
        }
    }

    /// Quotes across all four categories.
    pub fn quotes(&self) -> u64 {
        Category::ALL
            .iter()
            .map(|category| self.quotes_for(*category))
            .fold(0u64, u64::saturating_add)
    }

    /// Sales across all four categories.
    pub fn sales(&self) -> u64 {
        Category::ALL
            .iter()
            .map(|category| self.sales_for(*category))
            .fold(0u64, u64::saturating_add)
    }
}

/// Billing cadence a quote or sale was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    OneTime,
    Weekly,
    Biweekly,
    Monthly,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::OneTime,
        Category::Weekly,
        Category::Biweekly,
        Category::Monthly,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Category::OneTime => "one_time",
            Category::Weekly => "weekly",
            Category::Biweekly => "biweekly",
            Category::Monthly => "monthly",
        }
    }

    pub fn sales_label(self) -> &'static str {
        match self {
            Category::OneTime => "One-Time Sales",
            Category::Weekly => "Weekly Sales",
            Category::Biweekly => "Bi-Weekly Sales",
            Category::Monthly => "Monthly Sales",
        }
    }

    /// Stroke colour of the category's sales line in the weekly summary chart.
    pub fn sales_color(self) -> &'static str {
        match self {
            Category::OneTime => "#22c55e",
            Category::Weekly => "#3b82f6",
            Category::Biweekly => "#facc15",
            Category::Monthly => "#f43f5e",
        }
    }
}

/// Colour used for any series that is not one of the four sales lines.
pub const FALLBACK_LINE_COLOR: &str = "#8884d8";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("date is required")]
    MissingDate,

    #[error("{field} must be a date in YYYY-MM-DD form, got '{value}'")]
    InvalidDate { field: &'static str, value: String },
}

/// Raw form payload. Counts arrive as text from the form or as JSON numbers
/// from API callers; both end up as `u64` via the same coercion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportSubmission {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub rep: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub one_time_quotes: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub one_time_sales: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub weekly_quotes: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub weekly_sales: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub biweekly_quotes: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub biweekly_sales: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub monthly_quotes: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub monthly_sales: u64,
}

impl ReportSubmission {
    pub fn into_row(self) -> Result<ReportRow, InputError> {
        let date = match parse_date("date", &self.date)? {
            Some(date) => date,
            None => return Err(InputError::MissingDate),
        };

        Ok(ReportRow {
            date,
            branch: self.branch,
            rep: self.rep,
            one_time_quotes: self.one_time_quotes,
            one_time_sales: self.one_time_sales,
            weekly_quotes: self.weekly_quotes,
            weekly_sales: self.weekly_sales,
            biweekly_quotes: self.biweekly_quotes,
            biweekly_sales: self.biweekly_sales,
            monthly_quotes: self.monthly_quotes,
            monthly_sales: self.monthly_sales,
        })
    }
}

/// Constraints narrowing which rows feed the totals card and the chart.
/// `None` means no constraint on that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterCriteria {
    pub branch: Option<String>,
    pub rep: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Query string of `/api/dashboard`. The filter selects post an empty
/// string for "all", so blanks are treated as absent.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub branch: Option<String>,
    pub rep: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl TryFrom<DashboardQuery> for FilterCriteria {
    type Error = InputError;

    fn try_from(query: DashboardQuery) -> Result<Self, Self::Error> {
        Ok(FilterCriteria {
            branch: non_blank(query.branch),
            rep: non_blank(query.rep),
            start_date: match query.start_date {
                Some(value) => parse_date("start_date", &value)?,
                None => None,
            },
            end_date: match query.end_date {
                Some(value) => parse_date("end_date", &value)?,
                None => None,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub quotes: u64,
    pub sales: u64,
    pub conversion_rate: f64,
    pub tier: RateTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupTotals {
    pub key: String,
    pub quotes: u64,
    pub sales: u64,
    pub conversion_rate: f64,
    pub tier: RateTier,
}

/// Sales per category for one date of the weekly summary chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub one_time_sales: u64,
    pub weekly_sales: u64,
    pub biweekly_sales: u64,
    pub monthly_sales: u64,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub filter: FilterCriteria,
    pub row_count: usize,
    pub totals: Totals,
    pub by_branch: Vec<GroupTotals>,
    pub by_rep: Vec<GroupTotals>,
    pub series: Vec<SeriesPoint>,
}

#[derive(Debug, Serialize)]
pub struct OptionsResponse {
    pub branches: Vec<String>,
    pub reps: Vec<String>,
}

/// Leading-integer parse: optional sign then a run of digits, anything after
/// the run is ignored. No digits or a negative value yields 0; overflow
/// saturates.
pub fn parse_count(text: &str) -> u64 {
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || negative {
        return 0;
    }

    rest[..digits]
        .bytes()
        .map(|byte| u64::from(byte - b'0'))
        .fold(0u64, |acc, digit| acc.saturating_mul(10).saturating_add(digit))
}

fn parse_date(field: &'static str, value: &str) -> Result<Option<NaiveDate>, InputError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(Some(date));
    }

    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| Some(timestamp.date_naive()))
        .map_err(|_| InputError::InvalidDate {
            field,
            value: value.to_string(),
        })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseCount {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
    Flag(bool),
}

impl LooseCount {
    fn into_count(self) -> u64 {
        match self {
            LooseCount::Unsigned(value) => value,
            LooseCount::Signed(_) => 0,
            LooseCount::Float(value) if value.is_finite() && value >= 1.0 => {
                if value >= u64::MAX as f64 {
                    u64::MAX
                } else {
                    value.trunc() as u64
                }
            }
            LooseCount::Float(_) => 0,
            LooseCount::Text(text) => parse_count(&text),
            LooseCount::Flag(_) => 0,
        }
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<LooseCount>::deserialize(deserializer)?;
    Ok(value.map(LooseCount::into_count).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_count_reads_leading_integer() {
        assert_eq!(parse_count("12"), 12);
        assert_eq!(parse_count("  7 "), 7);
        assert_eq!(parse_count("12abc"), 12);
        assert_eq!(parse_count("3.7"), 3);
        assert_eq!(parse_count("+4"), 4);
    }

    #[test]
    fn parse_count_coerces_garbage_and_negatives_to_zero() {
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("abc"), 0);
        assert_eq!(parse_count("-5"), 0);
        assert_eq!(parse_count("-"), 0);
        assert_eq!(parse_count("99999999999999999999999"), u64::MAX);
    }

    #[test]
    fn submission_json_accepts_strings_numbers_and_nulls() {
        let submission: ReportSubmission = serde_json::from_value(serde_json::json!({
            "date": "2024-01-01",
            "branch": " ACS ",
            "rep": "Kari",
            "one_time_quotes": "10",
            "one_time_sales": 5,
            "weekly_quotes": null,
            "weekly_sales": "",
            "biweekly_quotes": -3,
            "biweekly_sales": 2.9,
            "monthly_quotes": "n/a"
        }))
        .unwrap();

        let row = submission.into_row().unwrap();
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(row.branch, " ACS ");
        assert_eq!(row.one_time_quotes, 10);
        assert_eq!(row.one_time_sales, 5);
        assert_eq!(row.weekly_quotes, 0);
        assert_eq!(row.weekly_sales, 0);
        assert_eq!(row.biweekly_quotes, 0);
        assert_eq!(row.biweekly_sales, 2);
        assert_eq!(row.monthly_quotes, 0);
        assert_eq!(row.monthly_sales, 0);
    }

    #[test]
    fn submission_requires_a_valid_date() {
        let missing = ReportSubmission::default().into_row();
        assert_eq!(missing, Err(InputError::MissingDate));

        let invalid = ReportSubmission {
            date: "01/02/2024".to_string(),
            ..ReportSubmission::default()
        }
        .into_row();
        assert!(matches!(
            invalid,
            Err(InputError::InvalidDate { field: "date", .. })
        ));
    }

    #[test]
    fn stored_rows_are_coerced_on_read() {
        let row: ReportRow = serde_json::from_value(serde_json::json!({
            "date": "2024-03-04",
            "branch": "ACSNW",
            "rep": "Lisa",
            "weekly_sales": "4",
            "monthly_quotes": -1
        }))
        .unwrap();
        assert_eq!(row.weekly_sales, 4);
        assert_eq!(row.monthly_quotes, 0);
        assert_eq!(row.one_time_quotes, 0);
    }

    #[test]
    fn dashboard_query_treats_blanks_as_absent() {
        let criteria = FilterCriteria::try_from(DashboardQuery {
            branch: Some(String::new()),
            rep: Some("Kari".to_string()),
            start_date: Some("2024-01-01".to_string()),
            end_date: Some(" ".to_string()),
        })
        .unwrap();

        assert_eq!(criteria.branch, None);
        assert_eq!(criteria.rep.as_deref(), Some("Kari"));
        assert_eq!(criteria.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(criteria.end_date, None);
    }

    #[test]
    fn dashboard_query_accepts_timestamps_and_rejects_garbage() {
        let criteria = FilterCriteria::try_from(DashboardQuery {
            end_date: Some("2024-02-29T23:00:00Z".to_string()),
            ..DashboardQuery::default()
        })
        .unwrap();
        assert_eq!(criteria.end_date, NaiveDate::from_ymd_opt(2024, 2, 29));

        let err = FilterCriteria::try_from(DashboardQuery {
            start_date: Some("yesterday".to_string()),
            ..DashboardQuery::default()
        })
        .unwrap_err();
        assert_eq!(
            err,
            InputError::InvalidDate {
                field: "start_date",
                value: "yesterday".to_string()
            }
        );
    }

    #[test]
    fn row_totals_sum_every_category() {
        let row = ReportRow {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            branch: "ACS".to_string(),
            rep: "Kari".to_string(),
            one_time_quotes: 1,
            one_time_sales: 2,
            weekly_quotes: 3,
            weekly_sales: 4,
            biweekly_quotes: 5,
            biweekly_sales: 6,
            monthly_quotes: 7,
            monthly_sales: 8,
        };
        assert_eq!(row.quotes(), 16);
        assert_eq!(row.sales(), 20);
        assert_eq!(row.sales_for(Category::Biweekly), 6);
    }
}
