//! Analysis windows offered by the period menu.

use crate::error::PeriodError;
use chrono::{Duration, NaiveDate};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}$").expect("valid date regex"));

static UNSAFE_LABEL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s/\\:]+").expect("valid label regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodChoice {
    OneDay,
    OneWeek,
    FifteenDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    AllTime,
    Custom,
    Quit,
}

impl PeriodChoice {
    pub const MENU: [PeriodChoice; 9] = [
        PeriodChoice::OneDay,
        PeriodChoice::OneWeek,
        PeriodChoice::FifteenDays,
        PeriodChoice::OneMonth,
        PeriodChoice::ThreeMonths,
        PeriodChoice::SixMonths,
        PeriodChoice::OneYear,
        PeriodChoice::AllTime,
        PeriodChoice::Custom,
    ];

    /// Days back from today for the fixed relative windows.
    pub fn lookback_days(self) -> Option<i64> {
        match self {
            PeriodChoice::OneDay => Some(1),
            PeriodChoice::OneWeek => Some(7),
            PeriodChoice::FifteenDays => Some(15),
            PeriodChoice::OneMonth => Some(30),
            PeriodChoice::ThreeMonths => Some(90),
            PeriodChoice::SixMonths => Some(180),
            PeriodChoice::OneYear => Some(365),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PeriodChoice::OneDay => "1 Day",
            PeriodChoice::OneWeek => "1 Week",
            PeriodChoice::FifteenDays => "15 Days",
            PeriodChoice::OneMonth => "1 Month",
            PeriodChoice::ThreeMonths => "3 Months",
            PeriodChoice::SixMonths => "6 Months",
            PeriodChoice::OneYear => "1 Year",
            PeriodChoice::AllTime => "All Time",
            PeriodChoice::Custom => "Custom range",
            PeriodChoice::Quit => "Quit",
        }
    }

    pub fn menu_text(self) -> &'static str {
        match self {
            PeriodChoice::OneDay => "1 Day",
            PeriodChoice::OneWeek => "1 Week (7 days)",
            PeriodChoice::FifteenDays => "15 Days",
            PeriodChoice::OneMonth => "1 Month (30 days)",
            PeriodChoice::ThreeMonths => "3 Months (90 days)",
            PeriodChoice::SixMonths => "6 Months (180 days)",
            PeriodChoice::OneYear => "1 Year (365 days)",
            PeriodChoice::AllTime => "Since the beginning (all data)",
            PeriodChoice::Custom => "Custom dates",
            PeriodChoice::Quit => "Quit",
        }
    }
}

pub fn parse_choice(raw: &str) -> Result<PeriodChoice, PeriodError> {
    let normalized = raw.trim().to_uppercase();
    if normalized == "Q" {
        return Ok(PeriodChoice::Quit);
    }
    normalized
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| PeriodChoice::MENU.get(i).copied())
        .ok_or_else(|| PeriodError::InvalidChoice(raw.trim().to_string()))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, PeriodError> {
    let raw = raw.trim();
    if !DATE_SHAPE.is_match(raw) {
        return Err(PeriodError::InvalidDate(raw.to_string()));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| PeriodError::InvalidDate(raw.to_string()))
}

/// A closed calendar-day interval with the label shown in titles and file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: String,
}

impl DateWindow {
    pub fn relative(choice: PeriodChoice, today: NaiveDate) -> Option<Self> {
        let days = choice.lookback_days()?;
        Some(Self {
            start: today - Duration::days(days),
            end: today,
            label: choice.label().to_string(),
        })
    }

    /// From the earliest stored day to today.
    pub fn all_time(earliest: Option<NaiveDate>, today: NaiveDate) -> Result<Self, PeriodError> {
        let start = earliest.ok_or(PeriodError::NoHistory)?;
        Ok(Self {
            start,
            end: today,
            label: PeriodChoice::AllTime.label().to_string(),
        })
    }

    pub fn custom(start_raw: &str, end_raw: &str) -> Result<Self, PeriodError> {
        let start = parse_date(start_raw)?;
        let end = parse_date(end_raw)?;
        if start >= end {
            return Err(PeriodError::StartNotBeforeEnd { start, end });
        }
        Ok(Self {
            start,
            end,
            label: format!("{start} to {end}"),
        })
    }

    /// Inclusive number of calendar days.
    pub fn day_count(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn safe_label(&self) -> String {
        UNSAFE_LABEL_CHARS.replace_all(self.label.trim(), "_").into_owned()
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} → {})", self.label, self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn menu_keys_map_to_choices() {
        assert_eq!(parse_choice("1"), Ok(PeriodChoice::OneDay));
        assert_eq!(parse_choice(" 8 "), Ok(PeriodChoice::AllTime));
        assert_eq!(parse_choice("9"), Ok(PeriodChoice::Custom));
        assert_eq!(parse_choice("q"), Ok(PeriodChoice::Quit));
        assert_eq!(parse_choice("Q"), Ok(PeriodChoice::Quit));

        for bad in ["0", "10", "", "x", "-1"] {
            assert!(matches!(parse_choice(bad), Err(PeriodError::InvalidChoice(_))), "{bad}");
        }
    }

    #[test]
    fn relative_windows_end_today() {
        let today = date(2024, 3, 31);
        let window = DateWindow::relative(PeriodChoice::OneMonth, today).unwrap();
        assert_eq!(window.start, date(2024, 3, 1));
        assert_eq!(window.end, today);
        assert_eq!(window.label, "1 Month");
        assert_eq!(window.day_count(), 31);

        assert!(DateWindow::relative(PeriodChoice::AllTime, today).is_none());
        assert!(DateWindow::relative(PeriodChoice::Custom, today).is_none());
    }

    #[test]
    fn all_time_needs_stored_history() {
        let today = date(2024, 3, 31);
        assert_eq!(DateWindow::all_time(None, today), Err(PeriodError::NoHistory));

        let window = DateWindow::all_time(Some(date(2023, 12, 1)), today).unwrap();
        assert_eq!(window.start, date(2023, 12, 1));
        assert_eq!(window.label, "All Time");
    }

    #[test]
    fn custom_range_is_validated() {
        let window = DateWindow::custom("2024-01-01", "2024-02-01").unwrap();
        assert_eq!(window.label, "2024-01-01 to 2024-02-01");
        assert_eq!(window.safe_label(), "2024-01-01_to_2024-02-01");

        assert!(matches!(
            DateWindow::custom("2024-02-01", "2024-02-01"),
            Err(PeriodError::StartNotBeforeEnd { .. })
        ));
        assert!(matches!(
            DateWindow::custom("01/02/2024", "2024-02-01"),
            Err(PeriodError::InvalidDate(_))
        ));
        assert!(matches!(
            DateWindow::custom("2024-02-30", "2024-03-01"),
            Err(PeriodError::InvalidDate(_))
        ));
    }
}
