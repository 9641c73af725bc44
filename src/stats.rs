//! Windowed statistics over a daily price grid.
//!
//! All percentages are expressed in percent (x100). Every function here is pure.

use crate::error::WindowError;
use crate::history::PriceHistory;
use crate::period::DateWindow;
use chrono::{NaiveDate, NaiveTime};

const TRADING_DAYS_PER_YEAR: f64 = 365.0;

/// One price per calendar day, no gaps, ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    points: Vec<(NaiveDate, f64)>,
}

impl DailySeries {
    pub fn new(points: Vec<(NaiveDate, f64)>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|(d, _)| *d).collect()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|(_, p)| *p).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<(NaiveDate, f64)> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<(NaiveDate, f64)> {
        self.points.last().copied()
    }

    /// First day holding the maximum price.
    pub fn peak(&self) -> Option<(NaiveDate, f64)> {
        self.points
            .iter()
            .copied()
            .fold(None, |best: Option<(NaiveDate, f64)>, point| match best {
                Some(b) if b.1 >= point.1 => Some(b),
                _ => Some(point),
            })
    }
}

/// Projects `history` onto every day of `window` (at 00:00 UTC), each day taking
/// the latest non-null price at or before it. Days before the first known price
/// are dropped.
pub fn reindex_daily(history: &PriceHistory, window: &DateWindow) -> Result<DailySeries, WindowError> {
    if window.start > window.end {
        return Err(WindowError::EmptyWindow {
            start: window.start,
            end: window.end,
        });
    }

    let last_day = history
        .last_timestamp()
        .map(|ts| ts.date())
        .ok_or(WindowError::NoValidData)?;
    if window.start > last_day {
        return Err(WindowError::OutsideStoredRange {
            start: window.start,
            last: last_day,
        });
    }

    let observations = history.observations();
    let mut cursor = 0;
    let mut carried: Option<f64> = None;
    let mut points = Vec::new();

    for day in window.start.iter_days().take_while(|d| *d <= window.end) {
        let instant = day.and_time(NaiveTime::MIN);
        while cursor < observations.len() && observations[cursor].timestamp <= instant {
            if let Some(price) = observations[cursor].price {
                carried = Some(price);
            }
            cursor += 1;
        }
        if let Some(price) = carried {
            points.push((day, price));
        }
    }

    if points.is_empty() {
        return Err(WindowError::NoValidData);
    }
    Ok(DailySeries::new(points))
}

/// `price[t] / price[first] - 1`, in percent.
pub fn cumulative_returns(prices: &[f64]) -> Result<Vec<f64>, WindowError> {
    let start = *prices.first().ok_or(WindowError::NoValidData)?;
    if start == 0.0 {
        return Err(WindowError::ZeroStartPrice);
    }
    Ok(prices.iter().map(|p| (p / start - 1.0) * 100.0).collect())
}

/// Percent below the running peak at each point; never positive.
pub fn drawdown_series(prices: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    prices
        .iter()
        .map(|&price| {
            peak = peak.max(price);
            if peak > 0.0 {
                ((price - peak) / peak * 100.0).min(0.0)
            } else {
                0.0
            }
        })
        .collect()
}

pub fn max_drawdown(prices: &[f64]) -> f64 {
    drawdown_series(prices).into_iter().fold(0.0, f64::min)
}

/// Day-over-day fractional changes. Changes from a zero price are skipped.
pub fn daily_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .filter(|r| r.is_finite())
        .collect()
}

/// Mean over population standard deviation of daily changes, annualised by
/// `sqrt(365)`. Exactly `0.0` when the deviation is zero or there are no changes.
pub fn sharpe_ratio(prices: &[f64]) -> f64 {
    let returns = daily_returns(prices);
    if returns.is_empty() {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        return 0.0;
    }
    mean / std_dev * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Straight line from the first day's price to the peak, evaluated on each day.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendLine {
    pub start_date: NaiveDate,
    pub start_price: f64,
    pub peak_date: NaiveDate,
    pub peak_price: f64,
    pub slope_per_day: f64,
    pub values: Vec<f64>,
    /// Return from the first price to the peak, in percent.
    pub trend_return_pct: f64,
}

impl TrendLine {
    pub fn value_at(&self, days_since_start: f64) -> f64 {
        self.start_price + self.slope_per_day * days_since_start
    }
}

pub fn trend_to_peak(series: &DailySeries) -> Result<TrendLine, WindowError> {
    let (start_date, start_price) = series.first().ok_or(WindowError::NoValidData)?;
    let (peak_date, peak_price) = series.peak().ok_or(WindowError::NoValidData)?;
    if start_price == 0.0 {
        return Err(WindowError::ZeroStartPrice);
    }

    let span = (peak_date - start_date).num_days();
    let slope_per_day = if span == 0 {
        0.0
    } else {
        (peak_price - start_price) / span as f64
    };

    let mut trend = TrendLine {
        start_date,
        start_price,
        peak_date,
        peak_price,
        slope_per_day,
        values: Vec::with_capacity(series.len()),
        trend_return_pct: (peak_price / start_price - 1.0) * 100.0,
    };
    trend.values = series
        .points()
        .iter()
        .map(|(day, _)| trend.value_at((*day - start_date).num_days() as f64))
        .collect();

    Ok(trend)
}

/// `y = a + b*x + c*x^2`, fitted by least squares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraticFit {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl QuadraticFit {
    pub fn eval(&self, x: f64) -> f64 {
        self.a + self.b * x + self.c * x * x
    }
}

/// Fits `values` indexed `0..n`. `None` below three points.
pub fn quadratic_trend(values: &[f64]) -> Option<QuadraticFit> {
    if values.len() < 3 {
        return None;
    }

    // Normal equations: s[k] = sum x^k, t[k] = sum x^k * y.
    let mut s = [0.0f64; 5];
    let mut t = [0.0f64; 3];
    for (i, y) in values.iter().enumerate() {
        let x = i as f64;
        let mut xp = 1.0;
        for (k, sk) in s.iter_mut().enumerate() {
            *sk += xp;
            if let Some(tk) = t.get_mut(k) {
                *tk += xp * y;
            }
            xp *= x;
        }
    }

    let m = [[s[0], s[1], s[2]], [s[1], s[2], s[3]], [s[2], s[3], s[4]]];
    let [a, b, c] = solve3(m, t)?;
    Some(QuadraticFit { a, b, c })
}

fn det3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

// Cramer's rule.
fn solve3(m: [[f64; 3]; 3], rhs: [f64; 3]) -> Option<[f64; 3]> {
    let det = det3(&m);
    if det.abs() < f64::EPSILON || !det.is_finite() {
        return None;
    }

    let mut out = [0.0; 3];
    for (col, slot) in out.iter_mut().enumerate() {
        let mut replaced = m;
        for (row, value) in rhs.iter().enumerate() {
            replaced[row][col] = *value;
        }
        *slot = det3(&replaced) / det;
    }
    Some(out)
}

/// Headline numbers for one asset over one window.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetSummary {
    pub name: String,
    pub start_price: f64,
    pub end_price: f64,
    pub return_pct: f64,
    pub max_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub sharpe: f64,
}

impl AssetSummary {
    /// `↑` above +50 %, `+` when positive, `↓` otherwise.
    pub fn status(&self) -> &'static str {
        if self.return_pct > 50.0 {
            "↑"
        } else if self.return_pct > 0.0 {
            "+"
        } else {
            "↓"
        }
    }
}

pub fn summarize(name: &str, series: &DailySeries) -> Result<AssetSummary, WindowError> {
    let prices = series.prices();
    let returns = cumulative_returns(&prices)?;
    let (_, start_price) = series.first().ok_or(WindowError::NoValidData)?;
    let (_, end_price) = series.last().ok_or(WindowError::NoValidData)?;
    let (_, max_price) = series.peak().ok_or(WindowError::NoValidData)?;

    Ok(AssetSummary {
        name: name.to_string(),
        start_price,
        end_price,
        return_pct: returns.last().copied().unwrap_or(0.0),
        max_return_pct: (max_price / start_price - 1.0) * 100.0,
        max_drawdown_pct: max_drawdown(&prices),
        sharpe: sharpe_ratio(&prices),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{PriceObservation, parse_timestamp};
    use proptest::prelude::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn window(start: &str, end: &str) -> DateWindow {
        DateWindow {
            start: date(start),
            end: date(end),
            label: "test".to_string(),
        }
    }

    fn history(rows: &[(&str, Option<f64>)]) -> PriceHistory {
        PriceHistory::from_observations(
            rows.iter()
                .map(|(ts, price)| PriceObservation {
                    timestamp: parse_timestamp(ts).unwrap(),
                    price: *price,
                })
                .collect(),
        )
    }

    fn series(prices: &[f64]) -> DailySeries {
        let start = date("2024-01-01");
        DailySeries::new(
            prices
                .iter()
                .enumerate()
                .map(|(i, p)| (start + chrono::Duration::days(i as i64), *p))
                .collect(),
        )
    }

    #[test]
    fn reindex_forward_fills_gaps_and_nulls() {
        let h = history(&[
            ("2024-01-01", Some(100.0)),
            ("2024-01-02 12:00:00", Some(999.0)),
            ("2024-01-04", None),
            ("2024-01-05", Some(110.0)),
        ]);
        let s = reindex_daily(&h, &window("2024-01-01", "2024-01-06")).unwrap();

        assert_eq!(s.prices(), vec![100.0, 100.0, 999.0, 999.0, 110.0, 110.0]);
        assert_eq!(s.first().unwrap().0, date("2024-01-01"));
        assert_eq!(s.last().unwrap().0, date("2024-01-06"));
    }

    #[test]
    fn reindex_drops_days_before_first_price() {
        let h = history(&[("2024-01-03", Some(5.0)), ("2024-01-04", Some(6.0))]);
        let s = reindex_daily(&h, &window("2024-01-01", "2024-01-04")).unwrap();
        assert_eq!(s.dates(), vec![date("2024-01-03"), date("2024-01-04")]);
    }

    #[test]
    fn windows_without_data_are_diagnosed() {
        let h = history(&[("2024-02-01", Some(5.0)), ("2024-02-10", Some(6.0))]);

        assert_eq!(
            reindex_daily(&h, &window("2024-01-01", "2024-01-31")),
            Err(WindowError::NoValidData)
        );
        assert!(matches!(
            reindex_daily(&h, &window("2024-03-01", "2024-03-31")),
            Err(WindowError::OutsideStoredRange { .. })
        ));
        assert!(matches!(
            reindex_daily(&h, &window("2024-02-05", "2024-02-01")),
            Err(WindowError::EmptyWindow { .. })
        ));

        let nulls = history(&[("2024-02-01", None), ("2024-02-02", None)]);
        assert_eq!(
            reindex_daily(&nulls, &window("2024-02-01", "2024-02-02")),
            Err(WindowError::NoValidData)
        );
        assert_eq!(
            reindex_daily(&PriceHistory::default(), &window("2024-02-01", "2024-02-02")),
            Err(WindowError::NoValidData)
        );
    }

    #[test]
    fn cumulative_returns_are_relative_to_first_day() {
        let r = cumulative_returns(&[50.0, 75.0, 25.0]).unwrap();
        assert_eq!(r, vec![0.0, 50.0, -50.0]);
        assert_eq!(cumulative_returns(&[0.0, 1.0]), Err(WindowError::ZeroStartPrice));
        assert_eq!(cumulative_returns(&[]), Err(WindowError::NoValidData));
    }

    #[test]
    fn drawdown_tracks_running_peak() {
        let dd = drawdown_series(&[100.0, 120.0, 90.0, 130.0, 117.0]);
        assert_eq!(dd, vec![0.0, 0.0, -25.0, 0.0, -10.0]);
        assert_eq!(max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]), -25.0);
        assert_eq!(max_drawdown(&[1.0, 2.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn flat_series_has_zero_sharpe() {
        assert_eq!(sharpe_ratio(&[10.0; 30]), 0.0);
        assert_eq!(sharpe_ratio(&[10.0]), 0.0);
        assert_eq!(sharpe_ratio(&[]), 0.0);
    }

    #[test]
    fn sharpe_uses_population_deviation() {
        // Changes: +10 %, -10 %  → mean 0 → ratio 0.
        assert_eq!(sharpe_ratio(&[100.0, 110.0, 99.0]), 0.0);

        // Changes: +100 %, 0 % → mean 0.5, population std 0.5.
        let s = sharpe_ratio(&[1.0, 2.0, 2.0]);
        assert!((s - 365f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn trend_line_runs_from_first_day_to_peak() {
        let trend = trend_to_peak(&series(&[10.0, 12.0, 20.0, 15.0, 18.0])).unwrap();

        assert_eq!(trend.peak_date, date("2024-01-03"));
        assert_eq!(trend.peak_price, 20.0);
        assert_eq!(trend.values, vec![10.0, 15.0, 20.0, 25.0, 30.0]);
        assert_eq!(trend.trend_return_pct, 100.0);
        assert_eq!(trend.value_at(0.5), 12.5);
    }

    #[test]
    fn trend_line_is_flat_when_first_day_is_peak() {
        let trend = trend_to_peak(&series(&[20.0, 12.0, 10.0])).unwrap();
        assert_eq!(trend.values, vec![20.0, 20.0, 20.0]);
        assert_eq!(trend.trend_return_pct, 0.0);
    }

    #[test]
    fn quadratic_trend_recovers_a_parabola() {
        let ys: Vec<f64> = (0..10).map(|x| 1.0 + 2.0 * x as f64 + 0.5 * (x * x) as f64).collect();
        let fit = quadratic_trend(&ys).unwrap();
        assert!((fit.a - 1.0).abs() < 1e-6);
        assert!((fit.b - 2.0).abs() < 1e-6);
        assert!((fit.c - 0.5).abs() < 1e-6);
        for (x, y) in ys.iter().enumerate() {
            assert!((fit.eval(x as f64) - y).abs() < 1e-6);
        }
        assert!(quadratic_trend(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn summary_reports_window_figures() {
        let s = summarize("Bitcoin", &series(&[100.0, 150.0, 120.0])).unwrap();

        assert_eq!(s.start_price, 100.0);
        assert_eq!(s.end_price, 120.0);
        assert!((s.return_pct - 20.0).abs() < 1e-9);
        assert!((s.max_return_pct - 50.0).abs() < 1e-9);
        assert!((s.max_drawdown_pct + 20.0).abs() < 1e-9);
        assert_eq!(s.status(), "+");

        let zero = summarize("Broken", &series(&[0.0, 1.0]));
        assert_eq!(zero, Err(WindowError::ZeroStartPrice));
    }

    proptest! {
        #[test]
        fn drawdown_is_never_positive(prices in prop::collection::vec(0.01f64..1e6, 1..60)) {
            prop_assert!(max_drawdown(&prices) <= 0.0);
        }

        #[test]
        fn drawdown_is_zero_iff_non_decreasing(prices in prop::collection::vec(0.01f64..1e6, 1..60)) {
            let non_decreasing = prices.windows(2).all(|w| w[0] <= w[1]);
            prop_assert_eq!(max_drawdown(&prices) == 0.0, non_decreasing);
        }

        #[test]
        fn constant_series_sharpe_is_zero(price in 0.01f64..1e6, n in 1usize..60) {
            prop_assert_eq!(sharpe_ratio(&vec![price; n]), 0.0);
        }
    }
}
