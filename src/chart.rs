//! SVG charts rendered with plotters.

use crate::assets::color_for;
use crate::stats::{DailySeries, QuadraticFit, TrendLine};
use anyhow::Result;
use chrono::{Duration, NaiveDate};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

const BACKGROUND: RGBColor = RGBColor(0x0A, 0x0A, 0x0A);
const PANEL: RGBColor = RGBColor(0x0F, 0x0F, 0x0F);
const GRID: RGBColor = RGBColor(0x44, 0x44, 0x44);
const MUTED: RGBColor = RGBColor(0x88, 0x88, 0x88);
const TEXT: RGBColor = RGBColor(0xEE, 0xEE, 0xEE);
const DRAWDOWN: RGBColor = RGBColor(0xE0, 0x3C, 0x31);
const TREND: RGBColor = RGBColor(0xFF, 0xD7, 0x00);

const DASH_SEGMENTS: usize = 120;

/// One asset's cumulative-return curve.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnLine {
    pub name: String,
    pub points: Vec<(NaiveDate, f64)>,
}

impl ReturnLine {
    pub fn last_value(&self) -> Option<f64> {
        self.points.last().map(|(_, v)| *v)
    }
}

pub struct ComparisonChart<'a> {
    pub title: String,
    pub lines: &'a [ReturnLine],
    /// Smoothed trend drawn over the named line.
    pub highlight: Option<(&'a str, QuadraticFit)>,
    /// Extra rows printed under the plot (summary table and footer).
    pub notes: Vec<String>,
}

fn day_offset(origin: NaiveDate, day: NaiveDate) -> f64 {
    (day - origin).num_days() as f64
}

fn day_label(origin: NaiveDate, offset: f64) -> String {
    (origin + Duration::days(offset.round() as i64))
        .format("%Y-%m-%d")
        .to_string()
}

/// Padded `(min, max)` of `values`, never degenerate.
pub fn padded_range(values: impl IntoIterator<Item = f64>, fraction: f64) -> (f64, f64) {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return (-1.0, 1.0);
    }
    let pad = ((hi - lo) * fraction).max(1e-9_f64.max(hi.abs().max(lo.abs()) * 0.01));
    (lo - pad, hi + pad)
}

fn font(size: u32, color: &RGBColor) -> TextStyle<'static> {
    ("sans-serif", size).into_font().color(color)
}

/// Draws `f` over `[from, to]` as alternating dashes.
fn draw_dashed<DB, F>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<plotters::coord::types::RangedCoordf64, plotters::coord::types::RangedCoordf64>>,
    from: f64,
    to: f64,
    style: ShapeStyle,
    f: F,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
    F: Fn(f64) -> f64,
{
    let step = (to - from) / DASH_SEGMENTS as f64;
    if step <= 0.0 {
        return Ok(());
    }
    let dashes = (0..DASH_SEGMENTS).step_by(2).map(|i| {
        let x0 = from + step * i as f64;
        let x1 = x0 + step;
        PathElement::new(vec![(x0, f(x0)), (x1, f(x1))], style)
    });
    chart
        .draw_series(dashes)
        .map_err(|e| anyhow::anyhow!("drawing dashed line: {e}"))?;
    Ok(())
}

fn draw_notes<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, notes: &[String]) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let style = ("monospace", 15).into_font().color(&MUTED);
    for (i, line) in notes.iter().enumerate() {
        area.draw(&Text::new(line.clone(), (40, 10 + 22 * i as i32), style.clone()))
            .map_err(|e| anyhow::anyhow!("drawing notes: {e}"))?;
    }
    Ok(())
}

/// Cumulative-return comparison with labelled end points and an optional
/// dashed trend over the highlighted asset.
pub fn render_comparison(path: &Path, comparison: &ComparisonChart<'_>) -> Result<()> {
    let origin = comparison
        .lines
        .iter()
        .filter_map(|l| l.points.first().map(|(d, _)| *d))
        .min()
        .ok_or_else(|| anyhow::anyhow!("nothing to plot"))?;
    let last_offset = comparison
        .lines
        .iter()
        .filter_map(|l| l.points.last().map(|(d, _)| day_offset(origin, *d)))
        .fold(0.0, f64::max)
        .max(1.0);

    let notes_height = 30 + 22 * comparison.notes.len() as u32;
    let root = SVGBackend::new(path, (1800, 940 + notes_height)).into_drawing_area();
    root.fill(&BACKGROUND)?;
    let root = root.titled("CRYPTO RETURNS ANALYSIS", font(30, &TEXT))?;
    let (upper, lower) = root.split_vertically(870);

    let (y_min, y_max) = padded_range(
        comparison.lines.iter().flat_map(|l| l.points.iter().map(|(_, v)| *v)).chain([0.0]),
        0.05,
    );
    // Room on the right for the end-point labels.
    let x_max = last_offset * 1.15;

    let mut chart = ChartBuilder::on(&upper)
        .caption(&comparison.title, font(24, &TEXT))
        .margin(25)
        .x_label_area_size(45)
        .y_label_area_size(80)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)?;

    chart.plotting_area().fill(&PANEL)?;
    chart
        .configure_mesh()
        .bold_line_style(GRID.mix(0.3))
        .light_line_style(TRANSPARENT)
        .axis_style(MUTED)
        .label_style(font(14, &TEXT))
        .axis_desc_style(font(16, &MUTED))
        .x_labels(8)
        .x_label_formatter(&|x| day_label(origin, *x))
        .y_label_formatter(&|y| format!("{y:.0}%"))
        .x_desc("Date")
        .y_desc("Cumulative Return (%)")
        .draw()?;

    chart.draw_series(LineSeries::new(
        [(0.0, 0.0), (last_offset, 0.0)],
        MUTED.mix(0.6).stroke_width(1),
    ))?;

    for (i, line) in comparison.lines.iter().enumerate() {
        let (r, g, b) = color_for(&line.name, i);
        let color = RGBColor(r, g, b);
        let highlighted = comparison.highlight.is_some_and(|(name, _)| name == line.name);
        let width = if line.name == "Quantum Flow" { 4 } else { 3 };
        let xy: Vec<(f64, f64)> = line
            .points
            .iter()
            .map(|(d, v)| (day_offset(origin, *d), *v))
            .collect();

        // Soft glow under the main stroke.
        for glow in [8, 5] {
            chart.draw_series(LineSeries::new(xy.iter().copied(), color.mix(0.1).stroke_width(glow)))?;
        }
        chart
            .draw_series(LineSeries::new(xy.iter().copied(), color.stroke_width(width)))?
            .label(line.name.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3)));

        if let Some(&(x, y)) = xy.last() {
            chart.draw_series(std::iter::once(Circle::new((x, y), 7, color.filled())))?;
            chart.draw_series(std::iter::once(Circle::new((x, y), 7, WHITE.stroke_width(2))))?;
            chart.draw_series(std::iter::once(Text::new(
                format!("{}: {:+.1}%", line.name, y),
                (x + last_offset * 0.01, y),
                font(if highlighted { 16 } else { 14 }, &color),
            )))?;
        }

        if let Some((_, fit)) = comparison.highlight.filter(|(name, _)| *name == line.name) {
            let first = xy.first().map(|(x, _)| *x).unwrap_or(0.0);
            let last = xy.last().map(|(x, _)| *x).unwrap_or(first);
            draw_dashed(&mut chart, first, last, TREND.mix(0.5).stroke_width(1), |x| fit.eval(x - first))?;
        }
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(RGBColor(0x1A, 0x1A, 0x1A).mix(0.9))
        .border_style(GRID)
        .label_font(font(15, &TEXT))
        .draw()?;

    draw_notes(&lower, &comparison.notes)?;
    root.present()?;
    Ok(())
}

/// Price with a dashed trend-to-peak line on top, drawdown area below.
pub fn render_trend_drawdown(
    path: &Path,
    name: &str,
    series: &DailySeries,
    trend: &TrendLine,
    drawdown: &[f64],
) -> Result<()> {
    let (origin, _) = series.first().ok_or_else(|| anyhow::anyhow!("nothing to plot"))?;
    let xy: Vec<(f64, f64)> = series
        .points()
        .iter()
        .map(|(d, p)| (day_offset(origin, *d), *p))
        .collect();
    let x_max = xy.last().map(|(x, _)| *x).unwrap_or(0.0).max(1.0);

    let root = SVGBackend::new(path, (1400, 800)).into_drawing_area();
    root.fill(&BACKGROUND)?;
    let (upper, lower) = root.split_vertically(530);

    let (y_min, y_max) = padded_range(
        xy.iter().map(|(_, p)| *p).chain(trend.values.iter().copied()),
        0.05,
    );
    let mut price_chart = ChartBuilder::on(&upper)
        .caption(format!("{name} - Price with Trend to ATH"), font(24, &TEXT))
        .margin(20)
        .x_label_area_size(30)
        .y_label_area_size(90)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)?;
    price_chart
        .configure_mesh()
        .bold_line_style(GRID.mix(0.3))
        .light_line_style(TRANSPARENT)
        .axis_style(MUTED)
        .label_style(font(13, &TEXT))
        .axis_desc_style(font(15, &MUTED))
        .x_label_formatter(&|x| day_label(origin, *x))
        .y_label_formatter(&|y| format!("{y:.4}"))
        .y_desc("Price (USD)")
        .draw()?;

    price_chart
        .draw_series(LineSeries::new(xy.iter().copied(), WHITE.stroke_width(2)))?
        .label("Price")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], WHITE.stroke_width(2)));

    let trend_origin = day_offset(origin, trend.start_date);
    draw_dashed(&mut price_chart, trend_origin, x_max, DRAWDOWN.stroke_width(2), |x| {
        trend.value_at(x - trend_origin)
    })?;
    // Legend entry for the dashed line.
    price_chart
        .draw_series(std::iter::empty::<PathElement<(f64, f64)>>())?
        .label(format!("Trend to ATH (${:.4})", trend.peak_price))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], DRAWDOWN.stroke_width(2)));

    price_chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(RGBColor(0x1A, 0x1A, 0x1A).mix(0.9))
        .border_style(GRID)
        .label_font(font(14, &TEXT))
        .draw()?;

    let dd_min = drawdown.iter().copied().fold(0.0, f64::min).min(-1.0) * 1.05;
    let mut dd_chart = ChartBuilder::on(&lower)
        .caption("Drawdown", font(20, &TEXT))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(90)
        .build_cartesian_2d(0.0..x_max, dd_min..0.0)?;
    dd_chart
        .configure_mesh()
        .bold_line_style(GRID.mix(0.3))
        .light_line_style(TRANSPARENT)
        .axis_style(MUTED)
        .label_style(font(13, &TEXT))
        .axis_desc_style(font(15, &MUTED))
        .x_label_formatter(&|x| day_label(origin, *x))
        .y_label_formatter(&|y| format!("{y:.0}%"))
        .x_desc("Date")
        .y_desc("Drawdown (%)")
        .draw()?;

    dd_chart.draw_series(
        AreaSeries::new(
            xy.iter().zip(drawdown).map(|((x, _), dd)| (*x, *dd)),
            0.0,
            DRAWDOWN.mix(0.7),
        )
        .border_style(DRAWDOWN),
    )?;

    root.present()?;
    Ok(())
}
