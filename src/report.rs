use crate::period::DateWindow;
use crate::stats::{AssetSummary, TrendLine};
use chrono::{NaiveDate, NaiveDateTime};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};
use std::cmp::Ordering;

fn base_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().enumerate().map(|(i, h)| {
            let cell = Cell::new(h).add_attribute(Attribute::Bold);
            if i == 0 {
                cell
            } else {
                cell.set_alignment(CellAlignment::Right)
            }
        }));
    table
}

fn get_visibility_ratio(current_pct: f64, top_pct: f64) -> f64 {
    if top_pct <= 0.0 {
        1.0
    } else {
        (0.4 + 0.6 * (current_pct.abs() / top_pct)).clamp(0.4, 1.0)
    }
}

fn pct_cell(value: f64, top_abs: f64, signed: bool) -> Cell {
    let shade = (255.0 * get_visibility_ratio(value, top_abs)) as u8;
    let color = if value >= 0.0 {
        Color::Rgb { r: 0, g: shade, b: 0 }
    } else {
        Color::Rgb { r: shade, g: 0, b: 0 }
    };
    let text = if signed {
        format!("{value:+.2}%")
    } else {
        format!("{value:.2}%")
    };
    Cell::new(text).fg(color).set_alignment(CellAlignment::Right)
}

fn right(text: String) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

/// Orders summaries best return first.
pub fn rank_by_return(summaries: &[AssetSummary]) -> Vec<&AssetSummary> {
    let mut ranked: Vec<&AssetSummary> = summaries.iter().collect();
    ranked.sort_by(|a, b| b.return_pct.partial_cmp(&a.return_pct).unwrap_or(Ordering::Equal));
    ranked
}

pub fn best_performer(summaries: &[AssetSummary]) -> Option<&AssetSummary> {
    rank_by_return(summaries).into_iter().next()
}

pub fn performance_table(summaries: &[AssetSummary]) -> Table {
    let mut table = base_table(&[
        "Asset",
        "Start Price",
        "End Price",
        "Return",
        "Max Return",
        "Max DD",
        "Sharpe",
        "Status",
    ]);

    let top_abs = summaries
        .iter()
        .map(|s| s.return_pct.abs())
        .fold(0.0, f64::max);

    for summary in rank_by_return(summaries) {
        table.add_row(vec![
            Cell::new(&summary.name).fg(Color::Cyan),
            right(format!("${:.4}", summary.start_price)),
            right(format!("${:.4}", summary.end_price)),
            pct_cell(summary.return_pct, top_abs, true),
            pct_cell(summary.max_return_pct, top_abs, true),
            right(format!("{:.2}%", summary.max_drawdown_pct)).fg(Color::Red),
            right(format!("{:.2}", summary.sharpe)),
            Cell::new(summary.status()).set_alignment(CellAlignment::Center),
        ]);
    }

    table
}

pub fn trend_table(
    name: &str,
    start: (NaiveDate, f64),
    trend: &TrendLine,
    max_drawdown_pct: f64,
) -> Table {
    let mut table = base_table(&["Asset", "Start", "Start Price", "ATH Date", "ATH Price", "Trend Return", "Max DD"]);
    table.add_row(vec![
        Cell::new(name).fg(Color::Cyan),
        right(start.0.to_string()),
        right(format!("${:.4}", start.1)),
        right(trend.peak_date.to_string()),
        right(format!("${:.4}", trend.peak_price)),
        pct_cell(trend.trend_return_pct, trend.trend_return_pct.abs(), true),
        right(format!("{max_drawdown_pct:.2}%")).fg(Color::Red),
    ]);
    table
}

/// One stored history, summarised over everything it holds.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRow {
    pub name: String,
    pub rows: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
    pub last_price: Option<f64>,
    pub summary: Option<AssetSummary>,
    pub note: Option<String>,
}

pub fn status_table(rows: &[StatusRow]) -> Table {
    let mut table = base_table(&[
        "Asset",
        "Rows",
        "First",
        "Last",
        "Last Price",
        "Return",
        "Max DD",
        "Sharpe",
    ]);

    let top_abs = rows
        .iter()
        .filter_map(|r| r.summary.as_ref())
        .map(|s| s.return_pct.abs())
        .fold(0.0, f64::max);
    let dash = || right("-".to_string()).fg(Color::DarkGrey);
    let date = |ts: Option<NaiveDateTime>| ts.map(|t| t.date().to_string()).unwrap_or_else(|| "-".to_string());

    for row in rows {
        let mut cells = vec![
            Cell::new(&row.name).fg(Color::Cyan),
            right(row.rows.to_string()),
            right(date(row.first)),
            right(date(row.last)),
            row.last_price
                .map(|p| right(format!("${p:.4}")))
                .unwrap_or_else(dash),
        ];
        match &row.summary {
            Some(s) => cells.extend([
                pct_cell(s.return_pct, top_abs, true),
                right(format!("{:.2}%", s.max_drawdown_pct)).fg(Color::Red),
                right(format!("{:.2}", s.sharpe)),
            ]),
            None => {
                let note = row.note.clone().unwrap_or_else(|| "-".to_string());
                cells.extend([right(note).fg(Color::DarkGrey), dash(), dash()]);
            }
        }
        table.add_row(cells);
    }

    table
}

pub fn footer_line(
    window: &DateWindow,
    best: Option<&AssetSummary>,
    generated: NaiveDateTime,
) -> String {
    let best = best
        .map(|b| format!("{} ({:+.1}%)", b.name, b.return_pct))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "Period: {} to {} ({} days) | Best: {} | Generated: {}",
        window.start,
        window.end,
        window.day_count(),
        best,
        generated.format("%Y-%m-%d %H:%M")
    )
}
