//! Analyzer pipelines over the stored histories.
//!
//! An asset whose window has no usable data is reported and skipped; the rest of
//! the batch is still analyzed.

use crate::assets::display_name;
use crate::chart::{self, ComparisonChart, ReturnLine};
use crate::error::WindowError;
use crate::history::{self, HistoryFile, PriceHistory, list_history_files};
use crate::period::DateWindow;
use crate::report::{self, StatusRow};
use crate::stats::{
    AssetSummary, DailySeries, TrendLine, cumulative_returns, drawdown_series, max_drawdown,
    quadratic_trend, reindex_daily, summarize, trend_to_peak,
};
use crate::storage_utils::AppConfig;
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// A stored history together with the name it is shown under.
#[derive(Debug, Clone)]
pub struct LoadedAsset {
    pub file: HistoryFile,
    pub name: String,
    pub history: PriceHistory,
}

/// Summary and cumulative-return curve of one asset over one window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowAnalysis {
    pub summary: AssetSummary,
    pub line: ReturnLine,
}

pub fn analyze_window(
    name: &str,
    history: &PriceHistory,
    window: &DateWindow,
) -> Result<WindowAnalysis, WindowError> {
    let series = reindex_daily(history, window)?;
    let returns = cumulative_returns(&series.prices())?;
    let summary = summarize(name, &series)?;
    let points = series.dates().into_iter().zip(returns).collect();

    Ok(WindowAnalysis {
        summary,
        line: ReturnLine {
            name: name.to_string(),
            points,
        },
    })
}

/// Price series, trend-to-peak line and drawdown of one asset over one window.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendAnalysis {
    pub series: DailySeries,
    pub trend: TrendLine,
    pub drawdown: Vec<f64>,
    pub max_drawdown_pct: f64,
}

pub fn analyze_trend(history: &PriceHistory, window: &DateWindow) -> Result<TrendAnalysis, WindowError> {
    let series = reindex_daily(history, window)?;
    let trend = trend_to_peak(&series)?;
    let prices = series.prices();

    Ok(TrendAnalysis {
        drawdown: drawdown_series(&prices),
        max_drawdown_pct: max_drawdown(&prices),
        series,
        trend,
    })
}

/// Loads every history in the data directory. Unreadable files are reported and skipped.
pub async fn load_assets(config: &AppConfig) -> Result<Vec<LoadedAsset>> {
    let files = list_history_files(&config.data_dir).await?;
    let mut assets = Vec::with_capacity(files.len());

    for file in files {
        let name = display_name(&file.asset, &config.display_names);
        match history::load(&file.path).await {
            Ok(Some(history)) => assets.push(LoadedAsset { file, name, history }),
            Ok(None) => debug!(path = %file.path.display(), "history vanished before loading"),
            Err(e) => {
                warn!(asset = %file.asset, error = %e, "skipping unreadable history");
                println!("⚠️ Could not read {name}: {e}");
            }
        }
    }

    Ok(assets)
}

/// First stored day across all readable histories.
pub async fn earliest_stored_date(data_dir: &Path) -> Option<NaiveDate> {
    let files = match list_history_files(data_dir).await {
        Ok(files) => files,
        Err(e) => {
            debug!(error = %e, "no histories to scan");
            return None;
        }
    };

    let mut earliest: Option<NaiveDate> = None;
    for file in files {
        let first = match history::load(&file.path).await {
            Ok(Some(history)) => history.first_timestamp().map(|ts| ts.date()),
            Ok(None) => None,
            Err(e) => {
                warn!(asset = %file.asset, error = %e, "ignoring unreadable history");
                None
            }
        };
        if let Some(first) = first {
            earliest = Some(earliest.map_or(first, |e| e.min(first)));
        }
    }
    earliest
}

fn chart_path(config: &AppConfig, stem: &str, now: NaiveDateTime) -> PathBuf {
    config
        .charts_dir
        .join(format!("{stem}_{}.svg", now.format("%Y%m%d_%H%M")))
}

async fn ensure_charts_dir(config: &AppConfig) -> Result<()> {
    fs::create_dir_all(&config.charts_dir)
        .await
        .with_context(|| format!("creating {}", config.charts_dir.display()))
}

/// Fixed-width summary rows printed under the comparison plot.
fn summary_notes(summaries: &[AssetSummary]) -> Vec<String> {
    let mut notes = vec![format!(
        "{:<16}{:>12}{:>12}{:>12}{:>10}",
        "Asset", "Return", "Max Return", "Max DD", "Sharpe"
    )];
    for s in report::rank_by_return(summaries) {
        notes.push(format!(
            "{:<16}{:>12}{:>12}{:>12}{:>10.2}  {}",
            s.name,
            format!("{:+.1}%", s.return_pct),
            format!("{:+.1}%", s.max_return_pct),
            format!("{:.1}%", s.max_drawdown_pct),
            s.sharpe,
            s.status()
        ));
    }
    notes
}

fn render_returns(
    path: &Path,
    title: String,
    analyses: &[WindowAnalysis],
    mut notes: Vec<String>,
    footer: String,
) -> Result<()> {
    let summaries: Vec<AssetSummary> = analyses.iter().map(|a| a.summary.clone()).collect();
    let lines: Vec<ReturnLine> = analyses.iter().map(|a| a.line.clone()).collect();

    let highlight = report::best_performer(&summaries).and_then(|best| {
        let line = lines.iter().find(|l| l.name == best.name)?;
        let values: Vec<f64> = line.points.iter().map(|(_, v)| *v).collect();
        quadratic_trend(&values).map(|fit| (line.name.as_str(), fit))
    });

    notes.push(String::new());
    notes.push(footer);
    chart::render_comparison(
        path,
        &ComparisonChart {
            title,
            lines: &lines,
            highlight,
            notes,
        },
    )
}

/// Cumulative-return comparison of every stored asset over `window`.
///
/// Returns the chart path, or `None` when no asset had data in the window.
pub async fn run_comparison(
    config: &AppConfig,
    window: &DateWindow,
    now: NaiveDateTime,
) -> Result<Option<PathBuf>> {
    let assets = load_assets(config).await?;
    println!("\n📈 Analyzing {} asset(s) for {}...", assets.len(), window.label);

    let mut analyses = Vec::with_capacity(assets.len());
    for asset in &assets {
        match analyze_window(&asset.name, &asset.history, window) {
            Ok(analysis) => {
                println!("✅ {}: {:+.2}%", asset.name, analysis.summary.return_pct);
                analyses.push(analysis);
            }
            Err(e) => {
                debug!(asset = %asset.file.asset, error = %e, "window skipped");
                println!("⚠️ {}: {e}", asset.name);
            }
        }
    }

    if analyses.is_empty() {
        println!("❌ No asset has valid data between {} and {}", window.start, window.end);
        return Ok(None);
    }

    let summaries: Vec<AssetSummary> = analyses.iter().map(|a| a.summary.clone()).collect();
    let footer = report::footer_line(window, report::best_performer(&summaries), now);
    println!("\n{}", report::performance_table(&summaries));
    println!("{footer}");

    ensure_charts_dir(config).await?;
    let path = chart_path(config, &format!("crypto_returns_{}", window.safe_label()), now);
    render_returns(
        &path,
        format!("PERFORMANCE COMPARISON - {}", window.label.to_uppercase()),
        &analyses,
        summary_notes(&summaries),
        footer,
    )
    .with_context(|| format!("rendering {}", path.display()))?;

    println!("\n✅ Chart saved as: {}", path.display());
    Ok(Some(path))
}

/// Price, trend-to-peak and drawdown chart for one stored asset.
pub async fn run_trend_drawdown(
    config: &AppConfig,
    asset: &LoadedAsset,
    window: &DateWindow,
    now: NaiveDateTime,
) -> Result<Option<PathBuf>> {
    let analysis = match analyze_trend(&asset.history, window) {
        Ok(analysis) => analysis,
        Err(e) => {
            println!("⚠️ {}: {e}", asset.name);
            return Ok(None);
        }
    };

    let (start_date, start_price) = (analysis.trend.start_date, analysis.trend.start_price);
    println!(
        "\n{}",
        report::trend_table(
            &asset.name,
            (start_date, start_price),
            &analysis.trend,
            analysis.max_drawdown_pct
        )
    );

    ensure_charts_dir(config).await?;
    let path = chart_path(config, &format!("{}_trend_drawdown", asset.file.asset), now);
    chart::render_trend_drawdown(
        &path,
        &asset.name,
        &analysis.series,
        &analysis.trend,
        &analysis.drawdown,
    )
    .with_context(|| format!("rendering {}", path.display()))?;

    println!("\n✅ Chart saved as: {}", path.display());
    Ok(Some(path))
}

/// Whole stored range of `history` as a window, if it has any rows.
fn stored_window(history: &PriceHistory) -> Option<DateWindow> {
    let start = history.first_timestamp()?.date();
    let end = history.last_timestamp()?.date();
    Some(DateWindow {
        start,
        end,
        label: "All Time".to_string(),
    })
}

pub fn status_row(asset: &LoadedAsset) -> (StatusRow, Option<WindowAnalysis>) {
    let history = &asset.history;
    let analysis = match stored_window(history) {
        Some(window) => analyze_window(&asset.name, history, &window),
        None => Err(WindowError::NoValidData),
    };
    let (summary, note, analysis) = match analysis {
        Ok(a) => (Some(a.summary.clone()), None, Some(a)),
        Err(e) => (None, Some(e.to_string()), None),
    };

    let row = StatusRow {
        name: asset.name.clone(),
        rows: history.len(),
        first: history.first_timestamp(),
        last: history.last_timestamp(),
        last_price: history.last_price(),
        summary,
        note,
    };
    (row, analysis)
}

/// One row per stored history over its full range, plus an all-time return chart.
pub async fn run_history_status(config: &AppConfig, now: NaiveDateTime) -> Result<Option<PathBuf>> {
    let assets = load_assets(config).await?;
    if assets.is_empty() {
        println!("⚠️ No history files in {}", config.data_dir.display());
        return Ok(None);
    }

    let mut rows = Vec::with_capacity(assets.len());
    let mut analyses = Vec::new();
    for asset in &assets {
        let (row, analysis) = status_row(asset);
        rows.push(row);
        analyses.extend(analysis);
    }

    println!("\n{}", report::status_table(&rows));
    if analyses.is_empty() {
        return Ok(None);
    }

    let summaries: Vec<AssetSummary> = analyses.iter().map(|a| a.summary.clone()).collect();
    let best = report::best_performer(&summaries)
        .map(|b| format!("{} ({:+.1}%)", b.name, b.return_pct))
        .unwrap_or_else(|| "-".to_string());
    let footer = format!(
        "Histories: {} | Best: {best} | Generated: {}",
        rows.len(),
        now.format("%Y-%m-%d %H:%M")
    );

    ensure_charts_dir(config).await?;
    let path = chart_path(config, "history_status", now);
    render_returns(
        &path,
        "ALL-TIME RETURNS".to_string(),
        &analyses,
        summary_notes(&summaries),
        footer,
    )
    .with_context(|| format!("rendering {}", path.display()))?;

    println!("\n✅ Chart saved as: {}", path.display());
    Ok(Some(path))
}
