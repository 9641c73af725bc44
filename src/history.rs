//! Per-asset price histories and their `date,price` CSV tables.

use crate::error::HistoryError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

pub const HISTORY_SUFFIX: &str = "_price_history.csv";

const WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// One sampled price. Timestamps are UTC without an offset attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceObservation {
    pub timestamp: NaiveDateTime,
    pub price: Option<f64>,
}

impl PriceObservation {
    pub fn new(timestamp: NaiveDateTime, price: f64) -> Self {
        Self {
            timestamp,
            price: Some(price).filter(|p| !p.is_nan()),
        }
    }
}

/// Observations sorted ascending with unique timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceHistory {
    observations: Vec<PriceObservation>,
}

impl PriceHistory {
    /// Sorts by timestamp and collapses duplicates, the later record winning.
    pub fn from_observations(mut observations: Vec<PriceObservation>) -> Self {
        // Stable sort keeps arrival order among equal timestamps.
        observations.sort_by_key(|o| o.timestamp);

        let mut deduped: Vec<PriceObservation> = Vec::with_capacity(observations.len());
        for obs in observations {
            match deduped.last_mut() {
                Some(last) if last.timestamp == obs.timestamp => *last = obs,
                _ => deduped.push(obs),
            }
        }

        Self {
            observations: deduped,
        }
    }

    pub fn observations(&self) -> &[PriceObservation] {
        &self.observations
    }

    pub fn into_observations(self) -> Vec<PriceObservation> {
        self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.observations.first().map(|o| o.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.observations.last().map(|o| o.timestamp)
    }

    pub fn has_valid_price(&self) -> bool {
        self.observations.iter().any(|o| o.price.is_some())
    }

    pub fn last_price(&self) -> Option<f64> {
        self.observations.iter().rev().find_map(|o| o.price)
    }
}

#[derive(Deserialize)]
struct HistoryRow {
    date: String,
    #[serde(default)]
    price: String,
}

#[derive(Serialize)]
struct HistoryRowOut {
    date: String,
    price: String,
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    for fmt in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.naive_utc());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(WRITE_FORMAT).to_string()
}

/// `Ok(None)` for a null cell (`""`, `nan`, `null`, `None`).
fn parse_price(raw: &str) -> Result<Option<f64>, ()> {
    let raw = raw.trim();
    if raw.is_empty() || ["nan", "null", "none"].contains(&raw.to_ascii_lowercase().as_str()) {
        return Ok(None);
    }
    let value: f64 = raw.parse().map_err(|_| ())?;
    Ok(Some(value).filter(|v| !v.is_nan()))
}

/// Parses a `date,price` table. `path` is only used for error messages.
pub fn parse_csv(bytes: &[u8], path: &Path) -> Result<PriceHistory, HistoryError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let csv_err = |source| HistoryError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut observations = Vec::new();
    for row in reader.deserialize::<HistoryRow>() {
        let row = row.map_err(csv_err)?;
        let line = observations.len() as u64 + 2;

        let timestamp = parse_timestamp(&row.date).ok_or_else(|| HistoryError::BadDate {
            path: path.to_path_buf(),
            line,
            value: row.date.clone(),
        })?;
        let price = parse_price(&row.price).map_err(|_| HistoryError::BadPrice {
            path: path.to_path_buf(),
            line,
            value: row.price.clone(),
        })?;

        observations.push(PriceObservation { timestamp, price });
    }

    Ok(PriceHistory::from_observations(observations))
}

pub fn to_csv(history: &PriceHistory, path: &Path) -> Result<Vec<u8>, HistoryError> {
    let csv_err = |source| HistoryError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    // An empty history still gets its header row.
    if history.is_empty() {
        writer.write_record(["date", "price"]).map_err(csv_err)?;
    }
    for obs in history.observations() {
        writer
            .serialize(HistoryRowOut {
                date: format_timestamp(&obs.timestamp),
                price: obs.price.map(|p| p.to_string()).unwrap_or_default(),
            })
            .map_err(csv_err)?;
    }

    writer
        .into_inner()
        .map_err(|e| HistoryError::Io {
            path: path.to_path_buf(),
            source: e.into_error(),
        })
}

/// Loads a history table; `Ok(None)` when the file does not exist yet.
pub async fn load(path: &Path) -> Result<Option<PriceHistory>, HistoryError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(HistoryError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let history = parse_csv(&bytes, path)?;
    debug!(path = %path.display(), rows = history.len(), "loaded history");
    Ok(Some(history))
}

/// Rewrites the whole table through a sibling temp file and a rename.
pub async fn save(path: &Path, history: &PriceHistory) -> Result<(), HistoryError> {
    let io_err = |source| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let bytes = to_csv(history, path)?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, bytes).await.map_err(io_err)?;
    fs::rename(&tmp_path, path).await.map_err(io_err)?;

    debug!(path = %path.display(), rows = history.len(), "saved history");
    Ok(())
}

pub fn history_path(data_dir: &Path, asset: &str) -> PathBuf {
    data_dir.join(format!("{asset}{HISTORY_SUFFIX}"))
}

/// A `<asset>_price_history.csv` file found in the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryFile {
    pub asset: String,
    pub path: PathBuf,
}

/// Lists history tables in `data_dir`, sorted by asset key.
pub async fn list_history_files(data_dir: &Path) -> Result<Vec<HistoryFile>, HistoryError> {
    let mut entries = match fs::read_dir(data_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(HistoryError::MissingDataDir(data_dir.to_path_buf()));
        }
        Err(source) => {
            return Err(HistoryError::Io {
                path: data_dir.to_path_buf(),
                source,
            });
        }
    };

    let mut files = Vec::new();
    loop {
        let entry = entries.next_entry().await.map_err(|source| HistoryError::Io {
            path: data_dir.to_path_buf(),
            source,
        })?;
        let Some(entry) = entry else { break };

        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(asset) = name.strip_suffix(HISTORY_SUFFIX) {
            if !asset.is_empty() {
                files.push(HistoryFile {
                    asset: asset.to_string(),
                    path: entry.path(),
                });
            }
        }
    }

    files.sort_by(|a, b| a.asset.cmp(&b.asset));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn parses_pandas_and_iso_timestamps() {
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_time(NaiveTime::MIN);
        assert_eq!(parse_timestamp("2024-01-02"), Some(midnight));
        assert_eq!(parse_timestamp("2024-01-02 00:00:00"), Some(midnight));
        assert_eq!(parse_timestamp("2024-01-02T00:00:00"), Some(midnight));
        assert_eq!(parse_timestamp("2024-01-02T01:00:00+01:00"), Some(midnight));

        let with_ms = parse_timestamp("2024-01-02 13:45:10.123").unwrap();
        assert_eq!(with_ms.and_utc().timestamp_subsec_millis(), 123);
        assert!(parse_timestamp("02/01/2024").is_none());
    }

    #[test]
    fn fraction_is_written_only_when_present() {
        assert_eq!(format_timestamp(&ts("2024-01-02 00:00:00")), "2024-01-02 00:00:00");
        assert_eq!(
            format_timestamp(&ts("2024-01-02 13:45:10.123")),
            "2024-01-02 13:45:10.123"
        );
    }

    #[test]
    fn from_observations_sorts_and_keeps_later_duplicate() {
        let history = PriceHistory::from_observations(vec![
            PriceObservation::new(ts("2024-01-03"), 3.0),
            PriceObservation::new(ts("2024-01-01"), 1.0),
            PriceObservation::new(ts("2024-01-03"), 30.0),
        ]);

        let prices: Vec<_> = history.observations().iter().map(|o| o.price).collect();
        assert_eq!(prices, vec![Some(1.0), Some(30.0)]);
        assert_eq!(history.first_timestamp(), Some(ts("2024-01-01")));
        assert_eq!(history.last_timestamp(), Some(ts("2024-01-03")));
    }

    #[test]
    fn parse_csv_tolerates_nulls_and_unsorted_rows() {
        let body = b"date,price\n2024-01-02 00:00:00,\n2024-01-01 00:00:00,100.5\n2024-01-03,nan\n";
        let history = parse_csv(body, Path::new("x.csv")).unwrap();

        assert_eq!(history.len(), 3);
        assert_eq!(history.observations()[0].price, Some(100.5));
        assert_eq!(history.observations()[1].price, None);
        assert_eq!(history.observations()[2].price, None);
        assert_eq!(history.last_price(), Some(100.5));
    }

    #[test]
    fn parse_csv_reports_bad_rows() {
        let err = parse_csv(b"date,price\nyesterday,1\n", Path::new("x.csv")).unwrap_err();
        assert!(matches!(err, HistoryError::BadDate { line: 2, .. }));

        let err = parse_csv(b"date,price\n2024-01-01,abc\n", Path::new("x.csv")).unwrap_err();
        assert!(matches!(err, HistoryError::BadPrice { line: 2, .. }));
    }

    #[test]
    fn to_csv_writes_header_and_empty_price_cells() {
        let history = PriceHistory::from_observations(vec![
            PriceObservation::new(ts("2024-01-01"), 100.0),
            PriceObservation {
                timestamp: ts("2024-01-02"),
                price: None,
            },
        ]);

        let out = String::from_utf8(to_csv(&history, Path::new("x.csv")).unwrap()).unwrap();
        assert_eq!(
            out,
            "date,price\n2024-01-01 00:00:00,100\n2024-01-02 00:00:00,\n"
        );

        let empty = String::from_utf8(to_csv(&PriceHistory::default(), Path::new("x.csv")).unwrap()).unwrap();
        assert_eq!(empty, "date,price\n");
    }

    #[tokio::test]
    async fn save_then_load_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("price_data");
        let path = history_path(&data_dir, "bitcoin");

        assert_eq!(load(&path).await.unwrap(), None);
        assert!(matches!(
            list_history_files(&data_dir).await,
            Err(HistoryError::MissingDataDir(_))
        ));

        let history = PriceHistory::from_observations(vec![
            PriceObservation::new(ts("2024-01-01"), 42000.25),
            PriceObservation::new(ts("2024-01-02 12:30:00.5"), 43000.0),
        ]);
        save(&path, &history).await.unwrap();
        save(&history_path(&data_dir, "solana"), &history).await.unwrap();
        std::fs::write(data_dir.join("notes.txt"), "ignored").unwrap();

        assert_eq!(load(&path).await.unwrap(), Some(history));
        assert!(!data_dir.join("bitcoin_price_history.csv.tmp").exists());

        let assets: Vec<_> = list_history_files(&data_dir)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.asset)
            .collect();
        assert_eq!(assets, vec!["bitcoin", "solana"]);
    }
}
