//! Typed failures for the library layer. Binaries wrap these in `anyhow`.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// A remote market-data request that produced nothing usable.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("empty payload from {url}")]
    EmptyPayload { url: String },

    #[error("malformed payload from {url}: {source}")]
    Malformed {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Reading or rewriting a `date,price` history table.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} line {line}: unparseable date {value:?}")]
    BadDate {
        path: PathBuf,
        line: u64,
        value: String,
    },

    #[error("{path} line {line}: unparseable price {value:?}")]
    BadPrice {
        path: PathBuf,
        line: u64,
        value: String,
    },

    #[error("data directory {0} not found, run the download tools first")]
    MissingDataDir(PathBuf),
}

/// Why a history yields nothing to analyse for a given window.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindowError {
    #[error("empty window: {start} is after {end}")]
    EmptyWindow { start: NaiveDate, end: NaiveDate },

    #[error("no valid data: window starts {start}, after the last stored day {last}")]
    OutsideStoredRange { start: NaiveDate, last: NaiveDate },

    #[error("no valid data in window")]
    NoValidData,

    #[error("no valid data: start price is zero")]
    ZeroStartPrice,
}

/// Operator input that cannot be turned into a selection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PeriodError {
    #[error("invalid option {0:?}, choose 1-9 or Q")]
    InvalidChoice(String),

    #[error("invalid date {0:?}, use YYYY-MM-DD")]
    InvalidDate(String),

    #[error("start date {start} must be before end date {end}")]
    StartNotBeforeEnd { start: NaiveDate, end: NaiveDate },

    #[error("invalid selection {0:?}")]
    InvalidSelection(String),

    #[error("no historical data found")]
    NoHistory,
}
