pub mod analysis;
pub mod assets;
pub mod chart;
pub mod coingecko;
pub mod error;
pub mod geckoterminal;
pub mod history;
pub mod http;
pub mod lenient;
pub mod logging;
pub mod merge;
pub mod period;
pub mod prompt;
pub mod report;
pub mod stats;
pub mod storage_utils;
pub mod updater;
