//! Market data sources.
//!
//! [`BinanceMarketData`] serves closed candles and spot prices for the
//! strategy scheduler; [`CsvDataSource`] feeds historical bars to the
//! backtester.

mod binance;
mod cache;
mod csv_source;

pub use binance::{BinanceConfig, BinanceMarketData};
pub use cache::CandleCache;
pub use csv_source::CsvDataSource;

use chainbot_core::error::DataError;
use chainbot_core::types::Bar;

/// Load bars from a CSV file.
pub async fn load_csv(path: &str) -> Result<Vec<Bar>, DataError> {
    let source = CsvDataSource::new(path)?;
    source.load_all().await
}
