//! CSV data source.

use chainbot_core::error::DataError;
use chainbot_core::types::Bar;
use chrono::{NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// One OHLCV row. Header names vary between exporters.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(
        alias = "Date",
        alias = "date",
        alias = "timestamp",
        alias = "Timestamp",
        alias = "open_time",
        alias = "time"
    )]
    date: String,
    #[serde(alias = "Open", alias = "open")]
    open: f64,
    #[serde(alias = "High", alias = "high")]
    high: f64,
    #[serde(alias = "Low", alias = "low")]
    low: f64,
    #[serde(alias = "Close", alias = "close", alias = "Adj Close")]
    close: f64,
    #[serde(alias = "Volume", alias = "volume", default)]
    volume: f64,
}

/// Historical candles stored as CSV, used by the backtester.
pub struct CsvDataSource {
    path: PathBuf,
}

impl CsvDataSource {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataError::SymbolNotFound(path.display().to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Load every row, sorted oldest first.
    pub async fn load_all(&self) -> Result<Vec<Bar>, DataError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_bars(&path))
            .await
            .map_err(|e| DataError::Internal(e.to_string()))?
    }
}

fn read_bars(path: &Path) -> Result<Vec<Bar>, DataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataError::ParseError(e.to_string()))?;

    let mut bars = Vec::new();
    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.map_err(|e| DataError::ParseError(format!("row {}: {e}", line + 1)))?;
        let timestamp = parse_timestamp(&row.date)?;
        bars.push(Bar::new(
            timestamp, row.open, row.high, row.low, row.close, row.volume,
        ));
    }

    if bars.is_empty() {
        return Err(DataError::NoDataAvailable);
    }

    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    tracing::debug!(path = %path.display(), bars = bars.len(), "loaded CSV bars");
    Ok(bars)
}

/// Parse a date cell into unix milliseconds.
fn parse_timestamp(raw: &str) -> Result<i64, DataError> {
    const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
    const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];

    if let Ok(ts) = raw.parse::<i64>() {
        // Ten digits or fewer is seconds.
        return Ok(if ts > 10_000_000_000 { ts } else { ts * 1000 });
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.timestamp_millis());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, format) {
            if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                return Ok(dt.and_utc().timestamp_millis());
            }
        }
    }

    Err(DataError::ParseError(format!("Could not parse date: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("2024-01-15").unwrap(), 1_705_276_800_000);
        assert_eq!(
            parse_timestamp("2024-01-15 10:30:00").unwrap(),
            1_705_276_800_000 + (10 * 3600 + 30 * 60) * 1000
        );
        assert_eq!(parse_timestamp("1705312800000").unwrap(), 1_705_312_800_000);
        assert_eq!(parse_timestamp("1705312800").unwrap(), 1_705_312_800_000);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[tokio::test]
    async fn test_load_sorts_rows() {
        let path = std::env::temp_dir().join(format!("chainbot-csv-{}.csv", std::process::id()));
        {
            let mut f = std::fs::File::create(&path).unwrap();
            writeln!(f, "Date,Open,High,Low,Close,Volume").unwrap();
            writeln!(f, "2024-01-02,2,3,1,2.5,100").unwrap();
            writeln!(f, "2024-01-01,1,2,0.5,1.5,50").unwrap();
        }

        let bars = CsvDataSource::new(&path).unwrap().load_all().await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(bars.len(), 2);
        assert!(bars[0].timestamp < bars[1].timestamp);
        assert_eq!(bars[0].close, 1.5);
        assert_eq!(bars[1].volume, 100.0);
    }

    #[test]
    fn test_missing_file() {
        assert!(CsvDataSource::new("/nonexistent/bars.csv").is_err());
    }
}
