//! Candle intervals.

use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle interval used by strategy jobs and market data requests.
///
/// The string form matches the exchange kline interval codes, so a
/// `Timeframe` can be passed straight through to the market data API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    #[default]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Daily,
    #[serde(rename = "1w")]
    Weekly,
    #[serde(rename = "1M")]
    Monthly,
}

impl Timeframe {
    /// Interval length in seconds.
    pub fn as_secs(&self) -> u64 {
        match self {
            Timeframe::Minute1 => 60,
            Timeframe::Minute5 => 300,
            Timeframe::Minute15 => 900,
            Timeframe::Minute30 => 1_800,
            Timeframe::Hour1 => 3_600,
            Timeframe::Hour4 => 14_400,
            Timeframe::Daily => 86_400,
            Timeframe::Weekly => 604_800,
            // Calendar months vary; 30 days is close enough for scheduling.
            Timeframe::Monthly => 2_592_000,
        }
    }

    pub fn as_millis(&self) -> i64 {
        self.as_secs() as i64 * 1_000
    }

    /// Milliseconds until the candle containing `now_ms` closes.
    ///
    /// Intervals up to a day are aligned to the unix epoch. Weekly candles
    /// open on Monday 00:00 UTC and monthly candles on the 1st of the month.
    pub fn millis_until_close(&self, now_ms: i64) -> i64 {
        match self {
            Timeframe::Weekly => {
                let len = self.as_millis();
                len - (now_ms - EPOCH_TO_MONDAY_MS).rem_euclid(len)
            }
            Timeframe::Monthly => match next_month_start(now_ms) {
                Some(close) => close - now_ms,
                None => self.as_millis() - now_ms.rem_euclid(self.as_millis()),
            },
            _ => {
                let len = self.as_millis();
                len - now_ms.rem_euclid(len)
            }
        }
    }

    pub fn all() -> &'static [Timeframe] {
        &[
            Timeframe::Minute1,
            Timeframe::Minute5,
            Timeframe::Minute15,
            Timeframe::Minute30,
            Timeframe::Hour1,
            Timeframe::Hour4,
            Timeframe::Daily,
            Timeframe::Weekly,
            Timeframe::Monthly,
        ]
    }
}

/// 1970-01-01 was a Thursday; the first Monday is four days later.
const EPOCH_TO_MONDAY_MS: i64 = 4 * 86_400_000;

/// Unix millis of the first instant of the month after `now_ms`.
fn next_month_start(now_ms: i64) -> Option<i64> {
    let now = DateTime::from_timestamp_millis(now_ms)?;
    let (year, month) = match now.month() {
        12 => (now.year() + 1, 1),
        m => (now.year(), m + 1),
    };
    let start = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
    Some(start.and_utc().timestamp_millis())
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute15 => "15m",
            Timeframe::Minute30 => "30m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
            Timeframe::Daily => "1d",
            Timeframe::Weekly => "1w",
            Timeframe::Monthly => "1M",
        };
        f.write_str(s)
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "1M" is month, "1m" is minute; check before lowercasing.
        if s == "1M" {
            return Ok(Timeframe::Monthly);
        }
        match s.to_lowercase().as_str() {
            "1m" | "1min" | "minute" => Ok(Timeframe::Minute1),
            "5m" | "5min" => Ok(Timeframe::Minute5),
            "15m" | "15min" => Ok(Timeframe::Minute15),
            "30m" | "30min" => Ok(Timeframe::Minute30),
            "1h" | "1hour" | "hour" | "60m" => Ok(Timeframe::Hour1),
            "4h" | "4hour" => Ok(Timeframe::Hour4),
            "1d" | "day" | "daily" => Ok(Timeframe::Daily),
            "1w" | "week" | "weekly" => Ok(Timeframe::Weekly),
            "month" | "monthly" => Ok(Timeframe::Monthly),
            _ => Err(format!("Invalid timeframe: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_duration() {
        assert_eq!(Timeframe::Minute15.as_secs(), 900);
        assert_eq!(Timeframe::Hour4.as_millis(), 14_400_000);
    }

    #[test]
    fn test_timeframe_parse_distinguishes_month_and_minute() {
        assert_eq!("1m".parse::<Timeframe>().unwrap(), Timeframe::Minute1);
        assert_eq!("1M".parse::<Timeframe>().unwrap(), Timeframe::Monthly);
        assert_eq!("15min".parse::<Timeframe>().unwrap(), Timeframe::Minute15);
        assert_eq!("Daily".parse::<Timeframe>().unwrap(), Timeframe::Daily);
        assert!("7h".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_display_matches_interval_codes() {
        for tf in Timeframe::all() {
            assert_eq!(tf.to_string().parse::<Timeframe>().unwrap(), *tf);
        }
    }

    #[test]
    fn test_millis_until_close() {
        let hour = Timeframe::Hour1;
        assert_eq!(hour.millis_until_close(0), 3_600_000);
        assert_eq!(hour.millis_until_close(3_599_000), 1_000);
        assert_eq!(hour.millis_until_close(3_600_000 + 600_000), 3_000_000);
    }

    #[test]
    fn test_weekly_candles_close_on_monday() {
        // 2024-01-08 00:00 UTC, a Monday
        let monday = 1_704_672_000_000;
        let week = Timeframe::Weekly;
        assert_eq!(week.millis_until_close(monday - 1_000), 1_000);
        assert_eq!(week.millis_until_close(monday), 604_800_000);
        // Thursday 2024-01-11 12:00 closes 3.5 days later
        assert_eq!(
            week.millis_until_close(monday + 3 * 86_400_000 + 43_200_000),
            3 * 86_400_000 + 43_200_000
        );
    }

    #[test]
    fn test_monthly_candles_close_on_the_first() {
        // 2024-02-01 00:00 UTC
        let feb = 1_706_745_600_000;
        let month = Timeframe::Monthly;
        assert_eq!(month.millis_until_close(feb - 1_000), 1_000);
        // February 2024 has 29 days
        assert_eq!(month.millis_until_close(feb), 29 * 86_400_000);
        // 2024-12-31 00:00 UTC rolls into the next year
        assert_eq!(month.millis_until_close(1_735_603_200_000), 86_400_000);
    }
}
