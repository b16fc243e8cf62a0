//! Backtest report generation.

use chainbot_core::types::Portfolio;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::{BacktestConfig, BacktestStats};

const RULE_WIDTH: usize = 48;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Display name of the strategy.
    pub strategy: String,
    pub config: BacktestConfig,
    pub stats: BacktestStats,
    pub final_portfolio: Portfolio,
}

impl BacktestReport {
    /// Plain-text summary for the terminal.
    pub fn summary(&self) -> String {
        let st = &self.stats;
        let sections: [(&str, Vec<(&str, String)>); 3] = [
            (
                "Performance",
                vec![
                    ("Initial capital", format!("${:.2}", st.initial_capital)),
                    ("Final equity", format!("${:.2}", st.final_equity)),
                    ("Return", format!("{:.2}%", st.total_return_pct)),
                    ("Annualized", format!("{:.2}%", st.annualized_return_pct)),
                    ("Max drawdown", format!("{:.2}%", st.max_drawdown_pct)),
                    ("Sharpe", format!("{:.2}", st.sharpe_ratio)),
                    ("Sortino", format!("{:.2}", st.sortino_ratio)),
                ],
            ),
            (
                "Trades",
                vec![
                    ("Round trips", st.total_trades.to_string()),
                    ("Won / lost", format!("{} / {}", st.winning_trades, st.losing_trades)),
                    ("Stopped out", st.stop_loss_exits.to_string()),
                    ("Win rate", format!("{:.2}%", st.win_rate_pct)),
                    ("Avg win / loss", format!("${:.2} / ${:.2}", st.avg_win, st.avg_loss)),
                    ("Profit factor", format!("{:.2}", st.profit_factor)),
                    ("Fees", format!("${:.2}", st.total_fees)),
                ],
            ),
            (
                "Data",
                vec![
                    ("Bars", st.bars_processed.to_string()),
                    ("Equity points", st.equity_curve.len().to_string()),
                ],
            ),
        ];

        let mut out = format!(
            "Backtest: {} on {} {}\n{}\n",
            self.strategy,
            self.config.symbol,
            self.config.timeframe,
            "=".repeat(RULE_WIDTH)
        );
        for (title, rows) in sections {
            let _ = writeln!(out, "\n{title}\n{}", "-".repeat(title.len()));
            for (label, value) in rows {
                let _ = writeln!(out, "  {label:<16}{value:>20}");
            }
        }
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Equity curve as `timestamp,equity` CSV.
    pub fn equity_to_csv(&self) -> String {
        self.stats
            .equity_curve
            .iter()
            .fold(String::from("timestamp,equity\n"), |mut csv, (ts, equity)| {
                let _ = writeln!(csv, "{ts},{equity}");
                csv
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn report() -> BacktestReport {
        let mut stats = BacktestStats::new(dec!(10000));
        stats.final_equity = dec!(11000);
        stats.total_return_pct = dec!(10);
        stats.max_drawdown_pct = dec!(5);
        stats.total_trades = 10;
        stats.winning_trades = 6;
        stats.losing_trades = 4;
        stats.equity_curve = vec![(1_700_000_000_000, dec!(10000)), (1_700_003_600_000, dec!(11000))];

        BacktestReport {
            strategy: "Low RSI".into(),
            config: BacktestConfig::new("low_rsi", "SOL"),
            stats,
            final_portfolio: Portfolio::new(dec!(11000)),
        }
    }

    #[test]
    fn test_report_summary() {
        let summary = report().summary();
        assert!(summary.starts_with("Backtest: Low RSI on SOL 1h\n"));
        assert!(summary.contains("Return"));
        assert!(summary.contains("10.00%"));
        assert!(summary.contains("6 / 4"));
    }

    #[test]
    fn test_exports() {
        let report = report();
        assert!(report.to_json().unwrap().contains("\"strategy\": \"Low RSI\""));
        assert_eq!(
            report.equity_to_csv(),
            "timestamp,equity\n1700000000000,10000\n1700003600000,11000\n"
        );
    }
}
