//! Volatility indicators.

use chainbot_core::traits::Indicator;
use chainbot_core::types::Bar;

/// Average true range with Wilder smoothing.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    /// ATR from high, low and close series of equal length.
    ///
    /// The first true range needs a previous close, so the first reading
    /// appears at index `period`.
    pub fn calculate_ohlc(&self, high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
        let len = high.len().min(low.len()).min(close.len());
        if len <= self.period {
            return vec![];
        }
        let tr: Vec<f64> = (1..len)
            .map(|i| {
                (high[i] - low[i])
                    .max((high[i] - close[i - 1]).abs())
                    .max((low[i] - close[i - 1]).abs())
            })
            .collect();
        wilder(&tr, self.period)
    }

    pub fn calculate_bars(&self, bars: &[Bar]) -> Vec<f64> {
        if bars.len() <= self.period {
            return vec![];
        }
        let tr: Vec<f64> = bars
            .windows(2)
            .map(|w| w[1].true_range(Some(w[0].close)))
            .collect();
        wilder(&tr, self.period)
    }
}

fn wilder(values: &[f64], period: usize) -> Vec<f64> {
    if values.len() < period {
        return vec![];
    }
    let n = period as f64;
    let mut avg = values[..period].iter().sum::<f64>() / n;
    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(avg);
    for &v in &values[period..] {
        avg = (avg * (n - 1.0) + v) / n;
        out.push(avg);
    }
    out
}

impl Indicator for Atr {
    type Output = f64;

    /// Close-only approximation: true range degenerates to the absolute
    /// close-to-close change.
    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        if data.len() <= self.period {
            return vec![];
        }
        let moves: Vec<f64> = data.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
        wilder(&moves, self.period)
    }

    fn period(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> &str {
        "ATR"
    }
}
