//! Momentum indicators.

use chainbot_core::traits::{Indicator, StreamingIndicator};

/// Relative strength index with Wilder smoothing.
///
/// Needs `period + 1` closes for the first reading. A window without any
/// losses reads 100.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

impl Indicator for Rsi {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        if data.len() <= self.period {
            return vec![];
        }
        let n = self.period as f64;
        let changes: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();

        let (mut gain, mut loss) = changes[..self.period]
            .iter()
            .fold((0.0, 0.0), |(g, l), &c| (g + c.max(0.0), l + (-c).max(0.0)));
        gain /= n;
        loss /= n;

        let mut out = Vec::with_capacity(changes.len() - self.period + 1);
        out.push(rsi_from(gain, loss));
        for &c in &changes[self.period..] {
            gain = (gain * (n - 1.0) + c.max(0.0)) / n;
            loss = (loss * (n - 1.0) + (-c).max(0.0)) / n;
            out.push(rsi_from(gain, loss));
        }
        out
    }

    fn period(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> &str {
        "RSI"
    }
}

/// Incremental RSI, identical to [`Rsi`] once warmed up.
#[derive(Debug, Clone)]
pub struct StreamingRsi {
    period: usize,
    prev: Option<f64>,
    seen: usize,
    avg_gain: f64,
    avg_loss: f64,
    value: Option<f64>,
}

impl StreamingRsi {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            prev: None,
            seen: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
            value: None,
        }
    }
}

impl StreamingIndicator for StreamingRsi {
    type Output = f64;

    fn update(&mut self, value: f64) -> Option<f64> {
        let Some(prev) = self.prev.replace(value) else {
            return None;
        };
        let change = value - prev;
        let (g, l) = (change.max(0.0), (-change).max(0.0));
        let n = self.period as f64;
        self.seen += 1;

        if self.seen <= self.period {
            self.avg_gain += g / n;
            self.avg_loss += l / n;
            if self.seen < self.period {
                return None;
            }
        } else {
            self.avg_gain = (self.avg_gain * (n - 1.0) + g) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + l) / n;
        }
        self.value = Some(rsi_from(self.avg_gain, self.avg_loss));
        self.value
    }

    fn current(&self) -> Option<f64> {
        self.value
    }

    fn reset(&mut self) {
        *self = Self::new(self.period);
    }

    fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    fn period(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> &str {
        "RSI"
    }
}
