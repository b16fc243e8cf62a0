//! Moving averages.

use chainbot_core::traits::{Indicator, StreamingIndicator};

/// Simple moving average.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
}

impl Sma {
    /// A zero period is treated as 1.
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }
}

impl Indicator for Sma {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        if data.len() < self.period {
            return vec![];
        }
        let n = self.period as f64;
        let mut sum: f64 = data[..self.period].iter().sum();
        let mut out = Vec::with_capacity(data.len() - self.period + 1);
        out.push(sum / n);
        for i in self.period..data.len() {
            sum += data[i] - data[i - self.period];
            out.push(sum / n);
        }
        out
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "SMA"
    }
}

/// Exponential moving average seeded with the SMA of the first `period`
/// values, smoothing factor `2 / (period + 1)`.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    alpha: f64,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
        }
    }
}

impl Indicator for Ema {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        if data.len() < self.period {
            return vec![];
        }
        let mut ema = data[..self.period].iter().sum::<f64>() / self.period as f64;
        let mut out = Vec::with_capacity(data.len() - self.period + 1);
        out.push(ema);
        for &price in &data[self.period..] {
            ema += self.alpha * (price - ema);
            out.push(ema);
        }
        out
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "EMA"
    }
}

/// EMA fed one close at a time; matches [`Ema`] value for value.
#[derive(Debug, Clone)]
pub struct StreamingEma {
    period: usize,
    alpha: f64,
    seed_sum: f64,
    count: usize,
    value: Option<f64>,
}

impl StreamingEma {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            seed_sum: 0.0,
            count: 0,
            value: None,
        }
    }
}

impl StreamingIndicator for StreamingEma {
    type Output = f64;

    fn update(&mut self, value: f64) -> Option<f64> {
        self.count += 1;
        self.value = match self.value {
            Some(ema) => Some(ema + self.alpha * (value - ema)),
            None => {
                self.seed_sum += value;
                (self.count == self.period).then(|| self.seed_sum / self.period as f64)
            }
        };
        self.value
    }

    fn current(&self) -> Option<f64> {
        self.value
    }

    fn reset(&mut self) {
        self.seed_sum = 0.0;
        self.count = 0;
        self.value = None;
    }

    fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "EMA"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let out = Sma::new(3).calculate(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(out, vec![2.0, 3.0, 4.0]);
        assert!(Sma::new(3).calculate(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn test_ema_seed_and_step() {
        let out = Ema::new(3).calculate(&[2.0, 4.0, 6.0, 8.0]);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 4.0).abs() < 1e-12);
        // alpha = 0.5
        assert!((out[1] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_streaming_matches_batch() {
        let data: Vec<f64> = (0..50).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let batch = Ema::new(7).calculate(&data);

        let mut streaming = StreamingEma::new(7);
        let stream: Vec<f64> = data.iter().filter_map(|&v| streaming.update(v)).collect();

        assert_eq!(batch.len(), stream.len());
        for (a, b) in batch.iter().zip(&stream) {
            assert!((a - b).abs() < 1e-9);
        }

        streaming.reset();
        assert!(!streaming.is_ready());
    }

    #[test]
    fn test_zero_period_is_clamped() {
        assert_eq!(Ema::new(0).period(), 1);
        assert_eq!(Sma::new(0).calculate(&[3.0, 4.0]), vec![3.0, 4.0]);
    }
}
