//! Indicator trait definitions.

use crate::error::IndicatorError;

/// Batch indicator over a price slice.
///
/// Output is aligned to the end of the input: the last output value belongs
/// to the last input value.
pub trait Indicator: Send + Sync {
    type Output;

    fn calculate(&self, data: &[f64]) -> Vec<Self::Output>;

    /// Minimum number of inputs before the first output.
    fn period(&self) -> usize;

    fn name(&self) -> &str;

    fn validate_data(&self, data: &[f64]) -> Result<(), IndicatorError> {
        if data.len() < self.period() {
            return Err(IndicatorError::InsufficientData {
                required: self.period(),
                available: data.len(),
            });
        }
        Ok(())
    }

    /// Most recent value, if there is enough data.
    fn last(&self, data: &[f64]) -> Option<Self::Output> {
        self.calculate(data).pop()
    }
}

/// Indicator updated one value at a time.
pub trait StreamingIndicator: Send + Sync {
    type Output;

    /// Feed a value; returns the current reading once ready.
    fn update(&mut self, value: f64) -> Option<Self::Output>;

    fn current(&self) -> Option<Self::Output>;

    fn reset(&mut self);

    fn is_ready(&self) -> bool;

    fn period(&self) -> usize;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WindowSum(usize);

    impl Indicator for WindowSum {
        type Output = f64;

        fn calculate(&self, data: &[f64]) -> Vec<f64> {
            data.windows(self.0).map(|w| w.iter().sum()).collect()
        }

        fn period(&self) -> usize {
            self.0
        }

        fn name(&self) -> &str {
            "sum"
        }
    }

    #[test]
    fn test_validate_and_last() {
        let sum = WindowSum(3);
        assert!(sum.validate_data(&[1.0, 2.0]).is_err());
        assert_eq!(sum.last(&[1.0, 2.0, 3.0, 4.0]), Some(9.0));
        assert_eq!(sum.last(&[1.0]), None);
    }
}
