//! Short-horizon temperature forecast
//!
//! Ordinary least squares over `(i, value_i)` for `i = 0..n`, evaluated at
//! `x = n + horizon`. The model is refitted from scratch every cycle.

use serde::Serialize;
use thiserror::Error;

/// Too few samples to fit a line.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Forecast needs at least 2 samples, got {samples}")]
pub struct ForecastDegenerate {
    pub samples: usize,
}

/// Fitted line `value = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastModel {
    pub slope: f64,
    pub intercept: f64,
}

impl ForecastModel {
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Forecaster {
    horizon: usize,
}

impl Forecaster {
    pub fn new(horizon: usize) -> Self {
        Self { horizon }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Fit a line through the window, x indexed from 0.
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(&self, values: &[f64]) -> Result<ForecastModel, ForecastDegenerate> {
        let n = values.len();
        if n < 2 {
            return Err(ForecastDegenerate { samples: n });
        }

        let nf = n as f64;
        let x_mean = (nf - 1.0) / 2.0;
        let y_mean = values.iter().sum::<f64>() / nf;

        let (mut sxy, mut sxx) = (0.0, 0.0);
        for (i, y) in values.iter().enumerate() {
            let dx = i as f64 - x_mean;
            sxy += dx * (y - y_mean);
            sxx += dx * dx;
        }

        // sxx > 0 for n >= 2 since x values are distinct
        let slope = sxy / sxx;
        Ok(ForecastModel {
            slope,
            intercept: y_mean - slope * x_mean,
        })
    }

    /// Predicted value `horizon` steps past the end of the window.
    #[allow(clippy::cast_precision_loss)]
    pub fn predict(&self, values: &[f64]) -> Result<f64, ForecastDegenerate> {
        let model = self.fit(values)?;
        Ok(model.at((values.len() + self.horizon) as f64))
    }

    /// [`predict`](Self::predict), falling back to `0.0` on too few samples.
    pub fn predict_or_zero(&self, values: &[f64]) -> f64 {
        match self.predict(values) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(samples = e.samples, "Not enough samples to forecast, using 0.0");
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_linear_series() {
        let f = Forecaster::new(600);
        let model = f.fit(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert!(approx(model.slope, 1.0));
        assert!(approx(model.intercept, 1.0));
        assert!(approx(f.predict(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap(), 606.0));
    }

    #[test]
    fn test_flat_series_predicts_level() {
        let f = Forecaster::new(600);
        assert!(approx(f.predict(&[33.5; 10]).unwrap(), 33.5));
    }

    #[test]
    fn test_too_few_samples() {
        let f = Forecaster::new(600);
        assert_eq!(f.predict(&[]), Err(ForecastDegenerate { samples: 0 }));
        assert_eq!(f.predict(&[30.0]), Err(ForecastDegenerate { samples: 1 }));
        assert_eq!(f.predict_or_zero(&[]), 0.0);
    }

    #[test]
    fn test_two_samples_fit_exactly() {
        let f = Forecaster::new(2);
        // slope -0.5 from 30 at x=0: x=4 -> 28
        assert!(approx(f.predict(&[30.0, 29.5]).unwrap(), 28.0));
    }

    #[test]
    fn test_noisy_trend_recovered() {
        let values: Vec<f64> = (0..100)
            .map(|i| 30.0 + 0.01 * f64::from(i) + if i % 2 == 0 { 0.05 } else { -0.05 })
            .collect();
        let model = Forecaster::new(600).fit(&values).unwrap();
        assert!((model.slope - 0.01).abs() < 1e-3);
    }
}
