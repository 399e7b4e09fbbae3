use crate::model::error::ModelError;
use crate::model::{FeatureMatrix, Model};
use serde::Serialize;
use std::fmt;

/// Holdout error metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub mae: f64,
    pub rmse: f64,
    /// `NaN` when the actual values have no variance.
    pub r2: f64,
    pub samples: usize,
}

impl Metrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        let n = actual.len().min(predicted.len());
        if n == 0 {
            return Self {
                mae: f64::NAN,
                rmse: f64::NAN,
                r2: f64::NAN,
                samples: 0,
            };
        }
        let pairs = || actual.iter().zip(predicted).take(n);
        let mae = pairs().map(|(a, p)| (a - p).abs()).sum::<f64>() / n as f64;
        let sse = pairs().map(|(a, p)| (a - p).powi(2)).sum::<f64>();
        let mean = actual[..n].iter().sum::<f64>() / n as f64;
        let sst = actual[..n].iter().map(|a| (a - mean).powi(2)).sum::<f64>();
        Self {
            mae,
            rmse: (sse / n as f64).sqrt(),
            r2: if sst > 0.0 { 1.0 - sse / sst } else { f64::NAN },
            samples: n,
        }
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAE: {:.3}, RMSE: {:.3}, R²: {:.3} (n = {})",
            self.mae, self.rmse, self.r2, self.samples
        )
    }
}

pub fn evaluate<M: Model + ?Sized>(
    model: &M,
    features: &FeatureMatrix,
    targets: &[f64],
) -> Result<Metrics, ModelError> {
    let predicted = model.predict(features)?;
    Ok(Metrics::compute(targets, &predicted))
}
