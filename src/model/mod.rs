//! The model capability consumed by training and climatology prediction.
//!
//! A [`Predictor`] fits a [`Model`] on a [`FeatureMatrix`]; a fitted model
//! remembers the exact column order it was fitted on and refuses any other.

pub mod error;
pub mod evaluation;
pub mod ridge;

use crate::model::error::ModelError;

/// Named feature columns and row-major values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Splits off the last `fraction` of rows, keeping row order on both sides.
    pub fn split_tail(&self, fraction: f64) -> (FeatureMatrix, FeatureMatrix) {
        let at = split_point(self.rows.len(), fraction);
        let (head, tail) = self.rows.split_at(at);
        (
            FeatureMatrix::new(self.columns.clone(), head.to_vec()),
            FeatureMatrix::new(self.columns.clone(), tail.to_vec()),
        )
    }

    /// Checks that every row is as wide as the column list and finite.
    pub fn check(&self) -> Result<(), ModelError> {
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(ModelError::RaggedRow {
                    row: i,
                    expected: self.columns.len(),
                    found: row.len(),
                });
            }
            if let Some(j) = row.iter().position(|v| !v.is_finite()) {
                return Err(ModelError::NonFinite {
                    row: i,
                    column: self.columns[j].clone(),
                });
            }
        }
        Ok(())
    }
}

/// Index where the trailing `fraction` of `len` items begins. At least one
/// item stays on the leading side.
pub fn split_point(len: usize, fraction: f64) -> usize {
    let tail = (len as f64 * fraction.clamp(0.0, 1.0)).round() as usize;
    len.saturating_sub(tail).max(len.min(1))
}

/// Fits a model on features and targets.
pub trait Predictor {
    type Fitted: Model;

    fn fit(&self, features: &FeatureMatrix, targets: &[f64]) -> Result<Self::Fitted, ModelError>;
}

/// A fitted regression model.
pub trait Model: Send + Sync {
    /// The feature columns the model was fitted on, in order. Inputs must carry
    /// exactly these columns in exactly this order.
    fn feature_order(&self) -> &[String];

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ModelError>;

    fn check_columns(&self, features: &FeatureMatrix) -> Result<(), ModelError> {
        if features.columns() != self.feature_order() {
            return Err(ModelError::FeatureMismatch {
                expected: self.feature_order().to_vec(),
                found: features.columns().to_vec(),
            });
        }
        features.check()
    }
}
