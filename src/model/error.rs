use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Feature columns {found:?} do not match the model's feature order {expected:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Row {row} has {found} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Feature matrix has {rows} rows but {targets} targets were given")]
    TargetLength { rows: usize, targets: usize },

    #[error("Cannot fit a model on an empty training set")]
    EmptyTrainingSet,

    #[error("Model returned no prediction")]
    NoPrediction,

    #[error("Normal equations are singular; features are collinear")]
    Singular,

    #[error("Non-finite value in feature matrix at row {row}, column '{column}'")]
    NonFinite { row: usize, column: String },

    #[error("Failed to encode model artifact")]
    Encode(#[source] Box<bincode::error::EncodeError>),

    #[error("Failed to decode model artifact")]
    Decode(#[source] Box<bincode::error::DecodeError>),
}
