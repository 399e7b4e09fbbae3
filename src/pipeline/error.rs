use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    // A required column is absent, or present but without a single usable value
    #[error("Schema error in {dataset}: {message}")]
    Schema { dataset: String, message: String },

    #[error("Insufficient history: {found} usable rows after feature derivation, at least {required} required")]
    InsufficientHistory { found: usize, required: usize },

    #[error("Required column '{column}' not found in {dataset}")]
    MissingColumn { dataset: String, column: String },

    #[error("Parsing error reading CSV data from '{path}'")]
    CsvRead {
        path: String,
        #[source]
        source: PolarsError,
    },

    #[error("Encoding error writing CSV data for {dataset}")]
    CsvWrite {
        dataset: String,
        #[source]
        source: PolarsError,
    },

    #[error("No input files given for {0}")]
    NoInputs(String),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),
}

impl PipelineError {
    pub(crate) fn schema(dataset: &str, message: impl Into<String>) -> Self {
        PipelineError::Schema {
            dataset: dataset.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn missing_column(dataset: &str, column: &str) -> Self {
        PipelineError::MissingColumn {
            dataset: dataset.to_string(),
            column: column.to_string(),
        }
    }

    /// True for the errors that mean "the input does not have the expected shape".
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Schema { .. } | PipelineError::MissingColumn { .. }
        )
    }
}
