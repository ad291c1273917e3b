//! Error types for loading, filtering and charting the pedestrian dataset.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong in the library.
///
/// None of these are retried: all operations are local and deterministic.
#[derive(Error, Debug)]
pub enum MelbvizError {
    /// A source file could not be read, or lacks a required column.
    #[error("data source {}: {reason}", path.display())]
    DataSource { path: PathBuf, reason: String },

    /// A row whose month/date fields cannot be turned into a timestamp.
    #[error("malformed row {row}, field '{field}': {reason}")]
    MalformedRow {
        row: usize,
        field: String,
        reason: String,
    },

    /// A filter argument of a shape the filter engine does not accept.
    #[error("invalid value for filter '{field}': {value}")]
    InvalidFilterValue { field: String, value: String },

    /// The rendering layer asked for a chart kind that is not registered.
    #[error("'{kind}' is not a valid plot type. Available plots are: {available}")]
    UnknownPlotKind { kind: String, available: String },

    /// Writing or reading the columnar snapshot failed.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl From<arrow::error::ArrowError> for MelbvizError {
    fn from(err: arrow::error::ArrowError) -> Self {
        MelbvizError::Snapshot(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for MelbvizError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        MelbvizError::Snapshot(err.to_string())
    }
}

impl MelbvizError {
    pub(crate) fn data_source(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        MelbvizError::DataSource {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed(row: usize, field: &str, reason: impl ToString) -> Self {
        MelbvizError::MalformedRow {
            row,
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_filter(field: &str, value: impl ToString) -> Self {
        MelbvizError::InvalidFilterValue {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MelbvizError>;
