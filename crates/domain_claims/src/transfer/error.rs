//! Errors of the bulk transfer routines

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use core_kernel::PortError;
use super::format::FileFormat;

/// Which uploaded file a problem belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    /// The claims file
    Claims,
    /// Claim details, from a separate file or a claims envelope
    Details,
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileRole::Claims => f.write_str("claims"),
            FileRole::Details => f.write_str("details"),
        }
    }
}

/// The file as a whole cannot be read
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("unknown format '{0}', expected csv or json")]
    UnknownFormat(String),

    #[error("declared format {declared} does not match file '{filename}'")]
    FormatMismatch {
        declared: FileFormat,
        filename: String,
    },

    #[error("file is {size} bytes, the limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("file has more than {limit} rows")]
    TooManyRows { limit: usize },

    #[error("file is not valid UTF-8")]
    NotUtf8,

    #[error("file is empty")]
    Empty,

    #[error("missing required columns: {}; is the file pipe (|) delimited?", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("unknown columns: {}", .0.join(", "))]
    UnknownColumns(Vec<String>),

    #[error("column '{0}' appears more than once")]
    DuplicateColumn(String),

    #[error("malformed CSV: {0}")]
    Csv(String),

    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("expected a JSON array of objects, found {0}")]
    NotAnArray(&'static str),

    #[error("element {index} is {kind}, expected an object")]
    NotAnObject { index: usize, kind: &'static str },

    #[error("claim details were uploaded separately and inside the claims envelope, send one or the other")]
    DetailsTwice,
}

/// Import failures that reject the whole batch
#[derive(Debug, Error)]
pub enum ImportError {
    /// A file could not be read; nothing was written
    #[error("{file} file: {error}")]
    Format {
        file: FileRole,
        #[source]
        error: FormatError,
    },

    /// Storage failed; the session was rolled back
    #[error("storage error: {0}")]
    Storage(#[from] PortError),
}

impl ImportError {
    pub(crate) fn format(file: FileRole, error: FormatError) -> Self {
        ImportError::Format { file, error }
    }

    pub fn is_format(&self) -> bool {
        matches!(self, ImportError::Format { .. })
    }
}

/// Export failures
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("date range is empty: {from} is after {to}")]
    InvalidRange {
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
    },

    #[error("storage error: {0}")]
    Storage(#[from] PortError),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),
}
