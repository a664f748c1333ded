//! Error types for xlgraph-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in xlgraph-core
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid cell address format
    #[error("Invalid address format: {0}")]
    InvalidAddress(String),

    /// Invalid cell range format
    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    /// A column reference with no letters
    #[error("Column may not be empty")]
    EmptyColumn,

    /// Column numbers are 1-based
    #[error("Column number must be larger than 0: {0}")]
    InvalidColumnNumber(u32),

    /// Range whose start column lies right of its end column
    #[error("Incorrect range specified: [{range}], max_col: [{max_col}], max_row: [{max_row}]")]
    NonIncreasingColumns {
        range: String,
        max_col: u32,
        max_row: u32,
    },

    /// Range that still lacks a row or column after correction
    #[error("Row/Col start/end missing, range: [{0}]")]
    MissingBounds(String),

    /// Address without a sheet where one is required
    #[error("No sheet specified for address: {0}")]
    MissingSheet(String),

    /// Sheet not found by name
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// A workbook grid whose shape differs from the requested range
    #[error("Shape mismatch for {address}: expected {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    ShapeMismatch {
        address: String,
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }
}
