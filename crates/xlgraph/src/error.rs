//! Error types for the spreadsheet facade

use thiserror::Error;
use xlgraph_formula::FormulaError;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or evaluating a spreadsheet
#[derive(Debug, Error)]
pub enum Error {
    /// Address, range or workbook error
    #[error(transparent)]
    Core(#[from] xlgraph_core::Error),

    /// Compilation or evaluation error
    #[error(transparent)]
    Formula(#[from] FormulaError),

    /// Graph construction failed while processing a cell
    #[error("Failed to build graph at {address} ({todo} cells pending): {source}")]
    Build {
        address: String,
        /// Formula cells still waiting to be compiled
        todo: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// The formula error beneath any build context
    pub fn formula_error(&self) -> Option<&FormulaError> {
        match self {
            Error::Formula(e) => Some(e),
            Error::Build { source, .. } => source.formula_error(),
            Error::Core(_) => None,
        }
    }

    /// Check whether this is a circular reference
    pub fn is_circular_reference(&self) -> bool {
        matches!(
            self.formula_error(),
            Some(FormulaError::CircularReference { .. })
        )
    }
}
