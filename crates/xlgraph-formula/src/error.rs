//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur while compiling or evaluating formulas
///
/// Spreadsheet-domain failures such as a lookup miss are not errors: they are
/// [`CellError`](xlgraph_core::CellError) values returned as data.
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Unbalanced parentheses or braces
    #[error("Mismatched or misplaced parentheses")]
    MismatchedParentheses,

    /// A function with bespoke compilation called with an arity it does not support
    #[error("Function {function} does not support {arity} arguments")]
    UnsupportedArity { function: String, arity: usize },

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Operator the code generator cannot express
    #[error("Unsupported operator: {0:?}")]
    UnsupportedOperator(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Reference to a cell that is not part of the graph
    #[error("Unknown cell: {0}")]
    UnknownCell(String),

    /// A cell was read while it was already being evaluated
    #[error("Circular reference: evaluation of {cell} already in progress\nCall stack:\n{call_stack}")]
    CircularReference { cell: String, call_stack: String },

    /// A failure inside a cell's expression, tagged with the cell and the call stack
    #[error("Problem evaluating {cell}: {source}\nCall stack:\n{call_stack}")]
    Evaluation {
        cell: String,
        call_stack: String,
        #[source]
        source: Box<FormulaError>,
    },

    /// Evaluation nested deeper than the runtime runs on the native stack
    ///
    /// The runtime unwinds to its entry point and resumes from `cell`, whose logical
    /// call-stack depth is `depth`. It never reaches callers of the spreadsheet.
    #[error("Evaluation suspended at {cell} (depth {depth})")]
    Suspended { cell: String, depth: usize },

    /// Address or range error
    #[error(transparent)]
    Core(#[from] xlgraph_core::Error),
}

impl FormulaError {
    /// Check whether this error already carries a cell and call stack
    ///
    /// Tagged errors pass through enclosing cells unchanged.
    pub fn is_tagged(&self) -> bool {
        matches!(
            self,
            FormulaError::CircularReference { .. }
                | FormulaError::Evaluation { .. }
                | FormulaError::Suspended { .. }
        )
    }
}
