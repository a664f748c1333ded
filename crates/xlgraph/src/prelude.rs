//! Prelude module - common imports for xlgraph users
//!
//! ```rust
//! use xlgraph::prelude::*;
//! ```

pub use crate::{
    // Construction
    BuildOptions,
    // Values
    CellError,
    CellValue,
    // Errors
    Error,
    FormulaError,
    FormulaValue,
    GraphBuilder,
    // Workbooks
    MemoryWorkbook,
    NumberFormat,
    Result,
    // Evaluation
    Spreadsheet,
    Workbook,
};
