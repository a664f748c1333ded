//! # xlgraph-core
//!
//! Core data structures for the xlgraph formula compiler.
//!
//! This crate provides the pieces every other xlgraph crate builds on:
//! - [`CellValue`] and [`CellError`] - Cell values and the closed set of error sentinels
//! - [`split_address`], [`CellRef`] - Address parsing and canonical sheet-qualified addresses
//! - [`RangeRect`], [`correct_range_max`] - Range parsing, clamping and enumeration
//! - [`NumberFormat`] - Number formats and the decimal rounding they imply
//! - [`Workbook`], [`MemoryWorkbook`] - The workbook adapter and an in-memory implementation
//!
//! ## Example
//!
//! ```rust
//! use xlgraph_core::{correct_range_max, MemoryWorkbook, Workbook};
//!
//! let mut workbook = MemoryWorkbook::new();
//! let sheet = workbook.add_sheet("Sheet1");
//! sheet.set_cell_value("A1", 2.0).unwrap();
//! sheet.set_cell_formula("B1", "=A1*2").unwrap();
//!
//! assert_eq!(workbook.max_rows(), 1);
//! assert_eq!(correct_range_max("E:G", 7, 50).unwrap(), "E1:G50");
//! ```

pub mod cell;
pub mod error;
pub mod range;
pub mod style;
pub mod workbook;

// Re-exports for convenience
pub use cell::{col2num, num2col, split_address, AddressParts, CellError, CellRef, CellValue};
pub use error::{Error, Result};
pub use range::{
    canonicalize, correct_range_max, create_address, is_range, split_range, split_sheet,
    RangeParts, RangeRect, ResolvedRange,
};
pub use style::NumberFormat;
pub use workbook::{MemorySheet, MemoryWorkbook, RangeData, Workbook};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u32 = 16_384;
