//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellValue`] - The value stored in a cell
//! - [`CellError`] - The error sentinels that travel through formulas as data
//! - [`CellRef`] - A canonical, sheet-qualified cell location (e.g., "Sheet1!A1")
//! - [`split_address`] - Parsing of the accepted address notations

mod address;
mod value;

pub use address::{col2num, num2col, split_address, AddressParts, CellRef};
pub use value::{CellError, CellValue};
