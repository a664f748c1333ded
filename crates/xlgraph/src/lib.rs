//! # xlgraph
//!
//! Compile spreadsheet formulas into a dependency graph and evaluate it incrementally.
//!
//! A [`GraphBuilder`] reads seed ranges from a [`Workbook`], compiles every formula it
//! finds and follows references until the graph is closed. The resulting [`Spreadsheet`]
//! evaluates cells on demand, caches the results, and invalidates exactly the cells
//! downstream of a [`Spreadsheet::set_value`].
//!
//! ## Quick Start
//!
//! ```rust
//! use xlgraph::prelude::*;
//!
//! # fn main() -> xlgraph::Result<()> {
//! let mut workbook = MemoryWorkbook::new();
//! let sheet = workbook.add_sheet("Sheet1");
//! sheet.set_cell_value("A1", 2.0)?;
//! sheet.set_cell_value("A2", 3.0)?;
//! sheet.set_cell_formula("A3", "=A1+A2")?;
//!
//! let mut spreadsheet = GraphBuilder::new(&mut workbook).build("Sheet1", "A3")?;
//! assert_eq!(spreadsheet.evaluate("A3")?, FormulaValue::Number(5.0));
//!
//! spreadsheet.set_value("A1", 10.0)?;
//! assert_eq!(spreadsheet.evaluate("A3")?, FormulaValue::Number(13.0));
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Structure
//!
//! - [`xlgraph_core`]: addresses, ranges, cell values, number formats and the workbook adapter
//! - [`xlgraph_formula`]: lexer, parser, code generator and function library
//! - this crate: graph nodes, the builder and the evaluator

pub mod builder;
pub mod error;
pub mod graph;
pub mod node;
pub mod options;
pub mod prelude;
pub mod spreadsheet;

pub use builder::GraphBuilder;
pub use error::{Error, Result};
pub use graph::DependencyGraph;
pub use node::{Cell, CellRange, Node, NodeId, NodeState};
pub use options::BuildOptions;
pub use spreadsheet::Spreadsheet;

// Re-export the lower layers
pub use xlgraph_core::{
    CellError, CellRef, CellValue, MemorySheet, MemoryWorkbook, NumberFormat, RangeData,
    RangeRect, Workbook,
};
pub use xlgraph_formula::{compile_formula, CompileContext, Expr, FormulaError, FormulaValue};
