//! The evaluation runtime seen by compiled expressions and library functions

use crate::error::FormulaResult;
use crate::value::FormulaValue;
use xlgraph_core::{CellError, RangeRect};

/// Access to cell values during evaluation
///
/// Implemented by the spreadsheet that owns the dependency graph.
pub trait Runtime {
    /// Evaluate a cell referenced directly from a formula
    ///
    /// When the formula being evaluated is itself a plain reference, a blank result is
    /// reported as zero.
    fn eval_cell(&mut self, address: &str) -> FormulaResult<FormulaValue>;

    /// Evaluate a cell with no blank coercion
    fn evaluate(&mut self, address: &str) -> FormulaResult<FormulaValue>;

    /// A handle to a range; none of its cells are evaluated
    fn eval_range(&mut self, address: &str) -> FormulaResult<RangeHandle> {
        RangeHandle::parse(address)
    }
}

/// An unevaluated rectangular range
///
/// Library functions pull only the cells they need through [`RangeHandle::value_at`].
#[derive(Debug, Clone, PartialEq)]
pub struct RangeHandle {
    address: String,
    rect: RangeRect,
}

impl RangeHandle {
    /// Parse a sheet-qualified range address
    pub fn parse(address: &str) -> FormulaResult<Self> {
        Ok(Self::from_rect(RangeRect::parse(address, "")?))
    }

    /// Wrap a rectangle
    pub fn from_rect(rect: RangeRect) -> Self {
        Self {
            address: rect.to_string(),
            rect,
        }
    }

    /// Canonical address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The underlying rectangle
    pub fn rect(&self) -> &RangeRect {
        &self.rect
    }

    /// Number of rows
    pub fn nrows(&self) -> usize {
        self.rect.nrows()
    }

    /// Number of columns
    pub fn ncols(&self) -> usize {
        self.rect.ncols()
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.nrows() * self.ncols()
    }

    /// Check if the range has no cells; never true for a parsed range
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the range is a single row or column
    pub fn is_vector(&self) -> bool {
        self.nrows() == 1 || self.ncols() == 1
    }

    /// Address of the cell at a 0-based offset
    pub fn cell_address(&self, row: usize, col: usize) -> Option<String> {
        self.rect.cell(row, col).map(|c| c.to_string())
    }

    /// Evaluate the cell at a 0-based offset; outside the range is `#REF!`
    pub fn value_at(
        &self,
        rt: &mut dyn Runtime,
        row: usize,
        col: usize,
    ) -> FormulaResult<FormulaValue> {
        match self.cell_address(row, col) {
            Some(address) => rt.evaluate(&address),
            None => Ok(FormulaValue::Error(CellError::Ref)),
        }
    }

    /// Evaluate the cell at a 0-based offset along a vector range
    pub fn value_at_index(
        &self,
        rt: &mut dyn Runtime,
        index: usize,
    ) -> FormulaResult<FormulaValue> {
        if self.nrows() == 1 {
            self.value_at(rt, 0, index)
        } else {
            self.value_at(rt, index, 0)
        }
    }

    /// Evaluate every cell, row by row
    pub fn values(&self, rt: &mut dyn Runtime) -> FormulaResult<Vec<FormulaValue>> {
        self.rect
            .cells()
            .map(|cell| rt.evaluate(&cell.to_string()))
            .collect()
    }

    /// Evaluate every cell into a grid
    pub fn grid(&self, rt: &mut dyn Runtime) -> FormulaResult<Vec<Vec<FormulaValue>>> {
        let ncols = self.ncols();
        let values = self.values(rt)?;
        Ok(values.chunks(ncols.max(1)).map(<[_]>::to_vec).collect())
    }
}

/// A function argument: a value, or a range left for the function to read
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(FormulaValue),
    Range(RangeHandle),
}

impl Operand {
    /// The range handle, if this argument is a range
    pub fn as_range(&self) -> Option<&RangeHandle> {
        match self {
            Operand::Range(range) => Some(range),
            Operand::Value(_) => None,
        }
    }

    /// The argument as a single value
    ///
    /// A one-cell range yields its cell; larger ranges are `#VALUE!`. Arrays yield their
    /// top-left element.
    pub fn scalar(&self, rt: &mut dyn Runtime) -> FormulaResult<FormulaValue> {
        match self {
            Operand::Value(FormulaValue::Array(rows)) => Ok(rows
                .first()
                .and_then(|r| r.first())
                .cloned()
                .unwrap_or(FormulaValue::Error(CellError::Value))),
            Operand::Value(value) => Ok(value.clone()),
            Operand::Range(range) if range.len() == 1 => range.value_at(rt, 0, 0),
            Operand::Range(_) => Ok(FormulaValue::Error(CellError::Value)),
        }
    }

    /// Every value of the argument, row by row
    pub fn flatten(&self, rt: &mut dyn Runtime) -> FormulaResult<Vec<FormulaValue>> {
        match self {
            Operand::Value(value) => Ok(value.clone().into_flat()),
            Operand::Range(range) => range.values(rt),
        }
    }

    /// The argument as a grid; scalars are 1x1
    pub fn grid(&self, rt: &mut dyn Runtime) -> FormulaResult<Vec<Vec<FormulaValue>>> {
        match self {
            Operand::Value(FormulaValue::Array(rows)) => Ok(rows.clone()),
            Operand::Value(value) => Ok(vec![vec![value.clone()]]),
            Operand::Range(range) => range.grid(rt),
        }
    }

    /// Check if the argument is a literal or a reference to many cells
    ///
    /// Aggregates skip text and booleans found in ranges and arrays but count them when
    /// passed directly.
    pub fn is_direct(&self) -> bool {
        matches!(self, Operand::Value(v) if !matches!(v, FormulaValue::Array(_)))
    }
}

impl From<FormulaValue> for Operand {
    fn from(value: FormulaValue) -> Self {
        Operand::Value(value)
    }
}
