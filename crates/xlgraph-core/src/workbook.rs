//! The workbook adapter
//!
//! The graph builder reads formulas, cached values and number formats through [`Workbook`].
//! [`MemoryWorkbook`] is an in-memory implementation used for tests and for callers that
//! assemble a model by hand.

use crate::cell::{split_address, CellValue};
use crate::error::{Error, Result};
use crate::range::{split_sheet, RangeRect};
use crate::style::NumberFormat;
use ahash::AHashMap;

/// Grids read from a workbook range, one inner `Vec` per row
///
/// A single cell is a 1x1 grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeData {
    /// Raw formula text; always starts with `=` when present
    pub formulas: Vec<Vec<Option<String>>>,
    /// Cached values
    pub values: Vec<Vec<CellValue>>,
    /// Number formats
    pub number_formats: Vec<Vec<Option<NumberFormat>>>,
}

impl RangeData {
    /// Number of rows in the value grid
    pub fn nrows(&self) -> usize {
        self.values.len()
    }

    /// Number of columns in the value grid
    pub fn ncols(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }

    /// Check that all three grids have the given shape
    pub fn check_shape(&self, address: &str, rows: usize, cols: usize) -> Result<()> {
        fn has_shape<T>(grid: &[Vec<T>], rows: usize, cols: usize) -> bool {
            grid.len() == rows && grid.iter().all(|row| row.len() == cols)
        }
        let ok = has_shape(&self.values, rows, cols)
            && has_shape(&self.formulas, rows, cols)
            && has_shape(&self.number_formats, rows, cols);
        if ok {
            Ok(())
        } else {
            Err(Error::ShapeMismatch {
                address: address.to_string(),
                expected_rows: rows,
                expected_cols: cols,
                rows: self.nrows(),
                cols: self.ncols(),
            })
        }
    }

    /// Formula, value and number format at a 0-based position
    pub fn get(
        &self,
        row: usize,
        col: usize,
    ) -> (Option<&str>, Option<&CellValue>, Option<&NumberFormat>) {
        let formula = self
            .formulas
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|f| f.as_deref());
        let value = self.values.get(row).and_then(|r| r.get(col));
        let format = self
            .number_formats
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(Option::as_ref);
        (formula, value, format)
    }
}

/// Read access to a workbook
///
/// Addresses without a sheet qualifier refer to the active sheet. `max_rows` and
/// `max_columns` report the used extent of the active sheet.
pub trait Workbook {
    /// Read the formulas, values and number formats of a cell or concrete range
    fn get_range(&self, address: &str) -> Result<RangeData>;

    /// Make a sheet active
    fn set_sheet(&mut self, name: &str) -> Result<()>;

    /// Name of the active sheet
    fn active_sheet(&self) -> &str;

    /// Used row extent of the active sheet
    fn max_rows(&self) -> u32;

    /// Used column extent of the active sheet
    fn max_columns(&self) -> u32;

    /// Formula text of a single cell
    fn formula_at(&self, address: &str) -> Result<Option<String>> {
        let data = self.get_range(address)?;
        Ok(data.get(0, 0).0.map(str::to_string))
    }

    /// Write a value back to a cell
    fn set_value(&mut self, _address: &str, _value: &CellValue) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct MemoryCell {
    formula: Option<String>,
    value: CellValue,
    number_format: Option<NumberFormat>,
}

/// A named sheet of a [`MemoryWorkbook`]
#[derive(Debug, Clone, Default)]
pub struct MemorySheet {
    name: String,
    cells: AHashMap<(u32, u32), MemoryCell>,
}

impl MemorySheet {
    /// Create an empty sheet
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            cells: AHashMap::new(),
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    fn cell_mut(&mut self, address: &str) -> Result<&mut MemoryCell> {
        let parts = split_address(address)?;
        let row = parts
            .row
            .ok_or_else(|| Error::InvalidAddress(address.to_string()))?;
        Ok(self.cells.entry((parts.column, row)).or_default())
    }

    /// Set a cell's value, clearing any formula
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let cell = self.cell_mut(address)?;
        cell.formula = None;
        cell.value = value.into();
        Ok(())
    }

    /// Set a cell's formula; the cached value becomes empty
    pub fn set_cell_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        self.set_cell_formula_with_value(address, formula, CellValue::Empty)
    }

    /// Set a cell's formula together with its cached value
    pub fn set_cell_formula_with_value<V: Into<CellValue>>(
        &mut self,
        address: &str,
        formula: &str,
        value: V,
    ) -> Result<()> {
        let cell = self.cell_mut(address)?;
        cell.formula = Some(formula.to_string());
        cell.value = value.into();
        Ok(())
    }

    /// Set a cell's number format
    pub fn set_number_format<F: Into<NumberFormat>>(
        &mut self,
        address: &str,
        format: F,
    ) -> Result<()> {
        self.cell_mut(address)?.number_format = Some(format.into());
        Ok(())
    }

    /// Cached value at a 1-based position
    pub fn value_at(&self, column: u32, row: u32) -> CellValue {
        self.cells
            .get(&(column, row))
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    /// Highest used row, 0 for an empty sheet
    pub fn max_row(&self) -> u32 {
        self.cells.keys().map(|(_, row)| *row).max().unwrap_or(0)
    }

    /// Highest used column, 0 for an empty sheet
    pub fn max_column(&self) -> u32 {
        self.cells.keys().map(|(col, _)| *col).max().unwrap_or(0)
    }

    fn read(&self, rect: &RangeRect) -> RangeData {
        let mut data = RangeData::default();
        for row in rect.start_row..=rect.end_row {
            let mut formulas = Vec::with_capacity(rect.ncols());
            let mut values = Vec::with_capacity(rect.ncols());
            let mut formats = Vec::with_capacity(rect.ncols());
            for col in rect.start_col..=rect.end_col {
                match self.cells.get(&(col, row)) {
                    Some(cell) => {
                        // Text that does not start with '=' is not a formula
                        formulas.push(cell.formula.clone().filter(|f| f.starts_with('=')));
                        values.push(cell.value.clone());
                        formats.push(cell.number_format.clone());
                    }
                    None => {
                        formulas.push(None);
                        values.push(CellValue::Empty);
                        formats.push(None);
                    }
                }
            }
            data.formulas.push(formulas);
            data.values.push(values);
            data.number_formats.push(formats);
        }
        data
    }
}

/// An in-memory workbook
///
/// The first sheet added is active until [`Workbook::set_sheet`] is called.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<MemorySheet>,
    active: usize,
}

impl MemoryWorkbook {
    /// Create a workbook with no sheets
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet, or return the existing one with that name
    pub fn add_sheet(&mut self, name: &str) -> &mut MemorySheet {
        let index = match self.sheet_index(name) {
            Some(index) => index,
            None => {
                self.sheets.push(MemorySheet::new(name));
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[index]
    }

    /// Get a sheet by name
    pub fn sheet(&self, name: &str) -> Option<&MemorySheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Get a mutable sheet by name
    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut MemorySheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Number of sheets
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.name == name)
    }

    fn resolve(&self, address: &str) -> Result<(&MemorySheet, RangeRect)> {
        let active = self.active_sheet();
        let sheet_name = split_sheet(address).0.unwrap_or(active);
        let sheet = self
            .sheet(sheet_name)
            .ok_or_else(|| Error::SheetNotFound(sheet_name.to_string()))?;
        Ok((sheet, RangeRect::parse(address, sheet_name)?))
    }
}

impl Workbook for MemoryWorkbook {
    fn get_range(&self, address: &str) -> Result<RangeData> {
        let (sheet, rect) = self.resolve(address)?;
        Ok(sheet.read(&rect))
    }

    fn set_sheet(&mut self, name: &str) -> Result<()> {
        self.active = self
            .sheet_index(name)
            .ok_or_else(|| Error::SheetNotFound(name.to_string()))?;
        Ok(())
    }

    fn active_sheet(&self) -> &str {
        self.sheets.get(self.active).map_or("", |s| s.name())
    }

    fn max_rows(&self) -> u32 {
        self.sheets.get(self.active).map_or(0, MemorySheet::max_row)
    }

    fn max_columns(&self) -> u32 {
        self.sheets.get(self.active).map_or(0, MemorySheet::max_column)
    }

    fn set_value(&mut self, address: &str, value: &CellValue) -> Result<()> {
        let active = self.active_sheet().to_string();
        let (sheet_name, cell) = match split_sheet(address) {
            (Some(sheet), cell) => (sheet.to_string(), cell),
            (None, cell) => (active, cell),
        };
        let sheet = self
            .sheet_mut(&sheet_name)
            .ok_or_else(|| Error::SheetNotFound(sheet_name.clone()))?;
        sheet.set_cell_value(cell, value.clone())
    }
}
