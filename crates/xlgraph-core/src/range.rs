//! Range parsing, correction and enumeration
//!
//! Ranges arrive as text (`Sheet1!$A$1:$B$10`, `E:G`) and leave as [`RangeRect`]s whose
//! constituent addresses are canonical (`Sheet1!A1`). Shorthand ranges must be passed
//! through [`correct_range_max`] before they can be resolved.

use crate::cell::{num2col, split_address, CellRef};
use crate::error::{Error, Result};
use std::fmt;

/// Split an optional `Sheet!` qualifier from an address
///
/// Quotes around the sheet name are removed.
pub fn split_sheet(address: &str) -> (Option<&str>, &str) {
    match address.rfind('!') {
        Some(pos) if pos > 0 => {
            let sheet = address[..pos].trim_matches('\'');
            (Some(sheet), &address[pos + 1..])
        }
        _ => (None, address),
    }
}

/// Check whether an address names a range rather than a single cell
pub fn is_range(address: &str) -> bool {
    address.find(':').map_or(false, |pos| pos > 0)
}

/// The pieces of a `sheet!start:end` range string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeParts<'a> {
    pub sheet: Option<&'a str>,
    pub start: &'a str,
    pub end: &'a str,
}

/// Split a range into sheet, start and end. Returns `None` for a single address.
pub fn split_range(rng: &str) -> Option<RangeParts<'_>> {
    let (sheet, rest) = split_sheet(rng);
    let (start, end) = rest.split_once(':')?;
    Some(RangeParts { sheet, start, end })
}

/// Clamp a range to a sheet's real extents
///
/// `$` markers are stripped. A missing start row becomes 1 and a missing end row becomes
/// `max_row`, so `E:G` against a 50-row sheet yields `E1:G50`. Bounds beyond the sheet are
/// pulled back to it; bounds within it are kept. Single addresses pass through unchanged
/// apart from the `$` removal.
pub fn correct_range_max(rng: &str, max_col: u32, max_row: u32) -> Result<String> {
    let rng = rng.replace('$', "");
    let parts = match split_range(&rng) {
        Some(parts) => parts,
        None => return Ok(rng),
    };

    let max_col = max_col.max(1);
    let max_row = max_row.max(1);

    let start = split_address(parts.start)?;
    let end = split_address(parts.end)?;
    if start.column > end.column {
        return Err(Error::NonIncreasingColumns {
            range: rng.clone(),
            max_col,
            max_row,
        });
    }

    let start_col = start.column.min(max_col);
    let end_col = end.column.min(max_col);
    let start_row = start.row.map_or(1, |r| r.min(max_row));
    let end_row = end.row.map_or(max_row, |r| r.min(max_row));

    let corrected = format!(
        "{}{}:{}{}",
        num2col(start_col)?,
        start_row,
        num2col(end_col)?,
        end_row
    );
    Ok(match parts.sheet {
        Some(sheet) => format!("{}!{}", sheet, corrected),
        None => corrected,
    })
}

/// A concrete rectangle of cells on one sheet
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeRect {
    pub sheet: String,
    pub start_col: u32,
    pub start_row: u32,
    pub end_col: u32,
    pub end_row: u32,
}

impl RangeRect {
    /// Create a rectangle; rows are normalized so that `start_row <= end_row`
    pub fn new<S: Into<String>>(
        sheet: S,
        start_col: u32,
        start_row: u32,
        end_col: u32,
        end_row: u32,
    ) -> Self {
        Self {
            sheet: sheet.into(),
            start_col,
            start_row: start_row.min(end_row),
            end_col,
            end_row: start_row.max(end_row),
        }
    }

    /// Parse a concrete range; `sheet` applies when the text carries no qualifier
    ///
    /// A single address is accepted as a one-cell rectangle.
    pub fn parse(rng: &str, sheet: &str) -> Result<Self> {
        let parts = match split_range(rng) {
            Some(parts) => parts,
            None => {
                let cell = CellRef::parse(rng, sheet)?;
                return Ok(Self::new(cell.sheet, cell.column, cell.row, cell.column, cell.row));
            }
        };

        let start = split_address(parts.start)?;
        let end = split_address(parts.end)?;
        let (start_row, end_row) = match (start.row, end.row) {
            (Some(s), Some(e)) => (s, e),
            _ => return Err(Error::MissingBounds(rng.to_string())),
        };
        if start.column > end.column {
            return Err(Error::InvalidRange(rng.to_string()));
        }

        let sheet = parts.sheet.unwrap_or(sheet);
        if sheet.is_empty() {
            return Err(Error::MissingSheet(rng.to_string()));
        }
        Ok(Self::new(sheet, start.column, start_row, end.column, end_row))
    }

    /// Number of rows
    pub fn nrows(&self) -> usize {
        (self.end_row - self.start_row + 1) as usize
    }

    /// Number of columns
    pub fn ncols(&self) -> usize {
        (self.end_col - self.start_col + 1) as usize
    }

    /// Top-left cell
    pub fn start(&self) -> CellRef {
        CellRef::new(self.sheet.clone(), self.start_col, self.start_row)
    }

    /// Cell at a 0-based offset from the top-left corner, if inside the rectangle
    pub fn cell(&self, row_offset: usize, col_offset: usize) -> Option<CellRef> {
        if row_offset >= self.nrows() || col_offset >= self.ncols() {
            return None;
        }
        Some(CellRef::new(
            self.sheet.clone(),
            self.start_col + col_offset as u32,
            self.start_row + row_offset as u32,
        ))
    }

    /// Check if a cell lies within this rectangle
    pub fn contains(&self, cell: &CellRef) -> bool {
        cell.sheet == self.sheet
            && (self.start_col..=self.end_col).contains(&cell.column)
            && (self.start_row..=self.end_row).contains(&cell.row)
    }

    /// The `index`-th column (1-based) as its own rectangle
    pub fn column_slice(&self, index: usize) -> Option<RangeRect> {
        if index < 1 || index > self.ncols() {
            return None;
        }
        let col = self.start_col + index as u32 - 1;
        Some(Self::new(
            self.sheet.clone(),
            col,
            self.start_row,
            col,
            self.end_row,
        ))
    }

    /// The `index`-th row (1-based) as its own rectangle
    pub fn row_slice(&self, index: usize) -> Option<RangeRect> {
        if index < 1 || index > self.nrows() {
            return None;
        }
        let row = self.start_row + index as u32 - 1;
        Some(Self::new(
            self.sheet.clone(),
            self.start_col,
            row,
            self.end_col,
            row,
        ))
    }

    /// Canonical addresses, one inner `Vec` per row
    pub fn addresses(&self) -> Vec<Vec<String>> {
        (self.start_row..=self.end_row)
            .map(|row| {
                (self.start_col..=self.end_col)
                    .map(|col| CellRef::new(self.sheet.clone(), col, row).to_string())
                    .collect()
            })
            .collect()
    }

    /// Canonical addresses in row-major order
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        (self.start_row..=self.end_row).flat_map(move |row| {
            (self.start_col..=self.end_col)
                .map(move |col| CellRef::new(self.sheet.clone(), col, row))
        })
    }

    /// Format as `A1:B2` without the sheet
    pub fn to_a1_string(&self) -> String {
        format!(
            "{}:{}",
            self.start().to_a1_string(),
            CellRef::new(self.sheet.clone(), self.end_col, self.end_row).to_a1_string()
        )
    }
}

impl fmt::Display for RangeRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.sheet, self.to_a1_string())
    }
}

/// A range expanded into its constituent addresses
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRange {
    /// Constituent canonical addresses, one inner `Vec` per row
    pub addresses: Vec<Vec<String>>,
    pub nrows: usize,
    pub ncols: usize,
    /// The rectangles the addresses were drawn from
    pub rects: Vec<RangeRect>,
}

impl ResolvedRange {
    /// Resolve a single rectangle
    pub fn from_rect(rect: RangeRect) -> Self {
        Self {
            addresses: rect.addresses(),
            nrows: rect.nrows(),
            ncols: rect.ncols(),
            rects: vec![rect],
        }
    }

    /// Two single-column rectangles paired row by row (`[[key_1, result_1], ...]`)
    pub fn paired_columns(key: RangeRect, result: RangeRect) -> Self {
        let addresses: Vec<Vec<String>> = key
            .cells()
            .zip(result.cells())
            .map(|(k, r)| vec![k.to_string(), r.to_string()])
            .collect();
        Self {
            nrows: addresses.len(),
            ncols: 2,
            addresses,
            rects: vec![key, result],
        }
    }

    /// Two single-row rectangles stacked (`[[key row...], [result row...]]`)
    pub fn paired_rows(key: RangeRect, result: RangeRect) -> Self {
        let ncols = key.ncols();
        let addresses = vec![
            key.cells().map(|c| c.to_string()).collect(),
            result.cells().map(|c| c.to_string()).collect(),
        ];
        Self {
            addresses,
            nrows: 2,
            ncols,
            rects: vec![key, result],
        }
    }

    /// Canonical address of the whole range, see [`create_address`]
    pub fn address(&self) -> String {
        create_address(&self.rects)
    }

    /// Constituent addresses in row-major order
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.addresses.iter().flatten()
    }
}

/// Canonical address of a list of rectangles, joined with `;`
pub fn create_address(rects: &[RangeRect]) -> String {
    rects
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

/// Canonicalize a cell, range or `;`-joined range list
///
/// Strips `$`, uppercases, and qualifies every part with `sheet` unless it names its own.
pub fn canonicalize(address: &str, sheet: &str) -> Result<String> {
    let parts = address
        .split(';')
        .map(|part| {
            if is_range(part) {
                Ok(RangeRect::parse(part, sheet)?.to_string())
            } else {
                Ok(CellRef::parse(part, sheet)?.to_string())
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(";"))
}
