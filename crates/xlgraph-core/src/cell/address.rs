//! Cell addressing
//!
//! Accepted notations:
//! - `A1`, `$A$1` - regular column/row
//! - `A` - shorthand column, as used in `A:H`
//! - `R1C1` and `R[1]C[1]` - numeric row/column
//!
//! Columns and rows are 1-based throughout.

use crate::error::{Error, Result};
use crate::range::split_sheet;
use lazy_regex::regex_captures;
use std::fmt;

/// Components of a parsed address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParts {
    /// Sheet qualifier, if the address carried one
    pub sheet: Option<String>,
    /// 1-based column number
    pub column: u32,
    /// 1-based row, `None` for a shorthand column reference
    pub row: Option<u32>,
}

/// Parse an address into `(sheet?, column, row?)`
///
/// `$` markers are ignored and letters are case-insensitive.
pub fn split_address(address: &str) -> Result<AddressParts> {
    let (sheet, rest) = split_sheet(address);
    let cleaned: String = rest
        .chars()
        .filter(|c| *c != '$' && *c != ' ')
        .collect::<String>()
        .to_ascii_uppercase();

    let invalid = || Error::InvalidAddress(address.to_string());

    let (column, row) = if let Some((_, letters, digits)) =
        regex_captures!(r"^([A-Z]+)([0-9]+)$", &cleaned)
    {
        (col2num(letters)?, Some(parse_row(digits).ok_or_else(invalid)?))
    } else if let Some((_, letters)) = regex_captures!(r"^([A-Z]+)$", &cleaned) {
        (col2num(letters)?, None)
    } else if let Some((_, row, col)) = regex_captures!(r"^R([0-9]+)C([0-9]+)$", &cleaned) {
        let col = parse_row(col).ok_or_else(invalid)?;
        (col, Some(parse_row(row).ok_or_else(invalid)?))
    } else if let Some((_, row, col)) =
        regex_captures!(r"^R\[([0-9]+)\]C\[([0-9]+)\]$", &cleaned)
    {
        let col = parse_row(col).ok_or_else(invalid)?;
        (col, Some(parse_row(row).ok_or_else(invalid)?))
    } else {
        return Err(invalid());
    };

    Ok(AddressParts {
        sheet: sheet.map(str::to_string),
        column,
        row,
    })
}

fn parse_row(digits: &str) -> Option<u32> {
    digits.parse::<u32>().ok().filter(|n| *n >= 1)
}

/// Convert column letters to a 1-based column number (`A` = 1, `AA` = 27)
pub fn col2num(col: &str) -> Result<u32> {
    let letters: Vec<char> = col.chars().filter(|c| *c != '$').collect();
    if letters.is_empty() {
        return Err(Error::EmptyColumn);
    }

    let mut total: u32 = 0;
    for c in letters {
        let c = c.to_ascii_uppercase();
        if !c.is_ascii_uppercase() {
            return Err(Error::InvalidAddress(col.to_string()));
        }
        total = total
            .checked_mul(26)
            .and_then(|t| t.checked_add(c as u32 - 'A' as u32 + 1))
            .ok_or_else(|| Error::InvalidAddress(col.to_string()))?;
    }
    Ok(total)
}

/// Convert a 1-based column number back to letters
pub fn num2col(num: u32) -> Result<String> {
    if num < 1 {
        return Err(Error::InvalidColumnNumber(num));
    }
    Ok(column_letters(num))
}

fn column_letters(num: u32) -> String {
    let mut result = Vec::new();
    let mut q = num;
    while q > 0 {
        let r = (q - 1) % 26;
        result.push((b'A' + r as u8) as char);
        q = (q - 1) / 26;
    }
    result.iter().rev().collect()
}

/// A concrete, sheet-qualified cell location
///
/// Its `Display` form (`Sheet1!A1`, no `$`) is the canonical key used to identify
/// cells everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellRef {
    /// Owning sheet
    pub sheet: String,
    /// 1-based column
    pub column: u32,
    /// 1-based row
    pub row: u32,
}

impl CellRef {
    /// Create a new cell reference
    pub fn new<S: Into<String>>(sheet: S, column: u32, row: u32) -> Self {
        Self {
            sheet: sheet.into(),
            column,
            row,
        }
    }

    /// Parse an address, using `sheet` when it carries no qualifier of its own
    pub fn parse(address: &str, sheet: &str) -> Result<Self> {
        let parts = split_address(address)?;
        let row = parts
            .row
            .ok_or_else(|| Error::InvalidAddress(address.to_string()))?;
        let sheet = parts.sheet.unwrap_or_else(|| sheet.to_string());
        if sheet.is_empty() {
            return Err(Error::MissingSheet(address.to_string()));
        }
        Ok(Self::new(sheet, parts.column, row))
    }

    /// Parse an address that must carry its own sheet qualifier
    pub fn parse_qualified(address: &str) -> Result<Self> {
        Self::parse(address, "")
    }

    /// Column letters of this reference
    pub fn column_letters(&self) -> String {
        column_letters(self.column)
    }

    /// Format as A1 without the sheet
    pub fn to_a1_string(&self) -> String {
        format!("{}{}", self.column_letters(), self.row)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}{}", self.sheet, self.column_letters(), self.row)
    }
}
