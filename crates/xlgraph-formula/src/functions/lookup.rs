//! Lookup functions
//!
//! Tables are read cell by cell: a lookup evaluates the keys it scans and the one result
//! it returns, nothing else.

use super::{number_arg, propagate};
use crate::error::FormulaResult;
use crate::evaluator::{compare_values, values_equal};
use crate::runtime::{Operand, Runtime};
use crate::value::FormulaValue;
use std::cmp::Ordering;
use xlgraph_core::CellError;

/// A range or array argument indexed by (row, column)
///
/// When `transposed`, rows and columns swap so HLOOKUP can share VLOOKUP's scan.
struct Table<'a> {
    operand: &'a Operand,
    grid: Option<Vec<Vec<FormulaValue>>>,
    transposed: bool,
}

impl<'a> Table<'a> {
    fn new(rt: &mut dyn Runtime, operand: &'a Operand, transposed: bool) -> FormulaResult<Self> {
        let grid = match operand {
            Operand::Range(_) => None,
            Operand::Value(_) => Some(operand.grid(rt)?),
        };
        Ok(Self {
            operand,
            grid,
            transposed,
        })
    }

    fn shape(&self) -> (usize, usize) {
        let (rows, cols) = match (self.operand, &self.grid) {
            (Operand::Range(range), _) => (range.nrows(), range.ncols()),
            (_, Some(grid)) => (grid.len(), grid.first().map_or(0, Vec::len)),
            _ => (0, 0),
        };
        if self.transposed {
            (cols, rows)
        } else {
            (rows, cols)
        }
    }

    fn nrows(&self) -> usize {
        self.shape().0
    }

    fn ncols(&self) -> usize {
        self.shape().1
    }

    fn get(&self, rt: &mut dyn Runtime, row: usize, col: usize) -> FormulaResult<FormulaValue> {
        let (row, col) = if self.transposed { (col, row) } else { (row, col) };
        match (self.operand, &self.grid) {
            (Operand::Range(range), _) => range.value_at(rt, row, col),
            (_, Some(grid)) => Ok(grid
                .get(row)
                .and_then(|r| r.get(col))
                .cloned()
                .unwrap_or(FormulaValue::Error(CellError::Ref))),
            _ => Ok(FormulaValue::Error(CellError::Ref)),
        }
    }
}

fn key_text(value: &FormulaValue) -> String {
    value.as_string().to_lowercase()
}

fn table_lookup(
    rt: &mut dyn Runtime,
    args: &[Operand],
    transposed: bool,
) -> FormulaResult<FormulaValue> {
    let item = args[0].scalar(rt)?;
    if let Some(e) = item.get_error() {
        return Ok(FormulaValue::Error(e));
    }
    if item.is_blank() || item == FormulaValue::Boolean(false) {
        return Ok(FormulaValue::Error(CellError::Na));
    }

    let table = Table::new(rt, &args[1], transposed)?;
    let index = propagate!(number_arg(rt, &args[2])?).trunc();
    if !index.is_finite() || index < 1.0 {
        return Ok(FormulaValue::Error(CellError::Value));
    }
    let index = index as usize;
    if index > table.ncols() {
        return Ok(FormulaValue::Error(CellError::Ref));
    }
    let approximate = match args.get(3) {
        Some(arg) => propagate!(arg.scalar(rt)?.to_bool()),
        None => false,
    };

    let found = if approximate {
        let target = match item {
            FormulaValue::Number(n) => n,
            _ => return Ok(FormulaValue::Error(CellError::Value)),
        };
        // Keys ascend; the last one not above the item wins
        let mut found = None;
        for row in 0..table.nrows() {
            match table.get(rt, row, 0)? {
                FormulaValue::Number(key) if key <= target => found = Some(row),
                FormulaValue::Number(_) => break,
                _ => {}
            }
        }
        found
    } else {
        let wanted = key_text(&item);
        let mut found = None;
        for row in 0..table.nrows() {
            let key = table.get(rt, row, 0)?;
            if key.is_blank() {
                continue;
            }
            if key_text(&key) == wanted {
                found = Some(row);
                break;
            }
        }
        found
    };

    match found {
        Some(row) => table.get(rt, row, index - 1),
        None => Ok(FormulaValue::Error(CellError::Na)),
    }
}

/// VLOOKUP(item, table, column, [approximate])
pub fn fn_vlookup(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    table_lookup(rt, args, false)
}

/// HLOOKUP(item, table, row, [approximate])
pub fn fn_hlookup(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    table_lookup(rt, args, true)
}

/// MATCH(item, vector, [type])
///
/// Type 0 finds the first equal value; 1 the largest value not above the item in an
/// ascending vector; -1 the smallest value not below it in a descending one.
pub fn fn_match(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let item = args[0].scalar(rt)?;
    if let Some(e) = item.get_error() {
        return Ok(FormulaValue::Error(e));
    }
    let match_type = match args.get(2) {
        Some(arg) => propagate!(number_arg(rt, arg)?).trunc() as i64,
        None => 1,
    };

    let table = Table::new(rt, &args[1], false)?;
    let (rows, cols) = table.shape();
    if rows != 1 && cols != 1 {
        return Ok(FormulaValue::Error(CellError::Na));
    }
    let len = rows.max(cols);

    let mut found = None;
    for i in 0..len {
        let value = if rows == 1 {
            table.get(rt, 0, i)?
        } else {
            table.get(rt, i, 0)?
        };
        if value.is_blank() {
            continue;
        }
        match match_type {
            0 => {
                if values_equal(&value, &item) {
                    found = Some(i);
                    break;
                }
            }
            t => {
                let ordering = match compare_values(&value, &item) {
                    Ok(o) => o,
                    Err(_) => continue,
                };
                let keeps_going = if t > 0 {
                    ordering != Ordering::Greater
                } else {
                    ordering != Ordering::Less
                };
                if !keeps_going {
                    break;
                }
                found = Some(i);
                if ordering == Ordering::Equal {
                    break;
                }
            }
        }
    }

    Ok(found.map_or(FormulaValue::Error(CellError::Na), |i| {
        FormulaValue::Number((i + 1) as f64)
    }))
}

/// INDEX(array, row, [column])
///
/// With a single row or column the row argument indexes along the vector.
pub fn fn_index(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let table = Table::new(rt, &args[0], false)?;
    let row = propagate!(number_arg(rt, &args[1])?).trunc();
    let col = match args.get(2) {
        Some(arg) => Some(propagate!(number_arg(rt, arg)?).trunc()),
        None => None,
    };
    let invalid = |n: f64| !n.is_finite() || n < 0.0;
    if invalid(row) || col.map_or(false, invalid) {
        return Ok(FormulaValue::Error(CellError::Value));
    }

    let (rows, cols) = table.shape();
    let (row, col) = match col {
        Some(col) => (row as usize, col as usize),
        None if rows == 1 => (1, row as usize),
        None => (row as usize, 1),
    };
    if row == 0 || col == 0 {
        return Ok(FormulaValue::Error(CellError::Value));
    }
    if row > rows || col > cols {
        return Ok(FormulaValue::Error(CellError::Ref));
    }
    table.get(rt, row - 1, col - 1)
}
