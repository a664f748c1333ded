//! Text functions
//!
//! Lengths and positions count characters, not bytes.

use super::{number_arg, optional_number, propagate, text_arg};
use crate::error::FormulaResult;
use crate::runtime::{Operand, Runtime};
use crate::value::FormulaValue;
use xlgraph_core::CellError;

fn char_count(
    rt: &mut dyn Runtime,
    arg: Option<&Operand>,
) -> FormulaResult<Result<usize, CellError>> {
    let n = match optional_number(rt, arg, 1.0)? {
        Ok(n) => n.trunc(),
        Err(e) => return Ok(Err(e)),
    };
    if !n.is_finite() || n < 0.0 {
        Ok(Err(CellError::Value))
    } else {
        Ok(Ok(n as usize))
    }
}

/// LEFT(text, [num_chars])
pub fn fn_left(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let text = propagate!(text_arg(rt, &args[0])?);
    let n = propagate!(char_count(rt, args.get(1))?);
    Ok(FormulaValue::String(text.chars().take(n).collect()))
}

/// RIGHT(text, [num_chars])
pub fn fn_right(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let text = propagate!(text_arg(rt, &args[0])?);
    let n = propagate!(char_count(rt, args.get(1))?);
    let skip = text.chars().count().saturating_sub(n);
    Ok(FormulaValue::String(text.chars().skip(skip).collect()))
}

/// MID(text, start, num_chars)
pub fn fn_mid(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let text = propagate!(text_arg(rt, &args[0])?);
    let start = propagate!(number_arg(rt, &args[1])?).trunc();
    let n = propagate!(char_count(rt, args.get(2))?);
    if !start.is_finite() || start < 1.0 {
        return Ok(FormulaValue::Error(CellError::Value));
    }
    Ok(FormulaValue::String(
        text.chars().skip(start as usize - 1).take(n).collect(),
    ))
}

/// LEN(text)
pub fn fn_len(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let text = propagate!(text_arg(rt, &args[0])?);
    Ok(FormulaValue::Number(text.chars().count() as f64))
}

/// SUBSTITUTE(text, old_text, new_text, [instance])
///
/// Without an instance every occurrence is replaced.
pub fn fn_substitute(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let text = propagate!(text_arg(rt, &args[0])?);
    let old = propagate!(text_arg(rt, &args[1])?);
    let new = propagate!(text_arg(rt, &args[2])?);
    let instance = match args.get(3) {
        Some(arg) => {
            let n = propagate!(number_arg(rt, arg)?).trunc();
            if !n.is_finite() || n < 1.0 {
                return Ok(FormulaValue::Error(CellError::Value));
            }
            Some(n as usize)
        }
        None => None,
    };

    if old.is_empty() {
        return Ok(FormulaValue::String(text));
    }
    let replaced = match instance {
        None => text.replace(&old, &new),
        Some(n) => match text.match_indices(&old).nth(n - 1) {
            Some((pos, _)) => {
                format!("{}{}{}", &text[..pos], new, &text[pos + old.len()..])
            }
            None => text,
        },
    };
    Ok(FormulaValue::String(replaced))
}

/// CONCATENATE(text1, ...)
pub fn fn_concatenate(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let mut result = String::new();
    for arg in args {
        result.push_str(&propagate!(text_arg(rt, arg)?));
    }
    Ok(FormulaValue::String(result))
}
