//! Expression evaluator
//!
//! Interprets [`Expr`] trees against a [`Runtime`]. Operators follow spreadsheet
//! semantics: an error operand is returned as the result (left before right), blanks
//! count as zero, and text compares as text.

use crate::error::FormulaResult;
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::functions::math::linest;
use crate::runtime::{Operand, Runtime};
use crate::value::FormulaValue;
use std::cmp::Ordering;
use xlgraph_core::CellError;

/// Evaluate an expression
pub fn evaluate(expr: &Expr, rt: &mut dyn Runtime) -> FormulaResult<FormulaValue> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Cell(address) => rt.eval_cell(address),
        Expr::Range(address) => {
            let range = rt.eval_range(address)?;
            Ok(FormulaValue::Array(range.grid(rt)?))
        }

        Expr::Unary { op, operand } => {
            let value = evaluate(operand, rt)?;
            Ok(unary_op(*op, &value))
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, rt)?;
            let right = evaluate(right, rt)?;
            Ok(binary_op(*op, &left, &right))
        }

        Expr::If {
            condition,
            then,
            otherwise,
        } => {
            let condition = evaluate(condition, rt)?;
            match condition.to_bool() {
                Err(e) => Ok(FormulaValue::Error(e)),
                Ok(true) => evaluate(then, rt),
                Ok(false) => match otherwise {
                    Some(otherwise) => evaluate(otherwise, rt),
                    None => Ok(FormulaValue::Boolean(false)),
                },
            }
        }
        Expr::And(args) => logical_fold(args, rt, true),
        Expr::Or(args) => logical_fold(args, rt, false),
        Expr::Not(arg) => {
            let value = evaluate(arg, rt)?;
            Ok(match value.to_bool() {
                Ok(b) => FormulaValue::Boolean(!b),
                Err(e) => FormulaValue::Error(e),
            })
        }

        Expr::Array(rows) => {
            let mut result_rows = Vec::with_capacity(rows.len());
            for row in rows {
                let mut result_row = Vec::with_capacity(row.len());
                for expr in row {
                    result_row.push(evaluate(expr, rt)?);
                }
                result_rows.push(result_row);
            }
            Ok(FormulaValue::Array(result_rows))
        }

        Expr::Call { function, args } => {
            let operands = evaluate_operands(args, rt)?;
            (function.implementation)(rt, &operands)
        }
        Expr::Linest {
            args,
            degree,
            coefficient,
        } => {
            let operands = evaluate_operands(args, rt)?;
            linest(rt, &operands, *degree, *coefficient)
        }
    }
}

/// Evaluate call arguments, leaving ranges as handles
pub fn evaluate_operands(args: &[Expr], rt: &mut dyn Runtime) -> FormulaResult<Vec<Operand>> {
    args.iter()
        .map(|arg| match arg {
            Expr::Range(address) => Ok(Operand::Range(rt.eval_range(address)?)),
            other => Ok(Operand::Value(evaluate(other, rt)?)),
        })
        .collect()
}

/// AND (`all == true`) or OR (`all == false`) over every argument value
///
/// Blanks are skipped; an error anywhere is the result; no countable value is `#VALUE!`.
fn logical_fold(args: &[Expr], rt: &mut dyn Runtime, all: bool) -> FormulaResult<FormulaValue> {
    let mut seen = false;
    let mut result = all;
    for operand in evaluate_operands(args, rt)? {
        for value in operand.flatten(rt)? {
            if value.is_blank() {
                continue;
            }
            match value.to_bool() {
                Ok(b) => {
                    seen = true;
                    if all {
                        result &= b;
                    } else {
                        result |= b;
                    }
                }
                Err(e) => return Ok(FormulaValue::Error(e)),
            }
        }
    }
    if seen {
        Ok(FormulaValue::Boolean(result))
    } else {
        Ok(FormulaValue::Error(CellError::Value))
    }
}

/// Apply a unary operator
pub fn unary_op(op: UnaryOp, value: &FormulaValue) -> FormulaValue {
    let n = match value.to_number() {
        Ok(n) => n,
        Err(e) => return FormulaValue::Error(e),
    };
    match op {
        UnaryOp::Negate => FormulaValue::Number(-n),
        UnaryOp::Percent => FormulaValue::Number(n / 100.0),
    }
}

/// Apply a binary operator
pub fn binary_op(op: BinaryOp, left: &FormulaValue, right: &FormulaValue) -> FormulaValue {
    // Propagate errors
    if let Some(e) = left.get_error() {
        return FormulaValue::Error(e);
    }
    if let Some(e) = right.get_error() {
        return FormulaValue::Error(e);
    }

    match op {
        BinaryOp::Add => arithmetic(left, right, |l, r| Ok(l + r)),
        BinaryOp::Subtract => arithmetic(left, right, |l, r| Ok(l - r)),
        BinaryOp::Multiply => arithmetic(left, right, |l, r| Ok(l * r)),
        BinaryOp::Divide => arithmetic(left, right, |l, r| {
            if r == 0.0 {
                Err(CellError::Div0)
            } else {
                Ok(l / r)
            }
        }),
        BinaryOp::Power => arithmetic(left, right, |l, r| {
            let result = l.powf(r);
            if result.is_nan() || result.is_infinite() {
                Err(CellError::Num)
            } else {
                Ok(result)
            }
        }),

        BinaryOp::Concat => FormulaValue::String(left.as_string() + &right.as_string()),

        BinaryOp::Equal => comparison(left, right, |_| values_equal(left, right)),
        BinaryOp::NotEqual => comparison(left, right, |_| !values_equal(left, right)),
        BinaryOp::LessThan => comparison(left, right, |o| o == Ordering::Less),
        BinaryOp::LessEqual => comparison(left, right, |o| o != Ordering::Greater),
        BinaryOp::GreaterThan => comparison(left, right, |o| o == Ordering::Greater),
        BinaryOp::GreaterEqual => comparison(left, right, |o| o != Ordering::Less),
    }
}

fn arithmetic(
    left: &FormulaValue,
    right: &FormulaValue,
    f: impl Fn(f64, f64) -> Result<f64, CellError>,
) -> FormulaValue {
    let result = left
        .to_number()
        .and_then(|l| right.to_number().and_then(|r| f(l, r)));
    match result {
        Ok(n) => FormulaValue::Number(n),
        Err(e) => FormulaValue::Error(e),
    }
}

fn comparison(
    left: &FormulaValue,
    right: &FormulaValue,
    test: impl Fn(Ordering) -> bool,
) -> FormulaValue {
    match compare_values(left, right) {
        Ok(ordering) => FormulaValue::Boolean(test(ordering)),
        Err(e) => FormulaValue::Error(e),
    }
}

/// Order two values
///
/// Blanks and empty text count as zero. When either side is text both are compared as
/// case-insensitive text; otherwise numerically.
pub fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Result<Ordering, CellError> {
    let zero = FormulaValue::Number(0.0);
    let left = if left.is_blank() { &zero } else { left };
    let right = if right.is_blank() { &zero } else { right };

    if matches!(left, FormulaValue::String(_)) || matches!(right, FormulaValue::String(_)) {
        return Ok(left
            .as_string()
            .to_lowercase()
            .cmp(&right.as_string().to_lowercase()));
    }
    let l = left.to_number()?;
    let r = right.to_number()?;
    l.partial_cmp(&r).ok_or(CellError::Num)
}

/// Equality as used by `=` and `<>`
///
/// Text compares case-insensitively; a blank equals zero, empty text and FALSE.
pub fn values_equal(left: &FormulaValue, right: &FormulaValue) -> bool {
    match (left, right) {
        (FormulaValue::Empty, other) | (other, FormulaValue::Empty) => match other {
            FormulaValue::Empty => true,
            FormulaValue::Number(n) => *n == 0.0,
            FormulaValue::String(s) => s.is_empty(),
            FormulaValue::Boolean(b) => !*b,
            _ => false,
        },
        (FormulaValue::String(l), FormulaValue::String(r)) => l.to_lowercase() == r.to_lowercase(),
        (FormulaValue::Number(l), FormulaValue::Number(r)) => l == r,
        (FormulaValue::Boolean(l), FormulaValue::Boolean(r)) => l == r,
        (FormulaValue::Error(l), FormulaValue::Error(r)) => l == r,
        _ => false,
    }
}
