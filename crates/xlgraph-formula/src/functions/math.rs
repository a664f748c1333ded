//! Math functions

use super::criteria::Criterion;
use super::{collect_numbers, number_arg, optional_number, propagate};
use crate::error::FormulaResult;
use crate::runtime::{Operand, RangeHandle, Runtime};
use crate::value::FormulaValue;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use std::f64::consts::PI;
use xlgraph_core::{CellError, RangeRect};

/// SUM function
pub fn fn_sum(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let numbers = propagate!(collect_numbers(rt, args)?);
    Ok(FormulaValue::Number(numbers.iter().sum()))
}

/// SUMIF(range, criteria, [sum_range])
///
/// `sum_range` is aligned on its top-left cell and takes the shape of `range`; only the
/// cells that match are read from it.
pub fn fn_sumif(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let criterion = Criterion::new(&args[1].scalar(rt)?);
    let grid = args[0].grid(rt)?;
    let nrows = grid.len();
    let ncols = grid.first().map_or(0, Vec::len);

    let sum_range = match args.get(2) {
        Some(Operand::Range(range)) => {
            let start = range.rect();
            let rect = RangeRect::new(
                start.sheet.clone(),
                start.start_col,
                start.start_row,
                start.start_col + ncols.saturating_sub(1) as u32,
                start.start_row + nrows.saturating_sub(1) as u32,
            );
            Some(SumSource::Range(RangeHandle::from_rect(rect)))
        }
        Some(other) => Some(SumSource::Grid(other.grid(rt)?)),
        None => None,
    };

    let mut sum = 0.0;
    for (r, row) in grid.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if !criterion.matches(value) {
                continue;
            }
            let summed = match &sum_range {
                None => value.clone(),
                Some(SumSource::Range(range)) => range.value_at(rt, r, c)?,
                Some(SumSource::Grid(g)) => g
                    .get(r)
                    .and_then(|row| row.get(c))
                    .cloned()
                    .unwrap_or_default(),
            };
            match summed {
                FormulaValue::Number(n) => sum += n,
                FormulaValue::Error(e) => return Ok(FormulaValue::Error(e)),
                _ => {}
            }
        }
    }
    Ok(FormulaValue::Number(sum))
}

enum SumSource {
    Range(RangeHandle),
    Grid(Vec<Vec<FormulaValue>>),
}

/// SUMPRODUCT(array1, [array2])
pub fn fn_sumproduct(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let first = args[0].grid(rt)?;
    let second = match args.get(1) {
        Some(arg) => Some(arg.grid(rt)?),
        None => None,
    };
    if let Some(second) = &second {
        let same_shape = first.len() == second.len()
            && first.iter().zip(second).all(|(a, b)| a.len() == b.len());
        if !same_shape {
            return Ok(FormulaValue::Error(CellError::Value));
        }
    }

    let factor = |value: &FormulaValue| -> Result<f64, CellError> {
        match value {
            FormulaValue::Number(n) => Ok(*n),
            FormulaValue::Error(e) => Err(*e),
            _ => Ok(0.0),
        }
    };

    let mut sum = 0.0;
    for (r, row) in first.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            let mut product = propagate!(factor(value));
            if let Some(second) = &second {
                product *= propagate!(factor(&second[r][c]));
            }
            sum += product;
        }
    }
    Ok(FormulaValue::Number(sum))
}

/// Round to a number of digits; negative digits round left of the decimal point
///
/// The arithmetic is decimal, so `1.005` rounds to `1.01` as written.
pub fn round_with(n: f64, digits: i64, strategy: RoundingStrategy) -> f64 {
    if !n.is_finite() {
        return n;
    }
    let decimal = match n
        .to_string()
        .parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_f64(n))
    {
        Some(d) => d,
        None => return n,
    };

    let rounded = if digits >= 0 {
        Some(decimal.round_dp_with_strategy(digits.min(28) as u32, strategy))
    } else {
        let factor = u32::try_from(-digits)
            .ok()
            .and_then(|k| 10i64.checked_pow(k))
            .map(Decimal::from);
        match factor {
            Some(factor) => decimal.checked_div(factor).and_then(|scaled| {
                scaled
                    .round_dp_with_strategy(0, strategy)
                    .checked_mul(factor)
            }),
            // Rounding to more digits than any value has
            None => Some(Decimal::ZERO),
        }
    };
    rounded.and_then(|d| d.to_f64()).unwrap_or(n)
}

/// Round half away from zero to a number of decimal places
pub fn round_half_away(n: f64, places: u32) -> f64 {
    round_with(n, i64::from(places), RoundingStrategy::MidpointAwayFromZero)
}

fn round_impl(
    rt: &mut dyn Runtime,
    args: &[Operand],
    strategy: RoundingStrategy,
) -> FormulaResult<FormulaValue> {
    let n = propagate!(number_arg(rt, &args[0])?);
    let digits = propagate!(optional_number(rt, args.get(1), 0.0)?);
    Ok(FormulaValue::Number(round_with(n, digits.trunc() as i64, strategy)))
}

/// ROUND function
pub fn fn_round(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    round_impl(rt, args, RoundingStrategy::MidpointAwayFromZero)
}

/// ROUNDUP function
pub fn fn_roundup(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    round_impl(rt, args, RoundingStrategy::AwayFromZero)
}

/// ROUNDDOWN function
pub fn fn_rounddown(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    round_impl(rt, args, RoundingStrategy::ToZero)
}

/// MOD function; the result takes the sign of the divisor
pub fn fn_mod(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let n = propagate!(number_arg(rt, &args[0])?);
    let d = propagate!(number_arg(rt, &args[1])?);
    if d == 0.0 {
        return Ok(FormulaValue::Error(CellError::Div0));
    }
    Ok(FormulaValue::Number(n - d * (n / d).floor()))
}

fn unary(
    rt: &mut dyn Runtime,
    args: &[Operand],
    f: impl Fn(f64) -> Result<f64, CellError>,
) -> FormulaResult<FormulaValue> {
    let n = propagate!(number_arg(rt, &args[0])?);
    let result = propagate!(f(n));
    if result.is_finite() {
        Ok(FormulaValue::Number(result))
    } else {
        Ok(FormulaValue::Error(CellError::Num))
    }
}

/// LN function
pub fn fn_ln(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    unary(rt, args, |n| {
        if n <= 0.0 {
            Err(CellError::Num)
        } else {
            Ok(n.ln())
        }
    })
}

/// ABS function
pub fn fn_abs(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    unary(rt, args, |n| Ok(n.abs()))
}

/// SQRT function
pub fn fn_sqrt(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    unary(rt, args, |n| {
        if n < 0.0 {
            Err(CellError::Num)
        } else {
            Ok(n.sqrt())
        }
    })
}

/// POWER function
pub fn fn_power(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let exponent = propagate!(number_arg(rt, &args[1])?);
    unary(rt, args, |base| {
        if base == 0.0 && exponent < 0.0 {
            Err(CellError::Div0)
        } else {
            Ok(base.powf(exponent))
        }
    })
}

/// EXP function
pub fn fn_exp(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    unary(rt, args, |n| Ok(n.exp()))
}

/// GAMMALN function
pub fn fn_gammaln(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    unary(rt, args, |n| {
        if n <= 0.0 {
            Err(CellError::Num)
        } else {
            Ok(ln_gamma(n))
        }
    })
}

/// Natural log of the gamma function (Lanczos, g = 7)
fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // Reflection
        (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let t = x + G + 0.5;
        let series = COEFFICIENTS
            .iter()
            .enumerate()
            .skip(1)
            .fold(COEFFICIENTS[0], |acc, (i, c)| acc + c / (x + i as f64));
        0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
    }
}

/// NPV(rate, value1, ...)
pub fn fn_npv(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let rate = propagate!(number_arg(rt, &args[0])?);
    if rate == -1.0 {
        return Ok(FormulaValue::Error(CellError::Div0));
    }
    let values = propagate!(collect_numbers(rt, &args[1..])?);
    let npv = values
        .iter()
        .enumerate()
        .map(|(i, v)| v / (1.0 + rate).powi(i as i32 + 1))
        .sum();
    Ok(FormulaValue::Number(npv))
}

/// LINEST(known_y, [known_x], [const]) as a polynomial fit of the given degree
///
/// Coefficients come highest power first, the intercept last. With `const` false the
/// intercept is forced to zero. `coefficient` picks a single entry; without it the row of
/// all coefficients is returned.
pub fn linest(
    rt: &mut dyn Runtime,
    args: &[Operand],
    degree: usize,
    coefficient: Option<usize>,
) -> FormulaResult<FormulaValue> {
    let ys = match args.first() {
        Some(arg) => propagate!(fit_values(arg.flatten(rt)?)),
        None => return Ok(FormulaValue::Error(CellError::Value)),
    };
    let xs = match args.get(1) {
        Some(arg) => propagate!(fit_values(arg.flatten(rt)?)),
        None => (1..=ys.len()).map(|i| i as f64).collect(),
    };
    let intercept = match args.get(2) {
        Some(arg) => propagate!(arg.scalar(rt)?.to_bool()),
        None => true,
    };
    if xs.len() != ys.len() || ys.is_empty() {
        return Ok(FormulaValue::Error(CellError::Ref));
    }

    let mut coefficients = propagate!(polyfit(&xs, &ys, degree, intercept));
    if !intercept {
        coefficients.push(0.0);
    }

    match coefficient {
        Some(index) => Ok(coefficients
            .get(index)
            .map_or(FormulaValue::Error(CellError::Ref), |c| FormulaValue::Number(*c))),
        None => Ok(FormulaValue::Array(vec![coefficients
            .into_iter()
            .map(FormulaValue::Number)
            .collect()])),
    }
}

fn fit_values(values: Vec<FormulaValue>) -> Result<Vec<f64>, CellError> {
    values
        .into_iter()
        .filter(|v| !v.is_blank())
        .map(|v| match v {
            FormulaValue::Number(n) => Ok(n),
            FormulaValue::Error(e) => Err(e),
            _ => Err(CellError::Value),
        })
        .collect()
}

/// Least squares over the Vandermonde matrix `[x^d, ..., x, 1]`
///
/// Columns are scaled to unit length before the normal equations are formed, so data of
/// any magnitude fits as well as data near 1.
fn polyfit(xs: &[f64], ys: &[f64], degree: usize, intercept: bool) -> Result<Vec<f64>, CellError> {
    let lowest = if intercept { 0 } else { 1 };
    let powers: Vec<i32> = (lowest..=degree as i32).rev().collect();
    let n = powers.len();

    let scales: Vec<f64> = powers
        .iter()
        .map(|&p| {
            let norm = xs.iter().map(|x| x.powi(p).powi(2)).sum::<f64>().sqrt();
            if norm > 0.0 && norm.is_finite() {
                norm
            } else {
                1.0
            }
        })
        .collect();

    // Normal equations: (A^T A) b = A^T y
    let mut matrix = vec![vec![0.0; n + 1]; n];
    for (x, y) in xs.iter().zip(ys) {
        let row: Vec<f64> = powers
            .iter()
            .zip(&scales)
            .map(|(&p, scale)| x.powi(p) / scale)
            .collect();
        for i in 0..n {
            for j in 0..n {
                matrix[i][j] += row[i] * row[j];
            }
            matrix[i][n] += row[i] * y;
        }
    }
    let scaled = solve(matrix)?;
    Ok(scaled.iter().zip(&scales).map(|(b, scale)| b / scale).collect())
}

/// Gaussian elimination with partial pivoting on an augmented matrix
///
/// A pivot is treated as zero relative to the largest coefficient of the matrix.
fn solve(mut m: Vec<Vec<f64>>) -> Result<Vec<f64>, CellError> {
    let n = m.len();
    let largest = m
        .iter()
        .flat_map(|row| row[..n].iter())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if largest == 0.0 || !largest.is_finite() {
        return Err(CellError::Num);
    }
    let tolerance = largest * n as f64 * 1e-12;

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))
            .unwrap_or(col);
        if m[pivot][col].abs() <= tolerance {
            return Err(CellError::Num);
        }
        m.swap(col, pivot);
        for row in col + 1..n {
            let factor = m[row][col] / m[col][col];
            for k in col..=n {
                m[row][k] -= factor * m[col][k];
            }
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| m[row][k] * solution[k]).sum();
        solution[row] = (m[row][n] - tail) / m[row][row];
    }
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::testing::{err, eval, num, MapRuntime};
    use pretty_assertions::assert_eq;

    fn close(value: FormulaValue, expected: f64) {
        match value {
            FormulaValue::Number(n) => assert!((n - expected).abs() < 1e-9, "{} != {}", n, expected),
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_sum() {
        let mut rt = MapRuntime::default()
            .with("A1", 1.0)
            .with("A2", "text")
            .with("A3", 2.0)
            .with("A4", true);
        assert_eq!(eval("=SUM(A1:A4)", &mut rt), num(3.0));
        assert_eq!(eval("=SUM(A1:A3,10,\"5\",TRUE)", &mut rt), num(19.0));

        let mut rt = MapRuntime::default().with("A2", CellError::Na);
        assert_eq!(eval("=SUM(A1:A3)", &mut rt), err(CellError::Na));
        assert_eq!(eval("=SUM(1,\"x\")", &mut rt), err(CellError::Value));
    }

    #[test]
    fn test_sumif() {
        let mut rt = MapRuntime::default()
            .with("A1", "apple")
            .with("A2", "pear")
            .with("A3", "Apple")
            .with("B1", 1.0)
            .with("B2", 2.0)
            .with("B3", 4.0);
        assert_eq!(eval("=SUMIF(A1:A3,\"apple\",B1:B3)", &mut rt), num(5.0));
        // The sum range is read only where the criteria range matched
        assert!(!rt.reads.contains(&"S!B2".to_string()));
        assert_eq!(eval("=SUMIF(B1:B3,\">1\")", &mut rt), num(6.0));
        assert_eq!(eval("=SUMIF(A1:A3,\"p*\",B1:B1)", &mut rt), num(2.0));
    }

    #[test]
    fn test_sumproduct() {
        let mut rt = MapRuntime::default()
            .with("A1", 1.0)
            .with("A2", 2.0)
            .with("B1", 3.0)
            .with("B2", 4.0);
        assert_eq!(eval("=SUMPRODUCT(A1:A2,B1:B2)", &mut rt), num(11.0));
        assert_eq!(eval("=SUMPRODUCT(A1:A2)", &mut rt), num(3.0));
        assert_eq!(eval("=SUMPRODUCT(A1:A2,B1:C2)", &mut rt), err(CellError::Value));
    }

    #[test]
    fn test_rounding() {
        let mut rt = MapRuntime::default();
        assert_eq!(eval("=ROUND(2.5)", &mut rt), num(3.0));
        assert_eq!(eval("=ROUND(-2.5)", &mut rt), num(-3.0));
        close(eval("=ROUND(1.005,2)", &mut rt), 1.01);
        assert_eq!(eval("=ROUND(1234.5,-2)", &mut rt), num(1200.0));
        assert_eq!(eval("=ROUNDUP(3.2,0)", &mut rt), num(4.0));
        assert_eq!(eval("=ROUNDUP(-3.2)", &mut rt), num(-4.0));
        assert_eq!(eval("=ROUNDDOWN(3.7)", &mut rt), num(3.0));
        assert_eq!(eval("=ROUNDDOWN(-3.7)", &mut rt), num(-3.0));
        assert!((round_half_away(0.125, 2) - 0.13).abs() < 1e-12);
        assert_eq!(round_half_away(7.0, 3), 7.0);
    }

    #[test]
    fn test_math() {
        let mut rt = MapRuntime::default();
        assert_eq!(eval("=MOD(10,3)", &mut rt), num(1.0));
        assert_eq!(eval("=MOD(-1,3)", &mut rt), num(2.0));
        assert_eq!(eval("=MOD(1,0)", &mut rt), err(CellError::Div0));
        assert_eq!(eval("=ABS(-4)", &mut rt), num(4.0));
        assert_eq!(eval("=SQRT(16)", &mut rt), num(4.0));
        assert_eq!(eval("=SQRT(-1)", &mut rt), err(CellError::Num));
        assert_eq!(eval("=POWER(2,3)", &mut rt), num(8.0));
        assert_eq!(eval("=LN(0)", &mut rt), err(CellError::Num));
        close(eval("=LN(EXP(2))", &mut rt), 2.0);
        close(eval("=GAMMALN(1)", &mut rt), 0.0);
        close(eval("=GAMMALN(5)", &mut rt), 24f64.ln());
        close(eval("=GAMMALN(0.25)", &mut rt), 1.288_022_524_698_077_5);
        assert_eq!(eval("=GAMMALN(0)", &mut rt), err(CellError::Num));
    }

    #[test]
    fn test_npv() {
        let mut rt = MapRuntime::default().with("A1", 100.0).with("A2", 100.0);
        close(eval("=NPV(0.1,A1:A2)", &mut rt), 100.0 / 1.1 + 100.0 / 1.21);
        assert_eq!(eval("=NPV(-1,A1)", &mut rt), err(CellError::Div0));
    }

    fn fit_runtime() -> MapRuntime {
        // y = 2x + 1 and y = x^2 over x = 1..4
        let mut rt = MapRuntime::default();
        for (i, x) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            let row = i + 1;
            rt = rt
                .with(&format!("A{}", row), x)
                .with(&format!("B{}", row), 2.0 * x + 1.0)
                .with(&format!("C{}", row), x * x);
        }
        rt
    }

    #[test]
    fn test_linest_line() {
        let mut rt = fit_runtime();
        let result = eval("=LINEST(B1:B4,A1:A4)", &mut rt);
        let FormulaValue::Array(rows) = result else {
            panic!("expected array, got {:?}", result);
        };
        assert_eq!(rows.len(), 1);
        close(rows[0][0].clone(), 2.0);
        close(rows[0][1].clone(), 1.0);
    }

    #[test]
    fn test_linest_quadratic_coefficient() {
        let mut rt = fit_runtime();
        let ys = Operand::Range(RangeHandle::parse("S!C1:C4").unwrap());
        let xs = Operand::Range(RangeHandle::parse("S!A1:A4").unwrap());
        close(linest(&mut rt, &[ys.clone(), xs.clone()], 2, Some(0)).unwrap(), 1.0);
        close(linest(&mut rt, &[ys.clone(), xs.clone()], 2, Some(1)).unwrap(), 0.0);
        close(linest(&mut rt, &[ys.clone(), xs.clone()], 2, Some(2)).unwrap(), 0.0);
        assert_eq!(
            linest(&mut rt, &[ys, xs], 2, Some(3)).unwrap(),
            err(CellError::Ref)
        );
    }

    #[test]
    fn test_linest_without_intercept() {
        let mut rt = fit_runtime();
        let ys = Operand::Range(RangeHandle::parse("S!C1:C4").unwrap());
        let xs = Operand::Range(RangeHandle::parse("S!A1:A4").unwrap());
        let no_const = Operand::Value(FormulaValue::Boolean(false));
        let result = linest(&mut rt, &[ys, xs, no_const], 2, None).unwrap();
        let FormulaValue::Array(rows) = result else {
            panic!("expected array");
        };
        assert_eq!(rows[0].len(), 3);
        close(rows[0][0].clone(), 1.0);
        close(rows[0][1].clone(), 0.0);
        assert_eq!(rows[0][2], num(0.0));
    }

    #[test]
    fn test_linest_small_magnitude_data() {
        let mut rt = MapRuntime::default();
        for i in 1..=5 {
            let x = i as f64 * 1e-4;
            rt = rt
                .with(&format!("A{}", i), x)
                .with(&format!("B{}", i), 3.0 * x * x + 2.0 * x + 1.0);
        }
        let ys = Operand::Range(RangeHandle::parse("S!B1:B5").unwrap());
        let xs = Operand::Range(RangeHandle::parse("S!A1:A5").unwrap());
        let coefficient = |rt: &mut MapRuntime, index| {
            match linest(rt, &[ys.clone(), xs.clone()], 2, Some(index)).unwrap() {
                FormulaValue::Number(n) => n,
                other => panic!("expected number, got {:?}", other),
            }
        };
        assert!((coefficient(&mut rt, 0) - 3.0).abs() < 1e-3);
        assert!((coefficient(&mut rt, 1) - 2.0).abs() < 1e-6);
        assert!((coefficient(&mut rt, 2) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_linest_singular_fit() {
        let mut rt = MapRuntime::default();
        for i in 1..=3 {
            rt = rt.with(&format!("A{}", i), 2.0).with(&format!("B{}", i), i as f64);
        }
        assert_eq!(eval("=LINEST(B1:B3,A1:A3)", &mut rt), err(CellError::Num));
    }

    #[test]
    fn test_linest_mismatched_lengths() {
        let mut rt = fit_runtime();
        assert_eq!(eval("=LINEST(B1:B4,A1:A3)", &mut rt), err(CellError::Ref));
    }
}
