//! Statistical functions

use super::criteria::Criterion;
use super::{collect_numbers, number_arg, optional_number, propagate};
use crate::error::FormulaResult;
use crate::runtime::{Operand, Runtime};
use crate::value::FormulaValue;
use xlgraph_core::CellError;

/// COUNT function
///
/// Counts numbers in ranges and arrays; values passed directly count when they convert
/// to a number.
pub fn fn_count(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let mut count = 0usize;
    for arg in args {
        let direct = arg.is_direct();
        for value in arg.flatten(rt)? {
            let counted = match &value {
                FormulaValue::Number(_) => true,
                FormulaValue::Boolean(_) | FormulaValue::String(_) if direct => {
                    value.as_number().is_some() && !value.is_blank()
                }
                _ => false,
            };
            if counted {
                count += 1;
            }
        }
    }
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTA function: non-blank values, errors included
pub fn fn_counta(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let mut count = 0usize;
    for arg in args {
        count += arg
            .flatten(rt)?
            .iter()
            .filter(|v| !matches!(v, FormulaValue::Empty))
            .count();
    }
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTIF(range, criteria)
pub fn fn_countif(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let criterion = Criterion::new(&args[1].scalar(rt)?);
    let count = args[0]
        .flatten(rt)?
        .iter()
        .filter(|v| criterion.matches(v))
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// AVERAGE function
pub fn fn_average(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let numbers = propagate!(collect_numbers(rt, args)?);
    if numbers.is_empty() {
        return Ok(FormulaValue::Error(CellError::Div0));
    }
    Ok(FormulaValue::Number(
        numbers.iter().sum::<f64>() / numbers.len() as f64,
    ))
}

/// MIN function; zero when there are no numbers
pub fn fn_min(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let numbers = propagate!(collect_numbers(rt, args)?);
    let min = numbers.into_iter().reduce(f64::min).unwrap_or(0.0);
    Ok(FormulaValue::Number(min))
}

/// MAX function; zero when there are no numbers
pub fn fn_max(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let numbers = propagate!(collect_numbers(rt, args)?);
    let max = numbers.into_iter().reduce(f64::max).unwrap_or(0.0);
    Ok(FormulaValue::Number(max))
}

/// RANK.EQ(number, ref, [order])
///
/// Order 0 (the default) ranks the largest value first; any other order ranks the
/// smallest first. Ties share the best rank.
pub fn fn_rank_eq(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let number = propagate!(number_arg(rt, &args[0])?);
    let ascending = propagate!(optional_number(rt, args.get(2), 0.0)?) != 0.0;

    let mut values = Vec::new();
    for value in args[1].flatten(rt)? {
        match value {
            FormulaValue::Number(n) => values.push(n),
            FormulaValue::Error(e) => return Ok(FormulaValue::Error(e)),
            _ => {}
        }
    }
    if !values.contains(&number) {
        return Ok(FormulaValue::Error(CellError::Na));
    }

    let ahead = values
        .iter()
        .filter(|&&v| if ascending { v < number } else { v > number })
        .count();
    Ok(FormulaValue::Number((ahead + 1) as f64))
}

#[cfg(test)]
mod tests {
    use crate::functions::testing::{err, eval, num, MapRuntime};
    use pretty_assertions::assert_eq;
    use xlgraph_core::CellError;

    fn sample() -> MapRuntime {
        MapRuntime::default()
            .with("A1", 10.0)
            .with("A2", "x")
            .with("A3", 30.0)
            .with("A4", true)
            .with("A5", 20.0)
    }

    #[test]
    fn test_counts() {
        let mut rt = sample();
        assert_eq!(eval("=COUNT(A1:A6)", &mut rt), num(3.0));
        assert_eq!(eval("=COUNT(1,\"2\",\"x\",TRUE)", &mut rt), num(3.0));
        assert_eq!(eval("=COUNTA(A1:A6)", &mut rt), num(5.0));
        assert_eq!(eval("=COUNTIF(A1:A6,\">15\")", &mut rt), num(2.0));
        assert_eq!(eval("=COUNTIF(A1:A6,\"X\")", &mut rt), num(1.0));
        assert_eq!(eval("=COUNTIF(A1:A6,\"\")", &mut rt), num(1.0));
    }

    #[test]
    fn test_average_min_max() {
        let mut rt = sample();
        assert_eq!(eval("=AVERAGE(A1:A5)", &mut rt), num(20.0));
        assert_eq!(eval("=MIN(A1:A5)", &mut rt), num(10.0));
        assert_eq!(eval("=MAX(A1:A5,5)", &mut rt), num(30.0));
        assert_eq!(eval("=AVERAGE(B1:B3)", &mut rt), err(CellError::Div0));
        assert_eq!(eval("=MIN(B1:B3)", &mut rt), num(0.0));
        assert_eq!(eval("=MAX(B1:B3)", &mut rt), num(0.0));
    }

    #[test]
    fn test_rank_eq() {
        let mut rt = sample();
        assert_eq!(eval("=RANK.EQ(30,A1:A5)", &mut rt), num(1.0));
        assert_eq!(eval("=RANK.EQ(10,A1:A5)", &mut rt), num(3.0));
        assert_eq!(eval("=_xlfn.RANK.EQ(10,A1:A5,1)", &mut rt), num(1.0));
        assert_eq!(eval("=RANK.EQ(11,A1:A5)", &mut rt), err(CellError::Na));
    }
}
