//! Logical functions
//!
//! IF, AND, OR and NOT are expanded by the code generator; only IFERROR is a library call.

use crate::error::FormulaResult;
use crate::runtime::{Operand, Runtime};
use crate::value::FormulaValue;

/// IFERROR(value, value_if_error)
///
/// The fallback is evaluated only when the value is an error.
pub fn fn_iferror(rt: &mut dyn Runtime, args: &[Operand]) -> FormulaResult<FormulaValue> {
    let value = args[0].scalar(rt)?;
    if value.is_error() {
        args[1].scalar(rt)
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use crate::functions::testing::{eval, num, text, MapRuntime};
    use pretty_assertions::assert_eq;
    use xlgraph_core::CellError;

    #[test]
    fn test_iferror() {
        let mut rt = MapRuntime::default().with("A1", CellError::Na).with("A2", 5.0);
        assert_eq!(eval("=IFERROR(A1,\"missing\")", &mut rt), text("missing"));
        assert_eq!(eval("=IFERROR(A2,0)", &mut rt), num(5.0));
        assert_eq!(eval("=IFERROR(1/0,-1)", &mut rt), num(-1.0));
        assert_eq!(eval("=IFERROR(VLOOKUP(9,A2:A2,1),0)", &mut rt), num(0.0));
    }
}
