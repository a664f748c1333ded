//! Built-in spreadsheet functions
//!
//! Each function receives the runtime plus its arguments. Multi-cell ranges arrive as
//! [`Operand::Range`] handles and are read cell by cell, so a lookup touches only the
//! cells it inspects.

pub mod criteria;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod statistical;
pub mod text;

use crate::error::FormulaResult;
use crate::runtime::{Operand, Runtime};
use crate::value::FormulaValue;
use ahash::AHashMap;
use std::borrow::Cow;
use std::fmt;
use std::sync::OnceLock;
use xlgraph_core::CellError;

/// Function implementation signature
pub type FunctionImpl = fn(&mut dyn Runtime, &[Operand]) -> FormulaResult<FormulaValue>;

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    /// The library name used when rendering a call
    pub fn library_name(&self) -> Cow<'static, str> {
        rename(self.name)
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish_non_exhaustive()
    }
}

/// Spreadsheet names whose library counterpart is spelled differently
pub const RENAMES: [(&str, &str); 7] = [
    ("LN", "xlog"),
    ("MIN", "xmin"),
    ("MAX", "xmax"),
    ("SUM", "xsum"),
    ("ROUND", "xround"),
    ("RANK.EQ", "rank_eq"),
    ("GAMMALN", "lgamma"),
];

/// Library name of a function; names without a rename are lowercased
pub fn rename(name: &str) -> Cow<'static, str> {
    let upper = name.to_ascii_uppercase();
    match RENAMES.iter().find(|(from, _)| *from == upper) {
        Some((_, to)) => Cow::Borrowed(to),
        None => Cow::Owned(name.to_ascii_lowercase()),
    }
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<&'static str, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_math_functions();
        registry.register_statistical_functions();
        registry.register_lookup_functions();
        registry.register_logical_functions();
        registry.register_text_functions();

        registry
    }

    /// Look up a function by name, ignoring case
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name.to_ascii_uppercase().as_str())
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    /// Names of all registered functions
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn add(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) {
        self.register(FunctionDef {
            name,
            min_args,
            max_args,
            implementation,
        });
    }

    fn register_math_functions(&mut self) {
        self.add("SUM", 1, None, math::fn_sum);
        self.add("SUMIF", 2, Some(3), math::fn_sumif);
        self.add("SUMPRODUCT", 1, Some(2), math::fn_sumproduct);
        self.add("ROUND", 1, Some(2), math::fn_round);
        self.add("ROUNDUP", 1, Some(2), math::fn_roundup);
        self.add("ROUNDDOWN", 1, Some(2), math::fn_rounddown);
        self.add("MOD", 2, Some(2), math::fn_mod);
        self.add("LN", 1, Some(1), math::fn_ln);
        self.add("ABS", 1, Some(1), math::fn_abs);
        self.add("SQRT", 1, Some(1), math::fn_sqrt);
        self.add("POWER", 2, Some(2), math::fn_power);
        self.add("EXP", 1, Some(1), math::fn_exp);
        self.add("GAMMALN", 1, Some(1), math::fn_gammaln);
        self.add("NPV", 2, None, math::fn_npv);
    }

    fn register_statistical_functions(&mut self) {
        self.add("COUNT", 1, None, statistical::fn_count);
        self.add("COUNTA", 1, None, statistical::fn_counta);
        self.add("COUNTIF", 2, Some(2), statistical::fn_countif);
        self.add("AVERAGE", 1, None, statistical::fn_average);
        self.add("MIN", 1, None, statistical::fn_min);
        self.add("MAX", 1, None, statistical::fn_max);
        self.add("RANK.EQ", 2, Some(3), statistical::fn_rank_eq);
        self.add("RANK", 2, Some(3), statistical::fn_rank_eq);
    }

    fn register_lookup_functions(&mut self) {
        self.add("VLOOKUP", 3, Some(4), lookup::fn_vlookup);
        self.add("HLOOKUP", 3, Some(4), lookup::fn_hlookup);
        self.add("MATCH", 2, Some(3), lookup::fn_match);
        self.add("INDEX", 2, Some(3), lookup::fn_index);
    }

    fn register_logical_functions(&mut self) {
        self.add("IFERROR", 2, Some(2), logical::fn_iferror);
    }

    fn register_text_functions(&mut self) {
        self.add("LEFT", 1, Some(2), text::fn_left);
        self.add("RIGHT", 1, Some(2), text::fn_right);
        self.add("MID", 3, Some(3), text::fn_mid);
        self.add("LEN", 1, Some(1), text::fn_len);
        self.add("SUBSTITUTE", 3, Some(4), text::fn_substitute);
        self.add("CONCATENATE", 1, None, text::fn_concatenate);
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The shared registry of built-in functions
pub fn registry() -> &'static FunctionRegistry {
    static REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();
    REGISTRY.get_or_init(FunctionRegistry::new)
}

/// Return a spreadsheet error from the enclosing function
///
/// Unwraps a `Result<T, CellError>`; the error becomes the function's value.
macro_rules! propagate {
    ($e:expr) => {
        match $e {
            Ok(value) => value,
            Err(error) => return Ok($crate::value::FormulaValue::Error(error)),
        }
    };
}
pub(crate) use propagate;

/// A scalar argument as a number
pub(crate) fn number_arg(
    rt: &mut dyn Runtime,
    arg: &Operand,
) -> FormulaResult<Result<f64, CellError>> {
    Ok(arg.scalar(rt)?.to_number())
}

/// An optional scalar argument as a number
pub(crate) fn optional_number(
    rt: &mut dyn Runtime,
    arg: Option<&Operand>,
    default: f64,
) -> FormulaResult<Result<f64, CellError>> {
    match arg {
        Some(arg) => number_arg(rt, arg),
        None => Ok(Ok(default)),
    }
}

/// A scalar argument as text
pub(crate) fn text_arg(
    rt: &mut dyn Runtime,
    arg: &Operand,
) -> FormulaResult<Result<String, CellError>> {
    let value = arg.scalar(rt)?;
    Ok(match value {
        FormulaValue::Error(e) => Err(e),
        FormulaValue::Array(_) => Err(CellError::Value),
        other => Ok(other.as_string()),
    })
}

/// Every number in the arguments, the way aggregates count them
///
/// Values passed directly count when they convert to a number; values read from ranges
/// and arrays count only when they are numbers. Blanks are skipped and the first error is
/// returned.
pub(crate) fn collect_numbers(
    rt: &mut dyn Runtime,
    args: &[Operand],
) -> FormulaResult<Result<Vec<f64>, CellError>> {
    let mut numbers = Vec::new();
    for arg in args {
        let direct = arg.is_direct();
        for value in arg.flatten(rt)? {
            match value {
                FormulaValue::Number(n) => numbers.push(n),
                FormulaValue::Error(e) => return Ok(Err(e)),
                FormulaValue::Empty => {}
                other if direct => match other.to_number() {
                    Ok(n) => numbers.push(n),
                    Err(e) => return Ok(Err(e)),
                },
                _ => {}
            }
        }
    }
    Ok(Ok(numbers))
}

#[cfg(test)]
pub(crate) mod testing {
    //! A map-backed runtime for function tests

    use super::*;
    use crate::compiler::{compile_formula, CompileContext};
    use crate::evaluator::evaluate;
    use xlgraph_core::CellRef;

    #[derive(Default)]
    pub struct MapRuntime {
        pub values: AHashMap<String, FormulaValue>,
        pub reads: Vec<String>,
    }

    impl MapRuntime {
        pub fn with(mut self, address: &str, value: impl Into<FormulaValue>) -> Self {
            self.values.insert(format!("S!{}", address), value.into());
            self
        }
    }

    impl Runtime for MapRuntime {
        fn eval_cell(&mut self, address: &str) -> FormulaResult<FormulaValue> {
            self.evaluate(address)
        }

        fn evaluate(&mut self, address: &str) -> FormulaResult<FormulaValue> {
            self.reads.push(address.to_string());
            Ok(self.values.get(address).cloned().unwrap_or_default())
        }
    }

    /// Compile and evaluate a formula in cell `S!A100`
    pub fn eval(formula: &str, rt: &mut MapRuntime) -> FormulaValue {
        let ctx = CompileContext::new(CellRef::new("S", 1, 100));
        let expr = compile_formula(formula, &ctx).unwrap();
        evaluate(&expr, rt).unwrap()
    }

    pub fn num(n: f64) -> FormulaValue {
        FormulaValue::Number(n)
    }

    pub fn text(s: &str) -> FormulaValue {
        FormulaValue::String(s.to_string())
    }

    pub fn err(e: CellError) -> FormulaValue {
        FormulaValue::Error(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_library_names() {
        let reg = registry();
        assert_eq!(reg.get("sum").unwrap().library_name(), "xsum");
        assert_eq!(reg.get("Rank.Eq").unwrap().library_name(), "rank_eq");
        assert_eq!(reg.get("GAMMALN").unwrap().library_name(), "lgamma");
        assert_eq!(reg.get("VLOOKUP").unwrap().library_name(), "vlookup");
        assert!(reg.get("NOSUCH").is_none());
    }

    #[test]
    fn test_rename_unregistered() {
        assert_eq!(rename("ln"), "xlog");
        assert_eq!(rename("Foo"), "foo");
    }

    #[test]
    fn test_every_function_has_a_library_name() {
        for name in registry().names() {
            let def = registry().get(name).unwrap();
            assert_eq!(def.library_name(), rename(name), "{}", name);
        }
    }
}
