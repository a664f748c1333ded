//! Runtime values

use xlgraph_core::{CellError, CellValue};
use std::fmt;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    Array(Vec<Vec<FormulaValue>>),
    #[default]
    Empty,
}

impl FormulaValue {
    /// Convert to number, if possible
    ///
    /// Blanks count as zero and numeric text is parsed. Text spelling a non-finite
    /// number such as `nan` or `inf` is not numeric.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            FormulaValue::Boolean(true) => Some(1.0),
            FormulaValue::Boolean(false) => Some(0.0),
            FormulaValue::String(s) if s.is_empty() => Some(0.0),
            FormulaValue::String(s) => s.trim().parse().ok().filter(|n: &f64| n.is_finite()),
            FormulaValue::Empty => Some(0.0),
            _ => None,
        }
    }

    /// Force conversion to number for arithmetic
    ///
    /// Errors pass through; anything else that is not numeric is `#VALUE!`.
    pub fn to_number(&self) -> Result<f64, CellError> {
        if let FormulaValue::Error(e) = self {
            return Err(*e);
        }
        self.as_number().ok_or(CellError::Value)
    }

    /// Truthiness as used by IF, AND, OR and NOT
    pub fn to_bool(&self) -> Result<bool, CellError> {
        match self {
            FormulaValue::Boolean(b) => Ok(*b),
            FormulaValue::Number(n) => Ok(*n != 0.0),
            FormulaValue::Empty => Ok(false),
            FormulaValue::String(s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
            FormulaValue::String(s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
            FormulaValue::Error(e) => Err(*e),
            _ => Err(CellError::Value),
        }
    }

    /// Convert to string
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::Array(_) => CellError::Value.to_string(),
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    /// Get the error if this is one
    pub fn get_error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Check for an empty value or empty text
    pub fn is_blank(&self) -> bool {
        match self {
            FormulaValue::Empty => true,
            FormulaValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Flatten arrays row by row; scalars yield themselves
    pub fn into_flat(self) -> Vec<FormulaValue> {
        match self {
            FormulaValue::Array(rows) => rows.into_iter().flatten().collect(),
            other => vec![other],
        }
    }
}

impl fmt::Display for FormulaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<CellValue> for FormulaValue {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Empty => FormulaValue::Empty,
            CellValue::Number(n) => FormulaValue::Number(n),
            CellValue::String(s) => FormulaValue::String(s),
            CellValue::Boolean(b) => FormulaValue::Boolean(b),
            CellValue::Error(e) => FormulaValue::Error(e),
        }
    }
}

impl From<FormulaValue> for CellValue {
    fn from(value: FormulaValue) -> Self {
        match value {
            FormulaValue::Empty => CellValue::Empty,
            FormulaValue::Number(n) => CellValue::Number(n),
            FormulaValue::String(s) => CellValue::String(s),
            FormulaValue::Boolean(b) => CellValue::Boolean(b),
            FormulaValue::Error(e) => CellValue::Error(e),
            FormulaValue::Array(_) => CellValue::Error(CellError::Value),
        }
    }
}

impl From<f64> for FormulaValue {
    fn from(n: f64) -> Self {
        FormulaValue::Number(n)
    }
}

impl From<bool> for FormulaValue {
    fn from(b: bool) -> Self {
        FormulaValue::Boolean(b)
    }
}

impl From<&str> for FormulaValue {
    fn from(s: &str) -> Self {
        FormulaValue::String(s.to_string())
    }
}

impl From<String> for FormulaValue {
    fn from(s: String) -> Self {
        FormulaValue::String(s)
    }
}

impl From<CellError> for FormulaValue {
    fn from(e: CellError) -> Self {
        FormulaValue::Error(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_coercion() {
        assert_eq!(FormulaValue::Empty.to_number(), Ok(0.0));
        assert_eq!(FormulaValue::from(" 4.5 ").to_number(), Ok(4.5));
        assert_eq!(FormulaValue::from("").to_number(), Ok(0.0));
        assert_eq!(FormulaValue::from("abc").to_number(), Err(CellError::Value));
        for text in ["nan", "NaN", "inf", "-infinity", " Infinity "] {
            assert_eq!(
                FormulaValue::from(text).to_number(),
                Err(CellError::Value),
                "{}",
                text
            );
        }
        assert_eq!(FormulaValue::from("1e3").to_number(), Ok(1000.0));
        assert_eq!(
            FormulaValue::Error(CellError::Na).to_number(),
            Err(CellError::Na)
        );
    }

    #[test]
    fn test_truthiness() {
        assert_eq!(FormulaValue::Number(2.0).to_bool(), Ok(true));
        assert_eq!(FormulaValue::Empty.to_bool(), Ok(false));
        assert_eq!(FormulaValue::from("true").to_bool(), Ok(true));
        assert_eq!(FormulaValue::from("yes").to_bool(), Err(CellError::Value));
    }

    #[test]
    fn test_as_string() {
        assert_eq!(FormulaValue::Number(3.0).as_string(), "3");
        assert_eq!(FormulaValue::Number(0.25).as_string(), "0.25");
        assert_eq!(FormulaValue::Boolean(false).as_string(), "FALSE");
        assert_eq!(FormulaValue::Empty.as_string(), "");
    }
}
