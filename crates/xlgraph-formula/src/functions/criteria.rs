//! Criteria for SUMIF and COUNTIF
//!
//! A criterion is a number, a boolean, an error, or text that may start with one of
//! `>=`, `<=`, `<>`, `>`, `<`, `=`. Text operands compare case-insensitively and equality
//! supports the `*` and `?` wildcards (`~` escapes them).

use crate::value::FormulaValue;
use std::cmp::Ordering;
use xlgraph_core::CellError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl Comparator {
    fn strip(s: &str) -> (Self, &str) {
        for (prefix, op) in [
            (">=", Comparator::GreaterEqual),
            ("<=", Comparator::LessEqual),
            ("<>", Comparator::NotEqual),
            (">", Comparator::Greater),
            ("<", Comparator::Less),
            ("=", Comparator::Equal),
        ] {
            if let Some(rest) = s.strip_prefix(prefix) {
                return (op, rest);
            }
        }
        (Comparator::Equal, s)
    }

    fn test(self, ordering: Ordering) -> bool {
        match self {
            Comparator::Equal => ordering == Ordering::Equal,
            Comparator::NotEqual => ordering != Ordering::Equal,
            Comparator::Less => ordering == Ordering::Less,
            Comparator::LessEqual => ordering != Ordering::Greater,
            Comparator::Greater => ordering == Ordering::Greater,
            Comparator::GreaterEqual => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Number(Comparator, f64),
    Text(Comparator, String),
    Boolean(Comparator, bool),
    Error(CellError),
    /// `=` or `<>` with nothing after it
    Blank(bool),
}

/// A parsed criterion
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    condition: Condition,
}

impl Criterion {
    /// Parse a criterion value
    pub fn new(criterion: &FormulaValue) -> Self {
        let condition = match criterion {
            FormulaValue::Number(n) => Condition::Number(Comparator::Equal, *n),
            FormulaValue::Boolean(b) => Condition::Boolean(Comparator::Equal, *b),
            FormulaValue::Error(e) => Condition::Error(*e),
            FormulaValue::String(s) => Self::parse_text(s),
            FormulaValue::Empty | FormulaValue::Array(_) => Condition::Blank(true),
        };
        Self { condition }
    }

    fn parse_text(s: &str) -> Condition {
        let (op, operand) = Comparator::strip(s.trim());
        if operand.is_empty() {
            return match op {
                Comparator::NotEqual => Condition::Blank(false),
                _ => Condition::Blank(true),
            };
        }
        if let Ok(n) = operand.trim().parse::<f64>() {
            return Condition::Number(op, n);
        }
        if operand.eq_ignore_ascii_case("TRUE") {
            return Condition::Boolean(op, true);
        }
        if operand.eq_ignore_ascii_case("FALSE") {
            return Condition::Boolean(op, false);
        }
        match CellError::parse(operand) {
            Some(e) if op == Comparator::Equal => Condition::Error(e),
            _ => Condition::Text(op, operand.to_lowercase()),
        }
    }

    /// Check a cell value against the criterion
    pub fn matches(&self, value: &FormulaValue) -> bool {
        match &self.condition {
            Condition::Blank(blank) => value.is_blank() == *blank,
            Condition::Error(e) => value.get_error() == Some(*e),
            Condition::Number(op, n) => match value {
                FormulaValue::Number(v) => v.partial_cmp(n).map_or(false, |o| op.test(o)),
                FormulaValue::String(s) if *op == Comparator::Equal => {
                    s.trim().parse::<f64>().map_or(false, |v| v == *n)
                }
                _ => *op == Comparator::NotEqual,
            },
            Condition::Boolean(op, b) => match value {
                FormulaValue::Boolean(v) => op.test(v.cmp(b)),
                _ => *op == Comparator::NotEqual,
            },
            Condition::Text(op, pattern) => match (op, value) {
                (Comparator::Equal, FormulaValue::String(s)) => {
                    wildcard_match(pattern, &s.to_lowercase())
                }
                (Comparator::NotEqual, FormulaValue::String(s)) => {
                    !wildcard_match(pattern, &s.to_lowercase())
                }
                (Comparator::NotEqual, _) => true,
                (op, FormulaValue::String(s)) if !s.is_empty() => {
                    op.test(s.to_lowercase().as_str().cmp(pattern.as_str()))
                }
                _ => false,
            },
        }
    }
}

/// Match text against a pattern with `*`, `?` and `~` escapes
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Piece {
        Char(char),
        One,
        Any,
    }

    let mut pieces = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        pieces.push(match c {
            '~' => Piece::Char(chars.next().unwrap_or('~')),
            '?' => Piece::One,
            '*' => Piece::Any,
            c => Piece::Char(c),
        });
    }

    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match pieces.get(p) {
            Some(Piece::Char(c)) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            Some(Piece::One) => {
                p += 1;
                t += 1;
            }
            Some(Piece::Any) => {
                backtrack = Some((p, t));
                p += 1;
            }
            _ => match backtrack {
                Some((star, consumed)) => {
                    p = star + 1;
                    t = consumed + 1;
                    backtrack = Some((star, consumed + 1));
                }
                None => return false,
            },
        }
    }
    pieces[p..].iter().all(|piece| *piece == Piece::Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criterion(s: &str) -> Criterion {
        Criterion::new(&FormulaValue::String(s.to_string()))
    }

    #[test]
    fn test_numeric_criteria() {
        let gt = criterion(">5");
        assert!(gt.matches(&FormulaValue::Number(6.0)));
        assert!(!gt.matches(&FormulaValue::Number(5.0)));
        assert!(!gt.matches(&FormulaValue::String("6".into())));

        let ne = criterion("<>0");
        assert!(ne.matches(&FormulaValue::Number(1.0)));
        assert!(ne.matches(&FormulaValue::Empty));
        assert!(!ne.matches(&FormulaValue::Number(0.0)));

        let eq = Criterion::new(&FormulaValue::Number(3.0));
        assert!(eq.matches(&FormulaValue::Number(3.0)));
        assert!(eq.matches(&FormulaValue::String("3".into())));
        assert!(criterion("<=2.5").matches(&FormulaValue::Number(-1.0)));
    }

    #[test]
    fn test_text_criteria() {
        let apple = criterion("Apple");
        assert!(apple.matches(&FormulaValue::String("apple".into())));
        assert!(!apple.matches(&FormulaValue::String("apples".into())));
        assert!(!apple.matches(&FormulaValue::Number(1.0)));

        assert!(criterion("a*").matches(&FormulaValue::String("Avocado".into())));
        assert!(criterion("?ear").matches(&FormulaValue::String("pear".into())));
        assert!(!criterion("?ear").matches(&FormulaValue::String("ear".into())));
        assert!(criterion("<>pear").matches(&FormulaValue::String("plum".into())));
        assert!(criterion(">m").matches(&FormulaValue::String("pear".into())));
        assert!(!criterion(">m").matches(&FormulaValue::String("apple".into())));
    }

    #[test]
    fn test_blank_and_boolean_criteria() {
        assert!(criterion("").matches(&FormulaValue::Empty));
        assert!(criterion("=").matches(&FormulaValue::String(String::new())));
        assert!(!criterion("<>").matches(&FormulaValue::Empty));
        assert!(criterion("<>").matches(&FormulaValue::Number(0.0)));
        assert!(criterion("TRUE").matches(&FormulaValue::Boolean(true)));
        assert!(!criterion("TRUE").matches(&FormulaValue::Number(1.0)));
        assert!(criterion("#N/A").matches(&FormulaValue::Error(CellError::Na)));
    }

    #[test]
    fn test_wildcards() {
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("a*c", "abbbc"));
        assert!(wildcard_match("a*b*c", "axxbyyc"));
        assert!(!wildcard_match("a*c", "abd"));
        assert!(wildcard_match("what~?", "what?"));
        assert!(!wildcard_match("what~?", "whatx"));
        assert!(wildcard_match("~*", "*"));
    }
}
