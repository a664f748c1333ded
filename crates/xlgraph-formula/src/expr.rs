//! Compiled expressions
//!
//! The code generator lowers an [`Ast`](crate::ast::Ast) into an [`Expr`] tree that the
//! evaluator interprets directly. References stay lazy: a single cell is read through
//! [`Runtime::eval_cell`](crate::runtime::Runtime::eval_cell), a multi-cell range is
//! handed to its consumer as a handle.

use crate::functions::FunctionDef;
use crate::value::FormulaValue;
use std::fmt;

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Prefix `-`
    Negate,
    /// Postfix `%`
    Percent,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Concat,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl BinaryOp {
    /// Map an infix symbol, `None` for operators that cannot be compiled
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Subtract,
            "*" => BinaryOp::Multiply,
            "/" => BinaryOp::Divide,
            "^" => BinaryOp::Power,
            "&" => BinaryOp::Concat,
            "=" => BinaryOp::Equal,
            "<>" => BinaryOp::NotEqual,
            "<" => BinaryOp::LessThan,
            "<=" => BinaryOp::LessEqual,
            ">" => BinaryOp::GreaterThan,
            ">=" => BinaryOp::GreaterEqual,
            _ => return None,
        })
    }

    /// The formula symbol
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Power => "^",
            BinaryOp::Concat => "&",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "<>",
            BinaryOp::LessThan => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterEqual => ">=",
        }
    }
}

/// An executable expression
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(FormulaValue),
    /// Canonical address of a single cell
    Cell(String),
    /// Canonical address of a multi-cell range, passed on unevaluated
    Range(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// Array literal, one inner `Vec` per row
    Array(Vec<Vec<Expr>>),
    Call {
        function: &'static FunctionDef,
        args: Vec<Expr>,
    },
    /// Polynomial least-squares fit; `coefficient` selects one entry of the result
    Linest {
        args: Vec<Expr>,
        degree: usize,
        coefficient: Option<usize>,
    },
}

impl Expr {
    fn is_operator(&self) -> bool {
        matches!(self, Expr::Unary { .. } | Expr::Binary { .. })
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>, under_operator: bool) -> fmt::Result {
        // Operators only need grouping when they sit under another operator
        if under_operator && self.is_operator() {
            write!(f, "(")?;
            self.fmt_nested(f, false)?;
            return write!(f, ")");
        }
        match self {
            Expr::Literal(value) => fmt_literal(value, f),
            Expr::Cell(address) => write!(f, "eval_cell({:?})", address),
            Expr::Range(address) => write!(f, "eval_range({:?})", address),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Negate => {
                    write!(f, "-")?;
                    operand.fmt_nested(f, true)
                }
                UnaryOp::Percent => {
                    operand.fmt_nested(f, true)?;
                    write!(f, "%")
                }
            },
            Expr::Binary { op, left, right } => {
                left.fmt_nested(f, true)?;
                write!(f, " {} ", op.symbol())?;
                right.fmt_nested(f, true)
            }
            Expr::If {
                condition,
                then,
                otherwise,
            } => {
                write!(f, "if(")?;
                condition.fmt_nested(f, false)?;
                write!(f, ", ")?;
                then.fmt_nested(f, false)?;
                if let Some(otherwise) = otherwise {
                    write!(f, ", ")?;
                    otherwise.fmt_nested(f, false)?;
                }
                write!(f, ")")
            }
            Expr::And(args) => fmt_call("all", args, f),
            Expr::Or(args) => fmt_call("any", args, f),
            Expr::Not(arg) => {
                write!(f, "not(")?;
                arg.fmt_nested(f, false)?;
                write!(f, ")")
            }
            Expr::Array(rows) => {
                write!(f, "{{")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    fmt_list(row, f)?;
                }
                write!(f, "}}")
            }
            Expr::Call { function, args } => fmt_call(&function.library_name(), args, f),
            Expr::Linest {
                args,
                degree,
                coefficient,
            } => {
                write!(f, "linest(")?;
                fmt_list(args, f)?;
                write!(f, ", degree={})", degree)?;
                if let Some(index) = coefficient {
                    write!(f, "[{}]", index)?;
                }
                Ok(())
            }
        }
    }
}

fn fmt_literal(value: &FormulaValue, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        FormulaValue::String(s) => write!(f, "{:?}", s),
        FormulaValue::Boolean(b) => write!(f, "{}", b),
        FormulaValue::Empty => write!(f, "blank"),
        other => write!(f, "{}", other),
    }
}

fn fmt_list(args: &[Expr], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        arg.fmt_nested(f, false)?;
    }
    Ok(())
}

fn fmt_call(name: &str, args: &[Expr], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}(", name)?;
    fmt_list(args, f)?;
    write!(f, ")")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_nested(f, false)
    }
}
