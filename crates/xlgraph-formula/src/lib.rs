//! # xlgraph-formula
//!
//! Formula compiler and function library for xlgraph.
//!
//! This crate provides:
//! - A lexer turning formula text into typed tokens
//! - A shunting-yard parser producing reverse-Polish AST nodes, and the AST arena
//! - A code generator lowering the AST into executable [`Expr`] trees
//! - The runtime value model, operator semantics and the [`Runtime`] trait
//! - Built-in spreadsheet functions
//!
//! ## Example
//!
//! ```rust
//! use xlgraph_core::CellRef;
//! use xlgraph_formula::{compile_formula, CompileContext};
//!
//! let ctx = CompileContext::new(CellRef::new("Sheet1", 1, 1));
//! let expr = compile_formula("=SUM(B1:B3)*2", &ctx).unwrap();
//! assert_eq!(expr.to_string(), "xsum(eval_range(\"Sheet1!B1:B3\")) * 2");
//! ```

pub mod ast;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod expr;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod token;
pub mod value;

pub use ast::{Ast, AstNode, NodeIndex, NodeKind};
pub use compiler::{compile, compile_formula, CompileContext};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{binary_op, compare_values, evaluate, unary_op, values_equal};
pub use expr::{BinaryOp, Expr, UnaryOp};
pub use functions::math::round_half_away;
pub use functions::{registry, FunctionDef, FunctionRegistry};
pub use lexer::{tokenize, FormulaTokenizer, Lexer};
pub use parser::{parse_formula, parse_formula_with, shunting_yard, strip_equals};
pub use runtime::{Operand, RangeHandle, Runtime};
pub use token::{Token, TokenKind, TokenSubkind};
pub use value::FormulaValue;
