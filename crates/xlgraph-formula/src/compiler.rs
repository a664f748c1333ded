//! Code generation
//!
//! Lowers an [`Ast`] into an [`Expr`]. Most functions compile to a call into the
//! library; IF, AND, OR, NOT, the array constructors, ROW/COLUMN and LINEST are expanded
//! here.

use crate::ast::{Ast, AstNode, NodeIndex, NodeKind};
use crate::error::{FormulaError, FormulaResult};
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::functions::registry;
use crate::lexer::{strip_xlfn, FormulaTokenizer, Lexer};
use crate::parser::{shunting_yard, strip_equals};
use crate::token::{TokenKind, TokenSubkind};
use crate::value::FormulaValue;
use xlgraph_core::{
    canonicalize, correct_range_max, is_range, CellError, CellRef, RangeRect, Workbook, MAX_COLS,
    MAX_ROWS,
};

/// What the code generator knows about the cell being compiled
pub struct CompileContext<'a> {
    /// The cell owning the formula
    pub cell: CellRef,
    /// Source of sibling formulas for LINEST
    pub workbook: Option<&'a dyn Workbook>,
}

impl<'a> CompileContext<'a> {
    /// Context without a workbook
    pub fn new(cell: CellRef) -> Self {
        Self {
            cell,
            workbook: None,
        }
    }

    /// Context that can consult a workbook
    pub fn with_workbook(cell: CellRef, workbook: &'a dyn Workbook) -> Self {
        Self {
            cell,
            workbook: Some(workbook),
        }
    }
}

/// Compile formula text in one step
///
/// Shorthand ranges are clamped to the workbook's extents when there is one, and to the
/// sheet limits otherwise.
pub fn compile_formula(formula: &str, ctx: &CompileContext<'_>) -> FormulaResult<Expr> {
    let tokens = FormulaTokenizer.tokenize(strip_equals(formula))?;
    let mut rpn = shunting_yard(tokens)?;
    let (max_cols, max_rows) = match ctx.workbook {
        Some(wb) => (wb.max_columns(), wb.max_rows()),
        None => (MAX_COLS, MAX_ROWS),
    };
    for node in rpn.iter_mut().filter(|n| n.kind == NodeKind::Range) {
        node.token.value = correct_range_max(&node.token.value, max_cols, max_rows)?;
    }
    compile(&Ast::build(rpn)?, ctx)
}

/// Compile a tree
pub fn compile(ast: &Ast, ctx: &CompileContext<'_>) -> FormulaResult<Expr> {
    compile_node(ast, ast.root(), ctx)
}

fn compile_node(ast: &Ast, index: NodeIndex, ctx: &CompileContext<'_>) -> FormulaResult<Expr> {
    let node = ast.node(index);
    match node.kind {
        NodeKind::Operand => compile_operand(node),
        NodeKind::Range => compile_reference(node, ctx),
        NodeKind::Operator => compile_operator(ast, index, ctx),
        NodeKind::Function => compile_function(ast, index, ctx),
        NodeKind::Generic => Err(FormulaError::Parse(format!(
            "Unexpected token '{}'",
            node.token.value
        ))),
    }
}

fn compile_operand(node: &AstNode) -> FormulaResult<Expr> {
    let text = &node.token.value;
    let value = match node.token.subkind {
        TokenSubkind::Number => FormulaValue::Number(
            text.parse()
                .map_err(|_| FormulaError::Parse(format!("Invalid number: {}", text)))?,
        ),
        TokenSubkind::Text => FormulaValue::String(text.clone()),
        TokenSubkind::Logical => FormulaValue::Boolean(text.eq_ignore_ascii_case("TRUE")),
        TokenSubkind::Error => FormulaValue::Error(
            CellError::parse(text)
                .ok_or_else(|| FormulaError::Parse(format!("Invalid error literal: {}", text)))?,
        ),
        _ => {
            return Err(FormulaError::Parse(format!("Unexpected operand: {}", text)));
        }
    };
    Ok(Expr::Literal(value))
}

fn compile_reference(node: &AstNode, ctx: &CompileContext<'_>) -> FormulaResult<Expr> {
    let address = canonicalize(&node.token.value.replace('$', ""), &ctx.cell.sheet)?;
    if is_range(&address) {
        Ok(Expr::Range(address))
    } else {
        Ok(Expr::Cell(address))
    }
}

fn compile_operator(ast: &Ast, index: NodeIndex, ctx: &CompileContext<'_>) -> FormulaResult<Expr> {
    let node = ast.node(index);
    let mut operands = ast
        .children(index)
        .iter()
        .map(|&c| compile_node(ast, c, ctx))
        .collect::<FormulaResult<Vec<_>>>()?;

    let missing = || FormulaError::Parse(format!("Missing operand for '{}'", node.token.value));
    match node.token.kind {
        TokenKind::OperatorInfix => {
            let op = BinaryOp::from_symbol(&node.token.value)
                .ok_or_else(|| FormulaError::UnsupportedOperator(node.token.value.clone()))?;
            let right = operands.pop().ok_or_else(missing)?;
            let left = operands.pop().ok_or_else(missing)?;
            Ok(Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            })
        }
        TokenKind::OperatorPrefix | TokenKind::OperatorPostfix => {
            let op = match node.token.value.as_str() {
                "-" => UnaryOp::Negate,
                "%" => UnaryOp::Percent,
                other => return Err(FormulaError::UnsupportedOperator(other.to_string())),
            };
            let operand = operands.pop().ok_or_else(missing)?;
            Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            })
        }
        _ => Err(FormulaError::UnsupportedOperator(node.token.value.clone())),
    }
}

fn compile_function(ast: &Ast, index: NodeIndex, ctx: &CompileContext<'_>) -> FormulaResult<Expr> {
    let node = ast.node(index);
    let name = strip_xlfn(&node.token.value).to_ascii_uppercase();
    let children = ast.children(index);
    let arity = children.len();
    let unsupported = || FormulaError::UnsupportedArity {
        function: name.clone(),
        arity,
    };
    let compile_args = || {
        children
            .iter()
            .map(|&c| compile_node(ast, c, ctx))
            .collect::<FormulaResult<Vec<_>>>()
    };

    match name.as_str() {
        "IF" => {
            if !(2..=3).contains(&arity) {
                return Err(unsupported());
            }
            let mut args = compile_args()?.into_iter();
            let (Some(condition), Some(then)) = (args.next(), args.next()) else {
                return Err(unsupported());
            };
            Ok(Expr::If {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: args.next().map(Box::new),
            })
        }
        "AND" | "OR" => {
            if arity == 0 {
                return Err(unsupported());
            }
            let args = compile_args()?;
            Ok(if name == "AND" {
                Expr::And(args)
            } else {
                Expr::Or(args)
            })
        }
        "NOT" => {
            let mut args = compile_args()?;
            match (args.pop(), args.is_empty()) {
                (Some(arg), true) => Ok(Expr::Not(Box::new(arg))),
                _ => Err(unsupported()),
            }
        }
        "ARRAY" => {
            let mut rows = Vec::with_capacity(arity);
            for &child in children {
                let child_node = ast.node(child);
                let is_row = child_node.kind == NodeKind::Function
                    && child_node.token.value.eq_ignore_ascii_case("ARRAYROW");
                if is_row {
                    rows.push(
                        ast.children(child)
                            .iter()
                            .map(|&c| compile_node(ast, c, ctx))
                            .collect::<FormulaResult<Vec<_>>>()?,
                    );
                } else {
                    rows.push(vec![compile_node(ast, child, ctx)?]);
                }
            }
            Ok(Expr::Array(rows))
        }
        "ARRAYROW" => Ok(Expr::Array(vec![compile_args()?])),
        "ROW" | "COLUMN" => {
            let row = name == "ROW";
            let position = match children {
                [] => {
                    if row {
                        ctx.cell.row
                    } else {
                        ctx.cell.column
                    }
                }
                [reference] => {
                    let reference = ast.node(*reference);
                    if reference.kind != NodeKind::Range {
                        return Err(FormulaError::Argument(format!(
                            "{} expects a reference, got '{}'",
                            name, reference.token.value
                        )));
                    }
                    let address = reference.token.value.replace('$', "");
                    let rect = RangeRect::parse(&address, &ctx.cell.sheet)?;
                    if row {
                        rect.start_row
                    } else {
                        rect.start_col
                    }
                }
                _ => return Err(unsupported()),
            };
            Ok(Expr::Literal(FormulaValue::Number(f64::from(position))))
        }
        "LINEST" | "LINESTMARIO" => {
            if arity == 0 {
                return Err(unsupported());
            }
            let args = compile_args()?;
            let (degree, coefficient) = linest_shape(ctx)?;
            Ok(Expr::Linest {
                args,
                degree,
                coefficient,
            })
        }
        _ => {
            let function = registry()
                .get(&name)
                .ok_or_else(|| FormulaError::UnknownFunction(name.clone()))?;
            if arity < function.min_args || function.max_args.map_or(false, |max| arity > max) {
                return Err(unsupported());
            }
            Ok(Expr::Call {
                function,
                args: compile_args()?,
            })
        }
    }
}

/// Degree and coefficient index of a LINEST cell
///
/// Neighbouring cells holding the identical formula form one array formula: a run of
/// `n + 1` cells fits a degree-`n` polynomial and each cell returns the coefficient at its
/// own offset. The run is looked for horizontally first, then vertically. Without a
/// workbook the whole coefficient vector of a straight-line fit is returned.
fn linest_shape(ctx: &CompileContext<'_>) -> FormulaResult<(usize, Option<usize>)> {
    let workbook = match ctx.workbook {
        Some(wb) => wb,
        None => return Ok((1, None)),
    };
    let cell = &ctx.cell;
    let formula_at = |column: u32, row: u32| -> FormulaResult<Option<String>> {
        Ok(workbook.formula_at(&CellRef::new(cell.sheet.clone(), column, row).to_string())?)
    };
    let own = match formula_at(cell.column, cell.row)? {
        Some(formula) => Some(formula),
        None => return Ok((1, None)),
    };

    let mut i = cell.column - 1;
    while i > 0 && formula_at(i, cell.row)? == own {
        i -= 1;
    }
    let mut j = cell.column + 1;
    while j <= MAX_COLS && formula_at(j, cell.row)? == own {
        j += 1;
    }
    let mut degree = (j - i - 1) as i64 - 1;
    let mut coefficient = cell.column - i;

    if degree == 0 {
        let mut i = cell.row - 1;
        while i > 0 && formula_at(cell.column, i)? == own {
            i -= 1;
        }
        let mut j = cell.row + 1;
        while j <= MAX_ROWS && formula_at(cell.column, j)? == own {
            j += 1;
        }
        degree = (j - i - 1) as i64 - 1;
        coefficient = cell.row - i;
    }

    let degree = degree.max(1) as usize;
    let coefficient = coefficient as usize - 1;
    log::debug!(
        "LINEST at {} fits degree {}, coefficient {}",
        cell,
        degree,
        coefficient
    );
    Ok((degree, Some(coefficient)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xlgraph_core::MemoryWorkbook;

    fn render(formula: &str) -> String {
        let ctx = CompileContext::new(CellRef::new("Sheet1", 2, 3));
        compile_formula(formula, &ctx).unwrap().to_string()
    }

    #[test]
    fn test_render_operators() {
        assert_eq!(render("=1+2*3"), "1 + (2 * 3)");
        assert_eq!(render("=(1+2)*3"), "(1 + 2) * 3");
        assert_eq!(render("=-A1"), "-eval_cell(\"Sheet1!A1\")");
        assert_eq!(render("=A1%*2"), "(eval_cell(\"Sheet1!A1\")%) * 2");
        assert_eq!(
            render("=$A$1&\"x\"=\"ax\""),
            "(eval_cell(\"Sheet1!A1\") & \"x\") = \"ax\""
        );
    }

    #[test]
    fn test_render_function_arguments_are_not_grouped() {
        assert_eq!(
            render("=SUM(A1:A3,B1*2)"),
            "xsum(eval_range(\"Sheet1!A1:A3\"), eval_cell(\"Sheet1!B1\") * 2)"
        );
        assert_eq!(
            render("=IF(Other!A1>1,MAX(1,2),NOT(TRUE))"),
            "if(eval_cell(\"Other!A1\") > 1, xmax(1, 2), not(true))"
        );
        assert_eq!(render("=AND(1,OR(0,1))"), "all(1, any(0, 1))");
        assert_eq!(render("=_xlfn.RANK.EQ(1,A1:A2)"), "rank_eq(1, eval_range(\"Sheet1!A1:A2\"))");
    }

    #[test]
    fn test_render_array_and_row() {
        assert_eq!(render("={1,2;3,4}"), "{1, 2; 3, 4}");
        assert_eq!(render("=ROW()"), "3");
        assert_eq!(render("=COLUMN()"), "2");
        assert_eq!(render("=ROW($D$9)"), "9");
    }

    #[test]
    fn test_if_arity() {
        let ctx = CompileContext::new(CellRef::new("S", 1, 1));
        for formula in ["=IF(1)", "=IF(1,2,3,4)"] {
            assert!(matches!(
                compile_formula(formula, &ctx),
                Err(FormulaError::UnsupportedArity { .. })
            ));
        }
        assert!(matches!(
            compile_formula("=NOT(1,2)", &ctx),
            Err(FormulaError::UnsupportedArity { .. })
        ));
        assert!(matches!(
            compile_formula("=ABS(1,2)", &ctx),
            Err(FormulaError::UnsupportedArity { .. })
        ));
    }

    #[test]
    fn test_union_and_intersection_are_rejected() {
        let ctx = CompileContext::new(CellRef::new("S", 1, 1));
        assert!(matches!(
            compile_formula("=SUM((A1:A2,B1:B2))", &ctx),
            Err(FormulaError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            compile_formula("=A1:B2 B1:C3", &ctx),
            Err(FormulaError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn test_shorthand_ranges_follow_workbook_extents() {
        let mut workbook = MemoryWorkbook::new();
        let sheet = workbook.add_sheet("S");
        sheet.set_cell_value("E50", 1.0).unwrap();
        sheet.set_cell_value("G1", 1.0).unwrap();
        let ctx = CompileContext::with_workbook(CellRef::new("S", 1, 1), &workbook);
        assert_eq!(
            compile_formula("=SUM(E:G)", &ctx).unwrap().to_string(),
            "xsum(eval_range(\"S!E1:G50\"))"
        );
    }

    #[test]
    fn test_linest_without_workbook_returns_full_fit() {
        assert_eq!(
            render("=LINEST(A1:A3,B1:B3)"),
            "linest(eval_range(\"Sheet1!A1:A3\"), eval_range(\"Sheet1!B1:B3\"), degree=1)"
        );
    }

    #[test]
    fn test_linest_siblings_decide_degree() {
        let formula = "=LINEST(A1:A5,B1:B5)";
        let mut workbook = MemoryWorkbook::new();
        let sheet = workbook.add_sheet("S");
        for address in ["D1", "E1", "F1"] {
            sheet.set_cell_formula(address, formula).unwrap();
        }
        sheet.set_cell_formula("D3", formula).unwrap();

        // Three cells in a row: a quadratic, one coefficient each
        for (column, index) in [(4, 0), (5, 1), (6, 2)] {
            let ctx = CompileContext::with_workbook(CellRef::new("S", column, 1), &workbook);
            let expr = compile_formula(formula, &ctx).unwrap();
            assert!(
                matches!(expr, Expr::Linest { degree: 2, coefficient: Some(i), .. } if i == index),
                "column {}: {}",
                column,
                expr
            );
        }

        // A lone cell is a straight line returning its first coefficient
        let ctx = CompileContext::with_workbook(CellRef::new("S", 4, 3), &workbook);
        let expr = compile_formula(formula, &ctx).unwrap();
        assert!(matches!(
            expr,
            Expr::Linest {
                degree: 1,
                coefficient: Some(0),
                ..
            }
        ));
    }
}
