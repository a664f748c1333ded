//! Graph nodes
//!
//! A node is either a cell or a range. Ranges sit between the cells they cover and the
//! formulas that consume them, so a consumer has one edge per range rather than one per
//! cell.

use std::fmt;
use std::rc::Rc;
use xlgraph_core::NumberFormat;
use xlgraph_formula::{Expr, FormulaValue};

/// Index of a node within its spreadsheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position in node creation order
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Evaluation state of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    #[default]
    Idle,
    /// On the evaluation stack; reading it again is a cycle
    Evaluating,
}

/// A single cell of the graph
#[derive(Debug, Clone)]
pub struct Cell {
    pub(crate) address: String,
    pub(crate) sheet: String,
    pub(crate) formula: Option<String>,
    /// Compiled formula; constants compile to their literal
    pub(crate) expr: Rc<Expr>,
    pub(crate) value: FormulaValue,
    pub(crate) number_format: NumberFormat,
    pub(crate) dirty: bool,
    /// The formula is a bare reference to another cell
    pub(crate) plain_reference: bool,
    pub(crate) state: NodeState,
}

impl Cell {
    /// A formula cell; until the builder compiles it the expression is its cached value
    pub(crate) fn formula<S: Into<String>>(
        address: String,
        sheet: S,
        formula: &str,
        cached: FormulaValue,
        number_format: NumberFormat,
        dirty: bool,
    ) -> Self {
        Self {
            address,
            sheet: sheet.into(),
            formula: Some(formula.to_string()),
            expr: Rc::new(Expr::Literal(cached.clone())),
            value: cached,
            number_format,
            dirty,
            plain_reference: false,
            state: NodeState::Idle,
        }
    }

    /// A constant cell
    pub(crate) fn constant<S: Into<String>>(
        address: String,
        sheet: S,
        value: FormulaValue,
        number_format: NumberFormat,
    ) -> Self {
        Self {
            address,
            sheet: sheet.into(),
            formula: None,
            expr: Rc::new(Expr::Literal(value.clone())),
            value,
            number_format,
            dirty: false,
            plain_reference: false,
            state: NodeState::Idle,
        }
    }

    pub(crate) fn set_expr(&mut self, expr: Expr) {
        self.plain_reference = matches!(expr, Expr::Cell(_));
        self.expr = Rc::new(expr);
    }

    /// Canonical address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Owning sheet
    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// Formula text, with its leading `=`
    pub fn formula_text(&self) -> Option<&str> {
        self.formula.as_deref()
    }

    /// Compiled expression
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Last computed or assigned value
    pub fn value(&self) -> &FormulaValue {
        &self.value
    }

    pub fn number_format(&self) -> &NumberFormat {
        &self.number_format
    }

    /// Check whether the value must be recomputed before it is read
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn state(&self) -> NodeState {
        self.state
    }
}

/// A range of cells consumed as a unit
///
/// Narrowed lookup tables join their rectangles with `;`, as in
/// `Sheet1!A1:A100;Sheet1!C1:C100`.
#[derive(Debug, Clone)]
pub struct CellRange {
    pub(crate) address: String,
    pub(crate) cells: Vec<Vec<String>>,
}

impl CellRange {
    pub(crate) fn new(address: String, cells: Vec<Vec<String>>) -> Self {
        Self { address, cells }
    }

    /// Canonical address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Constituent addresses, one inner `Vec` per row
    pub fn cells(&self) -> &[Vec<String>] {
        &self.cells
    }

    pub fn nrows(&self) -> usize {
        self.cells.len()
    }

    pub fn ncols(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }
}

/// A vertex of the dependency graph
#[derive(Debug, Clone)]
pub enum Node {
    Cell(Cell),
    Range(CellRange),
}

impl Node {
    /// Canonical address
    pub fn address(&self) -> &str {
        match self {
            Node::Cell(cell) => cell.address(),
            Node::Range(range) => range.address(),
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Node::Range(_))
    }

    /// Ranges are never dirty; their cells are
    pub fn is_dirty(&self) -> bool {
        match self {
            Node::Cell(cell) => cell.dirty,
            Node::Range(_) => false,
        }
    }

    pub fn as_cell(&self) -> Option<&Cell> {
        match self {
            Node::Cell(cell) => Some(cell),
            Node::Range(_) => None,
        }
    }

    pub(crate) fn as_cell_mut(&mut self) -> Option<&mut Cell> {
        match self {
            Node::Cell(cell) => Some(cell),
            Node::Range(_) => None,
        }
    }

    pub fn as_range(&self) -> Option<&CellRange> {
        match self {
            Node::Range(range) => Some(range),
            Node::Cell(_) => None,
        }
    }
}
