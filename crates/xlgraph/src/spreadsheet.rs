//! The incremental evaluator
//!
//! A [`Spreadsheet`] owns the node arena, the address map and the dependency graph built
//! by [`GraphBuilder`](crate::GraphBuilder). Reads evaluate lazily and cache their result;
//! writes invalidate everything downstream.
//!
//! Evaluation recurses through the cells a formula reads. Past
//! [`BuildOptions::max_recursion_depth`] nested cells the evaluator unwinds, evaluates the
//! deepest pending cell first and then retries the cells waiting on it, so native stack
//! use stays bounded however long a reference chain is.
//!
//! # Example
//!
//! ```rust,ignore
//! use xlgraph::prelude::*;
//!
//! let mut workbook = MemoryWorkbook::new();
//! let sheet = workbook.add_sheet("Sheet1");
//! sheet.set_cell_value("A1", 2.0)?;
//! sheet.set_cell_formula("A2", "=A1*10")?;
//!
//! let mut spreadsheet = GraphBuilder::new(&mut workbook).build("Sheet1", "A1:A2")?;
//! assert_eq!(spreadsheet.evaluate("A2")?, FormulaValue::Number(20.0));
//!
//! spreadsheet.set_value("A1", 3.0)?;
//! assert_eq!(spreadsheet.evaluate("A2")?, FormulaValue::Number(30.0));
//! ```

use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::node::{Cell, Node, NodeId, NodeState};
use crate::options::BuildOptions;
use ahash::{AHashMap, AHashSet};
use xlgraph_core::{canonicalize, NumberFormat};
use xlgraph_formula::evaluator::evaluate as evaluate_expr;
use xlgraph_formula::{
    round_half_away, FormulaError, FormulaResult, FormulaValue, RangeHandle, Runtime,
};

/// A compiled, incrementally evaluated spreadsheet
#[derive(Debug)]
pub struct Spreadsheet {
    nodes: Vec<Node>,
    index: AHashMap<String, NodeId>,
    graph: DependencyGraph,
    /// Cells under evaluation, for diagnostics; emptied when the depth fuse trips
    call_stack: Vec<NodeId>,
    /// Cells under evaluation, never truncated
    current: Vec<NodeId>,
    max_call_stack: usize,
    max_recursion_depth: usize,
    /// Logical depth of the cell that started the current native evaluation
    depth_offset: usize,
    /// Full tables of narrowed lookups; only their slices are graph nodes
    narrowed_tables: AHashSet<String>,
    default_sheet: String,
}

impl Spreadsheet {
    pub(crate) fn new(options: &BuildOptions, default_sheet: &str) -> Self {
        Self {
            nodes: Vec::new(),
            index: AHashMap::new(),
            graph: DependencyGraph::new(),
            call_stack: Vec::new(),
            current: Vec::new(),
            max_call_stack: options.max_call_stack,
            max_recursion_depth: options.max_recursion_depth.max(1),
            depth_offset: 0,
            narrowed_tables: AHashSet::new(),
            default_sheet: default_sheet.to_string(),
        }
    }

    pub(crate) fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.index.insert(node.address().to_string(), id);
        self.nodes.push(node);
        id
    }

    pub(crate) fn node_id(&self, address: &str) -> Option<NodeId> {
        self.index.get(address).copied()
    }

    pub(crate) fn node_by_id(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn cell_mut(&mut self, id: NodeId) -> Option<&mut Cell> {
        self.nodes[id.0].as_cell_mut()
    }

    pub(crate) fn register_narrowed_table(&mut self, address: String) {
        self.narrowed_tables.insert(address);
    }

    pub(crate) fn add_edge(&mut self, from: NodeId, to: NodeId) -> bool {
        self.graph.add_dependency(from, to)
    }

    /// Make every clean cell downstream of a dirty one dirty as well
    ///
    /// Needed when cached workbook values are trusted: a cell with a cached value may read
    /// one without.
    pub(crate) fn settle_dirty(&mut self) {
        let dirty: Vec<NodeId> = (0..self.nodes.len())
            .map(NodeId)
            .filter(|&id| self.nodes[id.0].is_dirty())
            .collect();
        let mut stale = AHashSet::new();
        for id in dirty {
            stale.extend(self.graph.downstream(id));
        }
        for id in stale {
            if let Some(cell) = self.cell_mut(id) {
                cell.dirty = true;
            }
        }
    }

    /// Evaluate a cell, or every cell of a range
    ///
    /// Addresses without a sheet refer to the first seeded sheet; `$` markers are ignored.
    /// Domain errors such as `#DIV/0!` are returned as values.
    pub fn evaluate(&mut self, address: &str) -> Result<FormulaValue> {
        let id = self.resolve(address)?;
        Ok(self.evaluate_resumable(id)?)
    }

    /// Assign a value to a cell and invalidate everything that reads it
    ///
    /// The cell keeps the value until it is reset or assigned again; its formula, if any,
    /// is not run.
    pub fn set_value<V: Into<FormulaValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let value = value.into();
        let id = self.resolve(address)?;
        let unchanged = match &self.nodes[id.0] {
            Node::Cell(cell) => !cell.dirty && cell.value == value,
            Node::Range(range) => {
                return Err(FormulaError::Argument(format!(
                    "Cannot assign a value to range {}",
                    range.address()
                ))
                .into())
            }
        };
        if unchanged {
            return Ok(());
        }

        self.invalidate(id, true);
        if let Some(cell) = self.cell_mut(id) {
            cell.value = value;
            cell.dirty = false;
        }
        Ok(())
    }

    /// Clear a cell's value and mark it for recomputation
    ///
    /// Invalidation spreads downstream unless the cell was already dirty.
    pub fn reset(&mut self, address: &str) -> Result<()> {
        let id = self.resolve(address)?;
        let propagate = !self.nodes[id.0].is_dirty();
        self.invalidate(id, propagate);
        Ok(())
    }

    /// Check if an address is part of the graph
    pub fn contains(&self, address: &str) -> bool {
        self.resolve(address).is_ok()
    }

    /// Look up a node
    pub fn node(&self, address: &str) -> Option<&Node> {
        self.resolve(address).ok().map(|id| &self.nodes[id.0])
    }

    /// Look up a cell
    pub fn cell(&self, address: &str) -> Option<&Cell> {
        self.node(address).and_then(Node::as_cell)
    }

    /// All nodes in creation order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Number of nodes, cells and ranges together
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of dependency edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Number of range nodes
    pub fn range_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_range()).count()
    }

    /// The sheet unqualified addresses refer to
    pub fn default_sheet(&self) -> &str {
        &self.default_sheet
    }

    /// Addresses of the nodes reading a node, sorted
    pub fn dependents(&self, address: &str) -> Result<Vec<String>> {
        let id = self.resolve(address)?;
        Ok(self.sorted_addresses(self.graph.dependents(id)))
    }

    /// Addresses of the nodes a node reads, sorted
    pub fn precedents(&self, address: &str) -> Result<Vec<String>> {
        let id = self.resolve(address)?;
        Ok(self.sorted_addresses(self.graph.precedents(id)))
    }

    /// Check whether a node's precedents lead back to it
    pub fn has_circular_reference(&self, address: &str) -> Result<bool> {
        let id = self.resolve(address)?;
        Ok(self.graph.has_circular_reference(id))
    }

    /// The cells currently under evaluation, outermost first, one per line
    pub fn call_stack(&self) -> String {
        self.call_stack
            .iter()
            .map(|&id| format!("  {}", self.nodes[id.0].address()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn sorted_addresses(&self, ids: impl Iterator<Item = NodeId>) -> Vec<String> {
        let mut addresses: Vec<String> = ids
            .map(|id| self.nodes[id.0].address().to_string())
            .collect();
        addresses.sort();
        addresses
    }

    fn resolve(&self, address: &str) -> FormulaResult<NodeId> {
        if let Some(id) = self.node_id(address) {
            return Ok(id);
        }
        let key = canonicalize(&address.replace('$', ""), &self.default_sheet)?;
        self.node_id(&key).ok_or(FormulaError::UnknownCell(key))
    }

    fn evaluate_address(&mut self, address: &str) -> FormulaResult<FormulaValue> {
        let id = self.resolve(address)?;
        self.evaluate_node(id)
    }

    /// Evaluate a node, resuming from the deepest cell whenever nesting is suspended
    ///
    /// Cells waiting on a deeper one stay marked as evaluating, so a cycle through them
    /// is still reported as a circular reference.
    fn evaluate_resumable(&mut self, id: NodeId) -> FormulaResult<FormulaValue> {
        let mut waiting: Vec<(NodeId, usize)> = Vec::new();
        let (mut next, mut depth) = (id, 0);
        let result = loop {
            self.depth_offset = depth;
            match self.evaluate_node(next) {
                Err(FormulaError::Suspended { cell, depth: deeper_depth }) => {
                    let deeper = match self.resolve(&cell) {
                        Ok(deeper) => deeper,
                        Err(e) => break Err(e),
                    };
                    log::trace!("Resuming evaluation from {} at depth {}", cell, deeper_depth);
                    self.set_state(next, NodeState::Evaluating);
                    waiting.push((next, depth));
                    next = deeper;
                    depth = deeper_depth;
                }
                Ok(_) if !waiting.is_empty() => {
                    if let Some((parent, parent_depth)) = waiting.pop() {
                        self.set_state(parent, NodeState::Idle);
                        next = parent;
                        depth = parent_depth;
                    }
                }
                result => break result,
            }
        };

        for (id, _) in waiting {
            self.set_state(id, NodeState::Idle);
        }
        self.depth_offset = 0;
        result
    }

    fn set_state(&mut self, id: NodeId, state: NodeState) {
        if let Some(cell) = self.cell_mut(id) {
            cell.state = state;
        }
    }

    fn evaluate_node(&mut self, id: NodeId) -> FormulaResult<FormulaValue> {
        let expr = match &mut self.nodes[id.0] {
            Node::Range(range) => {
                let rows = range.cells.clone();
                return self.evaluate_rows(&rows);
            }
            Node::Cell(cell) => {
                if cell.state == NodeState::Evaluating {
                    let address = cell.address.clone();
                    return Err(FormulaError::CircularReference {
                        cell: address,
                        call_stack: self.call_stack(),
                    });
                }
                if !cell.dirty {
                    return Ok(cell.value.clone());
                }
                if self.current.len() >= self.max_recursion_depth {
                    return Err(FormulaError::Suspended {
                        cell: cell.address.clone(),
                        depth: self.depth_offset + self.call_stack.len(),
                    });
                }
                log::trace!("Evaluating {}", cell.address);
                cell.state = NodeState::Evaluating;
                cell.dirty = false;
                cell.expr.clone()
            }
        };

        self.push_frame(id);
        let result = match evaluate_expr(&expr, self) {
            Err(e) if !e.is_tagged() => Err(FormulaError::Evaluation {
                cell: self.nodes[id.0].address().to_string(),
                call_stack: self.call_stack(),
                source: Box::new(e),
            }),
            other => other,
        };
        self.pop_frame();

        let Some(cell) = self.cell_mut(id) else {
            return result;
        };
        cell.state = NodeState::Idle;
        match result {
            Ok(value) => {
                let value = apply_number_format(value, &cell.number_format);
                cell.value = value.clone();
                Ok(value)
            }
            Err(e) => {
                cell.dirty = true;
                Err(e)
            }
        }
    }

    fn evaluate_rows(&mut self, rows: &[Vec<String>]) -> FormulaResult<FormulaValue> {
        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            values.push(
                row.iter()
                    .map(|address| self.evaluate_address(address))
                    .collect::<FormulaResult<Vec<_>>>()?,
            );
        }
        Ok(FormulaValue::Array(values))
    }

    fn push_frame(&mut self, id: NodeId) {
        if self.depth_offset + self.call_stack.len() >= self.max_call_stack {
            log::error!(
                "Call stack exceeded {} entries at {}, discarding trace",
                self.max_call_stack,
                self.nodes[id.0].address()
            );
            self.call_stack.clear();
            self.depth_offset = 0;
        }
        self.call_stack.push(id);
        self.current.push(id);
    }

    fn pop_frame(&mut self) {
        self.call_stack.pop();
        self.current.pop();
    }

    /// Clear values from `start` onwards, following edges while `propagate` holds
    ///
    /// A successor propagates further only if it was clean, or is a range.
    fn invalidate(&mut self, start: NodeId, propagate: bool) {
        let mut visited = AHashSet::new();
        let mut pending = vec![(start, propagate)];
        while let Some((id, propagate)) = pending.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(cell) = self.cell_mut(id) {
                cell.value = FormulaValue::Empty;
                cell.dirty = true;
            }
            if propagate {
                for next in self.graph.dependents(id) {
                    pending.push((next, !self.nodes[next.0].is_dirty()));
                }
            }
        }
    }

    fn is_plain_reference(&self, id: NodeId) -> bool {
        self.nodes[id.0]
            .as_cell()
            .map_or(false, |cell| cell.plain_reference)
    }
}

impl Runtime for Spreadsheet {
    fn eval_cell(&mut self, address: &str) -> FormulaResult<FormulaValue> {
        let value = self.evaluate_address(address)?;
        let plain = self
            .current
            .last()
            .map_or(false, |&id| self.is_plain_reference(id));
        if plain && value == FormulaValue::Empty {
            Ok(FormulaValue::Number(0.0))
        } else {
            Ok(value)
        }
    }

    fn evaluate(&mut self, address: &str) -> FormulaResult<FormulaValue> {
        self.evaluate_address(address)
    }

    /// The range as registered by the builder
    ///
    /// A narrowed lookup table is read through its full address, so positions within
    /// the table keep their meaning; only the slices the lookup reads are graph nodes.
    fn eval_range(&mut self, address: &str) -> FormulaResult<RangeHandle> {
        match self.node_id(address).map(|id| &self.nodes[id.0]) {
            Some(Node::Range(range)) => RangeHandle::parse(range.address()),
            _ if self.narrowed_tables.contains(address) => RangeHandle::parse(address),
            _ => Err(FormulaError::UnknownCell(address.to_string())),
        }
    }
}

fn apply_number_format(value: FormulaValue, format: &NumberFormat) -> FormulaValue {
    match (value, format.decimal_places()) {
        (FormulaValue::Number(n), Some(places)) => FormulaValue::Number(round_half_away(n, places)),
        (value, _) => value,
    }
}
