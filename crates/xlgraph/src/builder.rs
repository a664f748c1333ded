//! Graph construction
//!
//! Seed ranges are read from the workbook, then every formula found is compiled and its
//! references are followed until no uncompiled formula remains. Nodes are keyed by
//! canonical address, so however many formulas reference a cell or range, it appears once.

use crate::error::{Error, Result};
use crate::node::{Cell, CellRange, Node, NodeId};
use crate::options::BuildOptions;
use crate::spreadsheet::Spreadsheet;
use ahash::AHashSet;
use xlgraph_core::{
    canonicalize, correct_range_max, is_range, split_sheet, CellRef, CellValue, NumberFormat,
    RangeData, RangeRect, ResolvedRange, Workbook,
};
use xlgraph_formula::lexer::strip_xlfn;
use xlgraph_formula::{
    compile, shunting_yard, strip_equals, Ast, CompileContext, FormulaTokenizer, FormulaValue,
    Lexer, NodeIndex, NodeKind, TokenSubkind,
};

/// Builds a [`Spreadsheet`] from a workbook
///
/// # Example
///
/// ```rust,ignore
/// use xlgraph::prelude::*;
///
/// let mut spreadsheet = GraphBuilder::new(&mut workbook)
///     .with_options(BuildOptions::default().with_narrow_lookups(false))
///     .build_many(&[("Inputs", "A1:A10"), ("Model", "B:D")])?;
/// ```
pub struct GraphBuilder<'w> {
    workbook: &'w mut dyn Workbook,
    options: BuildOptions,
}

impl<'w> GraphBuilder<'w> {
    pub fn new(workbook: &'w mut dyn Workbook) -> Self {
        Self {
            workbook,
            options: BuildOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Build from a single seed range on one sheet
    pub fn build(self, sheet: &str, range: &str) -> Result<Spreadsheet> {
        self.build_many(&[(sheet, range)])
    }

    /// Build from seed ranges on any number of sheets
    ///
    /// Shorthand ranges such as `B:D` are clamped to the sheet's extents. Unqualified
    /// addresses passed to the resulting spreadsheet refer to the first seed's sheet. The
    /// workbook's active sheet is restored afterwards.
    pub fn build_many(mut self, seeds: &[(&str, &str)]) -> Result<Spreadsheet> {
        let original = self.workbook.active_sheet().to_string();
        let result = self.construct(seeds);
        if !original.is_empty() {
            if let Err(e) = self.workbook.set_sheet(&original) {
                log::warn!("Could not restore active sheet {}: {}", original, e);
            }
        }
        result
    }

    fn construct(&mut self, seeds: &[(&str, &str)]) -> Result<Spreadsheet> {
        let default_sheet = match seeds.first() {
            Some((sheet, _)) => sheet.to_string(),
            None => self.workbook.active_sheet().to_string(),
        };
        let mut spreadsheet = Spreadsheet::new(&self.options, &default_sheet);
        let mut todo: Vec<NodeId> = Vec::new();

        log::debug!("Building graph from {} seed ranges", seeds.len());
        for &(sheet, range) in seeds {
            self.seed(&mut spreadsheet, &mut todo, sheet, range)
                .map_err(|e| Error::Build {
                    address: format!("{}!{}", sheet, range),
                    todo: todo.len(),
                    source: Box::new(e),
                })?;
        }

        while let Some(id) = todo.pop() {
            let (address, sheet, formula) = match spreadsheet.node_by_id(id) {
                Node::Cell(Cell {
                    address,
                    sheet,
                    formula: Some(formula),
                    ..
                }) => (address.clone(), sheet.clone(), formula.clone()),
                _ => continue,
            };
            self.compile_cell(&mut spreadsheet, &mut todo, id, &address, &sheet, &formula)
                .map_err(|e| Error::Build {
                    address: address.clone(),
                    todo: todo.len(),
                    source: Box::new(e),
                })?;
        }

        if self.options.trust_cached_values {
            spreadsheet.settle_dirty();
        }
        log::info!(
            "Graph construction done, {} nodes, {} edges, {} cellmap entries",
            spreadsheet.len(),
            spreadsheet.edge_count(),
            spreadsheet.len() - spreadsheet.range_count()
        );
        Ok(spreadsheet)
    }

    /// Add the non-blank cells of a seed range; formulas go on the work list
    fn seed(
        &mut self,
        spreadsheet: &mut Spreadsheet,
        todo: &mut Vec<NodeId>,
        sheet: &str,
        range: &str,
    ) -> Result<()> {
        self.workbook.set_sheet(sheet)?;
        let corrected = correct_range_max(
            range,
            self.workbook.max_columns(),
            self.workbook.max_rows(),
        )?;
        let rect = RangeRect::parse(&corrected, sheet)?;
        let data = self.read(&rect)?;

        let ncols = rect.ncols();
        for (offset, cell) in rect.cells().enumerate() {
            let (formula, value, format) = data.get(offset / ncols, offset % ncols);
            let value = value.cloned().unwrap_or_default();
            if formula.is_none() && value.is_empty() {
                continue;
            }
            if spreadsheet.node_id(&cell.to_string()).is_some() {
                continue;
            }
            let node = self.new_cell(&cell, formula, value, format);
            let id = spreadsheet.insert(Node::Cell(node));
            if formula.is_some() {
                todo.push(id);
            }
        }
        Ok(())
    }

    /// Compile one formula cell and wire up everything it references
    fn compile_cell(
        &mut self,
        spreadsheet: &mut Spreadsheet,
        todo: &mut Vec<NodeId>,
        id: NodeId,
        address: &str,
        sheet: &str,
        formula: &str,
    ) -> Result<()> {
        let tokens = FormulaTokenizer.tokenize(strip_equals(formula))?;
        let mut rpn = shunting_yard(tokens)?;
        for node in rpn.iter_mut().filter(|n| n.kind == NodeKind::Range) {
            let dependency_sheet = split_sheet(&node.token.value).0.unwrap_or(sheet).to_string();
            self.workbook.set_sheet(&dependency_sheet)?;
            node.token.value = correct_range_max(
                &node.token.value,
                self.workbook.max_columns(),
                self.workbook.max_rows(),
            )?;
        }

        self.workbook.set_sheet(sheet)?;
        let ast = Ast::build(rpn)?;
        let cell = CellRef::parse(address, sheet)?;
        let expr = compile(&ast, &CompileContext::with_workbook(cell, &*self.workbook))?;
        if let Some(cell) = spreadsheet.cell_mut(id) {
            cell.set_expr(expr);
        }

        let mut seen = AHashSet::new();
        for index in ast.range_nodes() {
            let reference = ast.node(index).value();
            // Re-derived for every reference so an unqualified one never inherits the
            // sheet of the reference before it
            let dependency_sheet = split_sheet(reference).0.unwrap_or(sheet).to_string();
            self.workbook.set_sheet(&dependency_sheet)?;
            let canonical = canonicalize(reference, &dependency_sheet)?;

            let (target, rects) = if is_range(&canonical) {
                let rect = RangeRect::parse(&canonical, &dependency_sheet)?;
                let table = rect.to_string();
                let resolved = self.resolve_dependency(&ast, index, rect);
                let range_address = resolved.address();
                if range_address != table {
                    spreadsheet.register_narrowed_table(table);
                }
                if !seen.insert(range_address.clone()) {
                    continue;
                }
                if let Some(existing) = spreadsheet.node_id(&range_address) {
                    spreadsheet.add_edge(existing, id);
                    continue;
                }
                let range = CellRange::new(range_address, resolved.addresses);
                let range_id = spreadsheet.insert(Node::Range(range));
                spreadsheet.add_edge(range_id, id);
                (range_id, resolved.rects)
            } else {
                if !seen.insert(canonical.clone()) {
                    continue;
                }
                (id, vec![RangeRect::parse(&canonical, &dependency_sheet)?])
            };

            for rect in &rects {
                self.add_constituents(spreadsheet, todo, rect, target)?;
            }
        }
        self.workbook.set_sheet(sheet)?;
        Ok(())
    }

    /// Link every cell of `rect` to `target`, creating the cells not yet in the graph
    fn add_constituents(
        &self,
        spreadsheet: &mut Spreadsheet,
        todo: &mut Vec<NodeId>,
        rect: &RangeRect,
        target: NodeId,
    ) -> Result<()> {
        let ncols = rect.ncols();
        let mut data: Option<RangeData> = None;
        for (offset, cell) in rect.cells().enumerate() {
            let id = match spreadsheet.node_id(&cell.to_string()) {
                Some(id) => id,
                None => {
                    if data.is_none() {
                        data = Some(self.read(rect)?);
                    }
                    let (formula, value, format) = match &data {
                        Some(data) => data.get(offset / ncols, offset % ncols),
                        None => (None, None, None),
                    };
                    let node = self.new_cell(
                        &cell,
                        formula,
                        value.cloned().unwrap_or_default(),
                        format,
                    );
                    let id = spreadsheet.insert(Node::Cell(node));
                    if formula.is_some() {
                        todo.push(id);
                    }
                    id
                }
            };
            spreadsheet.add_edge(id, target);
        }
        Ok(())
    }

    fn read(&self, rect: &RangeRect) -> Result<RangeData> {
        let address = rect.to_string();
        let data = self.workbook.get_range(&address)?;
        data.check_shape(&address, rect.nrows(), rect.ncols())?;
        Ok(data)
    }

    fn new_cell(
        &self,
        cell: &CellRef,
        formula: Option<&str>,
        value: CellValue,
        format: Option<&NumberFormat>,
    ) -> Cell {
        let format = format.cloned().unwrap_or_default();
        let value = FormulaValue::from(value);
        match formula {
            Some(formula) => {
                let dirty = !self.options.trust_cached_values || value == FormulaValue::Empty;
                Cell::formula(cell.to_string(), &cell.sheet, formula, value, format, dirty)
            }
            None => Cell::constant(cell.to_string(), &cell.sheet, value, format),
        }
    }

    fn resolve_dependency(&self, ast: &Ast, index: NodeIndex, rect: RangeRect) -> ResolvedRange {
        if self.options.narrow_lookups {
            if let Some(narrowed) = narrow_lookup(ast, index, &rect) {
                return narrowed;
            }
        }
        ResolvedRange::from_rect(rect)
    }
}

/// The key and result slices of a VLOOKUP/HLOOKUP table with a literal index
///
/// Only the table argument narrows; the slices are taken by position within the table.
fn narrow_lookup(ast: &Ast, index: NodeIndex, rect: &RangeRect) -> Option<ResolvedRange> {
    let node = ast.node(index);
    let parent_index = node.parent?;
    let parent = ast.node(parent_index);
    if parent.kind != NodeKind::Function || node.position != 1 {
        return None;
    }
    let vertical = match strip_xlfn(parent.value()).to_ascii_uppercase().as_str() {
        "VLOOKUP" => true,
        "HLOOKUP" => false,
        _ => return None,
    };

    let literal = ast
        .child_at(parent_index, 2)
        .filter(|c| c.kind == NodeKind::Operand && c.token.subkind == TokenSubkind::Number)
        .and_then(|c| c.value().parse::<f64>().ok())
        .filter(|n| n.fract() == 0.0 && *n >= 1.0);
    let Some(position) = literal else {
        log::info!(
            "Lookup index for {} is not a literal, using the full range",
            rect
        );
        return None;
    };
    let position = position as usize;

    let (key, result) = if vertical {
        (rect.column_slice(1)?, rect.column_slice(position))
    } else {
        (rect.row_slice(1)?, rect.row_slice(position))
    };
    let Some(result) = result else {
        log::info!(
            "Lookup index {} lies outside {}, using the full range",
            position,
            rect
        );
        return None;
    };

    log::debug!("Narrowing {} to {} and {}", rect, key, result);
    Some(if position == 1 {
        ResolvedRange::from_rect(key)
    } else if vertical {
        ResolvedRange::paired_columns(key, result)
    } else {
        ResolvedRange::paired_rows(key, result)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xlgraph_core::MemoryWorkbook;

    fn lookup_workbook(formula: &str) -> MemoryWorkbook {
        let mut workbook = MemoryWorkbook::new();
        let sheet = workbook.add_sheet("S");
        for row in 1..=100 {
            sheet.set_cell_value(&format!("A{}", row), row as f64).unwrap();
            sheet
                .set_cell_value(&format!("B{}", row), format!("b{}", row))
                .unwrap();
            sheet
                .set_cell_value(&format!("C{}", row), row as f64 * 10.0)
                .unwrap();
        }
        sheet.set_cell_formula("E1", formula).unwrap();
        workbook
    }

    #[test]
    fn test_seed_prunes_blank_cells() {
        let mut workbook = MemoryWorkbook::new();
        let sheet = workbook.add_sheet("S");
        sheet.set_cell_value("A1", 1.0).unwrap();
        sheet.set_cell_value("A3", "x").unwrap();
        sheet.set_cell_value("B4", 0.0).unwrap();
        let ss = GraphBuilder::new(&mut workbook).build("S", "A1:A4").unwrap();
        assert_eq!(ss.len(), 2);
        assert!(ss.contains("A1"));
        assert!(!ss.contains("A2"));
        assert!(ss.contains("A3"));
    }

    #[test]
    fn test_references_are_deduplicated() {
        let mut workbook = MemoryWorkbook::new();
        let sheet = workbook.add_sheet("S");
        sheet.set_cell_value("A1", 1.0).unwrap();
        sheet.set_cell_value("A2", 2.0).unwrap();
        sheet.set_cell_formula("B1", "=SUM(A1:A2)+$A$1+A1").unwrap();
        sheet.set_cell_formula("B2", "=SUM($A$1:$A$2)").unwrap();
        let ss = GraphBuilder::new(&mut workbook).build("S", "B1:B2").unwrap();

        // B1, B2, the range, A1, A2
        assert_eq!(ss.len(), 5);
        assert_eq!(ss.range_count(), 1);
        assert_eq!(
            ss.dependents("S!A1:A2").unwrap(),
            vec!["S!B1".to_string(), "S!B2".to_string()]
        );
        assert_eq!(
            ss.precedents("B1").unwrap(),
            vec!["S!A1".to_string(), "S!A1:A2".to_string()]
        );
        // A1 -> range, A2 -> range, range -> B1, range -> B2, A1 -> B1
        assert_eq!(ss.edge_count(), 5);
    }

    #[test]
    fn test_vlookup_narrows_to_two_columns() {
        let mut workbook = lookup_workbook("=VLOOKUP(7,A1:C100,3)");
        let mut ss = GraphBuilder::new(&mut workbook).build("S", "E1").unwrap();

        assert!(ss.node("S!A1:C100").is_none());
        let range = ss.node("S!A1:A100;S!C1:C100").unwrap().as_range().unwrap();
        assert_eq!((range.nrows(), range.ncols()), (100, 2));
        assert_eq!(range.cells()[0], vec!["S!A1".to_string(), "S!C1".to_string()]);
        assert!(!ss.contains("B1"));
        assert_eq!(ss.evaluate("E1").unwrap(), FormulaValue::Number(70.0));
    }

    #[test]
    fn test_narrowed_table_reads_through_full_address() {
        use xlgraph_formula::Runtime;

        let mut workbook = lookup_workbook("=VLOOKUP(7,A1:C100,3)");
        let mut ss = GraphBuilder::new(&mut workbook).build("S", "E1").unwrap();
        let table = Runtime::eval_range(&mut ss, "S!A1:C100").unwrap();
        assert_eq!(table.address(), "S!A1:C100");
        assert!(Runtime::eval_range(&mut ss, "S!A1:B100").is_err());
    }

    #[test]
    fn test_lookup_without_literal_index_uses_full_range() {
        let mut workbook = lookup_workbook("=VLOOKUP(7,A1:C100,A1+1)");
        let mut ss = GraphBuilder::new(&mut workbook).build("S", "E1").unwrap();
        assert!(ss.node("S!A1:C100").is_some());
        assert!(ss.contains("B50"));
        assert_eq!(ss.evaluate("E1").unwrap(), FormulaValue::from("b7"));
    }

    #[test]
    fn test_narrowing_can_be_disabled() {
        let mut workbook = lookup_workbook("=VLOOKUP(7,A1:C100,3)");
        let ss = GraphBuilder::new(&mut workbook)
            .with_options(BuildOptions::default().with_narrow_lookups(false))
            .build("S", "E1")
            .unwrap();
        assert!(ss.node("S!A1:C100").is_some());
        assert_eq!(ss.range_count(), 1);
    }

    #[test]
    fn test_hlookup_narrows_to_two_rows() {
        let mut workbook = MemoryWorkbook::new();
        let sheet = workbook.add_sheet("S");
        for (col, key) in ["A", "B", "C"].iter().zip(["x", "y", "z"]) {
            sheet.set_cell_value(&format!("{}1", col), key).unwrap();
            sheet.set_cell_value(&format!("{}2", col), 1.0).unwrap();
            sheet.set_cell_value(&format!("{}3", col), 2.0).unwrap();
        }
        sheet.set_cell_formula("A5", "=HLOOKUP(\"y\",A1:C3,3)").unwrap();
        let mut ss = GraphBuilder::new(&mut workbook).build("S", "A5").unwrap();
        assert!(ss.node("S!A1:C1;S!A3:C3").is_some());
        assert!(!ss.contains("B2"));
        assert_eq!(ss.evaluate("A5").unwrap(), FormulaValue::Number(2.0));
    }

    #[test]
    fn test_shorthand_range_follows_referenced_sheet() {
        let mut workbook = MemoryWorkbook::new();
        workbook
            .add_sheet("Main")
            .set_cell_formula("A1", "=SUM(Data!B:B)")
            .unwrap();
        let data = workbook.add_sheet("Data");
        for row in 1..=4 {
            data.set_cell_value(&format!("B{}", row), row as f64).unwrap();
        }
        let mut ss = GraphBuilder::new(&mut workbook).build("Main", "A1").unwrap();
        assert!(ss.node("Data!B1:B4").is_some());
        assert_eq!(ss.evaluate("A1").unwrap(), FormulaValue::Number(10.0));
        assert_eq!(workbook.active_sheet(), "Main");
    }

    #[test]
    fn test_sheet_context_resets_per_reference() {
        let mut workbook = MemoryWorkbook::new();
        let main = workbook.add_sheet("Main");
        main.set_cell_value("B1", 1.0).unwrap();
        main.set_cell_formula("A1", "=Other!B1+B1").unwrap();
        workbook.add_sheet("Other").set_cell_value("B1", 10.0).unwrap();
        let mut ss = GraphBuilder::new(&mut workbook).build("Main", "A1").unwrap();
        assert_eq!(
            ss.precedents("A1").unwrap(),
            vec!["Main!B1".to_string(), "Other!B1".to_string()]
        );
        assert_eq!(ss.evaluate("A1").unwrap(), FormulaValue::Number(11.0));
    }

    #[test]
    fn test_compile_failure_aborts_build() {
        let mut workbook = MemoryWorkbook::new();
        let sheet = workbook.add_sheet("S");
        sheet.set_cell_formula("A1", "=B1+1").unwrap();
        sheet.set_cell_formula("B1", "=IF(1)").unwrap();
        let err = GraphBuilder::new(&mut workbook).build("S", "A1").unwrap_err();
        match err {
            Error::Build { address, todo, .. } => {
                assert_eq!(address, "S!B1");
                assert_eq!(todo, 0);
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
