//! Tests for building and evaluating spreadsheets

use pretty_assertions::assert_eq;
use xlgraph::prelude::*;

fn number(value: FormulaValue) -> f64 {
    match value {
        FormulaValue::Number(n) => n,
        other => panic!("expected a number, got {:?}", other),
    }
}

fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-9
}

/// A formula with no references
#[test]
fn test_constant_formula() {
    let mut workbook = MemoryWorkbook::new();
    workbook
        .add_sheet("Sheet1")
        .set_cell_formula("A1", "=1+2")
        .unwrap();

    let mut ss = GraphBuilder::new(&mut workbook)
        .build("Sheet1", "A1")
        .unwrap();
    assert_eq!(ss.evaluate("A1").unwrap(), FormulaValue::Number(3.0));
    assert_eq!(ss.len(), 1);
    assert_eq!(ss.edge_count(), 0);
}

/// A formula over constant cells
#[test]
fn test_formula_over_constants() {
    let mut workbook = MemoryWorkbook::new();
    let sheet = workbook.add_sheet("Sheet1");
    sheet.set_cell_value("A1", 2.0).unwrap();
    sheet.set_cell_value("A2", 3.0).unwrap();
    sheet.set_cell_formula("A3", "=A1+A2").unwrap();

    let mut ss = GraphBuilder::new(&mut workbook)
        .build("Sheet1", "A3")
        .unwrap();
    assert_eq!(ss.evaluate("A3").unwrap(), FormulaValue::Number(5.0));
    assert_eq!(
        ss.dependents("A1").unwrap(),
        vec!["Sheet1!A3".to_string()]
    );
}

/// Reading a clean cell twice returns the cached value without recomputation
#[test]
fn test_clean_reads_are_idempotent() {
    let mut workbook = MemoryWorkbook::new();
    let sheet = workbook.add_sheet("S");
    sheet.set_cell_value("A1", 4.0).unwrap();
    sheet.set_cell_formula("B1", "=SQRT(A1)").unwrap();

    let mut ss = GraphBuilder::new(&mut workbook).build("S", "B1").unwrap();
    let first = ss.evaluate("B1").unwrap();
    assert!(!ss.cell("B1").unwrap().is_dirty());
    assert!(!ss.cell("A1").unwrap().is_dirty());

    let second = ss.evaluate("B1").unwrap();
    assert_eq!(first, second);
    assert_eq!(second, FormulaValue::Number(2.0));
}

/// Every cell downstream of an assignment recomputes from the new value
#[test]
fn test_set_value_invalidates_closure() {
    let mut workbook = MemoryWorkbook::new();
    let sheet = workbook.add_sheet("S");
    sheet.set_cell_value("A1", 1.0).unwrap();
    sheet.set_cell_value("A2", 2.0).unwrap();
    sheet.set_cell_formula("B1", "=SUM(A1:A2)").unwrap();
    sheet.set_cell_formula("C1", "=B1*10").unwrap();
    sheet.set_cell_formula("D1", "=A2").unwrap();

    let mut ss = GraphBuilder::new(&mut workbook)
        .build("S", "C1:D1")
        .unwrap();
    assert_eq!(ss.evaluate("C1").unwrap(), FormulaValue::Number(30.0));
    assert_eq!(ss.evaluate("D1").unwrap(), FormulaValue::Number(2.0));

    ss.set_value("A1", 5.0).unwrap();
    assert!(ss.cell("B1").unwrap().is_dirty());
    assert!(ss.cell("C1").unwrap().is_dirty());
    assert!(!ss.cell("D1").unwrap().is_dirty());
    assert_eq!(ss.evaluate("C1").unwrap(), FormulaValue::Number(70.0));

    ss.set_value("A2", "text").unwrap();
    assert_eq!(ss.evaluate("C1").unwrap(), FormulaValue::Number(50.0));
    assert_eq!(ss.evaluate("D1").unwrap(), FormulaValue::from("text"));
}

/// Assigning the current value of a clean cell changes nothing
#[test]
fn test_set_same_value_keeps_cache() {
    let mut workbook = MemoryWorkbook::new();
    let sheet = workbook.add_sheet("S");
    sheet.set_cell_value("A1", 1.0).unwrap();
    sheet.set_cell_formula("B1", "=A1+1").unwrap();

    let mut ss = GraphBuilder::new(&mut workbook).build("S", "B1").unwrap();
    ss.evaluate("B1").unwrap();
    ss.set_value("A1", 1.0).unwrap();
    assert!(!ss.cell("B1").unwrap().is_dirty());
}

/// Error values flow through arithmetic, concatenation and comparisons unchanged
#[test]
fn test_error_propagation() {
    let mut workbook = MemoryWorkbook::new();
    let sheet = workbook.add_sheet("S");
    sheet.set_cell_formula("A1", "=1/0").unwrap();
    sheet.set_cell_formula("B1", "=A1+1").unwrap();
    sheet.set_cell_formula("B2", "=A1&\"x\"").unwrap();
    sheet.set_cell_formula("B3", "=IF(A1>0,1,2)").unwrap();
    sheet.set_cell_formula("B4", "=IFERROR(A1,-1)").unwrap();

    let mut ss = GraphBuilder::new(&mut workbook).build("S", "B1:B4").unwrap();
    let div0 = FormulaValue::Error(CellError::Div0);
    assert_eq!(ss.evaluate("B1").unwrap(), div0);
    assert_eq!(ss.evaluate("B2").unwrap(), div0);
    assert_eq!(ss.evaluate("B3").unwrap(), div0);
    assert_eq!(ss.evaluate("B4").unwrap(), FormulaValue::Number(-1.0));
}

/// Two cells reading each other fail with a circular reference
#[test]
fn test_circular_reference() {
    let mut workbook = MemoryWorkbook::new();
    let sheet = workbook.add_sheet("S");
    sheet.set_cell_formula("A1", "=B1").unwrap();
    sheet.set_cell_formula("B1", "=A1").unwrap();

    let mut ss = GraphBuilder::new(&mut workbook).build("S", "A1").unwrap();
    assert!(ss.has_circular_reference("A1").unwrap());

    let err = ss.evaluate("A1").unwrap_err();
    assert!(err.is_circular_reference());
    match err.formula_error() {
        Some(FormulaError::CircularReference { cell, call_stack }) => {
            assert_eq!(cell, "S!A1");
            assert_eq!(call_stack, "  S!A1\n  S!B1");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // Nothing is left half-evaluated
    assert!(ss.cell("A1").unwrap().is_dirty());
    assert!(ss.cell("B1").unwrap().is_dirty());
    assert_eq!(ss.call_stack(), "");
    assert!(ss.evaluate("B1").unwrap_err().is_circular_reference());
}

/// A circular chain broken by an assignment evaluates again
#[test]
fn test_assignment_breaks_cycle() {
    let mut workbook = MemoryWorkbook::new();
    let sheet = workbook.add_sheet("S");
    sheet.set_cell_formula("A1", "=B1+1").unwrap();
    sheet.set_cell_formula("B1", "=A1+1").unwrap();

    let mut ss = GraphBuilder::new(&mut workbook).build("S", "A1").unwrap();
    assert!(ss.evaluate("A1").is_err());
    ss.set_value("B1", 1.0).unwrap();
    assert_eq!(ss.evaluate("A1").unwrap(), FormulaValue::Number(2.0));
}

/// Whole-column references are clamped to the used rows
#[test]
fn test_shorthand_range_is_clamped() {
    let mut workbook = MemoryWorkbook::new();
    let sheet = workbook.add_sheet("S");
    for row in 1..=50 {
        sheet.set_cell_value(&format!("E{}", row), 1.0).unwrap();
    }
    sheet.set_cell_value("G1", 2.0).unwrap();
    sheet.set_cell_formula("A1", "=SUM(E:G)").unwrap();

    let mut ss = GraphBuilder::new(&mut workbook).build("S", "A1").unwrap();
    assert!(ss.node("S!E1:G50").is_some());
    assert_eq!(ss.range_count(), 1);
    assert_eq!(ss.evaluate("A1").unwrap(), FormulaValue::Number(52.0));
}

/// Lookups register only the key and result columns of their table
#[test]
fn test_vlookup_narrowing() {
    let mut workbook = MemoryWorkbook::new();
    let sheet = workbook.add_sheet("S");
    for row in 1..=100 {
        sheet.set_cell_value(&format!("A{}", row), row as f64).unwrap();
        sheet
            .set_cell_value(&format!("B{}", row), row as f64 * 2.0)
            .unwrap();
    }
    sheet.set_cell_value("D1", 42.0).unwrap();
    sheet.set_cell_formula("D2", "=VLOOKUP(D1,A1:B100,2)").unwrap();

    let mut ss = GraphBuilder::new(&mut workbook).build("S", "D2").unwrap();
    assert!(ss.node("S!A1:B100").is_none());
    assert!(ss.node("S!A1:A100;S!B1:B100").is_some());
    assert_eq!(ss.range_count(), 1);
    assert_eq!(ss.evaluate("D2").unwrap(), FormulaValue::Number(84.0));

    ss.set_value("B42", 0.5).unwrap();
    assert!(ss.cell("D2").unwrap().is_dirty());
    assert_eq!(ss.evaluate("D2").unwrap(), FormulaValue::Number(0.5));

    ss.set_value("D1", 500.0).unwrap();
    assert_eq!(ss.evaluate("D2").unwrap(), FormulaValue::Error(CellError::Na));
}

/// Results are rounded to the decimals of their number format
#[test]
fn test_number_format_rounding() {
    let mut workbook = MemoryWorkbook::new();
    let sheet = workbook.add_sheet("S");
    sheet.set_cell_value("A1", 10.0).unwrap();
    sheet.set_cell_formula("B1", "=A1/3").unwrap();
    sheet.set_number_format("B1", "#,##0.000").unwrap();
    sheet.set_cell_formula("B2", "=A1/3").unwrap();
    sheet.set_number_format("B2", "0").unwrap();
    sheet.set_cell_formula("B3", "=A1/3").unwrap();

    let mut ss = GraphBuilder::new(&mut workbook).build("S", "B1:B3").unwrap();
    assert!(close(number(ss.evaluate("B1").unwrap()), 3.333));
    assert!(close(number(ss.evaluate("B2").unwrap()), 10.0 / 3.0));
    assert!(close(number(ss.evaluate("B3").unwrap()), 10.0 / 3.0));
}

/// Neighbouring LINEST cells with the same formula share one polynomial fit
#[test]
fn test_linest_siblings() {
    let mut workbook = MemoryWorkbook::new();
    let sheet = workbook.add_sheet("S");
    for row in 1..=5 {
        let x = row as f64;
        sheet
            .set_cell_value(&format!("A{}", row), x * x + 2.0 * x + 3.0)
            .unwrap();
        sheet.set_cell_value(&format!("B{}", row), x).unwrap();
    }
    for address in ["D1", "E1", "F1"] {
        sheet
            .set_cell_formula(address, "=LINEST(A1:A5,B1:B5)")
            .unwrap();
    }
    sheet.set_cell_formula("D3", "=LINEST(A1:A5,B1:B5)").unwrap();

    let mut ss = GraphBuilder::new(&mut workbook).build("S", "D1:F3").unwrap();
    assert!(close(number(ss.evaluate("D1").unwrap()), 1.0));
    assert!(close(number(ss.evaluate("E1").unwrap()), 2.0));
    assert!(close(number(ss.evaluate("F1").unwrap()), 3.0));
    // A lone cell fits a straight line and returns its slope
    assert!(close(number(ss.evaluate("D3").unwrap()), 8.0));
}

/// Seeds across sheets share one graph
#[test]
fn test_build_many_sheets() {
    let mut workbook = MemoryWorkbook::new();
    let inputs = workbook.add_sheet("Inputs");
    inputs.set_cell_value("A1", 100.0).unwrap();
    inputs.set_cell_value("A2", 0.25).unwrap();
    let model = workbook.add_sheet("Model");
    model.set_cell_formula("B1", "=Inputs!A1*Inputs!A2").unwrap();
    model.set_cell_formula("B2", "=B1+Inputs!A1").unwrap();

    let mut ss = GraphBuilder::new(&mut workbook)
        .build_many(&[("Inputs", "A1:A2"), ("Model", "B1:B2")])
        .unwrap();
    assert_eq!(ss.default_sheet(), "Inputs");
    assert_eq!(ss.len(), 4);
    assert_eq!(ss.evaluate("Model!B2").unwrap(), FormulaValue::Number(125.0));

    ss.set_value("A1", 200.0).unwrap();
    assert_eq!(ss.evaluate("Model!$B$2").unwrap(), FormulaValue::Number(250.0));
    assert_eq!(workbook.active_sheet(), "Inputs");
}

/// Cached workbook values are used when trusted
#[test]
fn test_trust_cached_values() {
    let mut workbook = MemoryWorkbook::new();
    let sheet = workbook.add_sheet("S");
    sheet.set_cell_value("A1", 1.0).unwrap();
    sheet.set_cell_formula_with_value("B1", "=A1+1", 99.0).unwrap();
    sheet.set_cell_formula_with_value("C1", "=B1+1", 7.0).unwrap();

    let mut trusting = GraphBuilder::new(&mut workbook)
        .with_options(BuildOptions::default().with_trust_cached_values(true))
        .build("S", "C1")
        .unwrap();
    assert_eq!(trusting.evaluate("C1").unwrap(), FormulaValue::Number(7.0));
    trusting.set_value("A1", 2.0).unwrap();
    assert_eq!(trusting.evaluate("C1").unwrap(), FormulaValue::Number(4.0));

    let mut fresh = GraphBuilder::new(&mut workbook).build("S", "C1").unwrap();
    assert_eq!(fresh.evaluate("C1").unwrap(), FormulaValue::Number(3.0));
}

/// Evaluating a range node yields its cells as an array
#[test]
fn test_evaluate_range_node() {
    let mut workbook = MemoryWorkbook::new();
    let sheet = workbook.add_sheet("S");
    sheet.set_cell_value("A1", 1.0).unwrap();
    sheet.set_cell_formula("A2", "=A1*3").unwrap();
    sheet.set_cell_formula("B1", "=SUM(A1:A2)").unwrap();

    let mut ss = GraphBuilder::new(&mut workbook).build("S", "B1").unwrap();
    assert_eq!(
        ss.evaluate("A1:A2").unwrap(),
        FormulaValue::Array(vec![
            vec![FormulaValue::Number(1.0)],
            vec![FormulaValue::Number(3.0)],
        ])
    );
    assert!(ss.set_value("A1:A2", 1.0).is_err());
}
