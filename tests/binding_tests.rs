//! Read-side binding tests: series, points, categories and chart typing
//! resolved through `Document::chart`.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

mod fixtures;

use chartbind::{
    BindOptions, ChartBindError, ChartId, ChartKind, ChartTypeTag, Document, SheetAddress,
};
use fixtures::{ChartXmlBuilder, PackageBuilder, SeriesBuilder, XlsxBuilder};

// ============================================================================
// Helpers
// ============================================================================

fn sales_workbook() -> Vec<u8> {
    XlsxBuilder::new()
        .add_sheet("Sheet1")
        .add_cell("B1", "Sales")
        .add_cell("C1", "Target")
        .add_cell("A2", "Q1")
        .add_cell("B2", 10)
        .add_cell("C2", 12)
        .add_cell("A3", "Q2")
        .add_cell("B3", 20)
        .add_cell("C3", 18)
        .add_cell("A4", "Q3")
        .add_cell("B4", 30)
        .add_cell("C4", 28)
        .build()
}

fn sales_series(col: &str, name: &str, cached: Option<&[f64]>) -> SeriesBuilder {
    SeriesBuilder::new()
        .name_ref(&format!("Sheet1!${col}$1"), Some(name))
        .cat_ref("Sheet1!$A$2:$A$4", Some(&["Q1", "Q2", "Q3"]))
        .val_ref(&format!("Sheet1!${col}$2:${col}$4"), cached)
}

fn open(chart: String, workbook: Option<Vec<u8>>) -> Document {
    Document::open(PackageBuilder::new().chart(chart, workbook).build()).unwrap()
}

fn combo_document() -> Document {
    let chart = ChartXmlBuilder::new()
        .title("Quarterly Sales")
        .block(
            "barChart",
            vec![sales_series("B", "Sales", Some(&[10.0, 20.0, 30.0]))],
        )
        .block(
            "lineChart",
            vec![sales_series("C", "Target", Some(&[12.0, 18.0, 28.0]))],
        )
        .external_data("rId1")
        .build();
    open(chart, Some(sales_workbook()))
}

// ============================================================================
// Chart typing
// ============================================================================

#[test]
fn test_combination_chart_typing() {
    let mut doc = combo_document();
    let mut chart = doc.chart(ChartId(0)).unwrap();

    assert_eq!(chart.kind().unwrap(), ChartKind::Combination);
    let groups = chart.series_groups().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].chart_type, ChartTypeTag::Bar);
    assert_eq!(groups[1].chart_type, ChartTypeTag::Line);

    let series = chart.series().unwrap();
    assert_eq!(series[0].chart_type, ChartTypeTag::Bar);
    assert_eq!(series[1].chart_type, ChartTypeTag::Line);
}

#[test]
fn test_single_block_kind() {
    let chart = ChartXmlBuilder::new()
        .block("pieChart", vec![SeriesBuilder::new().val_literal(&[1.0, 2.0])])
        .build();
    let mut doc = open(chart, None);
    let chart = doc.chart(ChartId(0)).unwrap();
    assert_eq!(chart.kind().unwrap(), ChartKind::Single(ChartTypeTag::Pie));
    assert!(!chart.kind().unwrap().is_combination());
}

#[test]
fn test_chart_without_typed_block() {
    let chart = ChartXmlBuilder::new().build();
    let mut doc = open(chart, None);
    let mut chart = doc.chart(ChartId(0)).unwrap();
    assert!(matches!(
        chart.kind(),
        Err(ChartBindError::UnresolvableReference(_))
    ));
    assert!(chart.series().unwrap().is_empty());
    assert_eq!(chart.categories().unwrap(), None);
}

// ============================================================================
// Series and points
// ============================================================================

#[test]
fn test_series_names_and_values() {
    let mut doc = combo_document();
    let mut chart = doc.chart(ChartId(0)).unwrap();
    let series = chart.series().unwrap();

    assert_eq!(series[0].name.as_deref(), Some("Sales"));
    assert_eq!(series[0].name_binding, Some(SheetAddress::new("Sheet1", "B1")));
    assert_eq!(series[0].values(), vec![10.0, 20.0, 30.0]);
    assert_eq!(series[1].name.as_deref(), Some("Target"));
    assert_eq!(series[1].values(), vec![12.0, 18.0, 28.0]);
}

#[test]
fn test_point_bindings_follow_range_order() {
    let mut doc = combo_document();
    let mut chart = doc.chart(ChartId(0)).unwrap();
    let series = chart.series().unwrap();
    let bindings: Vec<_> = series[0]
        .points
        .iter()
        .map(|p| p.binding.clone().unwrap().cell)
        .collect();
    assert_eq!(bindings, vec!["B2", "B3", "B4"]);
}

#[test]
fn test_cached_reads_do_not_open_workbook() {
    let mut doc = combo_document();
    {
        let mut chart = doc.chart(ChartId(0)).unwrap();
        chart.series().unwrap();
        chart.categories().unwrap();
    }
    assert_eq!(doc.open_workbooks(), 0);
}

#[test]
fn test_cache_wins_over_workbook() {
    let workbook = XlsxBuilder::new()
        .add_sheet("Sheet1")
        .add_cell("B2", 99)
        .add_cell("B3", 98)
        .build();
    let chart = ChartXmlBuilder::new()
        .block(
            "barChart",
            vec![SeriesBuilder::new().val_ref("Sheet1!$B$2:$B$3", Some(&[1.0, 2.0]))],
        )
        .external_data("rId1")
        .build();
    let mut doc = open(chart, Some(workbook));
    let mut chart = doc.chart(ChartId(0)).unwrap();
    assert_eq!(chart.series().unwrap()[0].values(), vec![1.0, 2.0]);
}

#[test]
fn test_formula_only_values_open_workbook_once() {
    let chart = ChartXmlBuilder::new()
        .block(
            "barChart",
            vec![
                sales_series("B", "Sales", None),
                sales_series("C", "Target", None),
            ],
        )
        .external_data("rId1")
        .build();
    let mut doc = open(chart, Some(sales_workbook()));
    {
        let mut chart = doc.chart(ChartId(0)).unwrap();
        let series = chart.series().unwrap();
        assert_eq!(series[0].values(), vec![10.0, 20.0, 30.0]);
        assert_eq!(series[1].values(), vec![12.0, 18.0, 28.0]);
    }
    assert_eq!(doc.open_workbooks(), 1);
    {
        let mut chart = doc.chart(ChartId(0)).unwrap();
        chart.series().unwrap();
    }
    assert_eq!(doc.open_workbooks(), 1);
}

#[test]
fn test_blank_workbook_cells_read_as_zero() {
    let workbook = XlsxBuilder::new()
        .add_sheet("Sheet1")
        .add_cell("B2", 5)
        .add_cell("B4", 7)
        .build();
    let chart = ChartXmlBuilder::new()
        .block(
            "lineChart",
            vec![SeriesBuilder::new().val_ref("Sheet1!$B$2:$B$4", None)],
        )
        .external_data("rId1")
        .build();
    let mut doc = open(chart, Some(workbook));
    let mut chart = doc.chart(ChartId(0)).unwrap();
    assert_eq!(chart.series().unwrap()[0].values(), vec![5.0, 0.0, 7.0]);
}

#[test]
fn test_points_round_to_configured_precision() {
    let chart = ChartXmlBuilder::new()
        .block(
            "barChart",
            vec![SeriesBuilder::new().val_literal(&[1.23456, 2.5])],
        )
        .build();
    let package = PackageBuilder::new().chart(chart, None).build();

    let mut doc = Document::open(package.clone()).unwrap();
    let mut default_chart = doc.chart(ChartId(0)).unwrap();
    assert_eq!(default_chart.series().unwrap()[0].values(), vec![1.23, 2.5]);

    let options = BindOptions {
        point_precision: 0,
        ..BindOptions::default()
    };
    let mut doc = Document::open_with_options(package, options).unwrap();
    let mut chart = doc.chart(ChartId(0)).unwrap();
    assert_eq!(chart.series().unwrap()[0].values(), vec![1.0, 3.0]);
}

#[test]
fn test_literal_series_name_has_no_binding() {
    let chart = ChartXmlBuilder::new()
        .block(
            "barChart",
            vec![
                SeriesBuilder::new().name_literal("Budget").val_literal(&[1.0]),
                SeriesBuilder::new().val_literal(&[2.0]),
            ],
        )
        .build();
    let mut doc = open(chart, None);
    let mut chart = doc.chart(ChartId(0)).unwrap();
    let series = chart.series().unwrap();
    assert_eq!(series[0].name.as_deref(), Some("Budget"));
    assert!(series[0].name_binding.is_none());
    assert!(series[0].points[0].binding.is_none());
    assert!(!series[1].has_name());
}

#[test]
fn test_sparse_cache_pairs_positionally() {
    // Three addresses, two cached points: the third address is dropped.
    let chart = ChartXmlBuilder::new()
        .block(
            "barChart",
            vec![SeriesBuilder::new().val_ref("Sheet1!$B$2:$B$4", Some(&[4.0, 5.0]))],
        )
        .build();
    let mut doc = open(chart, None);
    let mut chart = doc.chart(ChartId(0)).unwrap();
    let points = chart.series().unwrap().remove(0).points;
    assert_eq!(points.len(), 2);
    assert_eq!(points[1].binding, Some(SheetAddress::new("Sheet1", "B3")));
}

// ============================================================================
// Categories
// ============================================================================

#[test]
fn test_flat_categories_with_bindings() {
    let mut doc = combo_document();
    let mut chart = doc.chart(ChartId(0)).unwrap();
    let categories = chart.categories().unwrap().unwrap().to_vec();

    let names: Vec<_> = categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Q1", "Q2", "Q3"]);
    assert!(categories.iter().all(|c| c.parent.is_none()));
    assert_eq!(
        categories[2].binding,
        Some(SheetAddress::new("Sheet1", "A4"))
    );
}

#[test]
fn test_literal_categories() {
    let chart = ChartXmlBuilder::new()
        .block(
            "barChart",
            vec![SeriesBuilder::new()
                .cat_literal(&["North", "South"])
                .val_literal(&[1.0, 2.0])],
        )
        .build();
    let mut doc = open(chart, None);
    let mut chart = doc.chart(ChartId(0)).unwrap();
    let categories = chart.categories().unwrap().unwrap();
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[1].name, "South");
    assert!(categories[1].binding.is_none());
}

#[test]
fn test_multi_level_categories_from_cache() {
    let levels: &[&[(u32, &str)]] = &[
        &[(0, "Dresses"), (1, "Shirts"), (2, "Belts")],
        &[(0, "Clothing"), (2, "Accessories")],
    ];
    let chart = ChartXmlBuilder::new()
        .block(
            "barChart",
            vec![SeriesBuilder::new()
                .cat_multi_level("Sheet1!$A$2:$B$4", 3, Some(levels))
                .val_literal(&[1.0, 2.0, 3.0])],
        )
        .build();
    let mut doc = open(chart, None);
    let mut chart = doc.chart(ChartId(0)).unwrap();
    assert!(chart.is_multi_level());

    let categories = chart.categories().unwrap().unwrap();
    let pairs: Vec<_> = categories
        .iter()
        .map(|c| (c.name.as_str(), c.parent_name()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("Dresses", Some("Clothing")),
            ("Shirts", Some("Clothing")),
            ("Belts", Some("Accessories")),
        ]
    );
}

#[test]
fn test_multi_level_categories_from_workbook() {
    let workbook = XlsxBuilder::new()
        .add_sheet("Sheet1")
        .add_cell("A2", "Clothing")
        .add_cell("B2", "Dresses")
        .add_cell("B3", "Shirts")
        .add_cell("A4", "Accessories")
        .add_cell("B4", "Belts")
        .build();
    let chart = ChartXmlBuilder::new()
        .block(
            "barChart",
            vec![SeriesBuilder::new()
                .cat_multi_level("Sheet1!$A$2:$B$4", 3, None)
                .val_literal(&[1.0, 2.0, 3.0])],
        )
        .external_data("rId1")
        .build();
    let mut doc = open(chart, Some(workbook));
    let mut chart = doc.chart(ChartId(0)).unwrap();
    let categories = chart.categories().unwrap().unwrap();
    assert_eq!(categories.len(), 3);
    assert_eq!(categories[1].name, "Shirts");
    assert_eq!(categories[1].parent_name(), Some("Clothing"));
    assert_eq!(categories[2].parent_name(), Some("Accessories"));
}

// ============================================================================
// Scatter charts and x-values
// ============================================================================

#[test]
fn test_scatter_has_x_values_and_no_categories() {
    let chart = ChartXmlBuilder::new()
        .block(
            "scatterChart",
            vec![SeriesBuilder::new()
                .x_literal(&[1.26, 2.0, 3.04])
                .val_literal(&[10.0, 20.0, 30.0])],
        )
        .build();
    let mut doc = open(chart, None);
    let mut chart = doc.chart(ChartId(0)).unwrap();
    assert_eq!(chart.categories().unwrap(), None);
    assert_eq!(chart.x_values().unwrap(), vec![1.3, 2.0, 3.0]);
    assert_eq!(chart.series().unwrap()[0].values(), vec![10.0, 20.0, 30.0]);
}

#[test]
fn test_x_values_missing() {
    let mut doc = combo_document();
    let mut chart = doc.chart(ChartId(0)).unwrap();
    let err = chart.x_values().unwrap_err();
    assert!(
        matches!(&err, ChartBindError::UnresolvableReference(msg) if msg.contains("x-values")),
        "unexpected error: {err}"
    );
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_formula_only_without_workbook_is_unresolvable() {
    let chart = ChartXmlBuilder::new()
        .block(
            "barChart",
            vec![SeriesBuilder::new().val_ref("Sheet1!$B$2:$B$3", None)],
        )
        .build();
    let mut doc = open(chart, None);
    let mut chart = doc.chart(ChartId(0)).unwrap();
    assert!(!chart.has_workbook());
    assert!(matches!(
        chart.series(),
        Err(ChartBindError::UnresolvableReference(_))
    ));
}

#[test]
fn test_missing_sheet_is_unresolvable() {
    let chart = ChartXmlBuilder::new()
        .block(
            "barChart",
            vec![SeriesBuilder::new().val_ref("'Old Data'!$B$2", None)],
        )
        .external_data("rId1")
        .build();
    let mut doc = open(chart, Some(sales_workbook()));
    let mut chart = doc.chart(ChartId(0)).unwrap();
    let err = chart.series().unwrap_err();
    assert!(
        matches!(&err, ChartBindError::UnresolvableReference(msg) if msg.contains("Old Data")),
        "unexpected error: {err}"
    );
}

#[test]
fn test_malformed_formula_is_surfaced() {
    let chart = ChartXmlBuilder::new()
        .block(
            "barChart",
            vec![SeriesBuilder::new().val_ref("$B$2:$B$3", None)],
        )
        .external_data("rId1")
        .build();
    let mut doc = open(chart, Some(sales_workbook()));
    let mut chart = doc.chart(ChartId(0)).unwrap();
    assert!(matches!(
        chart.series(),
        Err(ChartBindError::MalformedFormula { formula }) if formula == "$B$2:$B$3"
    ));
}

#[test]
fn test_title() {
    let mut doc = combo_document();
    let chart = doc.chart(ChartId(0)).unwrap();
    assert_eq!(chart.title().as_deref(), Some("Quarterly Sales"));
}
