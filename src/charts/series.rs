//! Series and point resolution across every typed block of a plot area.

use serde::{Deserialize, Serialize};

use crate::cell_ref::SheetAddress;
use crate::config::{round_to, BindOptions};
use crate::error::Result;
use crate::value_ref::{CellSource, ValueReference};
use crate::xml_tree::XmlElement;

use super::types::ChartTypeTag;
use super::typed_blocks;

/// One plotted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub value: f64,
    /// Workbook cell an edit propagates to; `None` for cache-only points.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub binding: Option<SheetAddress>,
}

/// A series tagged with the type of the block it sits in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    /// Position across all blocks, in document order.
    pub index: usize,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name_binding: Option<SheetAddress>,
    pub chart_type: ChartTypeTag,
    pub points: Vec<Point>,
}

impl Series {
    pub fn has_name(&self) -> bool {
        self.name.is_some()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }
}

/// The series of one typed block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesGroup {
    pub chart_type: ChartTypeTag,
    pub series: Vec<Series>,
}

/// Resolve every typed block under the plot area, in document order.
pub(crate) fn resolve_groups(
    root: &XmlElement,
    source: &mut dyn CellSource,
    options: &BindOptions,
) -> Result<Vec<SeriesGroup>> {
    let mut groups = Vec::new();
    let mut index = 0;
    for (chart_type, block) in typed_blocks(root) {
        let mut series = Vec::new();
        for ser in block.children_named("ser") {
            series.push(resolve_series(ser, chart_type, index, source, options)?);
            index += 1;
        }
        groups.push(SeriesGroup { chart_type, series });
    }
    Ok(groups)
}

/// Resolve one `c:ser` element.
pub(crate) fn resolve_series(
    ser: &XmlElement,
    chart_type: ChartTypeTag,
    index: usize,
    source: &mut dyn CellSource,
    options: &BindOptions,
) -> Result<Series> {
    let (name, name_binding) = resolve_name(ser, source)?;

    let points = match ser
        .child(chart_type.value_element())
        .and_then(ValueReference::from_container)
    {
        Some(reference) => {
            let values = reference.resolve_numbers(source)?;
            let mut bindings = reference.bindings()?.into_iter();
            values
                .into_iter()
                .map(|value| Point {
                    value: round_to(value, options.point_precision),
                    binding: bindings.next().flatten(),
                })
                .collect()
        }
        None => Vec::new(),
    };

    Ok(Series {
        index,
        name,
        name_binding,
        chart_type,
        points,
    })
}

/// Series name from `c:tx`: a string reference, or a literal `c:v`.
fn resolve_name(
    ser: &XmlElement,
    source: &mut dyn CellSource,
) -> Result<(Option<String>, Option<SheetAddress>)> {
    let Some(tx) = ser.child("tx") else {
        return Ok((None, None));
    };
    if let Some(v) = tx.child("v") {
        return Ok((Some(v.text()), None));
    }
    let Some(reference) = ValueReference::from_container(tx) else {
        return Ok((None, None));
    };
    let name = reference.resolve_text(source)?.into_iter().next();
    let binding = reference.bindings()?.into_iter().next().flatten();
    Ok((name, binding))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::error::ChartBindError;
    use crate::xml_tree::XmlDocument;

    struct NoWorkbook;

    impl CellSource for NoWorkbook {
        fn cell_text(&mut self, _address: &SheetAddress) -> Result<Option<String>> {
            Err(ChartBindError::UnresolvableReference("no workbook".into()))
        }
    }

    const COMBO: &str = r#"<c:chartSpace xmlns:c="c"><c:chart><c:plotArea><c:layout/>
      <c:barChart><c:barDir val="col"/>
        <c:ser><c:idx val="0"/><c:tx><c:strRef><c:f>Sheet1!$B$1</c:f><c:strCache><c:pt idx="0"><c:v>Sales</c:v></c:pt></c:strCache></c:strRef></c:tx>
          <c:val><c:numRef><c:f>Sheet1!$B$2:$B$3</c:f><c:numCache><c:pt idx="0"><c:v>1.234</c:v></c:pt><c:pt idx="1"><c:v>2</c:v></c:pt></c:numCache></c:numRef></c:val></c:ser>
      </c:barChart>
      <c:lineChart>
        <c:ser><c:idx val="1"/><c:tx><c:v>Target</c:v></c:tx>
          <c:val><c:numLit><c:pt idx="0"><c:v>5</c:v></c:pt><c:pt idx="1"><c:v>6</c:v></c:pt></c:numLit></c:val></c:ser>
        <c:ser><c:idx val="2"/><c:val><c:numLit><c:pt idx="0"><c:v>7</c:v></c:pt></c:numLit></c:val></c:ser>
      </c:lineChart>
      <c:catAx/><c:valAx/></c:plotArea></c:chart></c:chartSpace>"#;

    #[test]
    fn test_groups_keep_block_types_and_order() {
        let doc = XmlDocument::parse(COMBO.as_bytes()).unwrap();
        let groups = resolve_groups(&doc.root, &mut NoWorkbook, &BindOptions::default()).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].chart_type, ChartTypeTag::Bar);
        assert_eq!(groups[1].chart_type, ChartTypeTag::Line);
        assert!(groups[1].series.iter().all(|s| s.chart_type == ChartTypeTag::Line));
        let indices: Vec<_> = groups.iter().flat_map(|g| &g.series).map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_names_and_points() {
        let doc = XmlDocument::parse(COMBO.as_bytes()).unwrap();
        let groups = resolve_groups(&doc.root, &mut NoWorkbook, &BindOptions::default()).unwrap();

        let sales = &groups[0].series[0];
        assert_eq!(sales.name.as_deref(), Some("Sales"));
        assert_eq!(sales.name_binding, Some(SheetAddress::new("Sheet1", "B1")));
        assert_eq!(sales.values(), vec![1.23, 2.0]);
        assert_eq!(sales.points[1].binding, Some(SheetAddress::new("Sheet1", "B3")));

        let target = &groups[1].series[0];
        assert_eq!(target.name.as_deref(), Some("Target"));
        assert!(target.name_binding.is_none());
        assert!(target.points.iter().all(|p| p.binding.is_none()));

        let unnamed = &groups[1].series[1];
        assert!(!unnamed.has_name());
        assert_eq!(unnamed.values(), vec![7.0]);
    }

    #[test]
    fn test_formula_only_without_workbook_fails() {
        let xml = r#"<c:ser xmlns:c="c"><c:val><c:numRef><c:f>Sheet1!$B$2</c:f></c:numRef></c:val></c:ser>"#;
        let ser = XmlDocument::parse(xml.as_bytes()).unwrap().root;
        let err = resolve_series(&ser, ChartTypeTag::Bar, 0, &mut NoWorkbook, &BindOptions::default())
            .unwrap_err();
        assert!(matches!(err, ChartBindError::UnresolvableReference(_)));
    }

    #[test]
    fn test_scatter_reads_y_values() {
        let xml = r#"<c:ser xmlns:c="c"><c:xVal><c:numLit><c:pt idx="0"><c:v>1</c:v></c:pt></c:numLit></c:xVal>
            <c:yVal><c:numLit><c:pt idx="0"><c:v>9.5</c:v></c:pt></c:numLit></c:yVal></c:ser>"#;
        let ser = XmlDocument::parse(xml.as_bytes()).unwrap().root;
        let series =
            resolve_series(&ser, ChartTypeTag::Scatter, 0, &mut NoWorkbook, &BindOptions::default())
                .unwrap();
        assert_eq!(series.values(), vec![9.5]);
    }
}
