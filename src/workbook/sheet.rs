//! Cell lookup and sorted insertion inside one worksheet part.

use crate::cell_ref::CellAddress;
use crate::error::{ChartBindError, Result};
use crate::xml_tree::{XmlDocument, XmlElement, XmlNode};

/// Cell type tag from the `t` attribute of a `<c>` element.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CellTypeTag {
    Shared,
    Inline,
    Str,
    Bool,
    Error,
    Default,
}

fn parse_cell_type_tag(value: Option<&str>) -> CellTypeTag {
    match value {
        Some("s") => CellTypeTag::Shared,
        Some("b") => CellTypeTag::Bool,
        Some("e") => CellTypeTag::Error,
        Some("str") => CellTypeTag::Str,
        Some("inlineStr") => CellTypeTag::Inline,
        _ => CellTypeTag::Default,
    }
}

/// Elements that precede `sheetData` in a worksheet.
const BEFORE_SHEET_DATA: [&str; 5] = ["sheetPr", "dimension", "sheetViews", "sheetFormatPr", "cols"];

/// A parsed worksheet part.
#[derive(Debug, Clone)]
pub(crate) struct Worksheet {
    pub name: String,
    pub path: String,
    pub doc: XmlDocument,
}

impl Worksheet {
    pub fn new(name: String, path: String, doc: XmlDocument) -> Self {
        Self { name, path, doc }
    }

    fn sheet_data(&self) -> Option<&XmlElement> {
        self.doc.root.child("sheetData")
    }

    /// The `<c>` element at `address`, if present.
    pub fn cell(&self, address: CellAddress) -> Option<&XmlElement> {
        let sheet_data = self.sheet_data()?;
        let row_pos = find_row(sheet_data, address.row_number()).ok()?;
        let row = element_at(sheet_data, row_pos)?;
        let cell_pos = find_cell(row, address).ok()?;
        element_at(row, cell_pos)
    }

    /// Text of the cell at `address`, with shared strings resolved.
    ///
    /// An existing cell without a value reads as `""`.
    pub fn cell_text(&self, address: CellAddress, shared_strings: &[String]) -> Option<String> {
        self.cell(address).map(|c| cell_value_text(c, shared_strings))
    }

    /// Largest column index holding a cell, if any.
    pub fn max_column(&self) -> Option<u32> {
        let sheet_data = self.sheet_data()?;
        rows_in_order(sheet_data)
            .into_iter()
            .filter_map(|(pos, number)| Some(cells_in_order(element_at(sheet_data, pos)?, number)))
            .flatten()
            .map(|(_, addr)| addr.col)
            .max()
    }

    /// Get or create the `<c>` element at `address`.
    ///
    /// A new cell is inserted before the first cell of its row whose address
    /// sorts after it, so every row stays in ascending column order. Missing
    /// rows are created in ascending row order when `create_rows` is set.
    pub fn cell_mut_or_insert(
        &mut self,
        address: CellAddress,
        create_rows: bool,
    ) -> Result<&mut XmlElement> {
        if self.doc.root.child("sheetData").is_none() {
            let name = self.doc.root.qualify("sheetData");
            self.doc
                .root
                .insert_after_any(&BEFORE_SHEET_DATA, XmlElement::new(name));
        }
        let sheet_data = self
            .doc
            .root
            .child_mut("sheetData")
            .ok_or_else(|| not_found_for(&self.name, address))?;

        let row_number = address.row_number();
        let row_pos = match find_row(sheet_data, row_number) {
            Ok(pos) => pos,
            Err(_) if !create_rows => return Err(not_found_for(&self.name, address)),
            Err(insert_at) => {
                let row = XmlElement::new(sheet_data.qualify("row"))
                    .with_attr("r", row_number.to_string());
                sheet_data.insert_element(insert_at, row);
                insert_at
            }
        };
        let row = sheet_data
            .element_at_mut(row_pos)
            .ok_or_else(|| not_found_for(&self.name, address))?;

        let cell_pos = match find_cell(row, address) {
            Ok(pos) => pos,
            Err(insert_at) => {
                let cell =
                    XmlElement::new(row.qualify("c")).with_attr("r", address.to_string());
                row.insert_element(insert_at, cell);
                tracing::trace!(cell = %address, row = row_number, "inserted cell");
                insert_at
            }
        };
        row.element_at_mut(cell_pos)
            .ok_or_else(|| not_found_for(&self.name, address))
    }

    /// Overwrite (or create) a numeric cell. Any formula is dropped.
    pub fn set_number(&mut self, address: CellAddress, value: f64, create_rows: bool) -> Result<()> {
        if !value.is_finite() {
            return Err(ChartBindError::UnsupportedEdit(format!(
                "cannot write non-finite value {value} to {address}"
            )));
        }
        let cell = self.cell_mut_or_insert(address, create_rows)?;
        cell.set_attr("t", "n");
        // Editing clears the formula
        cell.remove_children_named("f");
        cell.remove_children_named("is");
        let text = crate::value_ref::format_number(value);
        cell.ensure_child("v").set_text(text);
        Ok(())
    }

    /// Overwrite (or create) a text cell as an inline string.
    pub fn set_text(&mut self, address: CellAddress, text: &str, create_rows: bool) -> Result<()> {
        let cell = self.cell_mut_or_insert(address, create_rows)?;
        cell.set_attr("t", "inlineStr");
        cell.remove_children_named("f");
        cell.remove_children_named("v");
        cell.remove_children_named("is");

        let mut t = XmlElement::new(cell.qualify("t")).with_text(text);
        if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
            t.set_attr("xml:space", "preserve");
        }
        let is = XmlElement::new(cell.qualify("is")).with_child(t);
        cell.push_element(is);
        Ok(())
    }
}

fn not_found_for(sheet: &str, address: CellAddress) -> ChartBindError {
    ChartBindError::CellNotFound {
        sheet: sheet.to_string(),
        cell: address.to_string(),
    }
}

fn row_r(row: &XmlElement) -> Option<u32> {
    row.attr("r").and_then(|r| r.trim().parse().ok())
}

fn cell_r(cell: &XmlElement) -> Option<CellAddress> {
    cell.attr("r").and_then(|r| r.parse().ok())
}

fn element_at(parent: &XmlElement, pos: usize) -> Option<&XmlElement> {
    match parent.children.get(pos) {
        Some(XmlNode::Element(el)) => Some(el),
        _ => None,
    }
}

/// `(position, row number)` of every `<row>`. A row without `r` follows the
/// previous row.
fn rows_in_order(sheet_data: &XmlElement) -> Vec<(usize, u32)> {
    let mut rows = Vec::new();
    let mut previous = 0u32;
    for (pos, node) in sheet_data.children.iter().enumerate() {
        let XmlNode::Element(el) = node else { continue };
        if el.local_name() != "row" {
            continue;
        }
        let number = row_r(el).unwrap_or_else(|| previous.saturating_add(1));
        previous = number;
        rows.push((pos, number));
    }
    rows
}

/// `(position, address)` of every `<c>` in a row. A cell without `r` sits
/// one column right of the previous cell.
fn cells_in_order(row: &XmlElement, row_number: u32) -> Vec<(usize, CellAddress)> {
    let mut cells = Vec::new();
    let mut next_col = 0u32;
    for (pos, node) in row.children.iter().enumerate() {
        let XmlNode::Element(el) = node else { continue };
        if el.local_name() != "c" {
            continue;
        }
        let address = cell_r(el)
            .unwrap_or_else(|| CellAddress::new(next_col, row_number.saturating_sub(1)));
        next_col = address.col.saturating_add(1);
        cells.push((pos, address));
    }
    cells
}

/// `Ok(position)` of the matching row, or `Err(position)` to insert at.
fn find_row(sheet_data: &XmlElement, row_number: u32) -> std::result::Result<usize, usize> {
    let rows = rows_in_order(sheet_data);
    if let Some(&(pos, _)) = rows.iter().find(|(_, number)| *number == row_number) {
        return Ok(pos);
    }
    Err(rows
        .iter()
        .find(|(_, number)| *number > row_number)
        .map_or(sheet_data.children.len(), |(pos, _)| *pos))
}

/// `Ok(position)` of the matching cell, or `Err(position)` of the first cell
/// that sorts after `address`.
fn find_cell(row: &XmlElement, address: CellAddress) -> std::result::Result<usize, usize> {
    let cells = cells_in_order(row, address.row_number());
    if let Some(&(pos, _)) = cells.iter().find(|(_, existing)| *existing == address) {
        return Ok(pos);
    }
    if let Some(&(pos, _)) = cells.iter().find(|(_, existing)| *existing > address) {
        return Err(pos);
    }
    // Anything after the cells (extLst) stays last
    Err(cells.last().map_or(row.children.len(), |(pos, _)| pos + 1))
}

fn cell_value_text(cell: &XmlElement, shared_strings: &[String]) -> String {
    match parse_cell_type_tag(cell.attr("t")) {
        CellTypeTag::Shared => cell
            .child_text("v")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .and_then(|idx| shared_strings.get(idx).cloned())
            .unwrap_or_default(),
        CellTypeTag::Inline => cell.child("is").map(inline_text).unwrap_or_default(),
        CellTypeTag::Str | CellTypeTag::Bool | CellTypeTag::Error | CellTypeTag::Default => {
            cell.child_text("v").unwrap_or_default()
        }
    }
}

/// Concatenate `<t>` runs of an inline string (plain or rich).
fn inline_text(is: &XmlElement) -> String {
    let mut out = String::new();
    for el in is.elements() {
        match el.local_name() {
            "t" => out.push_str(&el.text()),
            "r" => {
                if let Some(t) = el.child("t") {
                    out.push_str(&t.text());
                }
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;

    fn sheet(rows: &str) -> Worksheet {
        let xml = format!(
            r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{rows}</sheetData></worksheet>"#
        );
        let doc = XmlDocument::parse(xml.as_bytes()).unwrap();
        Worksheet::new("Sheet1".into(), "xl/worksheets/sheet1.xml".into(), doc)
    }

    fn addr(s: &str) -> CellAddress {
        s.parse().unwrap()
    }

    fn row_cells(ws: &Worksheet, row_number: u32) -> Vec<String> {
        ws.doc
            .root
            .child("sheetData")
            .unwrap()
            .children_named("row")
            .find(|r| row_r(r) == Some(row_number))
            .unwrap()
            .children_named("c")
            .map(|c| c.attr("r").unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_cell_types() {
        let ws = sheet(
            r#"<row r="1"><c r="A1" t="s"><v>1</v></c><c r="B1" t="inlineStr"><is><t>inline</t></is></c>
               <c r="C1" t="b"><v>1</v></c><c r="D1"><v>2.5</v></c><c r="E1" t="str"><f>A1</f><v>calc</v></c>
               <c r="F1" s="3"/></row>"#,
        );
        let shared = vec!["zero".to_string(), "one".to_string()];
        assert_eq!(ws.cell_text(addr("A1"), &shared).as_deref(), Some("one"));
        assert_eq!(ws.cell_text(addr("B1"), &shared).as_deref(), Some("inline"));
        assert_eq!(ws.cell_text(addr("C1"), &shared).as_deref(), Some("1"));
        assert_eq!(ws.cell_text(addr("D1"), &shared).as_deref(), Some("2.5"));
        assert_eq!(ws.cell_text(addr("E1"), &shared).as_deref(), Some("calc"));
        assert_eq!(ws.cell_text(addr("F1"), &shared).as_deref(), Some(""));
        assert_eq!(ws.cell_text(addr("G1"), &shared), None);
        assert_eq!(ws.cell_text(addr("A2"), &shared), None);
    }

    #[test]
    fn test_sorted_insertion_into_empty_row() {
        let mut ws = sheet(r#"<row r="2"/>"#);
        for (cell, value) in [("C2", 3.0), ("B2", 2.0), ("D2", 4.0)] {
            ws.set_number(addr(cell), value, true).unwrap();
            let cells = row_cells(&ws, 2);
            let mut sorted = cells.clone();
            sorted.sort_by(|a, b| crate::cell_ref::compare_cell_refs(a, b));
            assert_eq!(cells, sorted);
        }
        assert_eq!(row_cells(&ws, 2), vec!["B2", "C2", "D2"]);
    }

    #[test]
    fn test_insertion_uses_column_order_not_string_order() {
        let mut ws = sheet(r#"<row r="1"><c r="B1"><v>1</v></c><c r="AA1"><v>1</v></c></row>"#);
        ws.set_number(addr("C1"), 5.0, true).unwrap();
        assert_eq!(row_cells(&ws, 1), vec!["B1", "C1", "AA1"]);
    }

    #[test]
    fn test_rows_created_in_order() {
        let mut ws = sheet(r#"<row r="1"><c r="A1"><v>1</v></c></row><row r="5"/>"#);
        ws.set_number(addr("A3"), 7.0, true).unwrap();
        ws.set_number(addr("A10"), 8.0, true).unwrap();
        let rows: Vec<u32> = ws
            .doc
            .root
            .child("sheetData")
            .unwrap()
            .children_named("row")
            .filter_map(row_r)
            .collect();
        assert_eq!(rows, vec![1, 3, 5, 10]);
    }

    #[test]
    fn test_missing_row_without_creation() {
        let mut ws = sheet(r#"<row r="1"/>"#);
        assert!(matches!(
            ws.set_number(addr("A4"), 1.0, false),
            Err(ChartBindError::CellNotFound { .. })
        ));
    }

    #[test]
    fn test_set_number_drops_formula_and_sets_type() {
        let mut ws = sheet(r#"<row r="1"><c r="A1" t="str"><f>B1*2</f><v>x</v></c></row>"#);
        ws.set_number(addr("A1"), 12.5, true).unwrap();
        let cell = ws.cell(addr("A1")).unwrap();
        assert_eq!(cell.attr("t"), Some("n"));
        assert!(cell.child("f").is_none());
        assert_eq!(cell.child_text("v").as_deref(), Some("12.5"));
    }

    #[test]
    fn test_set_number_rejects_non_finite_values() {
        let mut ws = sheet(r#"<row r="1"><c r="A1"><v>4</v></c></row>"#);
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                ws.set_number(addr("A1"), value, true),
                Err(ChartBindError::UnsupportedEdit(_))
            ));
            assert!(ws.set_number(addr("B3"), value, true).is_err());
        }
        assert_eq!(ws.cell_text(addr("A1"), &[]).as_deref(), Some("4"));
        assert!(ws.cell(addr("B3")).is_none());
        assert_eq!(ws.doc.root.child("sheetData").unwrap().children_named("row").count(), 1);
    }

    #[test]
    fn test_set_text_writes_inline_string() {
        let mut ws = sheet(r#"<row r="1"><c r="A1" t="s"><v>0</v></c></row>"#);
        ws.set_text(addr("A1"), " Apparel", true).unwrap();
        let cell = ws.cell(addr("A1")).unwrap();
        assert_eq!(cell.attr("t"), Some("inlineStr"));
        assert!(cell.child("v").is_none());
        assert_eq!(ws.cell_text(addr("A1"), &[]).as_deref(), Some(" Apparel"));
        assert_eq!(
            cell.descend(&["is", "t"]).unwrap().attr("xml:space"),
            Some("preserve")
        );
    }

    #[test]
    fn test_space_only_inline_string_survives_save() {
        let mut ws = sheet(
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t xml:space="preserve"> </t></is></c></row>"#,
        );
        assert_eq!(ws.cell_text(addr("A1"), &[]).as_deref(), Some(" "));
        ws.set_number(addr("B1"), 1.0, true).unwrap();

        let bytes = ws.doc.to_bytes().unwrap();
        assert!(String::from_utf8(bytes.clone())
            .unwrap()
            .contains(r#"<t xml:space="preserve"> </t>"#));
        let reparsed = Worksheet::new("Sheet1".into(), ws.path.clone(), XmlDocument::parse(&bytes).unwrap());
        assert_eq!(reparsed.cell_text(addr("A1"), &[]).as_deref(), Some(" "));
    }

    #[test]
    fn test_rows_and_cells_without_r_use_document_position() {
        let mut ws = sheet(
            r#"<row r="1"><c><v>1</v></c><c><v>2</v></c><c r="E1"><v>5</v></c></row><row><c><v>20</v></c></row>"#,
        );
        assert_eq!(ws.cell_text(addr("B1"), &[]).as_deref(), Some("2"));
        assert_eq!(ws.cell_text(addr("A2"), &[]).as_deref(), Some("20"));
        assert_eq!(ws.max_column(), Some(4));

        ws.set_number(addr("C1"), 3.0, true).unwrap();
        ws.set_number(addr("B2"), 21.0, true).unwrap();
        ws.set_number(addr("A3"), 30.0, true).unwrap();

        let sheet_data = ws.doc.root.child("sheetData").unwrap();
        let first = sheet_data.children_named("row").next().unwrap();
        let refs: Vec<_> = first.children_named("c").map(|c| c.attr("r")).collect();
        assert_eq!(refs, vec![None, None, Some("C1"), Some("E1")]);
        let second = sheet_data.children_named("row").nth(1).unwrap();
        assert_eq!(second.attr("r"), None);
        assert_eq!(second.children_named("c").count(), 2);
        assert_eq!(ws.cell_text(addr("B2"), &[]).as_deref(), Some("21"));
        assert_eq!(sheet_data.children_named("row").count(), 3);
        assert_eq!(ws.cell_text(addr("A1"), &[]).as_deref(), Some("1"));
    }

    #[test]
    fn test_max_column() {
        let ws = sheet(r#"<row r="1"><c r="A1"/><c r="C1"/></row><row r="2"><c r="B2"/></row>"#);
        assert_eq!(ws.max_column(), Some(2));
        assert_eq!(sheet("").max_column(), None);
    }
}
