//! The spreadsheet package embedded behind a chart.
//!
//! A chart's `c:externalData` points (through the chart part's relationships)
//! at an xlsx stored as a binary part of the host package. This module opens
//! that xlsx, answers cell lookups, writes cells back while keeping rows in
//! column order, and re-packs it when the host document is saved.

mod registry;
mod relationships;
mod sheet;

pub use registry::{WorkbookBinder, WorkbookRegistry};

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};
use zip::ZipArchive;

use crate::cell_ref::CellAddress;
use crate::config::BindOptions;
use crate::error::{ChartBindError, Result};
use crate::xml_tree::XmlDocument;
use crate::zip_patcher::patch_zip;

use relationships::{get_sheet_info, parse_shared_strings, parse_workbook_relationships};
use sheet::Worksheet;

/// An open embedded workbook.
///
/// Every sheet is parsed when the workbook opens. Edits mark their sheet
/// dirty; saving re-serializes dirty sheets only and raw-copies every other
/// entry of the original archive.
#[derive(Debug)]
pub struct EmbeddedWorkbook {
    /// Host package part the workbook was read from.
    part: String,
    data: Vec<u8>,
    sheets: Vec<Worksheet>,
    shared_strings: Vec<String>,
    dirty: BTreeSet<usize>,
    create_missing_rows: bool,
    closed: bool,
}

impl EmbeddedWorkbook {
    /// Open a workbook from its package bytes.
    pub fn open(part: impl Into<String>, data: Vec<u8>, options: &BindOptions) -> Result<Self> {
        let part = part.into();
        let (sheets, shared_strings) = read_workbook(&data)?;

        tracing::debug!(
            part = %part,
            sheets = sheets.len(),
            shared_strings = shared_strings.len(),
            "opened embedded workbook"
        );

        Ok(Self {
            part,
            data,
            sheets,
            shared_strings,
            dirty: BTreeSet::new(),
            create_missing_rows: options.create_missing_rows,
            closed: false,
        })
    }

    /// Host package part this workbook belongs to.
    pub fn part(&self) -> &str {
        &self.part
    }

    /// Sheet names in tab order.
    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|s| s.name.as_str())
    }

    fn sheet_index(&self, sheet: &str) -> Result<usize> {
        self.sheets
            .iter()
            .position(|s| s.name == sheet)
            .ok_or_else(|| ChartBindError::sheet_not_found(sheet))
    }

    /// Text of a cell, or `None` when the cell does not exist.
    pub fn get(&self, sheet: &str, cell: &str) -> Result<Option<String>> {
        let idx = self.sheet_index(sheet)?;
        let address: CellAddress = cell.parse()?;
        Ok(self
            .sheets
            .get(idx)
            .and_then(|ws| ws.cell_text(address, &self.shared_strings)))
    }

    /// Write a number into a cell, creating the cell in column order if
    /// needed.
    pub fn set_number(&mut self, sheet: &str, cell: &str, value: f64) -> Result<()> {
        let (idx, address) = self.prepare_write(sheet, cell)?;
        let create_rows = self.create_missing_rows;
        if let Some(ws) = self.sheets.get_mut(idx) {
            ws.set_number(address, value, create_rows)?;
            self.dirty.insert(idx);
        }
        Ok(())
    }

    /// Write text into a cell as an inline string.
    pub fn set_text(&mut self, sheet: &str, cell: &str, text: &str) -> Result<()> {
        let (idx, address) = self.prepare_write(sheet, cell)?;
        let create_rows = self.create_missing_rows;
        if let Some(ws) = self.sheets.get_mut(idx) {
            ws.set_text(address, text, create_rows)?;
            self.dirty.insert(idx);
        }
        Ok(())
    }

    fn prepare_write(&self, sheet: &str, cell: &str) -> Result<(usize, CellAddress)> {
        if self.closed {
            return Err(ChartBindError::UnsupportedEdit(format!(
                "workbook {} is closed",
                self.part
            )));
        }
        Ok((self.sheet_index(sheet)?, cell.parse()?))
    }

    /// Largest used column index on a sheet.
    pub fn max_column(&self, sheet: &str) -> Result<Option<u32>> {
        let idx = self.sheet_index(sheet)?;
        Ok(self.sheets.get(idx).and_then(Worksheet::max_column))
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Complete package bytes including unsaved edits.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.dirty.is_empty() {
            return Ok(self.data.clone());
        }
        let mut replacements = BTreeMap::new();
        for &idx in &self.dirty {
            if let Some(ws) = self.sheets.get(idx) {
                replacements.insert(ws.path.clone(), ws.doc.to_bytes()?);
            }
        }
        patch_zip(&self.data, &replacements)
    }

    /// Flush edits into the held package bytes and return them.
    pub fn save(&mut self) -> Result<Vec<u8>> {
        if self.is_dirty() {
            let sheets = self.dirty.len();
            self.data = self.to_bytes()?;
            self.dirty.clear();
            tracing::debug!(part = %self.part, sheets, "saved embedded workbook");
        }
        Ok(self.data.clone())
    }

    /// Save and close. Returns the final bytes on the first call and `None`
    /// on every later call.
    pub fn close(&mut self) -> Result<Option<Vec<u8>>> {
        if self.closed {
            return Ok(None);
        }
        let bytes = self.save()?;
        self.closed = true;
        tracing::debug!(part = %self.part, "closed embedded workbook");
        Ok(Some(bytes))
    }
}

fn read_workbook(data: &[u8]) -> Result<(Vec<Worksheet>, Vec<String>)> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    let rels = parse_workbook_relationships(&mut archive)?;
    let infos = get_sheet_info(&mut archive, &rels.worksheets)?;
    let shared_strings = parse_shared_strings(&mut archive, rels.shared_strings.as_deref())?;

    let mut sheets = Vec::with_capacity(infos.len());
    for info in infos {
        let mut bytes = Vec::new();
        match archive.by_name(&info.path) {
            Ok(mut file) => {
                file.read_to_end(&mut bytes)?;
            }
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(ChartBindError::PartNotFound(info.path));
            }
            Err(e) => return Err(e.into()),
        }
        let doc = XmlDocument::parse(&bytes)?;
        sheets.push(Worksheet::new(info.name, info.path, doc));
    }
    Ok((sheets, shared_strings))
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
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    const WORKBOOK: &str = r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/><sheet name="Notes" sheetId="2" r:id="rId2"/></sheets></workbook>"#;
    const RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#;
    const SHEET1: &str = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>10</v></c></row></sheetData></worksheet>"#;
    const SHEET2: &str = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData/></worksheet>"#;
    const SST: &str = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>Region</t></si></sst>"#;

    pub(super) fn xlsx() -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in [
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/sheet2.xml", SHEET2),
            ("xl/sharedStrings.xml", SST),
        ] {
            zip.start_file(name, FileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn open() -> EmbeddedWorkbook {
        EmbeddedWorkbook::open("ppt/embeddings/a.xlsx", xlsx(), &BindOptions::default()).unwrap()
    }

    #[test]
    fn test_get() {
        let wb = open();
        assert_eq!(wb.sheet_names().collect::<Vec<_>>(), vec!["Sheet1", "Notes"]);
        assert_eq!(wb.get("Sheet1", "A1").unwrap().as_deref(), Some("Region"));
        assert_eq!(wb.get("Sheet1", "B1").unwrap().as_deref(), Some("10"));
        assert_eq!(wb.get("Sheet1", "C9").unwrap(), None);
        assert!(matches!(
            wb.get("Missing", "A1"),
            Err(ChartBindError::SheetNotFound { sheet }) if sheet == "Missing"
        ));
    }

    #[test]
    fn test_set_then_reopen() {
        let mut wb = open();
        wb.set_number("Sheet1", "B1", 42.5).unwrap();
        wb.set_number("Notes", "C3", 7.0).unwrap();
        assert!(wb.is_dirty());

        let bytes = wb.save().unwrap();
        assert!(!wb.is_dirty());
        let reopened =
            EmbeddedWorkbook::open("ppt/embeddings/a.xlsx", bytes, &BindOptions::default()).unwrap();
        assert_eq!(reopened.get("Sheet1", "B1").unwrap().as_deref(), Some("42.5"));
        assert_eq!(reopened.get("Notes", "C3").unwrap().as_deref(), Some("7"));
        assert_eq!(reopened.get("Sheet1", "A1").unwrap().as_deref(), Some("Region"));
    }

    #[test]
    fn test_set_on_missing_sheet() {
        let mut wb = open();
        assert!(matches!(
            wb.set_number("Nope", "A1", 1.0),
            Err(ChartBindError::SheetNotFound { .. })
        ));
        assert!(!wb.is_dirty());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut wb = open();
        wb.set_text("Sheet1", "A2", "East").unwrap();
        let first = wb.close().unwrap();
        assert!(first.is_some());
        assert!(wb.is_closed());
        assert!(wb.close().unwrap().is_none());
        assert!(wb.set_number("Sheet1", "A3", 1.0).is_err());
    }

    #[test]
    fn test_unchanged_workbook_bytes_are_original() {
        let data = xlsx();
        let wb = EmbeddedWorkbook::open("x.xlsx", data.clone(), &BindOptions::default()).unwrap();
        assert_eq!(wb.to_bytes().unwrap(), data);
    }

    #[test]
    fn test_max_column() {
        let wb = open();
        assert_eq!(wb.max_column("Sheet1").unwrap(), Some(1));
        assert_eq!(wb.max_column("Notes").unwrap(), None);
    }
}
