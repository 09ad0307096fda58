//! Streaming readers for the embedded workbook's index parts:
//! `xl/_rels/workbook.xml.rels`, `xl/workbook.xml` and the shared string table.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{BufReader, Read, Seek};
use zip::ZipArchive;

use crate::error::Result;
use crate::namespaces::{is_shared_strings_relationship, is_worksheet_relationship};
use crate::xml_helpers::{attr_string, attr_string_local};

/// Sheet metadata from workbook.xml.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SheetInfo {
    pub name: String,
    /// Full zip path, e.g. `xl/worksheets/sheet1.xml`.
    pub path: String,
}

/// Workbook relationships parsed from `xl/_rels/workbook.xml.rels`.
///
/// Paths are resolved relative to `xl/` and stored as full zip paths.
#[derive(Default, Debug)]
pub(crate) struct WorkbookRelationships {
    /// rId -> full path for worksheet relationships.
    pub worksheets: HashMap<String, String>,
    pub shared_strings: Option<String>,
}

pub(crate) fn parse_workbook_relationships<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<WorkbookRelationships> {
    let mut rels = WorkbookRelationships::default();

    let Ok(file) = archive.by_name("xl/_rels/workbook.xml.rels") else {
        return Ok(rels); // Relationships file is optional
    };

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Empty(ref e) | Event::Start(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let id = attr_string(e, b"Id").unwrap_or_default();
                let target = attr_string(e, b"Target").unwrap_or_default();
                let rel_type = attr_string(e, b"Type").unwrap_or_default();

                let full_path = match target.strip_prefix('/') {
                    Some(stripped) => stripped.to_string(),
                    None => format!("xl/{target}"),
                };

                if is_worksheet_relationship(&rel_type) && !id.is_empty() && !target.is_empty() {
                    rels.worksheets.insert(id, full_path);
                } else if is_shared_strings_relationship(&rel_type) {
                    rels.shared_strings = Some(full_path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Sheet names and paths from `xl/workbook.xml`, in tab order.
pub(crate) fn get_sheet_info<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    relationships: &HashMap<String, String>,
) -> Result<Vec<SheetInfo>> {
    let file = archive.by_name("xl/workbook.xml")?;
    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(true);

    let mut sheets = Vec::new();
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"sheet" => {
                let name = attr_string(e, b"name").unwrap_or_default();
                // r:id is namespace prefixed
                let r_id = attr_string_local(e, b"id").unwrap_or_default();

                if !name.is_empty() {
                    let path = relationships.get(&r_id).cloned().unwrap_or_else(|| {
                        let idx = sheets.len() + 1;
                        format!("xl/worksheets/sheet{idx}.xml")
                    });
                    sheets.push(SheetInfo { name, path });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// Parse the shared string table. Rich-text runs are concatenated.
pub(crate) fn parse_shared_strings<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: Option<&str>,
) -> Result<Vec<String>> {
    let sst_path = path.unwrap_or("xl/sharedStrings.xml");
    let Ok(file) = archive.by_name(sst_path) else {
        return Ok(Vec::new()); // SharedStrings is optional
    };

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(false);

    let mut strings = Vec::new();
    let mut buf = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_t = true,
                _ => {}
            },
            Event::Text(ref e) if in_t => current.push_str(&e.unescape()?),
            Event::End(ref e) => match e.local_name().as_ref() {
                b"si" => {
                    strings.push(std::mem::take(&mut current));
                    in_si = false;
                }
                b"t" => in_t = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
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
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn archive(files: &[(&str, &str)]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        for (name, content) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        let cursor = zip.finish().unwrap();
        ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap()
    }

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/data.xml"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="Sheet1" sheetId="1" r:id="rId1"/>
    <sheet name="Q1 &amp; Q2" sheetId="2" r:id="rId2"/>
  </sheets>
</workbook>"#;

    #[test]
    fn test_sheet_paths_follow_relationships() {
        let mut zip = archive(&[
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/workbook.xml", WORKBOOK),
        ]);
        let rels = parse_workbook_relationships(&mut zip).unwrap();
        assert_eq!(rels.shared_strings.as_deref(), Some("xl/sharedStrings.xml"));

        let sheets = get_sheet_info(&mut zip, &rels.worksheets).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].path, "xl/worksheets/sheet1.xml");
        assert_eq!(sheets[1].name, "Q1 & Q2");
        assert_eq!(sheets[1].path, "xl/worksheets/data.xml");
    }

    #[test]
    fn test_shared_strings_concatenate_runs() {
        let sst = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <si><t>Plain</t></si>
  <si><r><t>Rich </t></r><r><t>text</t></r></si>
  <si><t xml:space="preserve"> padded </t></si>
</sst>"#;
        let mut zip = archive(&[("xl/sharedStrings.xml", sst)]);
        let strings = parse_shared_strings(&mut zip, None).unwrap();
        assert_eq!(strings, vec!["Plain", "Rich text", " padded "]);
    }

    #[test]
    fn test_missing_optional_parts() {
        let mut zip = archive(&[("xl/workbook.xml", WORKBOOK)]);
        let rels = parse_workbook_relationships(&mut zip).unwrap();
        assert!(rels.worksheets.is_empty());
        assert!(parse_shared_strings(&mut zip, None).unwrap().is_empty());
        // Falls back to the conventional sheet path
        let sheets = get_sheet_info(&mut zip, &rels.worksheets).unwrap();
        assert_eq!(sheets[1].path, "xl/worksheets/sheet2.xml");
    }
}
