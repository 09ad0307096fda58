//! Host OOXML package access: parts, content types and relationships.
//!
//! Works on any OOXML zip (pptx, docx, xlsx). Parts are read on demand from
//! the held bytes; writes are staged and applied by [`Package::save`].

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

use crate::error::{ChartBindError, Result};
use crate::namespaces::CT_CHART;
use crate::xml_helpers::attr_string;
use crate::zip_patcher::patch_zip;

/// One relationship of a part, with its target resolved to a package path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// Full part path, or the raw target for external relationships.
    pub target: String,
    pub external: bool,
}

/// An opened OOXML package.
#[derive(Debug, Clone)]
pub struct Package {
    data: Vec<u8>,
    names: Vec<String>,
    staged: BTreeMap<String, Vec<u8>>,
}

impl Package {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let names = {
            let archive = ZipArchive::new(Cursor::new(data.as_slice()))?;
            archive.file_names().map(str::to_string).collect()
        };
        Ok(Self {
            data,
            names,
            staged: BTreeMap::new(),
        })
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn has_part(&self, path: &str) -> bool {
        self.staged.contains_key(path) || self.names.iter().any(|n| n == path)
    }

    /// Read a part, preferring a staged replacement.
    pub fn read_part(&self, path: &str) -> Result<Vec<u8>> {
        let path = path.trim_start_matches('/');
        if let Some(bytes) = self.staged.get(path) {
            return Ok(bytes.clone());
        }
        let mut archive = ZipArchive::new(Cursor::new(self.data.as_slice()))?;
        let mut file = match archive.by_name(path) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(ChartBindError::PartNotFound(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Content type of a part from `[Content_Types].xml`: an `Override` for
    /// the part name, else the `Default` for its extension.
    pub fn content_type(&self, path: &str) -> Result<Option<String>> {
        let types = self.content_types()?;
        let path = path.trim_start_matches('/');
        if let Some(ct) = types.overrides.get(path) {
            return Ok(Some(ct.clone()));
        }
        let ext = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        Ok(ext.and_then(|ext| types.defaults.get(&ext).cloned()))
    }

    /// Chart parts, in natural name order.
    ///
    /// Parts are found by the chart content type; packages without a usable
    /// content-type index fall back to the `*/charts/chartN.xml` naming.
    pub fn chart_parts(&self) -> Result<Vec<String>> {
        let types = self.content_types()?;
        let mut charts: Vec<String> = types
            .overrides
            .iter()
            .filter(|(name, ct)| ct.as_str() == CT_CHART && self.has_part(name))
            .map(|(name, _)| name.clone())
            .collect();

        if charts.is_empty() {
            charts = self
                .names
                .iter()
                .filter(|name| is_conventional_chart_path(name))
                .cloned()
                .collect();
        }
        charts.sort_by_key(|name| natural_key(name));
        Ok(charts)
    }

    /// Relationships of `part`, targets resolved against the part's folder.
    /// A part without a rels file has no relationships.
    pub fn relationships(&self, part: &str) -> Result<Vec<Relationship>> {
        let part = part.trim_start_matches('/');
        let rels_path = rels_path_for(part);
        let bytes = match self.read_part(&rels_path) {
            Ok(bytes) => bytes,
            Err(ChartBindError::PartNotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let base_dir = part.rsplit_once('/').map_or("", |(dir, _)| dir);
        let mut xml = Reader::from_reader(bytes.as_slice());
        xml.trim_text(true);
        let mut buf = Vec::new();
        let mut rels = Vec::new();

        loop {
            match xml.read_event_into(&mut buf)? {
                Event::Empty(ref e) | Event::Start(ref e)
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let id = attr_string(e, b"Id").unwrap_or_default();
                    let target = attr_string(e, b"Target").unwrap_or_default();
                    let rel_type = attr_string(e, b"Type").unwrap_or_default();
                    let external = attr_string(e, b"TargetMode")
                        .is_some_and(|mode| mode.eq_ignore_ascii_case("External"));

                    if !id.is_empty() && !target.is_empty() {
                        let target = if external {
                            target
                        } else {
                            resolve_relative_path(base_dir, &target)
                        };
                        rels.push(Relationship {
                            id,
                            rel_type,
                            target,
                            external,
                        });
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Stage a replacement (or new) part for the next save.
    pub fn write_part(&mut self, path: &str, bytes: Vec<u8>) {
        let path = path.trim_start_matches('/').to_string();
        if !self.names.contains(&path) {
            self.names.push(path.clone());
        }
        self.staged.insert(path, bytes);
    }

    pub fn is_modified(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Apply staged parts and return the new package bytes.
    pub fn save(&mut self) -> Result<Vec<u8>> {
        if !self.staged.is_empty() {
            tracing::debug!(parts = self.staged.len(), "writing staged package parts");
            self.data = patch_zip(&self.data, &self.staged)?;
            self.staged.clear();
        }
        Ok(self.data.clone())
    }

    fn content_types(&self) -> Result<ContentTypes> {
        match self.read_part("[Content_Types].xml") {
            Ok(bytes) => parse_content_types(&bytes),
            Err(ChartBindError::PartNotFound(_)) => Ok(ContentTypes::default()),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Default)]
struct ContentTypes {
    /// Lower-case extension -> content type.
    defaults: BTreeMap<String, String>,
    /// Part path (no leading slash) -> content type.
    overrides: BTreeMap<String, String>,
}

fn parse_content_types(bytes: &[u8]) -> Result<ContentTypes> {
    let mut types = ContentTypes::default();
    let mut xml = Reader::from_reader(bytes);
    xml.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Empty(ref e) | Event::Start(ref e) => {
                let content_type = attr_string(e, b"ContentType").unwrap_or_default();
                match e.local_name().as_ref() {
                    b"Default" => {
                        if let Some(ext) = attr_string(e, b"Extension") {
                            types.defaults.insert(ext.to_ascii_lowercase(), content_type);
                        }
                    }
                    b"Override" => {
                        if let Some(name) = attr_string(e, b"PartName") {
                            let name = name.trim_start_matches('/').to_string();
                            types.overrides.insert(name, content_type);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(types)
}

/// `ppt/charts/chart1.xml` -> `ppt/charts/_rels/chart1.xml.rels`.
pub fn rels_path_for(part: &str) -> String {
    let part = part.trim_start_matches('/');
    match part.rsplit_once('/') {
        Some((dir, filename)) => format!("{dir}/_rels/{filename}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the source part's folder.
///
/// Absolute targets (leading `/`) are package-rooted; `..` and `.` segments
/// are collapsed.
pub fn resolve_relative_path(base_dir: &str, relative: &str) -> String {
    if let Some(stripped) = relative.strip_prefix('/') {
        return stripped.to_string();
    }

    let mut components: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for part in relative.split('/') {
        match part {
            ".." => {
                components.pop();
            }
            "." | "" => {}
            _ => components.push(part),
        }
    }
    components.join("/")
}

fn is_conventional_chart_path(name: &str) -> bool {
    let Some((dir, file)) = name.rsplit_once('/') else {
        return false;
    };
    (dir == "charts" || dir.ends_with("/charts"))
        && file
            .strip_prefix("chart")
            .and_then(|rest| rest.strip_suffix(".xml"))
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// Sort key putting `chart2.xml` before `chart10.xml`.
fn natural_key(name: &str) -> (String, u64, String) {
    let stem = name.strip_suffix(".xml").unwrap_or(name);
    let digits_at = stem
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |pos| pos + 1);
    let (prefix, digits) = stem.split_at(digits_at);
    (prefix.to_string(), digits.parse().unwrap_or(0), name.to_string())
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
    use test_case::test_case;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn build(files: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in files {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    const CONTENT_TYPES: &str = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="xml" ContentType="application/xml"/>
  <Default Extension="xlsx" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"/>
  <Override PartName="/ppt/charts/chart10.xml" ContentType="application/vnd.openxmlformats-officedocument.drawingml.chart+xml"/>
  <Override PartName="/ppt/charts/chart2.xml" ContentType="application/vnd.openxmlformats-officedocument.drawingml.chart+xml"/>
</Types>"#;

    const CHART_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/package" Target="../embeddings/Microsoft_Excel_Worksheet.xlsx"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/>
</Relationships>"#;

    #[test_case("xl/worksheets", "../drawings/drawing1.xml", "xl/drawings/drawing1.xml")]
    #[test_case("ppt/charts", "../embeddings/a.xlsx", "ppt/embeddings/a.xlsx")]
    #[test_case("word/charts", "./embeddings/b.xlsx", "word/charts/embeddings/b.xlsx")]
    #[test_case("ppt/charts", "/ppt/embeddings/c.xlsx", "ppt/embeddings/c.xlsx")]
    #[test_case("", "word/document.xml", "word/document.xml")]
    fn test_resolve_relative_path(base: &str, target: &str, expected: &str) {
        assert_eq!(resolve_relative_path(base, target), expected);
    }

    #[test_case("ppt/charts/chart1.xml", "ppt/charts/_rels/chart1.xml.rels")]
    #[test_case("/word/charts/chart3.xml", "word/charts/_rels/chart3.xml.rels")]
    #[test_case("doc.xml", "_rels/doc.xml.rels")]
    fn test_rels_path_for(part: &str, expected: &str) {
        assert_eq!(rels_path_for(part), expected);
    }

    #[test]
    fn test_chart_parts_by_content_type_in_natural_order() {
        let pkg = Package::from_bytes(build(&[
            ("[Content_Types].xml", CONTENT_TYPES),
            ("ppt/charts/chart10.xml", "<c/>"),
            ("ppt/charts/chart2.xml", "<c/>"),
        ]))
        .unwrap();
        assert_eq!(
            pkg.chart_parts().unwrap(),
            vec!["ppt/charts/chart2.xml", "ppt/charts/chart10.xml"]
        );
        assert_eq!(
            pkg.content_type("ppt/embeddings/x.xlsx").unwrap().as_deref(),
            Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
        );
    }

    #[test]
    fn test_chart_parts_fallback_to_names() {
        let pkg = Package::from_bytes(build(&[
            ("word/charts/chart1.xml", "<c/>"),
            ("word/charts/_rels/chart1.xml.rels", "<r/>"),
            ("word/charts/colors1.xml", "<c/>"),
        ]))
        .unwrap();
        assert_eq!(pkg.chart_parts().unwrap(), vec!["word/charts/chart1.xml"]);
    }

    #[test]
    fn test_relationships_resolve_targets() {
        let pkg = Package::from_bytes(build(&[
            ("ppt/charts/chart1.xml", "<c/>"),
            ("ppt/charts/_rels/chart1.xml.rels", CHART_RELS),
        ]))
        .unwrap();
        let rels = pkg.relationships("ppt/charts/chart1.xml").unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[0].target, "ppt/embeddings/Microsoft_Excel_Worksheet.xlsx");
        assert!(!rels[0].external);
        assert_eq!(rels[1].target, "https://example.com");
        assert!(rels[1].external);
        assert!(pkg.relationships("ppt/slides/slide1.xml").unwrap().is_empty());
    }

    #[test]
    fn test_write_part_and_save() {
        let mut pkg = Package::from_bytes(build(&[("a.xml", "<a/>")])).unwrap();
        assert!(matches!(
            pkg.read_part("missing.xml"),
            Err(ChartBindError::PartNotFound(p)) if p == "missing.xml"
        ));
        pkg.write_part("a.xml", b"<a>1</a>".to_vec());
        assert!(pkg.is_modified());
        assert_eq!(pkg.read_part("a.xml").unwrap(), b"<a>1</a>");

        let saved = pkg.save().unwrap();
        assert!(!pkg.is_modified());
        let reopened = Package::from_bytes(saved).unwrap();
        assert_eq!(reopened.read_part("/a.xml").unwrap(), b"<a>1</a>");
    }
}
