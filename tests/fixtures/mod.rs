//! Test fixtures for generating OOXML packages with charts in memory.
//!
//! Three builders stack on each other:
//! - [`XlsxBuilder`] writes the embedded workbook
//! - [`ChartXmlBuilder`] writes a chart part (`c:chartSpace`)
//! - [`PackageBuilder`] wraps charts and their workbooks into a pptx-like zip
//!
//! # Example
//!
//! ```rust
//! use fixtures::{ChartXmlBuilder, PackageBuilder, SeriesBuilder, XlsxBuilder};
//!
//! let xlsx = XlsxBuilder::new()
//!     .add_sheet("Sheet1")
//!     .add_cell("B2", 10.0)
//!     .build();
//! let chart = ChartXmlBuilder::new()
//!     .block("barChart", vec![SeriesBuilder::new().val_ref("Sheet1!$B$2", None)])
//!     .build();
//! let package = PackageBuilder::new().chart(chart, Some(xlsx)).build();
//! ```
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic,
    clippy::cast_possible_truncation
)]

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use chartbind::cell_ref::parse_cell_ref;
use chartbind::namespaces::{CT_CHART, NS_CHART, NS_DRAWING, NS_SPREADSHEET, REL_PACKAGE};

// ============================================================================
// Cell Value
// ============================================================================

/// A cell value written into a fixture worksheet.
#[derive(Debug, Clone)]
pub enum CellValue {
    /// Stored in the shared string table.
    Shared(String),
    /// Stored inline (`t="inlineStr"`).
    Inline(String),
    Number(f64),
    Boolean(bool),
    /// A formula with its cached result.
    Formula { formula: String, cached: f64 },
    /// A cell element with no value.
    Empty,
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Shared(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Shared(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(f64::from(n))
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

// ============================================================================
// Sheet / XLSX Builder
// ============================================================================

/// Builder for a single worksheet.
#[derive(Debug, Clone, Default)]
pub struct SheetBuilder {
    pub name: String,
    pub cells: Vec<(String, CellValue)>,
}

impl SheetBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: Vec::new(),
        }
    }

    #[must_use]
    pub fn cell<V: Into<CellValue>>(mut self, cell_ref: &str, value: V) -> Self {
        self.cells.push((cell_ref.to_string(), value.into()));
        self
    }
}

/// Builder for the embedded workbook.
#[derive(Debug, Default)]
pub struct XlsxBuilder {
    sheets: Vec<SheetBuilder>,
}

impl XlsxBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sheet(mut self, sheet: SheetBuilder) -> Self {
        self.sheets.push(sheet);
        self
    }

    /// Add a sheet by name (returns a builder for chaining).
    #[must_use]
    pub fn add_sheet(self, name: &str) -> XlsxSheetAdder {
        XlsxSheetAdder {
            builder: self,
            sheet: SheetBuilder::new(name),
        }
    }

    /// Build the XLSX file as bytes.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let mut shared_strings: Vec<String> = Vec::new();
        for sheet in &self.sheets {
            for (_, value) in &sheet.cells {
                if let CellValue::Shared(s) = value {
                    if !shared_strings.contains(s) {
                        shared_strings.push(s.clone());
                    }
                }
            }
        }

        let mut parts: Vec<(String, Vec<u8>)> = vec![
            (
                "[Content_Types].xml".into(),
                xlsx_content_types(self.sheets.len()).into_bytes(),
            ),
            ("_rels/.rels".into(), xlsx_root_rels().into_bytes()),
            (
                "xl/_rels/workbook.xml.rels".into(),
                workbook_rels(self.sheets.len(), !shared_strings.is_empty()).into_bytes(),
            ),
            ("xl/workbook.xml".into(), workbook_xml(&self.sheets).into_bytes()),
        ];
        if !shared_strings.is_empty() {
            parts.push((
                "xl/sharedStrings.xml".into(),
                shared_strings_xml(&shared_strings).into_bytes(),
            ));
        }
        for (i, sheet) in self.sheets.iter().enumerate() {
            parts.push((
                format!("xl/worksheets/sheet{}.xml", i + 1),
                sheet_xml(sheet, &shared_strings).into_bytes(),
            ));
        }
        zip_parts(&parts)
    }
}

/// Helper for fluent sheet building within `XlsxBuilder`.
pub struct XlsxSheetAdder {
    builder: XlsxBuilder,
    sheet: SheetBuilder,
}

impl XlsxSheetAdder {
    #[must_use]
    pub fn add_cell<V: Into<CellValue>>(mut self, cell_ref: &str, value: V) -> Self {
        self.sheet = self.sheet.cell(cell_ref, value);
        self
    }

    /// Finish the current sheet and return the builder.
    #[must_use]
    pub fn done(mut self) -> XlsxBuilder {
        self.builder.sheets.push(self.sheet);
        self.builder
    }

    /// Build the XLSX directly (finishes the current sheet automatically).
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.done().build()
    }
}

fn xlsx_content_types(sheet_count: usize) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    xml.push_str(r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#);
    for i in 1..=sheet_count {
        xml.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
    }
    xml.push_str("</Types>");
    xml
}

fn xlsx_root_rels() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string()
}

fn workbook_rels(sheet_count: usize, shared_strings: bool) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for i in 1..=sheet_count {
        xml.push_str(&format!(
            r#"<Relationship Id="rId{i}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{i}.xml"/>"#
        ));
    }
    if shared_strings {
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#,
            sheet_count + 1
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

fn workbook_xml(sheets: &[SheetBuilder]) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(&format!(
        r#"<workbook xmlns="{NS_SPREADSHEET}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#
    ));
    xml.push_str("<sheets>");
    for (i, sheet) in sheets.iter().enumerate() {
        xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape_xml(&sheet.name),
            i + 1,
            i + 1
        ));
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn shared_strings_xml(strings: &[String]) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(&format!(
        r#"<sst xmlns="{NS_SPREADSHEET}" count="{}" uniqueCount="{}">"#,
        strings.len(),
        strings.len()
    ));
    for s in strings {
        xml.push_str(&format!(
            r#"<si><t xml:space="preserve">{}</t></si>"#,
            escape_xml(s)
        ));
    }
    xml.push_str("</sst>");
    xml
}

/// Rows and cells are written in ascending order, as spreadsheet producers do.
fn sheet_xml(sheet: &SheetBuilder, shared_strings: &[String]) -> String {
    let mut rows: BTreeMap<u32, BTreeMap<u32, (&str, &CellValue)>> = BTreeMap::new();
    for (cell_ref, value) in &sheet.cells {
        let (col, row) = parse_cell_ref(cell_ref).expect("fixture cell reference");
        rows.entry(row)
            .or_default()
            .insert(col, (cell_ref.as_str(), value));
    }

    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(&format!(r#"<worksheet xmlns="{NS_SPREADSHEET}">"#));
    xml.push_str(r#"<dimension ref="A1"/><sheetData>"#);
    for (row, cells) in rows {
        xml.push_str(&format!(r#"<row r="{}">"#, row + 1));
        for (cell_ref, value) in cells.into_values() {
            xml.push_str(&cell_xml(cell_ref, value, shared_strings));
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn cell_xml(cell_ref: &str, value: &CellValue, shared_strings: &[String]) -> String {
    match value {
        CellValue::Shared(s) => {
            let idx = shared_strings.iter().position(|x| x == s).unwrap_or(0);
            format!(r#"<c r="{cell_ref}" t="s"><v>{idx}</v></c>"#)
        }
        CellValue::Inline(s) => format!(
            r#"<c r="{cell_ref}" t="inlineStr"><is><t>{}</t></is></c>"#,
            escape_xml(s)
        ),
        CellValue::Number(n) => format!(r#"<c r="{cell_ref}"><v>{n}</v></c>"#),
        CellValue::Boolean(b) => format!(r#"<c r="{cell_ref}" t="b"><v>{}</v></c>"#, u8::from(*b)),
        CellValue::Formula { formula, cached } => format!(
            r#"<c r="{cell_ref}"><f>{}</f><v>{cached}</v></c>"#,
            escape_xml(formula)
        ),
        CellValue::Empty => format!(r#"<c r="{cell_ref}"/>"#),
    }
}

// ============================================================================
// Chart XML Builder
// ============================================================================

/// One `c:ser` element. Container names (`c:val` or `c:yVal`, `c:cat` or
/// `c:xVal`) are chosen from the enclosing block when the chart is built.
#[derive(Debug, Clone, Default)]
pub struct SeriesBuilder {
    tx: Option<String>,
    cat: Option<String>,
    val: Option<String>,
    x: Option<String>,
}

impl SeriesBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Series name from a string reference, optionally cached.
    #[must_use]
    pub fn name_ref(mut self, formula: &str, cached: Option<&str>) -> Self {
        let cache = cached.map(|c| str_cache("strCache", &[c])).unwrap_or_default();
        self.tx = Some(format!(
            "<c:strRef><c:f>{}</c:f>{cache}</c:strRef>",
            escape_xml(formula)
        ));
        self
    }

    /// Series name as a literal `c:v`.
    #[must_use]
    pub fn name_literal(mut self, name: &str) -> Self {
        self.tx = Some(format!("<c:v>{}</c:v>", escape_xml(name)));
        self
    }

    #[must_use]
    pub fn cat_ref(mut self, formula: &str, cached: Option<&[&str]>) -> Self {
        let cache = cached.map(|c| str_cache("strCache", c)).unwrap_or_default();
        self.cat = Some(format!(
            "<c:strRef><c:f>{}</c:f>{cache}</c:strRef>",
            escape_xml(formula)
        ));
        self
    }

    #[must_use]
    pub fn cat_literal(mut self, names: &[&str]) -> Self {
        self.cat = Some(str_cache("strLit", names));
        self
    }

    /// Multi-level categories. `levels` are in storage order (innermost
    /// first), each a sparse list of `(index, name)`.
    #[must_use]
    pub fn cat_multi_level(
        mut self,
        formula: &str,
        point_count: usize,
        levels: Option<&[&[(u32, &str)]]>,
    ) -> Self {
        let cache = levels
            .map(|levels| {
                let mut xml = format!(r#"<c:multiLvlStrCache><c:ptCount val="{point_count}"/>"#);
                for level in levels {
                    xml.push_str("<c:lvl>");
                    for (idx, name) in *level {
                        xml.push_str(&format!(
                            r#"<c:pt idx="{idx}"><c:v>{}</c:v></c:pt>"#,
                            escape_xml(name)
                        ));
                    }
                    xml.push_str("</c:lvl>");
                }
                xml.push_str("</c:multiLvlStrCache>");
                xml
            })
            .unwrap_or_default();
        self.cat = Some(format!(
            "<c:multiLvlStrRef><c:f>{}</c:f>{cache}</c:multiLvlStrRef>",
            escape_xml(formula)
        ));
        self
    }

    #[must_use]
    pub fn val_ref(mut self, formula: &str, cached: Option<&[f64]>) -> Self {
        self.val = Some(num_ref(formula, cached));
        self
    }

    #[must_use]
    pub fn val_literal(mut self, values: &[f64]) -> Self {
        self.val = Some(num_cache("numLit", values));
        self
    }

    #[must_use]
    pub fn x_ref(mut self, formula: &str, cached: Option<&[f64]>) -> Self {
        self.x = Some(num_ref(formula, cached));
        self
    }

    #[must_use]
    pub fn x_literal(mut self, values: &[f64]) -> Self {
        self.x = Some(num_cache("numLit", values));
        self
    }

    fn to_xml(&self, idx: usize, block: &str) -> String {
        let (cat_name, val_name) = match block {
            "scatterChart" | "bubbleChart" => ("xVal", "yVal"),
            _ => ("cat", "val"),
        };
        let mut xml = format!(r#"<c:ser><c:idx val="{idx}"/><c:order val="{idx}"/>"#);
        if let Some(tx) = &self.tx {
            xml.push_str(&format!("<c:tx>{tx}</c:tx>"));
        }
        if let Some(cat) = self.cat.as_ref().or(self.x.as_ref()) {
            xml.push_str(&format!("<c:{cat_name}>{cat}</c:{cat_name}>"));
        }
        if let Some(val) = &self.val {
            xml.push_str(&format!("<c:{val_name}>{val}</c:{val_name}>"));
        }
        xml.push_str("</c:ser>");
        xml
    }
}

fn str_cache(element: &str, names: &[&str]) -> String {
    let mut xml = format!(r#"<c:{element}><c:ptCount val="{}"/>"#, names.len());
    for (i, name) in names.iter().enumerate() {
        xml.push_str(&format!(
            r#"<c:pt idx="{i}"><c:v>{}</c:v></c:pt>"#,
            escape_xml(name)
        ));
    }
    xml.push_str(&format!("</c:{element}>"));
    xml
}

fn num_cache(element: &str, values: &[f64]) -> String {
    let mut xml = format!(
        r#"<c:{element}><c:formatCode>General</c:formatCode><c:ptCount val="{}"/>"#,
        values.len()
    );
    for (i, value) in values.iter().enumerate() {
        xml.push_str(&format!(r#"<c:pt idx="{i}"><c:v>{value}</c:v></c:pt>"#));
    }
    xml.push_str(&format!("</c:{element}>"));
    xml
}

fn num_ref(formula: &str, cached: Option<&[f64]>) -> String {
    let cache = cached.map(|c| num_cache("numCache", c)).unwrap_or_default();
    format!("<c:numRef><c:f>{}</c:f>{cache}</c:numRef>", escape_xml(formula))
}

/// Builder for a chart part.
#[derive(Debug, Clone, Default)]
pub struct ChartXmlBuilder {
    title: Option<String>,
    blocks: Vec<(String, Vec<SeriesBuilder>)>,
    external_data: Option<String>,
}

impl ChartXmlBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rich-text title.
    #[must_use]
    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Add a typed block such as `barChart` or `lineChart`.
    #[must_use]
    pub fn block(mut self, tag: &str, series: Vec<SeriesBuilder>) -> Self {
        self.blocks.push((tag.to_string(), series));
        self
    }

    /// Point `c:externalData` at a relationship id.
    #[must_use]
    pub fn external_data(mut self, r_id: &str) -> Self {
        self.external_data = Some(r_id.to_string());
        self
    }

    #[must_use]
    pub fn build(self) -> String {
        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str(&format!(
            r#"<c:chartSpace xmlns:c="{NS_CHART}" xmlns:a="{NS_DRAWING}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#
        ));
        xml.push_str("<c:chart>");
        if let Some(title) = &self.title {
            xml.push_str(&format!(
                "<c:title><c:tx><c:rich><a:bodyPr/><a:p><a:r><a:t>{}</a:t></a:r></a:p></c:rich></c:tx></c:title>",
                escape_xml(title)
            ));
        }
        xml.push_str("<c:plotArea><c:layout/>");
        let mut idx = 0;
        for (tag, series) in &self.blocks {
            xml.push_str(&format!("<c:{tag}>"));
            match tag.as_str() {
                "barChart" | "bar3DChart" => {
                    xml.push_str(r#"<c:barDir val="col"/><c:grouping val="clustered"/>"#);
                }
                "scatterChart" => xml.push_str(r#"<c:scatterStyle val="lineMarker"/>"#),
                "lineChart" | "areaChart" => xml.push_str(r#"<c:grouping val="standard"/>"#),
                _ => {}
            }
            xml.push_str(r#"<c:varyColors val="0"/>"#);
            for ser in series {
                xml.push_str(&ser.to_xml(idx, tag));
                idx += 1;
            }
            xml.push_str(r#"<c:axId val="1"/><c:axId val="2"/>"#);
            xml.push_str(&format!("</c:{tag}>"));
        }
        xml.push_str("<c:catAx/><c:valAx/></c:plotArea></c:chart>");
        if let Some(r_id) = &self.external_data {
            xml.push_str(&format!(
                r#"<c:externalData r:id="{r_id}"><c:autoUpdate val="0"/></c:externalData>"#
            ));
        }
        xml.push_str("</c:chartSpace>");
        xml
    }
}

// ============================================================================
// Package Builder
// ============================================================================

/// Builder for a pptx-like host package holding charts and their workbooks.
#[derive(Debug, Default)]
pub struct PackageBuilder {
    charts: Vec<(String, Option<Vec<u8>>)>,
    chart_overrides: bool,
}

impl PackageBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            charts: Vec::new(),
            chart_overrides: true,
        }
    }

    /// Add `ppt/charts/chartN.xml`, with an embedded workbook when given.
    /// The chart XML should reference the workbook as `rId1`.
    #[must_use]
    pub fn chart(mut self, xml: String, workbook: Option<Vec<u8>>) -> Self {
        self.charts.push((xml, workbook));
        self
    }

    /// Omit chart content-type overrides, leaving only the part names.
    #[must_use]
    pub fn without_chart_overrides(mut self) -> Self {
        self.chart_overrides = false;
        self
    }

    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let mut types = String::new();
        types.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        types.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
        types.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
        types.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
        types.push_str(r#"<Default Extension="xlsx" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"/>"#);
        if self.chart_overrides {
            for i in 1..=self.charts.len() {
                types.push_str(&format!(
                    r#"<Override PartName="/ppt/charts/chart{i}.xml" ContentType="{CT_CHART}"/>"#
                ));
            }
        }
        types.push_str("</Types>");

        let mut parts: Vec<(String, Vec<u8>)> = vec![
            ("[Content_Types].xml".into(), types.into_bytes()),
            (
                "ppt/presentation.xml".into(),
                br#"<?xml version="1.0" encoding="UTF-8"?><p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"/>"#.to_vec(),
            ),
        ];
        for (i, (xml, workbook)) in self.charts.into_iter().enumerate() {
            let n = i + 1;
            parts.push((format!("ppt/charts/chart{n}.xml"), xml.into_bytes()));
            if let Some(workbook) = workbook {
                parts.push((
                    format!("ppt/charts/_rels/chart{n}.xml.rels"),
                    format!(
                        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_PACKAGE}" Target="../embeddings/Microsoft_Excel_Worksheet{n}.xlsx"/></Relationships>"#
                    )
                    .into_bytes(),
                ));
                parts.push((
                    format!("ppt/embeddings/Microsoft_Excel_Worksheet{n}.xlsx"),
                    workbook,
                ));
            }
        }
        zip_parts(&parts)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn zip_parts(parts: &[(String, Vec<u8>)]) -> Vec<u8> {
    let cursor = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(cursor);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, bytes) in parts {
        zip.start_file(name.as_str(), options).expect("start zip entry");
        zip.write_all(bytes).expect("write zip entry");
    }
    zip.finish().expect("Failed to finish ZIP").into_inner()
}

/// Read one entry of a zip as text.
pub fn read_entry(zip_bytes: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes)).expect("open zip");
    let mut file = archive.by_name(name).expect("zip entry");
    let mut out = String::new();
    file.read_to_string(&mut out).expect("read zip entry");
    out
}

/// Read one entry of a zip as bytes.
pub fn read_entry_bytes(zip_bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes)).expect("open zip");
    let mut file = archive.by_name(name).expect("zip entry");
    let mut out = Vec::new();
    file.read_to_end(&mut out).expect("read zip entry");
    out
}

/// Cell references of one row of a worksheet XML, in document order.
pub fn row_cell_refs(sheet_xml: &str, row: u32) -> Vec<String> {
    let marker = format!(r#"<row r="{row}""#);
    let Some(start) = sheet_xml.find(&marker) else {
        return Vec::new();
    };
    let rest = &sheet_xml[start..];
    let end = rest.find("</row>").unwrap_or(rest.len());
    rest[..end]
        .split("<c r=\"")
        .skip(1)
        .filter_map(|chunk| chunk.split('"').next())
        .map(str::to_string)
        .collect()
}

/// Row numbers of a worksheet XML, in document order.
pub fn row_numbers(sheet_xml: &str) -> Vec<u32> {
    sheet_xml
        .split("<row r=\"")
        .skip(1)
        .filter_map(|chunk| chunk.split('"').next()?.parse().ok())
        .collect()
}

/// Escape XML special characters.
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
