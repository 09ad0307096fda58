//! Value references: an optional inline cache plus an optional formula.
//!
//! Chart XML stores every data run as one of
//!
//! ```xml
//! <c:numRef><c:f>Sheet1!$B$2:$B$4</c:f><c:numCache>
//!   <c:ptCount val="3"/><c:pt idx="0"><c:v>10</c:v></c:pt>...
//! </c:numCache></c:numRef>
//! <c:strRef>..<c:strCache>..</c:strCache></c:strRef>
//! <c:numLit>..</c:numLit> / <c:strLit>..</c:strLit>
//! ```
//!
//! Reads prefer the cache, which is what the producing application displays
//! without recalculating. The workbook is consulted only when the cache is
//! absent.

use crate::cell_ref::SheetAddress;
use crate::error::{ChartBindError, Result};
use crate::formula::expand_formula;
use crate::xml_tree::XmlElement;

/// Anything that can answer "what text is in this cell".
///
/// The embedded workbook implements this; tests can use a map.
pub trait CellSource {
    /// Text of the cell, or `None` when the cell does not exist.
    ///
    /// Fails with `SheetNotFound` when the sheet is absent.
    fn cell_text(&mut self, address: &SheetAddress) -> Result<Option<String>>;
}

/// One cached point: its `idx` attribute and raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPoint {
    pub index: u32,
    pub text: String,
}

/// Which element family the reference was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Number,
    String,
}

/// A data run's cache and formula, read from chart XML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueReference {
    pub kind: RefKind,
    pub formula: Option<String>,
    pub cache: Option<Vec<CachedPoint>>,
    pub format_code: Option<String>,
}

const REF_ELEMENTS: [&str; 4] = ["numRef", "strRef", "numLit", "strLit"];

impl ValueReference {
    /// Read the reference held by a container such as `c:val`, `c:cat`,
    /// `c:tx` or `c:xVal`. Returns `None` when it holds none (for example a
    /// multi-level category reference, or a literal `c:v` series name).
    pub fn from_container(container: &XmlElement) -> Option<Self> {
        container
            .elements()
            .find(|el| REF_ELEMENTS.contains(&el.local_name()))
            .map(Self::from_ref_element)
    }

    /// Read a `numRef`/`strRef`/`numLit`/`strLit` element.
    pub fn from_ref_element(el: &XmlElement) -> Self {
        let kind = match el.local_name() {
            "numRef" | "numLit" => RefKind::Number,
            _ => RefKind::String,
        };
        let formula = el
            .child_text("f")
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        let cache_el = cache_element(el);
        let cache = cache_el.map(|c| {
            c.children_named("pt")
                .map(|pt| CachedPoint {
                    index: pt.attr("idx").and_then(|v| v.parse().ok()).unwrap_or(0),
                    text: pt.child_text("v").unwrap_or_default(),
                })
                .collect()
        });
        let format_code = cache_el.and_then(|c| c.child_text("formatCode"));

        Self {
            kind,
            formula,
            cache,
            format_code,
        }
    }

    /// Resolve to ordered raw text values.
    pub fn resolve_text(&self, source: &mut dyn CellSource) -> Result<Vec<String>> {
        if let Some(cache) = &self.cache {
            return Ok(cache.iter().map(|pt| pt.text.clone()).collect());
        }
        let formula = self.require_formula()?;
        let mut out = Vec::new();
        for address in expand_formula(formula)? {
            let text = fetch(source, &address, formula)?;
            out.push(text.unwrap_or_default());
        }
        Ok(out)
    }

    /// Resolve to ordered numbers; empty text reads as `0`.
    pub fn resolve_numbers(&self, source: &mut dyn CellSource) -> Result<Vec<f64>> {
        self.resolve_text(source)?
            .iter()
            .map(|text| parse_number(text))
            .collect()
    }

    /// Expanded formula addresses, or an empty list without a formula.
    pub fn addresses(&self) -> Result<Vec<SheetAddress>> {
        match &self.formula {
            Some(f) => expand_formula(f),
            None => Ok(Vec::new()),
        }
    }

    /// Per-value bindings, paired positionally with the values `resolve_*`
    /// returns.
    ///
    /// With a cache, addresses and cached points are paired up to the shorter
    /// of the two lists; positions past that have no binding. Without a
    /// cache every value came from an address, so all are bound.
    pub fn bindings(&self) -> Result<Vec<Option<SheetAddress>>> {
        let addresses = self.addresses()?;
        let Some(cache) = &self.cache else {
            return Ok(addresses.into_iter().map(Some).collect());
        };
        if self.formula.is_some() && addresses.len() != cache.len() {
            tracing::warn!(
                formula = self.formula.as_deref().unwrap_or_default(),
                addresses = addresses.len(),
                cached = cache.len(),
                "address and cache counts differ; pairing positionally"
            );
        }
        let mut addresses = addresses.into_iter();
        Ok(cache.iter().map(|_| addresses.next()).collect())
    }

    fn require_formula(&self) -> Result<&str> {
        self.formula.as_deref().ok_or_else(|| {
            ChartBindError::UnresolvableReference("reference has neither cache nor formula".into())
        })
    }
}

fn fetch(
    source: &mut dyn CellSource,
    address: &SheetAddress,
    formula: &str,
) -> Result<Option<String>> {
    match source.cell_text(address) {
        Err(ChartBindError::SheetNotFound { sheet }) => Err(
            ChartBindError::UnresolvableReference(format!(
                "sheet {sheet:?} referenced by {formula:?} does not exist"
            )),
        ),
        other => other,
    }
}

/// Parse cell or cache text as a culture-invariant number; blank is `0`.
pub fn parse_number(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    trimmed
        .parse::<f64>()
        .map_err(|_| ChartBindError::Parse(format!("not a number: {trimmed:?}")))
}

/// Format a number the way caches store it: shortest round-tripping form,
/// integers without a trailing `.0`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

/// The cache element under a reference (`numCache`/`strCache`), or the
/// literal element itself.
pub(crate) fn cache_element(ref_el: &XmlElement) -> Option<&XmlElement> {
    match ref_el.local_name() {
        "numLit" | "strLit" => Some(ref_el),
        _ => ref_el.child("numCache").or_else(|| ref_el.child("strCache")),
    }
}

fn cache_element_mut(ref_el: &mut XmlElement) -> Option<&mut XmlElement> {
    if matches!(ref_el.local_name(), "numLit" | "strLit") {
        return Some(ref_el);
    }
    let cache = if ref_el.local_name() == "numRef" {
        "numCache"
    } else {
        "strCache"
    };
    ref_el.child_mut(cache)
}

/// Find the reference element under a container, mutably.
pub(crate) fn ref_element_mut(container: &mut XmlElement) -> Option<&mut XmlElement> {
    container
        .elements_mut()
        .find(|el| REF_ELEMENTS.contains(&el.local_name()))
}

/// Overwrite the `position`-th cached point's text.
///
/// Returns `false` when the reference has no cache or no such point.
pub(crate) fn write_cached_text(ref_el: &mut XmlElement, position: usize, text: &str) -> bool {
    let Some(cache) = cache_element_mut(ref_el) else {
        return false;
    };
    let Some(pt) = cache.children_named_mut("pt").nth(position) else {
        return false;
    };
    match pt.child_mut("v") {
        Some(v) => v.set_text(text),
        None => {
            let name = pt.qualify("v");
            pt.push_element(XmlElement::new(name).with_text(text));
        }
    }
    true
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
    use crate::xml_tree::XmlDocument;
    use std::collections::HashMap;

    struct MapSource {
        sheets: HashMap<String, HashMap<String, String>>,
        calls: usize,
    }

    impl MapSource {
        fn new(sheet: &str, cells: &[(&str, &str)]) -> Self {
            let cells = cells
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect();
            Self {
                sheets: HashMap::from([(sheet.to_string(), cells)]),
                calls: 0,
            }
        }
    }

    impl CellSource for MapSource {
        fn cell_text(&mut self, address: &SheetAddress) -> Result<Option<String>> {
            self.calls += 1;
            let sheet = self
                .sheets
                .get(&address.sheet)
                .ok_or_else(|| ChartBindError::sheet_not_found(&address.sheet))?;
            Ok(sheet.get(&address.cell).cloned())
        }
    }

    fn element(xml: &str) -> XmlElement {
        XmlDocument::parse(xml.as_bytes()).unwrap().root
    }

    const NUM_REF: &str = r#"<c:val xmlns:c="c"><c:numRef><c:f>Sheet1!$B$2:$B$4</c:f>
        <c:numCache><c:formatCode>General</c:formatCode><c:ptCount val="3"/>
        <c:pt idx="0"><c:v>10</c:v></c:pt><c:pt idx="1"><c:v>20.5</c:v></c:pt>
        <c:pt idx="2"><c:v>30</c:v></c:pt></c:numCache></c:numRef></c:val>"#;

    #[test]
    fn test_cache_takes_precedence_over_workbook() {
        let r = ValueReference::from_container(&element(NUM_REF)).unwrap();
        assert_eq!(r.kind, RefKind::Number);
        assert_eq!(r.format_code.as_deref(), Some("General"));
        let mut source = MapSource::new("Sheet1", &[("B2", "99"), ("B3", "98"), ("B4", "97")]);
        assert_eq!(r.resolve_numbers(&mut source).unwrap(), vec![10.0, 20.5, 30.0]);
        assert_eq!(source.calls, 0);
    }

    #[test]
    fn test_formula_only_reads_workbook() {
        let r = ValueReference::from_container(&element(
            r#"<c:val xmlns:c="c"><c:numRef><c:f>Sheet1!$B$2:$B$4</c:f></c:numRef></c:val>"#,
        ))
        .unwrap();
        let mut source = MapSource::new("Sheet1", &[("B2", "1.5"), ("B4", "3")]);
        // B3 is blank and reads as zero
        assert_eq!(r.resolve_numbers(&mut source).unwrap(), vec![1.5, 0.0, 3.0]);
    }

    #[test]
    fn test_missing_sheet_is_unresolvable() {
        let r = ValueReference::from_container(&element(
            r#"<c:val xmlns:c="c"><c:numRef><c:f>Nope!$B$2</c:f></c:numRef></c:val>"#,
        ))
        .unwrap();
        let mut source = MapSource::new("Sheet1", &[]);
        assert!(matches!(
            r.resolve_numbers(&mut source),
            Err(ChartBindError::UnresolvableReference(_))
        ));
    }

    #[test]
    fn test_neither_cache_nor_formula() {
        let r = ValueReference::from_container(&element(
            r#"<c:val xmlns:c="c"><c:numRef/></c:val>"#,
        ))
        .unwrap();
        let mut source = MapSource::new("Sheet1", &[]);
        assert!(matches!(
            r.resolve_text(&mut source),
            Err(ChartBindError::UnresolvableReference(_))
        ));
    }

    #[test]
    fn test_bindings_pair_up_to_shorter_list() {
        let r = ValueReference::from_container(&element(
            r#"<c:val xmlns:c="c"><c:numRef><c:f>Sheet1!$B$2:$B$3</c:f><c:numCache>
            <c:pt idx="0"><c:v>1</c:v></c:pt><c:pt idx="1"><c:v>2</c:v></c:pt>
            <c:pt idx="2"><c:v>3</c:v></c:pt></c:numCache></c:numRef></c:val>"#,
        ))
        .unwrap();
        let bindings = r.bindings().unwrap();
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings[0], Some(SheetAddress::new("Sheet1", "B2")));
        assert_eq!(bindings[1], Some(SheetAddress::new("Sheet1", "B3")));
        assert_eq!(bindings[2], None);
    }

    #[test]
    fn test_literal_is_cache_only() {
        let r = ValueReference::from_container(&element(
            r#"<c:cat xmlns:c="c"><c:strLit><c:ptCount val="2"/>
            <c:pt idx="0"><c:v>East</c:v></c:pt><c:pt idx="1"><c:v>West</c:v></c:pt>
            </c:strLit></c:cat>"#,
        ))
        .unwrap();
        assert_eq!(r.kind, RefKind::String);
        assert!(r.formula.is_none());
        let mut source = MapSource::new("Sheet1", &[]);
        assert_eq!(r.resolve_text(&mut source).unwrap(), vec!["East", "West"]);
        assert_eq!(r.bindings().unwrap(), vec![None, None]);
    }

    #[test]
    fn test_write_cached_text() {
        let mut val = element(NUM_REF);
        let ref_el = ref_element_mut(&mut val).unwrap();
        assert!(write_cached_text(ref_el, 1, "42"));
        assert!(!write_cached_text(ref_el, 7, "42"));
        let r = ValueReference::from_container(&val).unwrap();
        assert_eq!(r.cache.unwrap()[1].text, "42");
    }

    #[test]
    fn test_parse_and_format_number() {
        assert_eq!(parse_number("").unwrap(), 0.0);
        assert_eq!(parse_number(" 2.25 ").unwrap(), 2.25);
        assert!(parse_number("abc").is_err());
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.5), "-0.5");
        assert_eq!(format_number(1234.125), "1234.125");
    }
}
