//! Category resolution, flat and multi-level.
//!
//! Multi-level category data is stored as one `c:lvl` per level, innermost
//! first. Each level lists only the points where a name *starts*; the name
//! spans forward to the next listed index on the same level:
//!
//! ```text
//! lvl 0: 0=Dresses 1=Shirts 2=Belts
//! lvl 1: 0=Clothing        2=Accessories
//! ```
//!
//! so `Dresses` and `Shirts` sit under `Clothing`, `Belts` under
//! `Accessories`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cell_ref::{CellAddress, SheetAddress};
use crate::error::{ChartBindError, Result};
use crate::formula::{parse_formula, range_corners};
use crate::value_ref::{CellSource, ValueReference};
use crate::xml_tree::XmlElement;

/// A category label, with its parent on a multi-level axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    /// Point index this category starts at.
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent: Option<Box<Category>>,
    /// Workbook cell the name is read from, for flat formula-backed axes.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub binding: Option<SheetAddress>,
}

impl Category {
    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_deref().map(|p| p.name.as_str())
    }
}

/// One level of a multi-level axis: sparse `(index, name)` span starts.
pub type Level = Vec<(u32, String)>;

/// Whether a category container holds a multi-level reference.
pub fn is_multi_level(cat: &XmlElement) -> bool {
    cat.child("multiLvlStrRef").is_some()
}

/// Resolve the categories held by a series' `c:cat` element.
pub fn resolve_categories(cat: &XmlElement, source: &mut dyn CellSource) -> Result<Vec<Category>> {
    if let Some(multi) = cat.child("multiLvlStrRef") {
        let levels = read_levels(multi, source)?;
        return Ok(build_hierarchy(&levels));
    }

    let Some(reference) = ValueReference::from_container(cat) else {
        return Ok(Vec::new());
    };
    let names = reference.resolve_text(source)?;
    let mut bindings = reference.bindings()?.into_iter();

    Ok(names
        .into_iter()
        .enumerate()
        .map(|(i, name)| Category {
            name,
            index: u32::try_from(i).unwrap_or(u32::MAX),
            parent: None,
            binding: bindings.next().flatten(),
        })
        .collect())
}

/// Rebuild the hierarchy from levels in storage order (innermost first).
///
/// Levels are walked outermost first. Each category's parent is the
/// category on the previous level with the greatest start index not after
/// its own. The innermost level's categories are returned, ordered by index.
pub fn build_hierarchy(levels: &[Level]) -> Vec<Category> {
    let mut previous: BTreeMap<u32, Category> = BTreeMap::new();

    for (depth, level) in levels.iter().rev().enumerate() {
        let mut current = BTreeMap::new();
        for (index, name) in level {
            let parent = if depth == 0 {
                None
            } else {
                previous
                    .range(..=*index)
                    .next_back()
                    .map(|(_, parent)| Box::new(parent.clone()))
            };
            current.insert(
                *index,
                Category {
                    name: name.clone(),
                    index: *index,
                    parent,
                    binding: None,
                },
            );
        }
        previous = current;
    }

    previous.into_values().collect()
}

/// Read levels from the multi-level cache, or from the workbook when the
/// reference has only a formula.
fn read_levels(multi: &XmlElement, source: &mut dyn CellSource) -> Result<Vec<Level>> {
    if let Some(cache) = multi.child("multiLvlStrCache") {
        return Ok(cache
            .children_named("lvl")
            .map(|lvl| {
                lvl.children_named("pt")
                    .map(|pt| {
                        let idx = pt.attr("idx").and_then(|v| v.parse().ok()).unwrap_or(0);
                        (idx, pt.child_text("v").unwrap_or_default())
                    })
                    .collect()
            })
            .collect());
    }

    let formula = multi
        .child_text("f")
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .ok_or_else(|| {
            ChartBindError::UnresolvableReference(
                "multi-level categories have neither cache nor formula".into(),
            )
        })?;
    levels_from_workbook(&formula, source)
}

/// In the sheet, the outermost level is the leftmost column of the range and
/// a name appears only on the row where its span starts.
fn levels_from_workbook(formula: &str, source: &mut dyn CellSource) -> Result<Vec<Level>> {
    let fref = parse_formula(formula)?;
    let Some((start, end)) = range_corners(&fref.range) else {
        return Ok(Vec::new());
    };

    let mut levels = Vec::new();
    for col in start.col..=end.col {
        let mut level = Level::new();
        for row in start.row..=end.row {
            let address = SheetAddress::new(
                fref.sheet.clone(),
                CellAddress::new(col, row).to_string(),
            );
            let text = match source.cell_text(&address) {
                Err(ChartBindError::SheetNotFound { sheet }) => {
                    return Err(ChartBindError::UnresolvableReference(format!(
                        "sheet {sheet:?} referenced by {formula:?} does not exist"
                    )))
                }
                other => other?,
            };
            if let Some(text) = text.filter(|t| !t.is_empty()) {
                level.push((row - start.row, text));
            }
        }
        levels.push(level);
    }
    // Storage order is innermost first
    levels.reverse();
    Ok(levels)
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
    use crate::xml_tree::XmlDocument;
    use std::collections::HashMap;

    struct Cells(HashMap<String, String>);

    impl CellSource for Cells {
        fn cell_text(&mut self, address: &SheetAddress) -> Result<Option<String>> {
            if address.sheet != "Sheet1" {
                return Err(ChartBindError::sheet_not_found(&address.sheet));
            }
            Ok(self.0.get(&address.cell).cloned())
        }
    }

    fn cells(pairs: &[(&str, &str)]) -> Cells {
        Cells(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    fn level(pairs: &[(u32, &str)]) -> Level {
        pairs.iter().map(|(i, n)| (*i, (*n).to_string())).collect()
    }

    #[test]
    fn test_two_level_hierarchy() {
        let levels = vec![
            level(&[(0, "Dresses"), (1, "Shirts"), (2, "Belts")]),
            level(&[(0, "Clothing"), (2, "Accessories")]),
        ];
        let cats = build_hierarchy(&levels);
        let names: Vec<_> = cats.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Dresses", "Shirts", "Belts"]);
        assert_eq!(cats[0].parent_name(), Some("Clothing"));
        assert_eq!(cats[1].parent_name(), Some("Clothing"));
        assert_eq!(cats[2].parent_name(), Some("Accessories"));
    }

    #[test]
    fn test_three_levels_chain_parents() {
        let levels = vec![
            level(&[(0, "Q1"), (1, "Q2"), (2, "Q1"), (3, "Q2")]),
            level(&[(0, "H1"), (2, "H1")]),
            level(&[(0, "2023"), (2, "2024")]),
        ];
        let cats = build_hierarchy(&levels);
        assert_eq!(cats.len(), 4);
        let last = &cats[3];
        assert_eq!(last.parent_name(), Some("H1"));
        assert_eq!(
            last.parent.as_ref().unwrap().parent_name(),
            Some("2024")
        );
        assert_eq!(
            cats[1].parent.as_ref().unwrap().parent_name(),
            Some("2023")
        );
    }

    #[test]
    fn test_single_level_and_unsorted_input() {
        let cats = build_hierarchy(&[level(&[(2, "C"), (0, "A"), (1, "B")])]);
        let names: Vec<_> = cats.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(cats.iter().all(|c| c.parent.is_none()));
        assert!(build_hierarchy(&[]).is_empty());
    }

    #[test]
    fn test_child_before_first_parent_has_no_parent() {
        let levels = vec![level(&[(0, "x"), (1, "y")]), level(&[(1, "Top")])];
        let cats = build_hierarchy(&levels);
        assert_eq!(cats[0].parent, None);
        assert_eq!(cats[1].parent_name(), Some("Top"));
    }

    #[test]
    fn test_multi_level_cache() {
        let xml = r#"<c:cat xmlns:c="c"><c:multiLvlStrRef><c:f>Sheet1!$A$2:$B$4</c:f>
            <c:multiLvlStrCache><c:ptCount val="3"/>
            <c:lvl><c:pt idx="0"><c:v>Dresses</c:v></c:pt><c:pt idx="1"><c:v>Shirts</c:v></c:pt><c:pt idx="2"><c:v>Belts</c:v></c:pt></c:lvl>
            <c:lvl><c:pt idx="0"><c:v>Clothing</c:v></c:pt><c:pt idx="2"><c:v>Accessories</c:v></c:pt></c:lvl>
            </c:multiLvlStrCache></c:multiLvlStrRef></c:cat>"#;
        let cat = XmlDocument::parse(xml.as_bytes()).unwrap().root;
        assert!(is_multi_level(&cat));
        let cats = resolve_categories(&cat, &mut cells(&[])).unwrap();
        assert_eq!(cats[2].name, "Belts");
        assert_eq!(cats[2].parent_name(), Some("Accessories"));
    }

    #[test]
    fn test_multi_level_from_workbook_columns() {
        let xml = r#"<c:cat xmlns:c="c"><c:multiLvlStrRef><c:f>Sheet1!$A$2:$B$4</c:f></c:multiLvlStrRef></c:cat>"#;
        let cat = XmlDocument::parse(xml.as_bytes()).unwrap().root;
        let mut source = cells(&[
            ("A2", "Clothing"),
            ("B2", "Dresses"),
            ("B3", "Shirts"),
            ("A4", "Accessories"),
            ("B4", "Belts"),
        ]);
        let cats = resolve_categories(&cat, &mut source).unwrap();
        let names: Vec<_> = cats.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Dresses", "Shirts", "Belts"]);
        assert_eq!(cats[1].parent_name(), Some("Clothing"));
        assert_eq!(cats[2].parent_name(), Some("Accessories"));
    }

    #[test]
    fn test_flat_categories_carry_bindings() {
        let xml = r#"<c:cat xmlns:c="c"><c:strRef><c:f>Sheet1!$A$2:$A$3</c:f><c:strCache>
            <c:pt idx="0"><c:v>East</c:v></c:pt><c:pt idx="1"><c:v>West</c:v></c:pt>
            </c:strCache></c:strRef></c:cat>"#;
        let cat = XmlDocument::parse(xml.as_bytes()).unwrap().root;
        assert!(!is_multi_level(&cat));
        let cats = resolve_categories(&cat, &mut cells(&[])).unwrap();
        assert_eq!(cats.len(), 2);
        assert_eq!(cats[1].name, "West");
        assert_eq!(cats[1].index, 1);
        assert_eq!(cats[1].binding, Some(SheetAddress::new("Sheet1", "A3")));
        assert!(cats[0].parent.is_none());
    }

    #[test]
    fn test_flat_categories_from_workbook() {
        let xml = r#"<c:cat xmlns:c="c"><c:strRef><c:f>'Sheet1'!$A$2:$A$3</c:f></c:strRef></c:cat>"#;
        let cat = XmlDocument::parse(xml.as_bytes()).unwrap().root;
        let cats = resolve_categories(&cat, &mut cells(&[("A2", "North")])).unwrap();
        assert_eq!(cats[0].name, "North");
        // Blank cell reads as empty text
        assert_eq!(cats[1].name, "");
    }
}
