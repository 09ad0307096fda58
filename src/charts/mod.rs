//! Chart parts and their data-binding views.

mod category;
mod chart;
mod series;
mod types;

pub use category::{build_hierarchy, Category, Level};
pub use chart::{Chart, ChartSummary};
pub use series::{Point, Series, SeriesGroup};
pub use types::{ChartKind, ChartTypeTag};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::namespaces::is_embedded_package_relationship;
use crate::package::Package;
use crate::xml_tree::{XmlDocument, XmlElement};

/// Identity of a chart within its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChartId(pub usize);

/// Resolved views, computed on first access and reset by every edit.
#[derive(Debug, Default)]
pub(crate) struct ChartMemo {
    groups: Option<Vec<SeriesGroup>>,
    categories: Option<Option<Vec<Category>>>,
}

impl ChartMemo {
    fn reset(&mut self) {
        self.groups = None;
        self.categories = None;
    }
}

/// A parsed chart part plus the path of its embedded workbook.
#[derive(Debug)]
pub struct ChartPart {
    path: String,
    doc: XmlDocument,
    embedding: Option<String>,
    dirty: bool,
    memo: ChartMemo,
}

impl ChartPart {
    /// Parse a chart part and resolve its `c:externalData` relationship.
    pub(crate) fn load(package: &Package, path: &str) -> Result<Self> {
        let doc = XmlDocument::parse(&package.read_part(path)?)?;
        let embedding = match doc.root.child("externalData").and_then(|e| e.attr_local("id")) {
            Some(r_id) => {
                let target = package
                    .relationships(path)?
                    .into_iter()
                    .find(|rel| {
                        rel.id == r_id
                            && !rel.external
                            && is_embedded_package_relationship(&rel.rel_type)
                    })
                    .map(|rel| rel.target);
                if target.is_none() {
                    tracing::warn!(chart = path, r_id, "external data relationship not found");
                }
                target
            }
            None => None,
        };
        Ok(Self {
            path: path.to_string(),
            doc,
            embedding,
            dirty: false,
            memo: ChartMemo::default(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Package part holding the embedded workbook, if the chart has one.
    pub fn embedding(&self) -> Option<&str> {
        self.embedding.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn root(&self) -> &XmlElement {
        &self.doc.root
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        self.doc.to_bytes()
    }

    pub(crate) fn mark_saved(&mut self) {
        self.dirty = false;
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.memo.reset();
        tracing::trace!(chart = %self.path, "chart views invalidated");
    }
}

fn plot_area(root: &XmlElement) -> Option<&XmlElement> {
    root.descend(&["chart", "plotArea"])
}

fn plot_area_mut(root: &mut XmlElement) -> Option<&mut XmlElement> {
    root.descend_mut(&["chart", "plotArea"])
}

/// Typed blocks under the plot area, in document order.
pub(crate) fn typed_blocks(root: &XmlElement) -> Vec<(ChartTypeTag, &XmlElement)> {
    plot_area(root)
        .map(|plot| {
            plot.elements()
                .filter_map(|el| ChartTypeTag::from_tag(el.local_name()).map(|tag| (tag, el)))
                .collect()
        })
        .unwrap_or_default()
}

/// The first series in document order, skipping typed blocks without one.
pub(crate) fn primary_series(root: &XmlElement) -> Option<(ChartTypeTag, &XmlElement)> {
    typed_blocks(root)
        .into_iter()
        .find_map(|(tag, block)| block.child("ser").map(|ser| (tag, ser)))
}

/// Every `c:ser` across all typed blocks, mutably, in document order.
pub(crate) fn series_elements_mut(root: &mut XmlElement) -> Vec<(ChartTypeTag, &mut XmlElement)> {
    let Some(plot) = plot_area_mut(root) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for block in plot.elements_mut() {
        let Some(tag) = ChartTypeTag::from_tag(block.local_name()) else {
            continue;
        };
        out.extend(block.children_named_mut("ser").map(|ser| (tag, ser)));
    }
    out
}

/// Chart title from rich text runs or a string reference cache.
pub(crate) fn chart_title(root: &XmlElement) -> Option<String> {
    let tx = root.descend(&["chart", "title", "tx"])?;
    if let Some(rich) = tx.child("rich") {
        let paragraphs: Vec<String> = rich
            .children_named("p")
            .map(|p| {
                p.elements()
                    .filter(|run| matches!(run.local_name(), "r" | "fld"))
                    .filter_map(|run| run.child_text("t"))
                    .collect()
            })
            .collect();
        let title = paragraphs.join("\n");
        return (!title.is_empty()).then_some(title);
    }
    crate::value_ref::ValueReference::from_container(tx)
        .and_then(|r| r.cache)
        .and_then(|cache| cache.into_iter().next())
        .map(|pt| pt.text)
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

    fn root(xml: &str) -> XmlElement {
        XmlDocument::parse(xml.as_bytes()).unwrap().root
    }

    #[test]
    fn test_rich_title() {
        let r = root(
            r#"<c:chartSpace xmlns:c="c" xmlns:a="a"><c:chart><c:title><c:tx><c:rich>
            <a:bodyPr/><a:p><a:r><a:t>Quarterly </a:t></a:r><a:r><a:t>Sales</a:t></a:r></a:p>
            <a:p><a:r><a:t>2024</a:t></a:r></a:p></c:rich></c:tx></c:title></c:chart></c:chartSpace>"#,
        );
        assert_eq!(chart_title(&r).as_deref(), Some("Quarterly Sales\n2024"));
    }

    #[test]
    fn test_title_keeps_space_only_run() {
        let r = root(
            r#"<c:chartSpace xmlns:c="c" xmlns:a="a"><c:chart><c:title><c:tx><c:rich>
            <a:p><a:r><a:t>Quarterly</a:t></a:r><a:r><a:t> </a:t></a:r><a:r><a:t>Sales</a:t></a:r></a:p>
            </c:rich></c:tx></c:title></c:chart></c:chartSpace>"#,
        );
        assert_eq!(chart_title(&r).as_deref(), Some("Quarterly Sales"));
        let reparsed = XmlDocument::parse(
            &XmlDocument {
                standalone: None,
                root: r,
            }
            .to_bytes()
            .unwrap(),
        )
        .unwrap();
        assert_eq!(chart_title(&reparsed.root).as_deref(), Some("Quarterly Sales"));
    }

    #[test]
    fn test_referenced_title_and_missing_title() {
        let r = root(
            r#"<c:chartSpace xmlns:c="c"><c:chart><c:title><c:tx><c:strRef><c:f>Sheet1!$A$1</c:f>
            <c:strCache><c:pt idx="0"><c:v>Revenue</c:v></c:pt></c:strCache></c:strRef></c:tx></c:title></c:chart></c:chartSpace>"#,
        );
        assert_eq!(chart_title(&r).as_deref(), Some("Revenue"));
        let none = root(r#"<c:chartSpace xmlns:c="c"><c:chart><c:plotArea/></c:chart></c:chartSpace>"#);
        assert_eq!(chart_title(&none), None);
    }

    #[test]
    fn test_series_elements_mut_spans_blocks() {
        let mut r = root(
            r#"<c:chartSpace xmlns:c="c"><c:chart><c:plotArea><c:barChart><c:ser/><c:ser/></c:barChart>
            <c:valAx/><c:lineChart><c:ser/></c:lineChart></c:plotArea></c:chart></c:chartSpace>"#,
        );
        let all = series_elements_mut(&mut r);
        let tags: Vec<_> = all.iter().map(|(tag, _)| *tag).collect();
        assert_eq!(tags, vec![ChartTypeTag::Bar, ChartTypeTag::Bar, ChartTypeTag::Line]);
        assert_eq!(primary_series(&r).map(|(tag, _)| tag), Some(ChartTypeTag::Bar));
    }
}
