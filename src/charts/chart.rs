//! The `Chart` view: memoized reads and write-through edits.

use serde::{Deserialize, Serialize};

use crate::cell_ref::CellAddress;
use crate::config::{round_to, BindOptions};
use crate::error::{ChartBindError, Result};
use crate::formula::{build_formula, parse_formula, range_corners};
use crate::package::Package;
use crate::value_ref::{format_number, ref_element_mut, write_cached_text, ValueReference};
use crate::workbook::{WorkbookBinder, WorkbookRegistry};
use crate::xml_tree::XmlElement;

use super::category::{is_multi_level, resolve_categories, Category};
use super::series::{resolve_groups, Series, SeriesGroup};
use super::types::{ChartKind, ChartTypeTag};
use super::{
    chart_title, plot_area_mut, primary_series, series_elements_mut, typed_blocks, ChartId,
    ChartPart,
};

/// Elements that precede the first `c:ser` inside a typed block.
const BEFORE_SERIES: [&str; 8] = [
    "ser",
    "barDir",
    "grouping",
    "varyColors",
    "scatterStyle",
    "radarStyle",
    "wireframe",
    "ofPieType",
];

/// Serializable snapshot of a resolved chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSummary {
    pub part: String,
    pub kind: ChartKind,
    pub title: Option<String>,
    pub has_workbook: bool,
    pub series_groups: Vec<SeriesGroup>,
    pub categories: Option<Vec<Category>>,
}

/// A chart borrowed from its document.
///
/// Reads resolve from the chart XML caches, falling back to the embedded
/// workbook, and are memoized on the chart part until the next edit. Edits
/// write the cache and, for bound values, the workbook cell in the same call.
pub struct Chart<'a> {
    id: ChartId,
    part: &'a mut ChartPart,
    package: &'a Package,
    registry: &'a mut WorkbookRegistry,
    options: &'a BindOptions,
}

impl<'a> Chart<'a> {
    pub(crate) fn new(
        id: ChartId,
        part: &'a mut ChartPart,
        package: &'a Package,
        registry: &'a mut WorkbookRegistry,
        options: &'a BindOptions,
    ) -> Self {
        Self {
            id,
            part,
            package,
            registry,
            options,
        }
    }

    pub fn id(&self) -> ChartId {
        self.id
    }

    pub fn part_path(&self) -> &str {
        self.part.path()
    }

    pub fn has_workbook(&self) -> bool {
        self.part.embedding().is_some()
    }

    /// `Combination` when the plot area holds more than one typed block.
    pub fn kind(&self) -> Result<ChartKind> {
        let tags: Vec<ChartTypeTag> = typed_blocks(self.part.root())
            .into_iter()
            .map(|(tag, _)| tag)
            .collect();
        ChartKind::from_blocks(&tags).ok_or_else(|| {
            ChartBindError::UnresolvableReference("chart has no typed chart block".into())
        })
    }

    pub fn title(&self) -> Option<String> {
        chart_title(self.part.root())
    }

    /// Whether the primary series uses a multi-level category axis.
    pub fn is_multi_level(&self) -> bool {
        primary_series(self.part.root())
            .and_then(|(_, ser)| ser.child("cat"))
            .is_some_and(is_multi_level)
    }

    /// Series grouped by typed block, in document order.
    pub fn series_groups(&mut self) -> Result<&[SeriesGroup]> {
        if self.part.memo.groups.is_none() {
            let part = &mut *self.part;
            let mut binder = WorkbookBinder::new(
                self.id,
                part.embedding.as_deref(),
                self.package,
                &mut *self.registry,
                self.options,
            );
            let groups = resolve_groups(&part.doc.root, &mut binder, self.options)?;
            part.memo.groups = Some(groups);
        }
        Ok(self.part.memo.groups.as_deref().unwrap_or_default())
    }

    /// All series across blocks, indexed as `set_point_value` and
    /// `remove_series` expect.
    pub fn series(&mut self) -> Result<Vec<Series>> {
        Ok(self
            .series_groups()?
            .iter()
            .flat_map(|g| g.series.iter().cloned())
            .collect())
    }

    /// Categories of the primary series; `None` for chart types without a
    /// category axis.
    pub fn categories(&mut self) -> Result<Option<&[Category]>> {
        if self.part.memo.categories.is_none() {
            let part = &mut *self.part;
            let primary = primary_series(&part.doc.root);
            let chart_type = primary
                .map(|(tag, _)| tag)
                .or_else(|| typed_blocks(&part.doc.root).first().map(|(tag, _)| *tag));
            let resolved = match chart_type {
                Some(tag) if tag.has_category_axis() => {
                    match primary.and_then(|(_, ser)| ser.child("cat")) {
                        Some(cat) => {
                            let mut binder = WorkbookBinder::new(
                                self.id,
                                part.embedding.as_deref(),
                                self.package,
                                &mut *self.registry,
                                self.options,
                            );
                            Some(resolve_categories(cat, &mut binder)?)
                        }
                        None => Some(Vec::new()),
                    }
                }
                _ => None,
            };
            part.memo.categories = Some(resolved);
        }
        Ok(self
            .part
            .memo
            .categories
            .as_ref()
            .and_then(|c| c.as_deref()))
    }

    /// X-values of the primary series (scatter and bubble charts).
    pub fn x_values(&mut self) -> Result<Vec<f64>> {
        let reference = primary_series(self.part.root())
            .and_then(|(_, ser)| ser.child("xVal"))
            .and_then(ValueReference::from_container)
            .ok_or_else(|| ChartBindError::UnresolvableReference("chart has no x-values".into()))?;

        let mut binder = WorkbookBinder::new(
            self.id,
            self.part.embedding.as_deref(),
            self.package,
            &mut *self.registry,
            self.options,
        );
        let precision = self.options.axis_precision;
        Ok(reference
            .resolve_numbers(&mut binder)?
            .into_iter()
            .map(|v| round_to(v, precision))
            .collect())
    }

    /// Set one point's value.
    ///
    /// The cached value is always rewritten; a point bound to a workbook cell
    /// also writes that cell.
    pub fn set_point_value(&mut self, series: usize, point: usize, value: f64) -> Result<()> {
        ensure_finite(value)?;
        let (chart_type, binding) = {
            let groups = self.series_groups()?;
            let len = groups.iter().map(|g| g.series.len()).sum::<usize>();
            let s = groups
                .iter()
                .flat_map(|g| g.series.iter())
                .nth(series)
                .ok_or(ChartBindError::IndexOutOfRange {
                    what: "series",
                    index: series,
                    len,
                })?;
            let p = s.points.get(point).ok_or(ChartBindError::IndexOutOfRange {
                what: "point",
                index: point,
                len: s.points.len(),
            })?;
            (s.chart_type, p.binding.clone())
        };

        if let Some(address) = binding {
            self.binder().set_number(&address.sheet, &address.cell, value)?;
        }

        let text = format_number(value);
        if let Some((_, ser)) = series_elements_mut(&mut self.part.doc.root).into_iter().nth(series)
        {
            if let Some(ref_el) = ser
                .child_mut(chart_type.value_element())
                .and_then(ref_element_mut)
            {
                write_cached_text(ref_el, point, &text);
            }
        }

        self.part.touch();
        tracing::debug!(chart = %self.part.path(), series, point, value, "point value set");
        Ok(())
    }

    /// Rename a flat category. Every series sharing the primary series'
    /// category reference gets the new cached name.
    pub fn set_category_name(&mut self, index: usize, name: &str) -> Result<()> {
        if self.is_multi_level() {
            return Err(ChartBindError::UnsupportedEdit(
                "renaming a multi-level category is not supported".into(),
            ));
        }
        let binding = {
            let categories = self.categories()?.ok_or_else(|| {
                ChartBindError::UnsupportedEdit("chart type has no categories".into())
            })?;
            categories
                .get(index)
                .ok_or(ChartBindError::IndexOutOfRange {
                    what: "category",
                    index,
                    len: categories.len(),
                })?
                .binding
                .clone()
        };

        if let Some(address) = binding {
            self.binder().set_text(&address.sheet, &address.cell, name)?;
        }

        let primary_formula = primary_series(self.part.root())
            .and_then(|(_, ser)| ser.child("cat"))
            .and_then(ValueReference::from_container)
            .and_then(|r| r.formula);

        for (position, (chart_type, ser)) in series_elements_mut(&mut self.part.doc.root)
            .into_iter()
            .enumerate()
        {
            if !chart_type.has_category_axis() {
                continue;
            }
            let Some(ref_el) = ser.child_mut("cat").and_then(ref_element_mut) else {
                continue;
            };
            let formula = ref_el.child_text("f").map(|f| f.trim().to_string());
            let shares_reference = formula.is_some() && formula == primary_formula;
            if position == 0 || shares_reference {
                write_cached_text(ref_el, index, name);
            }
        }

        self.part.touch();
        tracing::debug!(chart = %self.part.path(), index, name, "category renamed");
        Ok(())
    }

    /// Remove a series (global index) from its typed block.
    pub fn remove_series(&mut self, index: usize) -> Result<()> {
        let mut remaining = index;
        let mut removed = false;
        let mut total = 0;

        if let Some(plot) = plot_area_mut(&mut self.part.doc.root) {
            for block in plot.elements_mut() {
                if ChartTypeTag::from_tag(block.local_name()).is_none() {
                    continue;
                }
                let count = block.children_named("ser").count();
                total += count;
                if !removed && remaining < count {
                    removed = block.remove_nth_named("ser", remaining).is_some();
                } else if !removed {
                    remaining -= count;
                }
            }
        }

        if !removed {
            return Err(ChartBindError::IndexOutOfRange {
                what: "series",
                index,
                len: total,
            });
        }
        self.part.touch();
        tracing::debug!(chart = %self.part.path(), index, "series removed");
        Ok(())
    }

    /// Append a series to the first typed block and return its index.
    ///
    /// With an embedded workbook and a formula-backed primary series, the
    /// name and values go into the next free column of the primary series'
    /// sheet and the new series references them. Otherwise the series is
    /// cache-only.
    pub fn add_series(&mut self, name: &str, values: &[f64]) -> Result<usize> {
        if values.is_empty() {
            return Err(ChartBindError::UnsupportedEdit(
                "a new series needs at least one value".into(),
            ));
        }
        values.iter().copied().try_for_each(ensure_finite)?;
        let count = u32::try_from(values.len())
            .map_err(|_| ChartBindError::UnsupportedEdit("too many values".into()))?;

        let mut plan = self.plan_new_series()?;
        let categories = plan.categories.take();
        let location = match &plan.value_formula {
            Some(formula) if self.has_workbook() => {
                self.write_series_cells(formula, name, values, count)?
            }
            _ => None,
        };

        let q = |local: &str| plan.qualify(local);
        let tx = match location.as_ref().and_then(|l| l.name_formula.clone()) {
            Some(f) => XmlElement::new(q("tx")).with_child(
                XmlElement::new(q("strRef"))
                    .with_child(XmlElement::new(q("f")).with_text(f))
                    .with_child(string_cache(&q, "strCache", &[name.to_string()])),
            ),
            None => XmlElement::new(q("tx")).with_child(XmlElement::new(q("v")).with_text(name)),
        };
        let texts: Vec<String> = values.iter().map(|v| format_number(*v)).collect();
        let value_ref = match location.as_ref() {
            Some(l) => XmlElement::new(q("numRef"))
                .with_child(XmlElement::new(q("f")).with_text(l.value_formula.clone()))
                .with_child(number_cache(&q, "numCache", &texts)),
            None => number_cache(&q, "numLit", &texts),
        };

        let mut ser = XmlElement::new(q("ser"))
            .with_child(XmlElement::new(q("idx")).with_attr("val", plan.next_idx.to_string()))
            .with_child(XmlElement::new(q("order")).with_attr("val", plan.next_order.to_string()))
            .with_child(tx);
        if let Some(cat) = categories {
            ser = ser.with_child(cat);
        }
        ser = ser.with_child(XmlElement::new(q(plan.chart_type.value_element())).with_child(value_ref));

        let block = plot_area_mut(&mut self.part.doc.root)
            .and_then(|plot| {
                plot.elements_mut()
                    .find(|el| ChartTypeTag::from_tag(el.local_name()).is_some())
            })
            .ok_or_else(|| {
                ChartBindError::UnsupportedEdit("chart has no typed chart block".into())
            })?;
        block.insert_after_any(&BEFORE_SERIES, ser);

        self.part.touch();
        tracing::debug!(
            chart = %self.part.path(),
            index = plan.index,
            bound = location.is_some(),
            "series added"
        );
        Ok(plan.index)
    }

    /// Complete bytes of the embedded workbook, including unsaved edits.
    pub fn workbook_bytes(&mut self) -> Result<Vec<u8>> {
        self.binder().open()?.to_bytes()
    }

    pub fn summary(&mut self) -> Result<ChartSummary> {
        let kind = self.kind()?;
        let title = self.title();
        let series_groups = self.series_groups()?.to_vec();
        let categories = self.categories()?.map(<[Category]>::to_vec);
        Ok(ChartSummary {
            part: self.part.path().to_string(),
            kind,
            title,
            has_workbook: self.has_workbook(),
            series_groups,
            categories,
        })
    }

    fn binder(&mut self) -> WorkbookBinder<'_> {
        WorkbookBinder::new(
            self.id,
            self.part.embedding.as_deref(),
            self.package,
            &mut *self.registry,
            self.options,
        )
    }

    fn plan_new_series(&self) -> Result<SeriesPlan> {
        let root = self.part.root();
        let blocks = typed_blocks(root);
        let (chart_type, block) = blocks.first().copied().ok_or_else(|| {
            ChartBindError::UnsupportedEdit("chart has no typed chart block".into())
        })?;
        if chart_type == ChartTypeTag::Bubble {
            return Err(ChartBindError::UnsupportedEdit(
                "adding bubble series is not supported".into(),
            ));
        }

        let all_series: Vec<&XmlElement> = blocks
            .iter()
            .flat_map(|(_, b)| b.children_named("ser"))
            .collect();
        let next_of = |local: &str| {
            all_series
                .iter()
                .filter_map(|ser| ser.child(local)?.attr("val")?.parse::<u32>().ok())
                .max()
                .map_or(0, |max| max.saturating_add(1))
        };

        // The first typed block may be empty; the primary series can sit in a later one
        let primary = primary_series(root);
        let categories = primary
            .filter(|(tag, _)| tag.category_element() == chart_type.category_element())
            .and_then(|(_, ser)| ser.child(chart_type.category_element()))
            .cloned();
        Ok(SeriesPlan {
            chart_type,
            prefix: block.prefix().map(str::to_string),
            index: block.children_named("ser").count(),
            next_idx: next_of("idx"),
            next_order: next_of("order"),
            categories,
            value_formula: primary
                .and_then(|(tag, ser)| ser.child(tag.value_element()))
                .and_then(ValueReference::from_container)
                .and_then(|r| r.formula),
        })
    }

    /// Write the name and values into the column after the sheet's last used
    /// one, aligned with the primary series' rows.
    fn write_series_cells(
        &mut self,
        primary_formula: &str,
        name: &str,
        values: &[f64],
        count: u32,
    ) -> Result<Option<SeriesLocation>> {
        let Ok(fref) = parse_formula(primary_formula) else {
            return Ok(None);
        };
        let Some((start, _)) = range_corners(&fref.range) else {
            return Ok(None);
        };

        let mut binder = self.binder();
        let workbook = binder.open()?;
        let col = workbook
            .max_column(&fref.sheet)?
            .map_or(0, |max| max.saturating_add(1));

        let header = start.row.checked_sub(1).map(|row| CellAddress::new(col, row));
        if let Some(header) = header {
            workbook.set_text(&fref.sheet, &header.to_string(), name)?;
        }
        for (offset, value) in (0u32..).zip(values) {
            let cell = CellAddress::new(col, start.row + offset);
            workbook.set_number(&fref.sheet, &cell.to_string(), *value)?;
        }

        let first = CellAddress::new(col, start.row);
        let last = CellAddress::new(col, start.row + count - 1);
        Ok(Some(SeriesLocation {
            name_formula: header.map(|h| build_formula(&fref.sheet, h, h)),
            value_formula: build_formula(&fref.sheet, first, last),
        }))
    }
}

fn ensure_finite(value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ChartBindError::UnsupportedEdit(format!(
            "cannot write non-finite value {value}"
        )))
    }
}

/// What a new series copies from the chart before it is inserted.
struct SeriesPlan {
    chart_type: ChartTypeTag,
    prefix: Option<String>,
    index: usize,
    next_idx: u32,
    next_order: u32,
    categories: Option<XmlElement>,
    value_formula: Option<String>,
}

impl SeriesPlan {
    fn qualify(&self, local: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_string(),
        }
    }
}

/// Workbook formulas of a newly written series.
struct SeriesLocation {
    name_formula: Option<String>,
    value_formula: String,
}

fn string_cache(q: &dyn Fn(&str) -> String, local: &str, texts: &[String]) -> XmlElement {
    points_element(q, local, texts, None)
}

fn number_cache(q: &dyn Fn(&str) -> String, local: &str, texts: &[String]) -> XmlElement {
    points_element(q, local, texts, Some("General"))
}

fn points_element(
    q: &dyn Fn(&str) -> String,
    local: &str,
    texts: &[String],
    format_code: Option<&str>,
) -> XmlElement {
    let mut el = XmlElement::new(q(local));
    if let Some(code) = format_code {
        el.push_element(XmlElement::new(q("formatCode")).with_text(code));
    }
    el.push_element(XmlElement::new(q("ptCount")).with_attr("val", texts.len().to_string()));
    for (i, text) in texts.iter().enumerate() {
        el.push_element(
            XmlElement::new(q("pt"))
                .with_attr("idx", i.to_string())
                .with_child(XmlElement::new(q("v")).with_text(text.as_str())),
        );
    }
    el
}
