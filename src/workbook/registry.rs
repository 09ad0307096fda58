//! Open workbook handles, one per chart, owned by the document.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::cell_ref::SheetAddress;
use crate::charts::ChartId;
use crate::config::BindOptions;
use crate::error::{ChartBindError, Result};
use crate::package::Package;
use crate::value_ref::CellSource;

use super::EmbeddedWorkbook;

/// Arena of open embedded workbooks keyed by chart.
///
/// At most one handle exists per chart. The document flushes and closes every
/// handle once when it saves.
#[derive(Debug, Default)]
pub struct WorkbookRegistry {
    handles: BTreeMap<ChartId, EmbeddedWorkbook>,
}

impl WorkbookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn is_open(&self, chart: ChartId) -> bool {
        self.handles.contains_key(&chart)
    }

    pub fn get(&self, chart: ChartId) -> Option<&EmbeddedWorkbook> {
        self.handles.get(&chart)
    }

    /// The chart's handle, opened with `open` if there is none yet.
    pub(crate) fn get_or_open(
        &mut self,
        chart: ChartId,
        open: impl FnOnce() -> Result<EmbeddedWorkbook>,
    ) -> Result<&mut EmbeddedWorkbook> {
        match self.handles.entry(chart) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(open()?)),
        }
    }

    /// Close every handle exactly once.
    ///
    /// `stage` receives `(part, bytes)` for each workbook with unsaved edits
    /// as soon as it closes. A handle that fails to close keeps its edits and
    /// stays open; the others still close. The first failure is returned,
    /// otherwise the number of staged workbooks.
    pub(crate) fn close_all(&mut self, mut stage: impl FnMut(&str, Vec<u8>)) -> Result<usize> {
        let mut staged = 0;
        let mut failure = None;

        for (chart, workbook) in &mut self.handles {
            let was_dirty = workbook.is_dirty();
            match workbook.close() {
                Ok(Some(bytes)) if was_dirty => {
                    stage(workbook.part(), bytes);
                    staged += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        chart = chart.0,
                        part = %workbook.part(),
                        error = %e,
                        "workbook failed to close"
                    );
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }
        self.handles.retain(|_, workbook| !workbook.is_closed());

        match failure {
            Some(e) => Err(e),
            None => Ok(staged),
        }
    }
}

/// A chart's lazy view of its embedded workbook.
///
/// Nothing is read from the package until the first cell access; after that
/// the registry's handle is reused.
pub struct WorkbookBinder<'a> {
    chart: ChartId,
    embedding: Option<&'a str>,
    package: &'a Package,
    registry: &'a mut WorkbookRegistry,
    options: &'a BindOptions,
}

impl<'a> WorkbookBinder<'a> {
    pub fn new(
        chart: ChartId,
        embedding: Option<&'a str>,
        package: &'a Package,
        registry: &'a mut WorkbookRegistry,
        options: &'a BindOptions,
    ) -> Self {
        Self {
            chart,
            embedding,
            package,
            registry,
            options,
        }
    }

    /// Whether the chart has an embedded workbook at all.
    pub fn has_workbook(&self) -> bool {
        self.embedding.is_some()
    }

    pub fn is_open(&self) -> bool {
        self.registry.is_open(self.chart)
    }

    /// Open the workbook, or return the already open handle.
    pub fn open(&mut self) -> Result<&mut EmbeddedWorkbook> {
        let Some(part) = self.embedding else {
            return Err(ChartBindError::UnresolvableReference(
                "chart has no embedded workbook".into(),
            ));
        };
        let package = self.package;
        let options = self.options;
        self.registry.get_or_open(self.chart, || {
            let data = package.read_part(part)?;
            EmbeddedWorkbook::open(part, data, options)
        })
    }

    pub fn get(&mut self, sheet: &str, cell: &str) -> Result<Option<String>> {
        self.open()?.get(sheet, cell)
    }

    pub fn set_number(&mut self, sheet: &str, cell: &str, value: f64) -> Result<()> {
        self.open()?.set_number(sheet, cell, value)
    }

    pub fn set_text(&mut self, sheet: &str, cell: &str, text: &str) -> Result<()> {
        self.open()?.set_text(sheet, cell, text)
    }
}

impl CellSource for WorkbookBinder<'_> {
    fn cell_text(&mut self, address: &SheetAddress) -> Result<Option<String>> {
        self.get(&address.sheet, &address.cell)
    }
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
    use crate::workbook::tests::xlsx;

    fn registry_with(parts: &[&str]) -> WorkbookRegistry {
        let mut registry = WorkbookRegistry::new();
        for (n, part) in parts.iter().enumerate() {
            registry
                .get_or_open(ChartId(n), || {
                    EmbeddedWorkbook::open(*part, xlsx(), &BindOptions::default())
                })
                .unwrap()
                .set_number("Sheet1", "B1", 5.0)
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_close_all_stages_dirty_workbooks_once() {
        let mut registry = registry_with(&["a.xlsx", "b.xlsx"]);
        registry
            .get_or_open(ChartId(2), || {
                EmbeddedWorkbook::open("clean.xlsx", xlsx(), &BindOptions::default())
            })
            .unwrap();

        let mut staged = Vec::new();
        let count = registry
            .close_all(|part, bytes| staged.push((part.to_string(), bytes)))
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            staged.iter().map(|(part, _)| part.as_str()).collect::<Vec<_>>(),
            vec!["a.xlsx", "b.xlsx"]
        );
        assert!(registry.is_empty());

        let (_, bytes) = staged.remove(0);
        let reopened = EmbeddedWorkbook::open("a.xlsx", bytes, &BindOptions::default()).unwrap();
        assert_eq!(reopened.get("Sheet1", "B1").unwrap().as_deref(), Some("5"));
        assert_eq!(registry.close_all(|_, _| panic!("nothing left to stage")).unwrap(), 0);
    }

    #[test]
    fn test_failed_close_keeps_other_workbooks_edits() {
        let mut registry = registry_with(&["a.xlsx", "b.xlsx", "c.xlsx"]);
        registry.handles.get_mut(&ChartId(1)).unwrap().data = b"not a zip".to_vec();

        let mut staged = Vec::new();
        let result = registry.close_all(|part, _| staged.push(part.to_string()));
        assert!(result.is_err());
        assert_eq!(staged, vec!["a.xlsx", "c.xlsx"]);

        assert_eq!(registry.len(), 1);
        assert!(registry.is_open(ChartId(1)));
        let failed = registry.get(ChartId(1)).unwrap();
        assert!(failed.is_dirty());
        assert!(!failed.is_closed());
    }
}
