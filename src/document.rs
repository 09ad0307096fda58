//! The host document: package, chart parts and open workbook handles.

use crate::charts::{Chart, ChartId, ChartPart};
use crate::config::BindOptions;
use crate::error::{ChartBindError, Result};
use crate::package::Package;
use crate::workbook::WorkbookRegistry;

/// An OOXML package opened for chart binding.
///
/// Owns one [`ChartPart`] per chart and the registry of embedded workbooks
/// those charts have opened. [`Document::save`] flushes everything once.
#[derive(Debug)]
pub struct Document {
    package: Package,
    charts: Vec<ChartPart>,
    registry: WorkbookRegistry,
    options: BindOptions,
}

impl Document {
    /// Open a package with default [`BindOptions`].
    pub fn open(data: Vec<u8>) -> Result<Self> {
        Self::open_with_options(data, BindOptions::default())
    }

    pub fn open_with_options(data: Vec<u8>, options: BindOptions) -> Result<Self> {
        let package = Package::from_bytes(data)?;
        let charts = package
            .chart_parts()?
            .iter()
            .map(|path| ChartPart::load(&package, path))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(charts = charts.len(), "document opened");
        Ok(Self {
            package,
            charts,
            registry: WorkbookRegistry::new(),
            options,
        })
    }

    pub fn options(&self) -> &BindOptions {
        &self.options
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn chart_count(&self) -> usize {
        self.charts.len()
    }

    pub fn chart_ids(&self) -> impl Iterator<Item = ChartId> {
        (0..self.charts.len()).map(ChartId)
    }

    pub fn chart_path(&self, id: ChartId) -> Option<&str> {
        self.charts.get(id.0).map(ChartPart::path)
    }

    /// Look a chart up by its part name, e.g. `ppt/charts/chart1.xml`.
    pub fn find_chart(&self, path: &str) -> Option<ChartId> {
        let path = path.trim_start_matches('/');
        self.charts
            .iter()
            .position(|part| part.path() == path)
            .map(ChartId)
    }

    /// Number of embedded workbooks currently open.
    pub fn open_workbooks(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &WorkbookRegistry {
        &self.registry
    }

    pub fn chart(&mut self, id: ChartId) -> Result<Chart<'_>> {
        let len = self.charts.len();
        let part = self
            .charts
            .get_mut(id.0)
            .ok_or(ChartBindError::IndexOutOfRange {
                what: "chart",
                index: id.0,
                len,
            })?;
        Ok(Chart::new(
            id,
            part,
            &self.package,
            &mut self.registry,
            &self.options,
        ))
    }

    /// Write back every edited chart and close every open workbook, then
    /// return the new package bytes.
    pub fn save(&mut self) -> Result<Vec<u8>> {
        let mut written = 0;
        for part in self.charts.iter_mut().filter(|part| part.is_dirty()) {
            self.package.write_part(part.path(), part.to_bytes()?);
            part.mark_saved();
            written += 1;
        }

        let package = &mut self.package;
        let flushed = self
            .registry
            .close_all(|path, bytes| package.write_part(path, bytes))?;

        tracing::debug!(charts = written, workbooks = flushed, "document saved");
        self.package.save()
    }
}
