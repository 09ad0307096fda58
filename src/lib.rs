//! chartbind - data binding for OOXML charts
//!
//! Resolves what an Office chart plots from the chart XML and its embedded
//! spreadsheet, and writes edits back to both:
//! - Formula references (`Sheet1!$B$2:$B$5`) parsed and expanded to cells
//! - Cached values preferred, embedded workbook opened only when needed
//! - Multi-level categories rebuilt into parent/child hierarchies
//! - Combination charts resolved per typed block
//! - Cell edits inserted in sorted row and column order
//!
//! # Usage
//!
//! ```no_run
//! use chartbind::{ChartId, Document};
//!
//! # fn main() -> chartbind::Result<()> {
//! let mut doc = Document::open(std::fs::read("deck.pptx")?)?;
//! let mut chart = doc.chart(ChartId(0))?;
//! for series in chart.series()? {
//!     println!("{:?}: {:?}", series.name, series.values());
//! }
//! chart.set_point_value(0, 1, 42.0)?;
//! std::fs::write("deck-edited.pptx", doc.save()?)?;
//! # Ok(())
//! # }
//! ```

// Reference parsing
pub mod cell_ref;
pub mod formula;
pub mod value_ref;

// Package and XML plumbing
pub mod namespaces;
pub mod package;
pub mod xml_helpers;
pub mod xml_tree;
mod zip_patcher;

// Binding
pub mod charts;
pub mod config;
pub mod document;
pub mod error;
pub mod workbook;

pub use cell_ref::{CellAddress, SheetAddress};
pub use charts::{
    Category, Chart, ChartId, ChartKind, ChartSummary, ChartTypeTag, Point, Series, SeriesGroup,
};
pub use config::BindOptions;
pub use document::Document;
pub use error::{ChartBindError, Result};
pub use formula::{expand_formula, expand_range, parse_formula, FormulaRef};
pub use value_ref::{CellSource, ValueReference};
pub use workbook::{EmbeddedWorkbook, WorkbookBinder, WorkbookRegistry};
