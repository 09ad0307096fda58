//! Structured error types for chart data binding.
//!
//! Resolution errors are deterministic for a given document, so nothing here
//! is retried; every variant carries the sheet, cell or formula text needed to
//! diagnose the source document.

/// All errors that can occur while resolving or editing chart data.
#[derive(Debug, thiserror::Error)]
pub enum ChartBindError {
    /// XML parsing error from quick-xml.
    #[error("XML parsing: {0}")]
    Xml(#[from] quick_xml::Error),

    /// ZIP archive error.
    #[error("ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A formula without a parseable sheet/range split.
    #[error("Malformed formula: {formula:?}")]
    MalformedFormula { formula: String },

    /// A formula or edit named a sheet the workbook does not contain.
    #[error("Sheet not found: {sheet:?}")]
    SheetNotFound { sheet: String },

    /// A cell that had to exist is absent from the workbook.
    #[error("Cell not found: {sheet}!{cell}")]
    CellNotFound { sheet: String, cell: String },

    /// A value reference with neither a cache nor a formula, or a formula
    /// with no workbook to resolve against.
    #[error("Unresolvable reference: {0}")]
    UnresolvableReference(String),

    /// A structurally disallowed mutation.
    #[error("Unsupported edit: {0}")]
    UnsupportedEdit(String),

    /// A package part the document structure points at is missing.
    #[error("Part not found: {0}")]
    PartNotFound(String),

    /// Series, point or category index outside the resolved view.
    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// General parse error (non-numeric cell text, invalid UTF-8, ...).
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChartBindError>;

impl ChartBindError {
    pub(crate) fn malformed(formula: &str) -> Self {
        Self::MalformedFormula {
            formula: formula.to_string(),
        }
    }

    pub(crate) fn sheet_not_found(sheet: &str) -> Self {
        Self::SheetNotFound {
            sheet: sheet.to_string(),
        }
    }
}

impl From<std::str::Utf8Error> for ChartBindError {
    fn from(e: std::str::Utf8Error) -> Self {
        Self::Parse(format!("invalid UTF-8: {e}"))
    }
}

impl From<quick_xml::events::attributes::AttrError> for ChartBindError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(quick_xml::Error::InvalidAttr(e))
    }
}
