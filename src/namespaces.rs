//! Namespace, content-type and relationship-type constants.
//!
//! Different producers use different prefixes (`c:`, `cx:`, none) and either
//! the Transitional or the Strict namespace family. Lookups in this crate go
//! by local name; these constants are for matching relationship and content
//! types, and for building new elements.

// =============================================================================
// Namespaces
// =============================================================================

/// DrawingML chart namespace.
pub const NS_CHART: &str = "http://schemas.openxmlformats.org/drawingml/2006/chart";

/// DrawingML main namespace (rich text runs inside chart titles).
pub const NS_DRAWING: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";

/// Main spreadsheet namespace (Transitional conformance).
pub const NS_SPREADSHEET: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

// =============================================================================
// Content types
// =============================================================================

/// Content type of a chart part.
pub const CT_CHART: &str = "application/vnd.openxmlformats-officedocument.drawingml.chart+xml";

// =============================================================================
// Relationship types
// =============================================================================

/// Relationship type for an embedded package (the chart's workbook).
pub const REL_PACKAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/package";

/// Relationship type for an embedded OLE object (older producers).
pub const REL_OLE_OBJECT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/oleObject";

/// Relationship type for worksheets.
pub const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";

/// Relationship type for shared strings.
pub const REL_SHARED_STRINGS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";

/// Strict relationship type for embedded packages.
pub const REL_PACKAGE_STRICT: &str =
    "http://purl.oclc.org/ooxml/officeDocument/relationships/package";

/// Strict relationship type for worksheets.
pub const REL_WORKSHEET_STRICT: &str =
    "http://purl.oclc.org/ooxml/officeDocument/relationships/worksheet";

/// Strict relationship type for shared strings.
pub const REL_SHARED_STRINGS_STRICT: &str =
    "http://purl.oclc.org/ooxml/officeDocument/relationships/sharedStrings";

// =============================================================================
// Helper functions
// =============================================================================

/// Check if a relationship type points at an embedded workbook.
pub fn is_embedded_package_relationship(rel_type: &str) -> bool {
    rel_type == REL_PACKAGE
        || rel_type == REL_PACKAGE_STRICT
        || rel_type == REL_OLE_OBJECT
        || rel_type.ends_with("/package")
}

/// Check if a relationship type is for a worksheet.
pub fn is_worksheet_relationship(rel_type: &str) -> bool {
    rel_type == REL_WORKSHEET || rel_type == REL_WORKSHEET_STRICT || rel_type.contains("worksheet")
}

/// Check if a relationship type is for shared strings.
pub fn is_shared_strings_relationship(rel_type: &str) -> bool {
    rel_type == REL_SHARED_STRINGS
        || rel_type == REL_SHARED_STRINGS_STRICT
        || rel_type.contains("sharedStrings")
}
