//! Chart reference formulas.
//!
//! Handles formulas like `Sheet1!$A$2:$A$5`, `'My Sheet'!$B$2` and
//! non-contiguous lists such as `(Sheet1!$A$2:$A$3,Sheet1!$A$5)`, expanding
//! them into the ordered cell addresses a chart's cache values pair with.

use crate::cell_ref::{col_to_letter, parse_cell_ref, CellAddress, SheetAddress};
use crate::error::{ChartBindError, Result};

/// A formula split into its sheet qualification and range specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaRef {
    /// Sheet name with quoting removed.
    pub sheet: String,
    /// Range specifier with `$` markers removed, e.g. `A2:A5`.
    pub range: String,
}

/// Parse a single-range formula into `(sheet, range)`.
///
/// Absolute markers and sheet-name quoting are removed, then the formula is
/// split on its last `!`: sheet names may themselves contain `!` when quoted,
/// the address region never does.
pub fn parse_formula(formula: &str) -> Result<FormulaRef> {
    let trimmed = strip_parens(formula.trim());
    let (sheet_part, range_part) = trimmed
        .rsplit_once('!')
        .ok_or_else(|| ChartBindError::malformed(formula))?;

    let sheet = unquote_sheet(sheet_part.trim());
    let range: String = range_part.chars().filter(|&c| c != '$').collect();
    let range = range.trim().to_string();

    if sheet.is_empty() || range.is_empty() {
        return Err(ChartBindError::malformed(formula));
    }

    Ok(FormulaRef { sheet, range })
}

/// Expand a normalized range specifier into cell references.
///
/// `raw_formula` is consulted for lists of disjoint ranges: when it holds
/// more than one range the result is their concatenation in formula order,
/// otherwise `range` alone is expanded. Single cells give one address,
/// rectangles are walked row by row. Malformed or empty ranges give an
/// empty list.
pub fn expand_range(range: &str, raw_formula: &str) -> Vec<String> {
    let parts = split_ranges(raw_formula);
    if parts.len() > 1 {
        return parts
            .into_iter()
            .filter_map(|part| parse_formula(part).ok())
            .flat_map(|fref| expand_single(&fref.range))
            .map(|addr| addr.to_string())
            .collect();
    }
    expand_single(range)
        .into_iter()
        .map(|addr| addr.to_string())
        .collect()
}

/// Parse and expand a whole formula into sheet-qualified addresses.
///
/// Every range in a list keeps its own sheet name.
pub fn expand_formula(formula: &str) -> Result<Vec<SheetAddress>> {
    let mut out = Vec::new();
    for part in split_ranges(formula) {
        let fref = parse_formula(part)?;
        out.extend(
            expand_single(&fref.range)
                .into_iter()
                .map(|addr| SheetAddress::new(fref.sheet.clone(), addr.to_string())),
        );
    }
    Ok(out)
}

/// Split a formula on top-level commas, outside quoted sheet names, after
/// removing the enclosing parentheses of a range list.
pub fn split_ranges(formula: &str) -> Vec<&str> {
    let body = strip_parens(formula.trim());
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (i, ch) in body.char_indices() {
        match ch {
            '\'' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                if let Some(part) = body.get(start..i) {
                    parts.push(part.trim());
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    if let Some(part) = body.get(start..) {
        parts.push(part.trim());
    }
    parts.retain(|p| !p.is_empty());
    parts
}

/// Build an absolute, sheet-qualified formula for a rectangle.
///
/// A single-cell rectangle yields `Sheet!$A$1`; sheet names that need it are
/// quoted with embedded quotes doubled.
pub fn build_formula(sheet: &str, start: CellAddress, end: CellAddress) -> String {
    let sheet = quote_sheet(sheet);
    let first = absolute(start);
    if start == end {
        format!("{sheet}!{first}")
    } else {
        format!("{sheet}!{first}:{}", absolute(end))
    }
}

/// Quote a sheet name for use in a formula when it is not a plain identifier.
pub fn quote_sheet(sheet: &str) -> String {
    if needs_quotes(sheet) {
        format!("'{}'", sheet.replace('\'', "''"))
    } else {
        sheet.to_string()
    }
}

fn needs_quotes(sheet: &str) -> bool {
    let Some(first) = sheet.chars().next() else {
        return true;
    };
    if first.is_ascii_digit() {
        return true;
    }
    if !sheet.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        return true;
    }
    // Names such as "A1" or "R1C1" would read as references
    parse_cell_ref(sheet).is_some() || looks_like_r1c1(sheet)
}

fn looks_like_r1c1(s: &str) -> bool {
    let upper = s.to_ascii_uppercase();
    let Some(rest) = upper.strip_prefix('R') else {
        return false;
    };
    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let (_, tail) = rest.split_at(digits_end);
    match tail.strip_prefix('C') {
        Some(cols) => cols.chars().all(|c| c.is_ascii_digit()),
        None => tail.is_empty(),
    }
}

fn absolute(addr: CellAddress) -> String {
    format!("${}${}", col_to_letter(addr.col), addr.row + 1)
}

fn strip_parens(s: &str) -> &str {
    s.strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(s)
}

fn unquote_sheet(s: &str) -> String {
    match s.strip_prefix('\'').and_then(|inner| inner.strip_suffix('\'')) {
        Some(inner) => inner.replace("''", "'"),
        None => s.replace('\'', ""),
    }
}

/// Expand `A2`, `A2:A5` or `A2:C3` into addresses, row by row.
fn expand_single(range: &str) -> Vec<CellAddress> {
    let Some(((col1, row1), (col2, row2))) = parse_range_bounds(range) else {
        return Vec::new();
    };
    let (row_start, row_end) = (row1.min(row2), row1.max(row2));
    let (col_start, col_end) = (col1.min(col2), col1.max(col2));

    let rows = (row_end - row_start) as usize + 1;
    let cols = (col_end - col_start) as usize + 1;
    let mut out = Vec::with_capacity(rows.saturating_mul(cols));
    for row in row_start..=row_end {
        for col in col_start..=col_end {
            out.push(CellAddress::new(col, row));
        }
    }
    out
}

type Bounds = ((u32, u32), (u32, u32));

/// Normalized corners (top-left, bottom-right) of a single range specifier.
pub fn range_corners(range: &str) -> Option<(CellAddress, CellAddress)> {
    let ((col1, row1), (col2, row2)) = parse_range_bounds(range)?;
    Some((
        CellAddress::new(col1.min(col2), row1.min(row2)),
        CellAddress::new(col1.max(col2), row1.max(row2)),
    ))
}

fn parse_range_bounds(range: &str) -> Option<Bounds> {
    let range = range.trim();
    if range.is_empty() {
        return None;
    }
    match range.split_once(':') {
        Some((start, end)) => Some((parse_cell_ref(start)?, parse_cell_ref(end)?)),
        None => {
            let cell = parse_cell_ref(range)?;
            Some((cell, cell))
        }
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
    use test_case::test_case;

    #[test_case("Sheet1!$A$2:$A$5", "Sheet1", "A2:A5")]
    #[test_case("'My Sheet'!$B$2:$C$5", "My Sheet", "B2:C5")]
    #[test_case("Sheet 2!B7", "Sheet 2", "B7")]
    #[test_case("'Q1!Sales'!$A$1", "Q1!Sales", "A1")]
    #[test_case("'O''Brien'!A1", "O'Brien", "A1")]
    #[test_case("2024!$D$4", "2024", "D4")]
    fn test_parse_formula(formula: &str, sheet: &str, range: &str) {
        let fref = parse_formula(formula).unwrap();
        assert_eq!(fref.sheet, sheet);
        assert_eq!(fref.range, range);
    }

    #[test_case("A1:A5")]
    #[test_case("")]
    #[test_case("Sheet1!")]
    fn test_parse_formula_malformed(formula: &str) {
        match parse_formula(formula) {
            Err(ChartBindError::MalformedFormula { formula: f }) => assert_eq!(f, formula),
            other => panic!("expected MalformedFormula, got {other:?}"),
        }
    }

    #[test_case("A2:A5", &["A2", "A3", "A4", "A5"])]
    #[test_case("B2", &["B2"])]
    #[test_case("B2:D2", &["B2", "C2", "D2"])]
    #[test_case("A1:B2", &["A1", "B1", "A2", "B2"])]
    #[test_case("A5:A3", &["A3", "A4", "A5"])]
    #[test_case("", &[])]
    #[test_case("A:A", &[])]
    fn test_expand_range(range: &str, expected: &[&str]) {
        let formula = format!("Sheet1!{range}");
        assert_eq!(expand_range(range, &formula), expected);
    }

    #[test]
    fn test_expand_range_multiple_ranges() {
        let formula = "(Sheet1!$A$2:$A$3,Sheet1!$A$6,Sheet1!$C$2:$C$3)";
        let parts = split_ranges(formula);
        assert_eq!(parts.len(), 3);
        assert_eq!(
            expand_range("A2:A3", formula),
            vec!["A2", "A3", "A6", "C2", "C3"]
        );
    }

    #[test]
    fn test_range_corners_normalize() {
        let (start, end) = range_corners("C5:A2").unwrap();
        assert_eq!(start, CellAddress::new(0, 1));
        assert_eq!(end, CellAddress::new(2, 4));
        assert!(range_corners("A:A").is_none());
    }

    #[test]
    fn test_split_ranges_respects_quotes() {
        let parts = split_ranges("('a,b'!$A$1,Sheet1!$B$1)");
        assert_eq!(parts, vec!["'a,b'!$A$1", "Sheet1!$B$1"]);
    }

    #[test]
    fn test_expand_formula_keeps_sheet_per_range() {
        let addrs = expand_formula("('My Sheet'!$A$1,Other!$B$2:$B$3)").unwrap();
        assert_eq!(
            addrs,
            vec![
                SheetAddress::new("My Sheet", "A1"),
                SheetAddress::new("Other", "B2"),
                SheetAddress::new("Other", "B3"),
            ]
        );
    }

    #[test_case("Sheet1", 0, 1, 0, 4, "Sheet1!$A$2:$A$5")]
    #[test_case("My Sheet", 1, 0, 1, 0, "'My Sheet'!$B$1")]
    #[test_case("O'Brien", 2, 1, 2, 2, "'O''Brien'!$C$2:$C$3")]
    #[test_case("A1", 0, 0, 0, 0, "'A1'!$A$1")]
    #[test_case("R2C3", 0, 0, 0, 0, "'R2C3'!$A$1")]
    #[test_case("2024", 0, 0, 0, 0, "'2024'!$A$1")]
    fn test_build_formula(sheet: &str, c1: u32, r1: u32, c2: u32, r2: u32, expected: &str) {
        let built = build_formula(sheet, CellAddress::new(c1, r1), CellAddress::new(c2, r2));
        assert_eq!(built, expected);
        // What we emit must parse back to the same sheet
        assert_eq!(parse_formula(&built).unwrap().sheet, sheet);
    }
}
