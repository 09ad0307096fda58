//! Utilities for parsing Excel-style cell references.
//!
//! Worksheet rows must list their cells left-to-right by column. The order
//! defined here (column index first, then row number) is the one used when
//! inserting new cells, so `B2 < C2 < AA2` and `A2 < A10`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChartBindError;

/// Largest column index a worksheet may use (`XFD`, 0-indexed).
pub const MAX_COL: u32 = 16_383;

/// Largest row index a worksheet may use (0-indexed).
pub const MAX_ROW: u32 = 1_048_575;

/// Parse a cell reference like "A1" or "$B$10" into (col, row), both 0-indexed.
///
/// Returns `None` unless the reference is letters followed by digits.
pub fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    let mut col: u32 = 0;
    let mut row: u32 = 0;
    let mut saw_col = false;
    let mut saw_row = false;

    for ch in cell_ref.trim().chars() {
        if ch == '$' {
            continue;
        }
        if ch.is_ascii_alphabetic() {
            if saw_row {
                return None;
            }
            let upper = ch.to_ascii_uppercase();
            col = col.checked_mul(26)?.checked_add(upper as u32 - 'A' as u32 + 1)?;
            saw_col = true;
        } else if ch.is_ascii_digit() {
            row = row.checked_mul(10)?.checked_add(ch as u32 - '0' as u32)?;
            saw_row = true;
        } else {
            return None;
        }
    }

    if !saw_col || !saw_row || row == 0 {
        return None;
    }

    let (col, row) = (col - 1, row - 1);
    if col > MAX_COL || row > MAX_ROW {
        return None;
    }
    Some((col, row))
}

/// Convert a 0-indexed column number to its letter form ("A", "Z", "AA").
pub fn col_to_letter(col: u32) -> String {
    let mut result = String::new();
    let mut n = col + 1; // Convert to 1-based
    while n > 0 {
        n -= 1;
        let offset = u8::try_from(n % 26).unwrap_or(0);
        result.insert(0, char::from(b'A' + offset));
        n /= 26;
    }
    result
}

/// A single cell position within a sheet, 0-indexed.
///
/// Field order matters: the derived ordering compares columns first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellAddress {
    pub col: u32,
    pub row: u32,
}

impl CellAddress {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }

    /// 1-based row number as written in `<row r="..">`.
    pub fn row_number(&self) -> u32 {
        self.row + 1
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", col_to_letter(self.col), self.row + 1)
    }
}

impl FromStr for CellAddress {
    type Err = ChartBindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_cell_ref(s)
            .map(|(col, row)| Self::new(col, row))
            .ok_or_else(|| ChartBindError::Parse(format!("invalid cell reference {s:?}")))
    }
}

/// Compare two raw cell references in worksheet order.
///
/// Unparseable references sort after parseable ones and fall back to plain
/// string order among themselves.
pub fn compare_cell_refs(a: &str, b: &str) -> Ordering {
    match (parse_cell_ref(a), parse_cell_ref(b)) {
        (Some(a), Some(b)) => CellAddress::new(a.0, a.1).cmp(&CellAddress::new(b.0, b.1)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// A `(sheet name, cell reference)` pair identifying one spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetAddress {
    pub sheet: String,
    pub cell: String,
}

impl SheetAddress {
    pub fn new(sheet: impl Into<String>, cell: impl Into<String>) -> Self {
        Self {
            sheet: sheet.into(),
            cell: cell.into(),
        }
    }
}

impl fmt::Display for SheetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.sheet, self.cell)
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

    #[test_case("A1", Some((0, 0)))]
    #[test_case("$B$10", Some((1, 9)))]
    #[test_case("aa3", Some((26, 2)))]
    #[test_case("XFD1048576", Some((16_383, 1_048_575)))]
    #[test_case("A0", None)]
    #[test_case("1A", None)]
    #[test_case("A", None)]
    #[test_case("", None)]
    #[test_case("A1B", None)]
    fn test_parse_cell_ref(input: &str, expected: Option<(u32, u32)>) {
        assert_eq!(parse_cell_ref(input), expected);
    }

    #[test_case(0, "A")]
    #[test_case(25, "Z")]
    #[test_case(26, "AA")]
    #[test_case(701, "ZZ")]
    #[test_case(702, "AAA")]
    fn test_col_to_letter(col: u32, expected: &str) {
        assert_eq!(col_to_letter(col), expected);
    }

    #[test_case("B2", "C2", Ordering::Less)]
    #[test_case("C2", "AA2", Ordering::Less)]
    #[test_case("A2", "A10", Ordering::Less)]
    #[test_case("D7", "D7", Ordering::Equal)]
    #[test_case("Z1", "B1", Ordering::Greater)]
    fn test_compare_cell_refs(a: &str, b: &str, expected: Ordering) {
        assert_eq!(compare_cell_refs(a, b), expected);
    }

    #[test]
    fn test_cell_address_round_trip() {
        let addr: CellAddress = "$AB$12".parse().unwrap();
        assert_eq!(addr, CellAddress::new(27, 11));
        assert_eq!(addr.to_string(), "AB12");
        assert_eq!(addr.row_number(), 12);
        assert!("12".parse::<CellAddress>().is_err());
    }
}
