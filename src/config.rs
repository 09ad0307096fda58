//! Binding options.

use serde::{Deserialize, Serialize};

/// Options applied when resolving and editing chart data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BindOptions {
    /// Decimal places point values are rounded to when read.
    pub point_precision: u32,
    /// Decimal places axis-style values (scatter x-values) are rounded to.
    pub axis_precision: u32,
    /// Create a missing worksheet row when writing a cell into it.
    pub create_missing_rows: bool,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            point_precision: 2,
            axis_precision: 1,
            create_missing_rows: true,
        }
    }
}

/// Round `value` to `precision` decimal places, half away from zero.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let exp = i32::try_from(precision.min(15)).unwrap_or(15);
    let factor = 10f64.powi(exp);
    (value * factor).round() / factor
}
