//! Chart-type tags and the element-name dispatch table.

use serde::{Deserialize, Serialize};

/// The kind of a typed chart block under `c:plotArea`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartTypeTag {
    Area,
    Area3D,
    Bar,
    Bar3D,
    Line,
    Line3D,
    Pie,
    Pie3D,
    OfPie,
    Doughnut,
    Radar,
    Scatter,
    Bubble,
    Stock,
    Surface,
    Surface3D,
}

/// Element local name -> chart type. Anything else under the plot area
/// (axes, layout, data table, shape properties) is not a typed block.
const DISPATCH: [(&str, ChartTypeTag); 16] = [
    ("areaChart", ChartTypeTag::Area),
    ("area3DChart", ChartTypeTag::Area3D),
    ("barChart", ChartTypeTag::Bar),
    ("bar3DChart", ChartTypeTag::Bar3D),
    ("lineChart", ChartTypeTag::Line),
    ("line3DChart", ChartTypeTag::Line3D),
    ("pieChart", ChartTypeTag::Pie),
    ("pie3DChart", ChartTypeTag::Pie3D),
    ("ofPieChart", ChartTypeTag::OfPie),
    ("doughnutChart", ChartTypeTag::Doughnut),
    ("radarChart", ChartTypeTag::Radar),
    ("scatterChart", ChartTypeTag::Scatter),
    ("bubbleChart", ChartTypeTag::Bubble),
    ("stockChart", ChartTypeTag::Stock),
    ("surfaceChart", ChartTypeTag::Surface),
    ("surface3DChart", ChartTypeTag::Surface3D),
];

impl ChartTypeTag {
    /// Look up the type for a block's local element name.
    pub fn from_tag(local_name: &str) -> Option<Self> {
        DISPATCH
            .iter()
            .find(|(tag, _)| *tag == local_name)
            .map(|(_, kind)| *kind)
    }

    /// The block element's local name.
    pub fn tag(self) -> &'static str {
        DISPATCH
            .iter()
            .find(|(_, kind)| *kind == self)
            .map_or("", |(tag, _)| *tag)
    }

    /// Scatter and bubble charts plot x-values instead of categories.
    pub fn has_category_axis(self) -> bool {
        !matches!(self, Self::Scatter | Self::Bubble)
    }

    /// Series child holding the plotted values.
    pub fn value_element(self) -> &'static str {
        if self.has_category_axis() {
            "val"
        } else {
            "yVal"
        }
    }

    /// Series child holding categories (or x-values).
    pub fn category_element(self) -> &'static str {
        if self.has_category_axis() {
            "cat"
        } else {
            "xVal"
        }
    }
}

/// Overall chart type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartKind {
    Single(ChartTypeTag),
    /// More than one typed block under one plot area.
    Combination,
}

impl ChartKind {
    /// Classify from the typed blocks in document order; `None` when there
    /// are none.
    pub fn from_blocks(tags: &[ChartTypeTag]) -> Option<Self> {
        match tags {
            [] => None,
            [single] => Some(Self::Single(*single)),
            _ => Some(Self::Combination),
        }
    }

    pub fn is_combination(self) -> bool {
        matches!(self, Self::Combination)
    }
}
