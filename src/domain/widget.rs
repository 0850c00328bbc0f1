// Widget and dashboard snapshot domain models
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type DashboardId = Uuid;
pub type WidgetId = Uuid;

/// Visualization kinds known to the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WidgetType {
    LineChart,
    BarChart,
    PieChart,
    HeatMap,
    ScatterPlot,
    Gauge,
    Table,
    KpiCard,
    Map,
}

impl WidgetType {
    pub const ALL: [WidgetType; 9] = [
        WidgetType::LineChart,
        WidgetType::BarChart,
        WidgetType::PieChart,
        WidgetType::HeatMap,
        WidgetType::ScatterPlot,
        WidgetType::Gauge,
        WidgetType::Table,
        WidgetType::KpiCard,
        WidgetType::Map,
    ];

    /// Streaming widgets accumulate a bounded history on the client
    /// instead of replacing their latest value.
    pub fn is_streaming(self) -> bool {
        matches!(self, WidgetType::LineChart)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WidgetType::LineChart => "LineChart",
            WidgetType::BarChart => "BarChart",
            WidgetType::PieChart => "PieChart",
            WidgetType::HeatMap => "HeatMap",
            WidgetType::ScatterPlot => "ScatterPlot",
            WidgetType::Gauge => "Gauge",
            WidgetType::Table => "Table",
            WidgetType::KpiCard => "KpiCard",
            WidgetType::Map => "Map",
        }
    }
}

impl fmt::Display for WidgetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown widget type: {0}")]
pub struct UnknownWidgetType(pub String);

impl FromStr for WidgetType {
    type Err = UnknownWidgetType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WidgetType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownWidgetType(s.to_string()))
    }
}

/// Immutable catalog entry for one widget of a published dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetRef {
    pub dashboard_id: DashboardId,
    pub widget_id: WidgetId,
    pub widget_type: WidgetType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSnapshot {
    pub dashboard_id: DashboardId,
    pub widgets: Vec<WidgetRef>,
}

impl DashboardSnapshot {
    pub fn new(dashboard_id: DashboardId, widgets: Vec<WidgetRef>) -> Self {
        Self {
            dashboard_id,
            widgets,
        }
    }
}
