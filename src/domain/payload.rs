// Widget payload shapes consumed by the rendering layer
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinePoint {
    pub name: String,
    pub valor: i64,
    pub objetivo: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarEntry {
    pub name: &'static str,
    pub ventas: i64,
    pub retornos: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieSlice {
    pub name: &'static str,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub day: &'static str,
    pub hour: &'static str,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeReading {
    pub value: i64,
    pub min: i64,
    pub max: i64,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Normal,
    Warning,
    Critical,
}

impl ServerStatus {
    /// Categorical status for a rounded CPU percentage.
    pub fn from_cpu(cpu: i64) -> Self {
        if cpu > 85 {
            ServerStatus::Critical
        } else if cpu > 65 {
            ServerStatus::Warning
        } else {
            ServerStatus::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub name: &'static str,
    pub cpu: i64,
    pub memory: i64,
    pub status: ServerStatus,
    pub uptime: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSnapshot {
    pub value: i64,
    pub previous_value: i64,
    pub change_percent: f64,
    pub label: &'static str,
    pub is_positive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
    pub value: i64,
}
