// Metric generator - synthetic per-widget payloads via bounded random walks
use crate::domain::metric::{MetricKey, MetricStateStore};
use crate::domain::payload::{
    BarEntry, GaugeReading, HeatmapCell, KpiSnapshot, LinePoint, MapMarker, PieSlice,
    ScatterPoint, ServerStatus, TableRow,
};
use crate::domain::widget::{WidgetId, WidgetType};
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

/// Source of uniform draws in `[min, max)`.
pub trait RandomSource: Send + Sync {
    fn uniform(&self, min: f64, max: f64) -> f64;
}

/// Thread-local RNG; each call borrows the calling thread's generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn uniform(&self, min: f64, max: f64) -> f64 {
        rand::thread_rng().r#gen::<f64>() * (max - min) + min
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkBounds {
    pub min_delta: f64,
    pub max_delta: f64,
    pub floor: f64,
    pub ceiling: f64,
}

impl WalkBounds {
    pub const fn new(min_delta: f64, max_delta: f64, floor: f64, ceiling: f64) -> Self {
        Self {
            min_delta,
            max_delta,
            floor,
            ceiling,
        }
    }

    pub fn step(&self, current: f64, delta: f64) -> f64 {
        (current + delta).clamp(self.floor, self.ceiling)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("channel {channel} of widget {widget_id} holds non-finite value {value}")]
    NonFiniteState {
        widget_id: WidgetId,
        channel: String,
        value: f64,
    },
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

const LINE: WalkBounds = WalkBounds::new(-12.0, 12.0, 50.0, 800.0);
const LINE_OBJECTIVE: WalkBounds = WalkBounds::new(-4.0, 4.0, 300.0, 700.0);
const BAR_SALES: WalkBounds = WalkBounds::new(-15.0, 15.0, 100.0, 1200.0);
const BAR_RETURNS: WalkBounds = WalkBounds::new(-8.0, 8.0, 10.0, 300.0);
const PIE: WalkBounds = WalkBounds::new(-8.0, 8.0, 50.0, 600.0);
const HEATMAP: WalkBounds = WalkBounds::new(-3.0, 3.0, 0.0, 100.0);
const SCATTER_XY: WalkBounds = WalkBounds::new(-2.0, 2.0, 0.0, 100.0);
const SCATTER_Z: WalkBounds = WalkBounds::new(-10.0, 10.0, 50.0, 600.0);
const TABLE_CPU: WalkBounds = WalkBounds::new(-3.0, 3.0, 5.0, 99.0);
const TABLE_MEMORY: WalkBounds = WalkBounds::new(-2.0, 2.0, 10.0, 99.0);
const KPI: WalkBounds = WalkBounds::new(-50.0, 70.0, 500.0, 15000.0);
const MAP: WalkBounds = WalkBounds::new(-15.0, 15.0, 100.0, 1200.0);

const GAUGE_CENTER: f64 = 57.5;
const GAUGE_AMPLITUDE: f64 = 37.5;
const GAUGE_FREQUENCY: f64 = 0.15;
const GAUGE_NOISE: f64 = 3.0;

const KPI_SEED: f64 = 5000.0;
const KPI_PREVIOUS_SEED: f64 = 4800.0;

const BAR_CATEGORIES: [&str; 5] = [
    "Producto A",
    "Producto B",
    "Producto C",
    "Producto D",
    "Producto E",
];
const PIE_SEGMENTS: [&str; 5] = [
    "Segmento A",
    "Segmento B",
    "Segmento C",
    "Segmento D",
    "Segmento E",
];
const HEATMAP_DAYS: [&str; 7] = ["Lun", "Mar", "Mie", "Jue", "Vie", "Sab", "Dom"];
const HEATMAP_HOURS: [&str; 6] = ["00-04", "04-08", "08-12", "12-16", "16-20", "20-24"];
const SCATTER_POINTS: usize = 30;
const SERVERS: [&str; 6] = [
    "Servidor Alpha",
    "Servidor Beta",
    "Servidor Gamma",
    "Servidor Delta",
    "Servidor Epsilon",
    "Servidor Zeta",
];
const CITIES: [(&str, f64, f64); 6] = [
    ("Madrid", 40.42, -3.7),
    ("Barcelona", 41.39, 2.17),
    ("Bogota", 4.71, -74.07),
    ("CDMX", 19.43, -99.13),
    ("Buenos Aires", -34.6, -58.38),
    ("Lima", -12.05, -77.04),
];

/// Gauge value before noise for a given tick.
pub fn gauge_envelope(tick: f64) -> f64 {
    GAUGE_CENTER + GAUGE_AMPLITUDE * (GAUGE_FREQUENCY * tick).sin()
}

/// Percent change rounded to one decimal; zero when the baseline rounds to zero.
pub fn change_percent(current: f64, previous: f64) -> f64 {
    if rounded(previous) == 0 {
        return 0.0;
    }
    (((current - previous) / previous) * 100.0 * 10.0).round() / 10.0
}

fn rounded(value: f64) -> i64 {
    value.round() as i64
}

#[derive(Clone)]
pub struct MetricGenerator {
    state: Arc<MetricStateStore>,
    random: Arc<dyn RandomSource>,
}

impl MetricGenerator {
    pub fn new(state: Arc<MetricStateStore>, random: Arc<dyn RandomSource>) -> Self {
        Self { state, random }
    }

    pub fn state(&self) -> &Arc<MetricStateStore> {
        &self.state
    }

    /// Produce the next payload for one widget and advance its channels.
    pub fn generate(
        &self,
        widget_id: WidgetId,
        widget_type: WidgetType,
    ) -> Result<serde_json::Value, GenerationError> {
        match widget_type {
            WidgetType::LineChart => encode(self.line_point(widget_id)?),
            WidgetType::BarChart => encode(self.bar_entries(widget_id)?),
            WidgetType::PieChart => encode(self.pie_slices(widget_id)?),
            WidgetType::HeatMap => encode(self.heatmap_cells(widget_id)?),
            WidgetType::ScatterPlot => encode(self.scatter_points(widget_id)?),
            WidgetType::Gauge => encode(self.gauge_reading(widget_id)?),
            WidgetType::Table => encode(self.table_rows(widget_id)?),
            WidgetType::KpiCard => encode(self.kpi_snapshot(widget_id)?),
            WidgetType::Map => encode(self.map_markers(widget_id)?),
        }
    }

    /// One bounded random-walk step on a channel, seeding it on first use.
    fn walk(
        &self,
        widget_id: WidgetId,
        channel: impl Into<String>,
        seed: f64,
        bounds: WalkBounds,
    ) -> Result<f64, GenerationError> {
        let key = MetricKey::new(widget_id, channel);
        let delta = self.random.uniform(bounds.min_delta, bounds.max_delta);
        let next = self
            .state
            .update(key.clone(), seed, |current| bounds.step(current, delta));
        finite(&key, next)
    }

    pub fn line_point(&self, widget_id: WidgetId) -> Result<LinePoint, GenerationError> {
        let valor = self.walk(widget_id, "line", 350.0, LINE)?;
        let objetivo = self.walk(widget_id, "line_obj", 500.0, LINE_OBJECTIVE)?;

        Ok(LinePoint {
            name: Utc::now().format("%H:%M:%S").to_string(),
            valor: rounded(valor),
            objetivo: rounded(objetivo),
        })
    }

    pub fn bar_entries(&self, widget_id: WidgetId) -> Result<Vec<BarEntry>, GenerationError> {
        let mut entries = Vec::with_capacity(BAR_CATEGORIES.len());

        for (i, name) in BAR_CATEGORIES.into_iter().enumerate() {
            let i_f = i as f64;
            let sales = self.walk(widget_id, format!("bar_s{i}"), 400.0 + i_f * 120.0, BAR_SALES)?;
            let returns = self.walk(widget_id, format!("bar_r{i}"), 50.0 + i_f * 20.0, BAR_RETURNS)?;
            entries.push(BarEntry {
                name,
                ventas: rounded(sales),
                retornos: rounded(returns),
            });
        }

        Ok(entries)
    }

    pub fn pie_slices(&self, widget_id: WidgetId) -> Result<Vec<PieSlice>, GenerationError> {
        let mut slices = Vec::with_capacity(PIE_SEGMENTS.len());

        for (i, name) in PIE_SEGMENTS.into_iter().enumerate() {
            let value = self.walk(widget_id, format!("pie{i}"), 200.0 + i as f64 * 80.0, PIE)?;
            slices.push(PieSlice {
                name,
                value: rounded(value),
            });
        }

        Ok(slices)
    }

    pub fn heatmap_cells(&self, widget_id: WidgetId) -> Result<Vec<HeatmapCell>, GenerationError> {
        let mut cells = Vec::with_capacity(HEATMAP_DAYS.len() * HEATMAP_HOURS.len());

        for (d, day) in HEATMAP_DAYS.into_iter().enumerate() {
            for (h, hour) in HEATMAP_HOURS.into_iter().enumerate() {
                let value = self.walk(widget_id, format!("hm{d}_{h}"), 50.0, HEATMAP)?;
                cells.push(HeatmapCell {
                    day,
                    hour,
                    value: rounded(value),
                });
            }
        }

        Ok(cells)
    }

    pub fn scatter_points(&self, widget_id: WidgetId) -> Result<Vec<ScatterPoint>, GenerationError> {
        let mut points = Vec::with_capacity(SCATTER_POINTS);

        for i in 0..SCATTER_POINTS {
            let (seed_x, seed_y, seed_z) = scatter_seed(i);
            let x = self.walk(widget_id, format!("sc_x{i}"), seed_x, SCATTER_XY)?;
            let y = self.walk(widget_id, format!("sc_y{i}"), seed_y, SCATTER_XY)?;
            let z = self.walk(widget_id, format!("sc_z{i}"), seed_z, SCATTER_Z)?;
            points.push(ScatterPoint {
                x: rounded(x),
                y: rounded(y),
                z: rounded(z),
            });
        }

        Ok(points)
    }

    pub fn gauge_reading(&self, widget_id: WidgetId) -> Result<GaugeReading, GenerationError> {
        let tick_key = MetricKey::new(widget_id, "gauge_t");
        let tick = finite(&tick_key, self.state.update(tick_key.clone(), 0.0, |t| t + 1.0))?;

        let noise = self.random.uniform(-GAUGE_NOISE, GAUGE_NOISE);
        let value = (gauge_envelope(tick) + noise).clamp(0.0, 100.0);
        self.state.set(MetricKey::new(widget_id, "gauge"), value);

        Ok(GaugeReading {
            value: rounded(value),
            min: 0,
            max: 100,
            label: "Rendimiento",
        })
    }

    pub fn table_rows(&self, widget_id: WidgetId) -> Result<Vec<TableRow>, GenerationError> {
        let mut rows = Vec::with_capacity(SERVERS.len());

        for (i, name) in SERVERS.into_iter().enumerate() {
            let i_f = i as f64;
            let cpu = self.walk(widget_id, format!("tbl_cpu{i}"), 30.0 + i_f * 10.0, TABLE_CPU)?;
            let memory = self.walk(widget_id, format!("tbl_mem{i}"), 40.0 + i_f * 8.0, TABLE_MEMORY)?;
            let cpu = rounded(cpu);

            rows.push(TableRow {
                name,
                cpu,
                memory: rounded(memory),
                status: ServerStatus::from_cpu(cpu),
                uptime: format!("{}%", (100 - cpu / 10).max(90)),
            });
        }

        Ok(rows)
    }

    pub fn kpi_snapshot(&self, widget_id: WidgetId) -> Result<KpiSnapshot, GenerationError> {
        let value_key = MetricKey::new(widget_id, "kpi_val");
        let previous_key = MetricKey::new(widget_id, "kpi_prev");
        let current = finite(&value_key, self.state.get_or_seed(&value_key, KPI_SEED))?;
        let previous = finite(
            &previous_key,
            self.state.get_or_seed(&previous_key, KPI_PREVIOUS_SEED),
        )?;
        self.state.set(previous_key, current);

        let value = self.walk(widget_id, "kpi_val", KPI_SEED, KPI)?;
        let change = change_percent(value, previous);

        Ok(KpiSnapshot {
            value: rounded(value),
            previous_value: rounded(previous),
            change_percent: change,
            label: "Usuarios activos",
            is_positive: change >= 0.0,
        })
    }

    pub fn map_markers(&self, widget_id: WidgetId) -> Result<Vec<MapMarker>, GenerationError> {
        let mut markers = Vec::with_capacity(CITIES.len());

        for (i, (name, lat, lng)) in CITIES.into_iter().enumerate() {
            let value = self.walk(widget_id, format!("map{i}"), 500.0 + i as f64 * 100.0, MAP)?;
            markers.push(MapMarker {
                name,
                lat,
                lng,
                value: rounded(value),
            });
        }

        Ok(markers)
    }
}

/// Fixed starting position per scatter point, spread over the plot area.
fn scatter_seed(i: usize) -> (f64, f64, f64) {
    let x = 10 + (i * 37) % 81;
    let y = 10 + (i * 53 + 17) % 81;
    let z = 100 + (i * 131 + 29) % 401;
    (x as f64, y as f64, z as f64)
}

fn finite(key: &MetricKey, value: f64) -> Result<f64, GenerationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GenerationError::NonFiniteState {
            widget_id: key.widget_id(),
            channel: key.channel().to_string(),
            value,
        })
    }
}

fn encode<T: Serialize>(payload: T) -> Result<serde_json::Value, GenerationError> {
    Ok(serde_json::to_value(payload)?)
}
