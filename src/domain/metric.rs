// Metric state store - one evolving value per (widget, channel)
use super::widget::WidgetId;
use dashmap::DashMap;

/// Identifies one scalar channel of a widget. Keys of different widgets
/// never compare equal because the widget id is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricKey {
    widget_id: WidgetId,
    channel: String,
}

impl MetricKey {
    pub fn new(widget_id: WidgetId, channel: impl Into<String>) -> Self {
        Self {
            widget_id,
            channel: channel.into(),
        }
    }

    pub fn widget_id(&self) -> WidgetId {
        self.widget_id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

/// Sharded concurrent map of channel values. Entries are created lazily
/// and live for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MetricStateStore {
    values: DashMap<MetricKey, f64>,
}

impl MetricStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &MetricKey) -> Option<f64> {
        self.values.get(key).map(|v| *v)
    }

    pub fn set(&self, key: MetricKey, value: f64) {
        self.values.insert(key, value);
    }

    /// Returns the stored value, inserting `seed` first if the key is new.
    pub fn get_or_seed(&self, key: &MetricKey, seed: f64) -> f64 {
        *self.values.entry(key.clone()).or_insert(seed)
    }

    /// Read-modify-write under the shard lock of `key`.
    pub fn update<F>(&self, key: MetricKey, seed: f64, f: F) -> f64
    where
        F: FnOnce(f64) -> f64,
    {
        let mut entry = self.values.entry(key).or_insert(seed);
        let next = f(*entry);
        *entry = next;
        next
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
