// Client-side widget data cache
use crate::domain::events::WidgetDataBundle;
use crate::domain::widget::WidgetId;
use dashmap::DashMap;
use std::collections::{HashSet, VecDeque};

/// Points retained per streaming widget.
pub const MAX_SERIES_POINTS: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub enum CachedWidget {
    /// Oldest first, at most `MAX_SERIES_POINTS` long.
    Series(VecDeque<serde_json::Value>),
    Latest(serde_json::Value),
}

#[derive(Debug, Default)]
pub struct WidgetDataCache {
    widgets: DashMap<WidgetId, CachedWidget>,
}

impl WidgetDataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_point(&self, widget_id: WidgetId, point: serde_json::Value) {
        let mut entry = self
            .widgets
            .entry(widget_id)
            .or_insert_with(|| CachedWidget::Series(VecDeque::with_capacity(MAX_SERIES_POINTS)));

        // A widget whose type changed to streaming starts a fresh series.
        if matches!(*entry, CachedWidget::Latest(_)) {
            *entry = CachedWidget::Series(VecDeque::with_capacity(MAX_SERIES_POINTS));
        }
        if let CachedWidget::Series(points) = &mut *entry {
            points.push_back(point);
            while points.len() > MAX_SERIES_POINTS {
                points.pop_front();
            }
        }
    }

    pub fn replace(&self, widget_id: WidgetId, payload: serde_json::Value) {
        self.widgets.insert(widget_id, CachedWidget::Latest(payload));
    }

    /// Merge one tick: streaming widgets append, everything else is replaced.
    pub fn apply_bundle(&self, bundle: WidgetDataBundle, streaming: &HashSet<WidgetId>) {
        for (widget_id, payload) in bundle.widgets {
            if streaming.contains(&widget_id) {
                self.append_point(widget_id, payload);
            } else {
                self.replace(widget_id, payload);
            }
        }
    }

    pub fn get(&self, widget_id: WidgetId) -> Option<CachedWidget> {
        self.widgets.get(&widget_id).map(|w| w.clone())
    }

    /// Drop cached data for widgets that are no longer on the dashboard.
    pub fn retain(&self, live: &HashSet<WidgetId>) {
        self.widgets.retain(|id, _| live.contains(id));
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }
}
