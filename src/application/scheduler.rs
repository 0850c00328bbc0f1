// Simulation scheduler - fast tick loop generating and broadcasting widget data
use crate::application::catalog::DashboardCatalog;
use crate::application::generator::MetricGenerator;
use crate::domain::events::{ServerEvent, WidgetDataBundle};
use crate::domain::widget::DashboardSnapshot;
use crate::infrastructure::hub::GroupHub;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub tick_interval: Duration,
    pub refresh_interval: Duration,
    /// A refresh still pending after this long is abandoned for the tick.
    pub refresh_timeout: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(500),
            refresh_interval: Duration::from_secs(30),
            refresh_timeout: Duration::from_secs(5),
        }
    }
}

/// What one tick did, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub refreshed: bool,
    pub broadcasts: usize,
    pub generated: usize,
    pub skipped: usize,
}

pub struct SimulationScheduler {
    catalog: Arc<DashboardCatalog>,
    generator: MetricGenerator,
    hub: Arc<GroupHub>,
    settings: SchedulerSettings,
    last_refresh: Option<Instant>,
}

impl SimulationScheduler {
    pub fn new(
        catalog: Arc<DashboardCatalog>,
        generator: MetricGenerator,
        hub: Arc<GroupHub>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            catalog,
            generator,
            hub,
            settings,
            last_refresh: None,
        }
    }

    /// Tick until cancelled. Cancellation is observed between ticks, never mid-tick.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            "Simulation scheduler started (tick {:?}, refresh {:?})",
            self.settings.tick_interval,
            self.settings.refresh_interval
        );

        while !cancel.is_cancelled() {
            let report = self.tick().await;
            tracing::trace!(?report, "Tick complete");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.tick_interval) => {}
            }
        }

        tracing::info!("Simulation scheduler stopped");
    }

    /// One iteration: refresh the catalog when due, then one bundle per
    /// dashboard that has widgets.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        if self.refresh_due() {
            match tokio::time::timeout(self.settings.refresh_timeout, self.catalog.refresh()).await {
                Ok(Ok(_)) => {
                    self.last_refresh = Some(Instant::now());
                    report.refreshed = true;
                }
                Ok(Err(e)) => tracing::error!("Catalog refresh failed, keeping previous snapshot: {:#}", e),
                Err(_) => tracing::error!(
                    "Catalog refresh timed out after {:?}, keeping previous snapshot",
                    self.settings.refresh_timeout
                ),
            }
        }

        let snapshot = self.catalog.current();
        for dashboard in snapshot.iter() {
            if dashboard.widgets.is_empty() {
                continue;
            }

            let bundle = self.generate_bundle(dashboard, &mut report);
            if bundle.widgets.is_empty() {
                continue;
            }

            match self
                .hub
                .broadcast_to_group(dashboard.dashboard_id, &ServerEvent::WidgetDataUpdated(bundle))
            {
                Ok(_) => report.broadcasts += 1,
                Err(e) => tracing::error!(
                    "Broadcast to dashboard {} failed: {}",
                    dashboard.dashboard_id,
                    e
                ),
            }
        }

        report
    }

    fn refresh_due(&self) -> bool {
        match self.last_refresh {
            None => true,
            Some(at) => at.elapsed() > self.settings.refresh_interval,
        }
    }

    fn generate_bundle(&self, dashboard: &DashboardSnapshot, report: &mut TickReport) -> WidgetDataBundle {
        let mut widgets = HashMap::with_capacity(dashboard.widgets.len());

        for widget in &dashboard.widgets {
            match self.generator.generate(widget.widget_id, widget.widget_type) {
                Ok(payload) => {
                    widgets.insert(widget.widget_id, payload);
                    report.generated += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "Skipping {} widget {} this tick: {}",
                        widget.widget_type,
                        widget.widget_id,
                        e
                    );
                    report.skipped += 1;
                }
            }
        }

        WidgetDataBundle {
            dashboard_id: dashboard.dashboard_id,
            widgets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::catalog::tests::{published, InMemoryCatalog};
    use crate::application::catalog_repository::{DashboardCatalogRepository, PublishedDashboard};
    use crate::application::generator::tests::ScriptedRandom;
    use crate::domain::metric::{MetricKey, MetricStateStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct Counting {
        inner: InMemoryCatalog,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DashboardCatalogRepository for Counting {
        async fn published_dashboards(&self) -> anyhow::Result<Vec<PublishedDashboard>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.published_dashboards().await
        }
    }

    fn counting(dashboards: Vec<PublishedDashboard>) -> Arc<Counting> {
        Arc::new(Counting {
            inner: InMemoryCatalog::with(dashboards),
            calls: AtomicUsize::new(0),
        })
    }

    fn scheduler(repo: Arc<Counting>, hub: Arc<GroupHub>) -> SimulationScheduler {
        let generator = MetricGenerator::new(
            Arc::new(MetricStateStore::new()),
            Arc::new(ScriptedRandom::constant(0.0)),
        );
        SimulationScheduler::new(
            Arc::new(DashboardCatalog::new(repo)),
            generator,
            hub,
            SchedulerSettings::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_dashboard_never_broadcasts() {
        let empty = Uuid::new_v4();
        let busy = Uuid::new_v4();
        let hub = Arc::new(GroupHub::new(64));
        let (watcher, mut empty_rx) = hub.connect();
        let (viewer, mut busy_rx) = hub.connect();
        hub.join(watcher, empty);
        hub.join(viewer, busy);

        let repo = counting(vec![
            published(empty, &[]),
            published(busy, &[(Uuid::new_v4(), "Gauge")]),
        ]);
        let mut scheduler = scheduler(repo, hub);

        for _ in 0..5 {
            let report = scheduler.tick().await;
            assert_eq!(report.broadcasts, 1);
        }

        assert!(empty_rx.try_recv().is_err());
        let mut frames = 0;
        while let Ok(frame) = busy_rx.try_recv() {
            let event: ServerEvent = serde_json::from_str(&frame).unwrap();
            assert_eq!(event.name(), "widget-data-updated");
            assert_eq!(event.dashboard_id(), Some(busy));
            frames += 1;
        }
        assert_eq!(frames, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_catalog_refreshes_on_slow_cadence() {
        let repo = counting(vec![published(Uuid::new_v4(), &[(Uuid::new_v4(), "Map")])]);
        let mut scheduler = scheduler(repo.clone(), Arc::new(GroupHub::new(8)));

        assert!(scheduler.tick().await.refreshed);
        for _ in 0..10 {
            tokio::time::advance(Duration::from_secs(2)).await;
            assert!(!scheduler.tick().await.refreshed);
        }
        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(scheduler.tick().await.refreshed);
        assert_eq!(repo.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_retries_next_tick_with_stale_snapshot() {
        let dashboard = Uuid::new_v4();
        let repo = counting(vec![published(dashboard, &[(Uuid::new_v4(), "KpiCard")])]);
        let hub = Arc::new(GroupHub::new(8));
        let mut scheduler = scheduler(repo.clone(), hub);

        scheduler.tick().await;
        repo.inner.set_failing(true);
        tokio::time::advance(Duration::from_secs(31)).await;

        let report = scheduler.tick().await;
        assert!(!report.refreshed);
        assert_eq!(report.broadcasts, 1);

        let report = scheduler.tick().await;
        assert!(!report.refreshed);
        assert_eq!(repo.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_faulty_widget_is_skipped_without_aborting_tick() {
        let dashboard = Uuid::new_v4();
        let broken = Uuid::new_v4();
        let healthy = Uuid::new_v4();
        let repo = counting(vec![published(
            dashboard,
            &[(broken, "LineChart"), (healthy, "Gauge")],
        )]);
        let hub = Arc::new(GroupHub::new(8));
        let (viewer, mut rx) = hub.connect();
        hub.join(viewer, dashboard);
        let mut scheduler = scheduler(repo, hub);
        scheduler
            .generator
            .state()
            .set(MetricKey::new(broken, "line"), f64::NAN);

        let report = scheduler.tick().await;

        assert_eq!((report.generated, report.skipped), (1, 1));
        let event: ServerEvent = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        let ServerEvent::WidgetDataUpdated(bundle) = event else {
            panic!("expected widget data");
        };
        assert!(bundle.widgets.contains_key(&healthy));
        assert!(!bundle.widgets.contains_key(&broken));
    }

    /// Answers the first refresh, then never completes another.
    struct StallsAfterFirst {
        dashboard: PublishedDashboard,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DashboardCatalogRepository for StallsAfterFirst {
        async fn published_dashboards(&self) -> anyhow::Result<Vec<PublishedDashboard>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(vec![self.dashboard.clone()]);
            }
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_refresh_keeps_previous_snapshot_and_stops_on_cancel() {
        let dashboard = Uuid::new_v4();
        let hub = Arc::new(GroupHub::new(256));
        let (viewer, mut rx) = hub.connect();
        hub.join(viewer, dashboard);

        let repo = Arc::new(StallsAfterFirst {
            dashboard: published(dashboard, &[(Uuid::new_v4(), "Gauge")]),
            calls: AtomicUsize::new(0),
        });
        let scheduler = SimulationScheduler::new(
            Arc::new(DashboardCatalog::new(repo.clone())),
            MetricGenerator::new(
                Arc::new(MetricStateStore::new()),
                Arc::new(ScriptedRandom::constant(0.0)),
            ),
            hub,
            SchedulerSettings::default(),
        );
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(scheduler.run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(60)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("scheduler stuck on a stalled refresh")
            .unwrap();

        // Every stalled refresh is abandoned and retried on the next tick.
        assert!(repo.calls.load(Ordering::SeqCst) >= 3);

        // 61 bundles before the first stall, then one per abandoned refresh.
        let mut frames = 0;
        while rx.try_recv().is_ok() {
            frames += 1;
        }
        assert!(frames >= 64, "only {frames} bundles");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_promptly_on_cancel() {
        let repo = counting(vec![published(Uuid::new_v4(), &[(Uuid::new_v4(), "Table")])]);
        let scheduler = scheduler(repo.clone(), Arc::new(GroupHub::new(8)));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(scheduler.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(1600)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_millis(10), handle)
            .await
            .expect("scheduler did not stop at the sleep boundary")
            .unwrap();
        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
    }
}
