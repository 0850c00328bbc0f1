// Client subscription manager - group membership and event routing per viewed dashboard
use crate::client::alerts::AlertStore;
use crate::client::connection::ConnectionManager;
use crate::client::queries::{DashboardDefinition, DashboardQueries};
use crate::client::view_cache::WidgetDataCache;
use crate::domain::connection::ConnectionState;
use crate::domain::events::{ClientCommand, ServerEvent};
use crate::domain::widget::{DashboardId, WidgetId};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Live view of one dashboard. Joins the dashboard's group whenever the
/// connection becomes `Connected` and merges its events into a local cache.
pub struct DashboardSubscription {
    dashboard_id: DashboardId,
    connection: Arc<ConnectionManager>,
    cache: Arc<WidgetDataCache>,
    streaming: Arc<RwLock<HashSet<WidgetId>>>,
    cancel: CancellationToken,
    listener: Option<JoinHandle<()>>,
}

struct Listener {
    dashboard_id: DashboardId,
    connection: Arc<ConnectionManager>,
    queries: Arc<dyn DashboardQueries>,
    cache: Arc<WidgetDataCache>,
    alerts: Arc<AlertStore>,
    streaming: Arc<RwLock<HashSet<WidgetId>>>,
}

impl DashboardSubscription {
    pub fn mount(
        dashboard: &DashboardDefinition,
        connection: Arc<ConnectionManager>,
        queries: Arc<dyn DashboardQueries>,
        alerts: Arc<AlertStore>,
    ) -> Self {
        let cache = Arc::new(WidgetDataCache::new());
        let streaming = Arc::new(RwLock::new(dashboard.streaming_widget_ids()));
        let cancel = CancellationToken::new();

        // Joins now if already connected; the listener only sees later edges.
        let (state, transitions) = connection.state_and_transitions();
        let events = connection.subscribe();

        let listener = Listener {
            dashboard_id: dashboard.id,
            connection: connection.clone(),
            queries,
            cache: cache.clone(),
            alerts,
            streaming: streaming.clone(),
        };
        if state == ConnectionState::Connected {
            listener.join();
        } else {
            tracing::debug!("Deferring join of dashboard {} until connected", dashboard.id);
        }

        let handle = tokio::spawn(listener.run(transitions, events, cancel.clone()));

        Self {
            dashboard_id: dashboard.id,
            connection,
            cache,
            streaming,
            cancel,
            listener: Some(handle),
        }
    }

    pub fn dashboard_id(&self) -> DashboardId {
        self.dashboard_id
    }

    pub fn cache(&self) -> &Arc<WidgetDataCache> {
        &self.cache
    }

    pub fn streaming_widgets(&self) -> HashSet<WidgetId> {
        self.streaming
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Leave the group if still connected. Local listeners are removed
    /// regardless of the connection state.
    pub async fn unmount(mut self) {
        self.cancel.cancel();
        if let Some(listener) = self.listener.take() {
            let _ = listener.await;
        }
        if self.connection.state() == ConnectionState::Connected {
            self.connection.send(ClientCommand::Leave {
                dashboard_id: self.dashboard_id,
            });
        }
    }
}

impl Drop for DashboardSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Listener {
    async fn run(
        self,
        mut transitions: broadcast::Receiver<ConnectionState>,
        mut events: broadcast::Receiver<ServerEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                transition = transitions.recv() => match transition {
                    Ok(ConnectionState::Connected) => self.join(),
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => {
                        if self.connection.state() == ConnectionState::Connected {
                            self.join();
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
                event = events.recv() => match event {
                    Ok(event) => self.handle(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Dashboard {} missed {} events", self.dashboard_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }

    fn join(&self) {
        let sent = self.connection.send(ClientCommand::Join {
            dashboard_id: self.dashboard_id,
        });
        tracing::debug!("Join dashboard {} sent: {}", self.dashboard_id, sent);
    }

    async fn handle(&self, event: ServerEvent) {
        if event.dashboard_id() != Some(self.dashboard_id) {
            return;
        }

        match event {
            ServerEvent::DashboardUpdated { .. } => {
                self.refetch().await;
                if let Err(e) = self.queries.invalidate_dashboard_list().await {
                    tracing::warn!("Dashboard list refetch failed: {:#}", e);
                }
            }
            ServerEvent::WidgetAdded { .. } | ServerEvent::WidgetRemoved { .. } => {
                self.refetch().await;
            }
            ServerEvent::AlertTriggered {
                dashboard_id,
                alert_id,
                severity,
            } => self.alerts.add(dashboard_id, alert_id, severity),
            ServerEvent::WidgetDataUpdated(bundle) => {
                let streaming = self
                    .streaming
                    .read()
                    .unwrap_or_else(|p| p.into_inner())
                    .clone();
                self.cache.apply_bundle(bundle, &streaming);
            }
            ServerEvent::DashboardListChanged => {}
        }
    }

    async fn refetch(&self) {
        match self.queries.invalidate_dashboard(self.dashboard_id).await {
            Ok(definition) => {
                let live: HashSet<WidgetId> = definition.widgets.iter().map(|w| w.id).collect();
                self.cache.retain(&live);
                *self.streaming.write().unwrap_or_else(|p| p.into_inner()) =
                    definition.streaming_widget_ids();
            }
            Err(e) => tracing::warn!("Dashboard {} refetch failed: {:#}", self.dashboard_id, e),
        }
    }
}

/// Process-wide listener keeping the dashboard list fresh.
pub struct DashboardListSubscription {
    dashboards: watch::Receiver<Vec<DashboardDefinition>>,
    cancel: CancellationToken,
    listener: Option<JoinHandle<()>>,
}

impl DashboardListSubscription {
    pub fn start(connection: &ConnectionManager, queries: Arc<dyn DashboardQueries>) -> Self {
        let (tx, dashboards) = watch::channel(Vec::new());
        let cancel = CancellationToken::new();
        let events = connection.subscribe();
        let handle = tokio::spawn(listen_for_list_changes(events, queries, tx, cancel.clone()));

        Self {
            dashboards,
            cancel,
            listener: Some(handle),
        }
    }

    /// The most recently fetched list; empty until the first change arrives.
    pub fn dashboards(&self) -> watch::Receiver<Vec<DashboardDefinition>> {
        self.dashboards.clone()
    }

    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(listener) = self.listener.take() {
            let _ = listener.await;
        }
    }
}

impl Drop for DashboardListSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn listen_for_list_changes(
    mut events: broadcast::Receiver<ServerEvent>,
    queries: Arc<dyn DashboardQueries>,
    tx: watch::Sender<Vec<DashboardDefinition>>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(ServerEvent::DashboardListChanged) | Err(RecvError::Lagged(_)) => {
                match queries.invalidate_dashboard_list().await {
                    Ok(list) => {
                        tx.send_replace(list);
                    }
                    Err(e) => tracing::warn!("Dashboard list refetch failed: {:#}", e),
                }
            }
            Ok(_) => {}
            Err(RecvError::Closed) => break,
        }
    }
}
