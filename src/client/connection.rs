// Client connection manager - one transport per process with automatic reconnect
use crate::domain::connection::ConnectionState;
use crate::domain::events::{ClientCommand, ServerEvent};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const TRANSITION_BUFFER: usize = 16;
const EVENT_BUFFER: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("{url} rejected the upgrade with status {status}")]
    Handshake { url: String, status: u16 },
}

/// An established transport. Dropping `outbound` asks the transport to
/// close; `inbound` yielding `None` means the transport was lost.
pub struct TransportLink {
    pub outbound: mpsc::Sender<ClientCommand>,
    pub inbound: mpsc::Receiver<ServerEvent>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<TransportLink, TransportError>;
}

/// Delay before each reconnect attempt. Attempts past the end of the
/// schedule reuse its final entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    schedule: Vec<Duration>,
    max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            [0, 1000, 2000, 5000, 10000, 30000]
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
            None,
        )
    }
}

impl ReconnectPolicy {
    pub fn new(schedule: Vec<Duration>, max_attempts: Option<u32>) -> Self {
        Self {
            schedule,
            max_attempts,
        }
    }

    /// `None` once retrying should stop.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }
        let last = self.schedule.len().checked_sub(1)?;
        let index = (attempt as usize).min(last);
        Some(self.schedule[index])
    }
}

struct Shared {
    state: watch::Sender<ConnectionState>,
    transitions: broadcast::Sender<ConnectionState>,
    events: broadcast::Sender<ServerEvent>,
    outbound: Mutex<Option<mpsc::Sender<ClientCommand>>>,
}

impl Shared {
    /// The edge is queued while the state lock is held, so a reader holding
    /// `state.borrow()` sees the state and the queue agree.
    fn set_state(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            let _ = self.transitions.send(next);
            true
        });
        if changed {
            tracing::info!("Connection state: {}", next);
        }
    }

    fn install(&self, outbound: mpsc::Sender<ClientCommand>) {
        *self.outbound.lock().unwrap_or_else(|p| p.into_inner()) = Some(outbound);
    }

    fn clear(&self) {
        self.outbound
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
    }
}

/// Owns the process's single transport. Construct once and share via `Arc`.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Start connecting immediately in a background task.
    pub fn start(connector: Arc<dyn Connector>, policy: ReconnectPolicy) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let shared = Arc::new(Shared {
            state,
            transitions,
            events,
            outbound: Mutex::new(None),
        });
        let cancel = CancellationToken::new();

        let driver = tokio::spawn(drive(shared.clone(), connector, policy, cancel.clone()));

        Self {
            shared,
            cancel,
            driver: Mutex::new(Some(driver)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// The current state together with every later change, in order. Unlike
    /// `watch_state` no edge is coalesced, and no edge is both reflected in
    /// the returned state and queued on the receiver.
    pub fn state_and_transitions(&self) -> (ConnectionState, broadcast::Receiver<ConnectionState>) {
        let state = self.shared.state.borrow();
        (*state, self.shared.transitions.subscribe())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.shared.events.subscribe()
    }

    /// Local event listeners currently registered.
    pub fn listener_count(&self) -> usize {
        self.shared.events.receiver_count()
    }

    /// Queue a command on the live transport. Returns false, without
    /// error, when not connected.
    pub fn send(&self, command: ClientCommand) -> bool {
        if self.state() != ConnectionState::Connected {
            return false;
        }
        let guard = self.shared.outbound.lock().unwrap_or_else(|p| p.into_inner());
        match guard.as_ref() {
            Some(tx) => tx.try_send(command).is_ok(),
            None => false,
        }
    }

    /// Stop reconnecting, close the transport and settle in `Disconnected`.
    /// The manager cannot be restarted afterwards.
    pub async fn dispose(&self) {
        self.cancel.cancel();
        let driver = self
            .driver
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(driver) = driver {
            let _ = driver.await;
        }
        self.shared.clear();
        self.shared.set_state(ConnectionState::Disconnected);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn drive(
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    cancel: CancellationToken,
) {
    shared.set_state(ConnectionState::Connecting);

    let first = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = connector.connect() => result,
    };
    let mut link = match first {
        Ok(link) => link,
        Err(e) => {
            tracing::warn!("Initial connection failed: {}", e);
            shared.set_state(ConnectionState::Disconnected);
            return;
        }
    };

    loop {
        shared.install(link.outbound.clone());
        shared.set_state(ConnectionState::Connected);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                event = link.inbound.recv() => match event {
                    Some(event) => {
                        let _ = shared.events.send(event);
                    }
                    None => break,
                },
            }
        }

        shared.clear();
        drop(link);
        tracing::warn!("Connection lost");
        shared.set_state(ConnectionState::Connecting);

        link = match reconnect(&*connector, &policy, &cancel).await {
            Some(link) => link,
            None => {
                if !cancel.is_cancelled() {
                    shared.set_state(ConnectionState::Disconnected);
                }
                return;
            }
        };
    }
}

async fn reconnect(
    connector: &dyn Connector,
    policy: &ReconnectPolicy,
    cancel: &CancellationToken,
) -> Option<TransportLink> {
    let mut attempt = 0u32;

    loop {
        let Some(delay) = policy.delay(attempt) else {
            tracing::warn!("Giving up after {} reconnect attempts", attempt);
            return None;
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            result = connector.connect() => result,
        };

        match result {
            Ok(link) => return Some(link),
            Err(e) => {
                attempt += 1;
                match policy.delay(attempt) {
                    Some(next) => tracing::warn!("Reconnect attempt {} failed: {}, retrying in {:?}", attempt, e, next),
                    None => tracing::warn!("Reconnect attempt {} failed: {}", attempt, e),
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tokio::time::Instant;
    use uuid::Uuid;

    /// Server side of one fake transport.
    pub(crate) struct FakePeer {
        pub commands: mpsc::Receiver<ClientCommand>,
        pub events: mpsc::Sender<ServerEvent>,
    }

    /// Hands out scripted connect results and keeps the server half of
    /// every link it established.
    #[derive(Default)]
    pub(crate) struct FakeConnector {
        script: Mutex<VecDeque<bool>>,
        pub attempts: Mutex<Vec<Instant>>,
        peers: Mutex<Vec<FakePeer>>,
        peer_ready: tokio::sync::Notify,
    }

    impl FakeConnector {
        /// `true` entries succeed; once the script runs out every attempt succeeds.
        pub fn scripted(outcomes: &[bool]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(outcomes.iter().copied().collect()),
                ..Default::default()
            })
        }

        pub fn attempts(&self) -> Vec<Instant> {
            self.attempts.lock().unwrap().clone()
        }

        pub async fn next_peer(&self) -> FakePeer {
            loop {
                let notified = self.peer_ready.notified();
                if let Some(peer) = self.peers.lock().unwrap().pop() {
                    return peer;
                }
                notified.await;
            }
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(&self) -> Result<TransportLink, TransportError> {
            self.attempts.lock().unwrap().push(Instant::now());
            let succeed = self.script.lock().unwrap().pop_front().unwrap_or(true);
            if !succeed {
                return Err(TransportError::Connect {
                    url: "fake://hub".to_string(),
                    reason: "refused".to_string(),
                });
            }

            let (out_tx, out_rx) = mpsc::channel(16);
            let (in_tx, in_rx) = mpsc::channel(16);
            self.peers.lock().unwrap().push(FakePeer {
                commands: out_rx,
                events: in_tx,
            });
            self.peer_ready.notify_waiters();
            Ok(TransportLink {
                outbound: out_tx,
                inbound: in_rx,
            })
        }
    }

    pub(crate) async fn wait_for(manager: &ConnectionManager, target: ConnectionState) {
        let mut rx = manager.watch_state();
        rx.wait_for(|s| *s == target).await.unwrap();
    }

    #[test]
    fn test_policy_repeats_final_delay() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..8)
            .map(|a| policy.delay(a).unwrap().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![0, 1000, 2000, 5000, 10000, 30000, 30000, 30000]);
    }

    #[test]
    fn test_policy_stops_at_max_attempts() {
        let policy = ReconnectPolicy::new(vec![Duration::from_millis(10)], Some(2));
        assert!(policy.delay(1).is_some());
        assert!(policy.delay(2).is_none());
        assert!(ReconnectPolicy::new(Vec::new(), None).delay(0).is_none());
    }

    #[tokio::test]
    async fn test_send_is_a_no_op_until_connected() {
        let connector = FakeConnector::scripted(&[]);
        let manager = ConnectionManager::start(connector.clone(), ReconnectPolicy::default());
        let dashboard_id = Uuid::new_v4();

        wait_for(&manager, ConnectionState::Connected).await;
        let mut peer = connector.next_peer().await;
        assert!(manager.send(ClientCommand::Join { dashboard_id }));
        assert_eq!(
            peer.commands.recv().await,
            Some(ClientCommand::Join { dashboard_id })
        );

        manager.dispose().await;
        assert!(!manager.send(ClientCommand::Leave { dashboard_id }));
    }

    #[tokio::test]
    async fn test_state_and_transitions_never_repeat_an_observed_edge() {
        let connector = FakeConnector::scripted(&[]);
        let manager = ConnectionManager::start(connector.clone(), ReconnectPolicy::default());

        let (before, mut early) = manager.state_and_transitions();
        assert_ne!(before, ConnectionState::Connected);
        wait_for(&manager, ConnectionState::Connected).await;

        let (after, mut late) = manager.state_and_transitions();
        assert_eq!(after, ConnectionState::Connected);
        assert!(late.try_recv().is_err());

        let mut seen = Vec::new();
        while let Ok(state) = early.try_recv() {
            seen.push(state);
        }
        assert_eq!(seen.last(), Some(&ConnectionState::Connected));

        manager.dispose().await;
    }

    #[tokio::test]
    async fn test_initial_failure_settles_disconnected() {
        let connector = FakeConnector::scripted(&[false]);
        let manager = ConnectionManager::start(connector.clone(), ReconnectPolicy::default());

        let (_, mut transitions) = manager.state_and_transitions();
        wait_for(&manager, ConnectionState::Disconnected).await;
        tokio::task::yield_now().await;

        assert_eq!(connector.attempts().len(), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        while let Ok(state) = transitions.try_recv() {
            assert_ne!(state, ConnectionState::Connected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_follows_backoff_schedule() {
        let connector = FakeConnector::scripted(&[true, false, false, false, true]);
        let manager = ConnectionManager::start(connector.clone(), ReconnectPolicy::default());

        wait_for(&manager, ConnectionState::Connected).await;
        let peer = connector.next_peer().await;
        let (_, mut transitions) = manager.state_and_transitions();
        drop(peer);

        assert_eq!(transitions.recv().await.unwrap(), ConnectionState::Connecting);
        assert_eq!(transitions.recv().await.unwrap(), ConnectionState::Connected);

        let attempts = connector.attempts();
        assert_eq!(attempts.len(), 5);
        let gaps: Vec<u64> = attempts
            .windows(2)
            .skip(1)
            .map(|w| (w[1] - w[0]).as_millis() as u64)
            .collect();
        assert_eq!(gaps, vec![1000, 2000, 5000]);

        manager.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_cancels_pending_reconnect() {
        let connector = FakeConnector::scripted(&[true, false, false]);
        let manager = ConnectionManager::start(connector.clone(), ReconnectPolicy::default());

        wait_for(&manager, ConnectionState::Connected).await;
        drop(connector.next_peer().await);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(manager.state(), ConnectionState::Connecting);

        manager.dispose().await;
        let attempts = connector.attempts().len();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(connector.attempts().len(), attempts);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_end_disconnected() {
        let connector = FakeConnector::scripted(&[true, false, false]);
        let policy = ReconnectPolicy::new(vec![Duration::from_millis(100)], Some(2));
        let manager = ConnectionManager::start(connector.clone(), policy);

        wait_for(&manager, ConnectionState::Connected).await;
        drop(connector.next_peer().await);
        wait_for(&manager, ConnectionState::Disconnected).await;

        assert_eq!(connector.attempts().len(), 3);
    }

    #[tokio::test]
    async fn test_inbound_events_are_broadcast() {
        let connector = FakeConnector::scripted(&[]);
        let manager = ConnectionManager::start(connector.clone(), ReconnectPolicy::default());
        let mut events = manager.subscribe();

        wait_for(&manager, ConnectionState::Connected).await;
        let peer = connector.next_peer().await;
        peer.events.send(ServerEvent::DashboardListChanged).await.unwrap();

        assert_eq!(events.recv().await.unwrap(), ServerEvent::DashboardListChanged);
        manager.dispose().await;
    }
}
