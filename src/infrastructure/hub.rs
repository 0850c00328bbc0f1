// Group fan-out hub - per-dashboard membership and broadcast
use crate::domain::events::ServerEvent;
use crate::domain::widget::DashboardId;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// Serialized frame shared by every recipient of one broadcast.
pub type Frame = Arc<str>;

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("failed to encode {event} frame: {source}")]
    Encode {
        event: &'static str,
        source: serde_json::Error,
    },
}

/// Single-process pub/sub hub. Each connection owns a bounded outbound
/// queue; groups map a dashboard to the connections viewing it and
/// disappear once their last member leaves.
pub struct GroupHub {
    connections: DashMap<ConnectionId, mpsc::Sender<Frame>>,
    groups: DashMap<DashboardId, HashSet<ConnectionId>>,
    client_buffer: usize,
}

impl GroupHub {
    pub fn new(client_buffer: usize) -> Self {
        Self {
            connections: DashMap::new(),
            groups: DashMap::new(),
            client_buffer: client_buffer.max(1),
        }
    }

    /// Register a transport connection; frames for it arrive on the receiver.
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<Frame>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.client_buffer);
        self.connections.insert(id, tx);
        tracing::debug!("Connection {} registered", id);
        (id, rx)
    }

    /// Tear down a connection and drop it from every group it joined.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        if self.connections.remove(&connection_id).is_none() {
            return;
        }
        self.groups.retain(|_, members| {
            members.remove(&connection_id);
            !members.is_empty()
        });
        tracing::debug!("Connection {} removed", connection_id);
    }

    /// Idempotent. Returns false when the connection is not (or no longer) registered.
    pub fn join(&self, connection_id: ConnectionId, dashboard_id: DashboardId) -> bool {
        if !self.connections.contains_key(&connection_id) {
            return false;
        }
        self.groups
            .entry(dashboard_id)
            .or_default()
            .insert(connection_id);
        // Lost a race with disconnect.
        if !self.connections.contains_key(&connection_id) {
            self.leave(connection_id, dashboard_id);
            return false;
        }
        tracing::debug!("Connection {} joined dashboard {}", connection_id, dashboard_id);
        true
    }

    /// Idempotent; leaving a group the connection is not in is a no-op.
    pub fn leave(&self, connection_id: ConnectionId, dashboard_id: DashboardId) {
        if let Some(mut members) = self.groups.get_mut(&dashboard_id) {
            members.remove(&connection_id);
        }
        self.groups
            .remove_if(&dashboard_id, |_, members| members.is_empty());
        tracing::debug!("Connection {} left dashboard {}", connection_id, dashboard_id);
    }

    /// Deliver to current members of the dashboard's group. Returns the
    /// number of connections the frame was queued for.
    pub fn broadcast_to_group(
        &self,
        dashboard_id: DashboardId,
        event: &ServerEvent,
    ) -> Result<usize, HubError> {
        let members: Vec<ConnectionId> = match self.groups.get(&dashboard_id) {
            Some(members) => members.iter().copied().collect(),
            None => return Ok(0),
        };
        let frame = encode(event)?;
        Ok(members
            .into_iter()
            .filter(|id| self.deliver(*id, &frame))
            .count())
    }

    /// Deliver to every registered connection regardless of group.
    pub fn broadcast_to_all(&self, event: &ServerEvent) -> Result<usize, HubError> {
        let frame = encode(event)?;
        let targets: Vec<ConnectionId> = self.connections.iter().map(|c| *c.key()).collect();
        Ok(targets
            .into_iter()
            .filter(|id| self.deliver(*id, &frame))
            .count())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn group_size(&self, dashboard_id: DashboardId) -> usize {
        self.groups.get(&dashboard_id).map(|m| m.len()).unwrap_or(0)
    }

    fn deliver(&self, connection_id: ConnectionId, frame: &Frame) -> bool {
        let Some(tx) = self.connections.get(&connection_id).map(|c| c.clone()) else {
            return false;
        };
        match tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Dropping frame for slow connection {}", connection_id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

fn encode(event: &ServerEvent) -> Result<Frame, HubError> {
    serde_json::to_string(event)
        .map(Frame::from)
        .map_err(|source| HubError::Encode {
            event: event.name(),
            source,
        })
}
