//! Live database connections belonging to logged-in sessions.
//!
//! The session cookie only carries a [`SessionUser`]; the client it refers to
//! cannot be serialized, so it is kept here under the user's connection id.

use dashmap::DashMap;
use domain::{Role, SharedClient};
use log::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Session key the logged-in user is stored under.
pub const SESSION_USER_KEY: &str = "user";

/// The part of a login that lives in the session store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Connection id in the [`ConnectionRegistry`].
    pub id: String,
    pub username: String,
    pub role: Role,
}

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

struct Connection {
    client: SharedClient,
    last_used: Instant,
}

pub struct ConnectionRegistry {
    connections: DashMap<String, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Stores `client` and returns the id to keep in the session.
    pub fn register(&self, client: SharedClient) -> ConnectionId {
        let connection_id = ConnectionId::new();
        self.connections.insert(
            connection_id.as_str().to_string(),
            Connection {
                client,
                last_used: Instant::now(),
            },
        );
        info!("Registered new FalkorDB connection");
        connection_id
    }

    /// Looks up a connection and marks it as used.
    pub fn get(&self, connection_id: &str) -> Option<SharedClient> {
        let mut connection = self.connections.get_mut(connection_id)?;
        connection.last_used = Instant::now();
        Some(connection.client.clone())
    }

    pub fn unregister(&self, connection_id: &str) -> bool {
        info!("Unregistering FalkorDB connection");
        self.connections.remove(connection_id).is_some()
    }

    /// Drops connections unused for `max_idle`; their sessions have expired too.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut evicted = 0;
        self.connections.retain(|_, connection| {
            let keep = connection.last_used.elapsed() < max_idle;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodically closes connections whose sessions went idle past `max_idle`.
pub fn spawn_connection_sweeper(
    registry: Arc<ConnectionRegistry>,
    max_idle: Duration,
) -> JoinHandle<()> {
    let period = (max_idle / 4).max(Duration::from_secs(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = registry.evict_idle(max_idle);
            if evicted > 0 {
                info!("Closed {evicted} idle FalkorDB connection(s)");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::graph::mock::RecordingClient;

    #[test]
    fn registered_connection_can_be_looked_up_and_removed() {
        let registry = ConnectionRegistry::new();
        let id = registry.register(Arc::new(RecordingClient::new()));

        assert!(registry.get(id.as_str()).is_some());
        assert!(registry.unregister(id.as_str()));
        assert!(registry.get(id.as_str()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn evict_idle_keeps_recently_used_connections() {
        let registry = ConnectionRegistry::new();
        registry.register(Arc::new(RecordingClient::new()));

        assert_eq!(registry.evict_idle(Duration::from_secs(60)), 0);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.evict_idle(Duration::ZERO), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn session_user_round_trips_role_names() {
        let user = SessionUser {
            id: "abc".to_string(),
            username: "default".to_string(),
            role: Role::ReadOnly,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["role"], "Read-Only");
    }
}
