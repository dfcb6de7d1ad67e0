use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL_SECS};
use crate::view::{View, ViewController};

struct Session {
    controller: ViewController,
    last_seen: Instant,
}

impl Session {
    fn new(controller: ViewController) -> Self {
        Self {
            controller,
            last_seen: Instant::now(),
        }
    }

    fn touch(&mut self) -> &mut ViewController {
        self.last_seen = Instant::now();
        &mut self.controller
    }

    fn is_loading(&self) -> bool {
        matches!(self.controller.view(), View::Loading)
    }
}

/// In-memory view controllers, one per visitor.
///
/// Sessions idle for longer than the TTL are swept, and the store never holds
/// more than `capacity` of them: creating one past the limit evicts the least
/// recently used.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
    ttl: Duration,
    capacity: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(
            Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            DEFAULT_MAX_SESSIONS,
        )
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn create(&self) -> (Uuid, ViewController) {
        let id = Uuid::new_v4();
        let controller = ViewController::new();

        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.capacity {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, session)| session.last_seen)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                tracing::warn!("Session limit {} reached, evicted {}", self.capacity, oldest);
            }
        }
        sessions.insert(id, Session::new(controller.clone()));
        (id, controller)
    }

    /// Snapshot of a session's controller. Counts as activity.
    pub async fn get(&self, id: Uuid) -> Option<ViewController> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(&id).map(|session| session.touch().clone())
    }

    /// Runs `f` against the session under the write lock and returns a
    /// snapshot of the controller afterwards. `None` if the session is unknown.
    pub async fn update<T, E>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut ViewController) -> Result<T, E>,
    ) -> Option<Result<(T, ViewController), E>> {
        let mut sessions = self.sessions.write().await;
        let controller = sessions.get_mut(&id)?.touch();
        Some(f(controller).map(|value| (value, controller.clone())))
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    /// Drops sessions idle for longer than the TTL. Sessions waiting on a
    /// generation are kept. Returns how many were removed.
    pub async fn expire_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|id, session| {
            let keep = session.is_loading() || session.last_seen.elapsed() <= self.ttl;
            if !keep {
                tracing::debug!("Expiring idle session {}", id);
            }
            keep
        });

        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!(
                "Expired {} idle sessions, {} remaining",
                removed,
                sessions.len()
            );
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Sweeps idle sessions on a fixed period until the runtime shuts down.
pub fn spawn_sweeper(store: Arc<SessionStore>, period: Duration) {
    let period = period.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            store.expire_idle().await;
        }
    });
}
