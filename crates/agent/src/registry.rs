//! Session identity and lifetime. The registry owns no draft logic; it maps
//! session ids to agent handles and guarantees single creation under
//! concurrent first access.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use ticketry_core::SessionId;

use crate::booking::BookingAgent;

pub type AgentFactory = Arc<dyn Fn() -> BookingAgent + Send + Sync>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("illegal registry state: {0}")]
    IllegalState(String),
}

/// Wraps the per-session agent in an async mutex so turns for one session
/// serialize while different sessions proceed in parallel.
pub struct SessionHandle {
    agent: AsyncMutex<BookingAgent>,
}

impl SessionHandle {
    fn new(agent: BookingAgent) -> Self {
        Self { agent: AsyncMutex::new(agent) }
    }

    pub async fn lock(&self) -> MutexGuard<'_, BookingAgent> {
        self.agent.lock().await
    }
}

pub struct SessionRegistry {
    factory: Mutex<Option<AgentFactory>>,
    sessions: Mutex<HashMap<SessionId, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    /// An unconfigured registry; `get_or_create` fails with `IllegalState`
    /// until a factory is installed.
    pub fn new() -> Self {
        Self { factory: Mutex::new(None), sessions: Mutex::new(HashMap::new()) }
    }

    pub fn with_factory(factory: AgentFactory) -> Self {
        Self { factory: Mutex::new(Some(factory)), sessions: Mutex::new(HashMap::new()) }
    }

    pub fn set_factory(&self, factory: AgentFactory) {
        if let Ok(mut slot) = self.factory.lock() {
            *slot = Some(factory);
        }
    }

    pub fn get(&self, session_id: &SessionId) -> Result<Arc<SessionHandle>, RegistryError> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| RegistryError::IllegalState("session map lock poisoned".into()))?;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| RegistryError::SessionNotFound(session_id.0.clone()))
    }

    /// Idempotent under concurrent first access: exactly one agent is
    /// created per unseen id and shared by all callers.
    pub fn get_or_create(
        &self,
        session_id: &SessionId,
    ) -> Result<Arc<SessionHandle>, RegistryError> {
        let factory = self
            .factory
            .lock()
            .map_err(|_| RegistryError::IllegalState("factory lock poisoned".into()))?
            .clone()
            .ok_or_else(|| {
                RegistryError::IllegalState("no agent factory configured".to_string())
            })?;

        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| RegistryError::IllegalState("session map lock poisoned".into()))?;
        let handle = sessions
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(SessionHandle::new(factory())));
        Ok(handle.clone())
    }

    pub fn remove(&self, session_id: &SessionId) -> bool {
        self.sessions
            .lock()
            .map(|mut sessions| sessions.remove(session_id).is_some())
            .unwrap_or(false)
    }

    pub fn clear_all(&self) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.clear();
        }
    }

    pub fn count(&self) -> usize {
        self.sessions.lock().map(|sessions| sessions.len()).unwrap_or(0)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
