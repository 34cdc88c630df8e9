use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::table::Table;

/// Validated plant metadata submitted with an upload.
#[derive(Debug, Clone, Serialize)]
pub struct PlantInfo {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub capacity_mw: f64,
    pub local_tz: String,
    pub analysis_type: Option<String>,
}

/// State retained for one upload session.
///
/// The cleaned reanalysis tables are kept for later analysis calls; the other
/// cleaned tables are consumed at upload time and not retained.
#[derive(Debug, Clone)]
pub struct Session {
    pub plant: PlantInfo,
    pub qa_report: serde_json::Value,
    pub reanalysis: BTreeMap<String, Table>,
    pub created_at: DateTime<Utc>,
}

/// Session store lifecycle: create with a fresh id, look up by id, count for
/// health reporting. Deliberately process-lifetime only; a restart evicts
/// every session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: Session) -> Result<Uuid>;
    async fn get(&self, id: Uuid) -> Result<Option<Session>>;
    async fn count(&self) -> Result<usize>;
}

/// In-memory session store guarding the shared map with a mutex.
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: Session) -> Result<Uuid> {
        let id = Uuid::new_v4();

        let mut sessions = self.sessions.lock().unwrap();
        sessions.insert(id, session);

        debug!("Created session {}", id);
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions.get(&id).cloned())
    }

    async fn count(&self) -> Result<usize> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions.len())
    }
}
