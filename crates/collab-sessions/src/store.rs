//! Persistent Store (C7) — two backing tiers: an always-available embedded
//! sqlite tier, and an optional redis tier probed once at startup and
//! preferred when reachable. Namespaces and TTL mirror the `session`,
//! `memory`, and `orchestrator` keys the gateway's panel UI expects.

use std::sync::Mutex;

use redis::AsyncCommands;
use rusqlite::Connection;
use tracing::{info, warn};

use collab_core::types::SessionId;
use collab_memory::GroupMemorySnapshot;

use crate::error::Result;
use crate::types::Session;

const TTL_SECS: i64 = 24 * 3600;
const ACTIVE_SESSIONS_KEY: &str = "active_sessions";

pub struct PersistentStore {
    sqlite: Mutex<Connection>,
    redis: Option<redis::aio::MultiplexedConnection>,
}

impl PersistentStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            sqlite: Mutex::new(conn),
            redis: None,
        }
    }

    /// Probe `redis_url` once, at C6 initialization. On failure, logs a
    /// warning and the process runs on the sqlite tier alone for its
    /// lifetime — no per-call retry.
    pub async fn try_connect_redis(&mut self, redis_url: &str) {
        match redis::Client::open(redis_url) {
            Ok(client) => match client.get_multiplexed_tokio_connection().await {
                Ok(conn) => {
                    info!(redis_url, "connected to redis tier");
                    self.redis = Some(conn);
                }
                Err(error) => {
                    warn!(%error, "redis unreachable at startup, running on sqlite tier alone");
                }
            },
            Err(error) => {
                warn!(%error, "invalid redis url, running on sqlite tier alone");
            }
        }
    }

    pub async fn save_session(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_string(session)?;
        let id = session.id.to_string();
        self.put("session", &id, &json).await?;
        self.sadd_active(&id).await?;
        Ok(())
    }

    pub async fn load_session(&self, id: &SessionId) -> Result<Option<Session>> {
        match self.get("session", &id.to_string()).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn save_memory_snapshot(&self, id: &SessionId, snapshot: &GroupMemorySnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        self.put("memory", &id.to_string(), &json).await
    }

    pub async fn load_memory_snapshot(&self, id: &SessionId) -> Result<Option<GroupMemorySnapshot>> {
        match self.get("memory", &id.to_string()).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Remove all three per-session namespaces and drop the id from
    /// `active_sessions`.
    pub async fn delete_session(&self, id: &SessionId) -> Result<()> {
        let id_str = id.to_string();
        self.delete_key("session", &id_str).await?;
        self.delete_key("memory", &id_str).await?;
        self.delete_key("orchestrator", &id_str).await?;
        self.srem_active(&id_str).await?;
        Ok(())
    }

    async fn put(&self, namespace: &str, id: &str, value: &str) -> Result<()> {
        if let Some(redis) = &self.redis {
            let mut conn = redis.clone();
            let key = format!("{namespace}:{id}");
            let result: std::result::Result<(), redis::RedisError> =
                conn.set_ex(&key, value, TTL_SECS as u64).await;
            if let Err(error) = result {
                warn!(%error, namespace, id, "redis write failed, sqlite tier still authoritative");
            }
        }

        let expires_at = (chrono::Utc::now() + chrono::Duration::seconds(TTL_SECS)).to_rfc3339();
        let db = self.sqlite.lock().unwrap();
        db.execute(
            "INSERT INTO store_entries (namespace, id, value, expires_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(namespace, id) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            rusqlite::params![namespace, id, value, expires_at],
        )?;
        Ok(())
    }

    async fn get(&self, namespace: &str, id: &str) -> Result<Option<String>> {
        if let Some(redis) = &self.redis {
            let mut conn = redis.clone();
            let key = format!("{namespace}:{id}");
            if let Ok(Some(value)) = conn.get::<_, Option<String>>(&key).await {
                return Ok(Some(value));
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let db = self.sqlite.lock().unwrap();
        match db.query_row(
            "SELECT value FROM store_entries WHERE namespace = ?1 AND id = ?2 AND expires_at > ?3",
            rusqlite::params![namespace, id, now],
            |row| row.get::<_, String>(0),
        ) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_key(&self, namespace: &str, id: &str) -> Result<()> {
        if let Some(redis) = &self.redis {
            let mut conn = redis.clone();
            let key = format!("{namespace}:{id}");
            let _: std::result::Result<(), _> = conn.del::<_, ()>(&key).await;
        }
        let db = self.sqlite.lock().unwrap();
        db.execute(
            "DELETE FROM store_entries WHERE namespace = ?1 AND id = ?2",
            rusqlite::params![namespace, id],
        )?;
        Ok(())
    }

    async fn sadd_active(&self, id: &str) -> Result<()> {
        if let Some(redis) = &self.redis {
            let mut conn = redis.clone();
            let _: std::result::Result<(), _> = conn.sadd::<_, _, ()>(ACTIVE_SESSIONS_KEY, id).await;
        }
        let db = self.sqlite.lock().unwrap();
        db.execute(
            "INSERT OR IGNORE INTO active_sessions (id) VALUES (?1)",
            rusqlite::params![id],
        )?;
        Ok(())
    }

    async fn srem_active(&self, id: &str) -> Result<()> {
        if let Some(redis) = &self.redis {
            let mut conn = redis.clone();
            let _: std::result::Result<(), _> = conn.srem::<_, _, ()>(ACTIVE_SESSIONS_KEY, id).await;
        }
        let db = self.sqlite.lock().unwrap();
        db.execute("DELETE FROM active_sessions WHERE id = ?1", rusqlite::params![id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResolvedPanelist;
    use collab_agent::PersonaDescriptor;
    use collab_core::types::{PanelistId, PanelistState};

    fn store() -> PersistentStore {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        PersistentStore::new(conn)
    }

    fn sample_session() -> Session {
        Session::new(
            "plan a launch".to_string(),
            vec![ResolvedPanelist {
                id: PanelistId::new(),
                model_id: "gpt-4o".to_string(),
                persona: PersonaDescriptor::generic("gpt-4o"),
                state: PanelistState::Standby,
            }],
        )
    }

    #[tokio::test]
    async fn session_round_trips_through_sqlite_tier() {
        let store = store();
        let session = sample_session();
        store.save_session(&session).await.unwrap();

        let loaded = store.load_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.mission, session.mission);
    }

    #[tokio::test]
    async fn missing_session_reads_as_none() {
        let store = store();
        let loaded = store.load_session(&SessionId::new()).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn delete_session_clears_all_namespaces() {
        let store = store();
        let session = sample_session();
        store.save_session(&session).await.unwrap();
        store.delete_session(&session.id).await.unwrap();

        assert!(store.load_session(&session.id).await.unwrap().is_none());
    }
}
