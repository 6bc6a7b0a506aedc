use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use collab_core::config::{CollabConfig, ProvidersConfig};
use collab_core::types::{MessageKind, PanelistId, PanelistState, SessionId};
use collab_memory::GroupMemory;
use collab_orchestrator::{Participant, StreamingOrchestrator};

use crate::error::{Result, SessionError};
use crate::persona::{resolve_persona, PersonaCatalog};
use crate::store::PersistentStore;
use crate::types::{CreateSessionRequest, ResolvedPanelist, Session};

/// One session's live, in-process state: the owning C4 and C5 instances plus
/// the session shell they were constructed from.
pub struct LiveSession {
    pub session: tokio::sync::RwLock<Session>,
    pub memory: Arc<GroupMemory>,
    pub orchestrator: Arc<StreamingOrchestrator>,
}

/// Session Manager (C6): creates and destroys sessions, wires C4+C5+C1s
/// together, and bridges to C7.
pub struct SessionManager {
    live: DashMap<SessionId, Arc<LiveSession>>,
    store: PersistentStore,
    persona_catalog: PersonaCatalog,
    providers: ProvidersConfig,
    idle_timeout: Duration,
    summary_context_limit: u32,
}

impl SessionManager {
    pub async fn new(config: &CollabConfig, mut store: PersistentStore) -> Result<Self> {
        if let Some(redis_url) = &config.database.redis_url {
            store.try_connect_redis(redis_url).await;
        }
        let persona_catalog = PersonaCatalog::load(config.persona_file.as_deref())?;
        Ok(Self {
            live: DashMap::new(),
            store,
            persona_catalog,
            providers: config.providers.clone(),
            idle_timeout: Duration::from_secs(config.orchestrator.idle_timeout_secs),
            summary_context_limit: config.orchestrator.summary_context_limit,
        })
    }

    /// Validate, resolve every panelist to a persona + constructed C1, wire
    /// C4+C5, and persist the session shell. Rejects creation outright
    /// if any panelist's provider cannot be constructed — no silent drop.
    pub async fn create_session(&self, request: CreateSessionRequest) -> Result<SessionId> {
        let model_ids = self.requested_model_ids(&request)?;

        let mut resolved_panelists = Vec::with_capacity(model_ids.len());
        let mut participants = Vec::with_capacity(model_ids.len());

        for spec in &model_ids {
            let persona = resolve_persona(spec, &self.persona_catalog);
            let provider = collab_agent::build_provider(&spec.model_id, &self.providers).ok_or_else(|| {
                SessionError::PanelistConstructionFailed {
                    model_id: spec.model_id.clone(),
                    reason: "unknown model or missing provider credentials".to_string(),
                }
            })?;

            let id = PanelistId::new();
            resolved_panelists.push(ResolvedPanelist {
                id: id.clone(),
                model_id: spec.model_id.clone(),
                persona: persona.clone(),
                state: PanelistState::Standby,
            });
            participants.push(Participant {
                id,
                role: persona.role.clone(),
                provider,
            });
        }

        let session = Session::new(request.mission, resolved_panelists);
        let memory = Arc::new(GroupMemory::new(self.summarizer_backend(), self.summary_context_limit));
        let orchestrator = Arc::new(StreamingOrchestrator::new(
            memory.clone(),
            participants,
            self.idle_timeout,
        ));

        self.store.save_session(&session).await.unwrap_or_else(|error| {
            warn!(%error, "failed to persist session shell, continuing in-process only");
        });

        let id = session.id.clone();
        self.live.insert(
            id.clone(),
            Arc::new(LiveSession {
                session: tokio::sync::RwLock::new(session),
                memory,
                orchestrator,
            }),
        );
        info!(session_id = %id, "session created");
        Ok(id)
    }

    /// Checks the in-process map first; on miss, falls through to C7 and
    /// rehydrates C4 from the recovered snapshot, registering the session
    /// back into the in-process map.
    pub async fn get_session(&self, id: &SessionId) -> Result<Option<Arc<LiveSession>>> {
        if let Some(live) = self.live.get(id) {
            return Ok(Some(live.clone()));
        }

        let Some(shell) = self.store.load_session(id).await.unwrap_or_else(|error| {
            warn!(%error, "store read failed during session rehydration");
            None
        }) else {
            return Ok(None);
        };

        let memory = Arc::new(GroupMemory::new(self.summarizer_backend(), self.summary_context_limit));
        if let Ok(Some(snapshot)) = self.store.load_memory_snapshot(id).await {
            memory.restore(snapshot).await;
        }

        let mut participants = Vec::with_capacity(shell.panelists.len());
        for panelist in &shell.panelists {
            let provider = collab_agent::build_provider(&panelist.model_id, &self.providers).ok_or_else(|| {
                SessionError::PanelistConstructionFailed {
                    model_id: panelist.model_id.clone(),
                    reason: "provider no longer constructible on rehydration".to_string(),
                }
            })?;
            participants.push(Participant {
                id: panelist.id.clone(),
                role: panelist.persona.role.clone(),
                provider,
            });
        }

        let orchestrator = Arc::new(StreamingOrchestrator::new(
            memory.clone(),
            participants,
            self.idle_timeout,
        ));
        let live = Arc::new(LiveSession {
            session: tokio::sync::RwLock::new(shell),
            memory,
            orchestrator,
        });
        self.live.insert(id.clone(), live.clone());
        debug!(session_id = %id, "session rehydrated from store");
        Ok(Some(live))
    }

    /// Proxies to the owning C5's orchestration stream.
    pub async fn stream_responses(
        &self,
        id: &SessionId,
        user_input: String,
    ) -> Result<impl futures_util::Stream<Item = collab_orchestrator::OutboundChunk>> {
        let live = self
            .get_session(id)
            .await?
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        let cancel = tokio_util::sync::CancellationToken::new();
        Ok(live
            .orchestrator
            .clone()
            .orchestrate(user_input, MessageKind::Mission, cancel))
    }

    /// Sets `active=false`, releases C5, and deletes from C7.
    pub async fn end_session(&self, id: &SessionId) -> Result<()> {
        if let Some((_, live)) = self.live.remove(id) {
            let mut session = live.session.write().await;
            session.active = false;
        }
        self.store.delete_session(id).await.unwrap_or_else(|error| {
            warn!(%error, "store delete failed during session teardown");
        });
        Ok(())
    }

    /// Session shells for every currently live (in-process) session.
    pub async fn list_sessions(&self) -> Vec<Session> {
        let mut out = Vec::with_capacity(self.live.len());
        for entry in self.live.iter() {
            out.push(entry.value().session.read().await.clone());
        }
        out
    }

    /// Periodic checkpoint: persist the current C4 snapshot for a live
    /// session so a crash loses at most the interval between checkpoints.
    pub async fn checkpoint(&self, id: &SessionId) -> Result<()> {
        if let Some(live) = self.live.get(id) {
            let snapshot = live.memory.snapshot().await;
            self.store.save_memory_snapshot(id, &snapshot).await?;
        }
        Ok(())
    }

    fn requested_model_ids(&self, request: &CreateSessionRequest) -> Result<Vec<crate::types::PanelistSpec>> {
        if let Some(panelists) = &request.panelists {
            if panelists.is_empty() {
                return Err(SessionError::InvalidRequest("panelists must not be empty".to_string()));
            }
            return Ok(panelists.clone());
        }
        if let Some(models) = &request.selected_models {
            if models.is_empty() {
                return Err(SessionError::InvalidRequest("selected_models must not be empty".to_string()));
            }
            return Ok(models
                .iter()
                .map(|model_id| crate::types::PanelistSpec {
                    model_id: model_id.clone(),
                    persona_id: None,
                    custom_persona: None,
                })
                .collect());
        }
        Err(SessionError::InvalidRequest(
            "request must carry either selected_models or panelists".to_string(),
        ))
    }

    /// The summarizer's own backend is a C1 adapter instance, constructed
    /// the same way a panelist is — here, the cheapest configured
    /// OpenAI-compatible model, if any credentials are configured.
    fn summarizer_backend(&self) -> Option<Arc<dyn collab_agent::LlmProvider>> {
        collab_agent::build_provider("gpt-3.5", &self.providers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collab_core::config::CollabConfig;

    async fn manager() -> SessionManager {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        SessionManager::new(&CollabConfig::default(), PersistentStore::new(conn))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_session_rejects_empty_selected_models() {
        let manager = manager().await;
        let request = CreateSessionRequest {
            mission: "plan a launch".to_string(),
            selected_models: Some(vec![]),
            panelists: None,
        };
        assert!(manager.create_session(request).await.is_err());
    }

    #[tokio::test]
    async fn create_session_rejects_missing_both_fields() {
        let manager = manager().await;
        let request = CreateSessionRequest {
            mission: "plan a launch".to_string(),
            selected_models: None,
            panelists: None,
        };
        assert!(manager.create_session(request).await.is_err());
    }

    #[tokio::test]
    async fn create_session_rejects_unconfigured_model() {
        let manager = manager().await;
        let request = CreateSessionRequest {
            mission: "plan a launch".to_string(),
            selected_models: Some(vec!["gpt-4o".to_string()]),
            panelists: None,
        };
        // No provider credentials configured by default ⇒ construction fails.
        assert!(matches!(
            manager.create_session(request).await,
            Err(SessionError::PanelistConstructionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn get_session_returns_none_for_unknown_id() {
        let manager = manager().await;
        assert!(manager.get_session(&SessionId::new()).await.unwrap().is_none());
    }
}
