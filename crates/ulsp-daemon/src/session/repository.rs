use std::sync::Arc;

use dashmap::DashMap;
use url::Url;
use uuid::Uuid;

use super::{Session, SessionContext};
use crate::error::DaemonError;

/// Process-wide directory of live sessions (§4.A), keyed by session id.
/// Owned once by the process root and threaded into the Connection Host
/// and Dispatch Engine as a plain `Arc` (§9).
#[derive(Default)]
pub struct SessionRepository {
    sessions: DashMap<Uuid, Arc<Session>>,
}

impl SessionRepository {
    /// Build an empty repository.
    pub fn new() -> Self {
        Self { sessions: DashMap::new() }
    }

    /// Register a session, keyed by its id.
    pub fn set(&self, session: Arc<Session>) {
        self.sessions.insert(session.id(), session);
    }

    /// Look up a session by id.
    pub fn get(&self, id: Uuid) -> Result<Arc<Session>, DaemonError> {
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value())).ok_or(DaemonError::SessionNotFound(id))
    }

    /// Look up a session via a request-scoped context.
    pub fn get_from_context(&self, ctx: &SessionContext) -> Result<Arc<Session>, DaemonError> {
        let id = ctx.session_id()?;
        self.get(id)
    }

    /// Every live session rooted at `root`. O(session count), per §4.A.
    pub fn get_all_from_workspace_root(&self, root: &str) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().workspace_root() == root)
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Remove a session, returning it if it was present.
    pub fn delete(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.remove(&id).map(|(_, session)| session)
    }

    /// The number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Clear `base` and the cached position mapper for `uri` on every
    /// session rooted at `workspace_root` (`reset_base`, §4.F).
    pub fn reset_base(&self, workspace_root: &str, uri: &Url) {
        for session in self.get_all_from_workspace_root(workspace_root) {
            session.documents.clear_base(uri);
        }
    }
}
