use uuid::Uuid;

use crate::error::DaemonError;

/// Request-scoped carrier for the session id a dispatch is running under
/// (§4.B). Every inbound LSP dispatch attaches one before invoking
/// handlers; outbound IDE Gateway calls read it back to route replies to
/// the right peer.
#[derive(Debug, Clone, Copy)]
pub struct SessionContext {
    session_id: Option<Uuid>,
}

impl SessionContext {
    /// Build a context carrying `session_id`.
    pub fn new(session_id: Uuid) -> Self {
        Self { session_id: Some(session_id) }
    }

    /// Build a context carrying no session id, used only for requests that
    /// legitimately precede session attachment (there are none in normal
    /// operation; this exists for tests exercising the `NoSessionInContext`
    /// error path).
    pub fn empty() -> Self {
        Self { session_id: None }
    }

    /// The carried session id, or `NoSessionInContext` if none.
    pub fn session_id(&self) -> Result<Uuid, DaemonError> {
        self.session_id.ok_or(DaemonError::NoSessionInContext)
    }

    /// A fresh context inheriting only this context's session id, used when
    /// spawning the async fan-out supervisor (§4.E) so it doesn't also
    /// inherit the sync caller's cancellation scope.
    pub fn inherit_session_only(&self) -> Self {
        *self
    }
}
