//! Dispatch Engine (§4.E): for a given LSP method, runs the priority-ordered
//! synchronous fan-out, then spawns a supervised asynchronous fan-out with
//! an independent timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::error::DaemonError;
use crate::plugin::PluginHandle;
use crate::session::{Session, SessionContext, SessionRepository};

/// Default bound on the async fan-out, independent of the sync caller's
/// deadline (§4.E, §5).
pub const DEFAULT_ASYNC_TIMEOUT: Duration = Duration::from_secs(3 * 60 * 60);

/// Runs dispatch-table lookups and fan-out for every inbound LSP method.
pub struct DispatchEngine {
    sessions: Arc<SessionRepository>,
    async_timeout: Duration,
}

impl DispatchEngine {
    /// Build an engine over the process's session repository, using the
    /// default async fan-out timeout.
    pub fn new(sessions: Arc<SessionRepository>) -> Self {
        Self { sessions, async_timeout: DEFAULT_ASYNC_TIMEOUT }
    }

    /// Build an engine with a non-default async fan-out timeout (tests).
    pub fn with_async_timeout(sessions: Arc<SessionRepository>, async_timeout: Duration) -> Self {
        Self { sessions, async_timeout }
    }

    /// Dispatch `method` for the session named in `ctx`.
    ///
    /// `sync_fn` invokes a plugin handle synchronously with respect to the
    /// caller; its results accumulate, in dispatch-table order, into the
    /// returned `Vec`. `async_fn` invokes a plugin handle under the
    /// supervised, independently-timed-out fan-out; its results never reach
    /// the caller. Both closures receive a context carrying only the
    /// session id, not the caller's own cancellation scope.
    ///
    /// Returns an empty `Vec` with no error if the session has `ulsp_enabled
    /// = false` (§3: disables all plugin dispatch for the session), has no
    /// dispatch table yet, or the method has no entry in it (§4.E step 2).
    pub async fn execute<R, SF, AF, AFut>(
        &self,
        ctx: &SessionContext,
        method: &'static str,
        sync_fn: SF,
        async_fn: AF,
    ) -> Result<Vec<R>, DaemonError>
    where
        R: Send + 'static,
        SF: Fn(SessionContext, PluginHandle) -> Result<R, String>,
        AF: Fn(SessionContext, PluginHandle) -> AFut + Clone + Send + 'static,
        AFut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let session_id = ctx.session_id()?;
        let session = self.sessions.get(session_id)?;

        if !session.ulsp_enabled() {
            return Ok(Vec::new());
        }

        let Some((sync_list, async_list)) = session.dispatch_table_for(method) else {
            return Ok(Vec::new());
        };

        let mut results = Vec::with_capacity(sync_list.len());
        for plugin in sync_list {
            match sync_fn(*ctx, Arc::clone(&plugin)) {
                Ok(result) => results.push(result),
                Err(reason) => {
                    tracing::error!(
                        plugin = %plugin.startup_info().name,
                        method,
                        reason,
                        "plugin sync handler failed"
                    );
                }
            }
        }

        if !async_list.is_empty() {
            let async_ctx = ctx.inherit_session_only();
            let timeout = self.async_timeout;
            tokio::spawn(async move {
                run_async_fan_out(async_ctx, method, async_list, async_fn, timeout).await;
            });
        }

        Ok(results)
    }
}

async fn run_async_fan_out<AF, AFut>(
    ctx: SessionContext,
    method: &'static str,
    plugins: Vec<PluginHandle>,
    async_fn: AF,
    timeout: Duration,
) where
    AF: Fn(SessionContext, PluginHandle) -> AFut + Clone + Send + 'static,
    AFut: Future<Output = Result<(), String>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for plugin in plugins {
        let async_fn = async_fn.clone();
        let name = plugin.startup_info().name;
        tasks.spawn(async move {
            let outcome = async_fn(ctx, plugin).await;
            (name, outcome)
        });
    }

    let fan_out = async {
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(()))) => tracing::debug!(plugin = name, method, "async handler completed"),
                Ok((name, Err(reason))) => {
                    tracing::error!(plugin = name, method, reason, "plugin async handler failed")
                }
                Err(join_error) => {
                    tracing::error!(method, error = %join_error, "plugin async handler task panicked")
                }
            }
        }
    };

    if tokio::time::timeout(timeout, fan_out).await.is_err() {
        tracing::error!(method, timeout_secs = timeout.as_secs(), "async fan-out timed out; abandoning stragglers");
        tasks.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::IdeGateway;
    use crate::plugin::test_support::RecordingPlugin;
    use crate::plugin::{PluginStartupInfo, Priority};
    use std::collections::HashMap;
    use tokio::io::duplex;
    use ulsp_transport::MessageWriter;

    fn client() -> crate::gateway::ClientHandle {
        let (_a, b) = duplex(1024);
        MessageWriter::new(Box::new(b))
    }

    #[tokio::test]
    async fn s6_sync_handlers_run_in_dispatch_table_order() {
        let sessions = Arc::new(SessionRepository::new());
        let gateway = Arc::new(IdeGateway::new());
        let session_id = uuid::Uuid::new_v4();
        let session = Arc::new(Session::new(session_id, client(), gateway, 1_000_000));

        let p1: PluginHandle = RecordingPlugin::new(PluginStartupInfo {
            name: "p1".to_string(),
            methods: vec!["textDocument/didOpen"],
            priorities: HashMap::from([("textDocument/didOpen", Priority::High)]),
            relevant_repos: None,
        });
        let p2: PluginHandle = RecordingPlugin::new(PluginStartupInfo {
            name: "p2".to_string(),
            methods: vec!["textDocument/didOpen"],
            priorities: HashMap::from([("textDocument/didOpen", Priority::Regular)]),
            relevant_repos: None,
        });

        let table = crate::plugin::build_dispatch_table(&[p1, p2], &HashMap::new(), "");
        session.apply_initialize(
            serde_json::Value::Null,
            String::new(),
            String::new(),
            Vec::new(),
            true,
            table,
        );
        sessions.set(session);

        let engine = DispatchEngine::new(sessions);
        let ctx = SessionContext::new(session_id);
        let order = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));

        let order_for_closure = Arc::clone(&order);
        let results: Vec<()> = engine
            .execute(
                &ctx,
                "textDocument/didOpen",
                move |_ctx, plugin| {
                    order_for_closure.lock().push(plugin.startup_info().name);
                    Ok(())
                },
                |_ctx, _plugin| async { Ok(()) },
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(*order.lock(), vec!["p1".to_string(), "p2".to_string()]);
    }

    #[tokio::test]
    async fn ulsp_disabled_session_skips_dispatch_entirely() {
        let sessions = Arc::new(SessionRepository::new());
        let gateway = Arc::new(IdeGateway::new());
        let session_id = uuid::Uuid::new_v4();
        let session = Arc::new(Session::new(session_id, client(), gateway, 1_000_000));

        let p1: PluginHandle = RecordingPlugin::new(PluginStartupInfo {
            name: "p1".to_string(),
            methods: vec!["textDocument/didOpen"],
            priorities: HashMap::from([("textDocument/didOpen", Priority::High)]),
            relevant_repos: None,
        });
        let table = crate::plugin::build_dispatch_table(&[p1], &HashMap::new(), "");
        session.apply_initialize(
            serde_json::Value::Null,
            String::new(),
            String::new(),
            Vec::new(),
            false,
            table,
        );
        sessions.set(session);

        let engine = DispatchEngine::new(sessions);
        let ctx = SessionContext::new(session_id);
        let results: Vec<()> = engine
            .execute(&ctx, "textDocument/didOpen", |_ctx, _plugin| Ok(()), |_ctx, _plugin| async { Ok(()) })
            .await
            .unwrap();

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn unknown_method_returns_empty_without_error() {
        let sessions = Arc::new(SessionRepository::new());
        let gateway = Arc::new(IdeGateway::new());
        let session_id = uuid::Uuid::new_v4();
        let session = Arc::new(Session::new(session_id, client(), gateway, 1_000_000));
        session.apply_initialize(
            serde_json::Value::Null,
            String::new(),
            String::new(),
            Vec::new(),
            true,
            HashMap::new(),
        );
        sessions.set(session);

        let engine = DispatchEngine::new(sessions);
        let ctx = SessionContext::new(session_id);
        let results: Vec<()> = engine
            .execute(&ctx, "textDocument/hover", |_ctx, _plugin| Ok(()), |_ctx, _plugin| async { Ok(()) })
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn no_session_in_context_fails() {
        let sessions = Arc::new(SessionRepository::new());
        let engine = DispatchEngine::new(sessions);
        let ctx = SessionContext::empty();
        let result: Result<Vec<()>, DaemonError> = engine
            .execute(&ctx, "textDocument/hover", |_ctx, _plugin| Ok(()), |_ctx, _plugin| async { Ok(()) })
            .await;
        assert!(matches!(result, Err(DaemonError::NoSessionInContext)));
    }
}
