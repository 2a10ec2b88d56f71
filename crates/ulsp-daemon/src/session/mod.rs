//! Session Repository and Session Context (§4.A, §4.B): the process-wide
//! directory of live sessions, and the request-scoped carrier that threads
//! a session id through a dispatch.

mod context;
mod repository;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use crate::document::DocumentStore;
use crate::gateway::{ClientHandle, IdeGateway};
use crate::plugin::{DispatchTable, PluginHandle};

pub use context::SessionContext;
pub use repository::SessionRepository;

/// One editor↔daemon connection's state (§3 "Session").
pub struct Session {
    id: Uuid,
    client: ClientHandle,
    initialize_params: RwLock<Option<Value>>,
    workspace_root: RwLock<String>,
    monorepo: RwLock<String>,
    env: RwLock<Vec<(String, String)>>,
    ulsp_enabled: AtomicBool,
    dispatch_table: RwLock<Option<DispatchTable>>,

    /// This session's document map. Public: the dispatch router and
    /// plugin handlers address it directly once they've looked up the
    /// session.
    pub documents: DocumentStore,
}

impl Session {
    /// Build a freshly-accepted session (`InitSession`, §4.I): an empty
    /// document map, no dispatch table until `apply_initialize` runs, and
    /// plugin dispatch enabled by default.
    pub fn new(
        id: Uuid,
        client: ClientHandle,
        gateway: Arc<IdeGateway>,
        max_file_size_bytes: u64,
    ) -> Self {
        Self {
            id,
            client,
            initialize_params: RwLock::new(None),
            workspace_root: RwLock::new(String::new()),
            monorepo: RwLock::new(String::new()),
            env: RwLock::new(Vec::new()),
            ulsp_enabled: AtomicBool::new(true),
            dispatch_table: RwLock::new(None),
            documents: DocumentStore::new(id, gateway, max_file_size_bytes),
        }
    }

    /// This session's id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// This session's outbound client handle.
    pub fn client(&self) -> ClientHandle {
        self.client.clone()
    }

    /// The raw `initialize` payload, if `apply_initialize` has run.
    pub fn initialize_params(&self) -> Option<Value> {
        self.initialize_params.read().clone()
    }

    /// The session's workspace root, or `""` if undetermined.
    pub fn workspace_root(&self) -> String {
        self.workspace_root.read().clone()
    }

    /// The session's logical repo tag, or `""` if unknown.
    pub fn monorepo(&self) -> String {
        self.monorepo.read().clone()
    }

    /// The session's `KEY=VALUE` environment, in insertion order.
    pub fn env(&self) -> Vec<(String, String)> {
        self.env.read().clone()
    }

    /// Whether plugin dispatch is enabled for this session.
    pub fn ulsp_enabled(&self) -> bool {
        self.ulsp_enabled.load(Ordering::Acquire)
    }

    /// The `(sync, async)` plugin lists for `method`, if this session has a
    /// dispatch table and the method has an entry.
    pub fn dispatch_table_for(&self, method: &str) -> Option<(Vec<PluginHandle>, Vec<PluginHandle>)> {
        self.dispatch_table.read().as_ref().and_then(|table| table.get(method).cloned())
    }

    /// Record the `initialize` payload and install a freshly built
    /// dispatch table. Safe to call again on re-initialize: every field
    /// is replaced wholesale (§4.D, §3).
    #[allow(clippy::too_many_arguments)]
    pub fn apply_initialize(
        &self,
        params: Value,
        workspace_root: String,
        monorepo: String,
        env: Vec<(String, String)>,
        ulsp_enabled: bool,
        table: DispatchTable,
    ) {
        *self.initialize_params.write() = Some(params);
        *self.workspace_root.write() = workspace_root;
        *self.monorepo.write() = monorepo;
        *self.env.write() = env;
        self.ulsp_enabled.store(ulsp_enabled, Ordering::Release);
        *self.dispatch_table.write() = Some(table);
    }
}
