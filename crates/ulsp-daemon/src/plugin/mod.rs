//! Plugin Registry (§4.D): enumerates available plugins, filters by
//! enablement and the session's repo, and builds the per-session dispatch
//! table the Dispatch Engine reads.

mod registry;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::session::SessionContext;

pub use registry::{build_dispatch_table, validate_plugins, PluginRegistryError};

/// Where in the dispatch order a plugin's handler for a method runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Runs first in the synchronous fan-out.
    High,
    /// Runs after `High` in the synchronous fan-out.
    Regular,
    /// Runs in the supervised asynchronous fan-out; never blocks the reply.
    Async,
}

/// A plugin's self-description, gathered once at session initialize.
#[derive(Debug, Clone)]
pub struct PluginStartupInfo {
    /// The plugin's name. Must be non-empty and match [`Plugin::name`].
    pub name: String,
    /// LSP method names this plugin has a handler for.
    pub methods: Vec<&'static str>,
    /// Dispatch priority per method. Every key must also appear in
    /// `methods` (§4.D validation).
    pub priorities: HashMap<&'static str, Priority>,
    /// If set, this plugin only activates for sessions whose `monorepo` tag
    /// is in this set.
    pub relevant_repos: Option<Vec<String>>,
}

/// Boxed future returned by a plugin's asynchronous handlers. Plain
/// `Pin<Box<dyn Future>>` rather than a `futures`/`BoxFuture` alias: the
/// workspace's other async code doesn't pull in the `futures` crate either.
pub type PluginFuture = Pin<Box<dyn Future<Output = Result<Value, String>> + Send>>;

/// An in-process module that services a subset of LSP methods at a
/// declared priority (GLOSSARY). Concrete plugin bodies (diagnostics
/// publishing, symbol resolution, build-tool provisioning, ...) are outside
/// this crate's scope; this trait is the whole of the contract the core
/// depends on.
pub trait Plugin: Send + Sync {
    /// The plugin's static self-description.
    fn startup_info(&self) -> PluginStartupInfo;

    /// Invoke a synchronous handler. Errors are logged by the Dispatch
    /// Engine and isolated from the caller and from other plugins.
    fn invoke_sync(&self, ctx: &SessionContext, method: &str, params: &Value) -> Result<Value, String>;

    /// Invoke an asynchronous handler. Runs under the Dispatch Engine's
    /// async-fan-out timeout; must honor `ctx` cancellation.
    fn invoke_async(&self, ctx: SessionContext, method: String, params: Value) -> PluginFuture;
}

/// Shared handle to a plugin, as stored in a dispatch table.
pub type PluginHandle = Arc<dyn Plugin>;

/// Per-session map from LSP method name to its ordered `(sync, async)`
/// plugin lists (§3 "Plugin dispatch table").
pub type DispatchTable = HashMap<&'static str, (Vec<PluginHandle>, Vec<PluginHandle>)>;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Minimal [`Plugin`] for registry/dispatch unit tests: records every
    /// sync invocation it receives and echoes back its params.
    pub struct RecordingPlugin {
        pub info: PluginStartupInfo,
        pub calls: parking_lot::Mutex<Vec<String>>,
    }

    impl RecordingPlugin {
        pub fn new(info: PluginStartupInfo) -> Arc<Self> {
            Arc::new(Self { info, calls: parking_lot::Mutex::new(Vec::new()) })
        }
    }

    impl Plugin for RecordingPlugin {
        fn startup_info(&self) -> PluginStartupInfo {
            self.info.clone()
        }

        fn invoke_sync(&self, _ctx: &SessionContext, _method: &str, params: &Value) -> Result<Value, String> {
            self.calls.lock().push(self.info.name.clone());
            Ok(params.clone())
        }

        fn invoke_async(&self, _ctx: SessionContext, _method: String, params: Value) -> PluginFuture {
            Box::pin(async move { Ok(params) })
        }
    }
}
