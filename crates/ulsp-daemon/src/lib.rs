//! ulsp-daemon: a long-lived local multiplexing LSP host.
//!
//! One TCP connection becomes one [`session::Session`]; every inbound LSP
//! request is routed through the [`dispatch::DispatchEngine`] to a
//! priority-ordered set of in-process plugins. See `SPEC_FULL.md` at the
//! workspace root for the full component breakdown.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod gateway;
pub mod idle;
pub mod indexer;
pub mod logging;
pub mod net;
pub mod plugin;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use config::Config;
use diagnostics::DiagnosticStore;
use dispatch::DispatchEngine;
use error::DaemonError;
use gateway::IdeGateway;
use idle::IdleSupervisor;
use indexer::{IndexSource, IndexerOrchestrator};
use plugin::{PluginHandle, PluginRegistryError};
use session::SessionRepository;

/// The process-wide component graph (§9): the two singletons (Session
/// Repository, IDE Gateway) plus the stateless engines built over them.
/// Built once in `main` and threaded into the Connection Host.
pub struct Daemon {
    /// Process-wide session directory.
    pub sessions: Arc<SessionRepository>,
    /// Process-wide outbound client registry.
    pub gateway: Arc<IdeGateway>,
    /// Plugin dispatch engine.
    pub dispatch: Arc<DispatchEngine>,
    /// Indexer single-flight registry.
    pub indexer: Arc<IndexerOrchestrator>,
    /// Diagnostics snapshot store.
    pub diagnostics: Arc<DiagnosticStore>,
    /// Idle-shutdown timer.
    pub idle: Arc<IdleSupervisor>,
    /// Resolved configuration.
    pub config: Config,
    /// Plugins available to build a session's dispatch table from.
    pub plugins: Vec<PluginHandle>,
    /// Out-of-scope indexer body, if one has been wired in.
    pub index_source: Option<Arc<dyn IndexSource>>,
}

impl Daemon {
    /// Assemble the component graph from a resolved configuration, with no
    /// plugins and no indexer wired in. Returns the shutdown receiver the
    /// caller (`main`) should await on to know when to stop the acceptor
    /// loop.
    pub fn new(config: Config) -> Result<(Self, mpsc::Receiver<()>), DaemonError> {
        Self::with_plugins(config, Vec::new(), None)
    }

    /// Assemble the component graph, validating `plugins` up front (§4.D;
    /// fatal at process start) and wiring in `index_source` if present.
    pub fn with_plugins(
        config: Config,
        plugins: Vec<PluginHandle>,
        index_source: Option<Arc<dyn IndexSource>>,
    ) -> Result<(Self, mpsc::Receiver<()>), DaemonError> {
        plugin::validate_plugins(&plugins).map_err(|e| match e {
            PluginRegistryError::PriorityForAbsentHandler { plugin, method } => {
                DaemonError::PluginValidation { plugin, reason: format!("priority declared for absent handler {method:?}") }
            }
            PluginRegistryError::EmptyName => {
                DaemonError::PluginValidation { plugin: String::new(), reason: "empty plugin name".to_string() }
            }
        })?;

        let sessions = Arc::new(SessionRepository::new());
        let gateway = Arc::new(IdeGateway::new());
        let dispatch = Arc::new(DispatchEngine::new(Arc::clone(&sessions)));
        let indexer = Arc::new(IndexerOrchestrator::new());
        let diagnostics = Arc::new(DiagnosticStore::new());

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let idle_timeout = Duration::from_secs(config.idle_timeout_minutes * 60);
        let idle = Arc::new(IdleSupervisor::new(idle_timeout, Arc::clone(&sessions), shutdown_tx));

        Ok((
            Self { sessions, gateway, dispatch, indexer, diagnostics, idle, config, plugins, index_source },
            shutdown_rx,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_assembles_the_component_graph_with_zero_sessions() {
        let (daemon, _shutdown_rx) = Daemon::new(Config::default()).unwrap();
        assert_eq!(daemon.sessions.session_count(), 0);
        assert!(daemon.plugins.is_empty());
        assert!(daemon.index_source.is_none());
    }

    #[test]
    fn invalid_plugin_fails_construction() {
        let bad: PluginHandle = plugin::test_support::RecordingPlugin::new(plugin::PluginStartupInfo {
            name: String::new(),
            methods: Vec::new(),
            priorities: std::collections::HashMap::new(),
            relevant_repos: None,
        });
        assert!(matches!(Daemon::with_plugins(Config::default(), vec![bad], None), Err(DaemonError::PluginValidation { .. })));
    }
}
