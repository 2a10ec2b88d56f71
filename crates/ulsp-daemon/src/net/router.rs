//! JSON-RPC method router: the match over every method name the Connection
//! Host recognizes (§6), translating wire requests into Session/Document
//! Store/Dispatch Engine/Indexer Orchestrator calls and back into replies.

use std::sync::Arc;

use serde_json::Value;
use ulsp_protocol::{codes, methods, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use uuid::Uuid;

use crate::plugin;
use crate::session::{Session, SessionContext};
use crate::Daemon;

/// The result of routing one inbound message: an optional reply to send
/// back, and whether the connection should close after it.
pub(crate) struct RouterOutcome {
    pub(crate) response: Option<JsonRpcResponse>,
    pub(crate) close: bool,
}

impl RouterOutcome {
    fn reply(id: Option<Value>, result: Value) -> Self {
        Self { response: Some(JsonRpcResponse::success(id, result)), close: false }
    }

    fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self { response: Some(JsonRpcResponse::error(id, error)), close: false }
    }

    fn notification() -> Self {
        Self { response: None, close: false }
    }
}

/// Route one inbound request or notification.
pub(crate) async fn handle(
    daemon: &Arc<Daemon>,
    session: &Arc<Session>,
    ctx: SessionContext,
    request: JsonRpcRequest,
) -> RouterOutcome {
    let id = request.id.clone();
    let params = request.params.unwrap_or(Value::Null);

    match request.method.as_str() {
        methods::INITIALIZE => handle_initialize(daemon, session, id, params),
        methods::INITIALIZED => RouterOutcome::notification(),
        methods::SHUTDOWN => RouterOutcome::reply(id, Value::Null),
        methods::EXIT => handle_exit(daemon),
        methods::ULSP_REQUEST_FULL_SHUTDOWN => {
            daemon.idle.request_full_shutdown();
            RouterOutcome::reply(id, Value::Null)
        }
        methods::CANCEL_REQUEST => RouterOutcome::notification(),
        methods::WINDOW_WORK_DONE_PROGRESS_CANCEL => {
            handle_progress_cancel(daemon, params);
            RouterOutcome::notification()
        }
        methods::TEXT_DOCUMENT_DID_OPEN => handle_did_open(daemon, session, ctx, params).await,
        methods::TEXT_DOCUMENT_DID_CHANGE => handle_did_change(daemon, session, ctx, params).await,
        methods::TEXT_DOCUMENT_DID_CLOSE => handle_did_close(daemon, session, ctx, params).await,
        methods::TEXT_DOCUMENT_DID_SAVE => handle_did_save(daemon, session, ctx, params).await,
        methods::TEXT_DOCUMENT_WILL_SAVE => {
            dispatch_method(daemon, ctx, methods::TEXT_DOCUMENT_WILL_SAVE, params).await;
            RouterOutcome::notification()
        }
        methods::TEXT_DOCUMENT_WILL_SAVE_WAIT_UNTIL => handle_will_save_wait_until(session, id, params),
        other => handle_generic(daemon, ctx, other, id, params).await,
    }
}

fn handle_exit(daemon: &Arc<Daemon>) -> RouterOutcome {
    if daemon.idle.is_full_shutdown_requested() {
        daemon.idle.fire_now();
    }
    RouterOutcome { response: None, close: true }
}

fn handle_progress_cancel(daemon: &Arc<Daemon>, params: Value) {
    let Ok(typed) = serde_json::from_value::<lsp_types::WorkDoneProgressCancelParams>(params) else {
        return;
    };
    let token = match typed.token {
        lsp_types::NumberOrString::String(s) => s,
        lsp_types::NumberOrString::Number(n) => n.to_string(),
    };
    daemon.indexer.work_done_progress_cancel(&token);
}

fn handle_initialize(daemon: &Arc<Daemon>, session: &Arc<Session>, id: Option<Value>, params: Value) -> RouterOutcome {
    let init_options = params.get("initializationOptions").cloned().unwrap_or(Value::Null);

    // The core only reads whatever the editor's extension populated in
    // `initializationOptions`; computing a repo's workspace root or
    // monorepo tag is an out-of-scope collaborator's job (§9).
    let workspace_root = params
        .get("rootUri")
        .and_then(Value::as_str)
        .and_then(|s| url::Url::parse(s).ok())
        .and_then(|u| u.to_file_path().ok())
        .map(|p| p.to_string_lossy().into_owned())
        .or_else(|| init_options.get("workspaceRoot").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default();
    let monorepo = init_options.get("monorepo").and_then(Value::as_str).unwrap_or_default().to_string();
    let env = init_options
        .get("env")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|kv| kv.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default();
    let ulsp_enabled = init_options.get("ulspEnabled").and_then(Value::as_bool).unwrap_or(true);

    let table = plugin::build_dispatch_table(&daemon.plugins, &daemon.config.ulsp_plugins, &monorepo);
    session.apply_initialize(params, workspace_root, monorepo, env, ulsp_enabled, table);

    let result = serde_json::json!({
        "capabilities": initialize_capabilities(),
        "serverInfo": { "name": "ulsp-daemon", "version": env!("CARGO_PKG_VERSION") },
    });
    RouterOutcome::reply(id, result)
}

fn initialize_capabilities() -> lsp_types::ServerCapabilities {
    use lsp_types::*;
    ServerCapabilities {
        position_encoding: Some(PositionEncodingKind::UTF16),
        text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::INCREMENTAL)),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        declaration_provider: Some(DeclarationCapability::Simple(true)),
        definition_provider: Some(OneOf::Left(true)),
        type_definition_provider: Some(TypeDefinitionProviderCapability::Simple(true)),
        implementation_provider: Some(ImplementationProviderCapability::Simple(true)),
        references_provider: Some(OneOf::Left(true)),
        document_symbol_provider: Some(OneOf::Left(true)),
        code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
        code_lens_provider: Some(CodeLensOptions { resolve_provider: Some(true) }),
        execute_command_provider: Some(ExecuteCommandOptions {
            commands: Vec::new(),
            work_done_progress_options: WorkDoneProgressOptions::default(),
        }),
        workspace: Some(WorkspaceServerCapabilities {
            workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                supported: Some(true),
                change_notifications: Some(OneOf::Left(true)),
            }),
            file_operations: None,
        }),
        ..Default::default()
    }
}

async fn handle_did_open(daemon: &Arc<Daemon>, session: &Arc<Session>, ctx: SessionContext, params: Value) -> RouterOutcome {
    match serde_json::from_value::<lsp_types::DidOpenTextDocumentParams>(params.clone()) {
        Ok(typed) => {
            let item = typed.text_document.clone();
            session.documents.did_open(typed.text_document);
            trigger_sync_index(daemon, session.id(), ctx, item);
        }
        Err(e) => tracing::warn!(error = %e, "malformed didOpen params"),
    }
    dispatch_method(daemon, ctx, methods::TEXT_DOCUMENT_DID_OPEN, params).await;
    RouterOutcome::notification()
}

async fn handle_did_change(daemon: &Arc<Daemon>, session: &Arc<Session>, ctx: SessionContext, params: Value) -> RouterOutcome {
    match serde_json::from_value::<lsp_types::DidChangeTextDocumentParams>(params.clone()) {
        Ok(typed) => {
            if let Err(e) = session.documents.did_change(typed).await {
                tracing::warn!(error = %e, "didChange failed");
            }
        }
        Err(e) => tracing::warn!(error = %e, "malformed didChange params"),
    }
    dispatch_method(daemon, ctx, methods::TEXT_DOCUMENT_DID_CHANGE, params).await;
    RouterOutcome::notification()
}

async fn handle_did_close(daemon: &Arc<Daemon>, session: &Arc<Session>, ctx: SessionContext, params: Value) -> RouterOutcome {
    if let Ok(typed) = serde_json::from_value::<lsp_types::DidCloseTextDocumentParams>(params.clone()) {
        let uri = typed.text_document.uri.clone();
        if let Err(e) = session.documents.did_close(typed).await {
            tracing::warn!(error = %e, "didClose failed");
        }
        daemon.diagnostics.clear_document(session.id(), &uri);
    }
    dispatch_method(daemon, ctx, methods::TEXT_DOCUMENT_DID_CLOSE, params).await;
    RouterOutcome::notification()
}

async fn handle_did_save(daemon: &Arc<Daemon>, session: &Arc<Session>, ctx: SessionContext, params: Value) -> RouterOutcome {
    match serde_json::from_value::<lsp_types::DidSaveTextDocumentParams>(params.clone()) {
        Ok(typed) => {
            let uri = typed.text_document.uri.clone();
            match session.documents.did_save(typed) {
                Ok(()) => {
                    if let Ok(doc) = session.documents.get_text_document(&uri) {
                        trigger_sync_index(daemon, session.id(), ctx, doc);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "didSave failed"),
            }
        }
        Err(e) => tracing::warn!(error = %e, "malformed didSave params"),
    }
    dispatch_method(daemon, ctx, methods::TEXT_DOCUMENT_DID_SAVE, params).await;
    RouterOutcome::notification()
}

fn handle_will_save_wait_until(session: &Arc<Session>, id: Option<Value>, params: Value) -> RouterOutcome {
    match serde_json::from_value::<lsp_types::WillSaveTextDocumentParams>(params) {
        Ok(typed) => match session.documents.will_save_wait_until(&typed.text_document) {
            Ok(edits) => RouterOutcome::reply(id, serde_json::to_value(edits).unwrap_or(Value::Array(Vec::new()))),
            Err(e) => RouterOutcome::error(id, JsonRpcError::new(codes::INTERNAL_ERROR, e.to_string())),
        },
        Err(e) => RouterOutcome::error(id, JsonRpcError::new(codes::INVALID_PARAMS, e.to_string())),
    }
}

/// Spawn a `sync_index` pass in the background so the caller (`didOpen` /
/// `didSave`) returns without waiting on indexing.
fn trigger_sync_index(daemon: &Arc<Daemon>, session_id: Uuid, ctx: SessionContext, doc: lsp_types::TextDocumentItem) {
    let Some(source) = daemon.index_source.clone() else { return };
    let indexer = Arc::clone(&daemon.indexer);
    let gateway = Arc::clone(&daemon.gateway);
    tokio::spawn(async move {
        indexer.sync_index(&gateway, session_id, source, ctx, doc).await;
    });
}

/// Every other method: fan out to plugins via the Dispatch Engine and, for
/// requests, merge sync results into a reply.
async fn handle_generic(daemon: &Arc<Daemon>, ctx: SessionContext, method: &str, id: Option<Value>, params: Value) -> RouterOutcome {
    let Some(static_method) = methods::static_name(method) else {
        return if id.is_some() {
            RouterOutcome::error(id, JsonRpcError::new(codes::METHOD_NOT_FOUND, format!("method not found: {method}")))
        } else {
            RouterOutcome::notification()
        };
    };

    let results = dispatch_method(daemon, ctx, static_method, params).await;
    match id {
        Some(id) => RouterOutcome::reply(Some(id), merge_results(static_method, results)),
        None => RouterOutcome::notification(),
    }
}

pub(crate) async fn dispatch_method(daemon: &Arc<Daemon>, ctx: SessionContext, method: &'static str, params: Value) -> Vec<Value> {
    let sync_params = params.clone();
    match daemon
        .dispatch
        .execute(
            &ctx,
            method,
            move |ctx, plugin| plugin.invoke_sync(&ctx, method, &sync_params),
            move |ctx, plugin| {
                let params = params.clone();
                async move { plugin.invoke_async(ctx, method.to_string(), params).await.map(|_| ()) }
            },
        )
        .await
    {
        Ok(results) => results,
        Err(e) => {
            tracing::error!(method, error = %e, "dispatch failed");
            Vec::new()
        }
    }
}

/// Combine every plugin's sync result into one reply (§1 "combined
/// response"). List-shaped methods flatten arrays together; everything
/// else takes the first non-null result. Precise per-method merge
/// semantics belong to the plugins themselves, which are out of this
/// crate's scope; this is a reasonable default at the core layer.
fn merge_results(method: &'static str, results: Vec<Value>) -> Value {
    const LIST_METHODS: &[&str] = &[
        methods::TEXT_DOCUMENT_REFERENCES,
        methods::TEXT_DOCUMENT_DOCUMENT_SYMBOL,
        methods::TEXT_DOCUMENT_CODE_ACTION,
        methods::TEXT_DOCUMENT_CODE_LENS,
    ];

    let non_null: Vec<Value> = results.into_iter().filter(|v| !v.is_null()).collect();

    if LIST_METHODS.contains(&method) {
        let mut flattened = Vec::new();
        for value in non_null {
            match value {
                Value::Array(items) => flattened.extend(items),
                other => flattened.push(other),
            }
        }
        return Value::Array(flattened);
    }

    non_null.into_iter().next().unwrap_or(Value::Null)
}
