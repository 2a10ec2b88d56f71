//! IDE Gateway (§4.C): per-process registry from session id to client
//! handle, mirroring the LSP client surface.

mod grace;

use std::io::Write;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use lsp_types::{
    ApplyWorkspaceEditParams, ApplyWorkspaceEditResponse, ConfigurationParams,
    MessageActionItem, MessageType, ProgressParams, ProgressParamsValue,
    PublishDiagnosticsParams, RegistrationParams, ShowDocumentParams, ShowDocumentResult,
    ShowMessageRequestParams, UnregistrationParams, WorkDoneProgress, WorkDoneProgressBegin,
    WorkDoneProgressCreateParams, WorkDoneProgressEnd, WorkDoneProgressReport, WorkspaceFolder,
};
use serde_json::Value;
use tokio::io::AsyncWrite;
use tokio::sync::oneshot;
use uuid::Uuid;

use ulsp_protocol::{methods, JsonRpcClientRequest, JsonRpcNotification};
use ulsp_transport::MessageWriter;

pub use grace::GraceHandle;

/// Outbound half of a session's connection: everything the gateway writes
/// goes through this. Boxed so the Connection Host's TCP write half and a
/// test harness's in-memory duplex stream share one concrete type.
pub type ClientHandle = MessageWriter<Box<dyn AsyncWrite + Send + Unpin>>;

/// Error raised when the gateway has no client registered for a session.
#[derive(Debug, thiserror::Error)]
#[error("no client registered for session {0}")]
pub struct ClientNotFound(pub Uuid);

/// Per-process registry from session id to client handle, plus the
/// client-bound request surface (§4.C).
#[derive(Debug, Default)]
pub struct IdeGateway {
    clients: DashMap<Uuid, ClientHandle>,
    next_request_id: AtomicI64,
}

impl IdeGateway {
    /// Build an empty gateway.
    pub fn new() -> Self {
        Self { clients: DashMap::new(), next_request_id: AtomicI64::new(1) }
    }

    /// Register a session's outbound client handle. Called from
    /// `InitSession`.
    pub fn register(&self, session_id: Uuid, client: ClientHandle) {
        self.clients.insert(session_id, client);
    }

    /// Deregister a session's client handle. Called from `EndSession`.
    pub fn deregister(&self, session_id: Uuid) {
        self.clients.remove(&session_id);
    }

    fn client(&self, session_id: Uuid) -> Result<ClientHandle, ClientNotFound> {
        self.clients
            .get(&session_id)
            .map(|entry| entry.value().clone())
            .ok_or(ClientNotFound(session_id))
    }

    fn next_id(&self) -> Value {
        Value::from(self.next_request_id.fetch_add(1, Ordering::Relaxed))
    }

    async fn notify(
        &self,
        session_id: Uuid,
        method: &str,
        params: impl serde::Serialize,
    ) -> Result<(), ClientNotFound> {
        let client = self.client(session_id)?;
        let notification =
            JsonRpcNotification::new(method, serde_json::to_value(params).unwrap_or(Value::Null));
        let _ = client.send_notification(&notification).await;
        Ok(())
    }

    async fn request(
        &self,
        session_id: Uuid,
        method: &str,
        params: impl serde::Serialize,
    ) -> Result<(), ClientNotFound> {
        let client = self.client(session_id)?;
        let request = JsonRpcClientRequest {
            jsonrpc: "2.0".to_string(),
            id: self.next_id(),
            method: method.to_string(),
            params: Some(serde_json::to_value(params).unwrap_or(Value::Null)),
        };
        let _ = client.send_client_request(&request).await;
        Ok(())
    }

    /// Send a `$/progress` notification.
    pub async fn progress(
        &self,
        session_id: Uuid,
        token: String,
        value: ProgressParamsValue,
    ) -> Result<(), ClientNotFound> {
        let params = ProgressParams { token: lsp_types::NumberOrString::String(token), value };
        self.notify(session_id, methods::DOLLAR_PROGRESS, params).await
    }

    /// Request a work-done progress token via `window/workDoneProgress/create`.
    pub async fn work_done_progress_create(
        &self,
        session_id: Uuid,
        token: String,
    ) -> Result<(), ClientNotFound> {
        let params =
            WorkDoneProgressCreateParams { token: lsp_types::NumberOrString::String(token) };
        self.request(session_id, methods::WINDOW_WORK_DONE_PROGRESS_CREATE, params).await
    }

    /// Emit a progress `begin` event.
    pub async fn progress_begin(
        &self,
        session_id: Uuid,
        token: String,
        title: String,
        message: Option<String>,
        cancellable: bool,
    ) -> Result<(), ClientNotFound> {
        self.progress(
            session_id,
            token,
            ProgressParamsValue::WorkDone(WorkDoneProgress::Begin(WorkDoneProgressBegin {
                title,
                cancellable: Some(cancellable),
                message,
                percentage: None,
            })),
        )
        .await
    }

    /// Emit a progress `report` event.
    pub async fn progress_report(
        &self,
        session_id: Uuid,
        token: String,
        message: Option<String>,
    ) -> Result<(), ClientNotFound> {
        self.progress(
            session_id,
            token,
            ProgressParamsValue::WorkDone(WorkDoneProgress::Report(WorkDoneProgressReport {
                cancellable: None,
                message,
                percentage: None,
            })),
        )
        .await
    }

    /// Emit a progress `end` event.
    pub async fn progress_end(
        &self,
        session_id: Uuid,
        token: String,
        message: Option<String>,
    ) -> Result<(), ClientNotFound> {
        self.progress(
            session_id,
            token,
            ProgressParamsValue::WorkDone(WorkDoneProgress::End(WorkDoneProgressEnd { message })),
        )
        .await
    }

    /// Send `textDocument/publishDiagnostics`.
    pub async fn publish_diagnostics(
        &self,
        session_id: Uuid,
        params: PublishDiagnosticsParams,
    ) -> Result<(), ClientNotFound> {
        self.notify(session_id, methods::TEXT_DOCUMENT_PUBLISH_DIAGNOSTICS, params).await
    }

    /// Send `window/logMessage`.
    pub async fn log_message(
        &self,
        session_id: Uuid,
        typ: MessageType,
        message: String,
    ) -> Result<(), ClientNotFound> {
        let params = lsp_types::LogMessageParams { typ, message };
        self.notify(session_id, methods::WINDOW_LOG_MESSAGE, params).await
    }

    /// Send `window/showMessage`.
    pub async fn show_message(
        &self,
        session_id: Uuid,
        typ: MessageType,
        message: String,
    ) -> Result<(), ClientNotFound> {
        let params = lsp_types::ShowMessageParams { typ, message };
        self.notify(session_id, methods::WINDOW_SHOW_MESSAGE, params).await
    }

    /// Send `telemetry/event`.
    pub async fn telemetry(
        &self,
        session_id: Uuid,
        payload: serde_json::Value,
    ) -> Result<(), ClientNotFound> {
        self.notify(session_id, methods::TELEMETRY_EVENT, payload).await
    }

    /// Send `client/registerCapability`.
    pub async fn register_capability(
        &self,
        session_id: Uuid,
        params: RegistrationParams,
    ) -> Result<(), ClientNotFound> {
        self.request(session_id, methods::CLIENT_REGISTER_CAPABILITY, params).await
    }

    /// Send `client/unregisterCapability`.
    pub async fn unregister_capability(
        &self,
        session_id: Uuid,
        params: UnregistrationParams,
    ) -> Result<(), ClientNotFound> {
        self.request(session_id, methods::CLIENT_UNREGISTER_CAPABILITY, params).await
    }

    /// Send `workspace/applyEdit`.
    ///
    /// This transport does not correlate client-bound request replies with
    /// their originating call, so the client's verdict is not observable
    /// here; callers that need it should watch subsequent document state
    /// instead. Always returns `Ok(None)`.
    pub async fn apply_edit(
        &self,
        session_id: Uuid,
        params: ApplyWorkspaceEditParams,
    ) -> Result<Option<ApplyWorkspaceEditResponse>, ClientNotFound> {
        self.request(session_id, methods::WORKSPACE_APPLY_EDIT, params).await?;
        Ok(None)
    }

    /// Send `workspace/configuration`.
    pub async fn configuration(
        &self,
        session_id: Uuid,
        params: ConfigurationParams,
    ) -> Result<(), ClientNotFound> {
        self.request(session_id, methods::WORKSPACE_CONFIGURATION, params).await
    }

    /// Send `workspace/workspaceFolders`. See [`IdeGateway::apply_edit`] for
    /// why the reply is not observable here.
    pub async fn workspace_folders(
        &self,
        session_id: Uuid,
    ) -> Result<Option<Vec<WorkspaceFolder>>, ClientNotFound> {
        self.request(session_id, methods::WORKSPACE_WORKSPACE_FOLDERS, Value::Null).await?;
        Ok(None)
    }

    /// Send `window/showDocument`.
    pub async fn show_document(
        &self,
        session_id: Uuid,
        params: ShowDocumentParams,
    ) -> Result<Option<ShowDocumentResult>, ClientNotFound> {
        self.request(session_id, methods::WINDOW_SHOW_DOCUMENT, params).await?;
        Ok(None)
    }

    /// Return a lazy byte sink that prefixes and line-splits writes into
    /// `window/logMessage` notifications.
    ///
    /// Each complete line written is flushed as one `log_message` call with
    /// `typ = Log`. Partial lines are buffered until the next `\n` or until
    /// the writer is dropped.
    pub fn get_log_message_writer(
        self: &Arc<Self>,
        session_id: Uuid,
        prefix: String,
    ) -> LogMessageWriter {
        LogMessageWriter { gateway: Arc::clone(self), session_id, prefix, buffer: Vec::new() }
    }

    /// Begin the user-selection grace period for a `showMessageRequest`
    /// whose severity is stricter than `Error` (§4.C). Returns a receiver for
    /// the eventual client reply and a done-handle the caller must drop (or
    /// explicitly finish) when the request concludes.
    pub fn show_message_request_with_grace(
        self: &Arc<Self>,
        session_id: Uuid,
        params: ShowMessageRequestParams,
    ) -> (oneshot::Receiver<Option<MessageActionItem>>, GraceHandle) {
        grace::begin(Arc::clone(self), session_id, params)
    }

    /// Send `window/showMessageRequest` directly, with no grace timers.
    /// Used for `Error`-severity requests (§4.C only applies grace timers
    /// to requests stricter than `Error`).
    pub async fn show_message_request(
        &self,
        session_id: Uuid,
        params: ShowMessageRequestParams,
    ) -> Result<(), ClientNotFound> {
        self.request(session_id, methods::WINDOW_SHOW_MESSAGE_REQUEST, params).await
    }
}

/// Writer returned by [`IdeGateway::get_log_message_writer`].
pub struct LogMessageWriter {
    gateway: Arc<IdeGateway>,
    session_id: Uuid,
    prefix: String,
    buffer: Vec<u8>,
}

impl Write for LogMessageWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            let gateway = Arc::clone(&self.gateway);
            let session_id = self.session_id;
            let message = format!("{}{}", self.prefix, text);
            tokio::spawn(async move {
                let _ = gateway.log_message(session_id, MessageType::LOG, message).await;
            });
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
