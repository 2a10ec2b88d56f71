//! LSP method-name constants used for dispatch-table routing.
//!
//! This module centralizes the method identifiers the daemon core actually
//! routes: lifecycle, text-document sync, the code-intel families the
//! dispatch engine fans plugins out over, and the `ulsp/*` server extension.
//! Constants follow the LSP 3.17 naming conventions so plugin authors can
//! match on the same strings the editor sends.

// ============================================================================
// Lifecycle
// ============================================================================

/// First request a client sends; carries `initialize_params`.
pub const INITIALIZE: &str = "initialize";
/// Sent by the client once it has processed the `initialize` response.
pub const INITIALIZED: &str = "initialized";
/// Graceful shutdown request; the daemon must not exit until `exit` follows.
pub const SHUTDOWN: &str = "shutdown";
/// Terminate the session (or, after `requestFullShutdown`, the process).
pub const EXIT: &str = "exit";

// ============================================================================
// Server extension
// ============================================================================

/// ulsp extension: arm full-process shutdown for the next `exit`.
pub const ULSP_REQUEST_FULL_SHUTDOWN: &str = "ulsp/requestFullShutdown";
/// ulsp extension: internal teardown hook fanned out to a session's plugins
/// as the Connection Host ends that session, before it is deregistered.
/// Never sent over the wire by a client.
pub const ULSP_END_SESSION: &str = "ulsp/endSession";

// ============================================================================
// Text document synchronization
// ============================================================================

/// Document opened.
pub const TEXT_DOCUMENT_DID_OPEN: &str = "textDocument/didOpen";
/// Document content changed.
pub const TEXT_DOCUMENT_DID_CHANGE: &str = "textDocument/didChange";
/// Document closed.
pub const TEXT_DOCUMENT_DID_CLOSE: &str = "textDocument/didClose";
/// Document saved.
pub const TEXT_DOCUMENT_DID_SAVE: &str = "textDocument/didSave";
/// Document about to be saved (notification).
pub const TEXT_DOCUMENT_WILL_SAVE: &str = "textDocument/willSave";
/// Document about to be saved; server may return edits to apply before save.
pub const TEXT_DOCUMENT_WILL_SAVE_WAIT_UNTIL: &str = "textDocument/willSaveWaitUntil";
/// Server-to-client: publish diagnostics for a document.
pub const TEXT_DOCUMENT_PUBLISH_DIAGNOSTICS: &str = "textDocument/publishDiagnostics";

// ============================================================================
// File operations
// ============================================================================

/// Files about to be created.
pub const WORKSPACE_WILL_CREATE_FILES: &str = "workspace/willCreateFiles";
/// Files created.
pub const WORKSPACE_DID_CREATE_FILES: &str = "workspace/didCreateFiles";
/// Files about to be renamed.
pub const WORKSPACE_WILL_RENAME_FILES: &str = "workspace/willRenameFiles";
/// Files renamed.
pub const WORKSPACE_DID_RENAME_FILES: &str = "workspace/didRenameFiles";
/// Files about to be deleted.
pub const WORKSPACE_WILL_DELETE_FILES: &str = "workspace/willDeleteFiles";
/// Files deleted.
pub const WORKSPACE_DID_DELETE_FILES: &str = "workspace/didDeleteFiles";
/// Watched-file change set.
pub const WORKSPACE_DID_CHANGE_WATCHED_FILES: &str = "workspace/didChangeWatchedFiles";

// ============================================================================
// Code intelligence (the methods the dispatch engine fans out over)
// ============================================================================

/// Code action request.
pub const TEXT_DOCUMENT_CODE_ACTION: &str = "textDocument/codeAction";
/// Code action resolve request.
pub const CODE_ACTION_RESOLVE: &str = "codeAction/resolve";
/// Code lens request.
pub const TEXT_DOCUMENT_CODE_LENS: &str = "textDocument/codeLens";
/// Code lens resolve request.
pub const CODE_LENS_RESOLVE: &str = "codeLens/resolve";
/// Server-to-client: ask the client to re-request code lenses.
pub const WORKSPACE_CODE_LENS_REFRESH: &str = "workspace/codeLens/refresh";
/// Go to declaration.
pub const TEXT_DOCUMENT_DECLARATION: &str = "textDocument/declaration";
/// Go to definition.
pub const TEXT_DOCUMENT_DEFINITION: &str = "textDocument/definition";
/// Go to type definition.
pub const TEXT_DOCUMENT_TYPE_DEFINITION: &str = "textDocument/typeDefinition";
/// Go to implementation.
pub const TEXT_DOCUMENT_IMPLEMENTATION: &str = "textDocument/implementation";
/// Find references.
pub const TEXT_DOCUMENT_REFERENCES: &str = "textDocument/references";
/// Hover information.
pub const TEXT_DOCUMENT_HOVER: &str = "textDocument/hover";
/// Document symbols.
pub const TEXT_DOCUMENT_DOCUMENT_SYMBOL: &str = "textDocument/documentSymbol";

// ============================================================================
// Workspace
// ============================================================================

/// Execute a server-defined command.
pub const WORKSPACE_EXECUTE_COMMAND: &str = "workspace/executeCommand";
/// Server-to-client: apply a workspace edit.
pub const WORKSPACE_APPLY_EDIT: &str = "workspace/applyEdit";
/// Server-to-client: fetch configuration sections.
pub const WORKSPACE_CONFIGURATION: &str = "workspace/configuration";
/// Server-to-client: fetch workspace folders.
pub const WORKSPACE_WORKSPACE_FOLDERS: &str = "workspace/workspaceFolders";
/// Workspace folders changed notification.
pub const WORKSPACE_DID_CHANGE_WORKSPACE_FOLDERS: &str = "workspace/didChangeWorkspaceFolders";
/// Configuration changed notification.
pub const WORKSPACE_DID_CHANGE_CONFIGURATION: &str = "workspace/didChangeConfiguration";

// ============================================================================
// Window
// ============================================================================

/// Server-to-client: show a transient message.
pub const WINDOW_SHOW_MESSAGE: &str = "window/showMessage";
/// Server-to-client: append to the output channel.
pub const WINDOW_LOG_MESSAGE: &str = "window/logMessage";
/// Server-to-client: show a message with action buttons, awaiting a selection.
pub const WINDOW_SHOW_MESSAGE_REQUEST: &str = "window/showMessageRequest";
/// Server-to-client: ask the editor to open/reveal a document.
pub const WINDOW_SHOW_DOCUMENT: &str = "window/showDocument";
/// Server-to-client: register a new progress token before reporting on it.
pub const WINDOW_WORK_DONE_PROGRESS_CREATE: &str = "window/workDoneProgress/create";
/// Client-to-server: cancel the operation behind a progress token.
pub const WINDOW_WORK_DONE_PROGRESS_CANCEL: &str = "window/workDoneProgress/cancel";
/// Bidirectional: progress notification for a live token.
pub const DOLLAR_PROGRESS: &str = "$/progress";
/// Server-to-client: telemetry event.
pub const TELEMETRY_EVENT: &str = "telemetry/event";
/// Server-to-client: register a dynamic capability.
pub const CLIENT_REGISTER_CAPABILITY: &str = "client/registerCapability";
/// Server-to-client: unregister a dynamic capability.
pub const CLIENT_UNREGISTER_CAPABILITY: &str = "client/unregisterCapability";

// ============================================================================
// Cancellation
// ============================================================================

/// Client-to-server: cancel an in-flight request by id.
pub const CANCEL_REQUEST: &str = "$/cancelRequest";

// ============================================================================
// Lookup
// ============================================================================

/// Every method name the Connection Host router recognizes, used to resolve
/// a runtime method string back to the `&'static str` a plugin's dispatch
/// table is keyed by (the table itself only ever stores the constants
/// above, never owned `String`s).
pub const ALL: &[&str] = &[
    INITIALIZE,
    INITIALIZED,
    SHUTDOWN,
    EXIT,
    ULSP_REQUEST_FULL_SHUTDOWN,
    TEXT_DOCUMENT_DID_OPEN,
    TEXT_DOCUMENT_DID_CHANGE,
    TEXT_DOCUMENT_DID_CLOSE,
    TEXT_DOCUMENT_DID_SAVE,
    TEXT_DOCUMENT_WILL_SAVE,
    TEXT_DOCUMENT_WILL_SAVE_WAIT_UNTIL,
    TEXT_DOCUMENT_PUBLISH_DIAGNOSTICS,
    WORKSPACE_WILL_CREATE_FILES,
    WORKSPACE_DID_CREATE_FILES,
    WORKSPACE_WILL_RENAME_FILES,
    WORKSPACE_DID_RENAME_FILES,
    WORKSPACE_WILL_DELETE_FILES,
    WORKSPACE_DID_DELETE_FILES,
    WORKSPACE_DID_CHANGE_WATCHED_FILES,
    TEXT_DOCUMENT_CODE_ACTION,
    CODE_ACTION_RESOLVE,
    TEXT_DOCUMENT_CODE_LENS,
    CODE_LENS_RESOLVE,
    WORKSPACE_CODE_LENS_REFRESH,
    TEXT_DOCUMENT_DECLARATION,
    TEXT_DOCUMENT_DEFINITION,
    TEXT_DOCUMENT_TYPE_DEFINITION,
    TEXT_DOCUMENT_IMPLEMENTATION,
    TEXT_DOCUMENT_REFERENCES,
    TEXT_DOCUMENT_HOVER,
    TEXT_DOCUMENT_DOCUMENT_SYMBOL,
    WORKSPACE_EXECUTE_COMMAND,
    WORKSPACE_APPLY_EDIT,
    WORKSPACE_CONFIGURATION,
    WORKSPACE_WORKSPACE_FOLDERS,
    WORKSPACE_DID_CHANGE_WORKSPACE_FOLDERS,
    WORKSPACE_DID_CHANGE_CONFIGURATION,
    WINDOW_SHOW_MESSAGE,
    WINDOW_LOG_MESSAGE,
    WINDOW_SHOW_MESSAGE_REQUEST,
    WINDOW_SHOW_DOCUMENT,
    WINDOW_WORK_DONE_PROGRESS_CREATE,
    WINDOW_WORK_DONE_PROGRESS_CANCEL,
    DOLLAR_PROGRESS,
    TELEMETRY_EVENT,
    CLIENT_REGISTER_CAPABILITY,
    CLIENT_UNREGISTER_CAPABILITY,
    CANCEL_REQUEST,
];

/// Resolve a runtime method name to its `&'static str` constant, if known.
pub fn static_name(method: &str) -> Option<&'static str> {
    ALL.iter().copied().find(|candidate| *candidate == method)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_methods_match_lsp_spec() {
        assert_eq!(INITIALIZE, "initialize");
        assert_eq!(INITIALIZED, "initialized");
        assert_eq!(SHUTDOWN, "shutdown");
        assert_eq!(EXIT, "exit");
    }

    #[test]
    fn extension_method_is_namespaced() {
        assert!(ULSP_REQUEST_FULL_SHUTDOWN.starts_with("ulsp/"));
    }

    #[test]
    fn text_sync_methods_match_lsp_spec() {
        assert_eq!(TEXT_DOCUMENT_DID_OPEN, "textDocument/didOpen");
        assert_eq!(TEXT_DOCUMENT_DID_CHANGE, "textDocument/didChange");
        assert_eq!(TEXT_DOCUMENT_WILL_SAVE_WAIT_UNTIL, "textDocument/willSaveWaitUntil");
    }

    #[test]
    fn progress_methods_match_lsp_spec() {
        assert_eq!(WINDOW_WORK_DONE_PROGRESS_CREATE, "window/workDoneProgress/create");
        assert_eq!(WINDOW_WORK_DONE_PROGRESS_CANCEL, "window/workDoneProgress/cancel");
    }

    #[test]
    fn static_name_resolves_known_methods_only() {
        assert_eq!(static_name("textDocument/hover"), Some(TEXT_DOCUMENT_HOVER));
        assert_eq!(static_name("textDocument/nonsense"), None);
    }
}
