//! Diagnostic store (§3 "Diagnostic store"): per `(session_id, document_uri)`
//! replace-only snapshot of the diagnostics currently attributed to a
//! document. Coarse mutual exclusion (one lock over the whole map) per §5:
//! writes (a plugin republishing a document's diagnostics wholesale) vastly
//! outnumber reads (introspection, teardown).

use std::collections::HashMap;

use lsp_types::Diagnostic;
use parking_lot::Mutex;
use url::Url;
use uuid::Uuid;

/// Process-wide replace-only diagnostics snapshot, keyed by session and
/// document.
#[derive(Default)]
pub struct DiagnosticStore {
    entries: Mutex<HashMap<(Uuid, Url), Vec<Diagnostic>>>,
}

impl DiagnosticStore {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the diagnostics snapshot for one document (`publishDiagnostics`).
    pub fn publish(&self, session_id: Uuid, uri: Url, diagnostics: Vec<Diagnostic>) {
        self.entries.lock().insert((session_id, uri), diagnostics);
    }

    /// The current diagnostics snapshot for one document, empty if none has
    /// ever been published.
    pub fn get(&self, session_id: Uuid, uri: &Url) -> Vec<Diagnostic> {
        self.entries.lock().get(&(session_id, uri.clone())).cloned().unwrap_or_default()
    }

    /// Drop the snapshot for one document (`textDocument/didClose`).
    pub fn clear_document(&self, session_id: Uuid, uri: &Url) {
        self.entries.lock().remove(&(session_id, uri.clone()));
    }

    /// Drop every snapshot belonging to a session (`EndSession`).
    pub fn clear_session(&self, session_id: Uuid) {
        self.entries.lock().retain(|(sid, _), _| *sid != session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Url {
        s.parse().unwrap()
    }

    #[test]
    fn publish_replaces_the_prior_snapshot() {
        let store = DiagnosticStore::new();
        let session_id = Uuid::new_v4();
        let uri = uri("file:///a.rs");
        store.publish(session_id, uri.clone(), vec![diagnostic("first")]);
        store.publish(session_id, uri.clone(), vec![diagnostic("second")]);

        let current = store.get(session_id, &uri);
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].message, "second");
    }

    #[test]
    fn clear_session_drops_only_that_sessions_entries() {
        let store = DiagnosticStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let uri = uri("file:///a.rs");
        store.publish(a, uri.clone(), vec![diagnostic("a")]);
        store.publish(b, uri.clone(), vec![diagnostic("b")]);

        store.clear_session(a);

        assert!(store.get(a, &uri).is_empty());
        assert_eq!(store.get(b, &uri).len(), 1);
    }

    #[test]
    fn clear_document_drops_one_entry() {
        let store = DiagnosticStore::new();
        let session_id = Uuid::new_v4();
        let uri = uri("file:///a.rs");
        store.publish(session_id, uri.clone(), vec![diagnostic("a")]);

        store.clear_document(session_id, &uri);

        assert!(store.get(session_id, &uri).is_empty());
    }

    fn diagnostic(message: &str) -> Diagnostic {
        Diagnostic {
            range: lsp_types::Range::new(lsp_types::Position::new(0, 0), lsp_types::Position::new(0, 0)),
            severity: None,
            code: None,
            code_description: None,
            source: None,
            message: message.to_string(),
            related_information: None,
            tags: None,
            data: None,
        }
    }
}
