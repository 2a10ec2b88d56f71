//! Document Store (§4.F): per-session map of open documents, each carrying
//! current text, version, pending edits, an optional *base* snapshot, and
//! at most one active progress token.

use std::collections::HashMap;
use std::sync::Arc;

use lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidSaveTextDocumentParams,
    TextDocumentContentChangeEvent, TextDocumentIdentifier, TextDocumentItem, TextEdit,
    VersionedTextDocumentIdentifier,
};
use parking_lot::RwLock;
use ulsp_position::{LineIndex, PositionMapper};
use url::Url;
use uuid::Uuid;

use crate::error::DaemonError;
use crate::gateway::IdeGateway;

/// One open document's store-owned state (§3 "Document entry").
struct DocumentEntry {
    item: TextDocumentItem,
    edits: Vec<TextEdit>,
    edited_since_last_save: bool,
    progress_token: Option<String>,
    base: Option<TextDocumentItem>,
    position_mapper: Option<PositionMapper>,
}

/// Where a document's in-memory text stands relative to its on-disk bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    /// No entry for the document.
    Closed,
    /// Open and matching either the last save or, if never edited, the
    /// disk contents.
    OpenClean,
    /// Open with in-memory edits that diverge from the on-disk bytes.
    OpenDirty,
}

/// Per-session map of open documents. Holds a capability reference to the
/// IDE Gateway so progress notifications can be emitted as a side effect
/// of store mutations; the gateway never holds a reference back (§9).
pub struct DocumentStore {
    session_id: Uuid,
    gateway: Arc<IdeGateway>,
    max_file_size_bytes: u64,
    documents: RwLock<HashMap<Url, DocumentEntry>>,
}

impl DocumentStore {
    /// Allocate an empty document map for a session (`initialize()`, §4.F).
    pub fn new(session_id: Uuid, gateway: Arc<IdeGateway>, max_file_size_bytes: u64) -> Self {
        Self { session_id, gateway, max_file_size_bytes, documents: RwLock::new(HashMap::new()) }
    }

    /// Insert a freshly opened document. Refuses (logs, no entry) text
    /// over `max_file_size_bytes`.
    pub fn did_open(&self, item: TextDocumentItem) {
        if item.text.len() as u64 > self.max_file_size_bytes {
            tracing::warn!(
                uri = %item.uri,
                size = item.text.len(),
                limit = self.max_file_size_bytes,
                "refusing to open document over the configured size limit"
            );
            return;
        }
        let uri = item.uri.clone();
        self.documents.write().insert(
            uri,
            DocumentEntry {
                item,
                edits: Vec::new(),
                edited_since_last_save: false,
                progress_token: None,
                base: None,
                position_mapper: None,
            },
        );
    }

    /// Apply incremental or full-text changes. Bumps `version`, marks the
    /// document dirty, and promotes a `base` snapshot if this is the first
    /// edit since the prior base (or since open). Emits `progress_end` for
    /// any outstanding progress token, since the edit it was tracking is
    /// now folded into the new version.
    pub async fn did_change(&self, params: DidChangeTextDocumentParams) -> Result<(), DaemonError> {
        let uri = params.text_document.uri.clone();
        let new_version = params.text_document.version;

        let outstanding_token = {
            let mut documents = self.documents.write();
            let entry = documents
                .get_mut(&uri)
                .ok_or_else(|| DaemonError::DocumentNotFound(uri.clone()))?;

            let mut text = entry.item.text.clone();
            for change in &params.content_changes {
                text = apply_content_change(&text, change)?;
            }
            if text.len() as u64 > self.max_file_size_bytes {
                return Err(DaemonError::DocumentSizeLimit {
                    uri,
                    size: text.len(),
                    limit: self.max_file_size_bytes as usize,
                });
            }

            if entry.base.is_none() {
                entry.base = Some(entry.item.clone());
            }
            entry.item.text = text;
            entry.item.version = new_version;
            entry.edited_since_last_save = true;
            entry.position_mapper = None;
            entry.progress_token.take()
        };

        if let Some(token) = outstanding_token {
            let _ = self.gateway.progress_end(self.session_id, token, None).await;
        }
        Ok(())
    }

    /// Reconcile on-save: overwrite `document.text` with the save-time
    /// text (if the client sent one), clear pending edits. `base` is
    /// preserved.
    pub fn did_save(&self, params: DidSaveTextDocumentParams) -> Result<(), DaemonError> {
        let uri = params.text_document.uri.clone();
        let mut documents = self.documents.write();
        let entry =
            documents.get_mut(&uri).ok_or_else(|| DaemonError::DocumentNotFound(uri))?;
        if let Some(text) = params.text {
            entry.item.text = text;
        }
        entry.edits.clear();
        entry.edited_since_last_save = false;
        Ok(())
    }

    /// Delete the entry. Emits `progress_end` if it held a token.
    pub async fn did_close(&self, params: DidCloseTextDocumentParams) -> Result<(), DaemonError> {
        let removed = self.documents.write().remove(&params.text_document.uri);
        if let Some(entry) = removed {
            if let Some(token) = entry.progress_token {
                let _ = self.gateway.progress_end(self.session_id, token, None).await;
            }
        }
        Ok(())
    }

    /// Return the accumulated pending edits, verbatim and in insertion
    /// order.
    pub fn will_save_wait_until(
        &self,
        id: &TextDocumentIdentifier,
    ) -> Result<Vec<TextEdit>, DaemonError> {
        let documents = self.documents.read();
        let entry = documents
            .get(&id.uri)
            .ok_or_else(|| DaemonError::DocumentNotFound(id.uri.clone()))?;
        Ok(entry.edits.clone())
    }

    /// Return the current document.
    pub fn get_text_document(&self, uri: &Url) -> Result<TextDocumentItem, DaemonError> {
        self.documents
            .read()
            .get(uri)
            .map(|entry| entry.item.clone())
            .ok_or_else(|| DaemonError::DocumentNotFound(uri.clone()))
    }

    /// Classify a document as `Closed`, `OpenClean` or `OpenDirty` (§4.F).
    /// A dirty in-memory flag still checks the on-disk bytes before
    /// reporting `OpenDirty`, since a save may have landed the same text
    /// the editor already holds.
    pub async fn get_document_state(&self, uri: &Url) -> Result<DocumentState, DaemonError> {
        let snapshot = {
            let documents = self.documents.read();
            documents.get(uri).map(|entry| (entry.edited_since_last_save, entry.item.text.clone()))
        };
        let Some((dirty, text)) = snapshot else {
            return Ok(DocumentState::Closed);
        };
        if !dirty {
            return Ok(DocumentState::OpenClean);
        }

        let path = uri.to_file_path().map_err(|_| DaemonError::DocumentNotFound(uri.clone()))?;
        let on_disk = tokio::fs::read(&path).await?;
        if on_disk == text.as_bytes() {
            Ok(DocumentState::OpenClean)
        } else {
            Ok(DocumentState::OpenDirty)
        }
    }

    /// Append edits for the version they were authored against. A no-op
    /// (`Ok(false)`) if `edits` is empty. Allocates a progress token (and
    /// announces it to the editor) on the first pending edit since the
    /// last token was cleared.
    pub async fn add_pending_edits(
        &self,
        item: &VersionedTextDocumentIdentifier,
        edits: Vec<TextEdit>,
    ) -> Result<bool, DaemonError> {
        if edits.is_empty() {
            return Ok(false);
        }

        let new_token = {
            let mut documents = self.documents.write();
            let entry = documents
                .get_mut(&item.uri)
                .ok_or_else(|| DaemonError::DocumentNotFound(item.uri.clone()))?;

            if entry.item.version != item.version {
                return Err(DaemonError::DocumentOutdated {
                    uri: item.uri.clone(),
                    authored: item.version,
                    current: entry.item.version,
                });
            }

            entry.edits.extend(edits);
            if entry.progress_token.is_some() {
                None
            } else {
                let token = Uuid::new_v4().to_string();
                entry.progress_token = Some(token.clone());
                Some(token)
            }
        };

        if let Some(token) = new_token {
            let basename = item
                .uri
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .unwrap_or_else(|| item.uri.as_str())
                .to_string();
            self.gateway
                .work_done_progress_create(self.session_id, token.clone())
                .await
                .map_err(|e| DaemonError::ClientNotFound(e.0))?;
            self.gateway
                .progress_begin(
                    self.session_id,
                    token,
                    format!("Auto-Fixes for \"{basename}\""),
                    Some("Save to apply available fixes.".to_string()),
                    false,
                )
                .await
                .map_err(|e| DaemonError::ClientNotFound(e.0))?;
        }
        Ok(true)
    }

    /// Return the lazily-built `base ⇄ current` mapper for a document, or
    /// `None` for an unknown URI (treated by callers as "no mapping
    /// available", not an error — §9 open question).
    pub fn get_position_mapper(&self, uri: &Url) -> Option<PositionMapper> {
        let mut documents = self.documents.write();
        let entry = documents.get_mut(uri)?;
        if let Some(mapper) = &entry.position_mapper {
            return Some(mapper.clone());
        }
        let base_text = entry.base.as_ref().map_or(entry.item.text.as_str(), |b| b.text.as_str());
        let mapper = PositionMapper::new(base_text, &entry.item.text);
        entry.position_mapper = Some(mapper.clone());
        Some(mapper)
    }

    /// Clear `base` and the cached position mapper for one document
    /// (`reset_base`, §4.F). Returns whether there was a base to clear.
    pub(crate) fn clear_base(&self, uri: &Url) -> bool {
        let mut documents = self.documents.write();
        let Some(entry) = documents.get_mut(uri) else {
            return false;
        };
        let had_base = entry.base.is_some();
        entry.base = None;
        entry.position_mapper = None;
        had_base
    }
}

/// Apply one content-change event to `text`, returning the new text.
/// `range: None` is a full-document replacement; `Some(range)` splices
/// `change.text` into the UTF-16 range via [`LineIndex`].
fn apply_content_change(
    text: &str,
    change: &TextDocumentContentChangeEvent,
) -> Result<String, DaemonError> {
    let Some(range) = change.range else {
        return Ok(change.text.clone());
    };
    let index = LineIndex::new(text);
    let start = index.position_to_offset(text, range.start.into())?;
    let end = index.position_to_offset(text, range.end.into())?;
    let mut out = String::with_capacity(text.len() - (end - start) + change.text.len());
    out.push_str(&text[..start]);
    out.push_str(&change.text);
    out.push_str(&text[end..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::{Position, Range};

    fn store() -> DocumentStore {
        DocumentStore::new(Uuid::new_v4(), Arc::new(IdeGateway::new()), 1_000_000)
    }

    fn item(uri: &Url, version: i32, text: &str) -> TextDocumentItem {
        TextDocumentItem {
            uri: uri.clone(),
            language_id: "rust".to_string(),
            version,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn s1_open_then_change_bumps_version_and_promotes_base() {
        let store = store();
        let uri: Url = "file:///a.rs".parse().unwrap();
        store.did_open(item(&uri, 1, "hello"));

        store
            .did_change(DidChangeTextDocumentParams {
                text_document: VersionedTextDocumentIdentifier { uri: uri.clone(), version: 2 },
                content_changes: vec![TextDocumentContentChangeEvent {
                    range: Some(Range::new(Position::new(0, 5), Position::new(0, 5))),
                    range_length: None,
                    text: "!".to_string(),
                }],
            })
            .await
            .unwrap();

        let doc = store.get_text_document(&uri).unwrap();
        assert_eq!(doc.text, "hello!");
        assert_eq!(doc.version, 2);
    }

    #[tokio::test]
    async fn s2_stale_pending_edits_are_rejected() {
        let store = store();
        let uri: Url = "file:///a.rs".parse().unwrap();
        store.did_open(item(&uri, 1, "hello"));
        store
            .did_change(DidChangeTextDocumentParams {
                text_document: VersionedTextDocumentIdentifier { uri: uri.clone(), version: 2 },
                content_changes: vec![TextDocumentContentChangeEvent {
                    range: None,
                    range_length: None,
                    text: "hello!".to_string(),
                }],
            })
            .await
            .unwrap();

        let result = store
            .add_pending_edits(
                &VersionedTextDocumentIdentifier { uri: uri.clone(), version: 1 },
                vec![TextEdit { range: Range::new(Position::new(0, 0), Position::new(0, 0)), new_text: "x".to_string() }],
            )
            .await;

        assert!(matches!(result, Err(DaemonError::DocumentOutdated { authored: 1, current: 2, .. })));
    }

    #[tokio::test]
    async fn add_pending_edits_empty_is_a_no_op() {
        let store = store();
        let uri: Url = "file:///a.rs".parse().unwrap();
        store.did_open(item(&uri, 1, "hello"));
        let result = store
            .add_pending_edits(&VersionedTextDocumentIdentifier { uri, version: 1 }, Vec::new())
            .await
            .unwrap();
        assert!(!result);
    }

    #[test]
    fn oversized_open_leaves_no_entry() {
        let store = DocumentStore::new(Uuid::new_v4(), Arc::new(IdeGateway::new()), 4);
        let uri: Url = "file:///a.rs".parse().unwrap();
        store.did_open(item(&uri, 1, "too big"));
        assert!(matches!(store.get_text_document(&uri), Err(DaemonError::DocumentNotFound(_))));
    }

    #[test]
    fn reset_base_clears_base_and_mapper() {
        let store = store();
        let uri: Url = "file:///a.rs".parse().unwrap();
        store.did_open(item(&uri, 1, "hello"));
        {
            let mut documents = store.documents.write();
            let entry = documents.get_mut(&uri).unwrap();
            entry.base = Some(item(&uri, 0, "hell"));
        }
        assert!(store.clear_base(&uri));
        let documents = store.documents.read();
        assert!(documents.get(&uri).unwrap().base.is_none());
    }

    #[test]
    fn unknown_document_position_mapper_is_none() {
        let store = store();
        let uri: Url = "file:///missing.rs".parse().unwrap();
        assert!(store.get_position_mapper(&uri).is_none());
    }
}
