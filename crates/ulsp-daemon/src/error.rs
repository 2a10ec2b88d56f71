use thiserror::Error;

/// Error taxonomy surfaced by the daemon's core components (§7).
///
/// Plugin handler failures (`PluginHandler`) are deliberately *not* a
/// variant callers receive from a dispatch call: they are logged at the
/// point of failure and swallowed, per the fan-out isolation policy.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// A request arrived without a session id attached to its context.
    #[error("no session id in request context")]
    NoSessionInContext,

    /// The session id carried by a context does not resolve to a live
    /// session.
    #[error("session {0} not found")]
    SessionNotFound(uuid::Uuid),

    /// An operation targeted a document URI with no open entry.
    #[error("document {0} not found")]
    DocumentNotFound(url::Url),

    /// Pending edits were authored against a version the document has
    /// since moved past.
    #[error("edits for {uri} authored against stale version {authored}, current is {current}")]
    DocumentOutdated {
        /// The document the edits targeted.
        uri: url::Url,
        /// The version the caller authored edits against.
        authored: i32,
        /// The document's current version.
        current: i32,
    },

    /// Incoming document text exceeded the configured size limit.
    #[error("document {uri} text of {size} bytes exceeds the {limit} byte limit")]
    DocumentSizeLimit {
        /// The document that was rejected.
        uri: url::Url,
        /// The size of the offending text, in bytes.
        size: usize,
        /// The configured limit.
        limit: usize,
    },

    /// A position mapper query named a line past the end of its buffer.
    #[error(transparent)]
    LineOutOfRange(#[from] ulsp_position::LineIndexError),

    /// The IDE Gateway has no client handle registered for a session.
    #[error("no client registered for session {0}")]
    ClientNotFound(uuid::Uuid),

    /// A plugin declared a priority for a method it has no handler for, or
    /// its declared name doesn't match itself. Fatal at session init.
    #[error("plugin {plugin} failed validation: {reason}")]
    PluginValidation {
        /// The offending plugin's declared name.
        plugin: String,
        /// Why validation failed.
        reason: String,
    },

    /// A required configuration key was absent or held an invalid (e.g.
    /// zero) value. Fatal at process start.
    #[error("configuration error: {0}")]
    ConfigMissing(String),

    /// Filesystem I/O failed while resolving a document's on-disk state.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
