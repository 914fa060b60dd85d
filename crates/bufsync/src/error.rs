//
// error.rs
//
// Error taxonomy surfaced to the command layer
//

use tower_lsp::lsp_types::Url;

use crate::changes::ChangeError;
use crate::coordinator::CoordinatorError;
use crate::document::DocumentId;
use crate::editor::EditorError;
use crate::server::NotifyError;

/// Errors reported by [`crate::sync::DocumentSync`] operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The operation referenced a document the store does not track.
    #[error("no record of document {0}")]
    UnknownDocument(DocumentId),

    /// A document name could not be turned into a file resource.
    #[error("document name {0:?} is not an absolute file path")]
    InvalidResource(String),

    /// A line lookup went past the end of the document.
    #[error("line {line} is beyond the end of {name} ({line_count} lines)")]
    LineOutOfRange {
        name: String,
        line: usize,
        line_count: usize,
    },

    /// A change event could not be applied to the current content.
    #[error("failed to apply change to {name}: {source}")]
    Change {
        name: String,
        #[source]
        source: ChangeError,
    },

    /// The analysis server did not accept a notification.
    #[error("failed to notify analysis server of {method} for {resource}: {source}")]
    Notification {
        method: &'static str,
        resource: String,
        #[source]
        source: NotifyError,
    },

    /// A request to the analysis server failed.
    #[error("{method} request to analysis server failed: {source}")]
    Request {
        method: &'static str,
        #[source]
        source: NotifyError,
    },

    /// The editor host failed to perform an operation.
    #[error(transparent)]
    Editor(#[from] EditorError),

    /// The parse coordinator refused work.
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    /// An edit batch was rejected before anything was applied.
    #[error(transparent)]
    EditBatch(#[from] EditBatchError),

    /// An edit batch stopped partway; `applied` resources keep their edits.
    #[error("edit batch stopped at {resource} after applying {} resource(s): {source}", .applied.len())]
    PartialEdit {
        applied: Vec<Url>,
        resource: Url,
        #[source]
        source: Box<BridgeError>,
    },
}

/// Per-resource failures of an edit batch.
#[derive(Debug, thiserror::Error)]
pub enum EditBatchError {
    /// Create/rename/delete file operations are not supported.
    #[error("unsupported {kind} operation in edit batch for {resource}")]
    UnsupportedOperation { kind: &'static str, resource: Url },

    /// The edit was computed against a different document version.
    #[error("edit for {resource} was for version {expected}, current version is {current}")]
    VersionMismatch {
        resource: Url,
        expected: i32,
        current: i32,
    },

    /// A text edit position lies outside the document.
    #[error("edit range {line}:{character} is outside {resource}")]
    OutOfRange {
        resource: Url,
        line: u32,
        character: u32,
    },

    /// The resource could not be resolved to a live document.
    #[error("expected to have a document for {0}; did not")]
    Unresolved(Url),
}

/// Convenience alias for bridge results.
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
