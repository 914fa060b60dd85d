//
// editor.rs
//
// Calls back into the editor that owns the buffers
//

use crate::changes::ChangeDescriptor;
use crate::document::{BufferInfo, DocumentId, ListenerId};

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("editor has no buffer {0}")]
    NoSuchBuffer(DocumentId),
    #[error("failed to open a view for {path}: {reason}")]
    OpenView { path: String, reason: String },
    #[error("editor call {call} failed: {reason}")]
    Call { call: &'static str, reason: String },
}

/// Operations the synchronizer needs from the editor.
///
/// Called from the foreground context only.
pub trait EditorHost: Send + Sync {
    /// Attach a change listener to a buffer.
    fn listener_add(&self, id: DocumentId) -> Result<ListenerId, EditorError>;

    fn listener_remove(&self, listener: ListenerId) -> Result<(), EditorError>;

    fn buffer_exists(&self, id: DocumentId) -> bool;

    /// Reapply signs and highlights; the editor drops them when a buffer unloads.
    fn refresh_presentation(&self, id: DocumentId) -> Result<(), EditorError>;

    /// Open a view onto a file that has no buffer yet and read it.
    fn open_view(&self, path: &str) -> Result<BufferInfo, EditorError>;

    /// Write bridge-originated changes into the editor's copy of a buffer.
    ///
    /// The editor must not report these writes back as change events; the
    /// bridge applies them to its own copy itself.
    fn write_changes(&self, id: DocumentId, changes: &[ChangeDescriptor])
        -> Result<(), EditorError>;
}
