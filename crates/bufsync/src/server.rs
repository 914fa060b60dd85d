//
// server.rs
//
// Outbound side of the bridge: document-synchronization notifications and
// requests sent to the analysis server
//

use async_trait::async_trait;
use tower_lsp::lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DidSaveTextDocumentParams, RenameParams, WorkspaceEdit,
};

/// Why the analysis server did not take a message.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("analysis server connection closed")]
    Disconnected,
    #[error("analysis server returned error {code}: {message}")]
    Server { code: i64, message: String },
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<tower_lsp::jsonrpc::Error> for NotifyError {
    fn from(err: tower_lsp::jsonrpc::Error) -> Self {
        NotifyError::Server {
            code: err.code.code(),
            message: err.message.into_owned(),
        }
    }
}

/// Client for a language-analysis server speaking incremental text sync.
///
/// Notifications are delivered in call order. Implementations must not
/// retry on failure; the error goes back to whoever triggered the change.
#[async_trait]
pub trait AnalysisServer: Send + Sync {
    async fn did_open(&self, params: DidOpenTextDocumentParams) -> Result<(), NotifyError>;

    async fn did_change(&self, params: DidChangeTextDocumentParams) -> Result<(), NotifyError>;

    async fn did_save(&self, params: DidSaveTextDocumentParams) -> Result<(), NotifyError>;

    async fn did_close(&self, params: DidCloseTextDocumentParams) -> Result<(), NotifyError>;

    /// Ask the server for the edits renaming the symbol at a position.
    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>, NotifyError>;
}

/// Method names used in error reports.
pub(crate) mod method {
    pub const DID_OPEN: &str = "textDocument/didOpen";
    pub const DID_CHANGE: &str = "textDocument/didChange";
    pub const DID_SAVE: &str = "textDocument/didSave";
    pub const DID_CLOSE: &str = "textDocument/didClose";
    pub const RENAME: &str = "textDocument/rename";
}
