//! Analysis server that records every message it receives.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use tower_lsp::lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DidSaveTextDocumentParams, RenameParams, WorkspaceEdit,
};

use crate::server::{AnalysisServer, NotifyError};

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Open(DidOpenTextDocumentParams),
    Change(DidChangeTextDocumentParams),
    Save(DidSaveTextDocumentParams),
    Close(DidCloseTextDocumentParams),
    Rename(RenameParams),
}

#[derive(Debug, Default)]
pub struct RecordingServer {
    messages: Mutex<Vec<Recorded>>,
    failing: Mutex<HashSet<&'static str>>,
    rename_response: Mutex<Option<WorkspaceEdit>>,
}

impl RecordingServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `method` ("open", "change", "save", "close",
    /// "rename") fail until [`RecordingServer::recover`] is called.
    pub fn fail(&self, method: &'static str) {
        self.failing.lock().unwrap().insert(method);
    }

    pub fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn respond_to_rename(&self, edit: WorkspaceEdit) {
        *self.rename_response.lock().unwrap() = Some(edit);
    }

    pub fn messages(&self) -> Vec<Recorded> {
        self.messages.lock().unwrap().clone()
    }

    /// Drain recorded messages.
    pub fn take(&self) -> Vec<Recorded> {
        std::mem::take(&mut *self.messages.lock().unwrap())
    }

    pub fn opens(&self) -> Vec<DidOpenTextDocumentParams> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                Recorded::Open(params) => Some(params),
                _ => None,
            })
            .collect()
    }

    pub fn changes(&self) -> Vec<DidChangeTextDocumentParams> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                Recorded::Change(params) => Some(params),
                _ => None,
            })
            .collect()
    }

    pub fn closes(&self) -> Vec<DidCloseTextDocumentParams> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                Recorded::Close(params) => Some(params),
                _ => None,
            })
            .collect()
    }

    fn record(&self, method: &'static str, message: Recorded) -> Result<(), NotifyError> {
        if self.failing.lock().unwrap().contains(method) {
            return Err(NotifyError::Disconnected);
        }
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

#[async_trait]
impl AnalysisServer for RecordingServer {
    async fn did_open(&self, params: DidOpenTextDocumentParams) -> Result<(), NotifyError> {
        self.record("open", Recorded::Open(params))
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) -> Result<(), NotifyError> {
        self.record("change", Recorded::Change(params))
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) -> Result<(), NotifyError> {
        self.record("save", Recorded::Save(params))
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) -> Result<(), NotifyError> {
        self.record("close", Recorded::Close(params))
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>, NotifyError> {
        self.record("rename", Recorded::Rename(params))?;
        Ok(self.rename_response.lock().unwrap().clone())
    }
}
