//! End-to-end synchronization scenario through the public API.
//!
//! An editor session opens a Go file, edits it, runs a rename that touches a
//! second file the editor has not opened, then closes the first buffer. The
//! test checks the analysis server's view and the parsed structure at each
//! step.
//!
//! Run with: `cargo test -p bufsync --test sync_scenario`

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tower_lsp::lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DidSaveTextDocumentParams, Position, Range, RenameParams, TextEdit, Url, WorkspaceEdit,
};

use bufsync::{
    AnalysisServer, BridgeConfig, BufferInfo, ChangeDescriptor, DocumentId, DocumentSync,
    EditorError, EditorEvent, EditorHost, GoStructureParser, ListenerId, NotifyError,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Keeps the text the server would hold for each resource.
#[derive(Default)]
struct MirrorServer {
    log: Mutex<Vec<String>>,
    versions: Mutex<HashMap<Url, i32>>,
    rename: Mutex<Option<WorkspaceEdit>>,
}

impl MirrorServer {
    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn version(&self, uri: &Url) -> Option<i32> {
        self.versions.lock().unwrap().get(uri).copied()
    }
}

#[async_trait]
impl AnalysisServer for MirrorServer {
    async fn did_open(&self, params: DidOpenTextDocumentParams) -> Result<(), NotifyError> {
        let doc = params.text_document;
        self.log.lock().unwrap().push(format!("open {}", doc.uri.path()));
        self.versions.lock().unwrap().insert(doc.uri, doc.version);
        Ok(())
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) -> Result<(), NotifyError> {
        let doc = params.text_document;
        self.log.lock().unwrap().push(format!("change {}", doc.uri.path()));
        self.versions.lock().unwrap().insert(doc.uri, doc.version);
        Ok(())
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) -> Result<(), NotifyError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("save {}", params.text_document.uri.path()));
        Ok(())
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) -> Result<(), NotifyError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("close {}", params.text_document.uri.path()));
        self.versions.lock().unwrap().remove(&params.text_document.uri);
        Ok(())
    }

    async fn rename(&self, _params: RenameParams) -> Result<Option<WorkspaceEdit>, NotifyError> {
        Ok(self.rename.lock().unwrap().take())
    }
}

#[derive(Default)]
struct SessionEditor {
    files: HashMap<String, String>,
    next_id: AtomicU32,
}

impl EditorHost for SessionEditor {
    fn listener_add(&self, id: DocumentId) -> Result<ListenerId, EditorError> {
        Ok(ListenerId(id.0))
    }

    fn listener_remove(&self, _listener: ListenerId) -> Result<(), EditorError> {
        Ok(())
    }

    fn buffer_exists(&self, _id: DocumentId) -> bool {
        true
    }

    fn refresh_presentation(&self, _id: DocumentId) -> Result<(), EditorError> {
        Ok(())
    }

    fn open_view(&self, path: &str) -> Result<BufferInfo, EditorError> {
        let content = self.files.get(path).ok_or_else(|| EditorError::OpenView {
            path: path.to_string(),
            reason: "not found".to_string(),
        })?;
        let id = 50 + self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(BufferInfo::new(DocumentId(id), path, content.clone()))
    }

    fn write_changes(
        &self,
        _id: DocumentId,
        _changes: &[ChangeDescriptor],
    ) -> Result<(), EditorError> {
        Ok(())
    }
}

fn uri(path: &str) -> Url {
    Url::from_file_path(path).unwrap()
}

fn edit(line: u32, start: u32, end: u32, text: &str) -> TextEdit {
    TextEdit::new(
        Range::new(Position::new(line, start), Position::new(line, end)),
        text.to_string(),
    )
}

// ============================================================================
// Scenario
// ============================================================================

#[tokio::test]
async fn test_editing_session() {
    let server = Arc::new(MirrorServer::default());
    let mut editor = SessionEditor::default();
    editor.files.insert(
        "/work/helper.go".to_string(),
        "package main\n\nfunc use() { greet() }\n".to_string(),
    );
    let mut sync = DocumentSync::new(
        BridgeConfig::default(),
        server.clone(),
        Arc::new(editor),
        Arc::new(GoStructureParser),
    );

    sync.handle_event(EditorEvent::Opened(BufferInfo::new(
        DocumentId(1),
        "/work/main.go",
        "package main\n",
    )))
    .await
    .unwrap();
    sync.handle_event(EditorEvent::Changed {
        id: DocumentId(1),
        changes: vec![ChangeDescriptor::new(
            2,
            2,
            vec![String::new(), "func greet() {}".to_string()],
        )],
    })
    .await
    .unwrap();
    assert_eq!(server.version(&uri("/work/main.go")), Some(2));

    let structure = sync.wait_until_parsed(DocumentId(1)).await.unwrap().unwrap();
    assert_eq!(structure.version, 2);
    assert_eq!(structure.top_level_functions(), vec!["greet"]);
    assert_eq!(
        sync.identifier_at(DocumentId(1), Position::new(2, 7))
            .await
            .unwrap()
            .as_deref(),
        Some("greet")
    );

    let mut changes = HashMap::new();
    changes.insert(uri("/work/main.go"), vec![edit(2, 5, 10, "hello")]);
    changes.insert(uri("/work/helper.go"), vec![edit(2, 13, 18, "hello")]);
    *server.rename.lock().unwrap() = Some(WorkspaceEdit::new(changes));

    let outcome = sync
        .rename(DocumentId(1), Position::new(2, 7), "hello")
        .await
        .unwrap();
    assert_eq!(
        outcome.applied,
        vec![uri("/work/helper.go"), uri("/work/main.go")]
    );
    assert_eq!(server.version(&uri("/work/main.go")), Some(3));
    assert_eq!(server.version(&uri("/work/helper.go")), Some(2));

    let structure = sync.wait_until_parsed(DocumentId(1)).await.unwrap().unwrap();
    assert_eq!(structure.top_level_functions(), vec!["hello"]);

    sync.handle_event(EditorEvent::Saved { id: DocumentId(1) })
        .await
        .unwrap();
    sync.handle_event(EditorEvent::Deleted { id: DocumentId(1) })
        .await
        .unwrap();
    assert_eq!(server.version(&uri("/work/main.go")), None);

    assert_eq!(
        server.log(),
        vec![
            "open /work/main.go",
            "change /work/main.go",
            "open /work/helper.go",
            "change /work/helper.go",
            "change /work/main.go",
            "save /work/main.go",
            "close /work/main.go",
        ]
    );

    sync.shutdown().await.unwrap();
}
