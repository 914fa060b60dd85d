//
// sync.rs
//
// Document lifecycle synchronization between the editor and the analysis
// server
//
// All mutation happens through `&mut self`, so callers serialize operations
// on one task. Background parses only touch the per-document parse slots.
//

use std::sync::Arc;

use tower_lsp::lsp_types::{
    Diagnostic, DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DidSaveTextDocumentParams, DocumentChangeOperation, Position, RenameParams,
    TextDocumentContentChangeEvent, TextDocumentItem, TextDocumentPositionParams, Url,
    VersionedTextDocumentIdentifier, WorkDoneProgressParams, WorkspaceEdit,
};

use crate::changes::{text_edits_to_descriptors, translate, ChangeDescriptor, ChangeError};
use crate::config::BridgeConfig;
use crate::coordinator::ParseCoordinator;
use crate::diagnostics::{DiagnosticsIndex, DocumentAssociation};
use crate::document::{base_name, normalize_content, BufferInfo, Document, DocumentId};
use crate::document_store::{BufferStore, PendingBatch};
use crate::edit_batch::{plan_edit_batch, workspace_edit_operations, EditOutcome, ResourceEdits};
use crate::editor::EditorHost;
use crate::error::{BridgeError, EditBatchError, Result};
use crate::server::{method, AnalysisServer};
use crate::structure::{ParsedStructure, StructureParser};

/// Keeps the analysis server's view of every tracked buffer in step with the
/// editor, and each document's parsed structure in step with its content.
pub struct DocumentSync {
    config: BridgeConfig,
    store: BufferStore,
    /// Present while a bulk operation is running
    pending: Option<PendingBatch>,
    diagnostics: DiagnosticsIndex,
    coordinator: ParseCoordinator,
    server: Arc<dyn AnalysisServer>,
    editor: Arc<dyn EditorHost>,
}

impl DocumentSync {
    /// Create a synchronizer and start its parse coordinator. Must be called
    /// from within a tokio runtime.
    pub fn new(
        config: BridgeConfig,
        server: Arc<dyn AnalysisServer>,
        editor: Arc<dyn EditorHost>,
        parser: Arc<dyn StructureParser>,
    ) -> Self {
        Self {
            config,
            store: BufferStore::new(),
            pending: None,
            diagnostics: DiagnosticsIndex::new(),
            coordinator: ParseCoordinator::start(parser),
            server,
            editor,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn store(&self) -> &BufferStore {
        &self.store
    }

    pub fn diagnostics(&self) -> &DiagnosticsIndex {
        &self.diagnostics
    }

    pub fn coordinator(&self) -> &ParseCoordinator {
        &self.coordinator
    }

    pub fn lookup_document(&mut self, id: DocumentId) -> Option<&Document> {
        self.store.lookup(id)
    }

    pub fn is_bulk_active(&self) -> bool {
        self.pending.is_some()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start tracking a buffer, or refresh one already tracked.
    pub async fn register_document(&mut self, info: BufferInfo) -> Result<()> {
        self.buffer_opened(info).await
    }

    /// Stop tracking a buffer. Unknown ids are an error.
    pub async fn remove_document(&mut self, id: DocumentId) -> Result<()> {
        self.buffer_deleted(id).await
    }

    /// The editor read a buffer.
    pub async fn buffer_opened(&mut self, info: BufferInfo) -> Result<()> {
        if let Some(batch) = self.pending.as_mut() {
            log::trace!("Staging buffer {} ({}) during bulk operation", info.id, info.name);
            batch.stage(info);
            return Ok(());
        }
        self.add_buffer(info).await
    }

    async fn add_buffer(&mut self, info: BufferInfo) -> Result<()> {
        let reattached = self.diagnostics.reattach(base_name(&info.name), info.id);
        if reattached > 0 {
            log::trace!("Reassociated {reattached} diagnostic(s) with buffer {}", info.id);
        }

        let id = info.id;
        if let Some(doc) = self.store.lookup_mut(id) {
            // Reload of a tracked buffer
            doc.loaded = info.loaded;
            let content = normalize_content(info.content);
            if *doc.content() == content {
                // Typically an unloaded buffer being loaded again. Same
                // version, but the editor dropped signs and highlights.
                self.refresh_presentation(id);
                return Ok(());
            }
            doc.set_content(content.clone());
            doc.version += 1;
            self.schedule_parse(id);
            let full_text = TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text: content.to_string(),
            };
            return self.notify_change(id, vec![full_text]).await;
        }

        let mut document = Document::new(info);
        document.listener = Some(self.editor.listener_add(id)?);
        self.store.register(document);
        self.refresh_presentation(id);
        self.schedule_parse(id);
        self.notify_open(id).await
    }

    /// Apply a change event from the buffer's listener.
    pub async fn buffer_changed(
        &mut self,
        id: DocumentId,
        changes: Vec<ChangeDescriptor>,
    ) -> Result<()> {
        let doc = self
            .store
            .lookup_mut(id)
            .ok_or(BridgeError::UnknownDocument(id))?;
        if changes.is_empty() {
            log::info!("No changes to apply for {}", doc.name);
            return Ok(());
        }

        let translation = translate(doc.content(), &changes).map_err(|source| {
            BridgeError::Change {
                name: doc.name.clone(),
                source,
            }
        })?;
        doc.version += 1;
        doc.set_content(Arc::from(translation.content));

        self.schedule_parse(id);
        self.notify_change(id, translation.content_changes).await
    }

    /// The editor unloaded a buffer. Untracked ids are ignored.
    pub fn buffer_unloaded(&mut self, id: DocumentId) {
        if let Some(doc) = self.store.lookup_mut(id) {
            doc.loaded = false;
        }
    }

    /// The editor deleted a buffer.
    pub async fn buffer_deleted(&mut self, id: DocumentId) -> Result<()> {
        if !self.store.contains(id) {
            return Err(BridgeError::UnknownDocument(id));
        }
        self.delete_buffer(id).await
    }

    /// The editor wiped a buffer out. Untracked ids are ignored.
    pub async fn buffer_wiped_out(&mut self, id: DocumentId) -> Result<()> {
        if let Some(batch) = self.pending.as_mut() {
            batch.discard(id);
        }
        if self.store.contains(id) {
            return self.delete_buffer(id).await;
        }
        Ok(())
    }

    async fn delete_buffer(&mut self, id: DocumentId) -> Result<()> {
        let listener = self.store.get(id).and_then(|doc| doc.listener);
        if let Some(listener) = listener {
            self.editor.listener_remove(listener)?;
        }

        // Entries stay visible with no document until the server replaces them
        self.diagnostics.detach(id);
        let document = self.store.remove(id)?;
        self.coordinator.forget(id);

        let params = DidCloseTextDocumentParams {
            text_document: document.text_document_identifier()?,
        };
        self.server
            .did_close(params)
            .await
            .map_err(|source| BridgeError::Notification {
                method: method::DID_CLOSE,
                resource: document.name.clone(),
                source,
            })
    }

    /// The editor wrote a buffer to disk.
    pub async fn buffer_saved(&mut self, id: DocumentId) -> Result<()> {
        let doc = self
            .store
            .lookup(id)
            .ok_or(BridgeError::UnknownDocument(id))?;
        let params = DidSaveTextDocumentParams {
            text_document: doc.text_document_identifier()?,
            text: self
                .config
                .save_includes_text
                .then(|| doc.content().to_string()),
        };
        let resource = doc.name.clone();
        self.server
            .did_save(params)
            .await
            .map_err(|source| BridgeError::Notification {
                method: method::DID_SAVE,
                resource,
                source,
            })
    }

    /// A bulk operation such as a project-wide search started. Buffers read
    /// until it ends are staged instead of admitted.
    pub fn begin_bulk(&mut self) {
        if let Some(previous) = self.pending.replace(PendingBatch::new()) {
            if !previous.is_empty() {
                log::warn!(
                    "Bulk operation started while another was active; dropping {} staged buffer(s)",
                    previous.len()
                );
            }
        }
    }

    /// The bulk operation ended. Admit staged buffers that still exist, in
    /// the order they were read.
    pub async fn end_bulk(&mut self) -> Result<()> {
        let Some(batch) = self.pending.take() else {
            log::trace!("Bulk operation ended without having started");
            return Ok(());
        };
        for info in batch.into_staged() {
            if !self.editor.buffer_exists(info.id) {
                log::trace!("Skipping buffer {} closed during bulk operation", info.id);
                continue;
            }
            self.add_buffer(info).await?;
        }
        Ok(())
    }

    /// Record diagnostics the analysis server published for a resource.
    pub fn publish_diagnostics(&mut self, uri: Url, diagnostics: Vec<Diagnostic>) {
        let association = uri
            .to_file_path()
            .ok()
            .and_then(|path| path.to_str().and_then(|p| self.store.find_by_name(p)))
            .map_or(DocumentAssociation::Unassociated, DocumentAssociation::Document);
        self.diagnostics.publish(uri, association, diagnostics);
    }

    // ========================================================================
    // Structure
    // ========================================================================

    /// Wait for the latest dispatched parse of a document and return its
    /// structure. Documents never parsed return `None` immediately.
    pub async fn wait_until_parsed(
        &self,
        id: DocumentId,
    ) -> Result<Option<Arc<ParsedStructure>>> {
        let slot = self
            .store
            .get(id)
            .ok_or(BridgeError::UnknownDocument(id))?
            .parse_slot()
            .clone();
        let Some(gate) = slot.gate() else {
            return Ok(None);
        };
        gate.wait().await;
        Ok(slot.structure())
    }

    /// Identifier under `position` in the document's current structure.
    pub async fn identifier_at(
        &self,
        id: DocumentId,
        position: Position,
    ) -> Result<Option<String>> {
        let structure = self.wait_until_parsed(id).await?;
        Ok(structure.and_then(|s| s.identifier_at(position).map(str::to_string)))
    }

    /// Stop the parse coordinator after in-flight parses finish.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.coordinator.shutdown().await?;
        Ok(())
    }

    // ========================================================================
    // Edits from the analysis server
    // ========================================================================

    /// Apply an edit batch across documents.
    ///
    /// Not atomic: resources are processed in URI order and a failure stops
    /// processing, but resources already processed keep their edits. The
    /// failure reports which ones those are.
    pub async fn apply_edit_batch(
        &mut self,
        batch: Vec<DocumentChangeOperation>,
    ) -> Result<EditOutcome> {
        let plan = plan_edit_batch(batch)?;
        if plan.is_empty() {
            log::info!("No changes to apply");
            return Ok(EditOutcome::default());
        }

        let mut applied = Vec::new();
        for resource in plan {
            if resource.is_empty() {
                continue;
            }
            let uri = resource.uri.clone();
            if let Err(err) = self.apply_resource_edits(resource).await {
                return Err(BridgeError::PartialEdit {
                    applied,
                    resource: uri,
                    source: Box::new(err),
                });
            }
            applied.push(uri);
        }
        Ok(EditOutcome { applied })
    }

    /// Apply a workspace edit in either of its two forms.
    pub async fn apply_workspace_edit(&mut self, edit: WorkspaceEdit) -> Result<EditOutcome> {
        self.apply_edit_batch(workspace_edit_operations(edit)).await
    }

    /// Rename the symbol at `position` through the analysis server and apply
    /// the edits it returns.
    pub async fn rename(
        &mut self,
        id: DocumentId,
        position: Position,
        new_name: &str,
    ) -> Result<EditOutcome> {
        let doc = self
            .store
            .lookup(id)
            .ok_or(BridgeError::UnknownDocument(id))?;
        let params = RenameParams {
            text_document_position: TextDocumentPositionParams {
                text_document: doc.text_document_identifier()?,
                position,
            },
            new_name: new_name.to_string(),
            work_done_progress_params: WorkDoneProgressParams::default(),
        };
        let edit = self
            .server
            .rename(params)
            .await
            .map_err(|source| BridgeError::Request {
                method: method::RENAME,
                source,
            })?;
        match edit {
            Some(edit) => self.apply_workspace_edit(edit).await,
            None => {
                log::info!("No changes to apply for rename");
                Ok(EditOutcome::default())
            }
        }
    }

    async fn apply_resource_edits(&mut self, resource: ResourceEdits) -> Result<()> {
        let id = self.resolve_resource(&resource.uri).await?;
        let current = self
            .store
            .get(id)
            .map(|doc| doc.version)
            .ok_or(BridgeError::UnknownDocument(id))?;
        if let Some(expected) = resource.version_guard() {
            if expected != current {
                return Err(EditBatchError::VersionMismatch {
                    resource: resource.uri,
                    expected,
                    current,
                }
                .into());
            }
        }

        for edits in &resource.edit_lists {
            let doc = self.store.get(id).ok_or(BridgeError::UnknownDocument(id))?;
            let descriptors =
                text_edits_to_descriptors(doc.content(), edits).map_err(|err| match err {
                    ChangeError::EditOutOfRange { line, character } => {
                        BridgeError::from(EditBatchError::OutOfRange {
                            resource: resource.uri.clone(),
                            line,
                            character,
                        })
                    }
                    source => BridgeError::Change {
                        name: doc.name.clone(),
                        source,
                    },
                })?;
            if descriptors.is_empty() {
                continue;
            }
            self.editor.write_changes(id, &descriptors)?;
            self.buffer_changed(id, descriptors).await?;
        }
        Ok(())
    }

    /// Find the tracked document for a resource, opening a view onto it if
    /// the editor has none.
    async fn resolve_resource(&mut self, uri: &Url) -> Result<DocumentId> {
        let path = uri
            .to_file_path()
            .ok()
            .and_then(|path| path.to_str().map(str::to_string))
            .ok_or_else(|| EditBatchError::Unresolved(uri.clone()))?;
        if let Some(id) = self.store.find_by_name(&path) {
            return Ok(id);
        }

        let info = self.editor.open_view(&path)?;
        let id = info.id;
        self.add_buffer(info).await?;
        if !self.store.contains(id) {
            return Err(EditBatchError::Unresolved(uri.clone()).into());
        }
        Ok(id)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn refresh_presentation(&self, id: DocumentId) {
        if let Err(err) = self.editor.refresh_presentation(id) {
            log::warn!("Failed to update signs and highlights for buffer {id}: {err}");
        }
    }

    /// Queue a background parse of the document's current content.
    ///
    /// Parsing is best effort: a coordinator that refuses work is logged and
    /// the document simply has no structure.
    fn schedule_parse(&self, id: DocumentId) {
        let Some(doc) = self.store.get(id) else {
            return;
        };
        if !self.config.should_parse(&doc.name) {
            return;
        }
        if let Err(err) = self.coordinator.dispatch(
            doc.id,
            &doc.name,
            doc.content().clone(),
            doc.version,
            doc.parse_slot(),
        ) {
            log::warn!("Failed to schedule parse of {}: {err}", doc.name);
        }
    }

    async fn notify_open(&self, id: DocumentId) -> Result<()> {
        let doc = self.store.get(id).ok_or(BridgeError::UnknownDocument(id))?;
        let params = DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: doc.uri()?,
                language_id: self.config.detect_kind(&doc.name).language_id().to_string(),
                version: doc.version,
                text: doc.content().to_string(),
            },
        };
        self.server
            .did_open(params)
            .await
            .map_err(|source| BridgeError::Notification {
                method: method::DID_OPEN,
                resource: doc.name.clone(),
                source,
            })
    }

    async fn notify_change(
        &self,
        id: DocumentId,
        content_changes: Vec<TextDocumentContentChangeEvent>,
    ) -> Result<()> {
        let doc = self.store.get(id).ok_or(BridgeError::UnknownDocument(id))?;
        let params = DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: doc.uri()?,
                version: doc.version,
            },
            content_changes,
        };
        self.server
            .did_change(params)
            .await
            .map_err(|source| BridgeError::Notification {
                method: method::DID_CHANGE,
                resource: doc.name.clone(),
                source,
            })
    }
}

impl std::fmt::Debug for DocumentSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSync")
            .field("config", &self.config)
            .field("documents", &self.store.len())
            .field("bulk_active", &self.pending.is_some())
            .field("coordinator", &self.coordinator)
            .finish()
    }
}
