//
// diagnostics.rs
//
// Diagnostics published by the analysis server, with the document each one
// belongs to
//

use serde::Serialize;
use tower_lsp::lsp_types::{Diagnostic, Url};

use crate::document::{base_name, DocumentId};

/// Which open document, if any, a diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DocumentAssociation {
    Document(DocumentId),
    /// No open document; the entry stays visible until the server replaces it.
    Unassociated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticEntry {
    pub association: DocumentAssociation,
    pub resource: Url,
    /// Base name of the resource, used to re-associate on reopen.
    pub filename: String,
    pub diagnostic: Diagnostic,
}

/// Current diagnostics in publication order.
#[derive(Debug, Default)]
pub struct DiagnosticsIndex {
    entries: Vec<DiagnosticEntry>,
}

impl DiagnosticsIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every entry for `resource` with `diagnostics`.
    pub fn publish(
        &mut self,
        resource: Url,
        association: DocumentAssociation,
        diagnostics: Vec<Diagnostic>,
    ) {
        self.entries.retain(|entry| entry.resource != resource);
        let filename = resource
            .to_file_path()
            .ok()
            .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| base_name(resource.path()).to_string());
        self.entries
            .extend(diagnostics.into_iter().map(|diagnostic| DiagnosticEntry {
                association,
                resource: resource.clone(),
                filename: filename.clone(),
                diagnostic,
            }));
    }

    /// Point every entry of a closing document at the sentinel. Returns how
    /// many entries were repointed.
    pub fn detach(&mut self, id: DocumentId) -> usize {
        let mut count = 0;
        for entry in &mut self.entries {
            if entry.association == DocumentAssociation::Document(id) {
                entry.association = DocumentAssociation::Unassociated;
                count += 1;
            }
        }
        count
    }

    /// Associate unassociated entries recorded for `filename` with `id`.
    pub fn reattach(&mut self, filename: &str, id: DocumentId) -> usize {
        let mut count = 0;
        for entry in &mut self.entries {
            if entry.association == DocumentAssociation::Unassociated && entry.filename == filename
            {
                entry.association = DocumentAssociation::Document(id);
                count += 1;
            }
        }
        count
    }

    pub fn entries(&self) -> &[DiagnosticEntry] {
        &self.entries
    }

    pub fn for_document(&self, id: DocumentId) -> impl Iterator<Item = &DiagnosticEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.association == DocumentAssociation::Document(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
