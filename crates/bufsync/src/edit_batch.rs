//
// edit_batch.rs
//
// Planning for edit batches returned by the analysis server
//

use std::collections::BTreeMap;

use tower_lsp::lsp_types::{
    DocumentChangeOperation, DocumentChanges, OneOf, OptionalVersionedTextDocumentIdentifier,
    ResourceOp, TextDocumentEdit, TextEdit, Url, WorkspaceEdit,
};

use crate::error::EditBatchError;

/// Resources whose edits were applied, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditOutcome {
    pub applied: Vec<Url>,
}

/// All edits a batch makes to one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEdits {
    pub uri: Url,
    /// Version the first entry for this resource was computed against.
    /// `None` or a version that is not positive skips the check.
    pub expected_version: Option<i32>,
    /// Edit lists in batch order. Positions in each list refer to the
    /// content left by the lists before it.
    pub edit_lists: Vec<Vec<TextEdit>>,
}

impl ResourceEdits {
    pub fn is_empty(&self) -> bool {
        self.edit_lists.iter().all(Vec::is_empty)
    }

    /// The version guard, if the batch asked for one.
    pub fn version_guard(&self) -> Option<i32> {
        self.expected_version.filter(|version| *version > 0)
    }
}

/// Check a batch and group it per resource, sorted by URI.
///
/// A batch containing any create/rename/delete operation is rejected as a
/// whole.
pub fn plan_edit_batch(
    batch: Vec<DocumentChangeOperation>,
) -> Result<Vec<ResourceEdits>, EditBatchError> {
    let mut grouped: BTreeMap<Url, ResourceEdits> = BTreeMap::new();
    for operation in batch {
        let TextDocumentEdit {
            text_document,
            edits,
        } = match operation {
            DocumentChangeOperation::Edit(edit) => edit,
            DocumentChangeOperation::Op(op) => return Err(unsupported(op)),
        };
        let edits = edits
            .into_iter()
            .map(|edit| match edit {
                OneOf::Left(edit) => edit,
                OneOf::Right(annotated) => annotated.text_edit,
            })
            .collect();
        grouped
            .entry(text_document.uri.clone())
            .or_insert_with(|| ResourceEdits {
                uri: text_document.uri,
                expected_version: text_document.version,
                edit_lists: Vec::new(),
            })
            .edit_lists
            .push(edits);
    }
    Ok(grouped.into_values().collect())
}

fn unsupported(op: ResourceOp) -> EditBatchError {
    let (kind, resource) = match op {
        ResourceOp::Create(create) => ("create", create.uri),
        ResourceOp::Rename(rename) => ("rename", rename.old_uri),
        ResourceOp::Delete(delete) => ("delete", delete.uri),
    };
    EditBatchError::UnsupportedOperation { kind, resource }
}

/// Flatten a workspace edit into document change operations.
///
/// `document_changes` wins when both forms are present. Edits from the
/// `changes` map carry no version.
pub fn workspace_edit_operations(edit: WorkspaceEdit) -> Vec<DocumentChangeOperation> {
    match edit.document_changes {
        Some(DocumentChanges::Edits(edits)) => {
            edits.into_iter().map(DocumentChangeOperation::Edit).collect()
        }
        Some(DocumentChanges::Operations(operations)) => operations,
        None => edit
            .changes
            .unwrap_or_default()
            .into_iter()
            .map(|(uri, edits)| {
                DocumentChangeOperation::Edit(TextDocumentEdit {
                    text_document: OptionalVersionedTextDocumentIdentifier { uri, version: None },
                    edits: edits.into_iter().map(OneOf::Left).collect(),
                })
            })
            .collect(),
    }
}
