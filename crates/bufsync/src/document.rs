//
// document.rs
//
// A synchronized editor buffer: identity, versioned content snapshot and the
// slot the background parser writes into
//

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{TextDocumentIdentifier, Url};

use crate::error::BridgeError;
use crate::gate::ReadinessGate;
use crate::structure::ParsedStructure;

/// Editor-assigned buffer number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u32);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of the change listener the editor attached to a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(pub u32);

/// Buffer state as reported by the editor when a buffer is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferInfo {
    pub id: DocumentId,
    pub name: String,
    pub content: String,
    #[serde(default = "loaded_default")]
    pub loaded: bool,
}

fn loaded_default() -> bool {
    true
}

impl BufferInfo {
    pub fn new(id: DocumentId, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            content: content.into(),
            loaded: true,
        }
    }
}

/// Ensure content ends with exactly the one terminator every snapshot carries.
pub(crate) fn normalize_content(mut content: String) -> Arc<str> {
    if !content.ends_with('\n') {
        content.push('\n');
    }
    Arc::from(content)
}

/// What the background parser last left for a document.
#[derive(Debug, Default)]
pub(crate) struct ParseSlotState {
    pub(crate) structure: Option<Arc<ParsedStructure>>,
    pub(crate) gate: Option<ReadinessGate>,
}

/// Shared between the document (foreground) and its in-flight parses.
///
/// Read `structure` only after waiting on `gate`; the lock keeps individual
/// reads and writes whole but does not order them against a pending parse.
#[derive(Debug, Default)]
pub struct ParseSlot {
    pub(crate) state: Mutex<ParseSlotState>,
}

impl ParseSlot {
    /// Gate of the most recent dispatch, if the document was ever parsed.
    pub fn gate(&self) -> Option<ReadinessGate> {
        self.state.lock().unwrap().gate.clone()
    }

    /// Cached structure, without waiting for a pending parse.
    pub fn structure(&self) -> Option<Arc<ParsedStructure>> {
        self.state.lock().unwrap().structure.clone()
    }
}

/// A synchronized document
///
/// Content is an immutable snapshot. Every change installs a new snapshot;
/// anyone holding an old one keeps seeing the old text.
#[derive(Debug)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    content: Arc<str>,
    /// Document version. 1 once opened; bumped once per applied change.
    pub version: i32,
    /// Mirrors the editor's loaded state; see `:help bufloaded()`.
    pub loaded: bool,
    pub listener: Option<ListenerId>,
    pub(crate) parse: Arc<ParseSlot>,
}

impl Document {
    pub fn new(info: BufferInfo) -> Self {
        Self {
            id: info.id,
            name: info.name,
            content: normalize_content(info.content),
            version: 1,
            loaded: info.loaded,
            listener: None,
            parse: Arc::new(ParseSlot::default()),
        }
    }

    pub fn content(&self) -> &Arc<str> {
        &self.content
    }

    pub(crate) fn set_content(&mut self, content: Arc<str>) {
        self.content = content;
    }

    pub fn parse_slot(&self) -> &Arc<ParseSlot> {
        &self.parse
    }

    /// Resource URI, assuming the name is an absolute file path.
    pub fn uri(&self) -> Result<Url, BridgeError> {
        Url::from_file_path(&self.name).map_err(|_| BridgeError::InvalidResource(self.name.clone()))
    }

    pub fn text_document_identifier(&self) -> Result<TextDocumentIdentifier, BridgeError> {
        Ok(TextDocumentIdentifier { uri: self.uri()? })
    }

    /// Base name, used to match diagnostics to reopened documents.
    pub fn filename(&self) -> &str {
        base_name(&self.name)
    }

    /// Content of the 1-indexed line `n`.
    pub fn line(&self, n: usize) -> Result<&str, BridgeError> {
        let body = self.content.strip_suffix('\n').unwrap_or(&self.content);
        let lines: Vec<&str> = body.split('\n').collect();
        match n.checked_sub(1).and_then(|idx| lines.get(idx).copied()) {
            Some(line) => Ok(line),
            None => Err(BridgeError::LineOutOfRange {
                name: self.name.clone(),
                line: n,
                line_count: lines.len(),
            }),
        }
    }
}

pub(crate) fn base_name(name: &str) -> &str {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name)
}
