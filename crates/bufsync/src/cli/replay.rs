// cli/replay.rs - `bufsync --replay` command
//
// Feeds a recorded stream of editor events (one JSON object per line) through
// a `DocumentSync` and prints every notification the analysis server would
// receive as a JSON line on stdout. Useful for checking what a sequence of
// edits turns into on the wire.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tower_lsp::lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DidSaveTextDocumentParams, RenameParams, WorkspaceEdit,
};

use crate::changes::ChangeDescriptor;
use crate::config::BridgeConfig;
use crate::document::{BufferInfo, DocumentId, ListenerId};
use crate::editor::{EditorError, EditorHost};
use crate::events::EditorEvent;
use crate::server::{method, AnalysisServer, NotifyError};
use crate::structure::GoStructureParser;
use crate::sync::DocumentSync;

/// Parsed arguments for `--replay`.
#[derive(Debug)]
pub struct ReplayArgs {
    pub events: PathBuf,
    pub settings: Option<PathBuf>,
    pub structure: bool,
}

/// Counts from one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub failed: usize,
}

pub async fn run(args: ReplayArgs) -> anyhow::Result<()> {
    let config = match &args.settings {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read settings {}", path.display()))?;
            let value: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("settings {} are not valid JSON", path.display()))?;
            BridgeConfig::from_settings(&value)
        }
        None => BridgeConfig::default(),
    };

    let file = File::open(&args.events)
        .with_context(|| format!("failed to open {}", args.events.display()))?;

    let server = Arc::new(JsonLinesServer::new(std::io::stdout()));
    let mut sync = DocumentSync::new(
        config,
        server.clone(),
        Arc::new(ReplayEditor::default()),
        Arc::new(GoStructureParser),
    );

    let summary = replay(&mut sync, BufReader::new(file)).await?;
    if args.structure {
        write_structure(&sync, server.as_ref()).await?;
    }
    sync.shutdown().await?;

    log::info!(
        "Replayed {} event(s), {} failed",
        summary.events,
        summary.failed
    );
    if summary.failed > 0 {
        eprintln!("{} of {} event(s) failed", summary.failed, summary.events);
    }
    Ok(())
}

/// Apply each event line in order. A failing event is logged and counted;
/// a line that is not a valid event stops the replay.
pub async fn replay<R: BufRead>(
    sync: &mut DocumentSync,
    reader: R,
) -> anyhow::Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    for (index, line) in reader.lines().enumerate() {
        let line = line.context("failed to read events")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: EditorEvent = serde_json::from_str(line)
            .with_context(|| format!("invalid event on line {}", index + 1))?;
        summary.events += 1;
        if let Err(err) = sync.handle_event(event).await {
            summary.failed += 1;
            log::error!("Event on line {} failed: {err}", index + 1);
        }
    }
    Ok(summary)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StructureRecord<'a> {
    document: DocumentId,
    name: &'a str,
    version: i32,
    parsed_version: Option<i32>,
    syntax_errors: bool,
    functions: Vec<&'a str>,
}

async fn write_structure<W: Write>(
    sync: &DocumentSync,
    out: &JsonLinesServer<W>,
) -> anyhow::Result<()> {
    for id in sync.store().ids() {
        let structure = sync.wait_until_parsed(id).await?;
        let Some(doc) = sync.store().get(id) else {
            continue;
        };
        let record = StructureRecord {
            document: id,
            name: &doc.name,
            version: doc.version,
            parsed_version: structure.as_ref().map(|s| s.version),
            syntax_errors: structure.as_ref().is_some_and(|s| s.has_syntax_errors()),
            functions: structure
                .as_ref()
                .map(|s| s.top_level_functions())
                .unwrap_or_default(),
        };
        out.write_record(&record)?;
    }
    Ok(())
}

// ============================================================================
// Analysis server writing JSON lines
// ============================================================================

#[derive(Serialize)]
struct Outgoing<'a, P> {
    method: &'a str,
    params: &'a P,
}

/// Writes each message as `{"method": ..., "params": ...}` on its own line.
#[derive(Debug)]
pub struct JsonLinesServer<W> {
    out: Mutex<W>,
}

impl<W: Write> JsonLinesServer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn write_record<T: Serialize>(&self, record: &T) -> Result<(), NotifyError> {
        let line = serde_json::to_string(record)?;
        let mut out = self.out.lock().unwrap();
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }

    fn send<P: Serialize>(&self, method: &str, params: &P) -> Result<(), NotifyError> {
        self.write_record(&Outgoing { method, params })
    }
}

impl<W: Default> JsonLinesServer<W> {
    /// Take everything written so far.
    pub fn take_output(&self) -> W {
        std::mem::take(&mut *self.out.lock().unwrap())
    }
}

#[async_trait]
impl<W: Write + Send + 'static> AnalysisServer for JsonLinesServer<W> {
    async fn did_open(&self, params: DidOpenTextDocumentParams) -> Result<(), NotifyError> {
        self.send(method::DID_OPEN, &params)
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) -> Result<(), NotifyError> {
        self.send(method::DID_CHANGE, &params)
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) -> Result<(), NotifyError> {
        self.send(method::DID_SAVE, &params)
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) -> Result<(), NotifyError> {
        self.send(method::DID_CLOSE, &params)
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>, NotifyError> {
        self.send(method::RENAME, &params)?;
        Ok(None)
    }
}

// ============================================================================
// Editor stand-in
// ============================================================================

/// Treats every buffer as existing and reads views from disk.
#[derive(Debug)]
struct ReplayEditor {
    next_listener: AtomicU32,
    next_buffer: AtomicU32,
}

impl Default for ReplayEditor {
    fn default() -> Self {
        Self {
            next_listener: AtomicU32::new(1),
            next_buffer: AtomicU32::new(10_000),
        }
    }
}

impl EditorHost for ReplayEditor {
    fn listener_add(&self, _id: DocumentId) -> Result<ListenerId, EditorError> {
        Ok(ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed)))
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
        let content = std::fs::read_to_string(path).map_err(|err| EditorError::OpenView {
            path: path.to_string(),
            reason: err.to_string(),
        })?;
        let id = DocumentId(self.next_buffer.fetch_add(1, Ordering::Relaxed));
        Ok(BufferInfo::new(id, path, content))
    }

    fn write_changes(
        &self,
        _id: DocumentId,
        _changes: &[ChangeDescriptor],
    ) -> Result<(), EditorError> {
        Ok(())
    }
}
