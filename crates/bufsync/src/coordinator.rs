//
// coordinator.rs
//
// Background structural parsing with latest-dispatch-wins commits
//
// Every dispatch gets a unique generation, recorded as the document's newest
// in a shared index before any work is spawned. A finished parse writes its
// result into the document's parse slot only if its generation is still the
// newest one recorded, then releases the readiness gate created for that
// dispatch. Generations never repeat, so a document closed and reopened under
// the same id cannot accept a result meant for its earlier life. The index
// entry is cleared and the gate released on every path, including a panicking
// parser.
//

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::document::{DocumentId, ParseSlot};
use crate::gate::{ReadinessGate, ReleaseOnDrop};
use crate::structure::{LineIndex, ParsedStructure, StructureParser};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
    /// The coordinator no longer accepts dispatches.
    #[error("parse coordinator has stopped")]
    Stopped,
    /// Something other than a document parse failed; the coordinator stopped.
    #[error("parse coordinator fault: {0}")]
    Fault(String),
}

// ============================================================================
// Metrics
// ============================================================================

#[derive(Debug, Default)]
struct CoordinatorCounters {
    dispatched: AtomicU64,
    committed: AtomicU64,
    discarded: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

/// Snapshot of coordinator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorMetrics {
    /// Parses handed to the background
    pub dispatched: u64,
    /// Results written into a parse slot
    pub committed: u64,
    /// Results dropped because a newer dispatch existed
    pub discarded: u64,
    /// Parses that produced no structure
    pub failed: u64,
    /// Parse tasks that panicked
    pub panicked: u64,
}

impl CoordinatorCounters {
    fn snapshot(&self) -> CoordinatorMetrics {
        CoordinatorMetrics {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Newest dispatch generation per document
type LatestDispatches = Arc<Mutex<HashMap<DocumentId, u64>>>;

struct ParseRequest {
    id: DocumentId,
    name: String,
    content: Arc<str>,
    version: i32,
    generation: u64,
    slot: Arc<ParseSlot>,
    /// Released when the request is finished with, or dropped unprocessed.
    gate: ReleaseOnDrop,
}

/// Runs parses on the blocking pool under one supervisor task.
pub struct ParseCoordinator {
    latest: LatestDispatches,
    next_generation: AtomicU64,
    sender: Option<mpsc::UnboundedSender<ParseRequest>>,
    supervisor: Option<JoinHandle<Result<(), CoordinatorError>>>,
    accepting: Arc<AtomicBool>,
    counters: Arc<CoordinatorCounters>,
}

impl ParseCoordinator {
    /// Start the supervisor. Must be called from within a tokio runtime.
    pub fn start(parser: Arc<dyn StructureParser>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let latest: LatestDispatches = Arc::default();
        let accepting = Arc::new(AtomicBool::new(true));
        let counters = Arc::new(CoordinatorCounters::default());

        let supervisor = tokio::spawn(supervise(
            receiver,
            parser,
            latest.clone(),
            accepting.clone(),
            counters.clone(),
        ));

        Self {
            latest,
            next_generation: AtomicU64::new(1),
            sender: Some(sender),
            supervisor: Some(supervisor),
            accepting,
            counters,
        }
    }

    /// Queue a parse of `content` as version `version` of document `id`.
    ///
    /// The newest-dispatch record and the gate swap happen here, before the
    /// request is queued, so a dispatch that follows immediately always
    /// supersedes this one. Never blocks.
    pub fn dispatch(
        &self,
        id: DocumentId,
        name: &str,
        content: Arc<str>,
        version: i32,
        slot: &Arc<ParseSlot>,
    ) -> Result<ReadinessGate, CoordinatorError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(CoordinatorError::Stopped);
        }
        let sender = self.sender.as_ref().ok_or(CoordinatorError::Stopped)?;

        let gate = ReadinessGate::new();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        {
            let mut latest = self.latest.lock().unwrap();
            latest.insert(id, generation);
            let mut state = slot.state.lock().unwrap();
            state.gate = Some(gate.clone());
            state.structure = None;
        }

        let request = ParseRequest {
            id,
            name: name.to_string(),
            content,
            version,
            generation,
            slot: slot.clone(),
            gate: ReleaseOnDrop(gate.clone()),
        };
        if sender.send(request).is_err() {
            self.accepting.store(false, Ordering::SeqCst);
            return Err(CoordinatorError::Stopped);
        }

        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        log::trace!("Dispatched parse of {name} at version {version}");
        Ok(gate)
    }

    /// Drop the newest-dispatch record of a closed document, so results still
    /// in flight for it are discarded.
    pub fn forget(&self, id: DocumentId) {
        self.latest.lock().unwrap().remove(&id);
    }

    /// Whether the newest parse dispatched for `id` has not finished yet.
    pub fn is_pending(&self, id: DocumentId) -> bool {
        self.latest.lock().unwrap().contains_key(&id)
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst) && self.sender.is_some()
    }

    pub fn metrics(&self) -> CoordinatorMetrics {
        self.counters.snapshot()
    }

    /// Stop accepting dispatches and wait for in-flight parses to finish.
    ///
    /// Returns the fault that stopped the coordinator, if one did.
    pub async fn shutdown(&mut self) -> Result<(), CoordinatorError> {
        self.accepting.store(false, Ordering::SeqCst);
        self.sender.take();
        let Some(supervisor) = self.supervisor.take() else {
            return Ok(());
        };
        match supervisor.await {
            Ok(result) => result,
            Err(err) => Err(CoordinatorError::Fault(format!("supervisor failed: {err}"))),
        }
    }
}

impl std::fmt::Debug for ParseCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseCoordinator")
            .field("accepting", &self.is_accepting())
            .field("metrics", &self.metrics())
            .finish()
    }
}

async fn supervise(
    mut receiver: mpsc::UnboundedReceiver<ParseRequest>,
    parser: Arc<dyn StructureParser>,
    latest: LatestDispatches,
    accepting: Arc<AtomicBool>,
    counters: Arc<CoordinatorCounters>,
) -> Result<(), CoordinatorError> {
    log::trace!("Parse coordinator started");
    let mut tasks = JoinSet::new();
    let mut fault = None;

    loop {
        tokio::select! {
            request = receiver.recv() => match request {
                Some(request) => {
                    let parser = parser.clone();
                    let latest = latest.clone();
                    let counters = counters.clone();
                    tasks.spawn_blocking(move || run_parse(request, parser.as_ref(), &latest, &counters));
                }
                None => break,
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(err) = observe(joined, &counters) {
                    log::error!("{err}; no further parses will be accepted");
                    fault = Some(err);
                    break;
                }
            }
        }
    }

    // Queued requests dropped here release their gates unparsed
    accepting.store(false, Ordering::SeqCst);
    drop(receiver);

    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = observe(joined, &counters) {
            log::error!("{err}");
            fault.get_or_insert(err);
        }
    }

    log::trace!("Parse coordinator stopped");
    fault.map_or(Ok(()), Err)
}

/// Classify a finished parse task. Panics are isolated to their document;
/// anything else is a coordinator fault.
fn observe(
    joined: Result<(), JoinError>,
    counters: &CoordinatorCounters,
) -> Result<(), CoordinatorError> {
    match joined {
        Ok(()) => Ok(()),
        Err(err) if err.is_panic() => {
            counters.panicked.fetch_add(1, Ordering::Relaxed);
            log::error!("Parse task panicked: {err}");
            Ok(())
        }
        Err(err) => Err(CoordinatorError::Fault(format!("parse task did not finish: {err}"))),
    }
}

/// Clears a dispatch's index entry if the parse unwinds before committing.
/// Dropped ahead of the gate guard, so waiters never see a stale entry.
struct ClearOnUnwind<'a> {
    latest: &'a Mutex<HashMap<DocumentId, u64>>,
    id: DocumentId,
    generation: u64,
}

impl Drop for ClearOnUnwind<'_> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        // Never panic while unwinding
        if let Ok(mut latest) = self.latest.lock() {
            if latest.get(&self.id) == Some(&self.generation) {
                latest.remove(&self.id);
            }
        }
    }
}

fn run_parse(
    request: ParseRequest,
    parser: &dyn StructureParser,
    latest: &Mutex<HashMap<DocumentId, u64>>,
    counters: &CoordinatorCounters,
) {
    let ParseRequest {
        id,
        name,
        content,
        version,
        generation,
        slot,
        gate,
    } = request;
    let unwind_guard = ClearOnUnwind {
        latest,
        id,
        generation,
    };

    let structure = match parser.parse(&name, &content) {
        Ok(tree) => Some(Arc::new(ParsedStructure {
            version,
            tree,
            index: LineIndex::new(&content),
            content,
        })),
        Err(err) => {
            log::info!("Failed to parse {name} at version {version}: {err}");
            counters.failed.fetch_add(1, Ordering::Relaxed);
            None
        }
    };

    let committed = {
        let mut latest = latest.lock().unwrap();
        if latest.get(&id) == Some(&generation) {
            latest.remove(&id);
            slot.state.lock().unwrap().structure = structure;
            true
        } else {
            false
        }
    };

    if committed {
        counters.committed.fetch_add(1, Ordering::Relaxed);
    } else {
        counters.discarded.fetch_add(1, Ordering::Relaxed);
        log::trace!("Discarded superseded parse of {name} at version {version}");
    }

    drop(unwind_guard);
    drop(gate);
}
