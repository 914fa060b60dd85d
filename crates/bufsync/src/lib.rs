// lib.rs - Buffer synchronization between an editor and a language analysis
// server.
//
// Editor events flow into `DocumentSync`, which keeps a versioned copy of each
// buffer, sends incremental text-sync notifications to the analysis server and
// keeps a background syntax parse of each document current. Edit batches from
// the server flow back through the same change path.

pub mod changes;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod diagnostics;
pub mod document;
pub mod document_store;
pub mod edit_batch;
pub mod editor;
pub mod error;
pub mod events;
pub mod gate;
pub mod parser_pool;
pub mod server;
pub mod structure;
pub mod sync;
// test_utils is available in test builds and when the `test-support` feature is enabled.
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod utf16;


pub use changes::{translate, ChangeDescriptor, ChangeError, Translation};
pub use config::{BridgeConfig, ContentKind};
pub use coordinator::{CoordinatorError, CoordinatorMetrics, ParseCoordinator};
pub use diagnostics::{DiagnosticEntry, DiagnosticsIndex, DocumentAssociation};
pub use document::{BufferInfo, Document, DocumentId, ListenerId};
pub use edit_batch::EditOutcome;
pub use editor::{EditorError, EditorHost};
pub use error::{BridgeError, EditBatchError};
pub use events::EditorEvent;
pub use gate::ReadinessGate;
pub use server::{AnalysisServer, NotifyError};
pub use structure::{GoStructureParser, ParsedStructure, StructureParser};
pub use sync::DocumentSync;
