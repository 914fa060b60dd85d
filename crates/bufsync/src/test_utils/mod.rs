//! Shared fakes for unit tests, integration tests and benchmarks.
//!
//! Available in test builds and with the `test-support` feature.

pub mod fake_editor;
pub mod recording_server;
pub mod scripted_parser;

pub use fake_editor::FakeEditor;
pub use recording_server::{Recorded, RecordingServer};
pub use scripted_parser::{Hold, ScriptedParser};
