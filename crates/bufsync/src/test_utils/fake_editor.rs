//! In-memory editor host.
//!
//! Every buffer id exists unless marked gone. Files available to
//! `open_view` are registered up front.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use crate::changes::ChangeDescriptor;
use crate::document::{BufferInfo, DocumentId, ListenerId};
use crate::editor::{EditorError, EditorHost};

#[derive(Debug)]
pub struct FakeEditor {
    gone: Mutex<HashSet<DocumentId>>,
    files: Mutex<HashMap<String, String>>,
    next_buffer: AtomicU32,
    next_listener: AtomicU32,
    listeners: Mutex<HashMap<ListenerId, DocumentId>>,
    refreshed: Mutex<Vec<DocumentId>>,
    opened_views: Mutex<Vec<String>>,
    written: Mutex<Vec<(DocumentId, Vec<ChangeDescriptor>)>>,
    fail_refresh: AtomicBool,
}

impl Default for FakeEditor {
    fn default() -> Self {
        Self {
            gone: Mutex::default(),
            files: Mutex::default(),
            next_buffer: AtomicU32::new(100),
            next_listener: AtomicU32::new(1),
            listeners: Mutex::default(),
            refreshed: Mutex::default(),
            opened_views: Mutex::default(),
            written: Mutex::default(),
            fail_refresh: AtomicBool::new(false),
        }
    }
}

impl FakeEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a file available to `open_view`.
    pub fn add_file(&self, path: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
    }

    /// Report `id` as no longer existing.
    pub fn mark_gone(&self, id: DocumentId) {
        self.gone.lock().unwrap().insert(id);
    }

    pub fn fail_refresh(&self, fail: bool) {
        self.fail_refresh.store(fail, Ordering::SeqCst);
    }

    pub fn refreshed(&self) -> Vec<DocumentId> {
        self.refreshed.lock().unwrap().clone()
    }

    pub fn opened_views(&self) -> Vec<String> {
        self.opened_views.lock().unwrap().clone()
    }

    pub fn written(&self) -> Vec<(DocumentId, Vec<ChangeDescriptor>)> {
        self.written.lock().unwrap().clone()
    }

    /// Listeners currently attached, by buffer.
    pub fn active_listeners(&self) -> Vec<DocumentId> {
        let mut ids: Vec<_> = self.listeners.lock().unwrap().values().copied().collect();
        ids.sort();
        ids
    }
}

impl EditorHost for FakeEditor {
    fn listener_add(&self, id: DocumentId) -> Result<ListenerId, EditorError> {
        let listener = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().unwrap().insert(listener, id);
        Ok(listener)
    }

    fn listener_remove(&self, listener: ListenerId) -> Result<(), EditorError> {
        match self.listeners.lock().unwrap().remove(&listener) {
            Some(_) => Ok(()),
            None => Err(EditorError::Call {
                call: "listener_remove",
                reason: format!("no listener {}", listener.0),
            }),
        }
    }

    fn buffer_exists(&self, id: DocumentId) -> bool {
        !self.gone.lock().unwrap().contains(&id)
    }

    fn refresh_presentation(&self, id: DocumentId) -> Result<(), EditorError> {
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(EditorError::Call {
                call: "refresh_presentation",
                reason: "signs unavailable".to_string(),
            });
        }
        self.refreshed.lock().unwrap().push(id);
        Ok(())
    }

    fn open_view(&self, path: &str) -> Result<BufferInfo, EditorError> {
        let content = self
            .files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| EditorError::OpenView {
                path: path.to_string(),
                reason: "no such file".to_string(),
            })?;
        self.opened_views.lock().unwrap().push(path.to_string());
        let id = DocumentId(self.next_buffer.fetch_add(1, Ordering::SeqCst));
        Ok(BufferInfo::new(id, path, content))
    }

    fn write_changes(
        &self,
        id: DocumentId,
        changes: &[ChangeDescriptor],
    ) -> Result<(), EditorError> {
        if !self.buffer_exists(id) {
            return Err(EditorError::NoSuchBuffer(id));
        }
        self.written.lock().unwrap().push((id, changes.to_vec()));
        Ok(())
    }
}
