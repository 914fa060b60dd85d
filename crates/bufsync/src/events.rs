//
// events.rs
//
// Editor events as they arrive from the editor's channel
//

use serde::{Deserialize, Serialize};

use crate::changes::ChangeDescriptor;
use crate::document::{BufferInfo, DocumentId};
use crate::error::Result;
use crate::sync::DocumentSync;

/// One editor notification.
///
/// Serialized with an `event` tag, e.g.
/// `{"event":"changed","id":1,"changes":[{"lnum":1,"end":2,"lines":["package main"]}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EditorEvent {
    /// A buffer was read (BufReadPost)
    Opened(BufferInfo),
    /// The buffer listener reported line changes
    Changed {
        id: DocumentId,
        #[serde(default)]
        changes: Vec<ChangeDescriptor>,
    },
    Saved {
        id: DocumentId,
    },
    Unloaded {
        id: DocumentId,
    },
    Deleted {
        id: DocumentId,
    },
    WipedOut {
        id: DocumentId,
    },
    /// A bulk operation such as vimgrep started (QuickFixCmdPre)
    BulkStarted,
    /// The bulk operation finished (QuickFixCmdPost)
    BulkFinished,
}

impl EditorEvent {
    /// The buffer the event refers to, if any.
    pub fn document(&self) -> Option<DocumentId> {
        match self {
            EditorEvent::Opened(info) => Some(info.id),
            EditorEvent::Changed { id, .. }
            | EditorEvent::Saved { id }
            | EditorEvent::Unloaded { id }
            | EditorEvent::Deleted { id }
            | EditorEvent::WipedOut { id } => Some(*id),
            EditorEvent::BulkStarted | EditorEvent::BulkFinished => None,
        }
    }
}

impl DocumentSync {
    /// Route an editor event to the matching lifecycle operation.
    pub async fn handle_event(&mut self, event: EditorEvent) -> Result<()> {
        log::trace!("Editor event: {event:?}");
        match event {
            EditorEvent::Opened(info) => self.buffer_opened(info).await,
            EditorEvent::Changed { id, changes } => self.buffer_changed(id, changes).await,
            EditorEvent::Saved { id } => self.buffer_saved(id).await,
            EditorEvent::Unloaded { id } => {
                self.buffer_unloaded(id);
                Ok(())
            }
            EditorEvent::Deleted { id } => self.buffer_deleted(id).await,
            EditorEvent::WipedOut { id } => self.buffer_wiped_out(id).await,
            EditorEvent::BulkStarted => {
                self.begin_bulk();
                Ok(())
            }
            EditorEvent::BulkFinished => self.end_bulk().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_deserialize_from_tagged_json() {
        let opened: EditorEvent = serde_json::from_str(
            r#"{"event":"opened","id":1,"name":"/src/main.go","content":"package main\n"}"#,
        )
        .unwrap();
        assert_eq!(
            opened,
            EditorEvent::Opened(BufferInfo::new(DocumentId(1), "/src/main.go", "package main\n"))
        );

        let changed: EditorEvent = serde_json::from_str(
            r#"{"event":"changed","id":1,"changes":[{"lnum":1,"end":2,"lines":["package main",""]}]}"#,
        )
        .unwrap();
        assert_eq!(
            changed,
            EditorEvent::Changed {
                id: DocumentId(1),
                changes: vec![ChangeDescriptor::new(
                    1,
                    2,
                    vec!["package main".to_string(), String::new()]
                )],
            }
        );

        let bulk: EditorEvent = serde_json::from_str(r#"{"event":"bulk_started"}"#).unwrap();
        assert_eq!(bulk, EditorEvent::BulkStarted);
        assert_eq!(bulk.document(), None);
    }

    #[test]
    fn test_unloaded_buffer_info_flag() {
        let event: EditorEvent = serde_json::from_str(
            r#"{"event":"opened","id":3,"name":"/src/a.go","content":"","loaded":false}"#,
        )
        .unwrap();
        match event {
            EditorEvent::Opened(info) => assert!(!info.loaded),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_rejected() {
        assert!(serde_json::from_str::<EditorEvent>(r#"{"event":"resized","id":1}"#).is_err());
    }
}
