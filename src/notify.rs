// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Notification events and the indexing hand-off payload

use crate::error::Result;
use crate::types::{Module, ModuleKey};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Payload handed to the search indexer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexingRequest {
    /// Module key → path of the module's YANG file
    pub modules_to_index: BTreeMap<String, String>,
    /// Keys of modules to drop from the index
    pub modules_to_delete: Vec<String>,
}

impl IndexingRequest {
    /// Request removal of deleted modules
    #[must_use]
    pub fn deletions(keys: &[ModuleKey]) -> Self {
        Self {
            modules_to_index: BTreeMap::new(),
            modules_to_delete: keys.iter().map(ToString::to_string).collect(),
        }
    }

    /// Request (re)indexing of populated modules saved under `save_dir`
    #[must_use]
    pub fn populated<'a>(modules: impl IntoIterator<Item = &'a Module>, save_dir: &Path) -> Self {
        let modules_to_index = modules
            .into_iter()
            .map(|m| {
                let file = save_dir.join(format!("{}@{}.yang", m.name, m.revision));
                (m.key().to_string(), file.display().to_string())
            })
            .collect();
        Self {
            modules_to_index,
            modules_to_delete: Vec::new(),
        }
    }

    /// Whether there is nothing to index or delete
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules_to_index.is_empty() && self.modules_to_delete.is_empty()
    }
}

/// What happened to the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EventKind {
    /// Module records were removed
    ModulesDeleted {
        /// Removed keys
        keys: Vec<String>,
    },
    /// `dependents` lists of these modules were rewritten
    DependentsUpdated {
        /// Updated keys
        keys: Vec<String>,
    },
    /// The search index must be updated
    IndexingRequired {
        /// Indexing payload
        request: IndexingRequest,
    },
}

/// Timestamped notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// When the event was raised
    pub at: DateTime<Utc>,
    /// What happened
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// Stamp an event with the current time
    #[must_use]
    pub fn now(kind: EventKind) -> Self {
        Self { at: Utc::now(), kind }
    }
}

/// Receiver of catalog events
pub trait NotificationSink: Send + Sync {
    /// Deliver one event
    fn notify(&self, event: &Event) -> Result<()>;
}

/// Deliver an event, logging instead of propagating failures
pub fn emit(sink: &dyn NotificationSink, kind: EventKind) {
    let event = Event::now(kind);
    if let Err(e) = sink.notify(&event) {
        tracing::warn!("Dropping notification: {}", e);
    }
}

/// Sink that writes events to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, event: &Event) -> Result<()> {
        match &event.kind {
            EventKind::ModulesDeleted { keys } => {
                tracing::info!(count = keys.len(), "modules deleted: {}", keys.join(", "));
            }
            EventKind::DependentsUpdated { keys } => {
                tracing::info!(count = keys.len(), "dependents updated: {}", keys.join(", "));
            }
            EventKind::IndexingRequired { request } => {
                tracing::info!(
                    index = request.modules_to_index.len(),
                    delete = request.modules_to_delete.len(),
                    "indexing required"
                );
            }
        }
        Ok(())
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded event kinds, oldest first
    #[must_use]
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(|e| e.kind.clone()).collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: &Event) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use std::path::PathBuf;

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn notify(&self, _event: &Event) -> Result<()> {
            Err(CatalogError::Notification("channel closed".into()))
        }
    }

    #[test]
    fn test_emit_swallows_sink_failures() {
        emit(&FailingSink, EventKind::ModulesDeleted { keys: vec![] });
    }

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        emit(&sink, EventKind::ModulesDeleted { keys: vec!["a@r/o".into()] });
        emit(&sink, EventKind::DependentsUpdated { keys: vec!["b@r/o".into()] });

        let kinds = sink.kinds();
        assert_eq!(kinds.len(), 2);
        assert!(matches!(kinds[0], EventKind::ModulesDeleted { .. }));
    }

    #[test]
    fn test_populated_request_points_at_yang_files() {
        let module = Module::new("ietf-ip", "2018-02-22", "ietf");
        let request = IndexingRequest::populated([&module], &PathBuf::from("/var/yang/all_modules"));

        assert_eq!(
            request.modules_to_index["ietf-ip@2018-02-22/ietf"],
            "/var/yang/all_modules/ietf-ip@2018-02-22.yang"
        );
        assert!(request.modules_to_delete.is_empty());
    }

    #[test]
    fn test_indexing_payload_field_names() {
        let request = IndexingRequest::deletions(&[ModuleKey::new("a", "r", "o")]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["modules-to-delete"][0], "a@r/o");
        assert!(json["modules-to-index"].as_object().unwrap().is_empty());
    }
}
