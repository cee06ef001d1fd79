// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Deletion batches for modules and vendor branches
//!
//! Both engines walk the same state machine:
//!
//! ```text
//! Requested -> ResolvingKeys -> CascadingDependents -> DeletingRecords -> Success | Partial
//!                    \_______________________________________________-> Fail
//! ```
//!
//! A batch holds the catalog's single-flight guard from start to finish. There
//! is no rollback: when a store write fails mid-batch, writes already made
//! stay and the batch reports `Fail`.

use crate::catalog::Catalog;
use crate::config::VendorDeletionPolicy;
use crate::error::Result;
use crate::graph::{CorpusSnapshot, DeletionResolver, Verdict};
use crate::notify::{emit, EventKind, IndexingRequest};
use crate::types::{ModuleKey, Relation};
use crate::vendor::{collect_module_keys, VendorSelector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Caller-visible result of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchStatus {
    /// Everything requested was done
    Success,
    /// Done except for the listed skipped identifiers
    InProgress,
    /// Aborted; see the reason
    Fail,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("Finished successfully"),
            Self::InProgress => f.write_str("In progress"),
            Self::Fail => f.write_str("Failed"),
        }
    }
}

/// Stage of a deletion batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchState {
    /// Accepted, nothing read yet
    Requested,
    /// Reading the corpus and computing affected keys
    ResolvingKeys,
    /// Rewriting back-references and implementation lists
    CascadingDependents,
    /// Removing primary records
    DeletingRecords,
    /// Terminal: all requested work done
    Success,
    /// Terminal: some modules were kept
    Partial,
    /// Terminal: aborted
    Fail,
}

impl BatchState {
    /// Whether the machine may move from `self` to `next`
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        use BatchState::{
            CascadingDependents, DeletingRecords, Fail, Partial, Requested, ResolvingKeys, Success,
        };
        matches!(
            (self, next),
            (Requested, ResolvingKeys)
                | (ResolvingKeys, CascadingDependents)
                | (CascadingDependents, DeletingRecords)
                | (DeletingRecords, Success | Partial)
                | (Requested | ResolvingKeys | CascadingDependents | DeletingRecords, Fail)
        )
    }

    /// Whether the batch has finished
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Partial | Self::Fail)
    }
}

/// A module the batch kept, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotDeleted {
    /// Kept module key
    pub key: String,
    /// Module still referencing it
    pub referenced_by: String,
    /// List holding the reference
    pub relation: Relation,
}

/// Everything a batch did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Tri-state result
    pub status: BatchStatus,
    /// Final state of the machine
    pub state: BatchState,
    /// Deleted module keys
    pub deleted: Vec<String>,
    /// Modules kept because of live references
    pub not_deleted: Vec<NotDeleted>,
    /// Requested keys with no stored record; nothing was done for them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_found: Vec<String>,
    /// Modules whose `dependents` were rewritten
    pub dependents_updated: Vec<String>,
    /// Implementations stripped from modules (vendor batches)
    pub implementations_removed: usize,
    /// Vendor-tree keys removed (vendor batches)
    pub vendor_keys_removed: usize,
    /// Failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Payload for the search indexer
    pub indexing: IndexingRequest,
}

impl BatchOutcome {
    fn empty(status: BatchStatus, state: BatchState) -> Self {
        Self {
            status,
            state,
            deleted: Vec::new(),
            not_deleted: Vec::new(),
            not_found: Vec::new(),
            dependents_updated: Vec::new(),
            implementations_removed: 0,
            vendor_keys_removed: 0,
            reason: None,
            indexing: IndexingRequest::default(),
        }
    }

    /// Short status message: the skipped keys when partial, the reason on failure
    #[must_use]
    pub fn message(&self) -> String {
        match self.status {
            BatchStatus::Success => self.status.to_string(),
            BatchStatus::InProgress => format!(
                "modules-not-deleted:{}",
                self.not_deleted
                    .iter()
                    .map(|n| n.key.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            BatchStatus::Fail => self.reason.clone().unwrap_or_else(|| self.status.to_string()),
        }
    }
}

/// State tracker for one batch
struct Batch {
    kind: &'static str,
    state: BatchState,
}

impl Batch {
    fn start(kind: &'static str) -> Self {
        tracing::info!("Starting {}", kind);
        Self {
            kind,
            state: BatchState::Requested,
        }
    }

    fn advance(&mut self, next: BatchState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "{:?} -> {:?} is not a valid transition",
            self.state,
            next
        );
        tracing::debug!(batch = self.kind, from = ?self.state, to = ?next, "batch state");
        self.state = next;
    }

    fn finish(mut self, mut outcome: BatchOutcome) -> BatchOutcome {
        let next = if outcome.not_deleted.is_empty() {
            BatchState::Success
        } else {
            BatchState::Partial
        };
        self.advance(next);
        outcome.state = next;
        outcome.status = if next == BatchState::Success {
            BatchStatus::Success
        } else {
            BatchStatus::InProgress
        };
        tracing::info!(
            deleted = outcome.deleted.len(),
            kept = outcome.not_deleted.len(),
            "Finished {}: {}",
            self.kind,
            outcome.status
        );
        outcome
    }

    fn fail(mut self, error: &crate::error::CatalogError) -> BatchOutcome {
        self.advance(BatchState::Fail);
        tracing::error!("{} failed: {}", self.kind, error);
        let mut outcome = BatchOutcome::empty(BatchStatus::Fail, BatchState::Fail);
        outcome.reason = Some(error.to_string());
        outcome
    }
}

fn keys_to_strings(keys: &[ModuleKey]) -> Vec<String> {
    keys.iter().map(ToString::to_string).collect()
}

/// Remove deleted modules from every surviving module's `dependents` and
/// write back the records that changed
fn cascade_dependents(
    catalog: &Catalog,
    snapshot: &mut CorpusSnapshot,
    deleted: &[ModuleKey],
) -> Result<Vec<ModuleKey>> {
    let skip: HashSet<ModuleKey> = deleted.iter().cloned().collect();
    let mut changed = BTreeSet::new();
    for key in deleted {
        changed.extend(snapshot.remove_dependent(&key.name, &skip));
    }
    for key in &changed {
        if let Some(module) = snapshot.modules().get(key) {
            catalog.set_module(module, key)?;
            tracing::debug!(key = %key, "dependents updated");
        }
    }
    Ok(changed.into_iter().collect())
}

fn notify_deletion(catalog: &Catalog, outcome: &BatchOutcome) {
    if !outcome.deleted.is_empty() {
        emit(
            catalog.sink(),
            EventKind::ModulesDeleted {
                keys: outcome.deleted.clone(),
            },
        );
    }
    if !outcome.dependents_updated.is_empty() {
        emit(
            catalog.sink(),
            EventKind::DependentsUpdated {
                keys: outcome.dependents_updated.clone(),
            },
        );
    }
    if !outcome.indexing.is_empty() {
        emit(
            catalog.sink(),
            EventKind::IndexingRequired {
                request: outcome.indexing.clone(),
            },
        );
    }
}

// =============================================================================
// Module Deletion
// =============================================================================

/// Delete the requested modules that no surviving module references
///
/// Blocked modules are listed in [`BatchOutcome::not_deleted`] and make the
/// batch [`BatchStatus::InProgress`]; an unreadable corpus makes it
/// [`BatchStatus::Fail`].
pub fn delete_modules(catalog: &Catalog, requested: &[ModuleKey]) -> BatchOutcome {
    let _guard = catalog.lock_batch();
    let mut batch = Batch::start("module deletion");
    match run_module_deletion(catalog, requested, &mut batch) {
        Ok(outcome) => {
            notify_deletion(catalog, &outcome);
            batch.finish(outcome)
        }
        Err(e) => batch.fail(&e),
    }
}

fn run_module_deletion(
    catalog: &Catalog,
    requested: &[ModuleKey],
    batch: &mut Batch,
) -> Result<BatchOutcome> {
    batch.advance(BatchState::ResolvingKeys);
    let mut snapshot = catalog.load_snapshot()?;
    let mut outcome = BatchOutcome::empty(BatchStatus::InProgress, batch.state);

    let mut seen = HashSet::new();
    let unique: Vec<&ModuleKey> = requested.iter().filter(|k| seen.insert(*k)).collect();

    let mut deletable = Vec::new();
    {
        let mut resolver = DeletionResolver::new(&snapshot, requested.iter().cloned());
        for key in unique {
            match resolver.verdict(&key.name, &key.revision) {
                Verdict::Deletable if !snapshot.contains(key) => {
                    tracing::warn!("Skipping {}: module is not stored", key);
                    outcome.not_found.push(key.to_string());
                }
                Verdict::Deletable => deletable.push(key.clone()),
                Verdict::Blocked(reason) => {
                    tracing::warn!("Keeping {}: {}", key, reason);
                    outcome.not_deleted.push(NotDeleted {
                        key: key.to_string(),
                        referenced_by: reason.referenced_by.to_string(),
                        relation: reason.relation,
                    });
                }
            }
        }
    }

    batch.advance(BatchState::CascadingDependents);
    let updated = cascade_dependents(catalog, &mut snapshot, &deletable)?;
    outcome.dependents_updated = keys_to_strings(&updated);

    batch.advance(BatchState::DeletingRecords);
    let removed = catalog.delete_modules(&deletable)?;
    tracing::debug!(requested = deletable.len(), removed, "module records deleted");
    catalog.rebuild_modules_cache()?;

    outcome.deleted = keys_to_strings(&deletable);
    outcome.indexing = IndexingRequest::deletions(&deletable);
    Ok(outcome)
}

// =============================================================================
// Vendor Deletion
// =============================================================================

/// Implementation counts of one module before and after stripping
struct Stripped {
    original: usize,
    removed: usize,
}

fn strip_implementations(
    snapshot: &mut CorpusSnapshot,
    key: &ModuleKey,
    selector: &VendorSelector,
) -> Option<Stripped> {
    let module = snapshot.module_mut(key)?;
    let Some(implementations) = module.implementations.as_mut() else {
        return Some(Stripped {
            original: 0,
            removed: 0,
        });
    };
    let original = implementations.implementation.len();
    implementations.implementation.retain(|i| !selector.matches(i));
    Some(Stripped {
        original,
        removed: original - implementations.implementation.len(),
    })
}

/// Remove a vendor branch and the implementations it contributed
///
/// Modules that lose every implementation and are owned by the selected
/// vendor are deleted outright. Under
/// [`VendorDeletionPolicy::Authoritative`] this skips the reference check;
/// under [`VendorDeletionPolicy::RespectReferences`] referenced modules are
/// kept and reported like in [`delete_modules`].
pub fn delete_vendor_branch(catalog: &Catalog, selector: &VendorSelector) -> BatchOutcome {
    let _guard = catalog.lock_batch();
    let mut batch = Batch::start("vendor deletion");
    match run_vendor_deletion(catalog, selector, &mut batch) {
        Ok(outcome) => {
            notify_deletion(catalog, &outcome);
            batch.finish(outcome)
        }
        Err(e) => batch.fail(&e),
    }
}

fn run_vendor_deletion(
    catalog: &Catalog,
    selector: &VendorSelector,
    batch: &mut Batch,
) -> Result<BatchOutcome> {
    batch.advance(BatchState::ResolvingKeys);
    selector.validate()?;
    let branch_key = selector.branch_key();
    let tree = catalog.create_vendors_data(&branch_key)?;
    let module_keys = collect_module_keys(&tree);
    let mut snapshot = catalog.load_snapshot()?;
    let mut outcome = BatchOutcome::empty(BatchStatus::InProgress, batch.state);
    tracing::info!(branch = %branch_key, modules = module_keys.len(), "vendor branch resolved");

    batch.advance(BatchState::CascadingDependents);
    let mut candidates = Vec::new();
    let mut stripped_keys = Vec::new();
    for key in &module_keys {
        let Some(stripped) = strip_implementations(&mut snapshot, key, selector) else {
            tracing::warn!("Skipping {}: module is not stored", key);
            continue;
        };
        outcome.implementations_removed += stripped.removed;
        if stripped.removed == stripped.original
            && stripped.original > 0
            && key.organization == selector.vendor
        {
            candidates.push(key.clone());
        } else if stripped.removed > 0 {
            stripped_keys.push(key.clone());
        }
    }

    let deletable = match catalog.settings().vendor_policy {
        VendorDeletionPolicy::Authoritative => candidates,
        VendorDeletionPolicy::RespectReferences => {
            let mut resolver = DeletionResolver::new(&snapshot, candidates.iter().cloned());
            let mut deletable = Vec::new();
            for key in candidates {
                match resolver.verdict(&key.name, &key.revision) {
                    Verdict::Deletable => deletable.push(key),
                    Verdict::Blocked(reason) => {
                        tracing::warn!("Keeping {}: {}", key, reason);
                        outcome.not_deleted.push(NotDeleted {
                            key: key.to_string(),
                            referenced_by: reason.referenced_by.to_string(),
                            relation: reason.relation,
                        });
                        stripped_keys.push(key);
                    }
                }
            }
            deletable
        }
    };

    for key in &stripped_keys {
        let Some(module) = snapshot.modules().get(key) else {
            continue;
        };
        if let Err(e) = catalog.set_module(module, key) {
            tracing::warn!("Skipping {}: failed to write implementations: {}", key, e);
        }
    }

    outcome.vendor_keys_removed = catalog.delete_vendor(&branch_key)?;
    let updated = cascade_dependents(catalog, &mut snapshot, &deletable)?;
    outcome.dependents_updated = keys_to_strings(&updated);

    batch.advance(BatchState::DeletingRecords);
    catalog.delete_modules(&deletable)?;
    catalog.rebuild_modules_cache()?;
    catalog.rebuild_vendors_cache()?;

    outcome.deleted = keys_to_strings(&deletable);
    outcome.indexing = IndexingRequest::deletions(&deletable);
    Ok(outcome)
}
