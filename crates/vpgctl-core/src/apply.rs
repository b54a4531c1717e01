//! Change-set application
//!
//! The manager edits VPG settings through an edit session:
//!
//! ```text
//! POST /v1/vpgSettings {"VpgIdentifier"}   → settings id
//! GET  /v1/vpgSettings/{id}                → whole document
//!      write every entry's `to` record into the document
//! PUT  /v1/vpgSettings/{id}                ← whole document
//! POST /v1/vpgSettings/{id}/commit         → operation handle
//!      track the handle to a terminal state
//! ```
//!
//! If anything between opening and committing fails, the edit session is
//! discarded with `DELETE /v1/vpgSettings/{id}` so no half-edited settings
//! linger on the manager.

use std::sync::Arc;

use tracing::{info, warn};

use crate::edit::SettingsEditor;
use crate::error::{Error, Result};
use crate::model::{OperationHandle, TaskResult};
use crate::reconcile::ChangeSet;
use crate::session::Session;
use crate::settings;
use crate::tracker::{TaskTracker, TrackOptions};
use crate::traits::Transport;

/// Options for applying a change-set
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Log what would be submitted without contacting the manager
    pub dry_run: bool,
    /// Tracking of the commit operation
    pub track: TrackOptions,
}

/// Submits change-sets and tracks them to completion
pub struct ApplyOrchestrator {
    editor: SettingsEditor,
    tracker: TaskTracker,
}

impl ApplyOrchestrator {
    /// Create an orchestrator with a default tracker over the same transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let tracker = TaskTracker::new(Arc::clone(&transport));
        Self {
            editor: SettingsEditor::new(transport),
            tracker,
        }
    }

    /// Use a preconfigured tracker (e.g. one reporting events)
    pub fn with_tracker(mut self, tracker: TaskTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Apply a change-set to a VPG
    ///
    /// `confirm` sees the full change-set before anything is sent. It is not
    /// called for an empty change-set.
    ///
    /// # Returns
    ///
    /// - `Ok(vec![])`: Nothing to do, declined, or dry run
    /// - `Ok(results)`: One terminal result per submission, in submission
    ///   order. A `Failed` result is returned as-is, not as an error.
    /// - `Err(_)`: Submission or tracking failed
    pub async fn apply<F>(
        &self,
        session: &Session,
        vpg_identifier: &str,
        change_set: &ChangeSet,
        options: &ApplyOptions,
        confirm: F,
    ) -> Result<Vec<TaskResult>>
    where
        F: FnOnce(&ChangeSet) -> bool,
    {
        if change_set.is_empty() {
            info!("VPG {}: no changes needed", vpg_identifier);
            return Ok(Vec::new());
        }

        options.track.validate()?;

        if !confirm(change_set) {
            info!("VPG {}: changes declined, nothing submitted", vpg_identifier);
            return Ok(Vec::new());
        }

        if options.dry_run {
            for entry in &change_set.entries {
                for change in entry.field_changes() {
                    info!("[dry-run] {} {}: would set {}", vpg_identifier, entry.target, change);
                }
            }
            info!(
                "[dry-run] VPG {}: {} NIC(s) would be updated",
                vpg_identifier,
                change_set.len()
            );
            return Ok(Vec::new());
        }

        let handle = self.submit(session, vpg_identifier, change_set).await?;
        let result = self.tracker.track(session, &handle, &options.track).await?;

        if result.is_success() {
            info!("VPG {}: settings committed ({})", vpg_identifier, result);
        } else {
            warn!("VPG {}: commit did not complete ({})", vpg_identifier, result);
        }

        Ok(vec![result])
    }

    /// Write a change-set through one edit session and commit it
    ///
    /// # Returns
    ///
    /// The handle of the commit operation
    pub async fn submit(
        &self,
        session: &Session,
        vpg_identifier: &str,
        change_set: &ChangeSet,
    ) -> Result<OperationHandle> {
        let handle = self
            .editor
            .edit(session, vpg_identifier, |document| {
                for entry in &change_set.entries {
                    settings::write_nic(document, &entry.to)?;
                }
                Ok(true)
            })
            .await?
            .ok_or_else(|| Error::invalid_response("settings edit ended without a commit"))?;

        info!("VPG {}: committed as task {}", vpg_identifier, handle);
        Ok(handle)
    }
}
