//! VPG settings edit sessions
//!
//! Every change to a VPG goes through a settings edit session on the manager:
//! open, modify, commit. The commit answers with an operation handle. A
//! session that is abandoned before its commit is discarded so no half-edited
//! settings linger.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::OperationHandle;
use crate::session::Session;
use crate::traits::{Method, Transport};

/// Path of the settings edit endpoint
pub const VPG_SETTINGS_PATH: &str = "/v1/vpgSettings";

/// Thin client for the settings edit endpoints
#[derive(Clone)]
pub(crate) struct SettingsEditor {
    transport: Arc<dyn Transport>,
}

impl SettingsEditor {
    pub(crate) fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Open an edit session on an existing VPG
    pub(crate) async fn open_existing(
        &self,
        session: &Session,
        vpg_identifier: &str,
    ) -> Result<String> {
        let body = json!({ "VpgIdentifier": vpg_identifier });
        match self.open(session, &body).await {
            Err(Error::Rejected { status: 404, .. }) => {
                Err(Error::VpgNotFound(vpg_identifier.to_string()))
            }
            other => other,
        }
    }

    /// Open an edit session from a full settings body (a new VPG)
    pub(crate) async fn open(&self, session: &Session, body: &Value) -> Result<String> {
        let response = self
            .transport
            .request(session, Method::Post, VPG_SETTINGS_PATH, Some(body))
            .await?;

        let settings_id = response
            .identifier(&["VpgSettingsIdentifier", "Identifier"])
            .ok_or_else(|| Error::invalid_response("settings edit opened without an identifier"))?;
        debug!("Opened settings edit {}", settings_id);
        Ok(settings_id)
    }

    pub(crate) async fn read(&self, session: &Session, settings_id: &str) -> Result<Value> {
        let response = self
            .transport
            .request(session, Method::Get, &settings_path(settings_id), None)
            .await?;
        Ok(response.body)
    }

    pub(crate) async fn write(
        &self,
        session: &Session,
        settings_id: &str,
        document: &Value,
    ) -> Result<()> {
        self.transport
            .request(session, Method::Put, &settings_path(settings_id), Some(document))
            .await?;
        Ok(())
    }

    /// POST a body to a sub-resource of the edit session (e.g. `vms`)
    pub(crate) async fn post(
        &self,
        session: &Session,
        settings_id: &str,
        resource: &str,
        body: &Value,
    ) -> Result<()> {
        let path = format!("{}/{}", settings_path(settings_id), resource);
        self.transport
            .request(session, Method::Post, &path, Some(body))
            .await?;
        Ok(())
    }

    pub(crate) async fn commit(
        &self,
        session: &Session,
        settings_id: &str,
    ) -> Result<OperationHandle> {
        let path = format!("{}/commit", settings_path(settings_id));
        let response = self
            .transport
            .request(session, Method::Post, &path, None)
            .await?;

        response
            .identifier(&["TaskIdentifier", "TaskId"])
            .map(OperationHandle::new)
            .ok_or_else(|| Error::invalid_response("commit returned no task identifier"))
    }

    /// Best-effort removal of an edit session
    pub(crate) async fn discard(&self, session: &Session, settings_id: &str) {
        match self
            .transport
            .request(session, Method::Delete, &settings_path(settings_id), None)
            .await
        {
            Ok(_) => debug!("Discarded settings edit {}", settings_id),
            Err(e) => warn!("Failed to discard settings edit {}: {}", settings_id, e),
        }
    }

    /// Read-modify-write-commit on an existing VPG
    ///
    /// `edit` changes the document in place and returns whether to commit.
    /// Returning `false`, or any error up to the commit, discards the session.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(handle))`: Committed
    /// - `Ok(None)`: `edit` chose not to commit
    pub(crate) async fn edit<F>(
        &self,
        session: &Session,
        vpg_identifier: &str,
        edit: F,
    ) -> Result<Option<OperationHandle>>
    where
        F: FnOnce(&mut Value) -> Result<bool>,
    {
        let settings_id = self.open_existing(session, vpg_identifier).await?;

        let outcome = async {
            let mut document = self.read(session, &settings_id).await?;
            if !edit(&mut document)? {
                return Ok(None);
            }
            self.write(session, &settings_id, &document).await?;
            self.commit(session, &settings_id).await.map(Some)
        }
        .await;

        match outcome {
            Ok(Some(handle)) => {
                debug!(
                    "VPG {}: committed settings {} as task {}",
                    vpg_identifier, settings_id, handle
                );
                Ok(Some(handle))
            }
            Ok(None) => {
                self.discard(session, &settings_id).await;
                Ok(None)
            }
            Err(e) => {
                warn!("VPG {}: edit {} failed: {}", vpg_identifier, settings_id, e);
                self.discard(session, &settings_id).await;
                Err(e)
            }
        }
    }
}

fn settings_path(settings_id: &str) -> String {
    format!("{}/{}", VPG_SETTINGS_PATH, settings_id)
}
