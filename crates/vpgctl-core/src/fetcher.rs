//! Current-state fetcher
//!
//! Reads the live NIC settings of a VPG. Only GET requests are issued.

use std::sync::Arc;

use percent_encoding::{NON_ALPHANUMERIC, percent_encode};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::NicConfiguration;
use crate::session::Session;
use crate::settings;
use crate::traits::{Method, Transport};

/// Reads VPG settings from the manager
pub struct CurrentStateFetcher {
    transport: Arc<dyn Transport>,
}

impl CurrentStateFetcher {
    /// Create a fetcher over a transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Resolve a VPG name to its identifier
    ///
    /// Operators work with names; the settings endpoints want identifiers.
    pub async fn resolve_identifier(&self, session: &Session, vpg_name: &str) -> Result<String> {
        let path = format!(
            "/v1/vpgs?vpgName={}",
            percent_encode(vpg_name.as_bytes(), NON_ALPHANUMERIC)
        );
        let response = match self.transport.request(session, Method::Get, &path, None).await {
            Ok(response) => response,
            Err(Error::Rejected { .. }) => return Err(Error::VpgNotFound(vpg_name.to_string())),
            Err(e) => return Err(e),
        };

        let listed = match &response.body {
            Value::Array(items) => items.as_slice(),
            single @ Value::Object(_) => std::slice::from_ref(single),
            _ => &[],
        };

        listed
            .iter()
            .find(|vpg| vpg["VpgName"].as_str().is_none_or(|name| name == vpg_name))
            .and_then(|vpg| vpg["VpgIdentifier"].as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::VpgNotFound(vpg_name.to_string()))
    }

    /// Fetch the raw settings document of a VPG
    ///
    /// # Errors
    ///
    /// - `Error::VpgNotFound`: The manager rejected the identifier (4xx)
    /// - `Error::TransientTransport`: Network or 5xx failure
    pub async fn fetch_document(&self, session: &Session, vpg_identifier: &str) -> Result<Value> {
        let path = format!("/v1/vpgs/{}/settings", vpg_identifier);
        debug!(
            "Fetching settings of VPG {} via {}",
            vpg_identifier,
            self.transport.transport_name()
        );

        match self.transport.request(session, Method::Get, &path, None).await {
            Ok(response) if response.body.is_null() => Err(Error::invalid_response(format!(
                "Empty settings for VPG {}",
                vpg_identifier
            ))),
            Ok(response) => Ok(response.body),
            Err(Error::Rejected { status, message }) => {
                debug!("Settings query for {} rejected ({}): {}", vpg_identifier, status, message);
                Err(Error::VpgNotFound(vpg_identifier.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch every NIC record of a VPG, in document order
    pub async fn fetch(
        &self,
        session: &Session,
        vpg_identifier: &str,
    ) -> Result<Vec<NicConfiguration>> {
        let document = self.fetch_document(session, vpg_identifier).await?;
        let mut configs = settings::nic_configurations(&document)?;

        // The document may omit Basic.Name; the caller's identifier still names the group
        for config in configs.iter_mut().filter(|c| c.vpg_name.is_none()) {
            config.vpg_name = Some(vpg_identifier.to_string());
        }

        info!("VPG {}: {} NIC records", vpg_identifier, configs.len());
        Ok(configs)
    }
}
