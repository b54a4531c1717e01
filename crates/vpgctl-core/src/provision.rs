//! VPG provisioning
//!
//! Creates VPGs from blueprint rows and edits VPG-level journal history.
//! Every step that changes the manager produces a task, and every task is
//! tracked to a terminal state before the next step starts.
//!
//! ```text
//! preflight:  GET  /v1/vpgs?vpgName=...        (must not exist)
//! create:     POST /v1/vpgSettings {settings}  → settings id
//!             POST /v1/vpgSettings/{id}/commit → task, tracked
//!             GET  /v1/vpgs?vpgName=...        → VPG identifier
//! per VM:     POST /v1/vpgSettings {"VpgIdentifier"}
//!             POST /v1/vpgSettings/{id}/vms    ← VM placement
//!             POST /v1/vpgSettings/{id}/commit → task, tracked
//! rollback:   DELETE /v1/vpgs/{vpg}            (any VM failed)
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::apply::ApplyOptions;
use crate::edit::SettingsEditor;
use crate::error::{Error, Result};
use crate::fetcher::CurrentStateFetcher;
use crate::loader::{RowError, TabularRow, VPG_NAME_COLUMN};
use crate::model::{TaskResult, normalize_cell};
use crate::session::Session;
use crate::settings;
use crate::tracker::{TaskTracker, TrackOptions};
use crate::traits::{Method, Transport};

const VPG_TYPE: &str = "VPG Type";
const RPO: &str = "RPO (seconds)";
const TEST_INTERVAL: &str = "Test Interval (minutes)";
const JOURNAL_HISTORY: &str = "Journal History (hours)";
const PRIORITY: &str = "Priority";
const WAN_COMPRESSION: &str = "Use WAN Compression";
const PROTECTED_SITE: &str = "Protected Site ID";
const RECOVERY_SITE: &str = "Recovery Site ID";
const JOURNAL_DATASTORE: &str = "Journal Datastore ID";
const JOURNAL_HARD_LIMIT: &str = "Journal Hard Limit (MB)";
const JOURNAL_WARNING: &str = "Journal Warning Threshold (MB)";
const RECOVERY_HOST_CLUSTER: &str = "Recovery Host Cluster ID";
const RECOVERY_DATASTORE: &str = "Recovery Datastore ID";
const RECOVERY_FOLDER: &str = "Recovery Folder ID";
const FAILOVER_NETWORK: &str = "Failover Network ID";
const TEST_NETWORK: &str = "Failover Test Network ID";
const VM_ID: &str = "VM ID";
const VM_NAME: &str = "VM Name";

/// One VM to protect in a new VPG
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlueprintVm {
    /// Manager identifier of the VM
    pub vm_identifier: String,
    /// Display name, informational only
    pub vm_name: Option<String>,
    /// 1-based data row the VM came from
    pub row: usize,
}

/// Everything needed to create one VPG and populate it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpgBlueprint {
    pub name: String,
    pub vpg_type: String,
    pub rpo_seconds: u64,
    pub test_interval_minutes: u64,
    pub journal_history_hours: u64,
    pub priority: String,
    pub use_wan_compression: bool,
    pub protected_site: String,
    pub recovery_site: String,
    pub journal_datastore: String,
    pub journal_hard_limit_mb: u64,
    pub journal_warning_threshold_mb: u64,
    pub recovery_host_cluster: String,
    pub recovery_datastore: String,
    pub recovery_folder: String,
    pub failover_network: String,
    pub test_network: String,
    /// VMs in row order
    pub vms: Vec<BlueprintVm>,
}

impl VpgBlueprint {
    /// Settings body that opens the creation edit session
    pub fn settings_document(&self) -> Value {
        json!({
            "Basic": {
                "Name": self.name,
                "VpgType": self.vpg_type,
                "RpoInSeconds": self.rpo_seconds,
                "TestIntervalInMinutes": self.test_interval_minutes,
                "JournalHistoryInHours": self.journal_history_hours,
                "Priority": self.priority,
                "UseWanCompression": self.use_wan_compression,
                "ProtectedSiteIdentifier": self.protected_site,
                "RecoverySiteIdentifier": self.recovery_site,
            },
            "Journal": {
                "DatastoreIdentifier": self.journal_datastore,
                "Limitation": {
                    "HardLimitInMB": self.journal_hard_limit_mb,
                    "WarningThresholdInMB": self.journal_warning_threshold_mb,
                },
            },
            "Recovery": {
                "DefaultHostClusterIdentifier": self.recovery_host_cluster,
                "DefaultDatastoreIdentifier": self.recovery_datastore,
                "DefaultFolderIdentifier": self.recovery_folder,
            },
            "Networks": {
                "Failover": {"Hypervisor": {"DefaultNetworkIdentifier": self.failover_network}},
                "FailoverTest": {"Hypervisor": {"DefaultNetworkIdentifier": self.test_network}},
            },
        })
    }

    /// VM placement body, recovering to the VPG defaults
    pub fn vm_document(&self, vm: &BlueprintVm) -> Value {
        json!({
            "VmIdentifier": vm.vm_identifier,
            "Recovery": {
                "HostClusterIdentifier": self.recovery_host_cluster,
                "DatastoreIdentifier": self.recovery_datastore,
                "FolderIdentifier": self.recovery_folder,
            },
        })
    }
}

/// Group rows into blueprints, one per distinct `VPG Name`
///
/// VPG-level settings come from the first row of each group; later rows
/// only contribute their VM. Blueprints keep first-appearance order.
///
/// # Returns
///
/// - `Ok(blueprints)`: Every row parsed and no VM is listed twice
/// - `Err(errors)`: All row errors, in row order
pub fn load_blueprints(rows: &[TabularRow]) -> std::result::Result<Vec<VpgBlueprint>, Vec<RowError>> {
    let mut blueprints: Vec<VpgBlueprint> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    let mut vm_rows: HashMap<String, usize> = HashMap::new();
    let mut errors = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let row_no = index + 1;
        let mut cells = Cells { row_no, row, errors: &mut errors };

        let Some(name) = cells.text(VPG_NAME_COLUMN) else {
            continue;
        };
        let vm_identifier = cells.text(VM_ID);
        let vm_name = row.get(VM_NAME).and_then(normalize_cell);

        let slot = match by_name.get(&name).copied() {
            Some(slot) => Some(slot),
            None => parse_vpg(&mut cells, &name).map(|blueprint| {
                blueprints.push(blueprint);
                by_name.insert(name.clone(), blueprints.len() - 1);
                blueprints.len() - 1
            }),
        };

        let Some(vm_identifier) = vm_identifier else {
            continue;
        };
        if let Some(first_row) = vm_rows.get(&vm_identifier) {
            errors.push(RowError::DuplicateVm {
                row: row_no,
                first_row: *first_row,
                vm_identifier,
            });
            continue;
        }
        vm_rows.insert(vm_identifier.clone(), row_no);

        if let Some(slot) = slot {
            blueprints[slot].vms.push(BlueprintVm {
                vm_identifier,
                vm_name,
                row: row_no,
            });
        }
    }

    if errors.is_empty() {
        debug!("Loaded {} VPG blueprints", blueprints.len());
        Ok(blueprints)
    } else {
        errors.sort_by_key(RowError::row);
        Err(errors)
    }
}

fn parse_vpg(cells: &mut Cells<'_>, name: &str) -> Option<VpgBlueprint> {
    let before = cells.errors.len();
    let blueprint = VpgBlueprint {
        name: name.to_string(),
        vpg_type: cells.text(VPG_TYPE).unwrap_or_default(),
        rpo_seconds: cells.number(RPO).unwrap_or_default(),
        test_interval_minutes: cells.number(TEST_INTERVAL).unwrap_or_default(),
        journal_history_hours: cells.number(JOURNAL_HISTORY).unwrap_or_default(),
        priority: cells.text(PRIORITY).unwrap_or_default(),
        use_wan_compression: cells.switch(WAN_COMPRESSION).unwrap_or_default(),
        protected_site: cells.text(PROTECTED_SITE).unwrap_or_default(),
        recovery_site: cells.text(RECOVERY_SITE).unwrap_or_default(),
        journal_datastore: cells.text(JOURNAL_DATASTORE).unwrap_or_default(),
        journal_hard_limit_mb: cells.number(JOURNAL_HARD_LIMIT).unwrap_or_default(),
        journal_warning_threshold_mb: cells.number(JOURNAL_WARNING).unwrap_or_default(),
        recovery_host_cluster: cells.text(RECOVERY_HOST_CLUSTER).unwrap_or_default(),
        recovery_datastore: cells.text(RECOVERY_DATASTORE).unwrap_or_default(),
        recovery_folder: cells.text(RECOVERY_FOLDER).unwrap_or_default(),
        failover_network: cells.text(FAILOVER_NETWORK).unwrap_or_default(),
        test_network: cells.text(TEST_NETWORK).unwrap_or_default(),
        vms: Vec::new(),
    };
    (cells.errors.len() == before).then_some(blueprint)
}

/// Typed cell access for one row, collecting problems
struct Cells<'a> {
    row_no: usize,
    row: &'a TabularRow,
    errors: &'a mut Vec<RowError>,
}

impl Cells<'_> {
    fn text(&mut self, column: &str) -> Option<String> {
        let value = self.row.get(column).and_then(normalize_cell);
        if value.is_none() {
            let reason = if self.row.contains(column) {
                "value is empty"
            } else {
                "missing required column"
            };
            self.errors.push(RowError::malformed(self.row_no, column, reason));
        }
        value
    }

    fn number(&mut self, column: &str) -> Option<u64> {
        let text = self.text(column)?;
        let parsed = text.parse().ok();
        if parsed.is_none() {
            self.errors.push(RowError::malformed(
                self.row_no,
                column,
                format!("expected a whole number, found '{}'", text),
            ));
        }
        parsed
    }

    fn switch(&mut self, column: &str) -> Option<bool> {
        let text = self.text(column)?;
        match text.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => {
                self.errors.push(RowError::malformed(
                    self.row_no,
                    column,
                    format!("expected 'true' or 'false', found '{}'", text),
                ));
                None
            }
        }
    }
}

/// Result of adding one VM to a new VPG
#[derive(Debug)]
pub struct VmOutcome {
    pub vm_identifier: String,
    /// Terminal task result, or the error that stopped the submission
    pub result: Result<TaskResult>,
}

impl VmOutcome {
    pub fn is_success(&self) -> bool {
        matches!(&self.result, Ok(result) if result.is_success())
    }
}

/// What happened to one blueprint
#[derive(Debug)]
pub struct CreationReport {
    pub vpg_name: String,
    /// Tracked result of the creation commit
    pub creation: TaskResult,
    /// Identifier of the created VPG, once resolved
    pub vpg_identifier: Option<String>,
    /// One outcome per blueprint VM, in order
    pub vms: Vec<VmOutcome>,
    /// The VPG was deleted again because a VM could not be added
    pub rolled_back: bool,
}

impl CreationReport {
    /// VPG created and every VM added
    pub fn is_success(&self) -> bool {
        self.creation.is_success() && !self.rolled_back && self.vms.iter().all(VmOutcome::is_success)
    }
}

/// Per-blueprint outcome of a batch creation
#[derive(Debug)]
pub struct CreationOutcome {
    pub vpg_name: String,
    pub result: Result<CreationReport>,
}

/// A planned change of VPG journal history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalChange {
    pub vpg_identifier: String,
    /// Current history, when the settings carry one
    pub from: Option<u64>,
    /// Requested history in hours
    pub to: u64,
}

impl fmt::Display for JournalChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.from {
            Some(from) => write!(
                f,
                "VPG {}: journal history {}h -> {}h",
                self.vpg_identifier, from, self.to
            ),
            None => write!(f, "VPG {}: journal history unset -> {}h", self.vpg_identifier, self.to),
        }
    }
}

/// Creates VPGs and edits VPG-level settings, tracking every task
pub struct VpgProvisioner {
    transport: Arc<dyn Transport>,
    editor: SettingsEditor,
    fetcher: CurrentStateFetcher,
    tracker: TaskTracker,
}

impl VpgProvisioner {
    /// Create a provisioner with a default tracker over the same transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            editor: SettingsEditor::new(Arc::clone(&transport)),
            fetcher: CurrentStateFetcher::new(Arc::clone(&transport)),
            tracker: TaskTracker::new(Arc::clone(&transport)),
            transport,
        }
    }

    /// Use a preconfigured tracker (e.g. one reporting events)
    pub fn with_tracker(mut self, tracker: TaskTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Check that no blueprint names an existing VPG
    ///
    /// # Errors
    ///
    /// `Error::VpgExists` for the first name already on the manager.
    pub async fn preflight(&self, session: &Session, blueprints: &[VpgBlueprint]) -> Result<()> {
        for blueprint in blueprints {
            match self.fetcher.resolve_identifier(session, &blueprint.name).await {
                Ok(identifier) => {
                    error!("VPG {} already exists as {}", blueprint.name, identifier);
                    return Err(Error::VpgExists(blueprint.name.clone()));
                }
                Err(Error::VpgNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Create every blueprint in order
    ///
    /// `confirm` sees all blueprints after the preflight passed and before
    /// anything is created. A failing blueprint does not stop the batch.
    ///
    /// # Returns
    ///
    /// - `Ok(vec![])`: Nothing to do, declined, or dry run
    /// - `Ok(outcomes)`: One outcome per blueprint, in order
    /// - `Err(_)`: Invalid options or the preflight failed
    pub async fn create_all<F>(
        &self,
        session: &Session,
        blueprints: &[VpgBlueprint],
        options: &ApplyOptions,
        confirm: F,
    ) -> Result<Vec<CreationOutcome>>
    where
        F: FnOnce(&[VpgBlueprint]) -> bool,
    {
        if blueprints.is_empty() {
            info!("No VPGs to create");
            return Ok(Vec::new());
        }

        options.track.validate()?;
        self.preflight(session, blueprints).await?;

        if !confirm(blueprints) {
            info!("VPG creation declined, nothing submitted");
            return Ok(Vec::new());
        }

        if options.dry_run {
            for blueprint in blueprints {
                info!(
                    "[dry-run] would create VPG {} with {} VM(s)",
                    blueprint.name,
                    blueprint.vms.len()
                );
            }
            return Ok(Vec::new());
        }

        let mut outcomes = Vec::with_capacity(blueprints.len());
        for blueprint in blueprints {
            let result = self.create(session, blueprint, &options.track).await;
            if let Err(e) = &result {
                error!("VPG {}: creation failed: {}", blueprint.name, e);
            }
            outcomes.push(CreationOutcome {
                vpg_name: blueprint.name.clone(),
                result,
            });
        }
        Ok(outcomes)
    }

    /// Create one VPG, add its VMs, and delete it again if a VM fails
    pub async fn create(
        &self,
        session: &Session,
        blueprint: &VpgBlueprint,
        track: &TrackOptions,
    ) -> Result<CreationReport> {
        info!("Creating VPG {}", blueprint.name);
        let settings_id = self.editor.open(session, &blueprint.settings_document()).await?;
        let handle = match self.editor.commit(session, &settings_id).await {
            Ok(handle) => handle,
            Err(e) => {
                self.editor.discard(session, &settings_id).await;
                return Err(e);
            }
        };

        let creation = self.tracker.track(session, &handle, track).await?;
        if !creation.is_success() {
            warn!("VPG {}: creation did not complete ({})", blueprint.name, creation);
            return Ok(CreationReport {
                vpg_name: blueprint.name.clone(),
                creation,
                vpg_identifier: None,
                vms: Vec::new(),
                rolled_back: false,
            });
        }

        let vpg_identifier = self.fetcher.resolve_identifier(session, &blueprint.name).await?;
        info!("VPG {} created as {}", blueprint.name, vpg_identifier);

        let mut vms = Vec::with_capacity(blueprint.vms.len());
        for vm in &blueprint.vms {
            let result = self.add_vm(session, &vpg_identifier, blueprint, vm, track).await;
            match &result {
                Ok(task) if task.is_success() => {
                    info!("VPG {}: added VM {}", blueprint.name, vm.vm_identifier)
                }
                Ok(task) => warn!("VPG {}: VM {} not added ({})", blueprint.name, vm.vm_identifier, task),
                Err(e) => warn!("VPG {}: VM {} not added: {}", blueprint.name, vm.vm_identifier, e),
            }
            vms.push(VmOutcome {
                vm_identifier: vm.vm_identifier.clone(),
                result,
            });
        }

        let rolled_back = if vms.iter().all(VmOutcome::is_success) {
            false
        } else {
            error!("VPG {}: some VMs could not be added, deleting the VPG", blueprint.name);
            self.delete_vpg(session, &vpg_identifier).await
        };

        Ok(CreationReport {
            vpg_name: blueprint.name.clone(),
            creation,
            vpg_identifier: Some(vpg_identifier),
            vms,
            rolled_back,
        })
    }

    async fn add_vm(
        &self,
        session: &Session,
        vpg_identifier: &str,
        blueprint: &VpgBlueprint,
        vm: &BlueprintVm,
        track: &TrackOptions,
    ) -> Result<TaskResult> {
        let settings_id = self.editor.open_existing(session, vpg_identifier).await?;
        let submitted = async {
            self.editor
                .post(session, &settings_id, "vms", &blueprint.vm_document(vm))
                .await?;
            self.editor.commit(session, &settings_id).await
        }
        .await;

        let handle = match submitted {
            Ok(handle) => handle,
            Err(e) => {
                self.editor.discard(session, &settings_id).await;
                return Err(e);
            }
        };
        self.tracker.track(session, &handle, track).await
    }

    /// Best-effort deletion; reports whether the manager accepted it
    async fn delete_vpg(&self, session: &Session, vpg_identifier: &str) -> bool {
        let path = format!("/v1/vpgs/{}", vpg_identifier);
        match self.transport.request(session, Method::Delete, &path, None).await {
            Ok(_) => {
                info!("Deleted VPG {}", vpg_identifier);
                true
            }
            Err(e) => {
                error!("Failed to delete VPG {}: {}", vpg_identifier, e);
                false
            }
        }
    }

    /// Read the current journal history and plan a change to `hours`
    ///
    /// Only reads from the manager.
    ///
    /// # Returns
    ///
    /// - `Ok(None)`: The VPG already keeps `hours` of history
    /// - `Ok(Some(change))`: What `set_journal_history` would do
    pub async fn plan_journal_history(
        &self,
        session: &Session,
        vpg_identifier: &str,
        hours: u64,
    ) -> Result<Option<JournalChange>> {
        if hours == 0 {
            return Err(Error::config("journal history must be at least one hour"));
        }

        let document = self.fetcher.fetch_document(session, vpg_identifier).await?;
        let from = settings::journal_history_hours(&document);
        if from == Some(hours) {
            info!("VPG {}: journal history already {}h", vpg_identifier, hours);
            return Ok(None);
        }

        Ok(Some(JournalChange {
            vpg_identifier: vpg_identifier.to_string(),
            from,
            to: hours,
        }))
    }

    /// Commit a planned journal history change and track it
    ///
    /// # Returns
    ///
    /// - `Ok(None)`: Declined or dry run
    /// - `Ok(Some(result))`: Terminal result of the commit
    pub async fn set_journal_history<F>(
        &self,
        session: &Session,
        change: &JournalChange,
        options: &ApplyOptions,
        confirm: F,
    ) -> Result<Option<TaskResult>>
    where
        F: FnOnce(&JournalChange) -> bool,
    {
        options.track.validate()?;

        if !confirm(change) {
            info!("{}: declined, nothing submitted", change);
            return Ok(None);
        }
        if options.dry_run {
            info!("[dry-run] {}", change);
            return Ok(None);
        }

        let handle = self
            .editor
            .edit(session, &change.vpg_identifier, |document| {
                settings::set_journal_history_hours(document, change.to);
                Ok(true)
            })
            .await?
            .ok_or_else(|| Error::invalid_response("settings edit ended without a commit"))?;

        let result = self.tracker.track(session, &handle, &options.track).await?;
        if result.is_success() {
            info!("{}: committed ({})", change, result);
        } else {
            warn!("{}: commit did not complete ({})", change, result);
        }
        Ok(Some(result))
    }
}
