//! Tabular reports
//!
//! - Exported settings: one row per NIC, every field, readable back by
//!   [`crate::loader::load`]
//! - Diff: one row per changed field
//!
//! Absent values are written as empty cells.

use crate::loader::{NIC_IDENTIFIER_COLUMN, TabularRow, VM_IDENTIFIER_COLUMN, VPG_NAME_COLUMN};
use crate::model::{NetworkPhase, NicConfiguration, PhaseField};
use crate::reconcile::ChangeSet;

/// Exported-settings columns, in output order
pub const EXPORT_COLUMNS: [&str; 19] = [
    "VPG Name",
    "VM Identifier",
    "NIC Identifier",
    "Failover Network",
    "Failover ShouldReplaceIpConfiguration",
    "Failover DHCP",
    "Failover IP",
    "Failover Subnet",
    "Failover Gateway",
    "Failover DNS1",
    "Failover DNS2",
    "Failover Test Network",
    "Failover Test ShouldReplaceIpConfiguration",
    "Failover Test DHCP",
    "Failover Test IP",
    "Failover Test Subnet",
    "Failover Test Gateway",
    "Failover Test DNS1",
    "Failover Test DNS2",
];

/// Diff report columns, in output order
pub const DIFF_COLUMNS: [&str; 6] = [
    "VPG Name",
    "VM Identifier",
    "NIC Identifier",
    "Field",
    "Before",
    "After",
];

/// One exported-settings row per NIC record
pub fn export_rows(configs: &[NicConfiguration]) -> Vec<TabularRow> {
    configs
        .iter()
        .map(|config| {
            let mut row = identity_row(config.vpg_name.as_deref(), config);
            for phase in NetworkPhase::ALL {
                for field in PhaseField::ALL {
                    row.insert(
                        field.column(phase),
                        config.phase(phase).value(field).unwrap_or_default(),
                    );
                }
            }
            row
        })
        .collect()
}

/// One diff row per changed field, in entry then column order
pub fn diff_rows(change_set: &ChangeSet) -> Vec<TabularRow> {
    let mut rows = Vec::new();
    for entry in &change_set.entries {
        let vpg_name = entry
            .to
            .vpg_name
            .as_deref()
            .or(change_set.vpg_identifier.as_deref());

        for change in entry.field_changes() {
            rows.push(
                identity_row(vpg_name, &entry.to)
                    .with("Field", change.column())
                    .with("Before", change.before.unwrap_or_default())
                    .with("After", change.after.unwrap_or_default()),
            );
        }
    }
    rows
}

fn identity_row(vpg_name: Option<&str>, config: &NicConfiguration) -> TabularRow {
    TabularRow::new()
        .with(VPG_NAME_COLUMN, vpg_name.unwrap_or_default())
        .with(VM_IDENTIFIER_COLUMN, config.identity.vm_identifier.as_str())
        .with(NIC_IDENTIFIER_COLUMN, config.identity.nic_identifier.as_str())
}
