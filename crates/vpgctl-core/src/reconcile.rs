//! Reconciliation of desired against current NIC settings
//!
//! For every desired record:
//!
//! 1. Locate the current record with the same VM/NIC, or report
//!    [`ValidationError::TargetNotFound`].
//! 2. Check each phase: DHCP excludes every static field, flag or not. A
//!    phase whose `should_replace_ip` is set with static addressing needs an
//!    IP and a subnet.
//! 3. Merge the desired values onto a copy of the current record.
//! 4. Emit a [`ChangeEntry`] only when the merged record differs.
//!
//! A violation excludes its own record and nothing else. An empty change-set
//! without violations means there is nothing to do.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tracing::{debug, info};

use crate::model::{NetworkPhase, NicConfiguration, NicIdentity, PhaseField, PhaseSettings};

/// A desired record that cannot be applied
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The VM/NIC does not exist in the VPG
    #[error("Row {row}: {identity} not found in the VPG")]
    TargetNotFound {
        /// Requested VM/NIC
        identity: NicIdentity,
        /// 1-based desired row
        row: usize,
    },

    /// DHCP requested together with static values
    #[error("Row {row}: {identity}: {phase} DHCP cannot be combined with static IP settings")]
    DhcpWithStaticFields {
        /// Offending VM/NIC
        identity: NicIdentity,
        /// Offending phase
        phase: NetworkPhase,
        /// 1-based desired row
        row: usize,
    },

    /// Static addressing without a required value
    #[error("Row {row}: {identity}: static addressing requires '{}'", column_name(.field, .phase))]
    MissingStaticField {
        /// Offending VM/NIC
        identity: NicIdentity,
        /// Offending phase
        phase: NetworkPhase,
        /// The missing field (IP or subnet)
        field: PhaseField,
        /// 1-based desired row
        row: usize,
    },
}

fn column_name(field: &PhaseField, phase: &NetworkPhase) -> String {
    field.column(*phase)
}

impl ValidationError {
    /// Row the violation refers to
    pub fn row(&self) -> usize {
        match self {
            ValidationError::TargetNotFound { row, .. }
            | ValidationError::DhcpWithStaticFields { row, .. }
            | ValidationError::MissingStaticField { row, .. } => *row,
        }
    }

    /// VM/NIC the violation refers to
    pub fn identity(&self) -> &NicIdentity {
        match self {
            ValidationError::TargetNotFound { identity, .. }
            | ValidationError::DhcpWithStaticFields { identity, .. }
            | ValidationError::MissingStaticField { identity, .. } => identity,
        }
    }
}

/// One field that differs between `from` and `to`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    /// Phase of the field
    pub phase: NetworkPhase,
    /// The field
    pub field: PhaseField,
    /// Current value
    pub before: Option<String>,
    /// Value after the update
    pub after: Option<String>,
}

impl FieldChange {
    /// Column name of the field, e.g. `Failover Test IP`
    pub fn column(&self) -> String {
        self.field.column(self.phase)
    }
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.column(),
            self.before.as_deref().unwrap_or("None"),
            self.after.as_deref().unwrap_or("None")
        )
    }
}

/// A NIC whose settings will change
///
/// `to` is the complete record to write, not a delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    /// VM/NIC being updated
    pub target: NicIdentity,
    /// Current record
    pub from: NicConfiguration,
    /// Complete merged record
    pub to: NicConfiguration,
    /// 1-based desired row that produced the entry
    pub row: Option<usize>,
}

impl ChangeEntry {
    /// Field-level differences, in column order
    pub fn field_changes(&self) -> Vec<FieldChange> {
        NetworkPhase::ALL
            .iter()
            .flat_map(|phase| PhaseField::ALL.iter().map(move |field| (*phase, *field)))
            .filter_map(|(phase, field)| {
                let before = self.from.phase(phase).value(field);
                let after = self.to.phase(phase).value(field);
                (before != after).then_some(FieldChange {
                    phase,
                    field,
                    before,
                    after,
                })
            })
            .collect()
    }
}

/// Ordered set of NIC updates for one VPG
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// VPG the entries belong to, when known
    pub vpg_identifier: Option<String>,
    /// Entries in desired-row order
    pub entries: Vec<ChangeEntry>,
}

impl ChangeSet {
    /// Whether there is nothing to apply
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of NICs to update
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Human-readable description of the pending changes
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "No changes needed".to_string();
        }

        let mut lines = vec![format!(
            "{} NIC(s) to update{}:",
            self.entries.len(),
            self.vpg_identifier
                .as_ref()
                .map(|vpg| format!(" in VPG {}", vpg))
                .unwrap_or_default()
        )];
        for entry in &self.entries {
            lines.push(format!("  {}:", entry.target));
            for change in entry.field_changes() {
                lines.push(format!("    {}", change));
            }
        }
        lines.join("\n")
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Outcome of reconciling one VPG
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Changes that passed validation
    pub change_set: ChangeSet,
    /// Records excluded from the change-set
    pub violations: Vec<ValidationError>,
}

impl Reconciliation {
    /// No changes and no violations
    pub fn is_noop(&self) -> bool {
        self.change_set.is_empty() && self.violations.is_empty()
    }
}

/// Reconcile desired records against the current VPG state
///
/// `desired` is expected in loader order: the n-th record is reported as
/// row n. The returned change-set names the VPG of the current records.
pub fn reconcile(desired: &[NicConfiguration], current: &[NicConfiguration]) -> Reconciliation {
    reconcile_rows(
        desired.iter().enumerate().map(|(index, config)| (index + 1, config)),
        current,
    )
}

/// Reconcile desired records that carry their own row numbers
///
/// Used when the loaded rows are split across several VPGs.
pub fn reconcile_rows<'a>(
    desired: impl IntoIterator<Item = (usize, &'a NicConfiguration)>,
    current: &[NicConfiguration],
) -> Reconciliation {
    let by_identity: HashMap<&NicIdentity, &NicConfiguration> =
        current.iter().map(|config| (&config.identity, config)).collect();

    let mut reconciliation = Reconciliation {
        change_set: ChangeSet {
            vpg_identifier: current.iter().find_map(|config| config.vpg_name.clone()),
            entries: Vec::new(),
        },
        violations: Vec::new(),
    };

    let mut considered = 0usize;
    for (row, wanted) in desired {
        considered += 1;

        let Some(existing) = by_identity.get(&wanted.identity) else {
            reconciliation.violations.push(ValidationError::TargetNotFound {
                identity: wanted.identity.clone(),
                row,
            });
            continue;
        };

        let violations = validate(wanted, row);
        if !violations.is_empty() {
            debug!(
                "Row {}: {} rejected with {} violation(s)",
                row,
                wanted.identity,
                violations.len()
            );
            reconciliation.violations.extend(violations);
            continue;
        }

        let merged = merge(wanted, existing);
        if &merged == *existing {
            debug!("Row {}: {} already up to date", row, wanted.identity);
            continue;
        }

        reconciliation.change_set.entries.push(ChangeEntry {
            target: wanted.identity.clone(),
            from: (*existing).clone(),
            to: merged,
            row: Some(row),
        });
    }

    info!(
        "Reconciled {} desired records: {} change(s), {} violation(s)",
        considered,
        reconciliation.change_set.len(),
        reconciliation.violations.len()
    );
    reconciliation
}

/// Check the internal consistency of a desired record
fn validate(wanted: &NicConfiguration, row: usize) -> Vec<ValidationError> {
    let mut violations = Vec::new();

    for phase in NetworkPhase::ALL {
        let settings = wanted.phase(phase);

        // Contradictory cells are rejected even when the flag is off
        if settings.mode.is_dhcp() && settings.has_static_fields() {
            violations.push(ValidationError::DhcpWithStaticFields {
                identity: wanted.identity.clone(),
                phase,
                row,
            });
            continue;
        }

        if !settings.should_replace_ip || settings.mode.is_dhcp() {
            continue;
        }

        let required = [
            (PhaseField::Ip, &settings.ip),
            (PhaseField::Subnet, &settings.subnet),
        ];
        for (field, value) in required {
            if value.is_none() {
                violations.push(ValidationError::MissingStaticField {
                    identity: wanted.identity.clone(),
                    phase,
                    field,
                    row,
                });
            }
        }
    }

    violations
}

/// Desired values laid over a copy of the current record
fn merge(wanted: &NicConfiguration, existing: &NicConfiguration) -> NicConfiguration {
    let mut merged = existing.clone();
    for phase in NetworkPhase::ALL {
        merge_phase(wanted.phase(phase), merged.phase_mut(phase));
    }
    merged
}

fn merge_phase(wanted: &PhaseSettings, target: &mut PhaseSettings) {
    if let Some(network) = &wanted.network_identifier {
        target.network_identifier = Some(network.clone());
    }
    target.should_replace_ip = wanted.should_replace_ip;

    // Without the flag the IP block is not ours to change
    if !wanted.should_replace_ip {
        return;
    }

    target.mode = wanted.mode;
    if wanted.mode.is_dhcp() {
        target.clear_static_fields();
    } else {
        target.ip = wanted.ip.clone();
        target.subnet = wanted.subnet.clone();
        target.gateway = wanted.gateway.clone();
        target.dns1 = wanted.dns1.clone();
        target.dns2 = wanted.dns2.clone();
    }
}
