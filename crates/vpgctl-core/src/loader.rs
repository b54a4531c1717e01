//! Desired-state loader
//!
//! Turns operator-edited table rows into [`NicConfiguration`] records.
//! Every row is checked and every problem is reported together, so one bad
//! cell never hides another. Row numbers in errors are 1-based data rows
//! (the header is not counted).

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tracing::debug;

use crate::model::{
    AddressingMode, NetworkPhase, NicConfiguration, NicIdentity, PhaseField, PhaseSettings,
    normalize_cell,
};

/// Column holding the owning VPG name (optional)
pub const VPG_NAME_COLUMN: &str = "VPG Name";
/// Column holding the VM identifier
pub const VM_IDENTIFIER_COLUMN: &str = "VM Identifier";
/// Column holding the NIC identifier
pub const NIC_IDENTIFIER_COLUMN: &str = "NIC Identifier";

const VM_IDENTIFIER_ALIASES: [&str; 2] = [VM_IDENTIFIER_COLUMN, "VM Name"];

/// One table row: column name → cell text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabularRow {
    cells: BTreeMap<String, String>,
}

impl TabularRow {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cell, builder style
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(column, value);
        self
    }

    /// Set a cell
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.cells.insert(column.into().trim().to_string(), value.into());
    }

    /// Raw cell text
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    /// Whether the row carries the column at all
    pub fn contains(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    /// Column names present in the row
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    /// First present column among `names`, with its cell text
    fn lookup<'a>(&'a self, names: &[String]) -> Option<&'a str> {
        names.iter().find_map(|name| self.get(name))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TabularRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = TabularRow::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}

/// Problem with one input row
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// Missing required column, empty identifier or unparsable flag
    #[error("Row {row}, column '{column}': {reason}")]
    MalformedRow {
        /// 1-based data row number
        row: usize,
        /// Canonical column name
        column: String,
        /// What is wrong with the cell
        reason: String,
    },

    /// The same VM/NIC appears twice
    #[error("Row {row}: duplicate target {identity} (first seen in row {first_row})")]
    DuplicateTarget {
        /// 1-based data row number of the duplicate
        row: usize,
        /// Row where the target first appeared
        first_row: usize,
        /// The repeated VM/NIC
        identity: NicIdentity,
    },

    /// The same VM is listed under two VPG blueprints
    #[error("Row {row}: VM {vm_identifier} already listed in row {first_row}")]
    DuplicateVm {
        /// 1-based data row number of the duplicate
        row: usize,
        /// Row where the VM first appeared
        first_row: usize,
        /// The repeated VM
        vm_identifier: String,
    },
}

impl RowError {
    pub(crate) fn malformed(row: usize, column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRow {
            row,
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Row the error refers to
    pub fn row(&self) -> usize {
        match self {
            RowError::MalformedRow { row, .. }
            | RowError::DuplicateTarget { row, .. }
            | RowError::DuplicateVm { row, .. } => *row,
        }
    }
}

/// Load desired NIC configurations from table rows
///
/// Output order matches input order, so the n-th configuration came from
/// data row n.
///
/// # Returns
///
/// - `Ok(configs)`: Every row parsed and no target repeats
/// - `Err(errors)`: All row errors, in row order
pub fn load(rows: &[TabularRow]) -> Result<Vec<NicConfiguration>, Vec<RowError>> {
    let mut configs = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();
    let mut first_seen: HashMap<NicIdentity, usize> = HashMap::new();

    for (index, row) in rows.iter().enumerate() {
        let row_no = index + 1;
        let Some(config) = parse_row(row_no, row, &mut errors) else {
            continue;
        };

        if let Some(first_row) = first_seen.get(&config.identity) {
            errors.push(RowError::DuplicateTarget {
                row: row_no,
                first_row: *first_row,
                identity: config.identity.clone(),
            });
            continue;
        }

        first_seen.insert(config.identity.clone(), row_no);
        configs.push(config);
    }

    if errors.is_empty() {
        debug!("Loaded {} desired NIC configurations", configs.len());
        Ok(configs)
    } else {
        Err(errors)
    }
}

/// Parse one row, appending its problems to `errors`
fn parse_row(
    row_no: usize,
    row: &TabularRow,
    errors: &mut Vec<RowError>,
) -> Option<NicConfiguration> {
    let before = errors.len();

    let vm_identifier = required_text(
        row_no,
        row,
        VM_IDENTIFIER_COLUMN,
        &aliases(&VM_IDENTIFIER_ALIASES),
        errors,
    );
    let nic_identifier = required_text(
        row_no,
        row,
        NIC_IDENTIFIER_COLUMN,
        &aliases(&[NIC_IDENTIFIER_COLUMN]),
        errors,
    );

    let failover = parse_phase(row_no, row, NetworkPhase::Failover, errors);
    let test = parse_phase(row_no, row, NetworkPhase::Test, errors);

    if errors.len() > before {
        return None;
    }

    let (vm_identifier, nic_identifier) = (vm_identifier?, nic_identifier?);
    Some(NicConfiguration {
        vpg_name: row.get(VPG_NAME_COLUMN).and_then(normalize_cell),
        identity: NicIdentity::new(vm_identifier, nic_identifier),
        failover,
        test,
    })
}

fn parse_phase(
    row_no: usize,
    row: &TabularRow,
    phase: NetworkPhase,
    errors: &mut Vec<RowError>,
) -> PhaseSettings {
    let should_replace_ip = required_flag(row_no, row, phase, PhaseField::ShouldReplaceIp, errors);
    let dhcp = required_flag(row_no, row, phase, PhaseField::Dhcp, errors);
    let optional = |field| row.lookup(&phase_columns(phase, field)).and_then(normalize_cell);

    PhaseSettings {
        network_identifier: optional(PhaseField::Network),
        should_replace_ip: should_replace_ip.unwrap_or(false),
        mode: AddressingMode::from_dhcp(dhcp.unwrap_or(false)),
        ip: optional(PhaseField::Ip),
        subnet: optional(PhaseField::Subnet),
        gateway: optional(PhaseField::Gateway),
        dns1: optional(PhaseField::Dns1),
        dns2: optional(PhaseField::Dns2),
    }
}

fn required_text(
    row_no: usize,
    row: &TabularRow,
    column: &str,
    names: &[String],
    errors: &mut Vec<RowError>,
) -> Option<String> {
    match row.lookup(names) {
        None => {
            errors.push(RowError::malformed(row_no, column, "missing required column"));
            None
        }
        Some(cell) => {
            let value = normalize_cell(cell);
            if value.is_none() {
                errors.push(RowError::malformed(row_no, column, "identifier is empty"));
            }
            value
        }
    }
}

fn required_flag(
    row_no: usize,
    row: &TabularRow,
    phase: NetworkPhase,
    field: PhaseField,
    errors: &mut Vec<RowError>,
) -> Option<bool> {
    let column = field.column(phase);
    match row.lookup(&phase_columns(phase, field)) {
        None => {
            errors.push(RowError::malformed(row_no, column, "missing required column"));
            None
        }
        Some(cell) => {
            let parsed = parse_flag(cell);
            if parsed.is_none() {
                errors.push(RowError::malformed(
                    row_no,
                    column,
                    format!("expected 'True' or 'False', found '{}'", cell.trim()),
                ));
            }
            parsed
        }
    }
}

/// Parse a boolean cell: exactly `True` or `False`
pub fn parse_flag(cell: &str) -> Option<bool> {
    match cell.trim() {
        "True" => Some(true),
        "False" => Some(false),
        _ => None,
    }
}

/// Accepted spellings of a phase column, canonical first
fn phase_columns(phase: NetworkPhase, field: PhaseField) -> Vec<String> {
    let prefixes: &[&str] = match phase {
        NetworkPhase::Failover => &["Failover"],
        NetworkPhase::Test => &["Failover Test", "Test"],
    };
    let suffixes: &[&str] = match field {
        PhaseField::Dns1 => &["DNS1", "DNS"],
        other => &[other.suffix()],
    };

    prefixes
        .iter()
        .flat_map(|prefix| suffixes.iter().map(move |suffix| format!("{} {}", prefix, suffix)))
        .collect()
}

fn aliases(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_row(vm: &str, nic: &str) -> TabularRow {
        TabularRow::new()
            .with("VM Identifier", vm)
            .with("NIC Identifier", nic)
            .with("Failover ShouldReplaceIpConfiguration", "False")
            .with("Failover DHCP", "False")
            .with("Failover Test ShouldReplaceIpConfiguration", "False")
            .with("Failover Test DHCP", "False")
    }

    #[test]
    fn flags_are_case_sensitive() {
        assert_eq!(parse_flag("True"), Some(true));
        assert_eq!(parse_flag(" False "), Some(false));
        assert_eq!(parse_flag("true"), None);
        assert_eq!(parse_flag("yes"), None);
        assert_eq!(parse_flag(""), None);
    }

    #[test]
    fn short_column_spellings_are_accepted() {
        let row = TabularRow::new()
            .with("VM Name", "vm1")
            .with("NIC Identifier", "0")
            .with("Failover ShouldReplaceIpConfiguration", "True")
            .with("Failover DHCP", "False")
            .with("Failover IP", "10.0.0.5")
            .with("Failover Subnet", "255.255.255.0")
            .with("Failover DNS", "10.0.0.53")
            .with("Test ShouldReplaceIpConfiguration", "False")
            .with("Test DHCP", "True");

        let configs = load(&[row]).unwrap();
        assert_eq!(configs[0].identity, NicIdentity::new("vm1", "0"));
        assert_eq!(configs[0].failover.dns1.as_deref(), Some("10.0.0.53"));
        assert!(configs[0].test.mode.is_dhcp());
    }

    #[test]
    fn placeholder_cells_are_absent() {
        let row = minimal_row("vm1", "0")
            .with("VPG Name", "  ")
            .with("Failover Gateway", "None");
        let configs = load(&[row]).unwrap();
        assert_eq!(configs[0].vpg_name, None);
        assert_eq!(configs[0].failover.gateway, None);
    }

    #[test]
    fn phase_columns_list_canonical_first() {
        let columns = phase_columns(NetworkPhase::Test, PhaseField::Dns1);
        assert_eq!(columns[0], "Failover Test DNS1");
        assert!(columns.contains(&"Test DNS".to_string()));
    }

    #[test]
    fn row_error_reports_row_number() {
        let err = RowError::malformed(4, "Failover DHCP", "bad");
        assert_eq!(err.row(), 4);
        assert!(err.to_string().contains("Failover DHCP"));
    }
}
