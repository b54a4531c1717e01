//! Architectural Contract Test: Minimal, Validated Change-Sets
//!
//! This test verifies that reconciliation only proposes changes that are
//! both wanted and valid, and that every proposed record is complete.
//!
//! Constraints verified:
//! - should_replace_ip == false means "no IP change requested"
//! - DHCP and static fields are mutually exclusive whatever the flag says;
//!   static needs IP and subnet
//! - A violation excludes only its own record
//! - Change entries carry complete merged records (untouched fields keep
//!   their current values)
//! - Reconciling a desired state against its own result yields no changes
//!
//! If this test fails, someone has started sending partial records or
//! letting invalid input reach the manager.

mod common;

use common::*;
use vpgctl_core::{
    NetworkPhase, NicConfiguration, NicIdentity, PhaseField, PhaseSettings, ValidationError, load,
    reconcile, reconcile_rows,
};

fn current_dhcp(vm: &str, nic: &str) -> NicConfiguration {
    NicConfiguration::new(vm, nic)
        .with_vpg_name("Finance")
        .with_phase(NetworkPhase::Failover, PhaseSettings::dhcp().with_network("net-prod"))
        .with_phase(NetworkPhase::Test, PhaseSettings::default().with_network("net-bubble"))
}

#[test]
fn static_over_dhcp_produces_one_complete_entry() {
    let rows = vec![
        desired_row("vm1", "0")
            .with("Failover ShouldReplaceIpConfiguration", "True")
            .with("Failover DHCP", "False")
            .with("Failover IP", "10.0.0.5")
            .with("Failover Subnet", "255.255.255.0")
            .with("Failover Gateway", "10.0.0.1"),
    ];
    let desired = load(&rows).unwrap();
    let current = vec![current_dhcp("vm1", "0")];

    let reconciliation = reconcile(&desired, &current);

    assert!(reconciliation.violations.is_empty());
    assert_eq!(reconciliation.change_set.len(), 1);

    let entry = &reconciliation.change_set.entries[0];
    assert_eq!(entry.target, NicIdentity::new("vm1", "0"));
    assert_eq!(entry.row, Some(1));

    let changed: Vec<String> = entry.field_changes().iter().map(|c| c.column()).collect();
    assert_eq!(
        changed,
        vec!["Failover DHCP", "Failover IP", "Failover Subnet", "Failover Gateway"]
    );

    // Untouched fields keep their current values
    assert_eq!(entry.to.failover.network_identifier.as_deref(), Some("net-prod"));
    assert_eq!(entry.to.test, current[0].test);
    assert_eq!(entry.to.vpg_name.as_deref(), Some("Finance"));
}

#[test]
fn flag_off_means_no_ip_change() {
    let mut current = current_dhcp("vm1", "0");
    current.failover.should_replace_ip = false;

    // Static cells alone are ignored while the flag is off
    let rows = vec![
        desired_row("vm1", "0")
            .with("Failover DHCP", "False")
            .with("Failover IP", "10.9.9.9")
            .with("Failover Gateway", "10.9.9.1"),
    ];
    let desired = load(&rows).unwrap();

    let reconciliation = reconcile(&desired, &[current]);

    assert!(reconciliation.is_noop(), "{:?}", reconciliation);
}

#[test]
fn dhcp_with_static_ip_is_rejected_even_with_flag_off() {
    let mut current = current_dhcp("vm1", "0");
    current.failover.should_replace_ip = false;

    let rows = vec![
        desired_row("vm1", "0")
            .with("Failover ShouldReplaceIpConfiguration", "False")
            .with("Failover DHCP", "True")
            .with("Failover IP", "10.0.0.5"),
    ];
    let desired = load(&rows).unwrap();

    let reconciliation = reconcile(&desired, &[current]);

    assert!(reconciliation.change_set.is_empty());
    assert_eq!(
        reconciliation.violations,
        vec![ValidationError::DhcpWithStaticFields {
            identity: NicIdentity::new("vm1", "0"),
            phase: NetworkPhase::Failover,
            row: 1,
        }]
    );
}

#[test]
fn dhcp_with_static_ip_is_rejected() {
    let rows = vec![
        desired_row("vm1", "0")
            .with("Failover ShouldReplaceIpConfiguration", "True")
            .with("Failover DHCP", "True")
            .with("Failover IP", "10.0.0.5"),
    ];
    let desired = load(&rows).unwrap();

    let reconciliation = reconcile(&desired, &[current_dhcp("vm1", "0")]);

    assert!(reconciliation.change_set.is_empty());
    assert_eq!(
        reconciliation.violations,
        vec![ValidationError::DhcpWithStaticFields {
            identity: NicIdentity::new("vm1", "0"),
            phase: NetworkPhase::Failover,
            row: 1,
        }]
    );
    assert!(reconciliation.violations[0].to_string().contains("DHCP"));
}

#[test]
fn static_without_subnet_is_rejected() {
    let rows = vec![
        desired_row("vm1", "0")
            .with("Failover Test ShouldReplaceIpConfiguration", "True")
            .with("Failover Test DHCP", "False")
            .with("Failover Test IP", "10.0.0.5"),
    ];
    let desired = load(&rows).unwrap();

    let reconciliation = reconcile(&desired, &[current_dhcp("vm1", "0")]);

    assert!(reconciliation.change_set.is_empty());
    assert!(matches!(
        &reconciliation.violations[..],
        [ValidationError::MissingStaticField {
            phase: NetworkPhase::Test,
            field: PhaseField::Subnet,
            row: 1,
            ..
        }]
    ));
}

#[test]
fn violations_do_not_block_other_entries() {
    let rows = vec![
        desired_row("vm1", "0")
            .with("Failover ShouldReplaceIpConfiguration", "True")
            .with("Failover DHCP", "True")
            .with("Failover DNS1", "10.0.0.53"),
        desired_row("vm-missing", "0"),
        desired_row("vm2", "1").with("Failover Network", "net-dr"),
    ];
    let desired = load(&rows).unwrap();
    let current = vec![current_dhcp("vm1", "0"), current_dhcp("vm2", "1")];

    let reconciliation = reconcile(&desired, &current);

    let rows_with_violations: Vec<usize> =
        reconciliation.violations.iter().map(|v| v.row()).collect();
    assert_eq!(rows_with_violations, vec![1, 2]);
    assert!(matches!(
        reconciliation.violations[1],
        ValidationError::TargetNotFound { .. }
    ));

    assert_eq!(reconciliation.change_set.len(), 1);
    let entry = &reconciliation.change_set.entries[0];
    assert_eq!(entry.row, Some(3));
    assert_eq!(entry.to.failover.network_identifier.as_deref(), Some("net-dr"));
}

#[test]
fn reconciling_against_own_result_is_a_noop() {
    let rows = vec![
        desired_row("vm1", "0")
            .with("Failover ShouldReplaceIpConfiguration", "True")
            .with("Failover DHCP", "False")
            .with("Failover IP", "10.0.0.5")
            .with("Failover Subnet", "255.255.255.0")
            .with("Failover Test ShouldReplaceIpConfiguration", "True")
            .with("Failover Test DHCP", "True"),
    ];
    let desired = load(&rows).unwrap();

    let first = reconcile(&desired, &[current_dhcp("vm1", "0")]);
    assert_eq!(first.change_set.len(), 1);

    let applied: Vec<NicConfiguration> =
        first.change_set.entries.iter().map(|e| e.to.clone()).collect();
    let second = reconcile(&desired, &applied);

    assert!(second.is_noop());
    assert_eq!(second.change_set.summary(), "No changes needed");
}

#[test]
fn dhcp_request_clears_current_static_values() {
    let current = NicConfiguration::new("vm1", "0").with_phase(
        NetworkPhase::Failover,
        PhaseSettings::static_ip("10.0.0.5", "255.255.255.0")
            .with_gateway("10.0.0.1")
            .with_dns("10.0.0.53", Some("10.0.0.54".to_string())),
    );
    let rows = vec![
        desired_row("vm1", "0")
            .with("Failover ShouldReplaceIpConfiguration", "True")
            .with("Failover DHCP", "True"),
    ];
    let desired = load(&rows).unwrap();

    let reconciliation = reconcile(&desired, &[current]);
    let entry = &reconciliation.change_set.entries[0];

    assert!(entry.to.failover.mode.is_dhcp());
    assert!(!entry.to.failover.has_static_fields());
    assert_eq!(entry.field_changes().len(), 6);
}

#[test]
fn explicit_row_numbers_are_reported() {
    let desired = vec![NicConfiguration::new("vm-x", "0")];
    let reconciliation = reconcile_rows(desired.iter().map(|c| (42, c)), &[]);
    assert_eq!(reconciliation.violations[0].row(), 42);
}

#[test]
fn summary_lists_field_changes() {
    let rows = vec![desired_row("vm1", "0").with("Failover Network", "net-dr")];
    let desired = load(&rows).unwrap();
    let mut current = current_dhcp("vm1", "0");
    current.failover.should_replace_ip = false;

    let summary = reconcile(&desired, &[current]).change_set.summary();

    assert!(summary.contains("1 NIC(s) to update in VPG Finance"));
    assert!(summary.contains("VM vm1, NIC 0"));
    assert!(summary.contains("Failover Network: net-prod -> net-dr"));
}
