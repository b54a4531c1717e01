//! Architectural Contract Test: Complete Input Diagnostics
//!
//! This test verifies that the desired-state loader reports every problem
//! in the input at once, with row and column, and never guesses.
//!
//! Constraints verified:
//! - All malformed rows are reported together, in row order
//! - Boolean cells accept only "True" / "False"
//! - Missing required columns are reported per row
//! - Duplicate VM/NIC pairs are rejected, citing the first occurrence
//! - Output order matches input order
//!
//! If this test fails, someone has made the loader fail fast or lenient.

mod common;

use common::*;
use vpgctl_core::loader::RowError;
use vpgctl_core::{NicIdentity, TabularRow, load};

#[test]
fn rows_load_in_input_order() {
    let rows = vec![
        desired_row("vm-b", "1"),
        desired_row("vm-a", "0"),
        desired_row("vm-b", "0"),
    ];

    let configs = load(&rows).unwrap();

    let identities: Vec<NicIdentity> = configs.into_iter().map(|c| c.identity).collect();
    assert_eq!(
        identities,
        vec![
            NicIdentity::new("vm-b", "1"),
            NicIdentity::new("vm-a", "0"),
            NicIdentity::new("vm-b", "0"),
        ]
    );
}

#[test]
fn every_bad_row_is_reported() {
    let rows = vec![
        desired_row("vm1", "0").with("Failover DHCP", "yes"),
        desired_row("vm2", "0"),
        desired_row("vm3", "0")
            .with("NIC Identifier", "  ")
            .with("Failover Test ShouldReplaceIpConfiguration", "true"),
    ];

    let errors = load(&rows).unwrap_err();

    assert_eq!(
        errors,
        vec![
            RowError::MalformedRow {
                row: 1,
                column: "Failover DHCP".to_string(),
                reason: "expected 'True' or 'False', found 'yes'".to_string(),
            },
            RowError::MalformedRow {
                row: 3,
                column: "NIC Identifier".to_string(),
                reason: "identifier is empty".to_string(),
            },
            RowError::MalformedRow {
                row: 3,
                column: "Failover Test ShouldReplaceIpConfiguration".to_string(),
                reason: "expected 'True' or 'False', found 'true'".to_string(),
            },
        ]
    );
}

#[test]
fn missing_required_columns_are_named() {
    let row = TabularRow::new()
        .with("VM Identifier", "vm1")
        .with("NIC Identifier", "0")
        .with("Failover ShouldReplaceIpConfiguration", "True")
        .with("Failover DHCP", "True");

    let errors = load(&[row]).unwrap_err();

    let columns: Vec<String> = errors
        .iter()
        .map(|e| match e {
            RowError::MalformedRow { column, .. } => column.clone(),
            other => panic!("Unexpected error {:?}", other),
        })
        .collect();
    assert_eq!(
        columns,
        vec![
            "Failover Test ShouldReplaceIpConfiguration",
            "Failover Test DHCP"
        ]
    );
}

#[test]
fn duplicate_targets_cite_first_row() {
    let rows = vec![
        desired_row("vm1", "0"),
        desired_row("vm2", "0"),
        desired_row("vm1", "0").with("Failover Network", "net-dr"),
    ];

    let errors = load(&rows).unwrap_err();

    assert_eq!(
        errors,
        vec![RowError::DuplicateTarget {
            row: 3,
            first_row: 1,
            identity: NicIdentity::new("vm1", "0"),
        }]
    );
    assert!(errors[0].to_string().contains("first seen in row 1"));
}

#[test]
fn placeholder_cells_are_treated_as_absent() {
    let rows = vec![
        desired_row("vm1", "0")
            .with("Failover ShouldReplaceIpConfiguration", "True")
            .with("Failover IP", "10.0.0.5")
            .with("Failover Subnet", "255.255.255.0")
            .with("Failover Gateway", "None")
            .with("Failover DNS2", "null"),
    ];

    let configs = load(&rows).unwrap();
    let failover = &configs[0].failover;

    assert_eq!(failover.ip.as_deref(), Some("10.0.0.5"));
    assert_eq!(failover.gateway, None);
    assert_eq!(failover.dns2, None);
    assert_eq!(configs[0].vpg_name.as_deref(), Some("Finance"));
}
