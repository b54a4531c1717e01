// # NIC Model
//
// Each VM in a VPG carries one record per NIC. A record has two network
// phases: "Failover" (real recovery) and "Failover Test" (non-disruptive
// test). Both phases share the same shape:
//
// ```text
// PhaseSettings
// ├── network_identifier        target network at the recovery site
// ├── should_replace_ip         IP block below only takes effect when true
// └── IP block
//     ├── mode                  Dhcp | Static
//     └── ip, subnet, gateway, dns1, dns2   (Static only)
// ```
//
// The column vocabulary used by the loader and the reports is derived from
// `NetworkPhase::label` and `PhaseField::suffix`, e.g. "Failover Test DNS1".

use std::fmt;

use serde::{Deserialize, Serialize};

/// Normalise a cell or field value
///
/// Empty strings, whitespace and the literals `None` / `null` all mean
/// "absent". Other values are trimmed.
pub fn normalize_cell(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("none")
        || trimmed.eq_ignore_ascii_case("null")
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Key of a NIC record within a VPG
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NicIdentity {
    /// VM identifier as known to the manager
    pub vm_identifier: String,
    /// NIC identifier within the VM
    pub nic_identifier: String,
}

impl NicIdentity {
    /// Create an identity
    pub fn new(vm_identifier: impl Into<String>, nic_identifier: impl Into<String>) -> Self {
        Self {
            vm_identifier: vm_identifier.into(),
            nic_identifier: nic_identifier.into(),
        }
    }
}

impl fmt::Display for NicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VM {}, NIC {}", self.vm_identifier, self.nic_identifier)
    }
}

/// How the NIC obtains its address after failover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AddressingMode {
    /// Address assigned by DHCP; no static fields allowed
    Dhcp,
    /// Static address; IP and subnet required
    #[default]
    Static,
}

impl AddressingMode {
    /// Map the manager's `IsDhcp` flag
    pub fn from_dhcp(is_dhcp: bool) -> Self {
        if is_dhcp { Self::Dhcp } else { Self::Static }
    }

    /// Whether this is DHCP
    pub fn is_dhcp(self) -> bool {
        self == Self::Dhcp
    }
}

/// Recovery phase a set of network settings applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkPhase {
    /// Live failover
    Failover,
    /// Failover test
    Test,
}

impl NetworkPhase {
    /// Both phases, in column order
    pub const ALL: [NetworkPhase; 2] = [NetworkPhase::Failover, NetworkPhase::Test];

    /// Column prefix for this phase
    pub fn label(self) -> &'static str {
        match self {
            NetworkPhase::Failover => "Failover",
            NetworkPhase::Test => "Failover Test",
        }
    }
}

impl fmt::Display for NetworkPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single field of [`PhaseSettings`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseField {
    /// Target network identifier
    Network,
    /// `ShouldReplaceIpConfiguration` flag
    ShouldReplaceIp,
    /// DHCP flag
    Dhcp,
    /// Static IP address
    Ip,
    /// Subnet mask
    Subnet,
    /// Default gateway
    Gateway,
    /// Primary DNS server
    Dns1,
    /// Secondary DNS server
    Dns2,
}

impl PhaseField {
    /// All fields, in export column order
    pub const ALL: [PhaseField; 8] = [
        PhaseField::Network,
        PhaseField::ShouldReplaceIp,
        PhaseField::Dhcp,
        PhaseField::Ip,
        PhaseField::Subnet,
        PhaseField::Gateway,
        PhaseField::Dns1,
        PhaseField::Dns2,
    ];

    /// Fields governed by `should_replace_ip`
    pub const IP_BLOCK: [PhaseField; 6] = [
        PhaseField::Dhcp,
        PhaseField::Ip,
        PhaseField::Subnet,
        PhaseField::Gateway,
        PhaseField::Dns1,
        PhaseField::Dns2,
    ];

    /// Column suffix, appended to the phase label
    pub fn suffix(self) -> &'static str {
        match self {
            PhaseField::Network => "Network",
            PhaseField::ShouldReplaceIp => "ShouldReplaceIpConfiguration",
            PhaseField::Dhcp => "DHCP",
            PhaseField::Ip => "IP",
            PhaseField::Subnet => "Subnet",
            PhaseField::Gateway => "Gateway",
            PhaseField::Dns1 => "DNS1",
            PhaseField::Dns2 => "DNS2",
        }
    }

    /// Full column name for this field in the given phase
    pub fn column(self, phase: NetworkPhase) -> String {
        format!("{} {}", phase.label(), self.suffix())
    }

    /// Whether the field belongs to the IP block
    pub fn is_ip_field(self) -> bool {
        Self::IP_BLOCK.contains(&self)
    }
}

/// Network settings for one phase of one NIC
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhaseSettings {
    /// Target network; `None` keeps whatever the manager has
    pub network_identifier: Option<String>,
    /// Whether the IP block replaces the VM's own configuration
    pub should_replace_ip: bool,
    /// DHCP or static addressing
    pub mode: AddressingMode,
    /// Static IP address
    pub ip: Option<String>,
    /// Subnet mask
    pub subnet: Option<String>,
    /// Default gateway
    pub gateway: Option<String>,
    /// Primary DNS
    pub dns1: Option<String>,
    /// Secondary DNS
    pub dns2: Option<String>,
}

impl PhaseSettings {
    /// Settings requesting DHCP
    pub fn dhcp() -> Self {
        Self {
            should_replace_ip: true,
            mode: AddressingMode::Dhcp,
            ..Self::default()
        }
    }

    /// Settings requesting a static address
    pub fn static_ip(ip: impl Into<String>, subnet: impl Into<String>) -> Self {
        Self {
            should_replace_ip: true,
            mode: AddressingMode::Static,
            ip: Some(ip.into()),
            subnet: Some(subnet.into()),
            ..Self::default()
        }
    }

    /// Set the gateway
    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = Some(gateway.into());
        self
    }

    /// Set the DNS servers
    pub fn with_dns(mut self, primary: impl Into<String>, secondary: Option<String>) -> Self {
        self.dns1 = Some(primary.into());
        self.dns2 = secondary;
        self
    }

    /// Set the target network
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network_identifier = Some(network.into());
        self
    }

    /// Set the `should_replace_ip` flag
    pub fn replacing_ip(mut self, should_replace_ip: bool) -> Self {
        self.should_replace_ip = should_replace_ip;
        self
    }

    /// Whether any static field is populated
    pub fn has_static_fields(&self) -> bool {
        [&self.ip, &self.subnet, &self.gateway, &self.dns1, &self.dns2]
            .iter()
            .any(|field| field.is_some())
    }

    /// Drop every static field
    pub fn clear_static_fields(&mut self) {
        self.ip = None;
        self.subnet = None;
        self.gateway = None;
        self.dns1 = None;
        self.dns2 = None;
    }

    /// Textual value of a field, as it appears in tables and diffs
    ///
    /// Flags render as `True` / `False`; absent values as `None`.
    pub fn value(&self, field: PhaseField) -> Option<String> {
        match field {
            PhaseField::Network => self.network_identifier.clone(),
            PhaseField::ShouldReplaceIp => Some(bool_text(self.should_replace_ip).to_string()),
            PhaseField::Dhcp => Some(bool_text(self.mode.is_dhcp()).to_string()),
            PhaseField::Ip => self.ip.clone(),
            PhaseField::Subnet => self.subnet.clone(),
            PhaseField::Gateway => self.gateway.clone(),
            PhaseField::Dns1 => self.dns1.clone(),
            PhaseField::Dns2 => self.dns2.clone(),
        }
    }

    /// Whether the IP blocks of two settings are identical
    pub fn ip_block_matches(&self, other: &PhaseSettings) -> bool {
        PhaseField::IP_BLOCK
            .iter()
            .all(|field| self.value(*field) == other.value(*field))
    }
}

/// Render a flag the way the manager's exports do
pub(crate) fn bool_text(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

/// Network configuration of one NIC of one VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicConfiguration {
    /// Owning VPG name, when known
    pub vpg_name: Option<String>,
    /// VM/NIC key
    pub identity: NicIdentity,
    /// Live failover settings
    pub failover: PhaseSettings,
    /// Failover test settings
    pub test: PhaseSettings,
}

impl NicConfiguration {
    /// Create a record with default settings in both phases
    pub fn new(vm_identifier: impl Into<String>, nic_identifier: impl Into<String>) -> Self {
        Self {
            vpg_name: None,
            identity: NicIdentity::new(vm_identifier, nic_identifier),
            failover: PhaseSettings::default(),
            test: PhaseSettings::default(),
        }
    }

    /// Set the owning VPG name
    pub fn with_vpg_name(mut self, vpg_name: impl Into<String>) -> Self {
        self.vpg_name = Some(vpg_name.into());
        self
    }

    /// Replace the settings of one phase
    pub fn with_phase(mut self, phase: NetworkPhase, settings: PhaseSettings) -> Self {
        *self.phase_mut(phase) = settings;
        self
    }

    /// Settings of one phase
    pub fn phase(&self, phase: NetworkPhase) -> &PhaseSettings {
        match phase {
            NetworkPhase::Failover => &self.failover,
            NetworkPhase::Test => &self.test,
        }
    }

    /// Mutable settings of one phase
    pub fn phase_mut(&mut self, phase: NetworkPhase) -> &mut PhaseSettings {
        match phase {
            NetworkPhase::Failover => &mut self.failover,
            NetworkPhase::Test => &mut self.test,
        }
    }
}
