// # VPG Settings Document
//
// Mapping between the manager's VPG settings document and NicConfiguration.
//
// ```text
// {
//   "Basic": { "Name": "..." , ... },
//   "Vms": [
//     { "VmIdentifier": "...",
//       "Nics": [
//         { "NicIdentifier": "...",
//           "Failover":     { "Hypervisor": { "NetworkIdentifier", "ShouldReplaceIpConfiguration",
//                                             "IpConfig": { "IsDhcp", "StaticIp", "SubnetMask",
//                                                           "Gateway", "PrimaryDns", "SecondaryDns" } } },
//           "FailoverTest": { ...same shape... } } ] } ],
//   ...
// }
// ```
//
// The manager only accepts whole-document updates, so writes patch the
// known keys in place and leave every other key untouched.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::model::{
    AddressingMode, NetworkPhase, NicConfiguration, NicIdentity, PhaseSettings, normalize_cell,
};

const VMS: &str = "Vms";
const VM_IDENTIFIER: &str = "VmIdentifier";
const NICS: &str = "Nics";
const NIC_IDENTIFIER: &str = "NicIdentifier";
const HYPERVISOR: &str = "Hypervisor";
const NETWORK_IDENTIFIER: &str = "NetworkIdentifier";
const SHOULD_REPLACE: &str = "ShouldReplaceIpConfiguration";
const IP_CONFIG: &str = "IpConfig";
const IS_DHCP: &str = "IsDhcp";
const STATIC_IP: &str = "StaticIp";
const SUBNET_MASK: &str = "SubnetMask";
const GATEWAY: &str = "Gateway";
const PRIMARY_DNS: &str = "PrimaryDns";
const SECONDARY_DNS: &str = "SecondaryDns";
const JOURNAL_HISTORY: &str = "JournalHistoryInHours";

/// Document key holding a phase's settings
fn phase_key(phase: NetworkPhase) -> &'static str {
    match phase {
        NetworkPhase::Failover => "Failover",
        NetworkPhase::Test => "FailoverTest",
    }
}

/// VPG name recorded in the document (`Basic.Name`)
pub fn vpg_name(document: &Value) -> Option<String> {
    text(&document["Basic"]["Name"])
}

/// Journal history of the VPG in hours (`Basic.JournalHistoryInHours`)
pub fn journal_history_hours(document: &Value) -> Option<u64> {
    match &document["Basic"][JOURNAL_HISTORY] {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Set `Basic.JournalHistoryInHours`, leaving the rest of `Basic` alone
pub fn set_journal_history_hours(document: &mut Value, hours: u64) {
    child_object(document, "Basic")[JOURNAL_HISTORY] = Value::from(hours);
}

/// Every NIC record in the document, in document order
///
/// Null or missing sub-objects read as defaults.
pub fn nic_configurations(document: &Value) -> Result<Vec<NicConfiguration>> {
    if !document.is_object() {
        return Err(Error::invalid_response("VPG settings document is not an object"));
    }

    let name = vpg_name(document);
    let mut configs = Vec::new();

    for vm in array(&document[VMS]) {
        let vm_identifier = text(&vm[VM_IDENTIFIER])
            .ok_or_else(|| Error::invalid_response("VM entry without VmIdentifier"))?;

        for nic in array(&vm[NICS]) {
            let nic_identifier = text(&nic[NIC_IDENTIFIER]).ok_or_else(|| {
                Error::invalid_response(format!(
                    "NIC entry of VM {} without NicIdentifier",
                    vm_identifier
                ))
            })?;

            configs.push(NicConfiguration {
                vpg_name: name.clone(),
                identity: NicIdentity::new(vm_identifier.clone(), nic_identifier),
                failover: read_phase(nic, NetworkPhase::Failover),
                test: read_phase(nic, NetworkPhase::Test),
            });
        }
    }

    Ok(configs)
}

/// Write a complete NIC record into the document
///
/// Only the network and IP keys of both phases are touched.
///
/// # Errors
///
/// `Error::TargetNotFound` if the VM/NIC is not in the document.
pub fn write_nic(document: &mut Value, config: &NicConfiguration) -> Result<()> {
    let identity = &config.identity;
    let nic = find_nic_mut(document, identity).ok_or_else(|| {
        Error::target_not_found(identity.vm_identifier.clone(), identity.nic_identifier.clone())
    })?;

    for phase in NetworkPhase::ALL {
        write_phase(nic, phase, config.phase(phase));
    }
    Ok(())
}

fn read_phase(nic: &Value, phase: NetworkPhase) -> PhaseSettings {
    let hypervisor = &nic[phase_key(phase)][HYPERVISOR];
    let ip_config = &hypervisor[IP_CONFIG];

    PhaseSettings {
        network_identifier: text(&hypervisor[NETWORK_IDENTIFIER]),
        should_replace_ip: flag(&hypervisor[SHOULD_REPLACE]),
        mode: AddressingMode::from_dhcp(flag(&ip_config[IS_DHCP])),
        ip: text(&ip_config[STATIC_IP]),
        subnet: text(&ip_config[SUBNET_MASK]),
        gateway: text(&ip_config[GATEWAY]),
        dns1: text(&ip_config[PRIMARY_DNS]),
        dns2: text(&ip_config[SECONDARY_DNS]),
    }
}

fn write_phase(nic: &mut Value, phase: NetworkPhase, settings: &PhaseSettings) {
    let hypervisor = child_object(child_object(nic, phase_key(phase)), HYPERVISOR);

    if let Some(network) = &settings.network_identifier {
        hypervisor[NETWORK_IDENTIFIER] = Value::String(network.clone());
    }
    hypervisor[SHOULD_REPLACE] = Value::Bool(settings.should_replace_ip);

    let ip_config = child_object(hypervisor, IP_CONFIG);
    ip_config[IS_DHCP] = Value::Bool(settings.mode.is_dhcp());
    set_text(ip_config, STATIC_IP, &settings.ip);
    set_text(ip_config, SUBNET_MASK, &settings.subnet);
    set_text(ip_config, GATEWAY, &settings.gateway);
    set_text(ip_config, PRIMARY_DNS, &settings.dns1);
    set_text(ip_config, SECONDARY_DNS, &settings.dns2);
}

fn find_nic_mut<'a>(document: &'a mut Value, identity: &NicIdentity) -> Option<&'a mut Value> {
    document
        .get_mut(VMS)?
        .as_array_mut()?
        .iter_mut()
        .filter(|vm| text(&vm[VM_IDENTIFIER]).as_deref() == Some(identity.vm_identifier.as_str()))
        .find_map(|vm| {
            vm.get_mut(NICS)?.as_array_mut()?.iter_mut().find(|nic| {
                text(&nic[NIC_IDENTIFIER]).as_deref() == Some(identity.nic_identifier.as_str())
            })
        })
}

/// Child object under `key`, created (or replacing a non-object) as needed
///
/// `parent` must be an object or null.
fn child_object<'a>(parent: &'a mut Value, key: &str) -> &'a mut Value {
    if parent.is_null() {
        *parent = Value::Object(Map::new());
    }
    let slot = &mut parent[key];
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    slot
}

fn set_text(object: &mut Value, key: &str, value: &Option<String>) {
    object[key] = match value {
        Some(text) => Value::String(text.clone()),
        None => Value::Null,
    };
}

fn array(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or(&[])
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => normalize_cell(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}
