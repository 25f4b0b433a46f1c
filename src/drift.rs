//! Two-format drift comparator.
//!
//! The netplan-YAML shape and parsing idiom are generalized from the old
//! `ifconfig::NetplanYaml` (`serde_yaml::from_str`); the RHEL `ifcfg-*`
//! key=value parsing follows the flat `KEY=VALUE` read idiom the old
//! `root/sshd.rs`/`root/ntp.rs` used.

use crate::domain::NetworkInterface;
use crate::os_detect::OsType;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftKind {
    MissingFile,
    MacMismatch,
    MissingAddress,
    IpAddress,
    Cidr,
    Mtu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftDecision {
    pub is_drifted: bool,
    pub kind: Option<DriftKind>,
}

impl DriftDecision {
    fn none() -> Self {
        Self {
            is_drifted: false,
            kind: None,
        }
    }

    fn of(kind: DriftKind) -> Self {
        Self {
            is_drifted: true,
            kind: Some(kind),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NetplanMatch {
    macaddress: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NetplanEthernet {
    #[serde(rename = "match")]
    match_: Option<NetplanMatch>,
    addresses: Option<Vec<String>>,
    mtu: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct NetplanNetwork {
    ethernets: HashMap<String, NetplanEthernet>,
}

#[derive(Debug, Deserialize)]
struct NetplanDoc {
    network: NetplanNetwork,
}

pub struct DriftDetector;

impl DriftDetector {
    /// Compares a raw on-disk file (`None` when the file does not exist)
    /// against a DB row, dispatching on OS type to the matching format.
    #[must_use]
    pub fn detect(
        file_contents: Option<&str>,
        row: &NetworkInterface,
        os: OsType,
    ) -> DriftDecision {
        let Some(contents) = file_contents else {
            return DriftDecision::of(DriftKind::MissingFile);
        };

        match os {
            OsType::Ubuntu => Self::detect_netplan(contents, row),
            OsType::Rhel => Self::detect_ifcfg(contents, row),
        }
    }

    fn detect_netplan(contents: &str, row: &NetworkInterface) -> DriftDecision {
        let doc: NetplanDoc = match serde_yaml::from_str(contents) {
            Ok(doc) => doc,
            Err(_) => return DriftDecision::of(DriftKind::MissingFile),
        };

        if doc.network.ethernets.len() != 1 {
            return DriftDecision::of(DriftKind::MissingFile);
        }
        let eth = doc
            .network
            .ethernets
            .values()
            .next()
            .expect("checked len == 1");

        let file_mac = eth.match_.as_ref().and_then(|m| m.macaddress.as_deref());
        match file_mac {
            Some(mac) if mac.eq_ignore_ascii_case(&row.mac_address) => {}
            _ => return DriftDecision::of(DriftKind::MacMismatch),
        }

        if !row.address.is_empty() {
            let Some(addrs) = &eth.addresses else {
                return DriftDecision::of(DriftKind::MissingAddress);
            };
            let Some(first) = addrs.first() else {
                return DriftDecision::of(DriftKind::MissingAddress);
            };
            let mut parts = first.splitn(2, '/');
            let ip = parts.next().unwrap_or_default();
            let prefix = parts.next().unwrap_or_default();
            let expected_prefix = row.prefix_len().unwrap_or_default();

            if ip != row.address {
                return DriftDecision::of(DriftKind::IpAddress);
            }
            if prefix != expected_prefix {
                return DriftDecision::of(DriftKind::Cidr);
            }
        } else if eth.addresses.is_some() {
            return DriftDecision::of(DriftKind::IpAddress);
        }

        if eth.mtu.unwrap_or(0) != row.mtu {
            return DriftDecision::of(DriftKind::Mtu);
        }

        DriftDecision::none()
    }

    fn detect_ifcfg(contents: &str, row: &NetworkInterface) -> DriftDecision {
        let kv = parse_ifcfg(contents);

        let hwaddr = kv.get("HWADDR").map(|s| s.to_ascii_lowercase());
        if hwaddr.as_deref() != Some(row.canonical_mac().as_str()) {
            return DriftDecision::of(DriftKind::MacMismatch);
        }

        let ipaddr = kv.get("IPADDR").map(String::as_str).unwrap_or("");
        if ipaddr != row.address {
            return if row.address.is_empty() && !ipaddr.is_empty() {
                DriftDecision::of(DriftKind::IpAddress)
            } else if row.address.is_empty() {
                DriftDecision::none()
            } else if ipaddr.is_empty() {
                DriftDecision::of(DriftKind::MissingAddress)
            } else {
                DriftDecision::of(DriftKind::IpAddress)
            };
        }

        let prefix = kv.get("PREFIX").map(String::as_str).unwrap_or("");
        let expected_prefix = row.prefix_len().unwrap_or_default();
        if prefix != expected_prefix {
            return DriftDecision::of(DriftKind::Cidr);
        }

        let mtu: u32 = kv.get("MTU").and_then(|v| v.parse().ok()).unwrap_or(0);
        if mtu != row.mtu {
            return DriftDecision::of(DriftKind::Mtu);
        }

        DriftDecision::none()
    }
}

/// Extracts the single ethernet entry's `match.macaddress` from a netplan
/// YAML document, used by orphan detection to identify a file's owning MAC
/// without needing a DB row to compare against.
#[must_use]
pub fn mac_from_netplan(contents: &str) -> Option<String> {
    let doc: NetplanDoc = serde_yaml::from_str(contents).ok()?;
    if doc.network.ethernets.len() != 1 {
        return None;
    }
    doc.network
        .ethernets
        .values()
        .next()?
        .match_
        .as_ref()?
        .macaddress
        .clone()
}

/// Extracts `HWADDR` from an ifcfg file, for the same purpose as
/// [`mac_from_netplan`].
#[must_use]
pub fn mac_from_ifcfg(contents: &str) -> Option<String> {
    parse_ifcfg(contents).get("HWADDR").cloned()
}

fn parse_ifcfg(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (key, value) = line.split_once('=')?;
            Some((key.trim().to_string(), value.trim().trim_matches('"').to_string()))
        })
        .collect()
}
