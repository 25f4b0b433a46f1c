//! The data model of the reconcile loop: `NetworkInterface` (one row of
//! desired state), `InterfaceName` (a validated `multinicK` slot), and the
//! status it's derived into.
//!
//! Generalizes the old `Nic`/`NicOutput` pair (a typed value plus its wire
//! shape) to the full DB row this reconciler needs.

use crate::error::{AgentError, Result};
use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt;

const SLOT_PATTERN: &str = r"^multinic[0-9]$";

pub const SLOT_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceStatus {
    Pending,
    Configured,
    Failed,
}

impl InterfaceStatus {
    /// `netplan_success` is the column's actual name; only `1` maps to
    /// Configured, matching §3 ("derived from a `netplan_success` integer
    /// (1→Configured, else Pending)"). `Failed` is a purely in-process state
    /// the agent assigns during a tick and persists back as `0`.
    #[must_use]
    pub fn from_netplan_success(value: i32) -> Self {
        if value == 1 {
            InterfaceStatus::Configured
        } else {
            InterfaceStatus::Pending
        }
    }

    #[must_use]
    pub fn to_netplan_success(self) -> i32 {
        match self {
            InterfaceStatus::Configured => 1,
            InterfaceStatus::Pending | InterfaceStatus::Failed => 0,
        }
    }
}

/// One row of desired secondary-NIC state, scoped to a single attached node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub id: i64,
    pub mac_address: String,
    pub attached_node_name: String,
    pub address: String,
    pub cidr: String,
    pub mtu: u32,
    pub status: InterfaceStatus,
}

impl NetworkInterface {
    /// Canonicalized MAC, lowercase with colon separators, used for every
    /// comparison in the drift detector and naming allocator.
    #[must_use]
    pub fn canonical_mac(&self) -> String {
        self.mac_address.to_ascii_lowercase()
    }

    /// CIDR prefix length, e.g. `"24"` out of `"10.0.0.0/24"`. Empty when
    /// `cidr` has no network part.
    #[must_use]
    pub fn prefix_len(&self) -> Option<&str> {
        self.cidr.split('/').nth(1)
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_mac(&self.mac_address) {
            return Err(AgentError::validation(format!(
                "invalid MAC address `{}` on interface {}",
                self.mac_address, self.id
            )));
        }
        if self.attached_node_name.trim().is_empty() {
            return Err(AgentError::validation(format!(
                "interface {} has an empty attached_node_name",
                self.id
            )));
        }
        if !self.address.is_empty() && self.cidr.is_empty() {
            return Err(AgentError::validation(format!(
                "interface {} has an address but no cidr",
                self.id
            )));
        }
        if !self.address.is_empty() {
            let network = format!("{}/{}", self.address, self.prefix_len().unwrap_or_default());
            if network.parse::<IpNet>().is_err() {
                return Err(AgentError::validation(format!(
                    "interface {} has an invalid address/cidr combination `{network}`",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

#[must_use]
pub fn is_valid_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

/// A validated local slot name, `multinic0`..`multinic9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceName(u8);

impl InterfaceName {
    pub fn new(index: u8) -> Result<Self> {
        if (index as usize) < SLOT_COUNT {
            Ok(Self(index))
        } else {
            Err(AgentError::validation(format!(
                "slot index {index} out of range 0..{SLOT_COUNT}"
            )))
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        let re = regex::Regex::new(SLOT_PATTERN).expect("slot pattern is valid");
        if !re.is_match(name) {
            return Err(AgentError::validation(format!(
                "`{name}` is not a valid multinic slot name"
            )));
        }
        let index: u8 = name["multinic".len()..]
            .parse()
            .map_err(|_| AgentError::validation(format!("`{name}` has no numeric suffix")))?;
        Self::new(index)
    }

    #[must_use]
    pub fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for InterfaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "multinic{}", self.0)
    }
}

/// Serializable snapshot of a row used only at the repository boundary.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InterfaceRow {
    pub id: i64,
    pub macaddress: String,
    pub attached_node_name: String,
    pub address: String,
    pub cidr: String,
    pub mtu: i32,
    pub netplan_success: i32,
    pub deleted_at: Option<DateTime<Utc>>,
    pub modified_at: DateTime<Utc>,
}

impl From<InterfaceRow> for NetworkInterface {
    fn from(row: InterfaceRow) -> Self {
        NetworkInterface {
            id: row.id,
            mac_address: row.macaddress,
            attached_node_name: row.attached_node_name,
            address: row.address,
            cidr: row.cidr,
            mtu: row.mtu.max(0) as u32,
            status: InterfaceStatus::from_netplan_success(row.netplan_success),
        }
    }
}
