//! Stable MAC-to-slot allocator.
//!
//! `list_live_multinic` generalizes the old `ifconfig::get_interface_names`
//! (prefix-filtered `pnet::datalink` enumeration); `hostname` generalizes the
//! old `lib.rs::hostname()` to strip the domain suffix.

use crate::command::CommandExecutor;
use crate::domain::{InterfaceName, SLOT_COUNT};
use crate::error::{AgentError, Result};
use pnet::datalink;
use regex::Regex;

/// Enumerates kernel network interface names. Exists so the allocator can be
/// driven by a fixed set of "live" slots in tests rather than the real
/// kernel's interface table.
pub trait InterfaceLister: Send + Sync {
    fn list_names(&self) -> Vec<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PnetInterfaceLister;

impl InterfaceLister for PnetInterfaceLister {
    fn list_names(&self) -> Vec<String> {
        datalink::interfaces().into_iter().map(|i| i.name).collect()
    }
}

pub struct InterfaceNamingService<'a> {
    commands: &'a dyn CommandExecutor,
    interfaces: &'a dyn InterfaceLister,
}

impl<'a> InterfaceNamingService<'a> {
    #[must_use]
    pub fn new(commands: &'a dyn CommandExecutor, interfaces: &'a dyn InterfaceLister) -> Self {
        Self {
            commands,
            interfaces,
        }
    }

    /// Reuses the slot already bound to `mac` if one exists (sticky
    /// binding), otherwise takes the lowest-indexed free slot.
    pub async fn allocate_for(&self, mac: &str) -> Result<InterfaceName> {
        let mac = mac.to_ascii_lowercase();
        let live = self.live_slots();

        for i in 0..SLOT_COUNT as u8 {
            let name = InterfaceName::new(i).expect("i is within SLOT_COUNT");
            if live.contains(&name.to_string()) {
                if let Ok(bound_mac) = self.mac_of(&name).await {
                    if bound_mac.eq_ignore_ascii_case(&mac) {
                        return Ok(name);
                    }
                }
            }
        }

        for i in 0..SLOT_COUNT as u8 {
            let name = InterfaceName::new(i).expect("i is within SLOT_COUNT");
            if !live.contains(&name.to_string()) {
                return Ok(name);
            }
        }

        Err(AgentError::Exhausted)
    }

    /// Enumerates slots currently realized as kernel interfaces. Stands in
    /// for probing `/sys/class/net/multinicI` existence: the live interface
    /// list already contains exactly the realized device names.
    #[must_use]
    pub fn live_slots(&self) -> Vec<String> {
        let re = Regex::new(r"^multinic[0-9]$").expect("slot pattern is valid");
        self.interfaces
            .list_names()
            .into_iter()
            .filter(|name| re.is_match(name))
            .collect()
    }

    pub async fn mac_of(&self, name: &InterfaceName) -> Result<String> {
        let name = name.to_string();
        let output = self
            .commands
            .run_read_only("ip", &["addr", "show", &name])
            .await?;
        output.ensure_success("ip", &["addr", "show", &name])?;
        parse_mac_from_ip_addr_show(&output.stdout)
            .ok_or_else(|| AgentError::not_found(format!("no MAC reported for {name}")))
    }

    /// Shortened hostname: the first label only, domain suffixes stripped.
    pub fn hostname() -> Result<String> {
        let host = hostname::get()
            .map_err(|e| AgentError::system("reading hostname", e))?
            .to_string_lossy()
            .to_string();
        Ok(host.split('.').next().unwrap_or(&host).to_string())
    }
}

/// Parses the `link/ether <mac> ...` line emitted by `ip addr show <name>`.
fn parse_mac_from_ip_addr_show(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let line = line.trim();
        line.strip_prefix("link/ether ")
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_string)
    })
}

#[cfg(test)]
pub mod fake {
    use super::InterfaceLister;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeInterfaceLister {
        names: Mutex<Vec<String>>,
    }

    impl FakeInterfaceLister {
        #[must_use]
        pub fn with_names(names: Vec<String>) -> Self {
            Self {
                names: Mutex::new(names),
            }
        }
    }

    impl InterfaceLister for FakeInterfaceLister {
        fn list_names(&self) -> Vec<String> {
            self.names.lock().expect("fake lister lock poisoned").clone()
        }
    }
}
