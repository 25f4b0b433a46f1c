//! Netplan adapter for Ubuntu hosts.
//!
//! Grounded directly on the old `ifconfig::{NetplanYaml, Nic,
//! NetplanYaml::apply}`: an atomic temp-file write followed by `fs::copy`
//! into place and `run_command("netplan", ..., &["apply"])`.

use super::Configurer;
use crate::clock::Clock;
use crate::command::{CommandExecutor, NETPLAN_TRY_TIMEOUT};
use crate::domain::{InterfaceName, NetworkInterface};
use crate::error::{AgentError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_with::serde_as;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = "/etc/netplan";
const VALIDATE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct NetplanMatch {
    macaddress: String,
}

#[derive(Serialize)]
struct NetplanEthernet {
    dhcp4: bool,
    dhcp6: bool,
    #[serde(rename = "match")]
    match_: NetplanMatch,
    #[serde(rename = "set-name")]
    set_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    addresses: Option<Vec<String>>,
    mtu: u32,
}

// `ethernets` is written as a YAML mapping but kept as a vec of pairs so a
// single-entry doc never depends on HashMap's unspecified iteration order;
// same shape the old `NetplanYaml::Network` used for its ethernets field.
#[serde_as]
#[derive(Serialize)]
struct NetplanNetwork {
    version: u32,
    #[serde_as(as = "HashMap<_, _>")]
    ethernets: Vec<(String, NetplanEthernet)>,
}

#[derive(Serialize)]
struct NetplanDoc {
    network: NetplanNetwork,
}

pub struct NetplanConfigurer<'a> {
    fs: &'a dyn crate::fs::FileSystem,
    commands: &'a dyn CommandExecutor,
    clock: &'a dyn Clock,
    backup_dir: &'a Path,
}

impl<'a> NetplanConfigurer<'a> {
    #[must_use]
    pub fn new(
        fs: &'a dyn crate::fs::FileSystem,
        commands: &'a dyn CommandExecutor,
        clock: &'a dyn Clock,
        backup_dir: &'a Path,
    ) -> Self {
        Self {
            fs,
            commands,
            clock,
            backup_dir,
        }
    }

    fn file_path(&self, name: &InterfaceName) -> PathBuf {
        Path::new(CONFIG_DIR).join(format!("9{}-{name}.yaml", name.index()))
    }

    fn render(name: &InterfaceName, row: &NetworkInterface) -> Result<String> {
        let addresses = if row.address.is_empty() {
            None
        } else {
            let prefix = row.prefix_len().unwrap_or("32");
            Some(vec![format!("{}/{}", row.address, prefix)])
        };

        let ethernets = vec![(
            name.to_string(),
            NetplanEthernet {
                dhcp4: false,
                dhcp6: false,
                match_: NetplanMatch {
                    macaddress: row.mac_address.clone(),
                },
                set_name: name.to_string(),
                addresses,
                mtu: row.mtu,
            },
        )];

        let doc = NetplanDoc {
            network: NetplanNetwork {
                version: 2,
                ethernets,
            },
        };

        serde_yaml::to_string(&doc).map_err(Into::into)
    }

    async fn backup_if_present(&self, path: &Path) {
        if !self.fs.exists(path).await {
            return;
        }
        let stamp = self.clock.now_utc().format("%Y%m%d%H%M%S");
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let backup_path = self.backup_dir.join(format!("{file_name}.{stamp}.bak"));
        if let Err(e) = self.fs.copy(path, &backup_path).await {
            log::warn!("best-effort backup of {} failed: {e}", path.display());
        }
    }
}

#[async_trait]
impl<'a> Configurer for NetplanConfigurer<'a> {
    fn config_dir(&self) -> &str {
        CONFIG_DIR
    }

    async fn find_config_file(&self, name: &InterfaceName) -> Result<Option<PathBuf>> {
        let name_str = name.to_string();
        let matches = self
            .fs
            .list_files(Path::new(CONFIG_DIR), &|file_name| {
                file_name.contains(&name_str) && file_name.ends_with(".yaml")
            })
            .await?;
        Ok(matches.into_iter().next())
    }

    async fn configure(&self, name: &InterfaceName, row: &NetworkInterface) -> Result<()> {
        let path = self.file_path(name);
        self.backup_if_present(&path).await;

        let yaml = Self::render(name, row)?;
        self.fs.write_atomic(&path, &yaml, 0o644).await?;

        let try_result = self
            .commands
            .run_mutating("netplan", &["try", "--timeout=120"], Some(NETPLAN_TRY_TIMEOUT))
            .await;
        let try_output = match try_result {
            Ok(output) => output,
            Err(e) => {
                let _ = self.fs.remove_file(&path).await;
                return Err(e);
            }
        };
        if let Err(e) = try_output.ensure_success("netplan", &["try", "--timeout=120"]) {
            let _ = self.fs.remove_file(&path).await;
            return Err(e);
        }

        let apply_output = self
            .commands
            .run_mutating("netplan", &["apply"], None)
            .await?;
        apply_output.ensure_success("netplan", &["apply"])?;

        Ok(())
    }

    async fn validate(&self, name: &InterfaceName) -> Result<()> {
        let sysfs_path = Path::new("/sys/class/net").join(name.to_string());
        if !self.fs.exists(&sysfs_path).await {
            return Err(AgentError::network(format!(
                "{name} did not appear under /sys/class/net"
            )));
        }

        let name_str = name.to_string();
        let output = self
            .commands
            .run_mutating("ip", &["link", "show", &name_str, "up"], Some(VALIDATE_TIMEOUT))
            .await?;
        output.ensure_success("ip", &["link", "show", &name_str, "up"])
    }

    async fn rollback(&self, name: &InterfaceName) -> Result<()> {
        let path = self.file_path(name);
        self.fs.remove_file(&path).await?;
        let output = self
            .commands
            .run_mutating("netplan", &["apply"], None)
            .await?;
        output.ensure_success("netplan", &["apply"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::fake::FakeClock;
    use crate::command::fake::ScriptedCommandExecutor;
    use crate::domain::InterfaceStatus;
    use crate::fs::fake::FakeFileSystem;

    fn row() -> NetworkInterface {
        NetworkInterface {
            id: 1,
            mac_address: "00:11:22:33:44:55".to_string(),
            attached_node_name: "node-a".to_string(),
            address: "10.10.10.10".to_string(),
            cidr: "10.10.10.0/24".to_string(),
            mtu: 1500,
            status: InterfaceStatus::Pending,
        }
    }

    #[test]
    fn renders_expected_yaml_shape() {
        let name = InterfaceName::new(0).unwrap();
        let yaml = NetplanConfigurer::render(&name, &row()).unwrap();
        assert!(yaml.contains("set-name: multinic0"));
        assert!(yaml.contains("macaddress: 00:11:22:33:44:55"));
        assert!(yaml.contains("10.10.10.10/24"));
        assert!(yaml.contains("mtu: 1500"));
    }

    #[test]
    fn omits_addresses_when_row_has_none() {
        let name = InterfaceName::new(0).unwrap();
        let mut r = row();
        r.address.clear();
        r.cidr.clear();
        let yaml = NetplanConfigurer::render(&name, &r).unwrap();
        assert!(!yaml.contains("addresses"));
    }

    #[tokio::test]
    async fn configure_writes_tries_and_applies() {
        let fs = FakeFileSystem::new();
        let commands = ScriptedCommandExecutor::new();
        commands.push_ok(""); // netplan try
        commands.push_ok(""); // netplan apply
        let clock = FakeClock::at(chrono::Utc::now());
        let backup_dir = PathBuf::from("/var/backups");
        let configurer = NetplanConfigurer::new(&fs, &commands, &clock, &backup_dir);

        let name = InterfaceName::new(0).unwrap();
        configurer.configure(&name, &row()).await.unwrap();

        let path = Path::new("/etc/netplan/90-multinic0.yaml");
        assert!(fs.exists(path).await);
        let calls = commands.calls.lock().unwrap();
        assert_eq!(calls[0].0, "netplan");
        assert_eq!(calls[0].1[0], "try");
        assert_eq!(calls[1].1[0], "apply");
    }

    #[tokio::test]
    async fn configure_removes_file_when_try_fails() {
        let fs = FakeFileSystem::new();
        let commands = ScriptedCommandExecutor::new();
        commands.push_failure("bad config");
        let clock = FakeClock::at(chrono::Utc::now());
        let backup_dir = PathBuf::from("/var/backups");
        let configurer = NetplanConfigurer::new(&fs, &commands, &clock, &backup_dir);

        let name = InterfaceName::new(0).unwrap();
        let result = configurer.configure(&name, &row()).await;
        assert!(result.is_err());

        let path = Path::new("/etc/netplan/90-multinic0.yaml");
        assert!(!fs.exists(path).await);
    }

    #[tokio::test]
    async fn rollback_removes_file_then_applies() {
        let fs = FakeFileSystem::new();
        let path = Path::new("/etc/netplan/90-multinic0.yaml");
        fs.seed(path, "stale");
        let commands = ScriptedCommandExecutor::new();
        commands.push_ok("");
        let clock = FakeClock::at(chrono::Utc::now());
        let backup_dir = PathBuf::from("/var/backups");
        let configurer = NetplanConfigurer::new(&fs, &commands, &clock, &backup_dir);

        let name = InterfaceName::new(0).unwrap();
        configurer.rollback(&name).await.unwrap();
        assert!(!fs.exists(path).await);
    }
}
