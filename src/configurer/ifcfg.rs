//! RHEL `ifcfg`/NetworkManager adapter.
//!
//! The device-rename-then-restart-service shape follows the single-narrow-
//! helper pattern the old `root/services.rs` used for
//! `systemctl <verb> <service>`.

use super::Configurer;
use crate::command::CommandExecutor;
use crate::domain::{InterfaceName, NetworkInterface};
use crate::error::{AgentError, Result};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "/etc/sysconfig/network-scripts";

pub struct IfcfgConfigurer<'a> {
    fs: &'a dyn crate::fs::FileSystem,
    commands: &'a dyn CommandExecutor,
    backup_dir: &'a Path,
}

impl<'a> IfcfgConfigurer<'a> {
    #[must_use]
    pub fn new(
        fs: &'a dyn crate::fs::FileSystem,
        commands: &'a dyn CommandExecutor,
        backup_dir: &'a Path,
    ) -> Self {
        Self {
            fs,
            commands,
            backup_dir,
        }
    }

    fn file_path(name: &InterfaceName) -> PathBuf {
        Path::new(CONFIG_DIR).join(format!("ifcfg-{name}"))
    }

    fn render(name: &InterfaceName, row: &NetworkInterface) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "DEVICE={name}");
        let _ = writeln!(out, "NAME={name}");
        let _ = writeln!(out, "TYPE=Ethernet");
        let _ = writeln!(out, "ONBOOT=yes");
        let _ = writeln!(out, "BOOTPROTO=none");
        let _ = writeln!(out, "HWADDR={}", row.canonical_mac());
        if !row.address.is_empty() {
            let _ = writeln!(out, "IPADDR={}", row.address);
        }
        if let Some(prefix) = row.prefix_len() {
            if !prefix.is_empty() {
                let _ = writeln!(out, "PREFIX={prefix}");
            }
        }
        if row.mtu > 0 {
            let _ = writeln!(out, "MTU={}", row.mtu);
        }
        out
    }

    /// Locates the current kernel device name bound to `mac`, if any, via
    /// `ip link show`.
    async fn find_device_by_mac(&self, mac: &str) -> Result<Option<String>> {
        let output = self.commands.run_read_only("ip", &["link", "show"]).await?;
        output.ensure_success("ip", &["link", "show"])?;
        Ok(parse_ip_link_show(&output.stdout)
            .into_iter()
            .find(|(_, device_mac)| device_mac.eq_ignore_ascii_case(mac))
            .map(|(device, _)| device))
    }

    async fn rename_device_if_needed(&self, current: &str, target: &InterfaceName) -> Result<()> {
        let target_str = target.to_string();
        if current == target_str {
            return Ok(());
        }

        let down = self
            .commands
            .run_mutating("ip", &["link", "set", current, "down"], None)
            .await?;
        if let Err(e) = down.ensure_success("ip", &["link", "set", current, "down"]) {
            return Err(e);
        }

        let rename = self
            .commands
            .run_mutating("ip", &["link", "set", current, "name", &target_str], None)
            .await?;
        if let Err(e) = rename.ensure_success("ip", &["link", "set", current, "name", &target_str])
        {
            // best-effort: bring the device back up under its old name
            let _ = self
                .commands
                .run_mutating("ip", &["link", "set", current, "up"], None)
                .await;
            return Err(e);
        }

        let up = self
            .commands
            .run_mutating("ip", &["link", "set", &target_str, "up"], None)
            .await?;
        up.ensure_success("ip", &["link", "set", &target_str, "up"])
    }
}

#[async_trait]
impl<'a> Configurer for IfcfgConfigurer<'a> {
    fn config_dir(&self) -> &str {
        CONFIG_DIR
    }

    async fn find_config_file(&self, name: &InterfaceName) -> Result<Option<PathBuf>> {
        let name_str = name.to_string();
        let matches = self
            .fs
            .list_files(Path::new(CONFIG_DIR), &|file_name| {
                file_name.starts_with("ifcfg-") && file_name.contains(&name_str)
            })
            .await?;
        Ok(matches.into_iter().next())
    }

    async fn configure(&self, name: &InterfaceName, row: &NetworkInterface) -> Result<()> {
        if let Some(current) = self.find_device_by_mac(&row.mac_address).await? {
            self.rename_device_if_needed(&current, name).await?;
        }

        let path = Self::file_path(name);
        if self.fs.exists(&path).await {
            let stamp_name = format!("ifcfg-{name}.bak");
            let backup_path = self.backup_dir.join(stamp_name);
            if let Err(e) = self.fs.copy(&path, &backup_path).await {
                log::warn!("best-effort backup of {} failed: {e}", path.display());
            }
        }

        let contents = Self::render(name, row);
        self.fs.write_atomic(&path, &contents, 0o644).await?;
        if !self.fs.exists(&path).await {
            return Err(AgentError::network(format!(
                "ifcfg file for {name} was not written"
            )));
        }

        let output = self
            .commands
            .run_mutating("systemctl", &["restart", "NetworkManager"], None)
            .await?;
        output.ensure_success("systemctl", &["restart", "NetworkManager"])
    }

    async fn validate(&self, name: &InterfaceName) -> Result<()> {
        let name_str = name.to_string();
        let output = self
            .commands
            .run_read_only("ip", &["link", "show", &name_str])
            .await?;
        output.ensure_success("ip", &["link", "show", &name_str])?;

        let path = Self::file_path(name);
        if !self.fs.exists(&path).await {
            return Err(AgentError::not_found(format!(
                "ifcfg file missing for {name}"
            )));
        }
        Ok(())
    }

    async fn rollback(&self, name: &InterfaceName) -> Result<()> {
        let path = Self::file_path(name);
        self.fs.remove_file(&path).await?;
        let output = self
            .commands
            .run_mutating("systemctl", &["restart", "NetworkManager"], None)
            .await?;
        output.ensure_success("systemctl", &["restart", "NetworkManager"])
    }
}

/// Parses `ip link show` output into `(device_name, mac)` pairs.
fn parse_ip_link_show(output: &str) -> Vec<(String, String)> {
    let mut result = Vec::new();
    let mut current_name: Option<String> = None;
    for line in output.lines() {
        if !line.starts_with(' ') && !line.starts_with('\t') {
            // "2: ens5: <BROADCAST,...> mtu 1500 ..."
            current_name = line
                .splitn(3, ':')
                .nth(1)
                .map(|s| s.trim().split('@').next().unwrap_or(s.trim()).to_string());
        } else if let Some(name) = &current_name {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix("link/ether ") {
                if let Some(mac) = rest.split_whitespace().next() {
                    result.push((name.clone(), mac.to_string()));
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::fake::ScriptedCommandExecutor;
    use crate::domain::InterfaceStatus;
    use crate::fs::fake::FakeFileSystem;

    const IP_LINK_SHOW: &str = "1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN\n    link/loopback 00:00:00:00:00:00 brd 00:00:00:00:00:00\n2: ens5: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc mq state UP\n    link/ether 00:11:22:33:44:55 brd ff:ff:ff:ff:ff:ff\n";

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
    fn parses_device_mac_pairs() {
        let pairs = parse_ip_link_show(IP_LINK_SHOW);
        assert_eq!(
            pairs,
            vec![
                ("lo".to_string(), "00:00:00:00:00:00".to_string()),
                ("ens5".to_string(), "00:11:22:33:44:55".to_string()),
            ]
        );
    }

    #[test]
    fn renders_expected_ifcfg_shape() {
        let name = InterfaceName::new(0).unwrap();
        let contents = IfcfgConfigurer::render(&name, &row());
        assert!(contents.contains("DEVICE=multinic0"));
        assert!(contents.contains("HWADDR=00:11:22:33:44:55"));
        assert!(contents.contains("IPADDR=10.10.10.10"));
        assert!(contents.contains("PREFIX=24"));
        assert!(contents.contains("MTU=1500"));
    }

    #[tokio::test]
    async fn configure_renames_device_writes_file_and_restarts_network_manager() {
        let fs = FakeFileSystem::new();
        let commands = ScriptedCommandExecutor::new();
        commands.push_ok(IP_LINK_SHOW); // find_device_by_mac
        commands.push_ok(""); // ip link set ens5 down
        commands.push_ok(""); // ip link set ens5 name multinic0
        commands.push_ok(""); // ip link set multinic0 up
        commands.push_ok(""); // systemctl restart NetworkManager
        let backup_dir = PathBuf::from("/var/backups");
        let configurer = IfcfgConfigurer::new(&fs, &commands, &backup_dir);

        let name = InterfaceName::new(0).unwrap();
        configurer.configure(&name, &row()).await.unwrap();

        let path = Path::new("/etc/sysconfig/network-scripts/ifcfg-multinic0");
        assert!(fs.exists(path).await);
        let calls = commands.calls.lock().unwrap();
        assert_eq!(calls.last().unwrap().0, "systemctl");
    }

    #[tokio::test]
    async fn skips_rename_when_device_already_has_target_name() {
        let fs = FakeFileSystem::new();
        let commands = ScriptedCommandExecutor::new();
        let already_named = "1: multinic0: <BROADCAST> mtu 1500\n    link/ether 00:11:22:33:44:55 brd ff:ff:ff:ff:ff:ff\n";
        commands.push_ok(already_named);
        commands.push_ok(""); // systemctl restart
        let backup_dir = PathBuf::from("/var/backups");
        let configurer = IfcfgConfigurer::new(&fs, &commands, &backup_dir);

        let name = InterfaceName::new(0).unwrap();
        configurer.configure(&name, &row()).await.unwrap();

        let calls = commands.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
    }
}
