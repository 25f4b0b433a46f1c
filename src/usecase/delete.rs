//! Orphan-cleanup use-case.
//!
//! MAC-based orphan detection tolerates slot renumbering: a row that kept
//! its MAC but moved to a different node still makes its old local file
//! orphaned, since the active-MAC set is scoped per node.

use crate::configurer::Configurer;
use crate::domain::InterfaceName;
use crate::drift::{mac_from_ifcfg, mac_from_netplan};
use crate::error::Result;
use crate::fs::FileSystem;
use crate::os_detect::OsType;
use crate::repository::Repository;
use crate::rollback::Rollbacker;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: Vec<String>,
}

pub struct DeleteNetworkUseCase<'a> {
    repository: &'a dyn Repository,
    fs: &'a dyn FileSystem,
    configurer: &'a dyn Configurer,
    os: OsType,
}

impl<'a> DeleteNetworkUseCase<'a> {
    #[must_use]
    pub fn new(
        repository: &'a dyn Repository,
        fs: &'a dyn FileSystem,
        configurer: &'a dyn Configurer,
        os: OsType,
    ) -> Self {
        Self {
            repository,
            fs,
            configurer,
            os,
        }
    }

    pub async fn run(&self, node: &str) -> Result<DeleteOutcome> {
        let active: HashSet<String> = self
            .repository
            .get_active_interfaces(node)
            .await?
            .iter()
            .map(|row| row.canonical_mac())
            .collect();

        let dir = Path::new(self.configurer.config_dir());
        let files = self
            .fs
            .list_files(dir, &|name| Self::matches_pattern(self.os, name))
            .await?;

        let slot_pattern = Regex::new(r"multinic[0-9]").expect("slot pattern is valid");
        let mut deleted = Vec::new();

        for path in files {
            let contents = match self.fs.read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) => {
                    log::warn!("skipping unreadable config file {}: {e}", path.display());
                    continue;
                }
            };

            let file_mac = match self.os {
                OsType::Ubuntu => mac_from_netplan(&contents),
                OsType::Rhel => mac_from_ifcfg(&contents),
            };

            let is_orphan = match &file_mac {
                Some(mac) => !active.contains(&mac.to_ascii_lowercase()),
                None => true,
            };
            if !is_orphan {
                continue;
            }

            let file_name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            let Some(slot_match) = slot_pattern.find(&file_name) else {
                log::warn!("orphan candidate {} has no recognizable slot name", path.display());
                continue;
            };
            let name = match InterfaceName::parse(slot_match.as_str()) {
                Ok(name) => name,
                Err(e) => {
                    log::warn!("orphan candidate {} has an invalid slot name: {e}", path.display());
                    continue;
                }
            };

            let rollbacker = Rollbacker::new(self.configurer);
            match rollbacker.rollback(&name, "orphaned config file").await {
                Ok(()) => deleted.push(name.to_string()),
                Err(e) => log::warn!("failed to roll back orphan {name}: {e}"),
            }
        }

        Ok(DeleteOutcome { deleted })
    }

    fn matches_pattern(os: OsType, file_name: &str) -> bool {
        match os {
            OsType::Ubuntu => file_name.starts_with('9') && file_name.contains("multinic") && file_name.ends_with(".yaml"),
            OsType::Rhel => file_name.starts_with("ifcfg-multinic"),
        }
    }
}
